//! vfx - non-destructive image editing session CLI.
//!
//! Each invocation resolves a persisted [`Session`](vfx_session::Session)
//! from a sidecar state file, applies one subcommand's effect to it, then
//! re-persists the result (see `state.rs`).

// Allow Option<Option<T>> for CLI log argument:
// - None = no logging
// - Some(None) = log to default path
// - Some(Some(path)) = log to custom path
#![allow(clippy::option_option)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod state;

// =============================================================================
// Logging infrastructure
// =============================================================================

/// Global logger instance for file logging.
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

/// File logger that writes messages to a log file.
struct Logger {
    file: File,
}

impl Logger {
    /// Creates a new logger writing to the specified path (append mode).
    fn new(path: &PathBuf) -> std::io::Result<Self> {
        let file = File::options().append(true).create(true).open(path)?;
        Ok(Self { file })
    }

    /// Writes a message to the log file.
    fn log(&mut self, msg: &str) {
        let _ = writeln!(self.file, "{msg}");
    }
}

/// Logs a message to stderr and optionally to the log file.
pub fn log(msg: &str) {
    eprintln!("{msg}");
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(ref mut logger) = *guard {
            logger.log(msg);
        }
    }
}

/// Returns the default log file path (next to the binary).
fn get_default_log_path() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        let mut log_path = exe_path;
        log_path.set_extension("log");
        log_path
    } else {
        PathBuf::from("vfx.log")
    }
}

/// Initialize tracing based on verbosity level.
fn init_tracing(verbose: u8, log_path: Option<&PathBuf>) {
    let filter = match verbose {
        0 => "warn",
        1 => "vfx=info",
        2 => "vfx=debug",
        _ => "vfx=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if let Some(path) = log_path {
        let log_dir = path.parent().unwrap_or(Path::new("."));
        let log_filename = path.file_name().unwrap_or(std::ffi::OsStr::new("vfx.log"));
        let file_appender = tracing_appender::rolling::never(log_dir, log_filename);

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .with_ansi(false)
            .with_writer(file_appender)
            .init();
    } else if verbose > 0 {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .init();
    }
}

#[derive(Parser)]
#[command(name = "vfx")]
#[command(author, version, about = "Non-destructive image editing session CLI")]
#[command(long_about = "
A session-oriented, non-destructive image editing tool: each command loads
the session sidecar file, applies one operation, and re-persists it.

Examples:
  vfx import photo.png                  # Start a session from a file
  vfx filter add Vignette               # Append a filter, disabled by default
  vfx filter enable 0                   # Enable it
  vfx render preview                    # Re-render the preview
  vfx render export out.png --from-preview
  vfx preset save look.bs               # Save the active filter state
  vfx preset use look.bs                # Apply a saved preset library
  vfx info --json                       # Inspect the session's current shape
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write log to file (-l default, -l path.log custom)
    #[arg(short = 'l', long = "log", global = true)]
    log: Option<Option<PathBuf>>,

    /// Number of worker threads (0 = use the session default)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Path to the session sidecar state file.
    #[arg(short = 's', long = "session", global = true)]
    session: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an image into the session, replacing any previously loaded one.
    Import {
        input: PathBuf,
        /// Write the stripped alpha plane here, if the importer stripped one.
        #[arg(long = "export-alpha-to")]
        export_alpha_to: Option<PathBuf>,
    },

    /// Manage the session's filter stack.
    #[command(visible_alias = "f")]
    Filter(commands::filter::FilterArgs),

    /// Manage saved and active filter presets.
    #[command(visible_alias = "p")]
    Preset(commands::preset::PresetArgs),

    /// Re-render the preview, or export the final image.
    #[command(visible_alias = "r")]
    Render(commands::render::RenderArgs),

    /// Show the session's current shape (filters, preview state).
    #[command(visible_alias = "i")]
    Info(commands::info::InfoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match &cli.log {
        Some(Some(path)) => Some(path.clone()),
        Some(None) => Some(get_default_log_path()),
        None => None,
    };

    init_tracing(cli.verbose, log_path.as_ref());

    if let Some(ref path) = log_path {
        if let Ok(logger) = Logger::new(path) {
            if let Ok(mut guard) = LOGGER.lock() {
                *guard = Some(logger);
            }
            if cli.verbose > 0 {
                log(&format!("Logging to: {}", path.display()));
            }
        }
    }

    let session_path = state::state_path(cli.session.as_deref());

    match cli.command {
        Commands::Import { input, export_alpha_to } => commands::import::run(commands::import::ImportArgs {
            input,
            export_alpha_to,
            threads: cli.threads,
            session_path,
        }),
        Commands::Filter(args) => commands::filter::run(args.command, cli.threads, session_path),
        Commands::Preset(args) => commands::preset::run(args.command, cli.threads, session_path),
        Commands::Render(args) => commands::render::run(args.command, cli.threads, session_path),
        Commands::Info(args) => commands::info::run(args, cli.threads, session_path)
            .context("failed to read session"),
    }
}
