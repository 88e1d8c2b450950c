//! `vfx render preview|export`

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

use vfx_session::ImageFormat;

use crate::state;

#[derive(Args)]
pub struct RenderArgs {
    #[command(subcommand)]
    pub command: RenderCommand,
}

#[derive(Subcommand)]
pub enum RenderCommand {
    /// Re-render the preview image from the current filter stack.
    Preview {
        /// Re-render even if the preview's frame-rate gate would skip it.
        #[arg(long)]
        force: bool,
    },
    /// Render and write the final image to `path`.
    Export {
        path: PathBuf,
        /// Output format; guessed from `path`'s extension if omitted.
        #[arg(long)]
        format: Option<CliImageFormat>,
        /// Export the current preview buffer instead of re-rendering from
        /// the original image (skipped automatically if the preview is
        /// currently downsampled).
        #[arg(long)]
        from_preview: bool,
        /// Force the CPU backend for this render. This build only has a
        /// CPU backend, so this is accepted for interface compatibility
        /// and is always the effective behavior.
        #[arg(long)]
        force_cpu: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliImageFormat {
    Bmp,
    Jpeg,
    Tiff,
    Png,
    Webp,
}

impl From<CliImageFormat> for ImageFormat {
    fn from(value: CliImageFormat) -> Self {
        match value {
            CliImageFormat::Bmp => ImageFormat::Bmp,
            CliImageFormat::Jpeg => ImageFormat::Jpeg,
            CliImageFormat::Tiff => ImageFormat::Tiff,
            CliImageFormat::Png => ImageFormat::Png,
            CliImageFormat::Webp => ImageFormat::Webp,
        }
    }
}

pub fn run(command: RenderCommand, threads: usize, session_path: PathBuf) -> Result<()> {
    let mut session = state::load(&session_path, threads)?;

    match command {
        RenderCommand::Preview { force } => {
            session.update_preview(force).map_err(super::to_anyhow)?;
            let controller = session.preview_controller();
            if controller.is_scaled_down() {
                println!("preview rendered at scale {:.3}", controller.scale_factor());
            } else {
                println!("preview rendered at full resolution");
            }
        }
        RenderCommand::Export {
            path,
            format,
            from_preview,
            force_cpu: _,
        } => {
            let format = format
                .map(ImageFormat::from)
                .or_else(|| ImageFormat::from_path(&path))
                .ok_or_else(|| anyhow::anyhow!("cannot determine image format for {}", path.display()))?;
            session.export_image(&path, format, from_preview).map_err(super::to_anyhow)?;
            println!("exported to {}", path.display());
        }
    }

    let image_path = state::recorded_image_path(&session_path);
    state::save(&session_path, &session, image_path)
}
