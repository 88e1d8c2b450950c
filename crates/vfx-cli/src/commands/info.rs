//! `vfx info` — dumps the session snapshot, a read-only introspection
//! surface over the current filter stack and preview state.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::state;

#[derive(Args)]
pub struct InfoArgs {
    /// Emit the snapshot as structured (YAML) output instead of plain text.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: InfoArgs, threads: usize, session_path: PathBuf) -> Result<()> {
    let session = state::load(&session_path, threads)?;
    let snapshot = session.snapshot();

    if args.json {
        println!("{}", serde_yaml::to_string(&snapshot)?);
        return Ok(());
    }

    println!("session: {}", snapshot.name);
    println!("max_threads: {}", snapshot.max_threads);
    println!(
        "preview: {}{}",
        if snapshot.preview_scaled_down { "scaled" } else { "full" },
        if snapshot.preview_scaled_down {
            format!(" (factor {:.3})", snapshot.preview_scale_factor)
        } else {
            String::new()
        }
    );
    println!("filters:");
    for (index, filter) in snapshot.filters.iter().enumerate() {
        println!(
            "  [{index}] {} (tag={}, enabled={}, mandatory={}, dirty={})",
            filter.type_name, filter.tag, filter.enabled, filter.mandatory, filter.dirty
        );
    }

    Ok(())
}
