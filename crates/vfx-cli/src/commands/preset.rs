//! `vfx preset load|save|use`

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use vfx_ops::preset::FilterPresetCollection;

use crate::state;

#[derive(Args)]
pub struct PresetArgs {
    #[command(subcommand)]
    pub command: PresetCommand,
}

#[derive(Subcommand)]
pub enum PresetCommand {
    /// Load a `.bs` preset library into the session without applying it.
    Load { path: PathBuf },
    /// Serialize the session's current active-state filters to `path`.
    Save { path: PathBuf },
    /// Apply every preset in `path` to the matching filters in the stack.
    Use { path: PathBuf },
}

pub fn run(command: PresetCommand, threads: usize, session_path: PathBuf) -> Result<()> {
    let mut session = state::load(&session_path, threads)?;

    match command {
        PresetCommand::Load { path } => {
            session.load_preset_from_path(&path).map_err(super::to_anyhow)?;
            println!(
                "loaded {} presets from {}",
                session.filter_preset_collection().len(),
                path.display()
            );
        }
        PresetCommand::Save { path } => {
            session.save_preset_to_path(&path).map_err(super::to_anyhow)?;
            println!("saved presets to {}", path.display());
        }
        PresetCommand::Use { path } => {
            let collection = FilterPresetCollection::load_from_path(&path).map_err(super::to_anyhow)?;
            session.use_presets(&collection).map_err(super::to_anyhow)?;
            println!("applied presets from {}", path.display());
        }
    }

    let image_path = state::recorded_image_path(&session_path);
    state::save(&session_path, &session, image_path)
}
