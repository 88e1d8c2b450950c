//! `vfx filter add|rm|enable|disable|mandatory`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use vfx_ops::filter_kind::FilterTag;
use vfx_ops::filters::default_for_tag;

use crate::state;

#[derive(Args)]
pub struct FilterArgs {
    #[command(subcommand)]
    pub command: FilterCommand,
}

#[derive(Subcommand)]
pub enum FilterCommand {
    /// Append a new filter to the top of the stack.
    Add {
        /// Filter type name: BWAdaptiveMixer, Curves, CascadedSharpen,
        /// Vignette, SplitTone, FilmGrain.
        name: String,
    },
    /// Remove the filter at `index`.
    Rm { index: usize },
    /// Enable the filter at `index`.
    Enable { index: usize },
    /// Disable the filter at `index`.
    Disable { index: usize },
    /// Mark the filter at `index` mandatory (always renders).
    Mandatory {
        index: usize,
        /// Clear the mandatory flag instead of setting it.
        #[arg(long)]
        unset: bool,
    },
}

pub fn run(command: FilterCommand, threads: usize, session_path: PathBuf) -> Result<()> {
    let mut session = state::load(&session_path, threads)?;

    match command {
        FilterCommand::Add { name } => {
            let tag = FilterTag::from_type_name(&name);
            let filter = default_for_tag(tag).with_context(|| format!("unknown filter type '{name}'"))?;
            let index = session.add_filter(filter).map_err(super::to_anyhow)?;
            println!("added {name} at index {index}");
        }
        FilterCommand::Rm { index } => {
            session.remove_filter(index).map_err(super::to_anyhow)?;
            println!("removed filter {index}");
        }
        FilterCommand::Enable { index } => {
            session.enable_filter(index).map_err(super::to_anyhow)?;
            println!("enabled filter {index}");
        }
        FilterCommand::Disable { index } => {
            session.disable_filter(index).map_err(super::to_anyhow)?;
            println!("disabled filter {index}");
        }
        FilterCommand::Mandatory { index, unset } => {
            if unset {
                session.unset_mandatory_filter(index).map_err(super::to_anyhow)?;
                println!("unset mandatory on filter {index}");
            } else {
                session.set_mandatory_filter(index).map_err(super::to_anyhow)?;
                println!("set mandatory on filter {index}");
            }
        }
    }

    let image_path = state::recorded_image_path(&session_path);
    state::save(&session_path, &session, image_path)
}
