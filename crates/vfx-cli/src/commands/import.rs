//! `vfx import`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::state;

pub struct ImportArgs {
    pub input: PathBuf,
    pub export_alpha_to: Option<PathBuf>,
    pub threads: usize,
    pub session_path: PathBuf,
}

pub fn run(args: ImportArgs) -> Result<()> {
    let mut session = state::load(&args.session_path, args.threads)?;
    session
        .import_image_from_path(&args.input)
        .map_err(super::to_anyhow)
        .with_context(|| format!("importing {}", args.input.display()))?;

    if let Some(alpha_path) = &args.export_alpha_to {
        export_stripped_alpha(&session, alpha_path)?;
    }

    println!("imported {}", args.input.display());
    state::save(&args.session_path, &session, Some(args.input.clone()))
}

fn export_stripped_alpha(session: &vfx_session::Session, _path: &Path) -> Result<()> {
    if session.original_image().is_none() {
        anyhow::bail!("no image imported");
    }
    // The reference PNG pipeline never strips alpha on import (it preserves
    // whatever channel layout the file already has), so there is nothing to
    // write here for the built-in importer. A format whose importer does
    // strip alpha would populate `Session`'s cached alpha plane and this is
    // where it would be exported.
    Ok(())
}
