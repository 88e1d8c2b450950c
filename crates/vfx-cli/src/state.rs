//! On-disk CLI session state.
//!
//! Each `vfx` invocation is a fresh process, but the session-level API it
//! exposes (`filter add`, `filter enable`, ...) only makes sense against a
//! session that persists across invocations. Rather than inventing a
//! parallel `Session` serialization, this replays persisted state into a
//! freshly constructed [`Session`] on every run: re-import the image, parse
//! the stack's filter parameters back out of the `.bs` grammar
//! ([`vfx_ops::preset`]) already used for preset files, and restore each
//! entry's enabled/mandatory bits from a small `serde_yaml` sidecar.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use vfx_ops::preset::FilterPresetCollection;
use vfx_session::Session;

const DEFAULT_STATE_FILE: &str = ".vfx-session.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct EntryMeta {
    enabled: bool,
    mandatory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CliState {
    image_path: Option<PathBuf>,
    max_threads: usize,
    preset_text: String,
    entries: Vec<EntryMeta>,
}

/// Resolves the state file path: `explicit` if given, otherwise
/// `.vfx-session.yaml` in the current directory.
pub fn state_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
}

fn to_anyhow(err: vfx_core::error::Error) -> anyhow::Error {
    anyhow::anyhow!(err.to_string())
}

/// Loads the persisted CLI state at `path` (if any) into a freshly
/// constructed [`Session`], replaying the image import and filter stack.
/// `threads == 0` means "use whatever was last persisted", falling back to
/// the session default if nothing was saved yet.
pub fn load(path: &Path, threads: usize) -> Result<Session> {
    let Ok(text) = fs::read_to_string(path) else {
        let session = if threads == 0 {
            Session::new("vfx-cli")
        } else {
            Session::with_thread_count("vfx-cli", threads)
        }
        .map_err(to_anyhow)?;
        return Ok(session);
    };
    let state: CliState = serde_yaml::from_str(&text).context("parsing CLI session state")?;
    let resolved_threads = if threads == 0 { state.max_threads.max(1) } else { threads };
    let mut session = Session::with_thread_count("vfx-cli", resolved_threads).map_err(to_anyhow)?;

    if let Some(image_path) = &state.image_path {
        session
            .import_image_from_path(image_path)
            .map_err(to_anyhow)
            .with_context(|| format!("re-importing {}", image_path.display()))?;
    }

    if !state.preset_text.trim().is_empty() {
        let collection = FilterPresetCollection::parse(&state.preset_text).map_err(to_anyhow)?;
        let indices = session.add_filters_from_collection(&collection).map_err(to_anyhow)?;
        for (index, meta) in indices.into_iter().zip(state.entries.iter()) {
            if meta.enabled {
                session.enable_filter(index).map_err(to_anyhow)?;
            }
            if meta.mandatory {
                session.set_mandatory_filter(index).map_err(to_anyhow)?;
            }
        }
    }

    Ok(session)
}

/// Persists `session`'s image path and filter stack to `path`.
pub fn save(path: &Path, session: &Session, image_path: Option<PathBuf>) -> Result<()> {
    let collection = session.current_state_to_preset_collection();
    let entries = (0..session.filter_stack().len())
        .map(|i| {
            let entry = session.filter_stack().entry(i).expect("index within stack bounds");
            EntryMeta {
                enabled: entry.enabled,
                mandatory: entry.mandatory,
            }
        })
        .collect();

    let state = CliState {
        image_path,
        max_threads: session.max_threads(),
        preset_text: collection.serialize(),
        entries,
    };
    let text = serde_yaml::to_string(&state).context("serializing CLI session state")?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// The image path currently recorded in the state file, if any, without
/// constructing a full session.
pub fn recorded_image_path(path: &Path) -> Option<PathBuf> {
    let text = fs::read_to_string(path).ok()?;
    let state: CliState = serde_yaml::from_str(&text).ok()?;
    state.image_path
}
