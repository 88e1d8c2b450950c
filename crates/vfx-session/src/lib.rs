//! Application session, action, and preview-controller model for the
//! imaging runtime.
//!
//! This crate is the runtime layer above `vfx-ops`'s filter stack: it owns
//! the original/preview images, the stateful filter stack and its
//! presets, the import/export pipeline, and the process/commit action
//! protocol that serializes mutation across worker threads.

pub mod action;
pub mod pipeline;
pub mod preview;
pub mod session;

pub use action::{Action, ActionKind};
pub use pipeline::{Exporter, ImageFormat, ImportResult, Importer, Pipeline};
pub use preview::PreviewController;
pub use session::{FilterSnapshot, Session, SessionSnapshot};
