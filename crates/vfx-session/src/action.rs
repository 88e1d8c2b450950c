//! [`Action`]: the process/commit lifecycle every session mutation runs
//! through.
//!
//! `process()` may run on any worker thread and holds the action's
//! completion lock exclusively for its duration; `commit()` must run on
//! the thread that constructed the action (the thread that will own any
//! GPU-context-affine side effects) and is rejected otherwise;
//! `finished()` is a non-blocking probe.

use std::sync::{Mutex, TryLockError};
use std::thread::{self, ThreadId};

use tracing::instrument;
use vfx_core::error::{Error, Result};

/// Which of the four session-level operations an [`Action`] represents.
/// Carried only for diagnostics (`tracing` span fields) — the generic
/// `process`/`commit` protocol itself is identical across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Importing an image from a path or in-memory buffer.
    Import,
    /// Exporting the preview or original image to a path.
    Export,
    /// Re-rendering the filter stack into the preview image.
    RenderPreview,
    /// Serializing the session's current state to a snapshot.
    SerializeSession,
}

impl ActionKind {
    fn label(self) -> &'static str {
        match self {
            ActionKind::Import => "import",
            ActionKind::Export => "export",
            ActionKind::RenderPreview => "render_preview",
            ActionKind::SerializeSession => "serialize_session",
        }
    }
}

/// An in-flight or completed unit of session work producing a `T` on
/// success.
///
/// `process()` can run on any thread (typically a `rayon` worker); it is
/// serialized against concurrent callers by `completion`'s mutex.
/// `commit()` enforces it only ever runs on the thread that called
/// [`Action::new`], to honor the GPU-context-affine commit contract.
pub struct Action<T> {
    kind: ActionKind,
    origin_thread: ThreadId,
    completion: Mutex<Option<Result<T>>>,
}

impl<T> Action<T> {
    /// Constructs an action of `kind`, capturing the calling thread as its
    /// origin for [`Action::commit`]'s thread check.
    pub fn new(kind: ActionKind) -> Self {
        Action {
            kind,
            origin_thread: thread::current().id(),
            completion: Mutex::new(None),
        }
    }

    /// This action's kind.
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Runs `work`, storing its result. May be called from any thread;
    /// blocks if another call is concurrently in `process()`.
    #[instrument(skip(self, work), fields(action = self.kind.label()))]
    pub fn process(&self, work: impl FnOnce() -> Result<T>) -> Result<()> {
        let mut slot = self
            .completion
            .lock()
            .map_err(|_| Error::other("action completion lock poisoned"))?;
        *slot = Some(work());
        Ok(())
    }

    /// Non-blocking probe: `true` once [`Action::process`] has stored a
    /// result. A lock currently held by an in-progress `process()` reports
    /// `false` rather than blocking.
    pub fn finished(&self) -> bool {
        match self.completion.try_lock() {
            Ok(slot) => slot.is_some(),
            Err(TryLockError::WouldBlock) => false,
            Err(TryLockError::Poisoned(_)) => true,
        }
    }

    /// Takes this action's result. Fails with [`Error::WrongThread`] if
    /// called off the origin thread, or [`Error::other`] if `process()`
    /// hasn't completed yet.
    pub fn commit(&self) -> Result<T> {
        if thread::current().id() != self.origin_thread {
            return Err(Error::wrong_thread(format!(
                "{} action committed off its origin thread",
                self.kind.label()
            )));
        }
        let mut slot = self
            .completion
            .lock()
            .map_err(|_| Error::other("action completion lock poisoned"))?;
        slot.take()
            .ok_or_else(|| Error::other(format!("{} action has not finished processing", self.kind.label())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_is_false_until_processed() {
        let action: Action<i32> = Action::new(ActionKind::RenderPreview);
        assert!(!action.finished());
        action.process(|| Ok(42)).unwrap();
        assert!(action.finished());
    }

    #[test]
    fn commit_returns_processed_value() {
        let action = Action::new(ActionKind::Import);
        action.process(|| Ok("ok".to_string())).unwrap();
        assert_eq!(action.commit().unwrap(), "ok");
    }

    #[test]
    fn commit_before_process_fails() {
        let action: Action<i32> = Action::new(ActionKind::Export);
        assert!(action.commit().is_err());
    }

    #[test]
    fn commit_off_origin_thread_fails() {
        let action: Action<i32> = Action::new(ActionKind::SerializeSession);
        action.process(|| Ok(1)).unwrap();
        let handle = thread::spawn(move || action.commit());
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(Error::WrongThread(_))));
    }

    #[test]
    fn commit_propagates_process_error() {
        let action: Action<i32> = Action::new(ActionKind::RenderPreview);
        action.process(|| Err(Error::invalid_argument("bad input"))).unwrap();
        assert!(action.commit().is_err());
    }
}
