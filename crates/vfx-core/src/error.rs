//! Error types shared across the imaging runtime.
//!
//! [`Error`] covers both the data-structure-level failures (bounds,
//! allocation, format conversion) and the session/action-level failures
//! (backend, concurrency, preset, pipeline) so every crate in the
//! workspace can propagate through one `Result` alias.

use thiserror::Error as ThisError;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur anywhere in the imaging runtime.
///
/// Each variant documents which of the seven error kinds it implements.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Pixel coordinates are outside image bounds. Kind: precondition
    /// violation.
    #[error("pixel ({x}, {y}) out of bounds for image {width}x{height}")]
    OutOfBounds {
        /// X coordinate that was out of bounds
        x: i32,
        /// Y coordinate that was out of bounds
        y: i32,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },

    /// Region of interest extends beyond image bounds. Kind: precondition
    /// violation.
    #[error("region ({rx}, {ry}, {rw}x{rh}) exceeds image bounds {width}x{height}")]
    InvalidRegion {
        /// Region X origin
        rx: i32,
        /// Region Y origin
        ry: i32,
        /// Region width
        rw: u32,
        /// Region height
        rh: u32,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },

    /// Caller supplied a malformed or mismatched argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Memory allocation failed.
    #[error("failed to allocate {requested} bytes: {reason}")]
    OutOfMemory {
        /// Bytes requested
        requested: usize,
        /// Failure reason
        reason: String,
    },

    /// A GPU backend operation (create/upload/retrieve/copy) failed. The
    /// affected `ImageLayer` must be reset by the caller.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// No conversion path exists between two pixel formats, not even the
    /// two-hop `RGBA32` pivot.
    #[error("unsupported pixel format conversion: {format}")]
    UnsupportedConversion {
        /// Description of the attempted conversion
        format: String,
    },

    /// Channel count mismatch between source and destination.
    #[error("channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch {
        /// Expected channel count
        expected: u8,
        /// Actual channel count
        got: u8,
    },

    /// Image or buffer dimensions don't match for the operation.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// First width
        a_width: u32,
        /// First height
        a_height: u32,
        /// Second width
        b_width: u32,
        /// Second height
        b_height: u32,
    },

    /// Invalid image dimensions (zero, or would overflow a buffer-size
    /// calculation).
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// A concurrency contract was violated: `commit()` off the origin
    /// thread, or a GL/GPU-backed action's `process()` off the
    /// device-owning thread.
    #[error("wrong thread: {0}")]
    WrongThread(String),

    /// Preset text failed to parse, or a preset applied to a filter that
    /// doesn't recognize one of its keys. The target collection is left
    /// unmodified.
    #[error("preset error: {0}")]
    PresetParse(String),

    /// An importer or exporter reported failure, or the requested path was
    /// missing.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that don't fit other categories.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::OutOfBounds`] error.
    pub fn out_of_bounds(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::OutOfBounds { x, y, width, height }
    }

    /// Creates an [`Error::InvalidRegion`] error.
    pub fn invalid_region(rx: i32, ry: i32, rw: u32, rh: u32, width: u32, height: u32) -> Self {
        Self::InvalidRegion {
            rx,
            ry,
            rw,
            rh,
            width,
            height,
        }
    }

    /// Creates an [`Error::InvalidArgument`] error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an [`Error::OutOfMemory`] error.
    pub fn out_of_memory(requested: usize, reason: impl Into<String>) -> Self {
        Self::OutOfMemory {
            requested,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::BackendFailure`] error.
    pub fn backend_failure(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Creates an [`Error::UnsupportedConversion`] error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedConversion {
            format: format.into(),
        }
    }

    /// Creates an [`Error::ChannelMismatch`] error.
    pub fn channel_mismatch(expected: u8, got: u8) -> Self {
        Self::ChannelMismatch { expected, got }
    }

    /// Creates an [`Error::DimensionMismatch`] error.
    pub fn dimension_mismatch(a: (u32, u32), b: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::WrongThread`] error.
    pub fn wrong_thread(msg: impl Into<String>) -> Self {
        Self::WrongThread(msg.into())
    }

    /// Creates an [`Error::PresetParse`] error.
    pub fn preset_parse(msg: impl Into<String>) -> Self {
        Self::PresetParse(msg.into())
    }

    /// Creates an [`Error::Pipeline`] error.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Creates an [`Error::Other`] error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// `true` if this is a bounds-related error.
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. } | Self::InvalidRegion { .. })
    }

    /// `true` if this is an allocation error.
    pub fn is_allocation_error(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// `true` if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_message() {
        let err = Error::out_of_bounds(100, 50, 80, 60);
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(err.is_bounds_error());
    }

    #[test]
    fn out_of_memory_message() {
        let err = Error::out_of_memory(1024 * 1024 * 1024, "pool exhausted");
        assert!(err.to_string().contains("pool exhausted"));
        assert!(err.is_allocation_error());
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(err.is_io_error());
    }

    #[test]
    fn dimension_mismatch_message() {
        let err = Error::dimension_mismatch((100, 100), (200, 200));
        let msg = err.to_string();
        assert!(msg.contains("100x100"));
        assert!(msg.contains("200x200"));
    }

    #[test]
    fn wrong_thread_message() {
        let err = Error::wrong_thread("commit() called off the origin thread");
        assert!(matches!(err, Error::WrongThread(_)));
    }
}
