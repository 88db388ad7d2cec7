use std::fmt;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// Error latched by a device call that was rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DeviceErrorCode {
    /// A handle that was never created or has been deleted.
    InvalidHandle,
    /// The call needs a bound vertex array, buffer or program and none is bound.
    NothingBound,
    /// A uniform value does not match the declared type at its location.
    TypeMismatch,
    /// A draw reads past the end of the bound buffer, or a uniform write falls
    /// outside its binding.
    OutOfRange,
    /// An argument outside the accepted domain (e.g. a zero stride).
    InvalidValue,
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceErrorCode::InvalidHandle => "invalid handle",
            DeviceErrorCode::NothingBound => "nothing bound",
            DeviceErrorCode::TypeMismatch => "type mismatch",
            DeviceErrorCode::OutOfRange => "out of range",
            DeviceErrorCode::InvalidValue => "invalid value",
        };
        f.write_str(s)
    }
}

/// Failures surfaced as `Result`s by frame-level device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("surface lost beyond recovery: {0}")]
    Surface(String),

    #[error("framebuffer read-back failed: {0}")]
    Readback(String),

    #[error("unsupported framebuffer format {0}")]
    Unsupported(String),
}
