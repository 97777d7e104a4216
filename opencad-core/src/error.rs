use thiserror::Error;

/// Result type for model loading, view and share operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or sharing a model
///
/// None of these are fatal to the viewer: a failed load leaves the
/// previously loaded scene untouched and the caller may retry with a
/// different file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed STL: {0}")]
    MalformedStl(String),

    #[error("malformed OBJ: {0}")]
    MalformedObj(String),

    #[error("unsupported model format: {0:?} (expected \"stl\" or \"obj\")")]
    UnsupportedFormat(String),

    #[error("payload of {size} bytes exceeds the {limit} byte share limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid share token: {0}")]
    InvalidShareToken(String),
}

impl Error {
    pub(crate) fn obj_at(line: usize, reason: impl std::fmt::Display) -> Self {
        Error::MalformedObj(format!("line {line}: {reason}"))
    }
}
