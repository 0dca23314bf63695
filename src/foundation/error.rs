/// Convenience result type used across dualframe.
pub type FrameResult<T> = Result<T, FrameError>;

/// Error taxonomy for containers, shader contexts and the GPU seam.
///
/// Every error is raised synchronously and never retried. A container that returned an error
/// should be closed and discarded rather than used again.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    /// A required capability (rendering handle, bitmap transfer) was not supplied.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Shader compilation failed; carries the driver info log verbatim.
    #[error("shader compile error: {0}")]
    Compile(String),

    /// Program linking failed; carries the driver info log verbatim.
    #[error("program link error: {0}")]
    Link(String),

    /// A GPU object allocation returned no handle.
    #[error("resource error: {0}")]
    Resource(String),

    /// No renderable texture precision is available for the operation.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A shader context was used against a second rendering context.
    #[error("context mismatch: {0}")]
    ContextMismatch(String),

    /// An internal invariant was violated.
    #[error("programmer error: {0}")]
    Programmer(String),

    /// Invalid constructor input (zero dimensions, buffer size mismatch).
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FrameError {
    /// Build a [`FrameError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`FrameError::Compile`] value.
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Build a [`FrameError::Link`] value.
    pub fn link(msg: impl Into<String>) -> Self {
        Self::Link(msg.into())
    }

    /// Build a [`FrameError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`FrameError::UnsupportedFormat`] value.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`FrameError::ContextMismatch`] value.
    pub fn context_mismatch(msg: impl Into<String>) -> Self {
        Self::ContextMismatch(msg.into())
    }

    /// Build a [`FrameError::Programmer`] value.
    pub fn programmer(msg: impl Into<String>) -> Self {
        Self::Programmer(msg.into())
    }

    /// Build a [`FrameError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
