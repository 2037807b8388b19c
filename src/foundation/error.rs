/// Convenience result type used across brandcanvas.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Registry contract violations (deleting the last layer, merging fewer than two layers,
/// updating an unknown id) are not errors; those operations report "nothing happened"
/// through their `bool`/`Option` return values instead.
#[derive(thiserror::Error, Debug)]
pub enum CanvasError {
    /// A surface could not be allocated (zero or oversized dimensions).
    #[error("allocation error: {0}")]
    Allocation(String),

    /// Encoded bytes could not be decoded or rasterized.
    #[error("decode error: {0}")]
    Decode(String),

    /// Markup was rejected by the parser before any layer was allocated.
    #[error("parse error: {0}")]
    Parse(String),

    /// Pixel data could not be encoded into the requested output format.
    #[error("encode error: {0}")]
    Encode(String),

    /// Invalid caller-provided data or options.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CanvasError {
    /// Build a [`CanvasError::Allocation`] value.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`CanvasError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`CanvasError::Parse`] value.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Build a [`CanvasError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`CanvasError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CanvasError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
