//! Error types for tile geometry processing.

use thiserror::Error;

/// Errors raised while slicing, reassembling or decoding tile geometry.
///
/// All of these are recoverable per zoom level: callers either repair the
/// input and retry, or skip the zoom.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A ring is unclosed or has too few points to enclose an area.
    #[error("cannot build ring: {points} points (need a closed ring of at least 4)")]
    InvalidRing {
        /// Number of points in the offending ring.
        points: usize,
    },

    /// A command stream could not be decoded.
    #[error("malformed command stream: {0}")]
    Decode(String),

    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate ({x}, {y})")]
    NonFinite {
        /// X component.
        x: f64,
        /// Y component.
        y: f64,
    },

    /// Zoom level outside the supported pyramid.
    #[error("zoom {0} is outside the supported range 0..=14")]
    InvalidZoom(u8),
}

/// Result type for tile geometry operations.
pub type GeometryResult<T> = Result<T, GeometryError>;

impl GeometryError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self { Self::Decode(msg.into()) }
}
