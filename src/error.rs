use alloc::string::String;

/// Precondition failures. These are reported before any output is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("image dimensions must be non-zero, got {width}x{height}")]
    ZeroDimensions { width: usize, height: usize },

    #[error("image of {width}x{height} pixels does not fit in memory")]
    DimensionsTooLarge { width: usize, height: usize },

    #[error("source buffer too small: need {needed} bytes, got {actual}")]
    SourceTooSmall { needed: usize, actual: usize },

    #[error("output buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("image has no source pixels to encode")]
    MissingSource,

    #[error("unknown format: {0}")]
    UnknownFormat(String),
}
