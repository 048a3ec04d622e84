//! Error taxonomy for the conversion pipeline.
//!
//! Domain failures in the Planck transforms (zero divisor,
//! non-positive log argument) are deliberately *not* errors:
//! they propagate as IEEE NaN/Inf per element. See
//! [`planck`][crate::planck] for the policy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// One or more Planck calibration tags absent from the
    /// metadata. Conversion cannot proceed without all five.
    #[error("missing Planck calibration tags: {0:?}")]
    MissingCoefficients(Vec<&'static str>),

    /// A non-coefficient metadata tag the conversion cannot
    /// proceed without.
    #[error("missing metadata tag: {0}")]
    MissingTag(&'static str),

    /// Zero-area matrix where the metadata promised nonzero
    /// dimensions. Indicates an upstream decode inconsistency.
    #[error("empty sensor matrix (metadata promised {height}x{width})")]
    EmptyMatrix { height: usize, width: usize },

    /// Decoded raw bitmap does not match the metadata dimensions.
    #[error("raw bitmap is {actual_height}x{actual_width}, metadata says {height}x{width}")]
    DimensionMismatch {
        height: usize,
        width: usize,
        actual_height: usize,
        actual_width: usize,
    },

    #[error("could not decode raw thermal bitmap: {0}")]
    Decode(#[source] image::error::ImageError),

    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("exiftool failed: {0}")]
    ExifTool(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;
