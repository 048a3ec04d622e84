//! Library to compute temperature maps from radiometric
//! thermal images.
//!
//! This crate provides two functionalities:
//!
//! 1. Convert raw sensor values to absolute
//! [temperature][planck] (and back) using the Planck
//! calibration constants stored in the image metadata. The
//! conversion model follows the [Thermimage R library] and its
//! [python port][read_thermal.py].
//!
//! 2. [Load][image::ThermalImage] the calibration constants
//! and the embedded raw sensor bitmap from the JSON produced
//! by [ExifTool] (`exiftool -j -b`), compute the temperature
//! field and its [summary statistics][stats], and
//! [save][image::ThermalImage::save] either matrix back out as
//! TIFF or PNG.
//!
//! # Usage
//!
//! ```rust
//! # fn test_compile() -> radiometric::Result<()> {
//! use std::path::Path;
//! use radiometric::{metadata::ExifTool, ThermalImage};
//!
//! // from a metadata dump created with `exiftool -j -b`
//! let image = ThermalImage::from_exiftool_json_path(Path::new("image.json"))?;
//! println!("median: {} K", image.stats.median);
//!
//! // or by running exiftool directly
//! let image = ThermalImage::from_image_path(&ExifTool::default(), Path::new("image.jpg"))?;
//! # Ok(())
//! # }
//! ```
//!
//! The scalar transforms are available without any I/O via
//! [`PlanckCoefficients`]; see [`planck`] for the model and
//! its domain policy.
//!
//! [read_thermal.py]: //github.com/Nervengift/read_thermal.py/blob/master/flir_image_extractor.py
//! [Thermimage R library]: //github.com/gtatters/Thermimage/blob/master/R/raw2temp.R
//! [ExifTool]: //exiftool.org

pub mod codec;
pub mod error;
pub mod image;
pub mod metadata;
pub mod planck;
pub mod stats;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::error::{Error, Result};
pub use crate::image::ThermalImage;
pub use crate::planck::PlanckCoefficients;
pub use crate::stats::TemperatureStats;
