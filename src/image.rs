//! End-to-end handling of a single thermal image.
//!
//! [`ThermalImage`] composes the metadata source, the raw
//! bitmap codec and the Planck transforms into a "load file,
//! get temperatures" workflow. Construction is eager and
//! strictly linear: metadata, then coefficients, then the
//! decoded raw matrix, then the temperature field and its
//! statistics. A failed step fails the whole load; there is no
//! partially-constructed image.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use ndarray::Array2;
use tracing::{debug, info};

use crate::codec::{self, BitDepth, RawFormat};
use crate::error::{Error, Result};
use crate::metadata::{ExifTool, ThermalMetadata};
use crate::planck::PlanckCoefficients;
use crate::stats::TemperatureStats;

/// Which matrix `save` writes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Raw,
    Temperature,
}

impl std::str::FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(OutputKind::Raw),
            "temp" | "temperature" => Ok(OutputKind::Temperature),
            other => Err(format!("invalid output kind: {}", other)),
        }
    }
}

/// Output configuration of a [`ThermalImage`].
///
/// `emissivity` and `transmissivity` are carried for forward
/// compatibility and are not yet applied by the conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSettings {
    pub kind: OutputKind,
    pub bit_depth: BitDepth,
    pub emissivity: f64,
    pub transmissivity: f64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            kind: OutputKind::Raw,
            bit_depth: BitDepth::Sixteen,
            emissivity: 1.,
            transmissivity: 1.,
        }
    }
}

/// A fully loaded thermal image.
///
/// All derived fields are computed at construction; only
/// [`output`][ThermalImage::output] may be adjusted afterwards.
#[derive(Debug)]
pub struct ThermalImage {
    pub path: PathBuf,
    pub coefficients: PlanckCoefficients,
    pub format: RawFormat,
    pub raw: Array2<u16>,
    pub temperature: Array2<f64>,
    pub stats: TemperatureStats,
    pub output: OutputSettings,
}

impl ThermalImage {
    /// Build an image from already-extracted metadata.
    ///
    /// `path` is the image the metadata came from; it anchors
    /// the default output naming. The decoded raw bitmap must
    /// match the dimensions the metadata promises.
    pub fn from_metadata(path: &Path, metadata: ThermalMetadata) -> Result<Self> {
        let raw = codec::decode_raw(&metadata.raw_bytes, metadata.format)?;

        if raw.is_empty() {
            return Err(Error::EmptyMatrix {
                height: metadata.height,
                width: metadata.width,
            });
        }
        let (height, width) = raw.dim();
        if (height, width) != (metadata.height, metadata.width) {
            return Err(Error::DimensionMismatch {
                height: metadata.height,
                width: metadata.width,
                actual_height: height,
                actual_width: width,
            });
        }

        let temperature = metadata.coefficients.temperatures(&raw);
        let stats = TemperatureStats::from_temperatures(&temperature)?;
        info!(
            path = %path.display(),
            height,
            width,
            min = stats.min,
            max = stats.max,
            "loaded thermal image"
        );

        Ok(ThermalImage {
            path: path.to_path_buf(),
            coefficients: metadata.coefficients,
            format: metadata.format,
            raw,
            temperature,
            stats,
            output: OutputSettings::default(),
        })
    }

    /// Load from an ExifTool JSON dump (`exiftool -j -b`).
    ///
    /// The dump's `SourceFile` tag, when present, names the
    /// original image for output naming; otherwise the dump
    /// path itself is used.
    pub fn from_exiftool_json_path(path: &Path) -> Result<Self> {
        let metadata = ThermalMetadata::from_json_reader(BufReader::new(File::open(path)?))?;
        let source = metadata
            .source_file
            .clone()
            .unwrap_or_else(|| path.to_path_buf());
        Self::from_metadata(&source, metadata)
    }

    /// Load by running `exiftool` on the image itself.
    pub fn from_image_path(tool: &ExifTool, path: &Path) -> Result<Self> {
        let tags = tool.read_tags(path)?;
        Self::from_metadata(path, ThermalMetadata::from_tags(&tags)?)
    }

    /// Default output path: the input path with its extension
    /// replaced, and `_T` appended to the stem for temperature
    /// output.
    pub fn output_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.output.kind {
            OutputKind::Raw => self
                .path
                .with_file_name(format!("{}.{}", stem, self.format.extension())),
            OutputKind::Temperature => self.path.with_file_name(format!("{}_T.tiff", stem)),
        }
    }

    /// Encode the configured matrix to `path`. Raw output is
    /// written in its native container; temperature output is
    /// TIFF at the configured bit depth, 16-bit being an
    /// affine quantization over the image's own value range.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let bytes = match self.output.kind {
            OutputKind::Raw => codec::encode_raw(&self.raw, self.format)?,
            OutputKind::Temperature => codec::encode_temperature(
                &self.temperature,
                self.output.bit_depth,
                (self.stats.min, self.stats.max),
            )?,
        };
        fs::write(path, bytes)?;
        debug!(path = %path.display(), "saved image");
        Ok(())
    }

    /// [`save_to`][Self::save_to] at the default
    /// [`output_path`][Self::output_path].
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.output_path();
        self.save_to(&path)?;
        Ok(path)
    }
}
