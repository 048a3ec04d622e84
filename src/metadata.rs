//! Metadata extraction for thermal images.
//!
//! The crate does not parse image containers itself: tags are
//! read from the JSON produced by [ExifTool] (`exiftool -j -b`),
//! either from a pre-extracted file or by running the tool
//! directly via [`ExifTool`]. Only the tags needed for
//! conversion are pulled out of the map: the five Planck
//! calibration coefficients, the raw bitmap container type and
//! dimensions, and the embedded raw bitmap itself.
//!
//! [ExifTool]: //exiftool.org

use std::{
    ffi::OsString,
    io::Read,
    path::{Path, PathBuf},
    process::Command,
};

use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::RawFormat;
use crate::error::{Error, Result};
use crate::planck::{find_tag, numeric_value, PlanckCoefficients};

/// Everything the conversion needs from an image's metadata.
#[derive(Debug)]
pub struct ThermalMetadata {
    pub coefficients: PlanckCoefficients,
    pub format: RawFormat,
    pub width: usize,
    pub height: usize,
    pub raw_bytes: Vec<u8>,
    /// `SourceFile` tag, when the map came from an ExifTool
    /// JSON dump.
    pub source_file: Option<PathBuf>,
}

impl ThermalMetadata {
    /// Extract conversion metadata from an ExifTool tag map.
    pub fn from_tags(tags: &Map<String, Value>) -> Result<Self> {
        let coefficients = PlanckCoefficients::from_tags(tags)?;

        let ty = string_tag(tags, "RawThermalImageType")?;
        let format = RawFormat::from_tag(&ty)?;

        let width = numeric_tag(tags, "RawThermalImageWidth")? as usize;
        let height = numeric_tag(tags, "RawThermalImageHeight")? as usize;

        let encoded = string_tag(tags, "RawThermalImage")?;
        let raw_bytes = base64_bytes(&encoded)?;

        let source_file = find_tag(tags, "SourceFile")
            .and_then(Value::as_str)
            .map(PathBuf::from);

        debug!(
            width,
            height,
            format = format.extension(),
            "parsed thermal metadata"
        );

        Ok(ThermalMetadata {
            coefficients,
            format,
            width,
            height,
            raw_bytes,
            source_file,
        })
    }

    /// Parse the output of `exiftool -j -b` for a single
    /// image: a JSON array with one tag object.
    pub fn from_json_reader<R: Read>(rdr: R) -> Result<Self> {
        Self::from_tags(&single_tag_map(serde_json::from_reader(rdr)?)?)
    }
}

fn single_tag_map(mut objects: Vec<Map<String, Value>>) -> Result<Map<String, Value>> {
    match objects.len() {
        1 => Ok(objects.remove(0)),
        n => Err(Error::ExifTool(format!(
            "expected one metadata object, found {}",
            n
        ))),
    }
}

fn string_tag(tags: &Map<String, Value>, name: &'static str) -> Result<String> {
    find_tag(tags, name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(Error::MissingTag(name))
}

fn numeric_tag(tags: &Map<String, Value>, name: &'static str) -> Result<f64> {
    find_tag(tags, name)
        .and_then(numeric_value)
        .ok_or(Error::MissingTag(name))
}

/// Decode an ExifTool binary tag value of the form
/// `base64:...`.
fn base64_bytes(value: &str) -> Result<Vec<u8>> {
    let encoded = value.strip_prefix("base64:").ok_or_else(|| {
        Error::UnsupportedFormat("binary tag value must begin with `base64:`".into())
    })?;
    base64::decode(encoded).map_err(|e| Error::UnsupportedFormat(format!("bad base64 tag: {}", e)))
}

/// Handle to the external `exiftool` binary.
#[derive(Debug, Clone)]
pub struct ExifTool {
    command: OsString,
}

impl Default for ExifTool {
    fn default() -> Self {
        ExifTool {
            command: "exiftool".into(),
        }
    }
}

impl ExifTool {
    pub fn new<S: Into<OsString>>(command: S) -> Self {
        ExifTool {
            command: command.into(),
        }
    }

    /// Read the full tag map of an image, with binary tags
    /// inlined as base64. Output is captured from stdout, so
    /// no intermediate file is ever created.
    pub fn read_tags(&self, path: &Path) -> Result<Map<String, Value>> {
        debug!(path = %path.display(), "running exiftool");
        let output = Command::new(&self.command)
            .arg("-j")
            .arg("-b")
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(Error::ExifTool(format!(
                "{} while reading {}",
                output.status,
                path.display()
            )));
        }
        single_tag_map(serde_json::from_slice(&output.stdout)?)
    }

    /// Re-apply the tags of `source` onto `target`, the
    /// passthrough used after saving a derived image.
    pub fn copy_tags_from(&self, source: &Path, target: &Path) -> Result<()> {
        let status = Command::new(&self.command)
            .arg("-tagsfromfile")
            .arg(source)
            .arg("-overwrite_original")
            .arg(target)
            .status()?;
        if !status.success() {
            return Err(Error::ExifTool(format!(
                "{} copying tags from {} to {}",
                status,
                source.display(),
                target.display()
            )));
        }
        Ok(())
    }
}
