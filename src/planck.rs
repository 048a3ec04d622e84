//! Radiometric conversion between raw sensor values and
//! temperature.
//!
//! The model is the Planck response curve used by FLIR-style
//! imagers, as implemented by the [Thermimage R library] and
//! its [python port][read_thermal.py]. See the [ExifTool
//! forum][forum] for the derivation of the constants.
//!
//! # Domain policy
//!
//! The transforms are evaluated in `f64` with plain IEEE
//! semantics: out-of-domain elements (a zero divisor, or a
//! non-positive logarithm argument) produce NaN or infinity
//! for that element instead of failing the whole conversion.
//! A zero divisor in [`raw_to_temp`][PlanckCoefficients::raw_to_temp]
//! collapses to `T = 0` via `B / ln(inf)`.
//!
//! [read_thermal.py]: //github.com/Nervengift/read_thermal.py/blob/master/flir_image_extractor.py
//! [Thermimage R library]: //github.com/gtatters/Thermimage/blob/master/R/raw2temp.R
//! [forum]: //exiftool.org/forum/index.php?topic=4898.60

use std::sync::atomic::{AtomicUsize, Ordering};

use lazy_static::lazy_static;
use ndarray::{Array2, Zip};
use regex::Regex;
use serde_derive::*;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};

/// Planck calibration tags required for conversion, as named
/// by ExifTool.
pub const REQUIRED_TAGS: [&str; 5] = ["PlanckR1", "PlanckR2", "PlanckB", "PlanckF", "PlanckO"];

/// Camera-specific calibration constants relating raw sensor
/// values to absolute temperature.
///
/// Typically read from the exif data of the image; immutable
/// once parsed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PlanckCoefficients {
    pub planck_r1: f64,
    pub planck_r2: f64,
    pub planck_b: f64,
    pub planck_f: f64,
    pub planck_o: f64,
}

impl PlanckCoefficients {
    /// Extract the five calibration coefficients from an
    /// ExifTool tag map.
    ///
    /// Tag names are matched case-insensitively against
    /// [`REQUIRED_TAGS`], ignoring any ExifTool group prefix
    /// (`APP1:PlanckR1` resolves to `PlanckR1`). Values may
    /// be JSON numbers or numeric strings. All five tags must
    /// resolve or the extraction fails with
    /// [`Error::MissingCoefficients`] naming every missing tag.
    pub fn from_tags(tags: &Map<String, Value>) -> Result<Self> {
        let mut values = [0f64; 5];
        let mut missing = Vec::new();
        for (idx, tag) in REQUIRED_TAGS.iter().enumerate() {
            match find_tag(tags, tag).and_then(numeric_value) {
                Some(val) => values[idx] = val,
                None => missing.push(*tag),
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingCoefficients(missing));
        }

        Ok(PlanckCoefficients {
            planck_r1: values[0],
            planck_r2: values[1],
            planck_b: values[2],
            planck_f: values[3],
            planck_o: values[4],
        })
    }

    // temp = PB/ln(PR1/(PR2*(raw+PO))+PF)
    /// Temperature in Kelvin for a single raw sensor value.
    pub fn raw_to_temp(&self, raw: f64) -> f64 {
        self.planck_b
            / (self.planck_r1 / (self.planck_r2 * (raw + self.planck_o)) + self.planck_f).ln()
    }

    // raw = PR1/(PR2*(exp(PB/temp)-PF))-PO
    /// Raw sensor value for a temperature in Kelvin, before
    /// quantization.
    pub fn temp_to_raw(&self, temp: f64) -> f64 {
        self.planck_r1 / (self.planck_r2 * ((self.planck_b / temp).exp() - self.planck_f))
            - self.planck_o
    }

    /// Element-wise forward transform of a raw sensor matrix
    /// to Kelvin. Output shape equals input shape.
    pub fn temperatures(&self, raw: &Array2<u16>) -> Array2<f64> {
        let mut temp = Array2::zeros(raw.raw_dim());
        Zip::from(&mut temp)
            .and(raw)
            .par_for_each(|t, &s| *t = self.raw_to_temp(s as f64));
        temp
    }

    /// Element-wise inverse transform of a Kelvin matrix back
    /// to quantized raw sensor values.
    ///
    /// Quantization truncates toward zero (the behavior of
    /// the reference implementation's integer cast, not a
    /// rounding). Values outside `[0, 65535]` saturate at the
    /// bounds, NaN quantizes to 0; a single warning reports
    /// how many elements were clipped.
    pub fn raw_counts(&self, temp: &Array2<f64>) -> Array2<u16> {
        let clipped = AtomicUsize::new(0);
        let mut raw = Array2::zeros(temp.raw_dim());
        Zip::from(&mut raw).and(temp).par_for_each(|s, &t| {
            let val = self.temp_to_raw(t);
            if !(0.0..=u16::MAX as f64).contains(&val.trunc()) {
                clipped.fetch_add(1, Ordering::Relaxed);
            }
            *s = val as u16;
        });

        let clipped = clipped.into_inner();
        if clipped > 0 {
            warn!(clipped, "raw values saturated at the u16 bounds");
        }
        raw
    }
}

/// Look up a tag by its own name, ignoring any ExifTool group
/// prefix and letter case.
pub(crate) fn find_tag<'a>(tags: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    tags.iter().find_map(|(key, value)| {
        let base = key.rsplit(':').next().unwrap_or_else(|| key.as_str());
        if base.eq_ignore_ascii_case(name) {
            Some(value)
        } else {
            None
        }
    })
}

/// Numeric tag value. ExifTool sometimes renders numbers as
/// strings with a unit suffix ("25.0 C"); take the leading
/// float.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^-?\d+\.?\d*([eE][-+]?\d+)?").unwrap();
    }

    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => RE.find(s.trim()).and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};
    use serde_json::json;

    use super::fixtures::coefficients;
    use super::*;

    fn tag_map(tags: Value) -> Map<String, Value> {
        match tags {
            Value::Object(map) => map,
            _ => panic!("expected a json object"),
        }
    }

    #[test]
    fn known_sample_temperature() {
        let coeffs = coefficients();
        // 1428 / ln(385517/8120 + 1)
        let temp = coeffs.raw_to_temp(8192.);
        assert!((temp - 367.94).abs() < 5e-2, "temp = {}", temp);
    }

    #[test]
    fn forward_is_finite_and_positive_in_domain() {
        let coeffs = coefficients();
        for raw in (100..60_000).step_by(500) {
            let temp = coeffs.raw_to_temp(raw as f64);
            assert!(temp.is_finite(), "raw = {}", raw);
            assert!(temp > 0., "raw = {}, temp = {}", raw, temp);
        }
    }

    #[test]
    fn forward_is_monotonic_in_domain() {
        let coeffs = coefficients();
        let mut last = coeffs.raw_to_temp(100.);
        for raw in (101..60_000).step_by(37) {
            let temp = coeffs.raw_to_temp(raw as f64);
            assert!(temp > last, "not increasing at raw = {}", raw);
            last = temp;
        }
    }

    #[test]
    fn round_trip_within_one_count() {
        let coeffs = coefficients();
        let raw = array![[100u16, 4096, 8192], [16384, 32768, 60000]];
        let restored = coeffs.raw_counts(&coeffs.temperatures(&raw));
        for (&orig, &back) in raw.iter().zip(restored.iter()) {
            let diff = (orig as i32 - back as i32).abs();
            assert!(diff <= 1, "{} -> {}", orig, back);
        }
    }

    #[test]
    fn out_of_domain_propagates_nan() {
        let coeffs = coefficients();
        // raw + O = -1: negative logarithm argument
        assert!(coeffs.raw_to_temp(71.).is_nan());
        // raw + O = 0: divisor collapses to T = 0 via B/ln(inf)
        assert_eq!(coeffs.raw_to_temp(72.), 0.);
    }

    #[test]
    fn quantization_truncates_and_saturates() {
        let coeffs = coefficients();
        let temp = coeffs.raw_to_temp(8192.);
        let exact = coeffs.temp_to_raw(temp);
        let quantized = coeffs.raw_counts(&Array2::from_elem((1, 1), temp))[(0, 0)];
        assert_eq!(quantized as f64, exact.trunc());

        // F = 1 makes exp(B/T) - F vanish as T grows; the huge
        // raw value must clip to the u16 ceiling.
        let hot = Array2::from_elem((1, 1), 1e9);
        assert_eq!(coeffs.raw_counts(&hot)[(0, 0)], u16::MAX);

        let nan = Array2::from_elem((1, 1), f64::NAN);
        assert_eq!(coeffs.raw_counts(&nan)[(0, 0)], 0);
    }

    #[test]
    fn coefficients_from_prefixed_tags() {
        let tags = tag_map(json!({
            "SourceFile": "image.jpg",
            "APP1:PlanckR1": 385517.0,
            "APP1:PlanckR2": 1.0,
            "APP1:PlanckB": 1428.0,
            "APP1:PlanckF": 1,
            "APP1:PlanckO": -72,
        }));
        let coeffs = PlanckCoefficients::from_tags(&tags).unwrap();
        assert_eq!(coeffs, coefficients());
    }

    #[test]
    fn coefficients_from_string_values() {
        let tags = tag_map(json!({
            "planckr1": "385517",
            "PLANCKR2": "1.0",
            "PlanckB": "1428",
            "PlanckF": "1",
            "PlanckO": "-72",
        }));
        let coeffs = PlanckCoefficients::from_tags(&tags).unwrap();
        assert_eq!(coeffs, coefficients());
    }

    #[test]
    fn missing_tags_are_reported_precisely() {
        let tags = tag_map(json!({
            "PlanckR1": 385517.0,
            "PlanckB": 1428.0,
            "PlanckF": 1.0,
        }));
        match PlanckCoefficients::from_tags(&tags) {
            Err(Error::MissingCoefficients(missing)) => {
                assert_eq!(missing, vec!["PlanckR2", "PlanckO"]);
            }
            other => panic!("expected MissingCoefficients, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn non_numeric_tag_counts_as_missing() {
        let tags = tag_map(json!({
            "PlanckR1": 385517.0,
            "PlanckR2": "fast",
            "PlanckB": 1428.0,
            "PlanckF": 1.0,
            "PlanckO": -72.0,
        }));
        match PlanckCoefficients::from_tags(&tags) {
            Err(Error::MissingCoefficients(missing)) => {
                assert_eq!(missing, vec!["PlanckR2"]);
            }
            other => panic!("expected MissingCoefficients, got {:?}", other.map(|_| ())),
        }
    }
}
