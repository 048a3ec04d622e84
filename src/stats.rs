//! Descriptive statistics over a temperature matrix.

use ndarray::Array2;
use rayon::slice::ParallelSliceMut;
use serde_derive::*;

use crate::error::{Error, Result};

/// Summary of a temperature field in Kelvin.
///
/// `std` is the population standard deviation; `median`
/// averages the two middle values for even-sized input.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TemperatureStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

impl TemperatureStats {
    /// Compute the summary of a temperature matrix.
    ///
    /// A zero-area matrix is an [`Error::EmptyMatrix`]: the
    /// image dimensions come from metadata and are known to
    /// be nonzero, so an empty matrix means the decode went
    /// wrong upstream.
    pub fn from_temperatures(temp: &Array2<f64>) -> Result<Self> {
        let (height, width) = temp.dim();
        if temp.is_empty() {
            return Err(Error::EmptyMatrix { height, width });
        }

        let count = temp.len() as f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.;
        for &val in temp.iter() {
            min = min.min(val);
            max = max.max(val);
            sum += val;
        }
        let mean = sum / count;

        let variance = temp.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / count;

        let mut sorted: Vec<f64> = temp.iter().copied().collect();
        sorted.par_sort_unstable_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.
        } else {
            sorted[mid]
        };

        Ok(TemperatureStats {
            min,
            max,
            mean,
            std: variance.sqrt(),
            median,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::*;

    #[test]
    fn constant_matrix_collapses() {
        let temp = Array2::from_elem((4, 5), 293.15);
        let stats = TemperatureStats::from_temperatures(&temp).unwrap();
        assert_eq!(stats.min, 293.15);
        assert_eq!(stats.max, 293.15);
        assert_eq!(stats.mean, 293.15);
        assert_eq!(stats.median, 293.15);
        assert_eq!(stats.std, 0.);
    }

    #[test]
    fn simple_field() {
        let temp = array![[1., 2.], [3., 4.]];
        let stats = TemperatureStats::from_temperatures(&temp).unwrap();
        assert_eq!(stats.min, 1.);
        assert_eq!(stats.max, 4.);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        // population variance of 1..=4 is 1.25
        assert!((stats.std - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn odd_count_median_is_middle_value() {
        let temp = array![[5., 1., 3.]];
        let stats = TemperatureStats::from_temperatures(&temp).unwrap();
        assert_eq!(stats.median, 3.);
    }

    #[test]
    fn empty_matrix_is_an_error() {
        let temp = Array2::<f64>::zeros((0, 640));
        match TemperatureStats::from_temperatures(&temp) {
            Err(Error::EmptyMatrix { height, width }) => {
                assert_eq!((height, width), (0, 640));
            }
            other => panic!("expected EmptyMatrix, got {:?}", other),
        }
    }
}
