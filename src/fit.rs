//! Least squares polynomial fits.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("x and y have different lengths ({x} and {y})")]
    LengthMismatch { x: usize, y: usize },

    #[error("sample {index} is not finite")]
    NonFinite { index: usize },

    #[error("a degree {degree} fit needs {needed} distinct x values, got {distinct}")]
    TooFewPoints {
        degree: usize,
        needed: usize,
        distinct: usize,
    },

    #[error("singular value decomposition failed: {0}")]
    SvdFailed(&'static str),
}

/// A polynomial fitted by least squares.
///
/// Abscissae are shifted and scaled onto `[-1, 1]` before fitting so that
/// pixel indices in the thousands do not make the design matrix
/// ill-conditioned.
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial {
    /// Coefficients of increasing power in the normalized abscissa.
    coefficients: Vec<f64>,
    center: f64,
    half_width: f64,
}

impl Polynomial {
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if let Some(index) = x
            .iter()
            .zip(y)
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(FitError::NonFinite { index });
        }

        let mut sorted = x.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();
        if sorted.len() <= degree {
            return Err(FitError::TooFewPoints {
                degree,
                needed: degree + 1,
                distinct: sorted.len(),
            });
        }

        let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
        let center = (min + max) / 2.;
        let half_width = match max > min {
            true => (max - min) / 2.,
            false => 1.,
        };

        let vandermonde = DMatrix::from_fn(x.len(), degree + 1, |row, power| {
            ((x[row] - center) / half_width).powi(power as i32)
        });
        let rhs = DVector::from_column_slice(y);
        let solution = vandermonde
            .svd(true, true)
            .solve(&rhs, 1e-12)
            .map_err(FitError::SvdFailed)?;

        Ok(Self {
            coefficients: solution.iter().copied().collect(),
            center,
            half_width,
        })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.half_width;
        self.coefficients
            .iter()
            .rev()
            .fold(0., |acc, coefficient| acc * t + coefficient)
    }
}
