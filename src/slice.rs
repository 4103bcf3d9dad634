//! One-pixel-wide cuts through a camera along a pixel correspondence, and
//! their re-parameterization into a linear angle scale through magnetic
//! zenith.

use crate::{
    camera::CameraFrame,
    error::Error,
    fit::{FitError, Polynomial},
    grid::PixelCoordinate,
    mask::MaskPolicy,
    nearest::Correspondence,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;
use uom::si::{angle::degree, f64::Angle};

/// Degree of the curve fitted through a correspondence.
pub const CUT_CURVE_DEGREE: usize = 3;

/// A calibrated 1-D cut through a camera image.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceCut {
    pub cut_columns: Vec<usize>,

    /// Fitted row of every column in `cut_columns`, always inside the grid.
    pub cut_rows: Vec<usize>,

    /// Great circle separation of every cut pixel from magnetic zenith.
    pub separation: Vec<Angle>,

    /// Linearized angle along the cut. Magnetic zenith sits near 90 degrees.
    pub angle_from_zenith: Vec<Angle>,

    /// Position in the cut nearest to magnetic zenith.
    pub magnetic_zenith_index: usize,
}

impl SliceCut {
    pub fn len(&self) -> usize {
        self.cut_columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cut_columns.is_empty()
    }

    pub fn pixels(&self) -> impl Iterator<Item = PixelCoordinate> + '_ {
        self.cut_rows
            .iter()
            .zip(&self.cut_columns)
            .map(|(&row, &col)| PixelCoordinate::new(row, col))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceExtractor {
    curve_degree: usize,
}

impl Default for SliceExtractor {
    fn default() -> Self {
        Self {
            curve_degree: CUT_CURVE_DEGREE,
        }
    }
}

impl SliceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_curve_degree(mut self, curve_degree: usize) -> Self {
        self.curve_degree = curve_degree;
        self
    }

    pub fn curve_degree(&self) -> usize {
        self.curve_degree
    }

    /// Cuts `frame` along the curve `row = f(col)` fitted through
    /// `correspondence`, sampled at `cut_columns`.
    ///
    /// Fitted rows that fall off the sensor are a [`Error::DegenerateCutFit`]
    /// rather than being clipped, and cut pixels without calibration are a
    /// [`Error::CutOutsideFov`].
    pub fn extract(
        &self,
        frame: &CameraFrame,
        correspondence: &Correspondence,
        cut_columns: &[usize],
    ) -> Result<SliceCut, Error> {
        let degenerate = |detail: String| Error::DegenerateCutFit {
            camera: frame.name().to_string(),
            detail,
        };

        if cut_columns.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{}: no columns to cut",
                frame.name()
            )));
        }
        if let Some(col) = cut_columns.iter().find(|&&col| col >= frame.cols()) {
            return Err(Error::InvalidInput(format!(
                "{}: cut column {col} is outside a sensor {} columns wide",
                frame.name(),
                frame.cols()
            )));
        }

        let x: Vec<f64> = correspondence.cols().iter().map(|&col| col as f64).collect();
        let y: Vec<f64> = correspondence.rows().iter().map(|&row| row as f64).collect();
        let curve = Polynomial::fit(&x, &y, self.curve_degree)
            .map_err(|err| degenerate(err.to_string()))?;

        let cut_rows = cut_columns
            .iter()
            .map(|&col| {
                let row = curve.eval(col as f64).round();
                match row >= 0. && row < frame.rows() as f64 {
                    true => Ok(row as usize),
                    false => Err(degenerate(format!(
                        "row {row} at column {col} is outside a sensor {} rows tall; \
                         is the image orientation correct?",
                        frame.rows()
                    ))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let zenith = frame
            .magnetic_field()
            .ok_or_else(|| Error::MissingMetadata {
                camera: frame.name().to_string(),
                field: "magnetic field",
                policy: MaskPolicy::MagneticZenithSlice,
            })?
            .zenith();

        let separation = cut_rows
            .iter()
            .zip(cut_columns)
            .map(|(&row, &col)| {
                let pixel = PixelCoordinate::new(row, col);
                frame
                    .look_angle(pixel)
                    .map(|look| zenith.separation(&look))
                    .ok_or_else(|| Error::CutOutsideFov {
                        camera: frame.name().to_string(),
                        pixel,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (angle_from_zenith, magnetic_zenith_index) =
            sky_to_beam(&separation).map_err(|err| degenerate(err.to_string()))?;

        debug!(
            camera = frame.name(),
            columns = cut_columns.len(),
            magnetic_zenith_index,
            "extracted slice"
        );

        Ok(SliceCut {
            cut_columns: cut_columns.to_vec(),
            cut_rows,
            separation,
            angle_from_zenith,
            magnetic_zenith_index,
        })
    }
}

/// Maps separations from magnetic zenith along a cut onto a single angle
/// scale through zenith.
///
/// Samples before the point of closest approach become `90 - separation` and
/// the rest `90 + separation`. A line fitted through those values against the
/// sample index is returned along with the index of closest approach.
pub fn sky_to_beam(separation: &[Angle]) -> Result<(Vec<Angle>, usize), FitError> {
    let magnetic_zenith_index = separation
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.value.total_cmp(&b.value))
        .map(|(index, _)| index)
        .unwrap_or(0);

    let index: Vec<f64> = (0..separation.len()).map(|i| i as f64).collect();
    let piecewise: Vec<f64> = separation
        .iter()
        .enumerate()
        .map(|(i, sep)| match i < magnetic_zenith_index {
            true => 90. - sep.get::<degree>(),
            false => 90. + sep.get::<degree>(),
        })
        .collect();

    let line = Polynomial::fit(&index, &piecewise, 1)?;
    let angles = index
        .iter()
        .map(|&i| Angle::new::<degree>(line.eval(i)))
        .collect();

    Ok((angles, magnetic_zenith_index))
}
