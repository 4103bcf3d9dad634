use crate::{
    bearing::LookAngle,
    error::Error,
    grid::{Grid, PixelCoordinate},
};
use chrono::{DateTime, Utc};
use sguaba::systems::Wgs84;
use uom::si::{
    angle::degree,
    f64::{Angle, Length},
    length::meter,
};

/// Orientation of the ambient geomagnetic field at a camera.
///
/// The magnetic zenith is the sky direction with azimuth equal to the
/// declination and elevation equal to the inclination.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagneticField {
    declination: Angle,
    inclination: Angle,
    epoch: Option<DateTime<Utc>>,
}

impl MagneticField {
    /// Creates a new `MagneticField` from `declination` and `inclination`.
    ///
    /// Returns `None` if they do not describe a valid sky direction.
    pub fn new(declination: Angle, inclination: Angle) -> Option<Self> {
        LookAngle::new(declination, inclination)?;
        Some(Self {
            declination,
            inclination,
            epoch: None,
        })
    }

    pub fn from_degrees(declination: f64, inclination: f64) -> Option<Self> {
        Self::new(
            Angle::new::<degree>(declination),
            Angle::new::<degree>(inclination),
        )
    }

    /// Records the reference epoch of the field model the angles came from.
    pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn declination(&self) -> Angle {
        self.declination
    }

    pub fn inclination(&self) -> Angle {
        self.inclination
    }

    pub fn epoch(&self) -> Option<DateTime<Utc>> {
        self.epoch
    }

    pub fn zenith(&self) -> LookAngle {
        LookAngle::new(self.declination, self.inclination)
            .expect("field angles were validated on construction")
    }
}

/// Native pixel numbering of a calibration source.
///
/// Some skymaps number their pixels with an offset or a sparse stride. The
/// engine always works in dense grid coordinates and only translates back
/// into this numbering at the boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelIndex {
    rows: Grid<i64>,
    cols: Grid<i64>,
}

impl PixelIndex {
    pub fn new(rows: Grid<i64>, cols: Grid<i64>) -> Result<Self, Error> {
        if rows.shape() != cols.shape() {
            return Err(Error::InvalidInput(format!(
                "row index {:?} and column index {:?} differ in shape",
                rows.shape(),
                cols.shape()
            )));
        }

        Ok(Self { rows, cols })
    }

    /// Natural numbering, `0..rows` by `0..cols`.
    pub fn natural(rows: usize, cols: usize) -> Self {
        Self {
            rows: Grid::from_fn(rows, cols, |px| px.row() as i64),
            cols: Grid::from_fn(rows, cols, |px| px.col() as i64),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.rows.shape()
    }

    pub fn native(&self, pixel: PixelCoordinate) -> Option<(i64, i64)> {
        Some((*self.rows.get(pixel)?, *self.cols.get(pixel)?))
    }
}

/// One imager's calibration state: where each pixel looks and where the
/// camera is.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    name: String,
    look: Grid<Option<LookAngle>>,
    position: Wgs84,
    pixel_index: Option<PixelIndex>,
    magnetic_field: Option<MagneticField>,
    slant_range_samples: Option<Vec<Length>>,
    calibration_time: Option<DateTime<Utc>>,
}

impl CameraFrame {
    pub fn new(name: impl Into<String>, look: Grid<Option<LookAngle>>, position: Wgs84) -> Self {
        Self {
            name: name.into(),
            look,
            position,
            pixel_index: None,
            magnetic_field: None,
            slant_range_samples: None,
            calibration_time: None,
        }
    }

    /// Creates a `CameraFrame` from row-major azimuth and elevation maps in
    /// degrees, as read from a skymap.
    ///
    /// A pixel whose azimuth or elevation is NaN is outside the optical field
    /// of view and becomes invalid. Finite elevations outside -90 to 90 are
    /// rejected.
    pub fn from_degrees(
        name: impl Into<String>,
        rows: usize,
        cols: usize,
        azimuth: &[f64],
        elevation: &[f64],
        position: Wgs84,
    ) -> Result<Self, Error> {
        let name = name.into();
        if azimuth.len() != elevation.len() {
            return Err(Error::InvalidInput(format!(
                "{name}: azimuth map has {} cells but elevation map has {}",
                azimuth.len(),
                elevation.len()
            )));
        }

        let cells = azimuth
            .iter()
            .zip(elevation)
            .enumerate()
            .map(|(i, (&az, &el))| {
                if az.is_nan() || el.is_nan() {
                    return Ok(None);
                }

                LookAngle::from_degrees(az, el).map(Some).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "{name}: pixel {i} has invalid azimuth {az} or elevation {el}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(name, Grid::from_vec(rows, cols, cells)?, position))
    }

    pub fn with_pixel_index(mut self, index: PixelIndex) -> Result<Self, Error> {
        if index.shape() != self.look.shape() {
            return Err(Error::InvalidInput(format!(
                "{}: pixel index shape {:?} does not match calibration shape {:?}",
                self.name,
                index.shape(),
                self.look.shape()
            )));
        }

        self.pixel_index = Some(index);
        Ok(self)
    }

    pub fn with_magnetic_field(mut self, field: MagneticField) -> Self {
        self.magnetic_field = Some(field);
        self
    }

    /// Attaches the slant ranges used to build this camera's magnetic zenith
    /// ray. They must be positive and strictly increasing.
    pub fn with_slant_range_samples(mut self, samples: Vec<Length>) -> Result<Self, Error> {
        let positive = samples
            .iter()
            .all(|r| r.get::<meter>().is_finite() && r.get::<meter>() > 0.);
        let increasing = samples.windows(2).all(|w| w[0] < w[1]);
        if samples.is_empty() || !positive || !increasing {
            return Err(Error::InvalidInput(format!(
                "{}: slant range samples must be non-empty, positive and strictly increasing",
                self.name
            )));
        }

        self.slant_range_samples = Some(samples);
        Ok(self)
    }

    pub fn with_calibration_time(mut self, time: DateTime<Utc>) -> Self {
        self.calibration_time = Some(time);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn look_angles(&self) -> &Grid<Option<LookAngle>> {
        &self.look
    }

    pub fn look_angle(&self, pixel: PixelCoordinate) -> Option<LookAngle> {
        self.look.get(pixel).copied().flatten()
    }

    pub fn position(&self) -> &Wgs84 {
        &self.position
    }

    pub fn rows(&self) -> usize {
        self.look.rows()
    }

    pub fn cols(&self) -> usize {
        self.look.cols()
    }

    pub fn magnetic_field(&self) -> Option<&MagneticField> {
        self.magnetic_field.as_ref()
    }

    pub fn slant_range_samples(&self) -> Option<&[Length]> {
        self.slant_range_samples.as_deref()
    }

    pub fn calibration_time(&self) -> Option<DateTime<Utc>> {
        self.calibration_time
    }

    /// Translates a grid coordinate into the calibration's own pixel
    /// numbering.
    pub fn native_pixel(&self, pixel: PixelCoordinate) -> Option<(i64, i64)> {
        match &self.pixel_index {
            Some(index) => index.native(pixel),
            None => self
                .look
                .contains_pixel(pixel)
                .then(|| (pixel.row() as i64, pixel.col() as i64)),
        }
    }

    /// Returns the calibration grid with every cell outside `keep` marked
    /// invalid.
    pub(crate) fn restricted_to(
        &self,
        keep: impl Fn(PixelCoordinate, &LookAngle) -> bool,
    ) -> Grid<Option<LookAngle>> {
        Grid::from_fn(self.rows(), self.cols(), |px| {
            self.look_angle(px).filter(|look| keep(px, look))
        })
    }
}
