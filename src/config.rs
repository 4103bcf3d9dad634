#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::si::{
    angle::degree,
    f64::{Angle, Length},
    length::meter,
};

/// Minimum elevation, in degrees, of pixels kept by the magnetic zenith slice
/// mask.
pub const MZSLICE_MIN_ELEVATION_DEG: f64 = 5.0;

/// Elevation, in degrees, below which skymap calibration is too poor to
/// project pixels onto an altitude shell.
///
/// Deliberately distinct from [`MZSLICE_MIN_ELEVATION_DEG`].
pub const CALIBRATION_MIN_ELEVATION_DEG: f64 = 10.0;

/// Projection altitudes below this many meters were almost certainly given
/// in kilometers.
pub const MIN_PLAUSIBLE_PROJECTION_ALTITUDE_M: f64 = 1e3;

/// Tunable thresholds for [`FovMerger`](crate::merge::FovMerger).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MergeConfig {
    /// Projection altitudes below this raise a warning.
    pub min_projection_altitude_m: f64,

    /// Elevation threshold of the magnetic zenith slice mask.
    pub mzslice_min_elevation_deg: f64,
}

impl MergeConfig {
    pub fn min_projection_altitude(&self) -> Length {
        Length::new::<meter>(self.min_projection_altitude_m)
    }

    pub fn mzslice_min_elevation(&self) -> Angle {
        Angle::new::<degree>(self.mzslice_min_elevation_deg)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_projection_altitude_m: MIN_PLAUSIBLE_PROJECTION_ALTITUDE_M,
            mzslice_min_elevation_deg: MZSLICE_MIN_ELEVATION_DEG,
        }
    }
}
