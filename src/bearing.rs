use nalgebra::Vector3;
use uom::si::{
    angle::{degree, radian},
    f64::Angle,
};

/// A direction on the sky as seen by an observer on the ground.
///
/// Azimuth is measured clockwise from north and is always on the range
/// [0, 360) degrees. Elevation is measured from the horizon towards zenith on
/// the range [-90, 90] degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookAngle {
    azimuth: Angle,
    elevation: Angle,
}

impl LookAngle {
    /// Creates a new `LookAngle`, wrapping `azimuth` onto [0, 360).
    ///
    /// Returns `None` if either angle is not finite or if `elevation` is not
    /// between -90 and 90.
    pub fn new(azimuth: Angle, elevation: Angle) -> Option<Self> {
        if !azimuth.value.is_finite() || !is_valid_elevation(elevation) {
            return None;
        }

        Some(Self {
            azimuth: wrap_azimuth(azimuth),
            elevation,
        })
    }

    pub fn from_degrees(azimuth: f64, elevation: f64) -> Option<Self> {
        Self::new(
            Angle::new::<degree>(azimuth),
            Angle::new::<degree>(elevation),
        )
    }

    pub fn azimuth(&self) -> Angle {
        self.azimuth
    }

    pub fn elevation(&self) -> Angle {
        self.elevation
    }

    pub fn zenith_angle(&self) -> Angle {
        Angle::HALF_TURN / 2. - self.elevation
    }

    /// Returns the unit vector pointing along `self` in a local east, north,
    /// up frame.
    pub fn unit_vector(&self) -> Vector3<f64> {
        let az = self.azimuth.get::<radian>();
        let el = self.elevation.get::<radian>();
        Vector3::new(el.cos() * az.sin(), el.cos() * az.cos(), el.sin())
    }

    /// Great circle separation between `self` and `other` on the sky sphere.
    ///
    /// Uses the haversine formula with azimuth as longitude and elevation as
    /// latitude.
    pub fn separation(&self, other: &LookAngle) -> Angle {
        let az0 = self.azimuth.get::<radian>();
        let el0 = self.elevation.get::<radian>();
        let az1 = other.azimuth.get::<radian>();
        let el1 = other.elevation.get::<radian>();

        let hav = haversine(el1 - el0) + el0.cos() * el1.cos() * haversine(az1 - az0);
        Angle::new::<radian>(2. * hav.clamp(0., 1.).sqrt().asin())
    }
}

fn haversine(theta: f64) -> f64 {
    (1. - theta.cos()) / 2.
}

fn is_valid_elevation(elevation: Angle) -> bool {
    elevation.value.is_finite()
        && -Angle::HALF_TURN / 2. <= elevation
        && elevation <= Angle::HALF_TURN / 2.
}

fn wrap_azimuth(azimuth: Angle) -> Angle {
    let wrapped = Angle::new::<degree>(azimuth.get::<degree>().rem_euclid(360.));
    // rem_euclid can round up to the modulus for tiny negative inputs.
    match wrapped.get::<degree>() >= 360. {
        true => Angle::new::<degree>(0.),
        false => wrapped,
    }
}
