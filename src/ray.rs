use crate::{
    bearing::LookAngle,
    error::Error,
    geodesy::{Aer, EcefPoint, aer_to_ecef, ecef_to_aer},
};
use sguaba::systems::Wgs84;
use uom::si::f64::Length;

/// Points along a camera's line of sight towards its magnetic zenith,
/// expressed in ECEF so they can be viewed from another camera.
#[derive(Clone, Debug)]
pub struct MagneticZenithRay {
    origin: Wgs84,
    direction: LookAngle,
    ranges: Vec<Length>,
    points: Vec<EcefPoint>,
}

impl MagneticZenithRay {
    /// Samples the ray from `origin` along `direction` at every slant range in
    /// `ranges`.
    pub fn new(origin: &Wgs84, direction: LookAngle, ranges: &[Length]) -> Result<Self, Error> {
        let points = ranges
            .iter()
            .map(|&range| {
                aer_to_ecef(
                    &Aer {
                        azimuth: direction.azimuth(),
                        elevation: direction.elevation(),
                        range,
                    },
                    origin,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            origin: origin.clone(),
            direction,
            ranges: ranges.to_vec(),
            points,
        })
    }

    pub fn origin(&self) -> &Wgs84 {
        &self.origin
    }

    pub fn direction(&self) -> LookAngle {
        self.direction
    }

    pub fn ranges(&self) -> &[Length] {
        &self.ranges
    }

    pub fn points(&self) -> &[EcefPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Azimuth, elevation and range of every sample as seen by `observer`.
    pub fn as_seen_from(&self, observer: &Wgs84) -> Vec<Aer> {
        self.points
            .iter()
            .map(|point| ecef_to_aer(point, observer))
            .collect()
    }

    /// Sky directions of every sample as seen by `observer`.
    pub fn look_angles_from(&self, observer: &Wgs84) -> Vec<LookAngle> {
        self.as_seen_from(observer)
            .iter()
            .filter_map(Aer::look_angle)
            .collect()
    }
}
