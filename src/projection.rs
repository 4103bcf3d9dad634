//! Mapping camera pixels onto a shell at a fixed altitude or onto the
//! celestial sphere, and finding the pixels that look at given directions or
//! places.

use crate::{
    bearing::LookAngle,
    camera::CameraFrame,
    error::Error,
    geodesy::{Aer, aer_to_geodetic, geodetic_to_aer, slant_range_to_altitude},
    grid::{Grid, PixelCoordinate},
    nearest::{AngularNearestNeighbor, Correspondence},
};
use chrono::{DateTime, Utc};
use sguaba::systems::Wgs84;
use tracing::debug;
use uom::si::{
    angle::{degree, radian},
    f64::{Angle, Length},
    length::meter,
};

/// Julian date of the J2000.0 epoch, 2000-01-01T12:00:00 UT.
const J2000_JULIAN_DATE: f64 = 2_451_545.0;
/// Julian date of the unix epoch.
const UNIX_EPOCH_JULIAN_DATE: f64 = 2_440_587.5;

/// A pixel with its line of sight and the point where that line of sight
/// reaches the projection altitude.
#[derive(Clone, Debug)]
pub struct ProjectedPixel {
    pub pixel: PixelCoordinate,
    pub look: Option<LookAngle>,

    /// `None` for pixels that are uncalibrated or do not look above the
    /// horizon.
    pub position: Option<Wgs84>,
}

fn check_altitude(altitude: Length) -> Result<(), Error> {
    let meters = altitude.get::<meter>();
    match meters.is_finite() && meters > 0. {
        true => Ok(()),
        false => Err(Error::InvalidInput(format!(
            "projection altitude must be positive, got {meters} m"
        ))),
    }
}

fn project(look: &LookAngle, origin: &Wgs84, altitude: Length) -> Result<Option<Wgs84>, Error> {
    let Some(range) = slant_range_to_altitude(altitude, look.elevation()) else {
        return Ok(None);
    };

    let aer = Aer {
        azimuth: look.azimuth(),
        elevation: look.elevation(),
        range,
    };
    aer_to_geodetic(&aer, origin).map(Some)
}

/// Projects every pixel looking higher than `min_elevation` onto a shell
/// `altitude` above the camera, using the slant range
/// `altitude / sin(elevation)`.
///
/// Pixels at or below `min_elevation` are `None`; calibration is usually too
/// poor there for the projection to be meaningful. See
/// [`CALIBRATION_MIN_ELEVATION_DEG`](crate::config::CALIBRATION_MIN_ELEVATION_DEG).
pub fn project_to_altitude(
    frame: &CameraFrame,
    altitude: Length,
    min_elevation: Angle,
) -> Result<Grid<Option<Wgs84>>, Error> {
    check_altitude(altitude)?;

    let cells = frame
        .look_angles()
        .iter()
        .map(|(_, look)| match look {
            Some(look) if look.elevation() > min_elevation => {
                project(look, frame.position(), altitude)
            }
            _ => Ok(None),
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        camera = frame.name(),
        projected = cells.iter().filter(|cell| cell.is_some()).count(),
        "projected pixels to altitude"
    );

    Grid::from_vec(frame.rows(), frame.cols(), cells)
}

/// Projects the given pixels of `frame` onto a shell `altitude` above the
/// camera.
pub fn project_pixels(
    frame: &CameraFrame,
    pixels: impl IntoIterator<Item = PixelCoordinate>,
    altitude: Length,
) -> Result<Vec<ProjectedPixel>, Error> {
    check_altitude(altitude)?;

    pixels
        .into_iter()
        .map(|pixel| {
            let look = frame.look_angle(pixel);
            let position = match &look {
                Some(look) => project(look, frame.position(), altitude)?,
                None => None,
            };

            Ok(ProjectedPixel {
                pixel,
                look,
                position,
            })
        })
        .collect()
}

/// Right ascension and declination of a sky direction, referred to the
/// equator and equinox of date.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Equatorial {
    /// On [0, 360) degrees.
    pub right_ascension: Angle,
    pub declination: Angle,
}

/// Greenwich mean sidereal time at `time` (IAU 1982), taking UTC as UT1.
pub fn greenwich_mean_sidereal_time(time: DateTime<Utc>) -> Angle {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    let days = seconds / 86_400. + UNIX_EPOCH_JULIAN_DATE - J2000_JULIAN_DATE;
    let centuries = days / 36_525.;

    let gmst = 280.460_618_37
        + 360.985_647_366_29 * days
        + 0.000_387_933 * centuries * centuries
        - centuries.powi(3) / 38_710_000.;
    Angle::new::<degree>(gmst.rem_euclid(360.))
}

/// Converts a look angle seen from `observer` at `time` to equatorial
/// coordinates. Refraction and polar motion are ignored.
pub fn look_angle_to_equatorial(
    look: &LookAngle,
    observer: &Wgs84,
    time: DateTime<Utc>,
) -> Equatorial {
    let (sin_az, cos_az) = look.azimuth().get::<radian>().sin_cos();
    let (sin_el, cos_el) = look.elevation().get::<radian>().sin_cos();
    let (sin_lat, cos_lat) = observer.latitude().get::<radian>().sin_cos();

    let declination = (sin_el * sin_lat + cos_el * cos_lat * cos_az).clamp(-1., 1.).asin();
    // Hour angle, positive west of the meridian.
    let hour_angle = (-sin_az * cos_el).atan2(cos_lat * sin_el - sin_lat * cos_el * cos_az);

    let local_sidereal_time = greenwich_mean_sidereal_time(time) + observer.longitude();
    let right_ascension =
        (local_sidereal_time.get::<degree>() - hour_angle.to_degrees()).rem_euclid(360.);

    Equatorial {
        right_ascension: Angle::new::<degree>(right_ascension),
        declination: Angle::new::<radian>(declination),
    }
}

/// Maps every pixel looking higher than `min_elevation` to the right
/// ascension and declination it sees at `time`.
///
/// Pixels at or below `min_elevation` are `None`, as in
/// [`project_to_altitude`].
pub fn project_to_radec(
    frame: &CameraFrame,
    time: DateTime<Utc>,
    min_elevation: Angle,
) -> Grid<Option<Equatorial>> {
    let grid = frame.look_angles().map(|look| match look {
        Some(look) if look.elevation() > min_elevation => {
            Some(look_angle_to_equatorial(look, frame.position(), time))
        }
        _ => None,
    });

    debug!(
        camera = frame.name(),
        %time,
        mapped = grid.iter().filter(|(_, cell)| cell.is_some()).count(),
        "mapped pixels to right ascension and declination"
    );

    grid
}

/// Finds the pixels of `frame` looking closest to each of `looks`.
pub fn pixels_for_look_angles(
    frame: &CameraFrame,
    looks: &[LookAngle],
) -> Result<Correspondence, Error> {
    Ok(AngularNearestNeighbor::new(frame.name(), frame.look_angles())?.find_closest(looks))
}

/// Finds the pixels of `frame` looking closest to each of `targets`.
///
/// Fails if a target coincides with the camera.
pub fn pixels_for_targets(frame: &CameraFrame, targets: &[Wgs84]) -> Result<Correspondence, Error> {
    let looks = targets
        .iter()
        .map(|target| {
            geodetic_to_aer(target, frame.position())
                .look_angle()
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "{}: target {target:?} has no direction from the camera",
                        frame.name()
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    pixels_for_look_angles(frame, &looks)
}
