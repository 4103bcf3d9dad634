//! Geodetic, local tangent plane and topocentric conversions on the WGS84
//! ellipsoid.
//!
//! Only the conversions needed to move camera lines of sight between
//! observers are provided: geodetic ↔ ECEF, ECEF/geodetic → ENU, ENU ↔ AER
//! and AER → ECEF/geodetic. Frame changes go through [`sguaba`]; the inverse
//! ECEF → geodetic conversion is iterated here because projected points
//! routinely sit hundreds of kilometers up.

use crate::{bearing::LookAngle, error::Error};
use sguaba::{
    Bearing, Coordinate,
    math::RigidBodyTransform,
    system,
    systems::{Ecef, Wgs84},
};
use uom::si::{
    angle::{degree, radian},
    f64::{Angle, Length},
    length::meter,
};

/// WGS84 semi-major axis in meters.
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// WGS84 flattening.
const FLATTENING: f64 = 1.0 / 298.257_223_563;
/// IUGG mean earth radius in meters, used by the spherical fallback.
const MEAN_RADIUS: f64 = 6_371_008.8;

fn semi_minor_axis() -> f64 {
    SEMI_MAJOR_AXIS * (1. - FLATTENING)
}

fn eccentricity_squared() -> f64 {
    FLATTENING * (2. - FLATTENING)
}

/// Builds a [`Wgs84`] position from degrees and meters.
///
/// Returns an error if any value is not finite or if `latitude` is not
/// between -90 and 90.
pub fn position(latitude: f64, longitude: f64, altitude: f64) -> Result<Wgs84, Error> {
    if !(latitude.is_finite() && longitude.is_finite() && altitude.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "position ({latitude}, {longitude}, {altitude}) is not finite"
        )));
    }

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::InvalidInput(format!(
            "latitude {latitude} is not between -90 and 90"
        )));
    }

    Ok(Wgs84::builder()
        .latitude(Angle::new::<degree>(latitude))
        .expect("latitude is between -90 and 90")
        .longitude(Angle::new::<degree>(wrap_longitude(longitude)))
        .altitude(Length::new::<meter>(altitude))
        .build())
}

fn wrap_longitude(longitude: f64) -> f64 {
    let wrapped = (longitude + 180.).rem_euclid(360.) - 180.;
    match wrapped < -180. {
        true => wrapped + 360.,
        false => wrapped,
    }
}

system!(
    /// East, north, up frame centered on whichever observer a conversion
    /// was asked about.
    pub struct LocalEnu using ENU
);

/// Earth centered, earth fixed cartesian coordinate.
pub type EcefPoint = Coordinate<Ecef>;

/// Local tangent plane coordinate centered on an observer.
pub type Enu = Coordinate<LocalEnu>;

/// Topocentric azimuth, elevation and slant range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aer {
    pub azimuth: Angle,
    pub elevation: Angle,
    pub range: Length,
}

impl Aer {
    /// Returns the direction part of `self`, if it is a valid sky direction.
    /// A zero range has no direction.
    pub fn look_angle(&self) -> Option<LookAngle> {
        match self.range.get::<meter>() > 0. {
            true => LookAngle::new(self.azimuth, self.elevation),
            false => None,
        }
    }
}

fn enu_frame(origin: &Wgs84) -> RigidBodyTransform<Ecef, LocalEnu> {
    // SAFETY: every LocalEnu value produced or consumed with this transform
    // is relative to `origin`.
    unsafe { RigidBodyTransform::ecef_to_enu_at(origin) }
}

pub fn geodetic_to_ecef(position: &Wgs84) -> EcefPoint {
    Coordinate::<Ecef>::from_wgs84(position)
}

/// Converts an ECEF point to geodetic coordinates by fixed point iteration on
/// the latitude.
///
/// Unlike [`Coordinate::to_wgs84`], this accepts points at any altitude.
pub fn ecef_to_geodetic(point: &EcefPoint) -> Wgs84 {
    let [x, y, z] = point.to_cartesian().map(|c| c.get::<meter>());
    let e2 = eccentricity_squared();
    let p = x.hypot(y);
    let lon = y.atan2(x);

    let (lat, alt) = if p < 1e-9 {
        // On the polar axis.
        (z.signum() * std::f64::consts::FRAC_PI_2, z.abs() - semi_minor_axis())
    } else {
        let mut lat = z.atan2(p * (1. - e2));
        for _ in 0..50 {
            let sin_lat = lat.sin();
            let n = SEMI_MAJOR_AXIS / (1. - e2 * sin_lat * sin_lat).sqrt();
            let alt = p * lat.cos() + z * sin_lat - SEMI_MAJOR_AXIS * SEMI_MAJOR_AXIS / n;
            let next = z.atan2(p * (1. - e2 * n / (n + alt)));
            let done = (next - lat).abs() < 1e-14;
            lat = next;
            if done {
                break;
            }
        }
        let sin_lat = lat.sin();
        let n = SEMI_MAJOR_AXIS / (1. - e2 * sin_lat * sin_lat).sqrt();
        (lat, p * lat.cos() + z * sin_lat - SEMI_MAJOR_AXIS * SEMI_MAJOR_AXIS / n)
    };

    Wgs84::builder()
        .latitude(Angle::new::<radian>(lat))
        .expect("atan2 keeps latitude between -90 and 90")
        .longitude(Angle::new::<radian>(lon))
        .altitude(Length::new::<meter>(alt))
        .build()
}

pub fn ecef_to_enu(point: &EcefPoint, origin: &Wgs84) -> Enu {
    enu_frame(origin).transform(*point)
}

pub fn enu_to_ecef(enu: &Enu, origin: &Wgs84) -> EcefPoint {
    enu_frame(origin).inverse_transform(*enu)
}

/// Position of `target` in the local tangent plane centered at `origin`.
pub fn geodetic_to_enu(target: &Wgs84, origin: &Wgs84) -> Enu {
    ecef_to_enu(&geodetic_to_ecef(target), origin)
}

/// Converts a topocentric direction and slant range into ENU.
///
/// Returns an error if the range is negative, the elevation is outside
/// [-90°, 90°] or any input is not finite.
pub fn aer_to_enu(aer: &Aer) -> Result<Enu, Error> {
    let invalid = || {
        Error::InvalidInput(format!(
            "cannot convert azimuth {}°, elevation {}°, range {} m to ENU",
            aer.azimuth.get::<degree>(),
            aer.elevation.get::<degree>(),
            aer.range.get::<meter>(),
        ))
    };

    let range = aer.range.get::<meter>();
    let finite = range.is_finite() && aer.azimuth.is_finite() && aer.elevation.is_finite();
    if !finite || range < 0. || aer.elevation.get::<degree>().abs() > 90. {
        return Err(invalid());
    }

    let bearing = Bearing::<LocalEnu>::builder()
        .azimuth(aer.azimuth)
        .elevation(aer.elevation)
        .ok_or_else(invalid)?
        .build();
    Ok(Coordinate::<LocalEnu>::from_bearing(bearing, aer.range))
}

/// Converts an ENU position into azimuth, elevation and slant range.
///
/// The origin itself comes back with zero azimuth, elevation and range.
pub fn enu_to_aer(enu: &Enu) -> Aer {
    let e = enu.enu_east().get::<meter>();
    let n = enu.enu_north().get::<meter>();
    let u = enu.enu_up().get::<meter>();

    let horizontal = e.hypot(n);
    Aer {
        azimuth: Angle::new::<radian>(e.atan2(n).rem_euclid(std::f64::consts::TAU)),
        elevation: Angle::new::<radian>(u.atan2(horizontal)),
        range: Length::new::<meter>(horizontal.hypot(u)),
    }
}

/// Direction and range to an ECEF point as seen by `observer`.
pub fn ecef_to_aer(point: &EcefPoint, observer: &Wgs84) -> Aer {
    enu_to_aer(&ecef_to_enu(point, observer))
}

pub fn aer_to_ecef(aer: &Aer, observer: &Wgs84) -> Result<EcefPoint, Error> {
    Ok(enu_to_ecef(&aer_to_enu(aer)?, observer))
}

pub fn aer_to_geodetic(aer: &Aer, observer: &Wgs84) -> Result<Wgs84, Error> {
    Ok(ecef_to_geodetic(&aer_to_ecef(aer, observer)?))
}

/// Direction and range to `target` as seen by `observer`.
pub fn geodetic_to_aer(target: &Wgs84, observer: &Wgs84) -> Aer {
    enu_to_aer(&geodetic_to_enu(target, observer))
}

/// Slant range along `elevation` to a shell `altitude` above the observer,
/// using the flat earth relation `altitude / sin(elevation)`.
///
/// Returns `None` unless `elevation` is above the horizon and at most 90
/// degrees.
pub fn slant_range_to_altitude(altitude: Length, elevation: Angle) -> Option<Length> {
    let el = elevation.get::<degree>();
    if !(el > 0. && el <= 90.) {
        return None;
    }

    Some(altitude / elevation.get::<radian>().sin())
}

/// Geodesic distance between two positions on the WGS84 ellipsoid.
///
/// Uses Vincenty's inverse formula, falling back to a spherical haversine
/// distance for nearly antipodal points where the iteration does not
/// converge. Altitude is ignored.
pub fn geodesic_distance(a: &Wgs84, b: &Wgs84) -> Length {
    let lat1 = a.latitude().get::<radian>();
    let lat2 = b.latitude().get::<radian>();
    let delta_lon = (b.longitude() - a.longitude()).get::<radian>();

    let meters = vincenty_inverse(lat1, lat2, delta_lon)
        .unwrap_or_else(|| haversine_distance(lat1, lat2, delta_lon));
    Length::new::<meter>(meters)
}

fn vincenty_inverse(lat1: f64, lat2: f64, delta_lon: f64) -> Option<f64> {
    let a = SEMI_MAJOR_AXIS;
    let b = semi_minor_axis();
    let f = FLATTENING;

    let u1 = ((1. - f) * lat1.tan()).atan();
    let u2 = ((1. - f) * lat2.tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = delta_lon;
    for _ in 0..200 {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0. {
            // Coincident points.
            return Some(0.);
        }

        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos2_alpha = 1. - sin_alpha * sin_alpha;
        let cos_2sigma_m = match cos2_alpha == 0. {
            // Both points on the equator.
            true => 0.,
            false => cos_sigma - 2. * sin_u1 * sin_u2 / cos2_alpha,
        };
        let c = f / 16. * cos2_alpha * (4. + f * (4. - 3. * cos2_alpha));

        let previous = lambda;
        lambda = delta_lon
            + (1. - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1. + 2. * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < 1e-12 {
            let u_sq = cos2_alpha * (a * a - b * b) / (b * b);
            let big_a =
                1. + u_sq / 16384. * (4096. + u_sq * (-768. + u_sq * (320. - 175. * u_sq)));
            let big_b = u_sq / 1024. * (256. + u_sq * (-128. + u_sq * (74. - 47. * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.
                        * (cos_sigma * (-1. + 2. * cos_2sigma_m.powi(2))
                            - big_b / 6.
                                * cos_2sigma_m
                                * (-3. + 4. * sin_sigma.powi(2))
                                * (-3. + 4. * cos_2sigma_m.powi(2))));

            return Some(b * big_a * (sigma - delta_sigma));
        }
    }

    None
}

fn haversine_distance(lat1: f64, lat2: f64, delta_lon: f64) -> f64 {
    let hav = ((lat2 - lat1) / 2.).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.).sin().powi(2);
    2. * MEAN_RADIUS * hav.clamp(0., 1.).sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use quickcheck::quickcheck;
    use rstest::rstest;
    use uom::si::length::kilometer;

    fn poker_flat() -> Wgs84 {
        position(65.126, -147.479, 200.).unwrap()
    }

    fn aer(azimuth: f64, elevation: f64, range: f64) -> Aer {
        Aer {
            azimuth: Angle::new::<degree>(azimuth),
            elevation: Angle::new::<degree>(elevation),
            range: Length::new::<meter>(range),
        }
    }

    #[rstest]
    #[case(90.5, 0., 0.)]
    #[case(f64::NAN, 0., 0.)]
    #[case(0., 0., f64::INFINITY)]
    fn invalid_position(#[case] lat: f64, #[case] lon: f64, #[case] alt: f64) {
        assert!(matches!(position(lat, lon, alt), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn ecef_of_equator_prime_meridian() {
        let point = geodetic_to_ecef(&position(0., 0., 0.).unwrap());
        assert_abs_diff_eq!(point.x().get::<meter>(), SEMI_MAJOR_AXIS, epsilon = 1e-6);
        assert_abs_diff_eq!(point.y().get::<meter>(), 0., epsilon = 1e-6);
        assert_abs_diff_eq!(point.z().get::<meter>(), 0., epsilon = 1e-6);
    }

    #[rstest]
    #[case(65.126, -147.479, 200.)]
    #[case(-33.0, 151.0, 0.)]
    #[case(0.0, 179.9, 110e3)]
    #[case(89.999, 10.0, 1e6)]
    fn geodetic_ecef_roundtrip(#[case] lat: f64, #[case] lon: f64, #[case] alt: f64) {
        let pos = position(lat, lon, alt).unwrap();
        let back = ecef_to_geodetic(&geodetic_to_ecef(&pos));

        assert_abs_diff_eq!(back.latitude().get::<degree>(), lat, epsilon = 1e-9);
        assert_abs_diff_eq!(back.longitude().get::<degree>(), lon, epsilon = 1e-9);
        assert_abs_diff_eq!(back.altitude().get::<meter>(), alt, epsilon = 1e-4);
    }

    #[test]
    fn enu_of_point_straight_up() {
        let origin = poker_flat();
        let above = position(65.126, -147.479, 110e3 + 200.).unwrap();
        let enu = geodetic_to_enu(&above, &origin);

        assert_abs_diff_eq!(enu.enu_east().get::<meter>(), 0., epsilon = 1e-6);
        assert_abs_diff_eq!(enu.enu_north().get::<meter>(), 0., epsilon = 1e-6);
        assert_abs_diff_eq!(enu.enu_up().get::<meter>(), 110e3, epsilon = 1e-6);
    }

    #[rstest]
    #[case(10., 10., -1.)]
    #[case(10., 90.5, 1.)]
    #[case(f64::NAN, 10., 1.)]
    fn aer_to_enu_rejects_invalid_input(#[case] az: f64, #[case] el: f64, #[case] range: f64) {
        assert!(matches!(aer_to_enu(&aer(az, el, range)), Err(Error::InvalidInput(_))));
    }

    #[rstest]
    #[case(0., 90., 1000.)]
    #[case(90., 0., 1000.)]
    #[case(45., 45., 1000.)]
    fn aer_to_enu_known_values(#[case] az: f64, #[case] el: f64, #[case] range: f64) {
        let enu = aer_to_enu(&aer(az, el, range)).unwrap();
        let (sin_el, cos_el) = el.to_radians().sin_cos();
        let (sin_az, cos_az) = az.to_radians().sin_cos();

        let east = range * cos_el * sin_az;
        let north = range * cos_el * cos_az;
        assert_abs_diff_eq!(enu.enu_east().get::<meter>(), east, epsilon = 1e-9);
        assert_abs_diff_eq!(enu.enu_north().get::<meter>(), north, epsilon = 1e-9);
        assert_abs_diff_eq!(enu.enu_up().get::<meter>(), range * sin_el, epsilon = 1e-9);
    }

    #[rstest]
    #[case(0.02, 45., 2.)]
    #[case(30., 45., 5e-4)]
    #[case(10., 89.99, 5.)]
    #[case(359.9, 0.5, 0.01)]
    fn short_ranges_keep_their_direction(#[case] az: f64, #[case] el: f64, #[case] range: f64) {
        let back = enu_to_aer(&aer_to_enu(&aer(az, el, range)).unwrap());

        assert_abs_diff_eq!(back.azimuth.get::<degree>(), az, epsilon = 1e-6);
        assert_abs_diff_eq!(back.elevation.get::<degree>(), el, epsilon = 1e-6);
        assert_abs_diff_eq!(back.range.get::<meter>(), range, epsilon = 1e-12);
    }

    #[test]
    fn origin_has_no_direction() {
        let origin = enu_to_aer(&Enu::origin());
        assert_eq!(origin.range.get::<meter>(), 0.);
        assert_eq!(origin.look_angle(), None);
    }

    quickcheck! {
        fn aer_enu_roundtrip(az_seed: u16, el_seed: u16, range_seed: u32) -> bool {
            // Azimuth on [0, 360), elevation on (0, 90], range on (1, ~4.3e6] m.
            let az = az_seed as f64 * 360. / (u16::MAX as f64 + 1.);
            let el = (el_seed as f64 + 1.) * 90. / (u16::MAX as f64 + 1.);
            let range = 1. + range_seed as f64 / 1000.;

            let back = enu_to_aer(&aer_to_enu(&aer(az, el, range)).unwrap());

            // Azimuth is undefined straight up.
            let az_ok = el > 89.9999
                || LookAngle::from_degrees(az, 0.).unwrap()
                    .separation(&LookAngle::from_degrees(back.azimuth.get::<degree>(), 0.).unwrap())
                    .get::<degree>() < 1e-6;

            az_ok
                && (back.elevation.get::<degree>() - el).abs() < 1e-6
                && (back.range.get::<meter>() - range).abs() < 1e-3
        }
    }

    #[test]
    fn ecef_to_aer_inverts_aer_to_ecef() {
        let observer = poker_flat();
        let target = aer_to_ecef(&aer(21.145, 77.464, 250e3), &observer).unwrap();
        let back = ecef_to_aer(&target, &observer);

        assert_abs_diff_eq!(back.azimuth.get::<degree>(), 21.145, epsilon = 1e-9);
        assert_abs_diff_eq!(back.elevation.get::<degree>(), 77.464, epsilon = 1e-9);
        assert_abs_diff_eq!(back.range.get::<meter>(), 250e3, epsilon = 1e-6);
    }

    #[test]
    fn iterative_inverse_agrees_with_sguaba_below_fifty_kilometers() {
        // sguaba only converts ECEF back to WGS84 up to 50 km.
        let observer = poker_flat();
        let target = aer_to_ecef(&aer(60., 30., 60e3), &observer).unwrap();

        let theirs = target.to_wgs84();
        let ours = ecef_to_geodetic(&target);
        assert_abs_diff_eq!(
            ours.latitude().get::<degree>(),
            theirs.latitude().get::<degree>(),
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(
            ours.longitude().get::<degree>(),
            theirs.longitude().get::<degree>(),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            ours.altitude().get::<meter>(),
            theirs.altitude().get::<meter>(),
            epsilon = 1e-3
        );

        let seen = geodetic_to_aer(&theirs, &observer);
        assert_abs_diff_eq!(seen.azimuth.get::<degree>(), 60., epsilon = 1e-6);
        assert_abs_diff_eq!(seen.elevation.get::<degree>(), 30., epsilon = 1e-6);
        assert_abs_diff_eq!(seen.range.get::<kilometer>(), 60., epsilon = 1e-6);
    }

    #[test]
    fn iterative_inverse_handles_auroral_altitudes() {
        let observer = poker_flat();
        let target = aer_to_geodetic(&aer(21.145, 77.464, 250e3), &observer).unwrap();
        assert!((240e3..250e3).contains(&target.altitude().get::<meter>()));

        let back = geodetic_to_aer(&target, &observer);
        assert_abs_diff_eq!(back.elevation.get::<degree>(), 77.464, epsilon = 1e-6);
        assert_abs_diff_eq!(back.range.get::<kilometer>(), 250., epsilon = 1e-6);
    }

    #[rstest]
    #[case(90., 110.)]
    #[case(45., 110. * std::f64::consts::SQRT_2)]
    #[case(30., 220.)]
    fn slant_range_known_values(#[case] elevation: f64, #[case] expected_km: f64) {
        let altitude = Length::new::<kilometer>(110.);
        let range = slant_range_to_altitude(altitude, Angle::new::<degree>(elevation)).unwrap();
        assert_abs_diff_eq!(range.get::<kilometer>(), expected_km, epsilon = 1e-9);
    }

    #[rstest]
    #[case(0.)]
    #[case(-5.)]
    #[case(f64::NAN)]
    fn slant_range_below_horizon(#[case] elevation: f64) {
        let altitude = Length::new::<kilometer>(110.);
        assert_eq!(slant_range_to_altitude(altitude, Angle::new::<degree>(elevation)), None);
    }

    #[test]
    fn vincenty_reference_distance() {
        // Flinders Peak to Buninyong, the classic Vincenty test geodesic.
        let flinders = position(-37.951_033_42, 144.424_867_89, 0.).unwrap();
        let buninyong = position(-37.652_821_14, 143.926_495_53, 0.).unwrap();
        assert_abs_diff_eq!(
            geodesic_distance(&flinders, &buninyong).get::<meter>(),
            54_972.271,
            epsilon = 5e-2
        );
    }

    #[test]
    fn distance_to_self_is_zero() {
        let pos = poker_flat();
        assert_eq!(geodesic_distance(&pos, &pos).get::<meter>(), 0.);
    }

    #[test]
    fn antipodal_distance_falls_back() {
        let a = position(0., 0., 0.).unwrap();
        let b = position(0.5, 179.7, 0.).unwrap();
        let distance = geodesic_distance(&a, &b).get::<kilometer>();
        assert!(distance.is_finite());
        assert!((19_900.0..20_100.0).contains(&distance));
    }
}
