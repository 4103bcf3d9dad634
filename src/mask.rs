use crate::{
    bearing::LookAngle,
    camera::CameraFrame,
    error::Error,
    grid::{Grid, PixelCoordinate},
    ray::MagneticZenithRay,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::debug;
use uom::{ConstZero, si::f64::Angle};

/// How pixels of interest are chosen from a camera's field of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MaskPolicy {
    /// The outermost rows and columns of the sensor.
    Rectangular,

    /// The outer contour of the valid, above-horizon part of the field of
    /// view. Suited to fisheye optics whose image is a disc.
    Perimeter,

    /// Every valid pixel above a minimum elevation. Also produces the
    /// camera's magnetic zenith ray.
    MagneticZenithSlice,
}

impl fmt::Display for MaskPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskPolicy::Rectangular => write!(f, "rect"),
            MaskPolicy::Perimeter => write!(f, "perimeter"),
            MaskPolicy::MagneticZenithSlice => write!(f, "mzslice"),
        }
    }
}

impl FromStr for MaskPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rect" | "rectangular" => Ok(MaskPolicy::Rectangular),
            "perimeter" => Ok(MaskPolicy::Perimeter),
            "mzslice" => Ok(MaskPolicy::MagneticZenithSlice),
            _ => Err(Error::InvalidInput(format!("unknown mask policy `{s}`"))),
        }
    }
}

/// Boolean selection over a camera's pixel grid.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FovMask {
    cells: Grid<bool>,
}

impl FovMask {
    pub fn new(cells: Grid<bool>) -> Self {
        Self { cells }
    }

    pub fn rows(&self) -> usize {
        self.cells.rows()
    }

    pub fn cols(&self) -> usize {
        self.cells.cols()
    }

    pub fn contains(&self, pixel: PixelCoordinate) -> bool {
        self.cells.get(pixel).copied().unwrap_or(false)
    }

    /// Number of selected pixels.
    pub fn count(&self) -> usize {
        self.cells.as_slice().iter().filter(|&&selected| selected).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Iterates over the selected pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = PixelCoordinate> + '_ {
        self.cells
            .iter()
            .filter_map(|(px, &selected)| selected.then_some(px))
    }

    pub fn as_grid(&self) -> &Grid<bool> {
        &self.cells
    }
}

/// Renders selected pixels as `#` and the rest as `.`, one line per row.
impl fmt::Display for FovMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows() {
            if row > 0 {
                writeln!(f)?;
            }
            for col in 0..self.cols() {
                let symbol = match self.contains(PixelCoordinate::new(row, col)) {
                    true => '#',
                    false => '.',
                };
                write!(f, "{symbol}")?;
            }
        }

        Ok(())
    }
}

/// Result of applying a [`MaskPolicy`] to a camera.
#[derive(Clone, Debug)]
pub struct MaskSelection {
    pub mask: FovMask,

    /// Only produced by [`MaskPolicy::MagneticZenithSlice`].
    pub zenith_ray: Option<MagneticZenithRay>,
}

/// Selects the pixels of `frame` that `policy` considers of interest.
///
/// `min_elevation` is only used by [`MaskPolicy::MagneticZenithSlice`].
/// Fails with [`Error::NoFovOverlap`] if nothing is selected.
pub fn select_mask(
    frame: &CameraFrame,
    policy: MaskPolicy,
    min_elevation: Angle,
) -> Result<MaskSelection, Error> {
    let (mask, zenith_ray) = match policy {
        MaskPolicy::Rectangular => (rectangular(frame.rows(), frame.cols()), None),
        MaskPolicy::Perimeter => (perimeter(frame), None),
        MaskPolicy::MagneticZenithSlice => {
            let mask = FovMask::new(frame.look_angles().map(|look| {
                look.is_some_and(|look| look.elevation() > min_elevation)
            }));
            (mask, Some(zenith_ray(frame)?))
        }
    };

    debug!(
        camera = frame.name(),
        %policy,
        selected = mask.count(),
        "selected pixel mask"
    );

    if mask.is_empty() {
        return Err(Error::NoFovOverlap {
            camera: frame.name().to_string(),
            policy,
        });
    }

    Ok(MaskSelection { mask, zenith_ray })
}

fn rectangular(rows: usize, cols: usize) -> FovMask {
    FovMask::new(Grid::from_fn(rows, cols, |px| {
        px.row() == 0 || px.col() == 0 || px.row() + 1 == rows || px.col() + 1 == cols
    }))
}

/// A pixel is on the perimeter if it looks above the horizon and at least one
/// of its four neighbors does not, or lies off the sensor.
fn perimeter(frame: &CameraFrame) -> FovMask {
    let in_sky = |px: PixelCoordinate| {
        frame
            .look_angle(px)
            .is_some_and(|look: LookAngle| look.elevation() > Angle::ZERO)
    };

    FovMask::new(Grid::from_fn(frame.rows(), frame.cols(), |px| {
        if !in_sky(px) {
            return false;
        }

        let up = px.row().checked_sub(1).map(|row| PixelCoordinate::new(row, px.col()));
        let left = px.col().checked_sub(1).map(|col| PixelCoordinate::new(px.row(), col));
        let down = Some(PixelCoordinate::new(px.row() + 1, px.col()));
        let right = Some(PixelCoordinate::new(px.row(), px.col() + 1));

        [up, down, left, right]
            .into_iter()
            .any(|neighbor| !neighbor.is_some_and(in_sky))
    }))
}

fn zenith_ray(frame: &CameraFrame) -> Result<MagneticZenithRay, Error> {
    let policy = MaskPolicy::MagneticZenithSlice;
    let field = frame.magnetic_field().ok_or_else(|| Error::MissingMetadata {
        camera: frame.name().to_string(),
        field: "magnetic field",
        policy,
    })?;
    let ranges = frame
        .slant_range_samples()
        .ok_or_else(|| Error::MissingMetadata {
            camera: frame.name().to_string(),
            field: "slant range samples",
            policy,
        })?;

    MagneticZenithRay::new(frame.position(), field.zenith(), ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{camera::MagneticField, config::MZSLICE_MIN_ELEVATION_DEG, geodesy::position};
    use rstest::rstest;
    use uom::si::{angle::degree, f64::Length, length::kilometer};

    fn min_el() -> Angle {
        Angle::new::<degree>(MZSLICE_MIN_ELEVATION_DEG)
    }

    fn uniform(rows: usize, cols: usize) -> CameraFrame {
        let n = rows * cols;
        let az: Vec<f64> = (0..n).map(|i| (i * 7 % 360) as f64).collect();
        let at = position(65., -147., 0.).unwrap();
        CameraFrame::from_degrees("uniform", rows, cols, &az, &vec![45.; n], at).unwrap()
    }

    /// A disc shaped field of view of radius 3 centered in a 7x7 sensor.
    fn fisheye() -> CameraFrame {
        let (rows, cols) = (7, 7);
        let mut az = Vec::new();
        let mut el = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                let (dr, dc) = (row as f64 - 3., col as f64 - 3.);
                let radius = dr.hypot(dc);
                if radius <= 3. {
                    az.push(dc.atan2(-dr).to_degrees().rem_euclid(360.));
                    el.push(90. - radius * 25.);
                } else {
                    az.push(f64::NAN);
                    el.push(f64::NAN);
                }
            }
        }

        let at = position(65., -147., 0.).unwrap();
        CameraFrame::from_degrees("fisheye", rows, cols, &az, &el, at).unwrap()
    }

    #[rstest]
    #[case(2, 2)]
    #[case(5, 5)]
    #[case(3, 8)]
    #[case(256, 256)]
    fn rectangular_border_count(#[case] rows: usize, #[case] cols: usize) {
        let selection =
            select_mask(&uniform(rows, cols), MaskPolicy::Rectangular, min_el()).unwrap();
        assert_eq!(selection.mask.count(), 2 * rows + 2 * cols - 4);
        assert!(selection.zenith_ray.is_none());
    }

    #[rstest]
    #[case(2, 2)]
    #[case(5, 5)]
    #[case(3, 8)]
    fn perimeter_of_full_grid_is_the_border(#[case] rows: usize, #[case] cols: usize) {
        let frame = uniform(rows, cols);
        assert_eq!(
            select_mask(&frame, MaskPolicy::Perimeter, min_el()).unwrap().mask,
            select_mask(&frame, MaskPolicy::Rectangular, min_el()).unwrap().mask,
        );
    }

    #[test]
    fn perimeter_of_fisheye_disc() {
        let selection = select_mask(&fisheye(), MaskPolicy::Perimeter, min_el()).unwrap();
        insta::assert_snapshot!(selection.mask.to_string(), @r"
        ...#...
        .##.##.
        .#...#.
        #.....#
        .#...#.
        .##.##.
        ...#...
        ");
    }

    #[test]
    fn perimeter_of_invalid_grid_fails() {
        let frame = CameraFrame::from_degrees(
            "dark",
            2,
            2,
            &[f64::NAN; 4],
            &[f64::NAN; 4],
            position(65., -147., 0.).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            select_mask(&frame, MaskPolicy::Perimeter, min_el()),
            Err(Error::NoFovOverlap { policy: MaskPolicy::Perimeter, .. })
        ));
    }

    #[test]
    fn mzslice_requires_magnetic_field() {
        assert!(matches!(
            select_mask(&fisheye(), MaskPolicy::MagneticZenithSlice, min_el()),
            Err(Error::MissingMetadata { field: "magnetic field", .. })
        ));
    }

    #[test]
    fn mzslice_drops_low_elevations() {
        let frame = fisheye()
            .with_magnetic_field(MagneticField::from_degrees(21.145, 77.464).unwrap())
            .with_slant_range_samples(vec![
                Length::new::<kilometer>(100.),
                Length::new::<kilometer>(200.),
            ])
            .unwrap();

        let selection = select_mask(&frame, MaskPolicy::MagneticZenithSlice, min_el()).unwrap();
        // The rim of the disc sits at 15 degrees and the center at zenith.
        assert_eq!(selection.mask.count(), 29);
        assert_eq!(selection.zenith_ray.map(|ray| ray.len()), Some(2));

        assert!(matches!(
            select_mask(&frame, MaskPolicy::MagneticZenithSlice, Angle::new::<degree>(90.)),
            Err(Error::NoFovOverlap { .. })
        ));
    }

    #[rstest]
    #[case("rect", MaskPolicy::Rectangular)]
    #[case("perimeter", MaskPolicy::Perimeter)]
    #[case("MZslice", MaskPolicy::MagneticZenithSlice)]
    fn policy_from_str(#[case] text: &str, #[case] policy: MaskPolicy) {
        assert_eq!(text.parse::<MaskPolicy>().unwrap(), policy);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(matches!("circle".parse::<MaskPolicy>(), Err(Error::InvalidInput(_))));
    }
}
