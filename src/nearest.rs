//! Brute force nearest neighbor matching of sky directions against a
//! calibration grid.
//!
//! Calibration grids are irregular and the angular metric wraps at the 0/360
//! azimuth seam and degenerates at zenith, so every query is compared with
//! every valid cell. Comparisons use the squared chord between unit vectors,
//! which orders cells exactly like their great circle separation.

use crate::{
    bearing::LookAngle,
    camera::CameraFrame,
    error::Error,
    grid::{Grid, PixelCoordinate},
};
use nalgebra::Vector3;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixel coordinates in a reference grid matched to a sequence of query
/// directions, one entry per query in query order.
///
/// Different queries may map onto the same pixel. Callers that need unique
/// pixels can use [`Correspondence::unique`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correspondence {
    rows: Vec<usize>,
    cols: Vec<usize>,
}

impl Correspondence {
    pub fn from_pixels(pixels: impl IntoIterator<Item = PixelCoordinate>) -> Self {
        let (rows, cols) = pixels.into_iter().map(|px| (px.row(), px.col())).unzip();
        Self { rows, cols }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn pixels(&self) -> impl Iterator<Item = PixelCoordinate> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .map(|(&row, &col)| PixelCoordinate::new(row, col))
    }

    /// Drops repeated pixels, keeping the first occurrence of each.
    pub fn unique(&self) -> Self {
        let mut seen = std::collections::HashSet::new();
        Self::from_pixels(self.pixels().filter(|px| seen.insert(*px)))
    }

    /// Translates every pixel into the calibration's own `(row, col)`
    /// numbering.
    pub fn native_pixels(&self, frame: &CameraFrame) -> Result<Vec<(i64, i64)>, Error> {
        self.pixels()
            .map(|px| {
                frame.native_pixel(px).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "{}: pixel {px} is outside a {}x{} grid",
                        frame.name(),
                        frame.rows(),
                        frame.cols()
                    ))
                })
            })
            .collect()
    }
}

/// Index over the valid cells of a calibration grid.
pub struct AngularNearestNeighbor {
    shape: (usize, usize),
    cells: Vec<(PixelCoordinate, Vector3<f64>)>,
}

impl AngularNearestNeighbor {
    /// Collects every valid cell of `grid`.
    ///
    /// Returns [`Error::EmptyReferenceGrid`] if no cell is valid. `label`
    /// names the grid in that error.
    pub fn new(label: &str, grid: &Grid<Option<LookAngle>>) -> Result<Self, Error> {
        let cells: Vec<_> = grid
            .iter()
            .filter_map(|(px, look)| look.map(|look| (px, look.unit_vector())))
            .collect();

        if cells.is_empty() {
            return Err(Error::EmptyReferenceGrid {
                label: label.to_string(),
                rows: grid.rows(),
                cols: grid.cols(),
            });
        }

        Ok(Self {
            shape: grid.shape(),
            cells,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Number of valid cells that queries are matched against.
    pub fn candidates(&self) -> usize {
        self.cells.len()
    }

    /// Returns the valid cell closest to `query`. Ties resolve to the first
    /// cell in row-major order.
    pub fn closest(&self, query: &LookAngle) -> PixelCoordinate {
        let target = query.unit_vector();
        let mut best = self.cells[0].0;
        let mut best_distance = f64::INFINITY;
        for (px, unit) in &self.cells {
            let distance = (unit - target).norm_squared();
            if distance < best_distance {
                best = *px;
                best_distance = distance;
            }
        }

        best
    }

    /// Matches every query independently, in parallel.
    pub fn find_closest(&self, queries: &[LookAngle]) -> Correspondence {
        let pixels: Vec<PixelCoordinate> = queries.par_iter().map(|q| self.closest(q)).collect();
        Correspondence::from_pixels(pixels)
    }
}

/// Finds, for each query, the valid cell of `reference` with the smallest
/// angular separation.
pub fn find_closest(
    reference: &Grid<Option<LookAngle>>,
    queries: &[LookAngle],
) -> Result<Correspondence, Error> {
    Ok(AngularNearestNeighbor::new("reference", reference)?.find_closest(queries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use rstest::rstest;

    fn look(az: f64, el: f64) -> LookAngle {
        LookAngle::from_degrees(az, el).unwrap()
    }

    fn grid(rows: usize, cols: usize, cells: Vec<Option<LookAngle>>) -> Grid<Option<LookAngle>> {
        Grid::from_vec(rows, cols, cells).unwrap()
    }

    #[rstest]
    #[case(359.0, 1.5, 0)]
    #[case(358.5, 1.0, 1)]
    #[case(359.5, 1.0, 0)]
    fn azimuth_wraparound(#[case] west: f64, #[case] east: f64, #[case] expected_col: usize) {
        // A naive difference would put the 359 degree cell 359 degrees away.
        let reference = grid(
            1,
            3,
            vec![Some(look(west, 30.)), Some(look(east, 30.)), Some(look(180., 30.))],
        );
        let result = find_closest(&reference, &[look(0., 30.)]).unwrap();

        assert_eq!(result.rows(), &[0]);
        assert_eq!(result.cols(), &[expected_col]);
    }

    #[test]
    fn invalid_cells_are_never_selected() {
        let reference = grid(1, 2, vec![None, Some(look(90., 10.))]);
        let result = find_closest(&reference, &[look(0., 90.)]).unwrap();
        assert_eq!(result.cols(), &[1]);
    }

    #[test]
    fn all_invalid_reference_fails() {
        let reference = grid(2, 2, vec![None; 4]);
        assert!(matches!(
            find_closest(&reference, &[look(0., 45.)]),
            Err(Error::EmptyReferenceGrid { rows: 2, cols: 2, .. })
        ));
    }

    #[test]
    fn duplicates_are_kept_until_requested() {
        let reference = grid(1, 2, vec![Some(look(0., 45.)), Some(look(180., 45.))]);
        let queries = [look(1., 45.), look(359., 44.), look(170., 40.)];
        let result = find_closest(&reference, &queries).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.cols(), &[0, 0, 1]);
        assert_eq!(result.unique().cols(), &[0, 1]);
    }

    #[test]
    fn native_pixels_follow_the_calibration_numbering() {
        use crate::{camera::PixelIndex, geodesy::position};

        let frame = CameraFrame::new(
            "gako",
            grid(2, 2, vec![Some(look(0., 45.)); 4]),
            position(62.407, -145.16, 600.).unwrap(),
        )
        .with_pixel_index(
            PixelIndex::new(
                Grid::from_fn(2, 2, |px| 10 + px.row() as i64),
                Grid::from_fn(2, 2, |px| 20 + px.col() as i64),
            )
            .unwrap(),
        )
        .unwrap();

        let matched =
            Correspondence::from_pixels([PixelCoordinate::new(1, 0), PixelCoordinate::new(0, 1)]);
        assert_eq!(matched.native_pixels(&frame).unwrap(), vec![(11, 20), (10, 21)]);

        let outside = Correspondence::from_pixels([PixelCoordinate::new(2, 0)]);
        assert!(matches!(outside.native_pixels(&frame), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn ties_resolve_in_row_major_order() {
        let reference = grid(2, 1, vec![Some(look(10., 45.)), Some(look(10., 45.))]);
        let result = find_closest(&reference, &[look(10., 45.)]).unwrap();
        assert_eq!(result.rows(), &[0]);
    }

    #[quickcheck]
    fn exact_cell_is_its_own_neighbor(seed: Vec<(u16, u8)>) -> bool {
        // Cells spread over distinct azimuths so each is unique.
        let cells: Vec<_> = seed
            .iter()
            .enumerate()
            .take(64)
            .map(|(i, (_, el))| Some(look(i as f64 * 5.5, *el as f64 * 89. / u8::MAX as f64)))
            .collect();
        if cells.is_empty() {
            return true;
        }

        let n = cells.len();
        let reference = grid(1, n, cells.clone());
        let queries: Vec<_> = cells.iter().flatten().copied().collect();
        let result = find_closest(&reference, &queries).unwrap();

        result.cols() == (0..n).collect::<Vec<_>>().as_slice()
    }
}
