use crate::error::Error;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Index};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoordinate {
    row: usize,
    col: usize,
}

impl PixelCoordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

impl AsRef<PixelCoordinate> for PixelCoordinate {
    fn as_ref(&self) -> &PixelCoordinate {
        self
    }
}

impl fmt::Display for PixelCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A dense, row-major 2-D grid with one cell per camera pixel.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Wraps `cells`, which must hold exactly `rows * cols` values ordered by row.
    pub fn from_vec(rows: usize, cols: usize, cells: Vec<T>) -> Result<Self, Error> {
        if rows.checked_mul(cols) != Some(cells.len()) {
            return Err(Error::InvalidInput(format!(
                "grid of {rows}x{cols} cannot hold {} cells",
                cells.len()
            )));
        }

        Ok(Self { rows, cols, cells })
    }

    pub fn from_fn(rows: usize, cols: usize, f: impl FnMut(PixelCoordinate) -> T) -> Self {
        let cells = pixels(rows, cols).map(f).collect();
        Self { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains_pixel(&self, pixel: impl AsRef<PixelCoordinate>) -> bool {
        (0..self.rows).contains(&pixel.as_ref().row())
            && (0..self.cols).contains(&pixel.as_ref().col())
    }

    pub fn get(&self, pixel: impl AsRef<PixelCoordinate>) -> Option<&T> {
        match self.contains_pixel(&pixel) {
            true => self
                .cells
                .get(pixel.as_ref().row() * self.cols + pixel.as_ref().col()),
            false => None,
        }
    }

    /// Iterates over every coordinate of the grid in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = PixelCoordinate> + use<T> {
        pixels(self.rows, self.cols)
    }

    /// Iterates over every cell alongside its coordinate in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (PixelCoordinate, &T)> {
        self.pixels().zip(self.cells.iter())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.iter().map(f).collect(),
        }
    }
}

impl<T> Index<PixelCoordinate> for Grid<T> {
    type Output = T;

    fn index(&self, pixel: PixelCoordinate) -> &Self::Output {
        assert!(
            self.contains_pixel(pixel),
            "pixel {pixel} is outside of a {}x{} grid",
            self.rows,
            self.cols
        );
        &self.cells[pixel.row() * self.cols + pixel.col()]
    }
}

fn pixels(rows: usize, cols: usize) -> impl Iterator<Item = PixelCoordinate> {
    (0..rows).flat_map(move |row| (0..cols).map(move |col| PixelCoordinate::new(row, col)))
}
