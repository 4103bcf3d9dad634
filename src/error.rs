use crate::{grid::PixelCoordinate, mask::MaskPolicy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{camera}: missing {field}, required by the {policy} policy")]
    MissingMetadata {
        camera: String,
        field: &'static str,
        policy: MaskPolicy,
    },

    #[error("{label}: reference grid ({rows}x{cols}) has no valid cells to match against")]
    EmptyReferenceGrid {
        label: String,
        rows: usize,
        cols: usize,
    },

    #[error("{camera}: the {policy} policy selected no usable pixels")]
    NoFovOverlap { camera: String, policy: MaskPolicy },

    #[error("{camera}: geometry violation at pixel {pixel}: {detail}")]
    GeometryViolation {
        camera: String,
        pixel: PixelCoordinate,
        detail: String,
    },

    #[error("{camera}: impossible least squares fit for 1-D cut: {detail}")]
    DegenerateCutFit { camera: String, detail: String },

    #[error("{camera}: cut pixel {pixel} lies outside the calibrated field of view")]
    CutOutsideFov {
        camera: String,
        pixel: PixelCoordinate,
    },
}
