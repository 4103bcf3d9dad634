// #![warn(missing_docs)]

//! All-Sky Imager Field of View Utilities
//!
//! Registers the field of view of one calibrated all-sky camera onto another
//! and cuts calibrated 1-D slices through magnetic zenith.
//!
//! ```no_run
//! use asifov::prelude::*;
//! use uom::si::{f64::Length, length::kilometer};
//!
//! # fn load() -> (CameraFrame, CameraFrame) { unimplemented!() }
//! let (themis, dasc) = load();
//! let outcome = FovMerger::default().merge(
//!     &themis,
//!     &dasc,
//!     Length::new::<kilometer>(110.),
//!     MaskPolicy::MagneticZenithSlice,
//! )?;
//!
//! let columns: Vec<usize> = (50..themis.cols() - 75).collect();
//! let slice = outcome.reference.extract_slice(&SliceExtractor::default(), &columns)?;
//! println!("magnetic zenith at cut index {}", slice.magnetic_zenith_index);
//! # Ok::<(), asifov::error::Error>(())
//! ```

#[allow(missing_docs)]
pub mod error;

pub mod bearing;
pub mod camera;
pub mod config;
pub mod fit;
pub mod geodesy;
pub mod grid;
pub mod mask;
pub mod merge;
pub mod nearest;
pub mod projection;
pub mod ray;
pub mod slice;

pub mod prelude {
    pub use crate::{
        bearing::LookAngle,
        camera::{CameraFrame, MagneticField, PixelIndex},
        config::MergeConfig,
        error::Error,
        geodesy::position,
        grid::{Grid, PixelCoordinate},
        mask::{FovMask, MaskPolicy, select_mask},
        merge::{FovMerger, MergeOutcome, MergeWarning, MergedCamera},
        nearest::{AngularNearestNeighbor, Correspondence, find_closest},
        slice::{SliceCut, SliceExtractor},
    };
}
