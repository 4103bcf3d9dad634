//! Registration of one camera's field of view onto another.
//!
//! The `rect` and `perimeter` policies project the chosen pixels of the other
//! camera onto a shell at the projection altitude and find where those points
//! land in the reference camera. The `mzslice` policy instead views each
//! camera's magnetic zenith ray from the other camera, giving every camera the
//! pixels that lie in the plane through both cameras and the magnetic zenith.

use crate::{
    bearing::LookAngle,
    camera::CameraFrame,
    config::MergeConfig,
    error::Error,
    geodesy::{Aer, aer_to_ecef, ecef_to_aer, geodesic_distance, slant_range_to_altitude},
    grid::PixelCoordinate,
    mask::{FovMask, MaskPolicy, MaskSelection, select_mask},
    nearest::{AngularNearestNeighbor, Correspondence},
    ray::MagneticZenithRay,
    slice::{SliceCut, SliceExtractor},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uom::{
    ConstZero,
    si::{
        angle::degree,
        f64::{Angle, Length},
        length::meter,
    },
};

/// Suspicious but recoverable merge inputs.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MergeWarning {
    #[error(
        "projection altitude is {altitude_m} m, below {threshold_m} m; was it given in kilometers?"
    )]
    SuspiciousProjectionAltitude { altitude_m: f64, threshold_m: f64 },
}

/// A camera together with everything a merge derived for it.
#[derive(Clone, Debug)]
pub struct MergedCamera<'a> {
    frame: &'a CameraFrame,
    mask: Option<FovMask>,
    correspondence: Option<Correspondence>,
    queries: Option<Vec<LookAngle>>,
    magnetic_zenith_pixel: Option<PixelCoordinate>,
}

impl<'a> MergedCamera<'a> {
    fn new(frame: &'a CameraFrame) -> Self {
        Self {
            frame,
            mask: None,
            correspondence: None,
            queries: None,
            magnetic_zenith_pixel: None,
        }
    }

    pub fn frame(&self) -> &'a CameraFrame {
        self.frame
    }

    /// The pixels selected on this camera, if the policy masked it.
    pub fn mask(&self) -> Option<&FovMask> {
        self.mask.as_ref()
    }

    /// Pixels of this camera matched by the merge, if any.
    pub fn correspondence(&self) -> Option<&Correspondence> {
        self.correspondence.as_ref()
    }

    /// Directions, as seen by this camera, that its correspondence was
    /// matched from. One entry per correspondence pixel, in the same order.
    pub fn queries(&self) -> Option<&[LookAngle]> {
        self.queries.as_deref()
    }

    /// Pixel closest to this camera's own magnetic zenith. Only set by the
    /// `mzslice` policy.
    pub fn magnetic_zenith_pixel(&self) -> Option<PixelCoordinate> {
        self.magnetic_zenith_pixel
    }

    /// Cuts a 1-D slice through this camera along its correspondence.
    pub fn extract_slice(
        &self,
        extractor: &SliceExtractor,
        cut_columns: &[usize],
    ) -> Result<SliceCut, Error> {
        let correspondence = self.correspondence.as_ref().ok_or_else(|| {
            Error::InvalidInput(format!(
                "{}: the merge produced no correspondence to cut along",
                self.frame.name()
            ))
        })?;

        extractor.extract(self.frame, correspondence, cut_columns)
    }
}

/// Everything produced by a single [`FovMerger::merge`] call.
#[derive(Clone, Debug)]
pub struct MergeOutcome<'a> {
    pub reference: MergedCamera<'a>,
    pub other: MergedCamera<'a>,
    pub policy: MaskPolicy,

    /// Geodesic distance between the two cameras.
    pub baseline: Length,

    pub warnings: Vec<MergeWarning>,
}

impl MergeOutcome<'_> {
    pub fn distance_report(&self) -> String {
        distance_report(self.other.frame, self.reference.frame, self.baseline)
    }
}

fn distance_report(other: &CameraFrame, reference: &CameraFrame, baseline: Length) -> String {
    format!(
        "distance: {} camera to {}: {:.1} meters",
        other.name(),
        reference.name(),
        baseline.get::<meter>()
    )
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FovMerger {
    config: MergeConfig,
}

impl FovMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Registers `other` onto `reference` under `policy`.
    ///
    /// `projection_altitude` is only used by the `rect` and `perimeter`
    /// policies. Neither camera is modified; all derived data is returned in
    /// the [`MergeOutcome`].
    pub fn merge<'a>(
        &self,
        reference: &'a CameraFrame,
        other: &'a CameraFrame,
        projection_altitude: Length,
        policy: MaskPolicy,
    ) -> Result<MergeOutcome<'a>, Error> {
        let altitude_m = projection_altitude.get::<meter>();
        if !altitude_m.is_finite() || altitude_m <= 0. {
            return Err(Error::InvalidInput(format!(
                "projection altitude must be positive, got {altitude_m} m"
            )));
        }

        let mut warnings = Vec::new();
        if projection_altitude < self.config.min_projection_altitude() {
            let warning = MergeWarning::SuspiciousProjectionAltitude {
                altitude_m,
                threshold_m: self.config.min_projection_altitude_m,
            };
            warn!("{warning}");
            warnings.push(warning);
        }

        let baseline = geodesic_distance(other.position(), reference.position());
        info!("{}", distance_report(other, reference, baseline));

        let (reference, other) = match policy {
            MaskPolicy::Rectangular | MaskPolicy::Perimeter => {
                self.merge_projected(reference, other, projection_altitude, policy)?
            }
            MaskPolicy::MagneticZenithSlice => self.merge_mzslice(reference, other)?,
        };

        Ok(MergeOutcome {
            reference,
            other,
            policy,
            baseline,
            warnings,
        })
    }

    /// Projects the masked pixels of `other` to `altitude` and matches the
    /// resulting directions against every valid pixel of `reference`.
    fn merge_projected<'a>(
        &self,
        reference: &'a CameraFrame,
        other: &'a CameraFrame,
        altitude: Length,
        policy: MaskPolicy,
    ) -> Result<(MergedCamera<'a>, MergedCamera<'a>), Error> {
        let MaskSelection { mask, .. } =
            select_mask(other, policy, self.config.mzslice_min_elevation())?;

        let mut queries = Vec::with_capacity(mask.count());
        let mut skipped = 0usize;
        for pixel in mask.pixels() {
            // Masked pixels outside the calibrated sky cannot be projected.
            let Some(look) = other
                .look_angle(pixel)
                .filter(|look| look.elevation() > Angle::ZERO)
            else {
                skipped += 1;
                continue;
            };

            let range = slant_range_to_altitude(altitude, look.elevation())
                .filter(|range| *range >= altitude)
                .ok_or_else(|| Error::GeometryViolation {
                    camera: other.name().to_string(),
                    pixel,
                    detail: format!(
                        "slant range to {} m at elevation {}° is shorter than the altitude",
                        altitude.get::<meter>(),
                        look.elevation().get::<degree>()
                    ),
                })?;

            let point = aer_to_ecef(
                &Aer {
                    azimuth: look.azimuth(),
                    elevation: look.elevation(),
                    range,
                },
                other.position(),
            )?;

            let seen = ecef_to_aer(&point, reference.position());
            let query = seen
                .look_angle()
                .filter(|seen| seen.elevation() >= Angle::ZERO)
                .ok_or_else(|| Error::GeometryViolation {
                    camera: other.name().to_string(),
                    pixel,
                    detail: format!(
                        "projects below the horizon of {} (elevation {}°)",
                        reference.name(),
                        seen.elevation.get::<degree>()
                    ),
                })?;

            queries.push(query);
        }

        debug!(
            camera = other.name(),
            masked = mask.count(),
            skipped,
            queries = queries.len(),
            "projected masked pixels"
        );

        if queries.is_empty() {
            return Err(Error::NoFovOverlap {
                camera: other.name().to_string(),
                policy,
            });
        }

        let index = AngularNearestNeighbor::new(reference.name(), reference.look_angles())?;
        let correspondence = index.find_closest(&queries);

        let mut merged_reference = MergedCamera::new(reference);
        merged_reference.correspondence = Some(correspondence);
        merged_reference.queries = Some(queries);
        let mut merged_other = MergedCamera::new(other);
        merged_other.mask = Some(mask);

        Ok((merged_reference, merged_other))
    }

    /// Finds, in each camera, the pixels along the other camera's magnetic
    /// zenith ray, and each camera's own magnetic zenith pixel.
    fn merge_mzslice<'a>(
        &self,
        reference: &'a CameraFrame,
        other: &'a CameraFrame,
    ) -> Result<(MergedCamera<'a>, MergedCamera<'a>), Error> {
        let min_elevation = self.config.mzslice_min_elevation();
        let (reference_mask, reference_ray) = slice_selection(reference, min_elevation)?;
        let (other_mask, other_ray) = slice_selection(other, min_elevation)?;

        let merged_reference =
            slice_correspondence(reference, reference_mask, &reference_ray, &other_ray)?;
        let merged_other = slice_correspondence(other, other_mask, &other_ray, &reference_ray)?;

        Ok((merged_reference, merged_other))
    }
}

fn slice_selection(
    frame: &CameraFrame,
    min_elevation: Angle,
) -> Result<(FovMask, MagneticZenithRay), Error> {
    let policy = MaskPolicy::MagneticZenithSlice;
    let MaskSelection { mask, zenith_ray } = select_mask(frame, policy, min_elevation)?;
    let ray = zenith_ray.ok_or_else(|| Error::MissingMetadata {
        camera: frame.name().to_string(),
        field: "magnetic zenith ray",
        policy,
    })?;

    Ok((mask, ray))
}

/// Matches `remote_ray`, viewed from `frame`, against the masked pixels of
/// `frame`, and locates the direction of `own_ray` in the same pixels.
fn slice_correspondence<'a>(
    frame: &'a CameraFrame,
    mask: FovMask,
    own_ray: &MagneticZenithRay,
    remote_ray: &MagneticZenithRay,
) -> Result<MergedCamera<'a>, Error> {
    let masked = frame.restricted_to(|pixel, _| mask.contains(pixel));
    let index = AngularNearestNeighbor::new(frame.name(), &masked)?;

    let queries = remote_ray.look_angles_from(frame.position());
    debug!(
        camera = frame.name(),
        candidates = index.candidates(),
        queries = queries.len(),
        "matching magnetic zenith ray"
    );

    let mut merged = MergedCamera::new(frame);
    merged.correspondence = Some(index.find_closest(&queries));
    merged.queries = Some(queries);
    merged.magnetic_zenith_pixel = Some(index.closest(&own_ray.direction()));
    merged.mask = Some(mask);

    Ok(merged)
}
