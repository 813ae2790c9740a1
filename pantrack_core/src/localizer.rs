//! Target localization: largest matching region becomes the observation.
use std::sync::Arc;

use parking_lot::RwLock;
use pantrack_traits::Frame;

use crate::config::MaskParams;
use crate::error::BuildError;
use crate::segment::{HsvRegionExtractor, Region, RegionExtractor};
use crate::types::Observation;

pub struct Localizer {
    extractor: Box<dyn RegionExtractor + Send>,
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Box::new(HsvRegionExtractor))
    }
}

impl std::fmt::Debug for Localizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Localizer").finish_non_exhaustive()
    }
}

impl Localizer {
    pub fn new(extractor: Box<dyn RegionExtractor + Send>) -> Self {
        Self { extractor }
    }

    /// Locate the target in `frame`.
    ///
    /// The region with the largest area wins (first one on ties). The
    /// observation is valid only when that area is strictly greater than
    /// `mask.min_area`.
    pub fn locate(&self, frame: &Frame, mask: &MaskParams) -> Observation {
        let regions = self.extractor.extract(frame, mask);
        select_target(&regions, mask.min_area)
    }
}

/// Pick the largest region and apply the area threshold.
pub fn select_target(regions: &[Region], min_area: u32) -> Observation {
    let best = regions
        .iter()
        .fold(None::<&Region>, |acc, r| match acc {
            Some(b) if b.area >= r.area => Some(b),
            _ => Some(r),
        });
    match best {
        Some(r) if r.area > min_area => Observation::from_box(r.bbox, r.area, true),
        _ => Observation::none(),
    }
}

/// Shared, whole-value-replaceable mask parameters.
///
/// Readers take a snapshot per frame; a concurrent `replace` never produces a
/// mix of old and new bounds within one cycle.
#[derive(Debug, Clone)]
pub struct MaskHandle {
    inner: Arc<RwLock<Arc<MaskParams>>>,
}

impl MaskHandle {
    pub fn new(params: MaskParams) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(params))),
        }
    }

    pub fn snapshot(&self) -> Arc<MaskParams> {
        self.inner.read().clone()
    }

    /// Swap in new parameters; out-of-range bounds leave the current ones in place.
    pub fn replace(&self, params: MaskParams) -> std::result::Result<(), BuildError> {
        params.check().map_err(BuildError::InvalidConfig)?;
        *self.inner.write() = Arc::new(params);
        tracing::info!(
            hue_low = params.hue_low,
            hue_high = params.hue_high,
            min_area = params.min_area,
            "mask parameters replaced"
        );
        Ok(())
    }
}

impl Default for MaskHandle {
    fn default() -> Self {
        Self::new(MaskParams::default())
    }
}
