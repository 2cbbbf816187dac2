//! Run configuration: mode toggles plus the parameter blocks of every pass.
use crate::camera::{Camera, DepthRange};
use crate::prior::PriorParams;
use crate::propagation::PropagationParams;
use crate::pyramid::PyramidOptions;
use crate::upsample::JbuParams;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoParams {
    /// Score hypotheses against neighbour depth maps as well as photometry.
    pub geom_consistency: bool,
    /// Repeat the geometric pass, reading the previous geometric output.
    pub multi_geometry: bool,
    /// Coarse-to-fine processing over `pyramid.levels` levels.
    pub hierarchy: bool,
    /// Regularise each level with a triangulated planar prior.
    pub planar_prior: bool,
    /// In geometric mode, reject views whose reprojection error hits the cap.
    pub mand_consistency: bool,
    /// `[lower, upper]` factors applied to the reference depth range.
    pub depth_range_scale: [f32; 2],
    /// Seeded pixels whose auxiliary cost reaches this are re-randomised.
    pub reseed_cost: f32,
    pub pyramid: PyramidOptions,
    pub propagation: PropagationParams,
    pub prior: PriorParams,
    pub upsample: JbuParams,
}

impl Default for StereoParams {
    fn default() -> Self {
        Self {
            geom_consistency: false,
            multi_geometry: false,
            hierarchy: false,
            planar_prior: false,
            mand_consistency: false,
            depth_range_scale: [0.6, 1.2],
            reseed_cost: 0.8,
            pyramid: PyramidOptions::default(),
            propagation: PropagationParams::default(),
            prior: PriorParams::default(),
            upsample: JbuParams::default(),
        }
    }
}

impl StereoParams {
    pub fn with_geom_consistency(mut self, multi_geometry: bool) -> Self {
        self.geom_consistency = true;
        self.multi_geometry = multi_geometry;
        self
    }

    /// Enable coarse-to-fine processing; at least two levels are used.
    pub fn with_hierarchy(mut self) -> Self {
        self.hierarchy = true;
        self.pyramid.levels = self.pyramid.levels.max(2);
        self
    }

    pub fn with_planar_prior(mut self) -> Self {
        self.planar_prior = true;
        self
    }

    pub fn with_mand_consistency(mut self, flag: bool) -> Self {
        self.mand_consistency = flag;
        self
    }

    /// Levels actually processed: 1 unless hierarchy is on, then at least 2.
    pub fn num_levels(&self) -> usize {
        if self.hierarchy {
            self.pyramid.levels.max(2)
        } else {
            1
        }
    }

    /// Depth search range of the reference `camera`.
    pub fn depth_range(&self, camera: &Camera) -> DepthRange {
        DepthRange::from_camera(camera, self.depth_range_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_compose() {
        let params = StereoParams::default()
            .with_hierarchy()
            .with_planar_prior()
            .with_geom_consistency(true)
            .with_mand_consistency(true);
        assert!(params.hierarchy && params.planar_prior && params.mand_consistency);
        assert!(params.geom_consistency && params.multi_geometry);
        assert_eq!(params.num_levels(), 2);
        assert_eq!(StereoParams::default().num_levels(), 1);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params: StereoParams = serde_json::from_str(
            r#"{ "hierarchy": true, "pyramid": { "levels": 3 }, "propagation": { "max_iterations": 5 } }"#,
        )
        .expect("valid json");
        assert_eq!(params.num_levels(), 3);
        assert_eq!(params.propagation.max_iterations, 5);
        assert_eq!(params.propagation.patch_radius, 5);
        assert_eq!(params.depth_range_scale, [0.6, 1.2]);
        assert_eq!(params.prior.support.tile_size, 5);
    }

    #[test]
    fn hierarchy_flag_alone_runs_two_levels() {
        let params: StereoParams =
            serde_json::from_str(r#"{ "hierarchy": true }"#).expect("valid json");
        assert_eq!(params.pyramid.levels, 1);
        assert_eq!(params.num_levels(), 2);
        let flat: StereoParams =
            serde_json::from_str(r#"{ "pyramid": { "levels": 4 } }"#).expect("valid json");
        assert_eq!(flat.num_levels(), 1);
    }
}
