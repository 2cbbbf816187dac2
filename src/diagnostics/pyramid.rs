use crate::image::traits::ImageView;
use crate::pyramid::LevelPyramid;
use serde::{Deserialize, Serialize};

/// Statistics for a single level of the reference image stack.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidLevelReport {
    pub level_index: usize,
    pub width: usize,
    pub height: usize,
    pub num_views: usize,
    pub mean_intensity: f32,
}

/// Level construction details.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidStage {
    pub elapsed_ms: f64,
    pub levels: Vec<PyramidLevelReport>,
}

impl PyramidStage {
    pub fn from_pyramid(pyramid: &LevelPyramid) -> Self {
        let levels = pyramid
            .levels
            .iter()
            .map(|lvl| {
                let img = lvl.reference_image();
                let sum: f32 = if let Some(slice) = img.as_slice() {
                    slice.iter().copied().sum()
                } else {
                    img.rows().map(|r| r.iter().copied().sum::<f32>()).sum()
                };
                let denom = (img.w * img.h).max(1) as f32;
                PyramidLevelReport {
                    level_index: lvl.index,
                    width: img.w,
                    height: img.h,
                    num_views: lvl.images.len(),
                    mean_intensity: sum / denom,
                }
            })
            .collect();
        Self {
            elapsed_ms: pyramid.elapsed_ms,
            levels,
        }
    }
}
