//! Host-side results: per-pixel depth/normal/cost maps, warm-start seeds and
//! point export.
use crate::camera::Camera;
use crate::device::PixelBuffers;
use crate::hypothesis::{face_camera, Plane, PlaneHypothesis};
use crate::image::{ImageF32, ImageVec3, ImageView};
use crate::io::ply::PointRecord;
use crate::propagation::MAX_COST;
use nalgebra::Vector3;

/// Downloaded state of one reference view.
#[derive(Clone, Debug, PartialEq)]
pub struct StereoResult {
    /// Depth along the viewing ray; `0` where no valid hypothesis exists.
    pub depth: ImageF32,
    /// Unit normals in reference camera coordinates.
    pub normal: ImageVec3,
    /// Aggregated matching cost in `[0, MAX_COST]`.
    pub cost: ImageF32,
    /// Reference intensities at the result resolution.
    pub intensity: Option<ImageF32>,
}

impl StereoResult {
    /// Download the hypothesis field and convert planes to depth + normal.
    pub fn from_buffers(
        buffers: &PixelBuffers,
        camera: &Camera,
        intensity: Option<&ImageF32>,
    ) -> Self {
        let (w, h) = (buffers.width(), buffers.height());
        let field = buffers.field();
        let mut depth = ImageF32::new(w, h);
        let mut normal = ImageVec3::new(w, h);
        let mut cost = ImageF32::filled(w, h, MAX_COST);
        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                let plane = field.plane(idx);
                let d = camera.depth_from_plane(plane, x as f32, y as f32);
                depth.data[idx] = d.unwrap_or(0.0);
                normal.data[idx] = if plane.is_finite() {
                    plane.normal
                } else {
                    Vector3::zeros()
                };
                let c = field.cost(idx);
                cost.data[idx] = if c.is_finite() { c } else { MAX_COST };
            }
        }
        Self {
            depth,
            normal,
            cost,
            intensity: intensity.cloned(),
        }
    }

    pub fn width(&self) -> usize {
        self.depth.w
    }

    pub fn height(&self) -> usize {
        self.depth.h
    }

    pub fn depth_at(&self, idx: usize) -> f32 {
        self.depth.data[idx]
    }

    pub fn normal_at(&self, idx: usize) -> Vector3<f32> {
        self.normal.data[idx]
    }

    pub fn cost_at(&self, idx: usize) -> f32 {
        self.cost.data[idx]
    }

    pub fn intensity_at(&self, idx: usize) -> Option<f32> {
        self.intensity.as_ref().map(|img| img.data[idx])
    }

    pub fn hypothesis(&self, idx: usize) -> PlaneHypothesis {
        PlaneHypothesis {
            normal: self.normal_at(idx),
            depth: self.depth_at(idx),
        }
    }

    /// Mean cost over all pixels.
    pub fn mean_cost(&self) -> f32 {
        if self.cost.is_empty() {
            return MAX_COST;
        }
        self.cost.data.iter().sum::<f32>() / self.cost.len() as f32
    }

    /// Fraction of pixels holding a valid hypothesis with cost below `MAX_COST`.
    pub fn valid_ratio(&self) -> f32 {
        if self.depth.is_empty() {
            return 0.0;
        }
        let valid = (0..self.depth.len())
            .filter(|&i| self.hypothesis(i).is_valid() && self.cost_at(i) < MAX_COST)
            .count();
        valid as f32 / self.depth.len() as f32
    }

    /// Warm-start seed carrying this result's cost as auxiliary data.
    pub fn to_seed(&self) -> LevelSeed {
        LevelSeed {
            depth: self.depth.clone(),
            normal: self.normal.clone(),
            auxiliary_cost: Some(self.cost.clone()),
        }
    }

    /// World-space points for every pixel with positive depth.
    ///
    /// Normals are rotated into world coordinates; colour is the reference
    /// intensity (grey). Non-finite coordinates are zeroed.
    pub fn to_points(&self, camera: &Camera) -> Vec<PointRecord> {
        let w = self.width();
        let mut points = Vec::new();
        for idx in 0..self.depth.len() {
            let d = self.depth_at(idx);
            if !(d.is_finite() && d > 0.0) {
                continue;
            }
            let (x, y) = ((idx % w) as f32, (idx / w) as f32);
            let position = camera.point_in_world(x, y, d);
            let normal = camera.normal_to_world(&self.normal_at(idx));
            let grey = self
                .intensity_at(idx)
                .map(|v| (v * 255.0).clamp(0.0, 255.0) as u8)
                .unwrap_or(255);
            points.push(PointRecord::new(
                sanitize(position),
                Some(sanitize(normal)),
                [grey; 3],
            ));
        }
        points
    }
}

fn sanitize(v: Vector3<f32>) -> [f32; 3] {
    if v.iter().all(|c| c.is_finite()) {
        [v.x, v.y, v.z]
    } else {
        [0.0; 3]
    }
}

/// Depth/normal maps used to initialise a propagation run instead of random
/// draws. `auxiliary_cost`, when present, marks pixels to re-randomise.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelSeed {
    pub depth: ImageF32,
    pub normal: ImageVec3,
    pub auxiliary_cost: Option<ImageF32>,
}

impl LevelSeed {
    pub fn new(depth: ImageF32, normal: ImageVec3) -> Self {
        Self {
            depth,
            normal,
            auxiliary_cost: None,
        }
    }

    pub fn width(&self) -> usize {
        self.depth.w
    }

    pub fn height(&self) -> usize {
        self.depth.h
    }

    /// True when the normal map (and auxiliary cost, if any) has the size of
    /// the depth map.
    pub fn is_consistent(&self) -> bool {
        let size = (self.depth.w, self.depth.h);
        (self.normal.w, self.normal.h) == size
            && self
                .auxiliary_cost
                .as_ref()
                .map_or(true, |c| (c.w, c.h) == size)
    }

    /// Plane stored at `(x, y)`, or `None` when the pixel must be re-randomised.
    pub fn plane_at(&self, camera: &Camera, x: usize, y: usize, reseed_cost: f32) -> Option<Plane> {
        if x >= self.depth.w || y >= self.depth.h {
            return None;
        }
        let idx = self.depth.idx(x, y);
        if let Some(cost) = &self.auxiliary_cost {
            let c = *cost.data.get(idx)?;
            if !c.is_finite() || c >= reseed_cost {
                return None;
            }
        }
        let hyp = PlaneHypothesis {
            normal: *self.normal.data.get(idx)?,
            depth: self.depth.data[idx],
        };
        if !hyp.is_valid() {
            return None;
        }
        let (fx, fy) = (x as f32, y as f32);
        let hyp = PlaneHypothesis {
            normal: face_camera(hyp.normal.normalize(), &camera.ray(fx, fy)),
            ..hyp
        };
        let plane = hyp.to_plane(camera, fx, fy);
        camera.depth_from_plane(&plane, fx, fy).map(|_| plane)
    }
}
