//! Sparse support points for the planar prior.
//!
//! The image is split into square tiles. Inside a tile the lowest adjusted
//! cost is tracked separately for textured and non-textured pixels, where the
//! adjusted cost is `cost - confidence` plus `texture_penalty` for textured
//! pixels. Each class contributes its best pixel when the adjusted cost is
//! below `acceptance`, so a tile yields at most two points.
use crate::image::ImageF32;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportParams {
    /// Tile edge length in pixels.
    pub tile_size: usize,
    /// Pixels at or above this cost are never selected.
    pub max_cost: f32,
    /// Texture-field values above this mark a pixel as textured.
    pub texture_threshold: f32,
    /// Added to the cost of textured pixels.
    pub texture_penalty: f32,
    /// Adjusted cost a tile candidate must stay below.
    pub acceptance: f32,
}

impl Default for SupportParams {
    fn default() -> Self {
        Self {
            tile_size: 5,
            max_cost: 2.0,
            texture_threshold: 0.5,
            texture_penalty: 0.2,
            acceptance: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SupportPoint {
    pub x: usize,
    pub y: usize,
}

impl SupportPoint {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy)]
struct TileBest {
    cost: f32,
    point: Option<SupportPoint>,
}

impl TileBest {
    fn new(limit: f32) -> Self {
        Self {
            cost: limit,
            point: None,
        }
    }

    fn offer(&mut self, cost: f32, x: usize, y: usize) {
        if cost < self.cost {
            self.cost = cost;
            self.point = Some(SupportPoint::new(x, y));
        }
    }

    fn accept(self, acceptance: f32) -> Option<SupportPoint> {
        self.point.filter(|_| self.cost < acceptance)
    }
}

/// Select support points from a cost map.
///
/// `confidence` is subtracted from the cost when given; `texture` is the
/// binary texture field (see [`crate::edges::texture_field`]).
pub fn select_support_points(
    costs: &ImageF32,
    confidence: Option<&ImageF32>,
    texture: &ImageF32,
    params: &SupportParams,
) -> Vec<SupportPoint> {
    let (w, h) = (costs.w, costs.h);
    let step = params.tile_size.max(1);
    let mut points = Vec::new();
    for ty in (0..h).step_by(step) {
        for tx in (0..w).step_by(step) {
            let mut textured = TileBest::new(params.max_cost);
            let mut plain = TileBest::new(params.max_cost);
            for y in ty..(ty + step).min(h) {
                for x in tx..(tx + step).min(w) {
                    let cost = costs.get(x, y);
                    if !cost.is_finite() || cost >= params.max_cost {
                        continue;
                    }
                    let bonus = confidence.map_or(0.0, |c| c.get(x, y));
                    if texture.get(x, y) > params.texture_threshold {
                        textured.offer(cost + params.texture_penalty - bonus, x, y);
                    } else {
                        plain.offer(cost - bonus, x, y);
                    }
                }
            }
            points.extend(textured.accept(params.acceptance));
            points.extend(plain.accept(params.acceptance));
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_point_per_tile_below_threshold() {
        // One pixel per 5×5 tile at adjusted cost 0.05, all others at 0.5.
        let costs = ImageF32::from_fn(20, 15, |x, y| {
            if x % 5 == 2 && y % 5 == 3 {
                0.05
            } else {
                0.5
            }
        });
        let texture = ImageF32::new(20, 15);
        let points = select_support_points(&costs, None, &texture, &SupportParams::default());
        assert_eq!(points.len(), 12);
        assert!(points.iter().all(|p| p.x % 5 == 2 && p.y % 5 == 3));
    }

    #[test]
    fn texture_penalty_and_confidence_adjust_costs() {
        let params = SupportParams::default();
        let mut costs = ImageF32::filled(5, 5, 1.0);
        costs.set(1, 1, 0.05);
        costs.set(3, 3, 0.05);
        let texture = ImageF32::from_fn(5, 5, |x, _| if x >= 3 { 1.0 } else { 0.0 });
        // The textured candidate pays the 0.2 penalty and is rejected.
        let points = select_support_points(&costs, None, &texture, &params);
        assert_eq!(points, vec![SupportPoint::new(1, 1)]);
        // Enough confidence brings it back; textured points come first.
        let confidence = ImageF32::filled(5, 5, 0.2);
        let points = select_support_points(&costs, Some(&confidence), &texture, &params);
        assert_eq!(points, vec![SupportPoint::new(3, 3), SupportPoint::new(1, 1)]);
    }

    #[test]
    fn invalid_costs_are_skipped() {
        let mut costs = ImageF32::filled(5, 5, 2.0);
        costs.set(0, 0, f32::NAN);
        let confidence = ImageF32::filled(5, 5, 5.0);
        let points = select_support_points(
            &costs,
            Some(&confidence),
            &ImageF32::new(5, 5),
            &SupportParams::default(),
        );
        assert!(points.is_empty());
    }
}
