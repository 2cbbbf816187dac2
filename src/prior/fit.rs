//! Plane fitting over support triangles.
use super::delaunay::Triangle;
use crate::camera::Camera;
use crate::hypothesis::Plane;
use crate::image::ImageF32;
use nalgebra::{Matrix4, Vector3};

/// Least-squares plane through three camera-space points.
///
/// Rows `[X, Y, Z, 1]` form a homogeneous system whose null vector (right
/// singular vector of the smallest singular value) holds `(n, d)`. The result
/// is scaled so `|n| = 1` with `d >= 0`. Degenerate inputs are not rejected;
/// the returned plane may then be non-finite.
pub fn fit_plane(points: &[Vector3<f32>; 3]) -> Option<Plane> {
    // Fourth row stays zero so the square SVD exposes the null space.
    let mut a = Matrix4::<f64>::zeros();
    for (r, p) in points.iter().enumerate() {
        a[(r, 0)] = p.x as f64;
        a[(r, 1)] = p.y as f64;
        a[(r, 2)] = p.z as f64;
        a[(r, 3)] = 1.0;
    }
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|l, r| l.1.total_cmp(r.1))?;
    let v = v_t.row(min_idx);
    let mut norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if v[3] < 0.0 {
        norm = -norm;
    }
    Some(Plane {
        normal: Vector3::new((v[0] / norm) as f32, (v[1] / norm) as f32, (v[2] / norm) as f32),
        offset: (v[3] / norm) as f32,
    })
}

/// Back-project the triangle's vertices with their depths and fit a plane.
pub fn fit_triangle_plane(camera: &Camera, triangle: &Triangle, depth: &ImageF32) -> Option<Plane> {
    let points = triangle.vertices.map(|p| {
        camera.point_in_camera(p.x as f32, p.y as f32, depth.get(p.x, p.y))
    });
    fit_plane(&points)
}
