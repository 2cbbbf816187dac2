//! Delaunay triangulation of support points (Bowyer–Watson).
//!
//! Points are inserted one by one into an enclosing super triangle; every
//! triangle whose circumcircle strictly contains the new point is removed
//! and the cavity is re-triangulated from its boundary edges. Triangles that
//! touch a super vertex, and zero-area triangles, are dropped at the end, so
//! the result covers the convex hull of the input.
use super::support::SupportPoint;
use std::collections::HashMap;

/// Triangle over three support points; vertices are ordered so that
/// [`Triangle::doubled_area`] is positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Triangle {
    pub vertices: [SupportPoint; 3],
}

impl Triangle {
    /// Twice the signed area.
    pub fn doubled_area(&self) -> f64 {
        let [a, b, c] = self.vertices.map(|p| [p.x as f64, p.y as f64]);
        orient(a, b, c)
    }

    /// Inclusive point-in-triangle test (edges and vertices belong to the
    /// triangle).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let [a, b, c] = self.vertices.map(|p| [p.x as f64, p.y as f64]);
        let p = [x, y];
        let e0 = orient(a, b, p);
        let e1 = orient(b, c, p);
        let e2 = orient(c, a, p);
        (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0) || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0)
    }
}

#[inline]
fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Positive when `d` lies strictly inside the circumcircle of the
/// counter-clockwise triangle `(a, b, c)`.
#[inline]
fn in_circle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    ad * (bdx * cdy - cdx * bdy) - bd * (adx * cdy - cdx * ady) + cd * (adx * bdy - bdx * ady)
}

#[derive(Clone, Copy, Debug)]
struct Face {
    v: [usize; 3],
}

impl Face {
    fn new(a: usize, b: usize, c: usize, coords: &[[f64; 2]]) -> Self {
        if orient(coords[a], coords[b], coords[c]) < 0.0 {
            Self { v: [a, c, b] }
        } else {
            Self { v: [a, b, c] }
        }
    }

    fn circumcircle_contains(&self, coords: &[[f64; 2]], p: [f64; 2]) -> bool {
        in_circle(coords[self.v[0]], coords[self.v[1]], coords[self.v[2]], p) > 0.0
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.v;
        [(a, b), (b, c), (c, a)]
    }
}

#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Triangulate `points`. Duplicates are ignored; fewer than three distinct
/// points, or only collinear ones, give an empty result.
pub fn triangulate(points: &[SupportPoint]) -> Vec<Triangle> {
    let mut unique = points.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() < 3 {
        return Vec::new();
    }

    let n = unique.len();
    let mut coords: Vec<[f64; 2]> = unique.iter().map(|p| [p.x as f64, p.y as f64]).collect();
    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for c in &coords {
        min_x = min_x.min(c[0]);
        min_y = min_y.min(c[1]);
        max_x = max_x.max(c[0]);
        max_y = max_y.max(c[1]);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let mid_x = 0.5 * (min_x + max_x);
    let mid_y = 0.5 * (min_y + max_y);
    coords.push([mid_x - 20.0 * span, mid_y - span]);
    coords.push([mid_x, mid_y + 20.0 * span]);
    coords.push([mid_x + 20.0 * span, mid_y - span]);

    let mut faces = vec![Face::new(n, n + 1, n + 2, &coords)];
    let mut edges: Vec<(usize, usize)> = Vec::new();
    let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
    for i in 0..n {
        let p = coords[i];
        edges.clear();
        counts.clear();
        faces.retain(|f| {
            if f.circumcircle_contains(&coords, p) {
                edges.extend(f.edges());
                false
            } else {
                true
            }
        });
        for &(a, b) in &edges {
            *counts.entry(edge_key(a, b)).or_insert(0) += 1;
        }
        for &(a, b) in &edges {
            if counts.get(&edge_key(a, b)) == Some(&1) {
                faces.push(Face::new(a, b, i, &coords));
            }
        }
    }

    faces
        .into_iter()
        .filter(|f| f.v.iter().all(|&v| v < n))
        .map(|f| Triangle {
            vertices: f.v.map(|v| unique[v]),
        })
        .filter(|t| t.doubled_area().abs() > 1e-9)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(usize, usize)]) -> Vec<SupportPoint> {
        coords.iter().map(|&(x, y)| SupportPoint::new(x, y)).collect()
    }

    fn total_area(tris: &[Triangle]) -> f64 {
        tris.iter().map(|t| 0.5 * t.doubled_area().abs()).sum()
    }

    #[test]
    fn square_splits_into_two_triangles() {
        let tris = triangulate(&pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]));
        assert_eq!(tris.len(), 2);
        assert!((total_area(&tris) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn centre_point_gives_four_triangles() {
        let tris = triangulate(&pts(&[(0, 0), (10, 0), (10, 10), (0, 10), (5, 5)]));
        assert_eq!(tris.len(), 4);
        assert!(tris
            .iter()
            .all(|t| t.vertices.contains(&SupportPoint::new(5, 5))));
    }

    #[test]
    fn degenerate_inputs_give_nothing() {
        assert!(triangulate(&[]).is_empty());
        assert!(triangulate(&pts(&[(1, 1), (2, 2)])).is_empty());
        assert!(triangulate(&pts(&[(0, 0), (5, 5), (10, 10), (15, 15)])).is_empty());
        assert!(triangulate(&pts(&[(3, 4), (3, 4), (3, 4), (7, 1)])).is_empty());
    }

    #[test]
    fn triangles_tile_the_convex_hull() {
        let tris = triangulate(&pts(&[
            (0, 0),
            (40, 0),
            (40, 30),
            (0, 30),
            (12, 9),
            (27, 14),
            (8, 22),
            (31, 25),
            (20, 4),
        ]));
        assert!((total_area(&tris) - 1200.0).abs() < 1e-6);
        // Every triangle is Delaunay with respect to every input point.
        let all = [(0, 0), (40, 0), (40, 30), (0, 30), (12, 9), (27, 14), (8, 22), (31, 25), (20, 4)];
        for t in &tris {
            let [a, b, c] = t.vertices.map(|p| [p.x as f64, p.y as f64]);
            let (a, b, c) = if orient(a, b, c) < 0.0 { (a, c, b) } else { (a, b, c) };
            for &(x, y) in &all {
                assert!(in_circle(a, b, c, [x as f64, y as f64]) <= 1e-6);
            }
        }
    }

    #[test]
    fn containment_includes_edges() {
        let t = Triangle {
            vertices: [SupportPoint::new(0, 0), SupportPoint::new(4, 0), SupportPoint::new(0, 4)],
        };
        assert!(t.contains(0.0, 0.0));
        assert!(t.contains(2.0, 2.0));
        assert!(t.contains(1.0, 1.0));
        assert!(!t.contains(3.0, 3.0));
    }
}
