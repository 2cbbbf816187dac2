//! Binary little-endian PLY writer for coloured point clouds.
use crate::error::InputError;
use crate::image::io::ensure_parent_dir;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One exported point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointRecord {
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub color: [u8; 3],
}

impl PointRecord {
    pub fn new(position: [f32; 3], normal: Option<[f32; 3]>, color: [u8; 3]) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }
}

fn finite_or_zero(v: [f32; 3]) -> [f32; 3] {
    if v.iter().all(|c| c.is_finite()) {
        v
    } else {
        [0.0; 3]
    }
}

/// Write `points` as a binary PLY. With `with_normals`, points lacking a
/// normal are written with `(0, 0, 0)`.
pub fn write_point_cloud(
    path: &Path,
    points: &[PointRecord],
    with_normals: bool,
) -> Result<(), InputError> {
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(|e| InputError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let io = |e| InputError::io(path, e);

    let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
    header.push_str(&format!("element vertex {}\n", points.len()));
    header.push_str("property float x\nproperty float y\nproperty float z\n");
    if with_normals {
        header.push_str("property float nx\nproperty float ny\nproperty float nz\n");
    }
    header.push_str("property uchar red\nproperty uchar green\nproperty uchar blue\n");
    header.push_str("end_header\n");
    out.write_all(header.as_bytes()).map_err(io)?;

    for p in points {
        for v in finite_or_zero(p.position) {
            out.write_all(&v.to_le_bytes()).map_err(io)?;
        }
        if with_normals {
            for v in finite_or_zero(p.normal.unwrap_or([0.0; 3])) {
                out.write_all(&v.to_le_bytes()).map_err(io)?;
            }
        }
        out.write_all(&p.color).map_err(io)?;
    }
    out.flush().map_err(io)
}
