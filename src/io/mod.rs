//! File formats exchanged with the rest of the reconstruction pipeline.
//!
//! - `dmb`: binary depth/normal/cost containers.
//! - `ply`: binary point clouds.
//! - `cam`: text camera files (extrinsics, intrinsics, depth range).
//! - `pair`: view-selection lists (`pair.txt`).

pub mod cam;
pub mod dmb;
pub mod pair;
pub mod ply;

pub use cam::read_camera;
pub use dmb::{
    read_depth_dmb, read_dmb, read_normal_dmb, write_depth_dmb, write_dmb, write_normal_dmb,
    DmbData,
};
pub use pair::read_pair_file;
pub use ply::{write_point_cloud, PointRecord};
