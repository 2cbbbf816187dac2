use crate::error::InputError;
use crate::io::read_pair_file;
use crate::params::StereoParams;
use crate::problem::Problem;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct StereoToolConfig {
    /// Folder holding `images/`, `cams/` and optionally `pair.txt`.
    pub dense_folder: PathBuf,
    #[serde(default)]
    pub problems: ProblemSource,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub stereo: StereoParams,
}

/// Where the reconstruction units come from.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemSource {
    /// A `pair.txt` file, relative paths resolved against the dense folder.
    PairFile {
        path: PathBuf,
        #[serde(default)]
        max_source_views: Option<usize>,
    },
    Inline(Vec<Problem>),
}

impl Default for ProblemSource {
    fn default() -> Self {
        Self::PairFile {
            path: PathBuf::from("pair.txt"),
            max_source_views: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Result folder name under the dense folder.
    pub folder: String,
    /// Write a `points.ply` per problem.
    pub export_points: bool,
    /// Write `report.json` per problem.
    pub write_report: bool,
    /// Reload `depths.dmb`/`normals.dmb` from a previous run as a warm start.
    pub warm_start: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: "patchmatch".to_string(),
            export_points: false,
            write_report: true,
            warm_start: false,
        }
    }
}

impl StereoToolConfig {
    pub fn images_dir(&self) -> PathBuf {
        self.dense_folder.join("images")
    }

    pub fn cams_dir(&self) -> PathBuf {
        self.dense_folder.join("cams")
    }

    pub fn image_path(&self, image_id: usize) -> PathBuf {
        self.images_dir().join(format!("{image_id:08}.jpg"))
    }

    pub fn camera_path(&self, image_id: usize) -> PathBuf {
        self.cams_dir().join(format!("{image_id:08}_cam.txt"))
    }

    /// Per-view result folder.
    pub fn result_dir(&self, image_id: usize) -> PathBuf {
        self.dense_folder
            .join(&self.output.folder)
            .join(format!("{image_id:08}"))
    }

    /// Resolve the problem list.
    pub fn load_problems(&self) -> Result<Vec<Problem>, InputError> {
        match &self.problems {
            ProblemSource::Inline(problems) => Ok(problems.clone()),
            ProblemSource::PairFile {
                path,
                max_source_views,
            } => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    self.dense_folder.join(path)
                };
                read_pair_file(&path, *max_source_views)
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<StereoToolConfig, InputError> {
    let data = fs::read_to_string(path).map_err(|e| InputError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| InputError::parse(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_problems_and_defaults() {
        let cfg: StereoToolConfig = serde_json::from_str(
            r#"{
                "dense_folder": "/data/scan1",
                "problems": { "inline": [ { "ref_image_id": 3, "src_image_ids": [1, 2] } ] },
                "stereo": { "hierarchy": true, "planar_prior": true }
            }"#,
        )
        .expect("config");
        let problems = cfg.load_problems().expect("problems");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].ref_image_id, 3);
        assert_eq!(problems[0].cur_image_size, 3200);
        assert!(cfg.stereo.hierarchy && cfg.stereo.planar_prior);
        assert_eq!(cfg.output.folder, "patchmatch");
        assert_eq!(
            cfg.result_dir(3),
            PathBuf::from("/data/scan1/patchmatch/00000003")
        );
        assert_eq!(
            cfg.camera_path(12),
            PathBuf::from("/data/scan1/cams/00000012_cam.txt")
        );
    }

    #[test]
    fn pair_file_is_resolved_against_dense_folder() {
        let dir = std::env::temp_dir().join(format!("pmvs_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join("pair.txt"), "2\n0\n1 1 10.0\n1\n1 0 10.0\n").expect("pair");
        let json = format!(
            r#"{{ "dense_folder": {:?}, "problems": {{ "pair_file": {{ "path": "pair.txt", "max_source_views": 4 }} }} }}"#,
            dir.display().to_string()
        );
        let cfg: StereoToolConfig = serde_json::from_str(&json).expect("config");
        let problems = cfg.load_problems().expect("problems");
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[1].src_image_ids, vec![0]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_config_is_an_io_error() {
        let err = load_config(Path::new("/nonexistent/stereo.json")).unwrap_err();
        assert!(err.is_not_found());
    }
}
