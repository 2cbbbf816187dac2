//! Error types.
//!
//! `StereoError` covers failures of the accelerator-side resource layer and of
//! the stereo passes. They are fatal for the batch: the driver reports them and
//! terminates. `InputError` covers host-side input problems (missing files,
//! malformed containers); callers treat those as "no data" and move on.
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StereoError {
    #[error("device allocation of {bytes} bytes failed at {location}")]
    Allocation {
        bytes: usize,
        location: &'static Location<'static>,
    },
    #[error("invalid view set: {reason} at {location}")]
    InvalidViews {
        reason: String,
        location: &'static Location<'static>,
    },
    #[error(
        "dimension mismatch: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h} at {location}"
    )]
    DimensionMismatch {
        expected_w: usize,
        expected_h: usize,
        actual_w: usize,
        actual_h: usize,
        location: &'static Location<'static>,
    },
}

impl StereoError {
    /// Location of the call that failed.
    pub fn location(&self) -> &'static Location<'static> {
        match self {
            Self::Allocation { location, .. }
            | Self::InvalidViews { location, .. }
            | Self::DimensionMismatch { location, .. } => location,
        }
    }

    #[track_caller]
    pub(crate) fn invalid_views(reason: impl Into<String>) -> Self {
        Self::InvalidViews {
            reason: reason.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn dimension_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            expected_w: expected.0,
            expected_h: expected.1,
            actual_w: actual.0,
            actual_h: actual.1,
            location: Location::caller(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: unsupported container type tag {tag}")]
    BadTag { path: PathBuf, tag: i32 },
    #[error("{path}: expected {expected} channel(s), found {found}")]
    Channels {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("{path}: payload truncated (expected {expected} bytes, found {found})")]
    Truncated {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to decode image {path}: {message}")]
    Image { path: PathBuf, message: String },
}

impl InputError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
