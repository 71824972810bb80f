use egomotion_3d::camera::CameraError;
use egomotion_3d::pose::{EssentialError, RansacError};
use egomotion_image::{ImageError, ImageSize};
use egomotion_imgproc::FeatureError;

use crate::config::ConfigError;

/// Errors raised while processing frames.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    /// Too few matches to estimate the relative pose.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimal sample size of the estimator.
        required: usize,
        /// Number of matches found.
        actual: usize,
    },

    /// No RANSAC trial produced an essential matrix.
    #[error("No valid essential matrix found in {0} iterations")]
    DegenerateEstimation(usize),

    /// The essential matrix could not be split into a rotation and a translation.
    #[error("Invalid essential matrix decomposition: {0}")]
    InvalidDecomposition(String),

    /// The camera intrinsic matrix is not invertible.
    #[error("Intrinsic matrix is singular or not finite: {0:?}")]
    SingularIntrinsics([[f64; 3]; 3]),

    /// The tracker was asked to stop.
    #[error("Frame processing was stopped")]
    Stopped,

    /// The frame does not have the configured resolution.
    #[error("Frame size {actual} does not match the configured size {expected}")]
    ImageSizeMismatch {
        /// Configured frame size.
        expected: ImageSize,
        /// Size of the rejected frame.
        actual: ImageSize,
    },

    /// Image error.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Feature detection error.
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Essential matrix estimation error.
    #[error(transparent)]
    Essential(EssentialError),

    /// Robust estimation error other than a per-frame failure.
    #[error(transparent)]
    Ransac(RansacError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FrameError {
    /// Whether the error only affects the current frame.
    ///
    /// The tracker reports these in [`crate::FrameResult::failure`] and keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::InsufficientCorrespondences { .. }
                | FrameError::DegenerateEstimation(_)
                | FrameError::InvalidDecomposition(_)
        )
    }
}

impl From<CameraError> for FrameError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::SingularIntrinsics(k) => FrameError::SingularIntrinsics(k),
        }
    }
}

impl From<RansacError> for FrameError {
    fn from(err: RansacError) -> Self {
        match err {
            RansacError::InsufficientCorrespondences { required, actual } => {
                FrameError::InsufficientCorrespondences { required, actual }
            }
            RansacError::DegenerateEstimation(iterations) => {
                FrameError::DegenerateEstimation(iterations)
            }
            other => FrameError::Ransac(other),
        }
    }
}

impl From<EssentialError> for FrameError {
    fn from(err: EssentialError) -> Self {
        match err {
            EssentialError::InvalidDecomposition(reason) => {
                FrameError::InvalidDecomposition(reason)
            }
            other => FrameError::Essential(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ransac_errors_map_to_frame_failures() {
        let err: FrameError = RansacError::InsufficientCorrespondences {
            required: 8,
            actual: 3,
        }
        .into();
        assert!(matches!(
            err,
            FrameError::InsufficientCorrespondences {
                required: 8,
                actual: 3
            }
        ));
        assert!(err.is_recoverable());

        let err: FrameError = RansacError::DegenerateEstimation(200).into();
        assert!(err.is_recoverable());

        let err: FrameError = RansacError::MismatchedLengths(3, 4).into();
        assert!(matches!(err, FrameError::Ransac(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_decomposition_and_camera_errors() {
        let err: FrameError = EssentialError::InvalidDecomposition("det".to_string()).into();
        assert!(err.is_recoverable());

        let err: FrameError = CameraError::SingularIntrinsics([[0.0; 3]; 3]).into();
        assert!(matches!(err, FrameError::SingularIntrinsics(_)));
        assert!(!err.is_recoverable());
        assert!(!FrameError::Stopped.is_recoverable());
    }
}
