use egomotion_3d::camera::CameraIntrinsics;
use egomotion_imgproc::features::{Descriptor, Keypoint};
use egomotion_imgproc::FeatureError;
use serde::{Deserialize, Serialize};

/// Keypoints of one frame with one descriptor each, in the same order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameFeatures {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
}

impl FrameFeatures {
    /// Pair keypoints with their descriptors.
    ///
    /// Fails with [`FeatureError::MismatchedLengths`] if the two lists differ in length.
    pub fn new(
        keypoints: Vec<Keypoint>,
        descriptors: Vec<Descriptor>,
    ) -> Result<Self, FeatureError> {
        if keypoints.len() != descriptors.len() {
            return Err(FeatureError::MismatchedLengths {
                keypoints: keypoints.len(),
                descriptors: descriptors.len(),
            });
        }
        Ok(Self {
            keypoints,
            descriptors,
        })
    }

    /// The keypoints.
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// The descriptors, one per keypoint.
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Number of described keypoints.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Whether the frame has no keypoints.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// A point seen in the current frame and its match in the previous frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Position in the current frame.
    pub current: [f64; 2],
    /// Position in the previous frame.
    pub previous: [f64; 2],
}

impl Correspondence {
    /// Map both pixel positions to normalized image coordinates.
    pub fn normalized(&self, camera: &CameraIntrinsics) -> Self {
        Self {
            current: camera.normalize_point(self.current),
            previous: camera.normalize_point(self.previous),
        }
    }
}
