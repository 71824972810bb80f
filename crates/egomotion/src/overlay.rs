use egomotion_3d::camera::CameraIntrinsics;
use serde::Serialize;

use crate::frame::Correspondence;

/// A match drawn as a segment from the current to the previous pixel position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Pixel in the current frame, where the marker goes.
    pub current: [i64; 2],
    /// Pixel in the previous frame.
    pub previous: [i64; 2],
}

/// Map normalized correspondences back to integer pixel segments.
///
/// # Arguments
///
/// * `camera` - The camera the correspondences were normalized with.
/// * `correspondences` - Correspondences in normalized image coordinates.
pub fn match_segments(
    camera: &CameraIntrinsics,
    correspondences: &[Correspondence],
) -> Vec<Segment> {
    correspondences
        .iter()
        .map(|c| Segment {
            current: camera.denormalize(c.current),
            previous: camera.denormalize(c.previous),
        })
        .collect()
}
