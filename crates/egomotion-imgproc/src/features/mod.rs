//! Feature detection, description and matching.
//!
//! The front end works on single-channel intensity images and produces, per frame, a set of
//! corner keypoints with one packed 256-bit binary descriptor each:
//!
//! - [`good_features_to_track`]: Shi-Tomasi minimum eigenvalue corners with a quality level and
//!   a minimum pairwise distance.
//! - [`OrbDescriptor`]: oriented binary descriptors computed at a fixed scale.
//! - [`match_descriptors_ratio`]: brute-force Hamming matching with a nearest / second-nearest
//!   ratio test.

mod good_features;
pub use good_features::*;

mod matching;
pub use matching::*;

mod orb;
pub use orb::*;

/// Number of bytes in a packed binary descriptor.
pub const DESCRIPTOR_BYTES: usize = 32;

/// A packed 256-bit binary descriptor.
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// A keypoint detected in one image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    /// Column coordinate in pixels.
    pub x: f32,
    /// Row coordinate in pixels.
    pub y: f32,
    /// Diameter of the meaningful neighbourhood in pixels.
    pub size: f32,
    /// Orientation in radians, filled in by the descriptor.
    pub angle: f32,
    /// Detector response.
    pub response: f32,
}

impl Keypoint {
    /// Create a keypoint at `(x, y)` with the given size and no orientation.
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: 0.0,
            response: 0.0,
        }
    }

    /// The keypoint position as `[x, y]`.
    pub fn pt(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}
