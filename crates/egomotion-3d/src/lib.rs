#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera intrinsics.
pub mod camera;

/// Linear algebra utilities.
pub mod linalg;

/// Pose estimation algorithms.
pub mod pose;
