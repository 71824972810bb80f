//! # Pose estimation
//!
//! Two-view geometry on calibrated (normalized) correspondences.
//!
//! - [`essential`]: 8-point essential matrix solver, Sampson residual and decomposition into
//!   a rotation and a translation direction
//! - [`ransac`]: robust essential matrix estimation

/// Essential matrix estimation and decomposition.
pub mod essential;
pub use essential::*;

/// Robust estimation with RANSAC.
pub mod ransac;
pub use ransac::*;
