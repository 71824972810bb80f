#![deny(missing_docs)]
#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use egomotion_image as image;

#[doc(inline)]
pub use egomotion_imgproc as imgproc;

#[doc(inline)]
pub use egomotion_3d as k3d;

/// Tracker configuration.
pub mod config;

/// Feature detection on full frames.
pub mod detector;

/// Error types of the frame pipeline.
pub mod error;

/// Per-frame features and correspondences.
pub mod frame;

/// Helpers to draw correspondences on top of a frame.
pub mod overlay;

/// The frame-to-frame correspondence pipeline.
pub mod pipeline;

pub use config::TrackerConfig;
pub use error::FrameError;
pub use frame::{Correspondence, FrameFeatures};
pub use pipeline::{FrameResult, FrameTracker, Pose, StopHandle};
