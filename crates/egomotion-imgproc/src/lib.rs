#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Color transformations module.
pub mod color;

/// Error types for the feature extraction module.
pub mod error;

/// Feature detection, description and matching module.
pub mod features;

/// Image filtering module.
pub mod filter;

/// Utility functions for parallel processing.
pub mod parallel;

pub use error::FeatureError;
