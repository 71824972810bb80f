use egomotion_image::ImageError;

/// Errors raised while detecting or describing features.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FeatureError {
    /// The underlying image operation failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// A detector or descriptor parameter is out of range.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Keypoints and descriptors do not pair up.
    #[error("Got {keypoints} keypoints but {descriptors} descriptors")]
    MismatchedLengths {
        /// Number of keypoints.
        keypoints: usize,
        /// Number of descriptors.
        descriptors: usize,
    },
}
