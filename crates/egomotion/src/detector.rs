use egomotion_image::Image;
use egomotion_imgproc::color::{gray_from_mean_u8, gray_u8_to_f32};
use egomotion_imgproc::features::{
    good_features_to_track, GoodFeaturesParams, Keypoint, OrbDescriptor,
};

use crate::config::DetectorConfig;
use crate::error::FrameError;
use crate::frame::FrameFeatures;

/// Corner detector followed by a fixed-scale binary descriptor.
#[derive(Clone, Debug)]
pub struct FeatureDetector {
    params: GoodFeaturesParams,
    keypoint_size: f32,
    orb: OrbDescriptor,
}

impl FeatureDetector {
    /// Create a detector from its configuration.
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            params: config.good_features_params(),
            keypoint_size: config.keypoint_size,
            orb: OrbDescriptor::new(),
        }
    }

    /// Detect and describe keypoints in a frame.
    ///
    /// The frame is reduced to one channel by averaging its channels, corners are detected on
    /// it and described at a fixed scale. Corners too close to the border to be described are
    /// dropped.
    pub fn detect<const C: usize>(
        &self,
        image: &Image<u8, C>,
    ) -> Result<FrameFeatures, FrameError> {
        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        gray_from_mean_u8(image, &mut gray)?;

        let mut gray_f32 = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        gray_u8_to_f32(&gray, &mut gray_f32)?;

        let corners = good_features_to_track(&gray_f32, &self.params)?;
        let keypoints: Vec<Keypoint> = corners
            .iter()
            .map(|c| Keypoint {
                response: c.response,
                ..Keypoint::new(c.x as f32, c.y as f32, self.keypoint_size)
            })
            .collect();

        let (keypoints, descriptors) = self.orb.compute(&gray_f32, &keypoints)?;
        log::debug!(
            "detected {} corners, described {}",
            corners.len(),
            keypoints.len()
        );

        Ok(FrameFeatures::new(keypoints, descriptors)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(width: usize, height: usize) -> Image<u8, 3> {
        let data = (0..width * height)
            .flat_map(|i| {
                let (x, y) = (i % width, i / width);
                let v = (((x / 12) * 7 + (y / 12) * 13) % 5) as u8 * 50;
                [v, v / 2, 255 - v]
            })
            .collect();
        Image::new([width, height].into(), data).unwrap()
    }

    #[test]
    fn test_detect_textured_frame() -> Result<(), FrameError> {
        let detector = FeatureDetector::new(&DetectorConfig::default());
        let features = detector.detect(&blocks(160, 120))?;
        assert!(!features.is_empty());
        assert_eq!(features.keypoints().len(), features.descriptors().len());
        for kp in features.keypoints() {
            assert_eq!(kp.size, 20.0);
            assert!(kp.x >= 19.0 && kp.x < 141.0);
            assert!(kp.y >= 19.0 && kp.y < 101.0);
        }
        Ok(())
    }

    #[test]
    fn test_detect_flat_frame() -> Result<(), FrameError> {
        let detector = FeatureDetector::new(&DetectorConfig::default());
        let image = Image::<u8, 1>::from_size_val([64, 48].into(), 128)?;
        assert!(detector.detect(&image)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_max_corners_caps_keypoints() -> Result<(), FrameError> {
        let config = DetectorConfig {
            max_corners: 5,
            ..Default::default()
        };
        let features = FeatureDetector::new(&config).detect(&blocks(160, 120))?;
        assert!(features.len() <= 5);
        Ok(())
    }
}
