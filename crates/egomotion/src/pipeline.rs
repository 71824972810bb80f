use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use egomotion_3d::camera::CameraIntrinsics;
use egomotion_3d::linalg::rotation_angle;
use egomotion_3d::pose::{decompose_essential, ransac_essential, RansacParams, MIN_CORRESPONDENCES};
use egomotion_image::{Image, ImageSize};
use egomotion_imgproc::features::{match_descriptors_ratio, Keypoint};
use log::{debug, info, warn};
use rand::rngs::StdRng;

use crate::config::TrackerConfig;
use crate::detector::FeatureDetector;
use crate::error::FrameError;
use crate::frame::{Correspondence, FrameFeatures};

/// Relative camera motion between the previous and the current frame.
///
/// Maps current camera coordinates to previous camera coordinates up to the scale and sign
/// of the translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Unit translation direction.
    pub translation: [f64; 3],
}

impl Pose {
    /// Rotation angle in degrees.
    pub fn rotation_angle_deg(&self) -> f64 {
        rotation_angle(&self.rotation).to_degrees()
    }
}

/// Everything the tracker learned from one frame.
#[derive(Debug)]
pub struct FrameResult {
    /// Inlier correspondences in pixels; all ratio-test matches when estimation did not run or
    /// failed.
    pub correspondences: Vec<Correspondence>,
    /// Relative motion, when it could be recovered.
    pub pose: Option<Pose>,
    /// Why no pose was recovered, when a previous frame was available.
    pub failure: Option<FrameError>,
    /// Number of described keypoints in the frame.
    pub num_keypoints: usize,
    /// Number of ratio-test matches against the previous frame.
    pub num_matches: usize,
}

/// Cloneable flag used to stop a [`FrameTracker`] from another thread.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the tracker to stop; subsequent frames are rejected.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Frame-to-frame correspondence and relative pose tracker.
///
/// The tracker keeps the features of the last processed frame. Each new frame is matched
/// against them, the matches are normalized with the camera intrinsics and an essential matrix
/// is estimated robustly, then decomposed into a rotation and a translation direction. The
/// cached features are replaced by those of the new frame whatever the outcome.
///
/// # Example
///
/// ```no_run
/// use egomotion::{FrameTracker, TrackerConfig};
/// use egomotion::image::Image;
///
/// let mut tracker = FrameTracker::new(TrackerConfig::default()).unwrap();
/// let frame = Image::<u8, 3>::from_size_val([960, 540].into(), 0).unwrap();
///
/// // the first frame only primes the tracker
/// assert!(tracker.process(&frame).unwrap().is_empty());
/// ```
pub struct FrameTracker {
    camera: CameraIntrinsics,
    image_size: ImageSize,
    detector: FeatureDetector,
    ratio: f32,
    ransac: RansacParams,
    rng: StdRng,
    previous: Option<FrameFeatures>,
    stop: StopHandle,
    frame_index: usize,
}

impl FrameTracker {
    /// Create a tracker from a configuration.
    ///
    /// # Errors
    ///
    /// The configuration is invalid or its intrinsic matrix is singular.
    pub fn new(config: TrackerConfig) -> Result<Self, FrameError> {
        config.validate()?;
        let camera = config.intrinsics()?;

        Ok(Self {
            camera,
            image_size: config.image_size(),
            detector: FeatureDetector::new(&config.detector),
            ratio: config.matcher.ratio,
            rng: config.ransac.rng(),
            ransac: config.ransac,
            previous: None,
            stop: StopHandle::default(),
            frame_index: 0,
        })
    }

    /// The camera intrinsics.
    pub fn camera(&self) -> &CameraIntrinsics {
        &self.camera
    }

    /// The frame size the tracker accepts.
    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    /// A handle that stops this tracker.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Whether a previous frame is cached.
    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }

    /// Forget the previous frame; the next frame primes the tracker again.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Process a frame and return the inlier correspondences with the previous frame.
    ///
    /// The first frame, or a frame after [`FrameTracker::reset`], returns an empty list. When
    /// estimation fails for this frame the unfiltered matches are returned instead, or the
    /// RANSAC inliers if only the decomposition failed.
    ///
    /// # Errors
    ///
    /// [`FrameError::Stopped`] once the tracker was stopped, [`FrameError::ImageSizeMismatch`]
    /// for a frame of the wrong size, and detection errors.
    pub fn process<const C: usize>(
        &mut self,
        image: &Image<u8, C>,
    ) -> Result<Vec<Correspondence>, FrameError> {
        Ok(self.process_frame(image)?.correspondences)
    }

    /// Process a frame and return the full per-frame result.
    ///
    /// See [`FrameTracker::process`].
    pub fn process_frame<const C: usize>(
        &mut self,
        image: &Image<u8, C>,
    ) -> Result<FrameResult, FrameError> {
        if self.stop.is_stopped() {
            return Err(FrameError::Stopped);
        }
        if image.size() != self.image_size {
            return Err(FrameError::ImageSizeMismatch {
                expected: self.image_size,
                actual: image.size(),
            });
        }

        let features = self.detector.detect(image)?;
        self.process_features(features)
    }

    /// Process the features of a frame detected elsewhere.
    ///
    /// Follows [`FrameTracker::process_frame`] after detection: the features are matched
    /// against the cached ones, then replace them. Descriptors must come from the same
    /// extractor as those of the previous frame.
    pub fn process_features(
        &mut self,
        features: FrameFeatures,
    ) -> Result<FrameResult, FrameError> {
        if self.stop.is_stopped() {
            return Err(FrameError::Stopped);
        }
        let num_keypoints = features.len();

        let outcome = match self.previous.take() {
            Some(previous) => self.correspond(&features, &previous),
            None => {
                info!(
                    "frame {}: {num_keypoints} keypoints, no previous frame",
                    self.frame_index
                );
                Ok(FrameResult {
                    correspondences: Vec::new(),
                    pose: None,
                    failure: None,
                    num_keypoints,
                    num_matches: 0,
                })
            }
        };

        self.previous = Some(features);
        self.frame_index += 1;

        outcome
    }

    fn correspond(
        &mut self,
        current: &FrameFeatures,
        previous: &FrameFeatures,
    ) -> Result<FrameResult, FrameError> {
        let matches =
            match_descriptors_ratio(current.descriptors(), previous.descriptors(), self.ratio);
        let correspondences: Vec<Correspondence> = matches
            .iter()
            .map(|m| Correspondence {
                current: to_f64(&current.keypoints()[m.query_idx]),
                previous: to_f64(&previous.keypoints()[m.train_idx]),
            })
            .collect();

        let mut result = FrameResult {
            correspondences,
            pose: None,
            failure: None,
            num_keypoints: current.len(),
            num_matches: matches.len(),
        };
        debug!(
            "frame {}: {} keypoints, {} matches",
            self.frame_index, result.num_keypoints, result.num_matches
        );

        if result.num_matches < MIN_CORRESPONDENCES {
            return self.fail(
                result,
                FrameError::InsufficientCorrespondences {
                    required: MIN_CORRESPONDENCES,
                    actual: matches.len(),
                },
            );
        }

        let (x1, x2): (Vec<[f64; 2]>, Vec<[f64; 2]>) = result
            .correspondences
            .iter()
            .map(|c| {
                (
                    self.camera.normalize_point(c.current),
                    self.camera.normalize_point(c.previous),
                )
            })
            .unzip();

        let fit = match ransac_essential(&x1, &x2, &self.ransac, &mut self.rng) {
            Ok(fit) => fit,
            Err(err) => return self.fail(result, err.into()),
        };

        result.correspondences = result
            .correspondences
            .iter()
            .zip(fit.inliers.iter())
            .filter_map(|(c, &inlier)| inlier.then_some(*c))
            .collect();

        let (rotation, translation) = match decompose_essential(&fit.model) {
            Ok(rt) => rt,
            Err(err) => return self.fail(result, err.into()),
        };
        let pose = Pose {
            rotation,
            translation,
        };

        info!(
            "frame {}: {}/{} inliers, rotation {:.3} deg, translation [{:.3}, {:.3}, {:.3}]",
            self.frame_index,
            fit.inlier_count,
            result.num_matches,
            pose.rotation_angle_deg(),
            translation[0],
            translation[1],
            translation[2]
        );

        result.pose = Some(pose);
        Ok(result)
    }

    fn fail(
        &self,
        mut result: FrameResult,
        failure: FrameError,
    ) -> Result<FrameResult, FrameError> {
        if !failure.is_recoverable() {
            return Err(failure);
        }
        warn!("frame {}: no pose, {failure}", self.frame_index);
        result.failure = Some(failure);
        Ok(result)
    }
}

fn to_f64(kp: &Keypoint) -> [f64; 2] {
    [kp.x as f64, kp.y as f64]
}
