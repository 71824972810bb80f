use egomotion_image::Image;
use rayon::prelude::*;

use super::{Descriptor, Keypoint, DESCRIPTOR_BYTES};
use crate::error::FeatureError;
use crate::filter::gaussian_blur;

/// Radius of the circular patch used for orientation.
const HALF_PATCH_SIZE: i32 = 15;

/// Distance to the image border below which keypoints are not described. Pattern offsets lie in
/// `[-13, 13]` on each axis, so a rotated and rounded offset stays within 18 pixels.
const EDGE_THRESHOLD: usize = 19;

const DESCRIPTOR_BITS: usize = DESCRIPTOR_BYTES * 8;

/// Oriented binary descriptor computed at a fixed scale.
///
/// Each keypoint gets an orientation from the intensity centroid of its circular patch, then
/// 256 intensity comparisons between the point pairs of the learned ORB sampling pattern,
/// rotated by that orientation, are packed into a [`Descriptor`]. Comparisons run on a Gaussian
/// smoothed copy of the image (7x7, sigma 2).
#[derive(Clone, Copy, Debug, Default)]
pub struct OrbDescriptor;

impl OrbDescriptor {
    /// Create a descriptor extractor.
    pub fn new() -> Self {
        Self
    }

    /// Minimum distance in pixels between a described keypoint and the image border.
    pub fn border(&self) -> usize {
        EDGE_THRESHOLD
    }

    /// Compute descriptors for the given keypoints.
    ///
    /// Keypoints whose patch does not fit inside the image are dropped. The returned keypoints
    /// carry their orientation and are in the same order as the returned descriptors.
    ///
    /// # Arguments
    ///
    /// * `src` - The grayscale image the keypoints were detected in.
    /// * `keypoints` - The keypoints to describe.
    pub fn compute(
        &self,
        src: &Image<f32, 1>,
        keypoints: &[Keypoint],
    ) -> Result<(Vec<Keypoint>, Vec<Descriptor>), FeatureError> {
        let border = self.border() as i64;
        let (width, height) = (src.width() as i64, src.height() as i64);

        let inside: Vec<(Keypoint, [i64; 2])> = keypoints
            .iter()
            .filter_map(|kp| {
                let x = kp.x.round() as i64;
                let y = kp.y.round() as i64;
                let fits = x >= border && x < width - border && y >= border && y < height - border;
                fits.then_some((*kp, [x, y]))
            })
            .collect();

        if inside.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut blurred = Image::from_size_val(src.size(), 0.0f32)?;
        gaussian_blur(src, &mut blurred, (7, 7), (2.0, 2.0))?;

        let described: Vec<(Keypoint, Descriptor)> = inside
            .par_iter()
            .map(|&(kp, [x, y])| {
                let angle = intensity_centroid_angle(src, x as usize, y as usize);
                let descriptor = describe(&blurred, x as usize, y as usize, angle);
                (Keypoint { angle, ..kp }, descriptor)
            })
            .collect();

        Ok(described.into_iter().unzip())
    }
}

fn describe(blurred: &Image<f32, 1>, x: usize, y: usize, angle: f32) -> Descriptor {
    let (sin_a, cos_a) = angle.sin_cos();
    let size = blurred.size();
    let data = blurred.as_slice();
    // pattern entries are (row, col) offsets
    let sample = |[pr, pc]: [i8; 2]| {
        let (px, py) = (pc as f32, pr as f32);
        let rx = (cos_a * px - sin_a * py).round() as isize;
        let ry = (sin_a * px + cos_a * py).round() as isize;
        let col = (x as isize + rx) as usize;
        let row = (y as isize + ry) as usize;
        data[size.index(row, col)]
    };

    let mut descriptor = [0u8; DESCRIPTOR_BYTES];
    for (bit, (&p0, &p1)) in PATTERN_FIRST.iter().zip(PATTERN_SECOND.iter()).enumerate() {
        if sample(p0) < sample(p1) {
            descriptor[bit / 8] |= 1 << (bit % 8);
        }
    }
    descriptor
}

/// Orientation of the patch around `(x, y)` from its intensity centroid, in radians.
fn intensity_centroid_angle(src: &Image<f32, 1>, x: usize, y: usize) -> f32 {
    let size = src.size();
    let data = src.as_slice();
    let radius2 = HALF_PATCH_SIZE * HALF_PATCH_SIZE;

    let mut m01 = 0f32;
    let mut m10 = 0f32;
    for dy in -HALF_PATCH_SIZE..=HALF_PATCH_SIZE {
        let row = (y as i32 + dy) as usize;
        let mut m01_tmp = 0f32;
        for dx in -HALF_PATCH_SIZE..=HALF_PATCH_SIZE {
            if dx * dx + dy * dy > radius2 {
                continue;
            }
            let col = (x as i32 + dx) as usize;
            let pixel = data[size.index(row, col)];
            m10 += pixel * dx as f32;
            m01_tmp += pixel;
        }
        m01 += m01_tmp * dy as f32;
    }

    m01.atan2(m10)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(width: usize, height: usize) -> Image<f32, 1> {
        let data = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as f32, (i / width) as f32);
                0.5 + 0.25 * (0.7 * x).sin() * (0.3 * y + 0.2 * x).cos()
                    + 0.2 * ((x * 0.13 + y * 0.41).sin() * 3.0).cos()
            })
            .collect();
        Image::new([width, height].into(), data).unwrap()
    }

    #[test]
    fn test_pattern_pairs_are_distinct_and_bounded() {
        for (p0, p1) in PATTERN_FIRST.iter().zip(PATTERN_SECOND.iter()) {
            assert_ne!(p0, p1);
            for p in [p0, p1] {
                let (r, c) = (p[0] as f32, p[1] as f32);
                assert!((r * r + c * c).sqrt() + 0.5 < EDGE_THRESHOLD as f32);
            }
        }
    }

    #[test]
    fn test_descriptor_is_rotation_invariant() -> Result<(), FeatureError> {
        // radially symmetric blob with one bright lobe; the rotated copy is built analytically
        let size = 61;
        let render = |theta: f32| -> Result<Image<f32, 1>, FeatureError> {
            let c = (size / 2) as f32;
            let data = (0..size * size)
                .map(|i| {
                    let (x, y) = ((i % size) as f32 - c, (i / size) as f32 - c);
                    let (sin_t, cos_t) = theta.sin_cos();
                    // rotate the sample position back into the reference frame
                    let (u, v) = (cos_t * x + sin_t * y, -sin_t * x + cos_t * y);
                    let r = (u * u + v * v).sqrt();
                    0.5 + 0.3 * (-r / 8.0).exp() * (1.0 + u / (r + 1.0))
                        + 0.1 * (0.5 * u).sin() * (0.3 * v).cos()
                })
                .collect();
            Ok(Image::new([size, size].into(), data)?)
        };

        let orb = OrbDescriptor::new();
        let kp = [Keypoint::new(30.0, 30.0, 20.0)];
        let (kp_a, d_a) = orb.compute(&render(0.0)?, &kp)?;
        let (kp_b, d_b) = orb.compute(&render(std::f32::consts::FRAC_PI_2)?, &kp)?;

        let mut turn = kp_b[0].angle - kp_a[0].angle;
        while turn < 0.0 {
            turn += std::f32::consts::TAU;
        }
        assert!((turn - std::f32::consts::FRAC_PI_2).abs() < 0.05, "turned by {turn}");

        let differing: u32 = d_a[0]
            .iter()
            .zip(d_b[0].iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        assert!(differing < 32, "{differing} bits differ");
        Ok(())
    }

    #[test]
    fn test_border_keypoints_are_dropped() -> Result<(), FeatureError> {
        let img = textured(64, 48);
        let orb = OrbDescriptor::new();
        let kps = vec![
            Keypoint::new(2.0, 20.0, 20.0),
            Keypoint::new(32.0, 24.0, 20.0),
            Keypoint::new(60.0, 20.0, 20.0),
            Keypoint::new(30.0, 47.0, 20.0),
        ];
        let (kept, descriptors) = orb.compute(&img, &kps)?;
        assert_eq!(kept.len(), 1);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(kept[0].pt(), [32.0, 24.0]);
        Ok(())
    }

    #[test]
    fn test_empty_keypoints() -> Result<(), FeatureError> {
        let img = textured(40, 40);
        let (kept, descriptors) = OrbDescriptor::new().compute(&img, &[])?;
        assert!(kept.is_empty());
        assert!(descriptors.is_empty());
        Ok(())
    }

    #[test]
    fn test_same_patch_same_descriptor() -> Result<(), FeatureError> {
        // the image repeats with a period of 20 columns
        let (width, height) = (80, 40);
        let data = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) % 20, i / width);
                ((x * 7 + y * 13) % 17) as f32 / 17.0
            })
            .collect();
        let img = Image::<f32, 1>::new([width, height].into(), data)?;
        let orb = OrbDescriptor::new();
        let kps = vec![Keypoint::new(25.0, 20.0, 20.0), Keypoint::new(45.0, 20.0, 20.0)];
        let (kept, descriptors) = orb.compute(&img, &kps)?;
        assert_eq!(kept.len(), 2);
        assert_eq!(descriptors[0], descriptors[1]);
        assert!((kept[0].angle - kept[1].angle).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_orientation_of_gradient() -> Result<(), FeatureError> {
        let size = 41;
        let data = (0..size * size)
            .map(|i| (i % size) as f32 / (size - 1) as f32)
            .collect();
        let img = Image::<f32, 1>::new([size, size].into(), data)?;
        let angle = intensity_centroid_angle(&img, size / 2, size / 2);
        assert!(angle.abs() < 0.1, "expected ~0 rad, got {angle}");
        Ok(())
    }
}

/// First point of each comparison of the learned ORB sampling pattern.
const PATTERN_FIRST: [[i8; 2]; DESCRIPTOR_BITS] = [
    [8, -3], [4, 2], [-11, 9], [7, -12], [2, -13], [1, -7], [-2, -10], [-13, -13],
    [-13, -3], [10, 4], [-13, -8], [-11, 7], [7, 7], [-4, -5], [-13, 2], [-9, 0],
    [12, -6], [-3, 6], [-6, -13], [11, -13], [4, 7], [5, -3], [3, -7], [-8, -7],
    [-2, 11], [-13, 12], [-7, 3], [-4, 2], [-10, -12], [5, -12], [5, -6], [1, 0],
    [9, 11], [4, 7], [2, -1], [-4, -12], [-8, -5], [4, 11], [0, -8], [-13, -2],
    [-3, -2], [-6, 9], [8, 12], [0, 9], [7, -5], [-13, -6], [10, 7], [-6, -3],
    [10, -9], [-13, 8], [-13, 0], [3, 3], [5, 7], [-1, 7], [3, -10], [2, -4],
    [-13, 0], [-13, -7], [-13, 3], [-7, 12], [6, -10], [-9, -1], [-2, -5], [-12, 5],
    [3, -10], [-7, -7], [-3, -2], [2, 9], [-11, -13], [-1, 6], [5, -3], [-4, -13],
    [-9, -6], [-12, -10], [10, 2], [7, 12], [-7, -13], [-4, 9], [7, -1], [-7, 6],
    [-13, 11], [-3, 7], [7, -8], [-13, -7], [1, -3], [2, -6], [-4, 3], [-1, -13],
    [7, 1], [1, -1], [9, 1], [-1, -9], [-13, -13], [7, 7], [12, -5], [6, 3],
    [5, -13], [2, -12], [3, 8], [2, 6], [9, -12], [-8, 4], [-11, 12], [1, 12],
    [6, -9], [2, 3], [6, 3], [3, -3], [7, 8], [-11, -5], [-10, 11], [-5, -8],
    [-10, 5], [8, -1], [4, -6], [-10, 12], [4, -2], [-2, 0], [-5, -8], [7, -6],
    [-9, -13], [-5, -13], [8, -8], [-9, -11], [1, -8], [7, -4], [-2, 1], [11, -6],
    [-12, -9], [3, 7], [5, 5], [0, -4], [-9, 12], [0, 7], [-1, 2], [5, 11],
    [3, 5], [-13, -4], [-5, 9], [-4, -7], [6, 5], [-7, 6], [-13, 6], [1, -10],
    [4, 1], [-2, -2], [2, -12], [-2, -13], [4, 1], [-6, -10], [-3, -13], [7, 5],
    [4, -2], [-13, 9], [7, 1], [7, -8], [-7, -4], [-8, 11], [-13, 6], [2, 4],
    [10, -5], [-6, -5], [8, -3], [2, -12], [-11, -2], [-12, -13], [-11, 0], [5, -3],
    [-2, -13], [-1, -8], [-13, -11], [-10, -2], [-3, 9], [2, -3], [-9, -13], [-4, 6],
    [-4, 12], [-6, -11], [6, -3], [-13, 11], [11, 11], [7, -5], [-1, 12], [-4, -8],
    [-7, 1], [-13, -12], [-7, -2], [-8, 5], [-5, -1], [-13, 7], [1, 5], [1, 0],
    [9, 12], [5, -8], [-1, 11], [-9, -3], [-1, -10], [-13, 1], [8, -11], [2, -13],
    [7, -13], [-10, -10], [-10, -8], [4, -6], [3, 12], [-4, 2], [5, -13], [4, -13],
    [-9, 9], [0, 3], [-12, 1], [3, 2], [-10, -10], [8, -13], [-8, -12], [2, 2],
    [10, 6], [6, 8], [-7, 10], [-3, -9], [-1, -13], [-3, -7], [-8, -2], [4, 2],
    [2, -5], [6, -9], [3, -1], [11, -1], [-3, 0], [4, -11], [2, -4], [-10, -6],
    [-13, 7], [-13, 12], [6, 0], [0, -1], [-13, 3], [-9, 8], [-13, -6], [5, -9],
    [2, 7], [-1, -6], [9, 5], [11, -3], [3, 0], [-1, 4], [3, -6], [-13, 0],
    [5, 8], [8, 9], [7, -4], [-10, 4], [7, 3], [9, -7], [7, 0], [-1, -6],
];

/// Second point of each comparison.
const PATTERN_SECOND: [[i8; 2]; DESCRIPTOR_BITS] = [
    [9, 5], [7, -12], [-8, 2], [12, -13], [2, 12], [1, 6], [-2, -4], [-11, -8],
    [-12, -9], [11, 9], [-8, -9], [-9, 12], [12, 6], [-3, 0], [-12, -3], [-7, 5],
    [12, -1], [-2, 12], [-4, -8], [12, -8], [5, 1], [10, -3], [6, 12], [-6, -2],
    [-1, -10], [-8, 10], [-5, -3], [-3, 7], [-6, 11], [6, -7], [7, -1], [4, -5],
    [11, -13], [4, 12], [4, 4], [-2, 7], [-7, -10], [9, 12], [1, -13], [-8, 2],
    [-2, 3], [-4, -9], [10, 7], [1, 3], [11, -10], [-11, 0], [12, 1], [-6, 12],
    [12, -4], [-8, -12], [-8, -4], [7, 8], [10, -7], [1, -12], [5, 6], [3, -10],
    [-13, 5], [-12, 12], [-11, 8], [-4, 7], [12, 8], [-7, -6], [0, 12], [-7, 5],
    [8, -13], [-4, 5], [-1, -7], [5, -11], [-5, -13], [0, -1], [5, 2], [-4, 12],
    [-9, 6], [-8, -4], [12, -3], [12, 12], [-6, 5], [-3, 4], [12, 2], [-5, 1],
    [-12, 5], [-2, -6], [12, -7], [-11, -12], [12, 12], [3, 0], [-2, -13], [1, 9],
    [8, -6], [3, 12], [12, 6], [-1, 3], [-10, 5], [10, 12], [12, 9], [7, 11],
    [6, 10], [2, 3], [4, -6], [12, -13], [10, 3], [-7, 9], [-4, -6], [2, -8],
    [7, -4], [3, -2], [11, 0], [8, -8], [9, 3], [-6, -4], [-5, 10], [-3, 12],
    [-9, 0], [12, -6], [6, -11], [-8, 7], [6, 7], [-2, 12], [-5, 2], [10, 12],
    [-8, -8], [-5, -2], [9, -13], [-9, 0], [1, -2], [9, 1], [-1, -4], [12, -11],
    [-6, 4], [7, 12], [10, 8], [2, 8], [-5, -13], [2, 12], [1, 7], [7, -9],
    [6, -8], [-8, 9], [-3, -3], [-3, -12], [8, 0], [-6, 12], [-5, -2], [3, 10],
    [8, -4], [2, -13], [12, 12], [0, -6], [9, 3], [-3, -5], [-1, 1], [12, -11],
    [5, -7], [-9, -5], [8, 6], [7, 6], [-7, 1], [-7, -8], [-12, -8], [3, 9],
    [12, 3], [-6, 7], [9, -8], [2, 8], [-10, 3], [-7, -9], [-10, -5], [11, 8],
    [-1, 12], [0, 9], [-12, -5], [-10, 11], [-2, -13], [3, 2], [-4, 0], [-3, -10],
    [-2, -7], [-4, 9], [6, 11], [-5, 5], [12, 6], [12, -2], [0, 7], [-3, -2],
    [-6, 7], [-8, -13], [-6, -8], [-6, -9], [-4, 5], [-8, 10], [5, -13], [10, -13],
    [10, -1], [10, -9], [1, -13], [-6, 2], [1, 12], [-8, -10], [10, -6], [3, -6],
    [12, -9], [-5, -7], [-8, -13], [8, 5], [8, -13], [-3, -3], [10, -12], [5, -1],
    [-4, 3], [3, -9], [-6, 1], [4, -8], [-10, 9], [12, 12], [-6, -5], [3, 7],
    [11, -8], [8, -12], [-6, 5], [-3, 9], [-1, 5], [-3, 4], [-8, 3], [12, 12],
    [3, 11], [11, -13], [7, 12], [12, 4], [-3, 6], [4, 12], [2, 1], [-8, 1],
    [-11, 1], [-11, -13], [11, -13], [1, 4], [-9, -2], [-6, -3], [-8, -2], [8, 10],
    [3, -9], [-1, -1], [11, -2], [12, -8], [3, 5], [0, 10], [4, 5], [-10, 5],
    [12, 11], [9, -6], [8, -12], [-10, 9], [12, 4], [10, -2], [12, -2], [0, -11],
];
