use crate::linalg::{mat33_inverse, mat33_mul_vec3};

/// Errors raised when building a camera model.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CameraError {
    /// The intrinsic matrix is not invertible or has non-finite entries.
    #[error("Intrinsic matrix is singular or not finite: {0:?}")]
    SingularIntrinsics([[f64; 3]; 3]),
}

/// Pinhole camera intrinsics together with their inverse.
///
/// Converts between pixel coordinates and normalized image-plane coordinates. The inverse is
/// computed once at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsics {
    k: [[f64; 3]; 3],
    k_inv: [[f64; 3]; 3],
}

impl CameraIntrinsics {
    /// Create a camera from a 3x3 intrinsic matrix.
    ///
    /// # Errors
    ///
    /// [`CameraError::SingularIntrinsics`] if `k` cannot be inverted.
    pub fn new(k: [[f64; 3]; 3]) -> Result<Self, CameraError> {
        let k_inv = mat33_inverse(&k).ok_or(CameraError::SingularIntrinsics(k))?;
        Ok(Self { k, k_inv })
    }

    /// Create a camera from focal lengths and a principal point, all in pixels.
    pub fn from_focal_principal(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraError> {
        Self::new([[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]])
    }

    /// Create a camera with a single focal length and the principal point at the image centre.
    ///
    /// The centre is `(width / 2, height / 2)` with integer division.
    pub fn from_focal_and_size(focal: f64, width: usize, height: usize) -> Result<Self, CameraError> {
        Self::from_focal_principal(focal, focal, (width / 2) as f64, (height / 2) as f64)
    }

    /// The intrinsic matrix.
    pub fn k(&self) -> &[[f64; 3]; 3] {
        &self.k
    }

    /// The inverse of the intrinsic matrix.
    pub fn k_inv(&self) -> &[[f64; 3]; 3] {
        &self.k_inv
    }

    /// Map a pixel coordinate to normalized image-plane coordinates.
    pub fn normalize_point(&self, p: [f64; 2]) -> [f64; 2] {
        let x = mat33_mul_vec3(&self.k_inv, &[p[0], p[1], 1.0]);
        [x[0] / x[2], x[1] / x[2]]
    }

    /// Map pixel coordinates to normalized image-plane coordinates.
    pub fn normalize(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        points.iter().map(|&p| self.normalize_point(p)).collect()
    }

    /// Map a normalized coordinate back to the nearest integer pixel coordinate.
    pub fn denormalize(&self, p: [f64; 2]) -> [i64; 2] {
        let x = mat33_mul_vec3(&self.k, &[p[0], p[1], 1.0]);
        [(x[0] / x[2]).round() as i64, (x[1] / x[2]).round() as i64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_principal_point_maps_to_origin() -> Result<(), CameraError> {
        let cam = CameraIntrinsics::from_focal_and_size(270.0, 960, 540)?;
        let n = cam.normalize_point([480.0, 270.0]);
        assert_relative_eq!(n[0], 0.0);
        assert_relative_eq!(n[1], 0.0);
        assert_eq!(cam.denormalize([0.0, 0.0]), [480, 270]);
        Ok(())
    }

    #[test]
    fn test_normalize() -> Result<(), CameraError> {
        let cam = CameraIntrinsics::from_focal_principal(270.0, 270.0, 480.0, 270.0)?;
        let n = cam.normalize(&[[750.0, 270.0], [480.0, 0.0]]);
        assert_relative_eq!(n[0][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(n[0][1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(n[1][0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(n[1][1], -1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_roundtrip_integer_pixels() -> Result<(), CameraError> {
        let cam = CameraIntrinsics::new([[500.0, 0.5, 321.0], [0.0, 480.0, 239.0], [0.0, 0.0, 1.0]])?;
        for p in [[0.0, 0.0], [17.0, 400.0], [639.0, 479.0], [-5.0, 12.0]] {
            let q = cam.denormalize(cam.normalize_point(p));
            assert_eq!(q, [p[0] as i64, p[1] as i64]);
        }
        Ok(())
    }

    #[test]
    fn test_odd_size_centre_uses_integer_division() -> Result<(), CameraError> {
        let cam = CameraIntrinsics::from_focal_and_size(100.0, 641, 481)?;
        assert_relative_eq!(cam.k()[0][2], 320.0);
        assert_relative_eq!(cam.k()[1][2], 240.0);
        Ok(())
    }

    #[test]
    fn test_singular_intrinsics() {
        let res = CameraIntrinsics::from_focal_principal(0.0, 270.0, 480.0, 270.0);
        assert!(matches!(res, Err(CameraError::SingularIntrinsics(_))));
        let res = CameraIntrinsics::from_focal_principal(f64::NAN, 270.0, 480.0, 270.0);
        assert!(matches!(res, Err(CameraError::SingularIntrinsics(_))));
    }
}
