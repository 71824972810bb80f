use egomotion_image::{Image, ImageError};
use rayon::prelude::*;

use crate::error::FeatureError;
use crate::filter::{box_blur, spatial_gradient};

/// Parameters of the Shi-Tomasi corner detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GoodFeaturesParams {
    /// Maximum number of corners to return.
    pub max_corners: usize,
    /// Minimum accepted response relative to the strongest response in the image.
    pub quality_level: f32,
    /// Minimum Euclidean distance in pixels between two returned corners.
    pub min_distance: f32,
}

impl Default for GoodFeaturesParams {
    fn default() -> Self {
        Self {
            max_corners: 3000,
            quality_level: 0.01,
            min_distance: 3.0,
        }
    }
}

impl GoodFeaturesParams {
    /// Check that the parameters are in range.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.max_corners == 0 {
            return Err(FeatureError::InvalidParameter {
                name: "max_corners",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.quality_level.is_nan() || self.quality_level <= 0.0 || self.quality_level > 1.0 {
            return Err(FeatureError::InvalidParameter {
                name: "quality_level",
                reason: format!("must be in (0, 1], got {}", self.quality_level),
            });
        }
        if self.min_distance.is_nan() || self.min_distance < 0.0 {
            return Err(FeatureError::InvalidParameter {
                name: "min_distance",
                reason: format!("must be non-negative, got {}", self.min_distance),
            });
        }
        Ok(())
    }
}

/// A corner candidate with its pixel position and detector response.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    /// Column of the corner.
    pub x: usize,
    /// Row of the corner.
    pub y: usize,
    /// Minimum eigenvalue of the structure tensor at the corner.
    pub response: f32,
}

/// Compute the Shi-Tomasi response: the smallest eigenvalue of the 3x3 structure tensor.
///
/// # Arguments
///
/// * `src` - The source grayscale image.
/// * `dst` - The response image, same size as `src`.
pub fn min_eigenvalue_response(
    src: &Image<f32, 1>,
    dst: &mut Image<f32, 1>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let size = src.size();
    let mut dx = Image::from_size_val(size, 0.0f32)?;
    let mut dy = Image::from_size_val(size, 0.0f32)?;
    spatial_gradient(src, &mut dx, &mut dy)?;

    let products = |f: fn(f32, f32) -> f32| -> Result<Image<f32, 1>, ImageError> {
        let data = dx
            .as_slice()
            .par_iter()
            .zip(dy.as_slice().par_iter())
            .map(|(&gx, &gy)| f(gx, gy))
            .collect();
        Image::new(size, data)
    };
    let ixx = products(|gx, _| gx * gx)?;
    let iyy = products(|_, gy| gy * gy)?;
    let ixy = products(|gx, gy| gx * gy)?;

    let mut a = Image::from_size_val(size, 0.0f32)?;
    let mut b = Image::from_size_val(size, 0.0f32)?;
    let mut c = Image::from_size_val(size, 0.0f32)?;
    box_blur(&ixx, &mut a, (3, 3))?;
    box_blur(&ixy, &mut b, (3, 3))?;
    box_blur(&iyy, &mut c, (3, 3))?;

    dst.as_slice_mut()
        .par_iter_mut()
        .zip(a.as_slice().par_iter())
        .zip(b.as_slice().par_iter().zip(c.as_slice().par_iter()))
        .for_each(|((out, &a), (&b, &c))| {
            let half_trace = 0.5 * (a + c);
            let half_diff = 0.5 * (a - c);
            *out = half_trace - (half_diff * half_diff + b * b).sqrt();
        });

    Ok(())
}

/// Detect the strongest corners in an image (Shi-Tomasi "good features to track").
///
/// Corners are local 3x3 maxima of [`min_eigenvalue_response`] whose response is at least
/// `quality_level` times the strongest response. They are visited strongest first and kept
/// only if no already accepted corner lies closer than `min_distance`, until `max_corners`
/// corners have been accepted. Returning fewer corners than requested is not an error.
///
/// # Arguments
///
/// * `src` - The source grayscale image.
/// * `params` - The detector parameters.
///
/// # Returns
///
/// The accepted corners, strongest first.
pub fn good_features_to_track(
    src: &Image<f32, 1>,
    params: &GoodFeaturesParams,
) -> Result<Vec<Corner>, FeatureError> {
    params.validate()?;

    let (cols, rows) = (src.cols(), src.rows());
    if cols < 3 || rows < 3 {
        return Ok(Vec::new());
    }

    let mut response = Image::from_size_val(src.size(), 0.0f32)?;
    min_eigenvalue_response(src, &mut response)?;

    let max_response = response
        .as_slice()
        .par_iter()
        .cloned()
        .reduce(|| 0.0f32, f32::max);
    if max_response <= 0.0 {
        return Ok(Vec::new());
    }
    let threshold = params.quality_level * max_response;

    let resp = response.as_slice();
    let mut candidates: Vec<Corner> = (1..rows - 1)
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row_corners = Vec::new();
            for x in 1..cols - 1 {
                let val = resp[y * cols + x];
                if val < threshold {
                    continue;
                }
                let is_max = (y - 1..=y + 1)
                    .all(|yy| (x - 1..=x + 1).all(|xx| resp[yy * cols + xx] <= val));
                if is_max {
                    row_corners.push(Corner {
                        x,
                        y,
                        response: val,
                    });
                }
            }
            row_corners
        })
        .collect();

    // stable sort keeps raster order between equal responses
    candidates.sort_by(|a, b| b.response.total_cmp(&a.response));

    let corners = select_with_min_distance(
        &candidates,
        cols,
        rows,
        params.min_distance,
        params.max_corners,
    );
    log::debug!(
        "good features: {} local maxima, {} accepted",
        candidates.len(),
        corners.len()
    );

    Ok(corners)
}

fn select_with_min_distance(
    candidates: &[Corner],
    cols: usize,
    rows: usize,
    min_distance: f32,
    max_corners: usize,
) -> Vec<Corner> {
    if min_distance < 1.0 {
        return candidates.iter().take(max_corners).copied().collect();
    }

    let cell = min_distance;
    let grid_w = (cols as f32 / cell).ceil() as usize;
    let grid_h = (rows as f32 / cell).ceil() as usize;
    let mut grid: Vec<Vec<(f32, f32)>> = vec![Vec::new(); grid_w * grid_h];
    let min_dist_sq = min_distance * min_distance;

    let mut accepted = Vec::with_capacity(max_corners.min(candidates.len()));
    for corner in candidates {
        let (x, y) = (corner.x as f32, corner.y as f32);
        let gx = ((x / cell) as usize).min(grid_w - 1);
        let gy = ((y / cell) as usize).min(grid_h - 1);

        let too_close = (gy.saturating_sub(1)..=(gy + 1).min(grid_h - 1)).any(|cy| {
            (gx.saturating_sub(1)..=(gx + 1).min(grid_w - 1)).any(|cx| {
                grid[cy * grid_w + cx].iter().any(|&(px, py)| {
                    let (ddx, ddy) = (px - x, py - y);
                    ddx * ddx + ddy * ddy < min_dist_sq
                })
            })
        });
        if too_close {
            continue;
        }

        grid[gy * grid_w + gx].push((x, y));
        accepted.push(*corner);
        if accepted.len() == max_corners {
            break;
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: usize, square: usize) -> Image<f32, 1> {
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if ((x / square) + (y / square)) % 2 == 0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        Image::new([size, size].into(), data).unwrap()
    }

    #[test]
    fn test_flat_image_has_no_corners() -> Result<(), FeatureError> {
        let img = Image::<f32, 1>::from_size_val([32, 32].into(), 0.3)?;
        let corners = good_features_to_track(&img, &GoodFeaturesParams::default())?;
        assert!(corners.is_empty());
        Ok(())
    }

    #[test]
    fn test_single_square_corners() -> Result<(), FeatureError> {
        // bright square on a dark background: four strong corners
        let size = 40;
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if (12..28).contains(&x) && (12..28).contains(&y) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let img = Image::<f32, 1>::new([size, size].into(), data)?;
        let params = GoodFeaturesParams {
            max_corners: 4,
            quality_level: 0.1,
            min_distance: 5.0,
        };
        let corners = good_features_to_track(&img, &params)?;
        assert_eq!(corners.len(), 4);
        for c in &corners {
            let near_x = (c.x as i32 - 12).abs() <= 2 || (c.x as i32 - 27).abs() <= 2;
            let near_y = (c.y as i32 - 12).abs() <= 2 || (c.y as i32 - 27).abs() <= 2;
            assert!(near_x && near_y, "unexpected corner {c:?}");
        }
        Ok(())
    }

    #[test]
    fn test_min_distance_and_max_corners() -> Result<(), FeatureError> {
        let img = checkerboard(64, 8);
        let params = GoodFeaturesParams {
            max_corners: 20,
            quality_level: 0.01,
            min_distance: 6.0,
        };
        let corners = good_features_to_track(&img, &params)?;
        assert!(!corners.is_empty());
        assert!(corners.len() <= 20);
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                let dx = a.x as f32 - b.x as f32;
                let dy = a.y as f32 - b.y as f32;
                assert!(dx * dx + dy * dy >= 36.0);
            }
        }
        for w in corners.windows(2) {
            assert!(w[0].response >= w[1].response);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_params() {
        let img = checkerboard(16, 4);
        let params = GoodFeaturesParams {
            quality_level: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            good_features_to_track(&img, &params),
            Err(FeatureError::InvalidParameter { name: "quality_level", .. })
        ));
    }

    #[test]
    fn test_tiny_image() -> Result<(), FeatureError> {
        let img = Image::<f32, 1>::from_size_val([2, 2].into(), 1.0)?;
        assert!(good_features_to_track(&img, &GoodFeaturesParams::default())?.is_empty());
        Ok(())
    }
}
