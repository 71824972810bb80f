use egomotion_image::{Image, ImageError};
use rayon::prelude::*;

use crate::parallel::par_fill_rows;

/// Apply a separable filter to a single channel image.
///
/// The horizontal kernel is correlated first, then the vertical one, with replicated
/// borders. Both kernels must have an odd length.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, 1).
/// * `dst` - The destination image with shape (H, W, 1).
/// * `kernel_x` - The horizontal kernel.
/// * `kernel_y` - The vertical kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn separable_filter(
    src: &Image<f32, 1>,
    dst: &mut Image<f32, 1>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let cols = src.cols();
    let rows = src.rows();
    if cols == 0 || rows == 0 {
        return Ok(());
    }

    let half_x = (kernel_x.len() / 2) as isize;
    let half_y = (kernel_y.len() / 2) as isize;
    let src_data = src.as_slice();

    // horizontal pass
    let mut temp = vec![0.0f32; src_data.len()];
    temp.par_chunks_exact_mut(cols)
        .zip(src_data.par_chunks_exact(cols))
        .for_each(|(temp_row, src_row)| {
            for (c, out) in temp_row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, &w) in kernel_x.iter().enumerate() {
                    let cc = clamp_index(c as isize + k as isize - half_x, cols);
                    acc += w * src_row[cc];
                }
                *out = acc;
            }
        });

    // vertical pass
    par_fill_rows(dst, |r, dst_row| {
        for (c, out) in dst_row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &w) in kernel_y.iter().enumerate() {
                let rr = clamp_index(r as isize + k as isize - half_y, rows);
                acc += w * temp[rr * cols + c];
            }
            *out = acc;
        }
    });

    Ok(())
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
