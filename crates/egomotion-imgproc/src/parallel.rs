use rayon::prelude::*;

use egomotion_image::Image;

/// Apply a function to each pixel in the image in parallel, one row per task.
///
/// PRECONDITION: `src` and `dst` must have the same size.
pub fn par_iter_rows<T1, const C1: usize, T2, const C2: usize>(
    src: &Image<T1, C1>,
    dst: &mut Image<T2, C2>,
    f: impl Fn(&[T1], &mut [T2]) + Send + Sync,
) where
    T1: Clone + Send + Sync,
    T2: Clone + Send + Sync,
{
    let cols = src.cols();
    if cols == 0 {
        return;
    }
    src.as_slice()
        .par_chunks_exact(C1 * cols)
        .zip(dst.as_slice_mut().par_chunks_exact_mut(C2 * cols))
        .for_each(|(src_chunk, dst_chunk)| {
            src_chunk
                .chunks_exact(C1)
                .zip(dst_chunk.chunks_exact_mut(C2))
                .for_each(|(src_pixel, dst_pixel)| {
                    f(src_pixel, dst_pixel);
                });
        });
}

/// Fill every row of `dst` in parallel from the row index.
///
/// The closure receives the row index and the mutable row slice of `dst`.
pub fn par_fill_rows<T, const C: usize>(
    dst: &mut Image<T, C>,
    f: impl Fn(usize, &mut [T]) + Send + Sync,
) where
    T: Send + Sync,
{
    let stride = C * dst.cols();
    if stride == 0 {
        return;
    }
    dst.as_slice_mut()
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(row, chunk)| f(row, chunk));
}

#[cfg(test)]
mod tests {
    use super::*;
    use egomotion_image::ImageError;

    #[test]
    fn test_par_iter_rows_copies_channel() -> Result<(), ImageError> {
        let src = Image::<u8, 2>::new([2, 2].into(), vec![1, 10, 2, 20, 3, 30, 4, 40])?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        par_iter_rows(&src, &mut dst, |s, d| d[0] = s[1]);
        assert_eq!(dst.as_slice(), &[10, 20, 30, 40]);
        Ok(())
    }

    #[test]
    fn test_par_fill_rows_row_index() -> Result<(), ImageError> {
        let mut dst = Image::<usize, 1>::from_size_val([3, 2].into(), 0)?;
        par_fill_rows(&mut dst, |row, chunk| chunk.iter_mut().for_each(|v| *v = row));
        assert_eq!(dst.as_slice(), &[0, 0, 0, 1, 1, 1]);
        Ok(())
    }
}
