use crate::parallel;
use egomotion_image::{Image, ImageError};

/// Convert a multi-channel u8 image to grayscale by averaging its channels.
///
/// The mean is truncated towards zero, so `[10, 11, 11]` becomes `10`. A single channel
/// image is copied through unchanged.
///
/// # Arguments
///
/// * `src` - The input image with `C` channels.
/// * `dst` - The output grayscale image.
///
/// Precondition: the input and output images must have the same size.
///
/// # Example
///
/// ```
/// use egomotion_image::Image;
/// use egomotion_imgproc::color::gray_from_mean_u8;
///
/// let image = Image::<u8, 3>::new([2, 1].into(), vec![0, 3, 6, 255, 255, 254]).unwrap();
/// let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0).unwrap();
///
/// gray_from_mean_u8(&image, &mut gray).unwrap();
/// assert_eq!(gray.as_slice(), &[3, 254]);
/// ```
pub fn gray_from_mean_u8<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, 1>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let sum: u32 = src_pixel.iter().map(|&v| v as u32).sum();
        dst_pixel[0] = (sum / C as u32) as u8;
    });

    Ok(())
}

/// Scale a u8 grayscale image into `[0, 1]` floats.
pub fn gray_u8_to_f32(src: &Image<u8, 1>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        dst_pixel[0] = src_pixel[0] as f32 / 255.0;
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_from_mean_truncates() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([2, 1].into(), vec![10, 11, 11, 1, 1, 2])?;
        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        gray_from_mean_u8(&image, &mut gray)?;
        assert_eq!(gray.as_slice(), &[10, 1]);
        Ok(())
    }

    #[test]
    fn test_gray_from_mean_single_channel() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([3, 1].into(), vec![5, 6, 7])?;
        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        gray_from_mean_u8(&image, &mut gray)?;
        assert_eq!(gray.as_slice(), image.as_slice());
        Ok(())
    }

    #[test]
    fn test_gray_size_mismatch() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::from_size_val([2, 2].into(), 0)?;
        let mut gray = Image::<u8, 1>::from_size_val([3, 2].into(), 0)?;
        assert!(gray_from_mean_u8(&image, &mut gray).is_err());
        Ok(())
    }

    #[test]
    fn test_gray_u8_to_f32() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([2, 1].into(), vec![0, 255])?;
        let mut out = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        gray_u8_to_f32(&image, &mut out)?;
        assert_eq!(out.as_slice(), &[0.0, 1.0]);
        Ok(())
    }
}
