//! Functions to preprocess images for the model input.

use anyhow::{bail, Result};
use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::{Array, IxDyn};

/// Gray value used to pad the letterbox.
const LETTERBOX_FILL: u8 = 114;

/// Letterboxes `image` into a square `target`-edge input, normalizes to 0..1
/// and lays it out as NCHW with batch size 1.
///
/// Returns the tensor and the resize ratio needed to map model-space boxes
/// back to original image coordinates. The resized image is anchored at the
/// top-left corner, so the back-mapping is a plain division by the ratio.
pub fn preprocess(image: &RgbImage, target: u32) -> Result<(Array<f32, IxDyn>, f32)> {
    let src = to_fir_image(image.clone());
    let (w0, h0) = (src.width(), src.height());
    if w0 == 0 || h0 == 0 {
        bail!("cannot preprocess an empty image");
    }

    let ratio = (target as f32 / w0 as f32).min(target as f32 / h0 as f32);
    let new_w = ((w0 as f32 * ratio).round() as u32).max(1);
    let new_h = ((h0 as f32 * ratio).round() as u32).max(1);

    let mut padded = FirImage::from_vec_u8(
        target,
        target,
        vec![LETTERBOX_FILL; (target * target * 3) as usize],
        PixelType::U8x3,
    )?;

    let mut resizer = Resizer::new();
    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom));
    let mut cropped = CroppedImageMut::new(&mut padded, 0, 0, new_w, new_h)?;
    resizer.resize(&src, &mut cropped, &options)?;

    let flat = nchw_normalize_flat(&padded)?;
    let tensor =
        Array::from_shape_vec((1, 3, target as usize, target as usize), flat)?.into_dyn();

    Ok((tensor, ratio))
}

pub fn to_fir_image<'a>(image: RgbImage) -> FirImage<'a> {
    let (width, height) = image.dimensions();
    let buffer = image.into_raw();

    FirImage::from_vec_u8(width, height, buffer, PixelType::U8x3)
        .expect("RgbImage buffer is always a valid U8x3 image")
}

fn nchw_normalize_flat(img: &FirImage) -> Result<Vec<f32>> {
    let buf = img.buffer();
    let w = img.width() as usize;
    let h = img.height() as usize;

    if buf.len() != w * h * 3 {
        bail!(
            "unexpected buffer size: got {}, expected {}",
            buf.len(),
            w * h * 3
        );
    }

    let hw = w * h;
    let mut out = vec![0.0f32; buf.len()];
    for i in 0..hw {
        out[i] = buf[3 * i] as f32 / 255.0;
        out[i + hw] = buf[3 * i + 1] as f32 / 255.0;
        out[i + 2 * hw] = buf[3 * i + 2] as f32 / 255.0;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_produces_square_nchw_tensor() {
        let image = RgbImage::from_pixel(100, 50, image::Rgb([255, 0, 0]));
        let (tensor, ratio) = preprocess(&image, 64).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert!((ratio - 0.64).abs() < 1e-6);
        // Top-left pixel is red, fully saturated in channel 0.
        assert!((tensor[[0usize, 0, 0, 0].as_slice()] - 1.0).abs() < 1e-6);
        assert!(tensor[[0usize, 1, 0, 0].as_slice()].abs() < 1e-6);
    }

    #[test]
    fn downscale_interpolates_instead_of_picking_pixels() {
        // Alternating black/white columns halve to mid-gray under the
        // convolution filter; a nearest pick would stay at 0 or 1.
        let image = RgbImage::from_fn(64, 64, |x, _| {
            if x % 2 == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let (tensor, ratio) = preprocess(&image, 32).unwrap();
        assert!((ratio - 0.5).abs() < 1e-6);
        let v = tensor[[0usize, 0, 8, 8].as_slice()];
        assert!(v > 0.2 && v < 0.8, "expected blended value, got {v}");
    }

    #[test]
    fn padding_region_is_letterbox_gray() {
        let image = RgbImage::from_pixel(100, 50, image::Rgb([0, 0, 0]));
        let (tensor, _) = preprocess(&image, 64).unwrap();
        // Bottom rows are padding.
        let pad = tensor[[0usize, 0, 63, 0].as_slice()];
        assert!((pad - LETTERBOX_FILL as f32 / 255.0).abs() < 1e-6);
    }
}
