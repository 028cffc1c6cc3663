//! Pixel normalization and label encoding

use image::{Rgb, Rgb32FImage, RgbImage};

use crate::dataset::Cifar10Image;
use crate::utils::error::{Cifar10Error, Result};
use crate::IMAGE_SIZE;

/// Rescale 0-255 intensities to [0, 1]
pub fn normalize(image: &Cifar10Image) -> Rgb32FImage {
    Rgb32FImage::from_fn(IMAGE_SIZE as u32, IMAGE_SIZE as u32, |x, y| {
        let [r, g, b] = image.pixel(x as usize, y as usize);
        Rgb([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
    })
}

/// Back to 8-bit RGB, clamping anything outside [0, 1]
pub fn denormalize(image: &Rgb32FImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        Rgb([to_u8(p[0]), to_u8(p[1]), to_u8(p[2])])
    })
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Convert an HWC float image to the CHW layout expected by conv layers
pub fn to_chw(image: &Rgb32FImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in image.enumerate_pixels() {
        let i = (y * width + x) as usize;
        data[i] = pixel[0];
        data[plane + i] = pixel[1];
        data[2 * plane + i] = pixel[2];
    }

    data
}

/// One-hot encode a label
pub fn one_hot(label: usize, num_classes: usize) -> Result<Vec<f32>> {
    if label >= num_classes {
        return Err(Cifar10Error::InvalidLabel { label, num_classes });
    }
    let mut encoded = vec![0.0; num_classes];
    encoded[label] = 1.0;
    Ok(encoded)
}
