use crate::VisionError;
use image::{imageops::FilterType, DynamicImage, GrayImage};
use ndarray::Array2;
use std::path::Path;

/// Convert a grayscale buffer into a `(height, width)` intensity matrix with
/// values in [0, 255].
pub fn gray_to_intensity(gray: &GrayImage) -> Array2<f64> {
    let (w, h) = gray.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
        gray.get_pixel(c as u32, r as u32)[0] as f64
    })
}

/// Grayscale and resize any image to a `size x size` intensity matrix.
pub fn to_intensity(img: &DynamicImage, size: usize) -> Array2<f64> {
    let gray = img.to_luma8();
    let resized = image::imageops::resize(&gray, size as u32, size as u32, FilterType::Triangle);
    gray_to_intensity(&resized)
}

/// Decode an image file and bring it to the extractor's input shape.
pub fn load_intensity(path: &Path, size: usize) -> Result<Array2<f64>, VisionError> {
    let img = image::open(path)?;
    log::debug!(
        "loaded {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(to_intensity(&img, size))
}
