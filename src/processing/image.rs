use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;
use log::debug;

use crate::utils::MrzError;

/// Width of the working copy used for structural search. The box finder
/// operates on this reduced image; the ROI is cropped from the original.
pub const WORKING_WIDTH: u32 = 250;

/// A loaded image, normalized for the detection pipeline: the full-resolution
/// grayscale plus a scaled-down working copy and the factor between them.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub gray: GrayImage,
    pub working: GrayImage,
    /// working width / original width, always <= 1.
    pub scale: f32,
}

pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<NormalizedImage, MrzError> {
        let img = image::open(path.as_ref())?;
        Ok(Self::normalize(img.to_luma8()))
    }

    pub fn load_bytes(bytes: &[u8]) -> Result<NormalizedImage, MrzError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::normalize(img.to_luma8()))
    }

    /// Produces the working copy. Images narrower than the working width are
    /// kept as-is rather than upscaled.
    pub fn normalize(gray: GrayImage) -> NormalizedImage {
        let (width, height) = gray.dimensions();
        if width <= WORKING_WIDTH || width == 0 {
            return NormalizedImage {
                working: gray.clone(),
                gray,
                scale: 1.0,
            };
        }
        let scale = WORKING_WIDTH as f32 / width as f32;
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        debug!(
            "scaling {}x{} down to {}x{} for detection",
            width, height, WORKING_WIDTH, new_height
        );
        let working = image::imageops::resize(&gray, WORKING_WIDTH, new_height, FilterType::Triangle);
        NormalizedImage {
            gray,
            working,
            scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_images_are_not_upscaled() {
        let img = GrayImage::from_pixel(100, 80, image::Luma([200u8]));
        let norm = ImageNormalizer::normalize(img);
        assert_eq!(norm.working.dimensions(), (100, 80));
        assert_eq!(norm.scale, 1.0);
    }

    #[test]
    fn large_images_scale_to_working_width() {
        let img = GrayImage::from_pixel(1000, 800, image::Luma([200u8]));
        let norm = ImageNormalizer::normalize(img);
        assert_eq!(norm.working.width(), WORKING_WIDTH);
        assert_eq!(norm.working.height(), 200);
        assert!((norm.scale - 0.25).abs() < 1e-6);
        assert_eq!(norm.gray.width(), 1000);
    }
}
