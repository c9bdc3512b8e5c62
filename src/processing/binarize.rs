use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;

/// Binary foreground/background mask derived from the working image.
/// 255 marks foreground (putative ink), 0 background.
pub type BinaryMask = GrayImage;

/// Adaptive-threshold binarizer.
///
/// Document photographs have uneven illumination, so each pixel is compared
/// against the mean of its local window rather than a single global cutoff.
/// A pixel becomes foreground when it is darker than the window mean by more
/// than `bias` gray levels; degenerate all-uniform input therefore yields an
/// all-background mask. A morphological closing pass then fuses adjacent
/// glyphs into the horizontal bands the box finder looks for.
pub struct Binarizer {
    /// Side of the square averaging window, in pixels. Forced odd.
    pub window: u32,
    /// How far below the local mean a pixel must fall to count as ink.
    pub bias: i32,
    /// Radius of the band-fusing closing pass. 0 disables it.
    pub close_radius: u8,
}

impl Binarizer {
    /// Parameters scaled to the working-image width, so behavior follows
    /// resolution instead of assuming a fixed pixel geometry.
    pub fn for_width(width: u32) -> Self {
        let window = (width / 16).max(9) | 1;
        let close_radius = (width / 125).clamp(1, 4) as u8;
        Binarizer {
            window,
            bias: 12,
            close_radius,
        }
    }

    pub fn binarize(&self, img: &GrayImage) -> BinaryMask {
        let mask = self.threshold(img);
        if self.close_radius == 0 {
            mask
        } else {
            close(&mask, Norm::LInf, self.close_radius)
        }
    }

    /// Windowed-mean threshold over an integral image, O(1) per pixel.
    fn threshold(&self, img: &GrayImage) -> BinaryMask {
        let (width, height) = img.dimensions();
        let mut mask = GrayImage::new(width, height);
        if width == 0 || height == 0 {
            return mask;
        }

        // integral[y][x] = sum of pixels above and left of (x, y), with a
        // zero row/column sentinel to keep window sums branch-free.
        let w = width as usize;
        let h = height as usize;
        let mut integral = vec![0u64; (w + 1) * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += img.get_pixel(x as u32, y as u32).0[0] as u64;
                integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
            }
        }

        let half = (self.window / 2) as i64;
        for y in 0..h {
            for x in 0..w {
                let x0 = (x as i64 - half).max(0) as usize;
                let y0 = (y as i64 - half).max(0) as usize;
                let x1 = ((x as i64 + half).min(w as i64 - 1) + 1) as usize;
                let y1 = ((y as i64 + half).min(h as i64 - 1) + 1) as usize;
                let count = ((x1 - x0) * (y1 - y0)) as u64;
                let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                    - integral[y0 * (w + 1) + x1]
                    - integral[y1 * (w + 1) + x0];
                let mean = (sum / count) as i32;
                let pixel = img.get_pixel(x as u32, y as u32).0[0] as i32;
                let value = if pixel < mean - self.bias { 255 } else { 0 };
                mask.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
        mask
    }
}

/// Number of foreground pixels in a mask.
pub fn foreground_count(mask: &BinaryMask) -> u64 {
    mask.pixels().filter(|p| p.0[0] != 0).count() as u64
}
