use image::Luma;
use imageproc::region_labelling::{connected_components, Connectivity};
use log::debug;

use super::binarize::BinaryMask;
use crate::models::CandidateBox;

/// Upper bound on candidates handed to the selector. Anything past the
/// largest few components is noise on real scans.
const MAX_BOXES: usize = 8;

/// Scans a binary mask for text-line-like bands and groups them into
/// candidate boxes.
///
/// Components are gathered by 8-connected labelling, reduced to bounds,
/// pixel counts and second moments (the moments give an orientation angle,
/// which keeps slightly rotated scans usable), then filtered down to long,
/// low, dense bands whose height sits in a plausible text-line band derived
/// from the working-image size. Nearby aligned fragments of the same line
/// are merged before the filters apply.
pub struct CandidateBoxFinder {
    /// Minimum bounding-box area, as a fraction of the working-image area.
    pub min_area_frac: f32,
    /// Plausible single-line height range, as fractions of image height.
    pub min_line_frac: f32,
    pub max_line_frac: f32,
    /// Stacked lines may fuse into one band; cap its height at this fraction.
    pub max_band_frac: f32,
    /// Minimum width-to-height ratio of a kept box.
    pub min_elongation: f32,
    /// Minimum foreground fill inside a kept box.
    pub min_fill: f32,
    /// Maximum orientation difference for merging fragments, radians.
    pub angle_tol: f32,
}

impl Default for CandidateBoxFinder {
    fn default() -> Self {
        CandidateBoxFinder {
            min_area_frac: 0.004,
            min_line_frac: 0.008,
            max_line_frac: 0.12,
            max_band_frac: 0.30,
            min_elongation: 4.5,
            min_fill: 0.25,
            angle_tol: 0.15,
        }
    }
}

/// Running accumulators for one labelled component. Mergeable: adding two
/// accumulators describes the union of their pixel sets exactly.
#[derive(Debug, Clone)]
struct ComponentStats {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
    n: u64,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
}

impl ComponentStats {
    fn new(x: u32, y: u32) -> Self {
        ComponentStats {
            left: x,
            top: y,
            right: x,
            bottom: y,
            n: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_yy: 0.0,
            sum_xy: 0.0,
        }
    }

    fn push(&mut self, x: u32, y: u32) {
        self.left = self.left.min(x);
        self.top = self.top.min(y);
        self.right = self.right.max(x);
        self.bottom = self.bottom.max(y);
        self.n += 1;
        let (fx, fy) = (x as f64, y as f64);
        self.sum_x += fx;
        self.sum_y += fy;
        self.sum_xx += fx * fx;
        self.sum_yy += fy * fy;
        self.sum_xy += fx * fy;
    }

    fn merge(&mut self, other: &ComponentStats) {
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
        self.n += other.n;
        self.sum_x += other.sum_x;
        self.sum_y += other.sum_y;
        self.sum_xx += other.sum_xx;
        self.sum_yy += other.sum_yy;
        self.sum_xy += other.sum_xy;
    }

    /// Principal-axis orientation from central second moments, radians from
    /// horizontal, in (-pi/2, pi/2].
    fn angle(&self) -> f32 {
        if self.n < 2 {
            return 0.0;
        }
        let n = self.n as f64;
        let mu_xx = self.sum_xx / n - (self.sum_x / n).powi(2);
        let mu_yy = self.sum_yy / n - (self.sum_y / n).powi(2);
        let mu_xy = self.sum_xy / n - (self.sum_x / n) * (self.sum_y / n);
        (0.5 * (2.0 * mu_xy).atan2(mu_xx - mu_yy)) as f32
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) as f32 / 2.0
    }

    fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    fn into_box(self) -> CandidateBox {
        let angle = self.angle();
        CandidateBox {
            left: self.left,
            top: self.top,
            right: self.right,
            bottom: self.bottom,
            angle,
            pixels: self.n as u32,
        }
    }
}

impl CandidateBoxFinder {
    /// Finds candidate text-line boxes in the mask. Zero candidates is a
    /// normal outcome ("no MRZ-like structure"), not a failure.
    pub fn find(&self, mask: &BinaryMask) -> Vec<CandidateBox> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
        let mut stats: Vec<Option<ComponentStats>> = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let label = labels.get_pixel(x, y).0[0] as usize;
                if label == 0 {
                    continue;
                }
                if stats.len() < label {
                    stats.resize(label, None);
                }
                stats[label - 1]
                    .get_or_insert_with(|| ComponentStats::new(x, y))
                    .push(x, y);
            }
        }

        let area = (width as f32) * (height as f32);
        let min_pixels = (area * self.min_area_frac * 0.3).max(8.0) as u64;
        let mut components: Vec<ComponentStats> = stats
            .into_iter()
            .flatten()
            .filter(|c| c.n >= min_pixels)
            .collect();

        self.merge_fragments(&mut components);

        let min_line = (height as f32 * self.min_line_frac).max(2.0);
        let max_band = height as f32 * self.max_band_frac;
        let min_area = area * self.min_area_frac;
        let mut boxes: Vec<CandidateBox> = components
            .into_iter()
            .map(ComponentStats::into_box)
            .filter(|b| {
                let h = b.height() as f32;
                let bounding = b.width() as f32 * h;
                h >= min_line
                    && h <= max_band
                    && bounding >= min_area
                    && b.elongation() >= self.min_elongation
                    && b.fill() >= self.min_fill
            })
            .collect();

        boxes.sort_by(|a, b| b.pixels.cmp(&a.pixels));
        boxes.truncate(MAX_BOXES);
        // Reading order is the natural presentation for the selector.
        boxes.sort_by_key(|b| (b.top, b.left));
        debug!("candidate boxes: {}", boxes.len());
        boxes
    }

    /// Iteratively merges aligned fragments of the same text line: similar
    /// orientation, nearly level centers, and a horizontal gap small relative
    /// to the line height.
    fn merge_fragments(&self, components: &mut Vec<ComponentStats>) {
        loop {
            let mut merged_any = false;
            'outer: for i in 0..components.len() {
                for j in (i + 1)..components.len() {
                    if self.same_line(&components[i], &components[j]) {
                        let other = components.remove(j);
                        components[i].merge(&other);
                        merged_any = true;
                        break 'outer;
                    }
                }
            }
            if !merged_any {
                return;
            }
        }
    }

    fn same_line(&self, a: &ComponentStats, b: &ComponentStats) -> bool {
        let angle_diff = (a.angle() - b.angle()).abs();
        let aligned = angle_diff <= self.angle_tol
            || (std::f32::consts::PI - angle_diff).abs() <= self.angle_tol;
        if !aligned {
            return false;
        }
        let max_h = a.height().max(b.height()) as f32;
        if (a.center_y() - b.center_y()).abs() > 0.6 * max_h {
            return false;
        }
        // Horizontal gap between the two x-intervals; overlap counts as zero.
        let gap = if a.right < b.left {
            (b.left - a.right) as f32
        } else if b.right < a.left {
            (a.left - b.right) as f32
        } else {
            0.0
        };
        gap <= 2.0 * max_h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    fn blank(width: u32, height: u32) -> BinaryMask {
        GrayImage::new(width, height)
    }

    fn fill_rect(mask: &mut BinaryMask, left: u32, top: u32, width: u32, height: u32) {
        for y in top..top + height {
            for x in left..left + width {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }
    }

    #[test]
    fn empty_mask_yields_no_candidates() {
        let finder = CandidateBoxFinder::default();
        assert!(finder.find(&blank(250, 160)).is_empty());
    }

    #[test]
    fn two_bands_become_two_boxes() {
        let mut mask = blank(250, 160);
        fill_rect(&mut mask, 15, 120, 220, 8);
        fill_rect(&mut mask, 15, 134, 220, 8);
        let boxes = CandidateBoxFinder::default().find(&mask);
        assert_eq!(boxes.len(), 2);
        for b in &boxes {
            assert_eq!(b.width(), 220);
            assert_eq!(b.height(), 8);
            assert!(b.fill() > 0.99);
            assert!(b.angle.abs() < 0.05);
        }
        assert!(boxes[0].top < boxes[1].top);
    }

    #[test]
    fn specks_and_squares_are_rejected() {
        let mut mask = blank(250, 160);
        fill_rect(&mut mask, 10, 10, 4, 4); // speck
        fill_rect(&mut mask, 100, 40, 40, 40); // photo-like square block
        assert!(CandidateBoxFinder::default().find(&mask).is_empty());
    }

    #[test]
    fn split_line_fragments_are_merged() {
        let mut mask = blank(250, 160);
        // One line broken in two by a faded patch.
        fill_rect(&mut mask, 15, 120, 100, 8);
        fill_rect(&mut mask, 125, 120, 110, 8);
        let boxes = CandidateBoxFinder::default().find(&mask);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].width(), 220);
    }
}
