use image::imageops::crop_imm;
use log::debug;

use super::image::NormalizedImage;
use crate::models::{CandidateBox, Roi};

/// Ranks candidate boxes, picks the run of stacked lines most likely to be
/// the MRZ and crops it from the full-resolution image.
///
/// MRZ lines are rendered at a fixed pitch in equal-width bands, so the
/// selector groups candidates into maximal runs of 2-4 vertically stacked
/// boxes of near-identical width, alignment and height. A single band whose
/// height spans several text lines may stand alone (the closing pass can
/// fuse all MRZ lines into one component). Runs are scored by line-count
/// plausibility x mean fill x width consistency; the best run below the
/// acceptance threshold means "no MRZ here", which is the deliberate
/// precision/recall trade-off of the whole detector.
pub struct RoiSelector {
    /// Best-run scores below this yield no ROI.
    pub acceptance_threshold: f32,
    /// Widths within a run must agree within this ratio.
    pub width_ratio: f32,
    /// Horizontal center offset within a run, as a fraction of width.
    pub center_tol: f32,
    /// Vertical gap between consecutive lines, in units of line height.
    pub gap_factor: f32,
    /// Margin added around the cropped region, in working-image pixels.
    pub margin: f32,
}

impl Default for RoiSelector {
    fn default() -> Self {
        RoiSelector {
            acceptance_threshold: 0.35,
            width_ratio: 0.7,
            center_tol: 0.15,
            gap_factor: 1.5,
            margin: 5.0,
        }
    }
}

#[derive(Debug)]
struct Run<'a> {
    boxes: Vec<&'a CandidateBox>,
    score: f32,
}

impl RoiSelector {
    /// Returns the cropped MRZ region, or None when nothing plausible was
    /// found. Zero candidates never raise.
    pub fn select(&self, boxes: &[CandidateBox], image: &NormalizedImage) -> Option<Roi> {
        if boxes.is_empty() {
            return None;
        }

        let typical_height = median_height(boxes);
        let runs = self.group_runs(boxes, typical_height);
        let page_height = image.working.height() as f32;

        let best = runs.into_iter().max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Scores tie: prefer the run nearest the bottom third of the
                // page, where MRZs conventionally sit.
                .then_with(|| {
                    bottom_affinity(a, page_height)
                        .partial_cmp(&bottom_affinity(b, page_height))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        })?;

        debug!(
            "best run: {} line(s), score {:.3}",
            best.boxes.len(),
            best.score
        );
        if best.score < self.acceptance_threshold {
            return None;
        }
        Some(self.crop(&best, image))
    }

    /// Greedy top-to-bottom grouping into maximal stacked runs. Boxes are
    /// consumed by the first run that takes them, which keeps the grouping
    /// deterministic.
    fn group_runs<'a>(&self, boxes: &'a [CandidateBox], typical_height: f32) -> Vec<Run<'a>> {
        let mut order: Vec<&CandidateBox> = boxes.iter().collect();
        order.sort_by_key(|b| (b.top, b.left));

        let mut used = vec![false; order.len()];
        let mut runs = Vec::new();
        for i in 0..order.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let mut run = vec![order[i]];
            for j in (i + 1)..order.len() {
                if used[j] || run.len() == 4 {
                    continue;
                }
                if self.stacks_under(run[run.len() - 1], order[j]) {
                    used[j] = true;
                    run.push(order[j]);
                }
            }
            let score = self.score_run(&run, typical_height);
            runs.push(Run { boxes: run, score });
        }
        runs
    }

    /// Does `below` continue the run that currently ends with `above`?
    fn stacks_under(&self, above: &CandidateBox, below: &CandidateBox) -> bool {
        let (wa, wb) = (above.width() as f32, below.width() as f32);
        let ratio = wa.min(wb) / wa.max(wb);
        if ratio < self.width_ratio {
            return false;
        }
        let (ha, hb) = (above.height() as f32, below.height() as f32);
        if ha.min(hb) / ha.max(hb) < 0.6 {
            return false;
        }
        if (above.center_x() - below.center_x()).abs() > self.center_tol * wa.max(wb) {
            return false;
        }
        let gap = below.top as f32 - above.bottom as f32;
        gap > -2.0 && gap <= self.gap_factor * ha.max(hb)
    }

    fn score_run(&self, run: &[&CandidateBox], typical_height: f32) -> f32 {
        let line_score = match run.len() {
            // Every known format has two or three lines.
            2 | 3 => 1.0,
            1 => {
                let h = run[0].height() as f32;
                let estimated_lines = (h / typical_height).round();
                if (2.0..=4.0).contains(&estimated_lines) {
                    0.8
                } else {
                    0.35
                }
            }
            4 => 0.6,
            _ => 0.0,
        };
        let mean_fill = run.iter().map(|b| b.fill()).sum::<f32>() / run.len() as f32;
        let widths: Vec<f32> = run.iter().map(|b| b.width() as f32).collect();
        let consistency = widths.iter().cloned().fold(f32::MAX, f32::min)
            / widths.iter().cloned().fold(0.0, f32::max);
        line_score * mean_fill * consistency
    }

    /// Union box of the run with a margin, scaled back to the original image.
    fn crop(&self, run: &Run, image: &NormalizedImage) -> Roi {
        let left = run.boxes.iter().map(|b| b.left).min().unwrap_or(0) as f32;
        let top = run.boxes.iter().map(|b| b.top).min().unwrap_or(0) as f32;
        let right = run.boxes.iter().map(|b| b.right).max().unwrap_or(0) as f32;
        let bottom = run.boxes.iter().map(|b| b.bottom).max().unwrap_or(0) as f32;

        let inv = 1.0 / image.scale;
        let (img_w, img_h) = image.gray.dimensions();
        let x0 = (((left - self.margin) * inv).floor().max(0.0)) as u32;
        let y0 = (((top - self.margin) * inv).floor().max(0.0)) as u32;
        let x1 = ((((right + 1.0) + self.margin) * inv).ceil() as u32).min(img_w);
        let y1 = ((((bottom + 1.0) + self.margin) * inv).ceil() as u32).min(img_h);
        let width = x1.saturating_sub(x0).max(1);
        let height = y1.saturating_sub(y0).max(1);

        let cropped = crop_imm(&image.gray, x0, y0, width, height).to_image();
        Roi {
            image: cropped,
            left: x0,
            top: y0,
            width,
            height,
        }
    }
}

fn median_height(boxes: &[CandidateBox]) -> f32 {
    let mut heights: Vec<u32> = boxes.iter().map(|b| b.height()).collect();
    heights.sort_unstable();
    heights[heights.len() / 2] as f32
}

fn bottom_affinity(run: &Run, page_height: f32) -> f32 {
    let center = run
        .boxes
        .iter()
        .map(|b| b.center_y())
        .sum::<f32>()
        / run.boxes.len() as f32;
    // 1.0 inside the bottom third, falling off linearly above it.
    let third = page_height * 2.0 / 3.0;
    if center >= third {
        1.0
    } else {
        (center / third).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::image::ImageNormalizer;
    use image::{GrayImage, Luma};

    fn band(left: u32, top: u32, width: u32, height: u32) -> CandidateBox {
        CandidateBox {
            left,
            top,
            right: left + width - 1,
            bottom: top + height - 1,
            angle: 0.0,
            pixels: width * height,
        }
    }

    fn white_page(width: u32, height: u32) -> NormalizedImage {
        ImageNormalizer::normalize(GrayImage::from_pixel(width, height, Luma([255u8])))
    }

    #[test]
    fn no_candidates_yields_none() {
        let selector = RoiSelector::default();
        assert!(selector.select(&[], &white_page(250, 160)).is_none());
    }

    #[test]
    fn stacked_pair_is_selected_and_cropped_with_margin() {
        let image = white_page(250, 160);
        let boxes = vec![band(15, 120, 220, 8), band(15, 134, 220, 8)];
        let roi = RoiSelector::default().select(&boxes, &image).expect("roi");
        assert_eq!(roi.left, 10);
        assert_eq!(roi.top, 115);
        assert_eq!(roi.width, 230);
        assert_eq!(roi.height, 32);
        assert_eq!(roi.image.dimensions(), (230, 32));
    }

    #[test]
    fn weak_single_short_box_is_rejected() {
        let image = white_page(250, 160);
        // A lone thin band with mediocre fill scores below acceptance.
        let mut lone = band(40, 60, 120, 9);
        lone.pixels = 120 * 9 / 3;
        assert!(RoiSelector::default().select(&[lone], &image).is_none());
    }

    #[test]
    fn tie_breaks_toward_the_bottom_third() {
        let image = white_page(250, 160);
        let boxes = vec![
            band(15, 20, 220, 8),
            band(15, 34, 220, 8),
            band(15, 120, 220, 8),
            band(15, 134, 220, 8),
        ];
        let roi = RoiSelector::default().select(&boxes, &image).expect("roi");
        assert!(roi.top >= 100, "picked the upper run: top={}", roi.top);
    }

    #[test]
    fn coordinates_scale_back_to_the_original_image() {
        // 1000px-wide original -> working copy at 250, scale 0.25.
        let image = ImageNormalizer::normalize(GrayImage::from_pixel(
            1000,
            640,
            Luma([255u8]),
        ));
        let boxes = vec![band(15, 120, 220, 8), band(15, 134, 220, 8)];
        let roi = RoiSelector::default().select(&boxes, &image).expect("roi");
        assert_eq!(roi.left, 40);
        assert_eq!(roi.top, 460);
        assert_eq!(roi.width, 920);
        assert_eq!(roi.height, 128);
    }
}
