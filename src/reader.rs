use std::path::Path;

use image::imageops::rotate180;
use image::GrayImage;
use log::{debug, info};

use crate::models::{CandidateBox, MrzRecord, Roi};
use crate::parsing::{self, cleanup};
use crate::processing::binarize::BinaryMask;
use crate::processing::{
    Binarizer, CandidateBoxFinder, ImageNormalizer, NormalizedImage, OcrConfig, OcrEngine,
    RoiSelector, TesseractOcr,
};
use crate::utils::MrzError;

/// Options for a recognition run.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Keep the cropped region image on the returned record.
    pub save_roi: bool,
    pub ocr: OcrConfig,
}

/// Every intermediate stage output of one run, by name. Constructed once
/// per image and discarded; useful for tests and diagnostics.
#[derive(Debug)]
pub struct PipelineRun {
    pub image: NormalizedImage,
    pub mask: BinaryMask,
    pub boxes: Vec<CandidateBox>,
    pub roi: Option<Roi>,
    pub raw_text: Option<String>,
    pub lines: Vec<String>,
    pub record: Option<MrzRecord>,
}

/// The recognition pipeline: normalize, binarize, locate, crop, recognize,
/// parse. The OCR engine is injected so tests can run the full pipeline
/// against a deterministic fake.
pub struct MrzReader<E: OcrEngine = TesseractOcr> {
    engine: E,
    finder: CandidateBoxFinder,
    selector: RoiSelector,
    save_roi: bool,
}

impl MrzReader<TesseractOcr> {
    pub fn new() -> Self {
        MrzReader::with_engine(TesseractOcr::default())
    }

    pub fn with_options(options: ReadOptions) -> Self {
        let mut reader = MrzReader::with_engine(TesseractOcr::new(options.ocr));
        reader.save_roi = options.save_roi;
        reader
    }
}

impl Default for MrzReader<TesseractOcr> {
    fn default() -> Self {
        MrzReader::new()
    }
}

impl<E: OcrEngine> MrzReader<E> {
    pub fn with_engine(engine: E) -> Self {
        MrzReader {
            engine,
            finder: CandidateBoxFinder::default(),
            selector: RoiSelector::default(),
            save_roi: false,
        }
    }

    pub fn save_roi(mut self, save: bool) -> Self {
        self.save_roi = save;
        self
    }

    /// Recognizes the MRZ on an image file. `Ok(None)` means the image was
    /// processed but carried no recognizable MRZ; errors are reserved for
    /// infrastructure failures.
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Option<MrzRecord>, MrzError> {
        let image = ImageNormalizer::load_path(path)?;
        Ok(self.run(image)?.record)
    }

    /// Recognizes the MRZ on a pre-decoded grayscale image.
    pub fn read_image(&self, gray: GrayImage) -> Result<Option<MrzRecord>, MrzError> {
        let image = ImageNormalizer::normalize(gray);
        Ok(self.run(image)?.record)
    }

    /// Runs the full pipeline, returning every intermediate stage.
    pub fn run(&self, image: NormalizedImage) -> Result<PipelineRun, MrzError> {
        let binarizer = Binarizer::for_width(image.working.width());
        let mask = binarizer.binarize(&image.working);
        let boxes = self.finder.find(&mask);
        let roi = self.selector.select(&boxes, &image);

        let mut run = PipelineRun {
            image,
            mask,
            boxes,
            roi,
            raw_text: None,
            lines: Vec::new(),
            record: None,
        };

        let Some(mut roi) = run.roi.take() else {
            info!("no MRZ-like region found");
            return Ok(run);
        };

        let mut text = self.engine.recognize(&roi.image)?;
        if looks_reversed(&text) {
            // A flipped `<` reads as `>`: the document was scanned upside
            // down, so retry on the rotated region.
            debug!("region looks upside down, retrying rotated");
            roi.image = rotate180(&roi.image);
            text = self.engine.recognize(&roi.image)?;
        }

        run.lines = cleanup::clean(&text);
        run.raw_text = Some(text);

        match parsing::parse_lines(run.lines.clone()) {
            Ok(mut record) => {
                if self.save_roi {
                    record.roi = Some(roi.clone());
                }
                run.record = Some(record);
            }
            Err(err) if err.is_recognition_failure() => {
                info!("parse failed: {}", err);
            }
            Err(err) => return Err(err),
        }
        run.roi = Some(roi);
        Ok(run)
    }
}

fn looks_reversed(text: &str) -> bool {
    text.contains(">>") || (text.contains('>') && !text.contains('<'))
}

/// Reads the MRZ from an image file with the default Tesseract engine.
///
/// This is the main entry point of the crate. Returns `Ok(None)` when no
/// MRZ was found or the text could not be parsed; only infrastructure
/// failures (unreadable file, missing OCR engine) surface as errors.
pub fn read_mrz<P: AsRef<Path>>(path: P) -> Result<Option<MrzRecord>, MrzError> {
    MrzReader::new().read_path(path)
}

/// `read_mrz` with explicit options (ROI retention, OCR engine settings).
pub fn read_mrz_with_options<P: AsRef<Path>>(
    path: P,
    options: ReadOptions,
) -> Result<Option<MrzRecord>, MrzError> {
    MrzReader::with_options(options).read_path(path)
}
