use image::GrayImage;
use log::debug;
use tesseract::{PageSegMode, Tesseract};

use crate::utils::MrzError;

/// The MRZ alphabet. `>` is not a legal MRZ glyph, but keeping it in the
/// whitelist lets the reader spot upside-down regions (a flipped `<` reads
/// as `>`).
pub const MRZ_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789><";

/// The external text-recognition capability, injected so the pipeline can be
/// exercised with a deterministic fake in tests.
pub trait OcrEngine {
    /// Recognizes the region image and returns the raw multi-line text.
    /// Lines are not guaranteed to have the format's exact length; the
    /// parser tolerates drift.
    fn recognize(&self, image: &GrayImage) -> Result<String, MrzError>;
}

/// Engine options forwarded to Tesseract.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub lang: String,
    pub whitelist: String,
    /// Extra engine variables, applied after the whitelist.
    pub variables: Vec<(String, String)>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            lang: "eng".to_string(),
            whitelist: MRZ_WHITELIST.to_string(),
            // The dictionary dawgs only hurt recognition of MRZ strings.
            variables: vec![
                ("load_system_dawg".to_string(), "F".to_string()),
                ("load_freq_dawg".to_string(), "F".to_string()),
            ],
        }
    }
}

/// Tesseract-backed implementation. The region is written to a temporary
/// PNG and handed to the engine with the MRZ whitelist and a single-block
/// page segmentation mode.
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        TesseractOcr { config }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        TesseractOcr::new(OcrConfig::default())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &GrayImage) -> Result<String, MrzError> {
        let tmp = tempfile::Builder::new()
            .prefix("mrzscan_roi_")
            .suffix(".png")
            .tempfile()?;
        image
            .save(tmp.path())
            .map_err(|e| MrzError::OcrEngine(format!("failed to stage region image: {}", e)))?;
        let path = tmp
            .path()
            .to_str()
            .ok_or_else(|| MrzError::OcrEngine("non-UTF-8 temp path".to_string()))?;

        let mut tess = Tesseract::new(None, Some(&self.config.lang))
            .map_err(|e| MrzError::OcrEngine(format!("failed to initialize tesseract: {}", e)))?
            .set_variable("tessedit_char_whitelist", &self.config.whitelist)
            .map_err(|e| MrzError::OcrEngine(format!("failed to set whitelist: {}", e)))?;
        for (name, value) in &self.config.variables {
            tess = tess
                .set_variable(name, value)
                .map_err(|e| MrzError::OcrEngine(format!("failed to set {}: {}", name, e)))?;
        }
        tess.set_page_seg_mode(PageSegMode::PsmSingleBlock);
        let mut tess = tess
            .set_image(path)
            .map_err(|e| MrzError::OcrEngine(format!("failed to set image: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| MrzError::OcrEngine(format!("recognition failed: {}", e)))?;
        debug!("ocr returned {} bytes", text.len());
        Ok(text)
    }
}
