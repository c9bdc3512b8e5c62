use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Only infrastructure failures (I/O, image decoding, a missing OCR engine)
/// are meant to reach callers as hard errors. `NoRegionFound` and
/// `FormatMismatch` are internal outcomes that the reader converts into an
/// empty result, so a batch run can classify them without unwinding.
#[derive(Debug, Error)]
pub enum MrzError {
    /// No candidate run scored above the ROI acceptance threshold.
    #[error("no MRZ-like region found")]
    NoRegionFound,

    /// OCR text shape does not fit any known MRZ layout.
    #[error("text does not match any MRZ format: {0}")]
    FormatMismatch(String),

    /// The external OCR engine could not be invoked.
    #[error("OCR engine unavailable: {0}")]
    OcrEngine(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

impl MrzError {
    /// Failures that mean "no MRZ on this image" rather than "the run broke".
    pub fn is_recognition_failure(&self) -> bool {
        matches!(self, MrzError::NoRegionFound | MrzError::FormatMismatch(_))
    }
}
