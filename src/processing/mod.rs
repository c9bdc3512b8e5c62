pub mod binarize;
pub mod boxes;
pub mod image;
pub mod ocr;
pub mod roi;

pub use binarize::Binarizer;
pub use boxes::CandidateBoxFinder;
pub use image::{ImageNormalizer, NormalizedImage};
pub use ocr::{OcrConfig, OcrEngine, TesseractOcr};
pub use roi::RoiSelector;
