use std::collections::BTreeMap;

use image::GrayImage;
use serde::Serialize;

/// The five MRZ layouts defined by ICAO Doc 9303.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MrzFormat {
    Td1,  // ID card, 3 lines x 30
    Td2,  // ID card, 2 lines x 36
    Td3,  // Passport, 2 lines x 44
    MrvA, // Visa format A, 2 lines x 44
    MrvB, // Visa format B, 2 lines x 36
}

impl MrzFormat {
    pub const ALL: [MrzFormat; 5] = [
        MrzFormat::Td1,
        MrzFormat::Td2,
        MrzFormat::Td3,
        MrzFormat::MrvA,
        MrzFormat::MrvB,
    ];

    pub fn line_count(&self) -> usize {
        match self {
            MrzFormat::Td1 => 3,
            MrzFormat::Td2 => 2,
            MrzFormat::Td3 => 2,
            MrzFormat::MrvA => 2,
            MrzFormat::MrvB => 2,
        }
    }

    pub fn line_len(&self) -> usize {
        match self {
            MrzFormat::Td1 => 30,
            MrzFormat::Td2 => 36,
            MrzFormat::Td3 => 44,
            MrzFormat::MrvA => 44,
            MrzFormat::MrvB => 36,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MrzFormat::Td1 => "TD1",
            MrzFormat::Td2 => "TD2",
            MrzFormat::Td3 => "TD3",
            MrzFormat::MrvA => "MRVA",
            MrzFormat::MrvB => "MRVB",
        }
    }
}

/// A connected region of the binary mask that could be one MRZ text line.
///
/// Bounds are in working-image coordinates. The angle is estimated from the
/// region's second moments, so slightly rotated scans still produce usable
/// boxes.
#[derive(Debug, Clone)]
pub struct CandidateBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    /// Orientation of the principal axis, radians from horizontal.
    pub angle: f32,
    /// Number of foreground pixels inside the bounds.
    pub pixels: u32,
}

impl CandidateBox {
    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) as f32 / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) as f32 / 2.0
    }

    /// Fraction of the bounding area covered by foreground pixels.
    pub fn fill(&self) -> f32 {
        self.pixels as f32 / (self.width() as f32 * self.height() as f32)
    }

    /// Width-to-height ratio. MRZ lines are long, low bands.
    pub fn elongation(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }
}

/// The cropped sub-image believed to contain the MRZ, with its bounds in the
/// original (full resolution) image.
#[derive(Debug, Clone)]
pub struct Roi {
    pub image: GrayImage,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Which check digit a report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckTarget {
    DocumentNumber,
    BirthDate,
    ExpiryDate,
    PersonalNumber,
    Composite,
}

/// Outcome of recomputing one check digit.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub target: CheckTarget,
    /// The digit printed in the MRZ.
    pub declared: char,
    /// The digit recomputed from the field value. None when the value
    /// contains characters outside the MRZ alphabet.
    pub computed: Option<char>,
    pub passed: bool,
    /// True when a confusable-character substitution was needed to pass.
    pub corrected: bool,
}

/// The final structured result of a recognition run.
///
/// Field names are canonical across all five formats; callers never need to
/// know which layout was detected.
#[derive(Debug, Clone, Serialize)]
pub struct MrzRecord {
    pub format: MrzFormat,
    pub document_type: String,
    /// Issuing state or organization.
    pub country: String,
    pub document_number: String,
    pub surname: String,
    pub given_names: String,
    pub nationality: String,
    /// YYMMDD as printed.
    pub birth_date: String,
    pub sex: String,
    /// YYMMDD as printed.
    pub expiry_date: String,
    /// TD3 only; filler-only values are kept verbatim.
    pub personal_number: Option<String>,
    /// Optional data of TD1/TD2/MRV layouts, filler preserved.
    pub optional_data: Option<String>,
    /// TD1 carries a second optional region on its middle line.
    pub optional_data_2: Option<String>,
    pub checks: Vec<CheckReport>,
    /// All check digits passed and the document shape matched the format.
    pub valid: bool,
    /// Fraction of checkable fields that passed, post-correction.
    pub valid_score: f32,
    pub raw_lines: Vec<String>,
    #[serde(skip)]
    pub roi: Option<Roi>,
}

impl MrzRecord {
    pub fn check(&self, target: CheckTarget) -> Option<&CheckReport> {
        self.checks.iter().find(|c| c.target == target)
    }

    pub fn check_passed(&self, target: CheckTarget) -> bool {
        self.check(target).map(|c| c.passed).unwrap_or(false)
    }

    /// Flat field-name -> value mapping for tabular or JSON emission.
    pub fn to_field_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("mrz_type".to_string(), self.format.name().to_string());
        map.insert("document_type".to_string(), self.document_type.clone());
        map.insert("country".to_string(), self.country.clone());
        map.insert("document_number".to_string(), self.document_number.clone());
        map.insert("surname".to_string(), self.surname.clone());
        map.insert("given_names".to_string(), self.given_names.clone());
        map.insert("nationality".to_string(), self.nationality.clone());
        map.insert("birth_date".to_string(), self.birth_date.clone());
        map.insert("sex".to_string(), self.sex.clone());
        map.insert("expiry_date".to_string(), self.expiry_date.clone());
        if let Some(pn) = &self.personal_number {
            map.insert("personal_number".to_string(), pn.clone());
        }
        if let Some(opt) = &self.optional_data {
            map.insert("optional_data".to_string(), opt.clone());
        }
        if let Some(opt) = &self.optional_data_2 {
            map.insert("optional_data_2".to_string(), opt.clone());
        }
        for check in &self.checks {
            let key = match check.target {
                CheckTarget::DocumentNumber => "valid_document_number",
                CheckTarget::BirthDate => "valid_birth_date",
                CheckTarget::ExpiryDate => "valid_expiry_date",
                CheckTarget::PersonalNumber => "valid_personal_number",
                CheckTarget::Composite => "valid_composite",
            };
            map.insert(key.to_string(), check.passed.to_string());
        }
        map.insert("valid".to_string(), self.valid.to_string());
        map.insert("valid_score".to_string(), format!("{:.2}", self.valid_score));
        map
    }
}
