use std::collections::BTreeMap;

use crate::models::rules::{FieldKind, FieldName, Span};
use crate::models::MrzFormat;

/// Raw per-field strings sliced out of the MRZ lines. Extraction is pure
/// fixed-offset slicing and always succeeds syntactically; whether the
/// values make sense is judged downstream.
#[derive(Debug, Clone)]
pub struct ExtractedFields {
    pub format: MrzFormat,
    values: BTreeMap<&'static str, String>,
    by_name: Vec<(FieldName, String)>,
}

/// Pads each line with `<` to the format's fixed length. OCR drops trailing
/// fillers often enough that short lines are expected input.
pub fn pad_lines(lines: &[String], format: MrzFormat) -> Vec<String> {
    let target = format.line_len();
    lines
        .iter()
        .map(|line| {
            let mut padded: String = line.clone();
            let count = padded.chars().count();
            if count < target {
                padded.extend(std::iter::repeat('<').take(target - count));
            }
            padded
        })
        .collect()
}

fn slice(lines: &[String], span: &Span) -> String {
    lines
        .get(span.line)
        .map(|l| l.chars().skip(span.start).take(span.len).collect())
        .unwrap_or_default()
}

/// Splits the name region on the `<<` separator into surname and given
/// names, translating remaining fillers to spaces.
fn split_name(raw: &str) -> (String, String) {
    let (surname, given) = match raw.split_once("<<") {
        Some((s, g)) => (s, g),
        None => (raw, ""),
    };
    (
        surname.replace('<', " ").trim().to_string(),
        given.replace('<', " ").trim().to_string(),
    )
}

impl ExtractedFields {
    /// Slices `lines` (already padded to the format length) per the format's
    /// field table.
    pub fn extract(lines: &[String], format: MrzFormat) -> ExtractedFields {
        let mut values = BTreeMap::new();
        let mut by_name = Vec::new();
        for spec in format.fields() {
            let raw = slice(lines, &spec.span);
            match spec.kind {
                FieldKind::Name => {
                    let (surname, given) = split_name(&raw);
                    values.insert("surname", surname);
                    values.insert("given_names", given);
                }
                _ => {
                    let key = match spec.name {
                        FieldName::DocumentType => "document_type",
                        FieldName::Country => "country",
                        FieldName::DocumentNumber => "document_number",
                        FieldName::Nationality => "nationality",
                        FieldName::BirthDate => "birth_date",
                        FieldName::Sex => "sex",
                        FieldName::ExpiryDate => "expiry_date",
                        FieldName::PersonalNumber => "personal_number",
                        FieldName::Optional1 => "optional_1",
                        FieldName::Optional2 => "optional_2",
                        FieldName::Name => unreachable!(),
                    };
                    values.insert(key, raw.clone());
                }
            }
            by_name.push((spec.name, raw));
        }
        ExtractedFields {
            format,
            values,
            by_name,
        }
    }

    /// Raw value by canonical key, filler characters preserved except in the
    /// name components.
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    /// Raw value by field-table name, exactly as printed.
    pub fn raw(&self, name: FieldName) -> &str {
        self.by_name
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}
