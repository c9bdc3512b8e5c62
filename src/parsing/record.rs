use log::debug;

use crate::models::{MrzFormat, MrzRecord};
use crate::parsing::cleanup;
use crate::parsing::correction::correct_lines;
use crate::parsing::fields::{pad_lines, ExtractedFields};
use crate::parsing::format;
use crate::utils::MrzError;

/// Parses raw OCR output into a validated record: cleanup, format
/// resolution, correction and assembly in one call.
pub fn parse_text(text: &str) -> Result<MrzRecord, MrzError> {
    parse_lines(cleanup::clean(text))
}

/// Parses already-split MRZ lines into a validated record.
pub fn parse_lines(lines: Vec<String>) -> Result<MrzRecord, MrzError> {
    let format = format::resolve(&lines)?;
    let original_lengths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
    let padded = pad_lines(&lines, format);
    let (corrected, reports) = correct_lines(padded, format);
    Ok(assemble(corrected, format, reports, &original_lengths))
}

/// Merges extracted, corrected, validated fields into the final record.
///
/// Canonical field names are used regardless of which layout was detected.
/// `valid_score` is the fraction of checkable fields that passed after
/// correction; `valid` additionally requires the original line lengths and
/// the document-type letter to be consistent with the format.
fn assemble(
    lines: Vec<String>,
    format: MrzFormat,
    reports: Vec<crate::models::CheckReport>,
    original_lengths: &[usize],
) -> MrzRecord {
    let fields = ExtractedFields::extract(&lines, format);

    let checkable = reports.len().max(1);
    let passed = reports.iter().filter(|r| r.passed).count();
    let valid_score = passed as f32 / checkable as f32;

    let lengths_ok = original_lengths.len() == format.line_count()
        && original_lengths.iter().all(|&l| l == format.line_len());
    let type_ok = lines
        .first()
        .and_then(|l| l.chars().next())
        .map(|c| format.doc_type_letters().contains(c))
        .unwrap_or(false);
    let valid = passed == reports.len() && lengths_ok && type_ok;

    let optional = |key: &str| -> Option<String> {
        let value = fields.get(key);
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    };

    debug!(
        "{}: {}/{} checks passed, valid={}",
        format.name(),
        passed,
        reports.len(),
        valid
    );

    MrzRecord {
        format,
        document_type: fields.get("document_type").to_string(),
        country: fields.get("country").to_string(),
        document_number: fields.get("document_number").to_string(),
        surname: fields.get("surname").to_string(),
        given_names: fields.get("given_names").to_string(),
        nationality: fields.get("nationality").to_string(),
        birth_date: fields.get("birth_date").to_string(),
        sex: fields.get("sex").to_string(),
        expiry_date: fields.get("expiry_date").to_string(),
        personal_number: optional("personal_number"),
        optional_data: optional("optional_1"),
        optional_data_2: optional("optional_2"),
        checks: reports,
        valid,
        valid_score,
        raw_lines: lines,
        roi: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckTarget;

    fn lines(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn td3_passport_parses_fully_valid() {
        let record = parse_lines(lines(&[
            "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<",
            "L898902C<3UTO6908061F9406236ZE184226B<<<<<14",
        ]))
        .unwrap();
        assert_eq!(record.format, MrzFormat::Td3);
        assert_eq!(record.document_type, "P<");
        assert_eq!(record.country, "UTO");
        assert_eq!(record.surname, "ERIKSSON");
        assert_eq!(record.given_names, "ANNA MARIA");
        assert_eq!(record.document_number, "L898902C<");
        assert_eq!(record.nationality, "UTO");
        assert_eq!(record.birth_date, "690806");
        assert_eq!(record.sex, "F");
        assert_eq!(record.expiry_date, "940623");
        assert_eq!(record.personal_number.as_deref(), Some("ZE184226B<<<<<"));
        assert!(record.valid);
        assert_eq!(record.valid_score, 1.0);
    }

    #[test]
    fn single_corrupted_character_is_corrected_end_to_end() {
        // O read in place of 0 inside the numeric document number.
        let record = parse_lines(lines(&[
            "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<",
            "L8989O2C<3UTO6908061F9406236ZE184226B<<<<<14",
        ]))
        .unwrap();
        assert_eq!(record.document_number, "L898902C<");
        let check = record.check(CheckTarget::DocumentNumber).unwrap();
        assert!(check.passed);
        assert!(check.corrected);
        assert_eq!(record.valid_score, 1.0);
    }

    #[test]
    fn composite_digit_disagreement_lowers_the_score() {
        // Same specimen with a composite digit that does not match; the
        // record is still produced, with the mismatch on its report.
        let record = parse_lines(lines(&[
            "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<",
            "L898902C<3UTO6908061F9406236ZE184226B<<<<<10",
        ]))
        .unwrap();
        assert!(!record.check_passed(CheckTarget::Composite));
        assert!(record.check_passed(CheckTarget::DocumentNumber));
        assert!((record.valid_score - 0.8).abs() < 1e-6);
        assert!(!record.valid);
    }

    #[test]
    fn td1_identity_card_parses_fully_valid() {
        let record = parse_lines(lines(&[
            "IDAUT10000999<6<<<<<<<<<<<<<<<",
            "7109094F1112315AUT<<<<<<<<<<<4",
            "MUSTERFRAU<<ISOLDE<<<<<<<<<<<<",
        ]))
        .unwrap();
        assert_eq!(record.format, MrzFormat::Td1);
        assert_eq!(record.document_type, "ID");
        assert_eq!(record.country, "AUT");
        assert_eq!(record.document_number, "10000999<");
        assert_eq!(record.birth_date, "710909");
        assert_eq!(record.sex, "F");
        assert_eq!(record.expiry_date, "111231");
        assert_eq!(record.nationality, "AUT");
        assert_eq!(record.surname, "MUSTERFRAU");
        assert_eq!(record.given_names, "ISOLDE");
        assert!(record.valid);
        assert_eq!(record.valid_score, 1.0);
    }

    #[test]
    fn td2_and_visa_layouts_parse() {
        let td2 = parse_lines(lines(&[
            "I<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<",
            "D231458907UTO7408122F1204159<<<<<<<6",
        ]))
        .unwrap();
        assert_eq!(td2.format, MrzFormat::Td2);
        assert_eq!(td2.document_number, "D23145890");
        assert_eq!(td2.optional_data.as_deref(), Some("<<<<<<<"));
        assert!(td2.valid);

        let mrva = parse_lines(lines(&[
            "VIUSATRAVELER<<HAPPYPERSON<<<<<<<<<<<<<<<<<<",
            "555123ABC6GBR6502056F04122361FLNDDDAM5803085",
        ]))
        .unwrap();
        assert_eq!(mrva.format, MrzFormat::MrvA);
        assert_eq!(mrva.document_type, "VI");
        assert_eq!(mrva.surname, "TRAVELER");
        assert_eq!(mrva.given_names, "HAPPYPERSON");
        assert_eq!(mrva.document_number, "555123ABC");
        assert_eq!(mrva.nationality, "GBR");
        // MRV layouts have no composite or personal-number check.
        assert_eq!(mrva.checks.len(), 3);
        assert!(mrva.valid);
        assert_eq!(mrva.valid_score, 1.0);
    }

    #[test]
    fn optional_data_misread_is_repaired_through_the_composite() {
        // The 1 in the optional data was read as I. No field check covers
        // that region, so only the composite exposes it.
        let record = parse_lines(lines(&[
            "IDAUT10000999<6I23456<<<<<<<<<",
            "7109094F1112315AUT<<<<<<<<<<<9",
            "MUSTERFRAU<<ISOLDE<<<<<<<<<<<<",
        ]))
        .unwrap();
        assert_eq!(record.optional_data.as_deref(), Some("123456<<<<<<<<<"));
        let composite = record.check(CheckTarget::Composite).unwrap();
        assert!(composite.passed);
        assert!(composite.corrected);
        assert_eq!(record.valid_score, 1.0);
    }

    #[test]
    fn ocr_noise_parses_through_cleanup() {
        let record = parse_text(
            "\nuseless header\n  P<UTOERIKSSON<<ANNA < MARIA<<<<<<<<<<<<<<<<<<< \n  L8989O2C<3UTO69O8O61F94O6236ZE184226B<<<<<14  \n",
        )
        .unwrap();
        assert_eq!(record.format, MrzFormat::Td3);
        assert_eq!(record.surname, "ERIKSSON");
        assert_eq!(record.given_names, "ANNA MARIA");
        assert_eq!(record.birth_date, "690806");
        assert_eq!(record.valid_score, 1.0);
    }

    #[test]
    fn reparsing_a_corrected_record_is_stable() {
        let first = parse_lines(lines(&[
            "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<",
            "L8989O2C<3UTO6908061F9406236ZE184226B<<<<<14",
        ]))
        .unwrap();
        let second = parse_lines(first.raw_lines.clone()).unwrap();
        assert_eq!(first.raw_lines, second.raw_lines);
        let flags = |r: &MrzRecord| -> Vec<bool> { r.checks.iter().map(|c| c.passed).collect() };
        assert_eq!(flags(&first), flags(&second));
        assert_eq!(first.valid_score, second.valid_score);
    }

    #[test]
    fn field_map_round_trips_canonical_names() {
        let record = parse_lines(lines(&[
            "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<",
            "L898902C<3UTO6908061F9406236ZE184226B<<<<<14",
        ]))
        .unwrap();
        let map = record.to_field_map();
        assert_eq!(map.get("mrz_type").map(String::as_str), Some("TD3"));
        assert_eq!(map.get("surname").map(String::as_str), Some("ERIKSSON"));
        assert_eq!(map.get("valid_score").map(String::as_str), Some("1.00"));
        assert_eq!(
            map.get("valid_document_number").map(String::as_str),
            Some("true")
        );
    }
}
