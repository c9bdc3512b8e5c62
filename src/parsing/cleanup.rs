//! Cleanup of raw OCR output before parsing: junk lines are dropped, spaces
//! removed, and characters repaired position-by-position using the resolved
//! layout's character classes (a date position can only hold a digit, so an
//! `O` there must have been a `0`, and so on).

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::rules::{ALPHA_CONFUSABLES, NUMERIC_CONFUSABLES};
use crate::models::MrzFormat;
use crate::parsing::format;

lazy_static! {
    /// Lines surviving cleanup must look like MRZ text.
    static ref MRZ_LINE: Regex = Regex::new(r"^[A-Z0-9<>]+$").unwrap();
}

/// Splits raw OCR text into candidate MRZ lines. Spaces are stripped (OCR
/// habitually inserts them around fillers); a line is kept when it is long
/// enough to be MRZ content or carries the `<<` name separator.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .map(|l| l.to_uppercase())
        .filter(|l| (l.chars().count() >= 20 || l.contains("<<")) && MRZ_LINE.is_match(l))
        .collect()
}

/// Cleans raw OCR output into parse-ready lines. When the line shape allows
/// a format guess, each character is passed through the class fixer for its
/// position; otherwise the lines are returned as split.
pub fn clean(text: &str) -> Vec<String> {
    let mut lines = split_lines(text);
    if let Some(format) = format::guess(&lines) {
        for (idx, line) in lines.iter_mut().enumerate() {
            *line = fix_line(line, format, idx);
        }
    }
    lines
}

fn fix_line(line: &str, format: MrzFormat, line_idx: usize) -> String {
    let classes = format
        .position_classes()
        .get(line_idx)
        .copied()
        .unwrap_or("");
    let class_bytes = classes.as_bytes();
    line.chars()
        .enumerate()
        .map(|(i, c)| match class_bytes.get(i) {
            Some(b'a') | Some(b'A') => fix_with(ALPHA_CONFUSABLES, c),
            Some(b'n') | Some(b'N') => fix_with(NUMERIC_CONFUSABLES, c),
            _ => c,
        })
        .collect()
}

fn fix_with(table: &[(char, char)], c: char) -> char {
    table
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junk_lines_and_spaces_are_removed() {
        let text = "\n\n this line useless \n IDAUT10000999<6  <<<<<<<<< <<<<<< \n 7109094F11  12315AUT<<<<<<<<<<<4 \n MUSTERFRA  U<<ISOLDE<<<  <<<<<<<<<\n asdf ";
        let lines = split_lines(text);
        assert_eq!(
            lines,
            vec![
                "IDAUT10000999<6<<<<<<<<<<<<<<<",
                "7109094F1112315AUT<<<<<<<<<<<4",
                "MUSTERFRAU<<ISOLDE<<<<<<<<<<<<",
            ]
        );
    }

    #[test]
    fn class_fixers_repair_digit_letter_confusions() {
        // Date and check-digit positions of a TD1 middle line misread as
        // letters; the numeric classes force them back to digits.
        let text = "IDAUT10000999<6<<<<<<<<<<<<<<<\n7IO9O94FII123I5AUT<<<<<<<<<<<4\nMUSTERFRAU<<ISOLDE<<<<<<<<<<<<";
        let lines = clean(text);
        assert_eq!(lines[1], "7109094F1112315AUT<<<<<<<<<<<4");
    }

    #[test]
    fn name_positions_are_repaired_toward_letters() {
        let text = "IDAUT10000999<6<<<<<<<<<<<<<<<\n7109094F1112315AUT<<<<<<<<<<<4\nMU5TERFRAU<<I5OLDE<<<<<<<<<<<<";
        let lines = clean(text);
        assert_eq!(lines[2], "MUSTERFRAU<<ISOLDE<<<<<<<<<<<<");
    }

    #[test]
    fn unknown_shape_passes_through_untouched() {
        let text = "SOMETHING<<WITHLOTSOFFILLER";
        let lines = clean(text);
        assert_eq!(lines, vec!["SOMETHING<<WITHLOTSOFFILLER"]);
    }
}
