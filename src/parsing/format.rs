use log::debug;

use crate::models::MrzFormat;
use crate::utils::MrzError;

/// OCR may drop or insert a character at line ends; lengths within this
/// distance of a format's line length still match.
const LENGTH_TOLERANCE: usize = 2;

/// Loose format guess used to pick cleanup rules before strict resolution:
/// three lines is TD1, two short lines TD2/MRVB, two long lines TD3/MRVA,
/// with a leading `V` marking the visa variants.
pub fn guess(lines: &[String]) -> Option<MrzFormat> {
    let starts_with_v = lines
        .first()
        .and_then(|l| l.chars().next())
        .map(|c| c.eq_ignore_ascii_case(&'V'))
        .unwrap_or(false);
    match lines.len() {
        3 => Some(MrzFormat::Td1),
        2 if lines.iter().all(|l| l.chars().count() < 40) => {
            Some(if starts_with_v { MrzFormat::MrvB } else { MrzFormat::Td2 })
        }
        2 => Some(if starts_with_v { MrzFormat::MrvA } else { MrzFormat::Td3 }),
        _ => None,
    }
}

/// Resolves the unique format matching the observed line count and lengths.
///
/// The 36- and 44-character families are each shared by two layouts; the
/// document-type prefix decides between them, preferring the visa variant
/// only on an explicit `V`. No match within tolerance is a `FormatMismatch`.
pub fn resolve(lines: &[String]) -> Result<MrzFormat, MrzError> {
    if lines.is_empty() {
        return Err(MrzError::FormatMismatch("no text lines".to_string()));
    }

    let candidates: Vec<MrzFormat> = MrzFormat::ALL
        .into_iter()
        .filter(|f| {
            f.line_count() == lines.len()
                && lines
                    .iter()
                    .all(|l| l.chars().count().abs_diff(f.line_len()) <= LENGTH_TOLERANCE)
        })
        .collect();

    let starts_with_v = lines[0]
        .chars()
        .next()
        .map(|c| c == 'V')
        .unwrap_or(false);

    let resolved = match candidates.as_slice() {
        [] => {
            let shape: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
            return Err(MrzError::FormatMismatch(format!(
                "{} line(s) of lengths {:?}",
                lines.len(),
                shape
            )));
        }
        [only] => *only,
        _ if candidates.contains(&MrzFormat::Td3) => {
            if starts_with_v {
                MrzFormat::MrvA
            } else {
                MrzFormat::Td3
            }
        }
        _ if candidates.contains(&MrzFormat::Td2) => {
            if starts_with_v {
                MrzFormat::MrvB
            } else {
                MrzFormat::Td2
            }
        }
        _ => candidates[0],
    };
    debug!("resolved format {}", resolved.name());
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn three_thirty_char_lines_resolve_to_td1_only() {
        let input = lines(&[
            "IDAUT10000999<6<<<<<<<<<<<<<<<",
            "7109094F1112315AUT<<<<<<<<<<<4",
            "MUSTERFRAU<<ISOLDE<<<<<<<<<<<<",
        ]);
        assert_eq!(resolve(&input).unwrap(), MrzFormat::Td1);
    }

    #[test]
    fn forty_four_char_lines_resolve_to_td3_or_mrva() {
        let td3 = lines(&[&"P".repeat(44), &"X".repeat(44)]);
        assert_eq!(resolve(&td3).unwrap(), MrzFormat::Td3);
        let mrva = lines(&[&("V".to_owned() + &"A".repeat(43)), &"X".repeat(44)]);
        assert_eq!(resolve(&mrva).unwrap(), MrzFormat::MrvA);
    }

    #[test]
    fn thirty_six_char_lines_resolve_to_td2_or_mrvb() {
        let td2 = lines(&[&"I".repeat(36), &"X".repeat(36)]);
        assert_eq!(resolve(&td2).unwrap(), MrzFormat::Td2);
        let mrvb = lines(&[&("V".to_owned() + &"B".repeat(35)), &"X".repeat(36)]);
        assert_eq!(resolve(&mrvb).unwrap(), MrzFormat::MrvB);
    }

    #[test]
    fn length_drift_within_tolerance_still_resolves() {
        let short = lines(&[&"P".repeat(43), &"X".repeat(44)]);
        assert_eq!(resolve(&short).unwrap(), MrzFormat::Td3);
    }

    #[test]
    fn unmatched_shapes_are_format_mismatches() {
        assert!(matches!(
            resolve(&lines(&["TOO SHORT"])),
            Err(MrzError::FormatMismatch(_))
        ));
        assert!(matches!(
            resolve(&lines(&[&"X".repeat(40), &"X".repeat(40)])),
            Err(MrzError::FormatMismatch(_))
        ));
        assert!(matches!(resolve(&[]), Err(MrzError::FormatMismatch(_))));
    }
}
