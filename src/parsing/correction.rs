use log::debug;

use crate::models::data::{CheckReport, CheckTarget};
use crate::models::rules::{confusable_alternatives, CheckSpec};
use crate::models::MrzFormat;
use crate::validation::checkdigit::{validate_all, validate_check};

/// Best-effort recovery from single-character OCR confusions.
///
/// For every check that fails, single-character substitutions from the fixed
/// confusable set are tried at each position of the check-relevant
/// substring, leftmost first; the first substitution that makes the digit
/// pass without breaking any check that already passed is committed to the
/// line buffer, so the composite check sees it too. Only single-character
/// corrections are attempted; anything deeper stays invalid.
pub fn correct_lines(
    mut lines: Vec<String>,
    format: MrzFormat,
) -> (Vec<String>, Vec<CheckReport>) {
    let checks = format.checks();
    let mut corrected: Vec<CheckTarget> = Vec::new();

    for spec in checks {
        if validate_check(&lines, spec).passed {
            continue;
        }
        if let Some((line, pos, ch)) = find_substitution(&lines, spec, checks) {
            debug!(
                "corrected {:?}: position {}:{} -> {}",
                spec.target, line, pos, ch
            );
            replace_char(&mut lines[line], pos, ch);
            corrected.push(spec.target);
        }
    }

    let mut reports = validate_all(&lines, checks);
    for report in &mut reports {
        if report.passed && corrected.contains(&report.target) {
            report.corrected = true;
        }
    }
    (lines, reports)
}

/// Finds the leftmost single-character substitution that makes `spec` pass
/// while every previously-passing check keeps passing.
///
/// The composite check overlaps the substrings of the per-field checks;
/// repairing it at one of those positions would second-guess a field that
/// has its own dedicated check, so composite repair is confined to the
/// positions only the composite covers (the optional-data regions).
fn find_substitution(
    lines: &[String],
    spec: &CheckSpec,
    checks: &'static [CheckSpec],
) -> Option<(usize, usize, char)> {
    let passing_before: Vec<CheckTarget> = checks
        .iter()
        .filter(|s| validate_check(lines, s).passed)
        .map(|s| s.target)
        .collect();

    let reserved: Vec<(usize, usize)> = if spec.target == CheckTarget::Composite {
        checks
            .iter()
            .filter(|s| s.target != CheckTarget::Composite)
            .flat_map(|s| {
                s.spans
                    .iter()
                    .flat_map(|span| (0..span.len).map(move |o| (span.line, span.start + o)))
                    .chain(std::iter::once(s.digit))
            })
            .collect()
    } else {
        Vec::new()
    };

    for span in spec.spans {
        for offset in 0..span.len {
            let pos = span.start + offset;
            if reserved.contains(&(span.line, pos)) {
                continue;
            }
            let current = lines.get(span.line)?.chars().nth(pos)?;
            for alternative in confusable_alternatives(current) {
                let mut trial = lines.to_vec();
                replace_char(&mut trial[span.line], pos, alternative);
                if !validate_check(&trial, spec).passed {
                    continue;
                }
                let regressed = checks
                    .iter()
                    .filter(|s| passing_before.contains(&s.target))
                    .any(|s| !validate_check(&trial, s).passed);
                if !regressed {
                    return Some((span.line, pos, alternative));
                }
            }
        }
    }
    None
}

fn replace_char(line: &mut String, index: usize, c: char) {
    let mut chars: Vec<char> = line.chars().collect();
    if index < chars.len() {
        chars[index] = c;
        *line = chars.into_iter().collect();
    }
}
