//! Text canonicalization for OCR output.
//!
//! Two levels, used at different stages:
//!
//! - [`sanitize`]: strips control characters and tidies lines while keeping
//!   punctuation and case. Extraction runs on sanitized text: the comma in
//!   "Doe, John" and the capitalization of a printed name are load-bearing
//!   for the pattern rules.
//! - [`normalize`]: the matching form: lowercase, OCR-confusion repair,
//!   punctuation stripped to alphanumerics and spaces, whitespace collapsed.
//!   All field comparisons happen on normalized strings.
//!
//! Both are pure and total; empty or whitespace-only input yields an empty
//! string.

/// Strip control characters, trim each line, and collapse blank lines.
/// Punctuation that appears on medication labels is preserved.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(
                    c,
                    '.' | ','
                        | ';'
                        | ':'
                        | '-'
                        | '/'
                        | '('
                        | ')'
                        | '['
                        | ']'
                        | '+'
                        | '%'
                        | '#'
                        | '\''
                        | '"'
                        | 'µ'
                        | '°'
                )
        })
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Canonical matching form: lowercase, confusion-repaired, alphanumerics and
/// single spaces only. Idempotent.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let repaired = repair_confusions(&lowered);
    let mut out = String::with_capacity(repaired.len());
    let mut pending_space = false;
    for c in repaired.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

// ──────────────────────────────────────────────
// OCR confusion repair
// ──────────────────────────────────────────────

/// Digit/letter look-alike pairs OCR engines trip over on label fonts.
/// A digit is repaired to its letter form only inside a letter-dominated
/// run whose immediate neighbors are letters, and vice versa; a mixed run
/// like "10mg" is left alone.
fn digit_to_letter(c: char) -> Option<char> {
    match c {
        '0' => Some('o'),
        '1' => Some('l'),
        '5' => Some('s'),
        '8' => Some('b'),
        _ => None,
    }
}

fn letter_to_digit(c: char) -> Option<char> {
    match c {
        'o' => Some('0'),
        'l' | 'i' => Some('1'),
        's' => Some('5'),
        'b' => Some('8'),
        _ => None,
    }
}

fn repair_confusions(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::with_capacity(chars.len());

    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_alphanumeric() {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        // One contiguous alphanumeric run.
        let start = i;
        while i < chars.len() && chars[i].is_alphanumeric() {
            i += 1;
        }
        let run = &chars[start..i];

        let letters = run.iter().filter(|c| c.is_alphabetic()).count();
        let digits = run.iter().filter(|c| c.is_ascii_digit()).count();

        for (j, &c) in run.iter().enumerate() {
            let prev = if j > 0 { Some(run[j - 1]) } else { None };
            let next = run.get(j + 1).copied();
            // A digit is repaired only *between* two letters: a digit at a
            // run edge is usually a real dose prefix ("5ml"), not noise.
            // Letters repair at edges too: trailing o/l in a number is the
            // classic misread ("25o").
            let between_letters = prev.is_some_and(|p| p.is_alphabetic())
                && next.is_some_and(|n| n.is_alphabetic());
            let neighbors_digit = prev.map_or(true, |p| p.is_ascii_digit())
                && next.map_or(true, |n| n.is_ascii_digit())
                && (prev.is_some() || next.is_some());

            let repaired = if letters > digits && between_letters {
                digit_to_letter(c)
            } else if digits > letters && neighbors_digit {
                letter_to_digit(c)
            } else {
                None
            };
            out.push(repaired.unwrap_or(c));
        }
    }

    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── sanitize ──

    #[test]
    fn sanitize_strips_control_characters() {
        let raw = "LISINOPRIL\x00 10MG\x01\nTAKE DAILY";
        let clean = sanitize(raw);
        assert!(!clean.contains('\x00'));
        assert!(!clean.contains('\x01'));
        assert!(clean.contains("10MG"));
    }

    #[test]
    fn sanitize_keeps_label_punctuation() {
        let clean = sanitize("DOE, JOHN\n9:00 AM\n1/2 TABLET (ORAL)");
        assert!(clean.contains("DOE, JOHN"));
        assert!(clean.contains("9:00 AM"));
        assert!(clean.contains("1/2 TABLET (ORAL)"));
    }

    #[test]
    fn sanitize_collapses_blank_lines_and_trims() {
        assert_eq!(sanitize("  a  \n\n\n  b  "), "a\nb");
    }

    #[test]
    fn sanitize_empty_is_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize(" \n \t "), "");
    }

    // ── normalize ──

    #[test]
    fn normalize_lowercases_and_collapses() {
        assert_eq!(normalize("  JOHN   DOE \n"), "john doe");
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize("Doe, John"), "doe john");
        assert_eq!(normalize("9:00 AM"), "9 00 am");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in [
            "",
            "   ",
            "JOHN DOE",
            "L1SINOPRIL 10MG",
            "D0E, J0HN - 9:00 AM",
            "take 1/2 tablet with f00d",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn normalize_empty_and_whitespace_yield_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \t\n "), "");
    }

    // ── confusion repair ──

    #[test]
    fn repairs_digit_lookalikes_in_names() {
        assert_eq!(normalize("J0HN D0E"), "john doe");
        assert_eq!(normalize("L1SINOPRIL"), "llsinopril");
    }

    #[test]
    fn adjacent_confusables_are_not_repaired() {
        // Two look-alikes in a row give no trustworthy context; leave them
        // for the edit-distance fallback downstream.
        assert_eq!(normalize("L15INOPRIL"), "l15inopril");
    }

    #[test]
    fn repairs_letter_lookalikes_in_numbers() {
        assert_eq!(normalize("1o0"), "100");
        assert_eq!(normalize("25o"), "250");
    }

    #[test]
    fn mixed_runs_are_left_alone() {
        // Dosage tokens mix digits and letters legitimately.
        assert_eq!(normalize("10mg"), "10mg");
        assert_eq!(normalize("5ml"), "5ml");
        assert_eq!(normalize("5mg"), "5mg");
    }

    #[test]
    fn repair_requires_dominant_context() {
        // Two-character runs have no majority: never flip.
        assert_eq!(normalize("1o"), "1o");
        assert_eq!(normalize("o1"), "o1");
    }
}
