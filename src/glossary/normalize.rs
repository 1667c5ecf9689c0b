/*!
 * Term normalization for dictionary matching.
 *
 * Produces the canonical comparison form used by every matching stage. The
 * canonical form is never shown to users; display always uses the raw term.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that survive stripping: word characters, whitespace,
/// Hiragana/Katakana, CJK ideographs, full-width digits and letters, and the
/// canonical dash.
static STRIP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[^\w\s\u{3040}-\u{30FF}\u{4E00}-\u{9FFF}\u{FF10}-\u{FF19}\u{FF21}-\u{FF3A}\u{FF41}-\u{FF5A}\u{30FC}]",
    )
    .unwrap()
});

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalize a term for comparison.
///
/// Rules, applied in order: trim; fold full-width Latin letters/digits to
/// half-width; unify long-dash variants to `ー`; lowercase; strip symbols;
/// collapse whitespace runs; trim.
///
/// The function is pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(input: &str) -> String {
    let folded: String = input
        .trim()
        .chars()
        .map(fold_width)
        .map(unify_dash)
        .collect();

    let lowered = folded.to_lowercase();
    let stripped = STRIP_PATTERN.replace_all(&lowered, "");
    let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");

    collapsed.trim().to_string()
}

/// Map full-width Latin letters/digits and the ideographic space to their
/// half-width equivalents
fn fold_width(c: char) -> char {
    match c {
        'Ａ'..='Ｚ' | 'ａ'..='ｚ' | '０'..='９' => {
            char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
        }
        '\u{3000}' => ' ',
        _ => c,
    }
}

/// Map long-dash variants (hyphen family, minus sign, wave dash, full-width
/// hyphen and tilde, half-width prolonged mark) to the canonical dash `ー`
fn unify_dash(c: char) -> char {
    match c {
        '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{301C}' | '\u{FF0D}' | '\u{FF5E}'
        | '\u{FF70}' => '\u{30FC}',
        _ => c,
    }
}
