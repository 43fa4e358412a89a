//! Shared text normalization and comparison utilities

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Leading articles moved to the end of a sortable title
const ARTICLES: &[&str] = &["the", "a", "an", "der", "die", "das", "le", "la", "les", "el"];

/// Normalize a title for matching: lowercase, separators to spaces,
/// punctuation removed, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(['.', '_', '-'], " ")
        .replace(['\'', '\u{2019}', ':', ',', '!'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between two titles in `0.0..=1.0` after normalization
pub fn title_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_title(a), &normalize_title(b))
}

/// Move a leading article to the end: "The Matrix" -> "Matrix, The"
pub fn sortable_title(title: &str) -> String {
    let trimmed = title.trim();
    if let Some((first, rest)) = trimmed.split_once(' ') {
        let rest = rest.trim_start();
        if !rest.is_empty() && ARTICLES.iter().any(|a| a.eq_ignore_ascii_case(first)) {
            return format!("{}, {}", rest, first);
        }
    }
    trimmed.to_string()
}

/// First letter of a title, uppercased; `#` for titles starting with a non-letter
pub fn first_letter(title: &str) -> String {
    match title.trim().chars().next() {
        Some(c) if c.is_alphabetic() => {
            let folded = fold_to_ascii(&c.to_string());
            folded
                .chars()
                .next()
                .unwrap_or(c)
                .to_uppercase()
                .collect()
        }
        Some(_) => "#".to_string(),
        None => String::new(),
    }
}

/// Fold text to ASCII: strip diacritics, expand common ligatures,
/// drop whatever has no ASCII counterpart.
pub fn fold_to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfd() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        if is_combining_mark(c) {
            continue;
        }
        match c {
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'đ' => out.push('d'),
            'Đ' => out.push('D'),
            'þ' => out.push_str("th"),
            'Þ' => out.push_str("TH"),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            _ => {}
        }
    }
    out
}
