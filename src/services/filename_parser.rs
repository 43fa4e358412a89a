//! Filename parser for media releases
//!
//! Extracts the stacking marker of multi-part files, the normalized "clean
//! name" used to group files into items, and a title/year guess used to seed
//! new items.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Stacking marker: separator (or start), keyword, optional separator, digits, separator (or end)
static STACKING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[ _.\-]+)((cd|dvd|part|pt|disc|disk)[ _.\-]*([0-9]{1,3}))(?:[ _.\-]|$)")
        .expect("valid stacking regex")
});

/// A directory named only by a stacking marker (`CD1`, `Disc 2`)
static STACKING_FOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(cd|dvd|part|pt|disc|disk)[ _.\-]*([0-9]{1,3})$")
        .expect("valid stacking folder regex")
});

static YEAR_IN_PARENS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(\[]((?:19|20)\d{2})[)\]]").expect("valid year regex"));

static YEAR_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)[ ._\-]+((?:19|20)\d{2})(?:[ ._\-]|$)").expect("valid year suffix regex")
});

static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));

/// Release noise stripped from clean names and titles
const NOISE_TOKENS: &[&str] = &[
    "2160p", "1080p", "1080i", "720p", "576p", "480p", "4k", "uhd", "hdr", "hdr10", "dv",
    "bluray", "blu-ray", "bdrip", "brrip", "bdremux", "remux", "dvdrip", "dvdscr", "dvd9",
    "dvd5", "webrip", "web-dl", "webdl", "web", "hdtv", "hdrip", "x264", "x265", "h264", "h265",
    "hevc", "avc", "xvid", "divx", "aac", "ac3", "dts", "truehd", "atmos", "ddp", "proper",
    "repack", "extended", "unrated", "remastered", "limited", "internal", "multi", "dual",
    "german", "french",
];

/// Stacking information parsed from a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stacking {
    /// Marker as written in the name (`CD 1`)
    pub raw: String,
    /// Normalized marker (`cd1`)
    pub marker: String,
    pub index: u32,
}

/// Strip the final extension when it looks like one (1-5 alphanumerics)
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx)
            if idx > 0
                && filename.len() - idx - 1 <= 5
                && filename[idx + 1..].chars().all(|c| c.is_ascii_alphanumeric())
                && idx + 1 < filename.len() =>
        {
            &filename[..idx]
        }
        _ => filename,
    }
}

/// Detect a stacking marker inside a file stem; the last marker wins
pub fn detect_stacking(stem: &str) -> Option<Stacking> {
    let caps = STACKING_RE.captures_iter(stem).last()?;
    let raw = caps.get(1)?.as_str().to_string();
    let keyword = caps.get(2)?.as_str().to_lowercase();
    let index: u32 = caps.get(3)?.as_str().parse().ok()?;
    if index == 0 {
        return None;
    }
    Some(Stacking {
        raw,
        marker: format!("{}{}", keyword, index),
        index,
    })
}

/// Detect a directory whose name is only a stacking marker
pub fn stacking_folder(name: &str) -> Option<Stacking> {
    let caps = STACKING_FOLDER_RE.captures(name.trim())?;
    let keyword = caps.get(1)?.as_str().to_lowercase();
    let index: u32 = caps.get(2)?.as_str().parse().ok()?;
    (index > 0).then(|| Stacking {
        raw: name.trim().to_string(),
        marker: format!("{}{}", keyword, index),
        index,
    })
}

/// Remove the stacking marker from a stem, keeping the surrounding text
pub fn remove_stacking(stem: &str) -> String {
    let Some(caps) = STACKING_RE.captures_iter(stem).last() else {
        return stem.to_string();
    };
    let Some(whole) = caps.get(0) else {
        return stem.to_string();
    };
    let mut out = String::with_capacity(stem.len());
    out.push_str(&stem[..whole.start()]);
    if whole.end() < stem.len() {
        out.push(' ');
        out.push_str(&stem[whole.end()..]);
    }
    out.trim_end_matches([' ', '_', '.', '-']).to_string()
}

fn is_noise(token: &str) -> bool {
    let token = token.trim_matches(|c: char| c == '[' || c == ']' || c == '(' || c == ')');
    NOISE_TOKENS.iter().any(|n| n.eq_ignore_ascii_case(token))
}

/// Normalized name used to decide whether two primary-media files belong to
/// the same item: extension, stacking marker and release noise removed,
/// separators collapsed, lowercased.
pub fn clean_name(filename: &str) -> String {
    let stem = remove_stacking(strip_extension(filename));
    let spaced = stem.replace(['.', '_'], " ");
    let tokens: Vec<&str> = spaced
        .split_whitespace()
        .filter(|t| !is_noise(t))
        .collect();
    tokens
        .join(" ")
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_lowercase()
}

/// Guess a title and year from a filename or directory name
///
/// Recognizes `Title (1999)`, `Title [1999]` and `Title.1999.noise`.
pub fn parse_title_year(name: &str) -> (String, Option<i32>) {
    parse_stem_title_year(strip_extension(name))
}

/// Same as [`parse_title_year`] for a directory name, which has no extension
pub fn parse_folder_title_year(name: &str) -> (String, Option<i32>) {
    parse_stem_title_year(name)
}

fn parse_stem_title_year(name: &str) -> (String, Option<i32>) {
    let stem = remove_stacking(name);

    let (title_part, year) = if let Some(caps) = YEAR_IN_PARENS_RE.captures(&stem) {
        let whole = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let year = caps.get(1).and_then(|m| m.as_str().parse().ok());
        (stem[..whole].to_string(), year)
    } else if let Some(caps) = YEAR_SUFFIX_RE.captures(&stem) {
        let title = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let year = caps.get(2).and_then(|m| m.as_str().parse().ok());
        (title.to_string(), year)
    } else {
        (stem.clone(), None)
    };

    let mut title = clean_title(&title_part);
    if title.is_empty() {
        title = clean_title(&stem);
    }

    debug!(name = name, title = %title, year = ?year, "Parsed title");
    (title, year)
}

fn clean_title(raw: &str) -> String {
    let spaced = if raw.contains(' ') {
        raw.replace('_', " ")
    } else {
        raw.replace(['.', '_'], " ")
    };
    let tokens: Vec<&str> = spaced.split_whitespace().filter(|t| !is_noise(t)).collect();
    SPACE_RE
        .replace_all(&tokens.join(" "), " ")
        .trim_matches(|c: char| c == '-' || c == '.' || c.is_whitespace())
        .to_string()
}
