//! Rename template engine
//!
//! Expands `$X` tokens and `{ ... }` optional groups against an item and its
//! primary media file, then normalizes the result into safe path segments.
//!
//! Supported tokens:
//! - `$T` title, `$O` original title, `$E` sortable title (`Matrix, The`)
//! - `$1` first letter of the title, `$2` first letter of the sortable title
//! - `$Y` year, `$I` external id (imdb, then tmdb), `$M` collection title
//! - `$L` spoken languages, `$C` certification, `$G` primary genre
//! - `$R` video resolution, `$3` 3D flag, `$A` audio codec + channels,
//!   `$V` video codec + format, `$S` media source
//!
//! A group such as `{($Y)}` is dropped entirely when a token inside it
//! resolves to nothing; a token outside a group simply resolves to an empty
//! string.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::file_utils::{same_image_extension, sanitize_segment};
use super::text_utils::{first_letter, fold_to_ascii, sortable_title};
use crate::config::EngineConfig;
use crate::media::{FileKind, Item, MediaFile};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[A-Za-z0-9]").expect("valid token regex"));

static GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("valid group regex"));

static EMPTY_BRACKETS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]|\{\s*\}").expect("valid brackets regex"));

static SEPARATORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*/[\s/]*").expect("valid separator regex"));

static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid space regex"));

/// Placeholder for the new primary basename in naming variants
pub const BASENAME_PLACEHOLDER: &str = "<basename>";

/// Placeholder for the item title in naming variants
pub const TITLE_PLACEHOLDER: &str = "<title>";

const BANNER_NAMES: &[&str] = &["banner.ext"];
const THUMB_NAMES: &[&str] = &["thumb.ext"];

/// Resolve a single token; `None` when the token is unknown
fn token_value(token: &str, item: &Item, main: Option<&MediaFile>) -> Option<String> {
    let title = item.title.trim();
    let sortable = item
        .sort_title
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| sortable_title(title));

    let value = match token {
        "$T" => title.to_string(),
        "$O" => item.original_title.clone().unwrap_or_default(),
        "$E" => sortable,
        "$1" => first_letter(title),
        "$2" => first_letter(&sortable),
        "$Y" => item.known_year().map(|y| y.to_string()).unwrap_or_default(),
        "$I" => item.external_id().unwrap_or_default().to_string(),
        "$M" => item.collection.clone().unwrap_or_default(),
        "$L" => item.spoken_languages.join(", "),
        "$C" => item.certification.clone().unwrap_or_default(),
        "$G" => item.genres.first().cloned().unwrap_or_default(),
        "$S" => item.media_source.clone().unwrap_or_default(),
        "$R" => main.and_then(MediaFile::video_resolution).unwrap_or_default(),
        "$3" => main
            .and_then(|m| m.video_3d.clone())
            .filter(|v| !v.is_empty())
            .map(|_| "3D".to_string())
            .unwrap_or_default(),
        "$A" => main.and_then(MediaFile::audio_label).unwrap_or_default(),
        "$V" => main.and_then(MediaFile::video_label).unwrap_or_default(),
        _ => return None,
    };

    // Values never introduce directory levels
    Some(value.replace(['/', '\\'], " ").trim().to_string())
}

fn substitute(text: &str, item: &Item, main: Option<&MediaFile>) -> (String, bool) {
    let mut any_empty = false;
    let out = TOKEN_RE.replace_all(text, |caps: &regex::Captures| {
        let token = &caps[0];
        match token_value(token, item, main) {
            Some(value) => {
                any_empty |= value.is_empty();
                value
            }
            None => token.to_string(),
        }
    });
    (out.into_owned(), any_empty)
}

/// Expand a template for an item
///
/// With `for_filename` set, path separators in the result become spaces.
/// Deterministic: the same item, template and configuration always produce
/// the same bytes.
pub fn expand(template: &str, item: &Item, for_filename: bool, config: &EngineConfig) -> String {
    let main = item.main_file();

    let grouped = GROUP_RE.replace_all(template, |caps: &regex::Captures| {
        let inner = &caps[1];
        let (expanded, any_empty) = substitute(inner, item, main);
        if any_empty {
            String::new()
        } else {
            expanded
        }
    });
    let (mut out, _) = substitute(&grouped, item, main);

    loop {
        let stripped = EMPTY_BRACKETS_RE.replace_all(&out, "").into_owned();
        if stripped == out {
            break;
        }
        out = stripped;
    }

    out = out.replace('\\', "/");
    out = SEPARATORS_RE.replace_all(&out, "/").into_owned();
    if for_filename {
        out = out.replace('/', " ");
    }

    out = SPACES_RE.replace_all(&out, " ").trim().to_string();

    if config.space_substitution {
        let replacement = &config.space_replacement;
        out = out.replace(' ', replacement);
        if !replacement.is_empty() {
            let doubled = format!("{replacement}{replacement}");
            while out.contains(&doubled) {
                out = out.replace(&doubled, replacement);
            }
        }
    }

    if config.ascii_replacement {
        out = fold_to_ascii(&out);
    }

    let result = out
        .split('/')
        .map(sanitize_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    debug!(template, result = %result, "Expanded template");
    result
}

/// New directory of an item relative to its datasource; `None` when the
/// template expands to nothing
pub fn directory_name(item: &Item, config: &EngineConfig) -> Option<PathBuf> {
    let expanded = expand(&config.dir_template, item, false, config);
    if expanded.is_empty() {
        return None;
    }
    Some(expanded.split('/').collect())
}

/// New primary basename (without extension); falls back to the current basename
pub fn file_basename(item: &Item, config: &EngineConfig) -> String {
    let expanded = expand(&config.file_template, item, true, config);
    if !expanded.is_empty() {
        return expanded;
    }
    item.main_file()
        .map(|m| super::filename_parser::remove_stacking(m.basename()))
        .unwrap_or_else(|| sanitize_segment(&item.title))
}

/// New filename of a primary media file: `<base>[.<marker>].<ext>`
pub fn video_filename(basename: &str, file: &MediaFile) -> String {
    stacked_name(basename, file, None)
}

/// New filename of a trailer: `<base>-trailer.<ext>`
pub fn trailer_filename(basename: &str, file: &MediaFile) -> String {
    format!("{}-trailer.{}", basename, file.extension())
}

/// New filename of a subtitle: `<base>[.<marker>][.<lang>][.forced].<ext>`
pub fn subtitle_filename(basename: &str, file: &MediaFile) -> String {
    let mut suffix = String::new();
    if let Some(lang) = file.language.as_deref().filter(|l| !l.is_empty()) {
        suffix.push('.');
        suffix.push_str(lang);
    }
    if file.forced {
        suffix.push_str(".forced");
    }
    stacked_name(basename, file, Some(&suffix))
}

fn stacked_name(basename: &str, file: &MediaFile, suffix: Option<&str>) -> String {
    let mut name = basename.to_string();
    if file.stacking > 0 && !file.stacking_marker.is_empty() {
        name.push('.');
        name.push_str(&file.stacking_marker);
    }
    if let Some(suffix) = suffix {
        name.push_str(suffix);
    }
    let ext = file.extension();
    if !ext.is_empty() {
        name.push('.');
        name.push_str(&ext);
    }
    name
}

/// Configured naming variants for a file kind; in a multi-item directory the
/// only variant is the basename-qualified one
fn variants_for(kind: FileKind, config: &EngineConfig, multi_item: bool) -> Vec<String> {
    if multi_item {
        let forced = match kind {
            FileKind::Nfo => "<basename>.nfo",
            FileKind::Poster => "<basename>-poster.ext",
            FileKind::Fanart => "<basename>-fanart.ext",
            FileKind::Banner => "<basename>-banner.ext",
            FileKind::Thumb => "<basename>-thumb.ext",
            _ => return Vec::new(),
        };
        return vec![forced.to_string()];
    }
    match kind {
        FileKind::Nfo => config.nfo_names.clone(),
        FileKind::Poster => config.poster_names.clone(),
        FileKind::Fanart => config.fanart_names.clone(),
        FileKind::Banner => BANNER_NAMES.iter().map(|s| s.to_string()).collect(),
        FileKind::Thumb => THUMB_NAMES.iter().map(|s| s.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Every destination filename a copied file (NFO or artwork) is written to
///
/// A variant ending in `.ext` takes the source extension. A variant with a
/// fixed extension is produced only when it matches the source extension.
pub fn variant_filenames(
    file: &MediaFile,
    basename: &str,
    title: &str,
    config: &EngineConfig,
    multi_item: bool,
) -> Vec<String> {
    let source_ext = file.extension();
    let mut names: Vec<String> = Vec::new();

    for variant in variants_for(file.kind, config, multi_item) {
        let filled = variant
            .replace(BASENAME_PLACEHOLDER, basename)
            .replace(TITLE_PLACEHOLDER, &sanitize_segment(title));

        let name = match filled.strip_suffix(".ext") {
            Some(stem) => format!("{}.{}", stem, source_ext),
            None => {
                let variant_ext = filled
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_lowercase())
                    .unwrap_or_default();
                if variant_ext != source_ext && !same_image_extension(&variant_ext, &source_ext) {
                    debug!(
                        variant = %filled,
                        source = %file.filename,
                        "Skipping naming variant with mismatching extension"
                    );
                    continue;
                }
                filled
            }
        };

        let name = sanitize_segment(&name);
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
