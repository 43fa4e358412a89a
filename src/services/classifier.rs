//! File classifier
//!
//! Assigns a [`FileKind`] and stacking information to a path. Pure function of
//! the path and the configured extension sets: no I/O, never fails.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::filename_parser::{self, Stacking};
use crate::config::EngineConfig;
use crate::media::{FileKind, MediaFile};

static TRAILER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[ _.\-])trailer(?:[ _.\-]?\d+)?$").expect("valid trailer regex")
});

static SAMPLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[ _.\-])sample$").expect("valid sample regex"));

static EXTRA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[ _.\-](extra|extras|behindthescenes|deleted|deletedscene|featurette|interview|scene|short)$",
    )
    .expect("valid extra regex")
});

const EXTRA_FOLDERS: &[&str] = &[
    "extras",
    "extra",
    "featurettes",
    "behind the scenes",
    "deleted scenes",
    "interviews",
    "scenes",
    "shorts",
    "other",
];

const TRAILER_FOLDERS: &[&str] = &["trailer", "trailers"];

const POSTER_NAMES: &[&str] = &["poster", "folder", "cover", "movie"];
const FANART_NAMES: &[&str] = &["fanart", "backdrop", "background"];
const BANNER_NAMES: &[&str] = &["banner"];
const THUMB_NAMES: &[&str] = &["thumb", "landscape"];

/// Result of classifying one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: FileKind,
    /// 0 when the file is not part of a stack
    pub stacking: u32,
    pub stacking_marker: String,
}

/// Classify a file path against the configured extension sets
pub fn classify(path: &Path, config: &EngineConfig) -> Classification {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let stem = filename_parser::strip_extension(&filename).to_string();

    let kind = if ext == "nfo" {
        FileKind::Nfo
    } else if config.is_video_extension(&ext) {
        classify_video(&stem, &parent)
    } else if config.is_subtitle_extension(&ext) {
        FileKind::Subtitle
    } else if config.is_image_extension(&ext) {
        classify_image(&stem, &parent)
    } else {
        FileKind::Unknown
    };

    let stacking = match kind {
        FileKind::Video | FileKind::Subtitle => filename_parser::detect_stacking(&stem)
            .or_else(|| filename_parser::stacking_folder(&parent)),
        _ => None,
    };

    match stacking {
        Some(Stacking { marker, index, .. }) => Classification {
            kind,
            stacking: index,
            stacking_marker: marker,
        },
        None => Classification {
            kind,
            stacking: 0,
            stacking_marker: String::new(),
        },
    }
}

/// Classify a path and build the corresponding [`MediaFile`]
pub fn to_media_file(path: &Path, size: u64, config: &EngineConfig) -> MediaFile {
    let c = classify(path, config);
    let mut mf = MediaFile::from_path(path, c.kind);
    mf.size = size;
    mf.stacking = c.stacking;
    mf.stacking_marker = c.stacking_marker;
    mf
}

fn classify_video(stem: &str, parent: &str) -> FileKind {
    if TRAILER_RE.is_match(stem) || TRAILER_FOLDERS.contains(&parent) {
        FileKind::Trailer
    } else if SAMPLE_RE.is_match(stem) || parent == "sample" {
        FileKind::Sample
    } else if EXTRA_RE.is_match(stem) || EXTRA_FOLDERS.contains(&parent) {
        FileKind::VideoExtra
    } else {
        FileKind::Video
    }
}

fn classify_image(stem: &str, parent: &str) -> FileKind {
    match parent {
        "extrafanart" => return FileKind::ExtraFanart,
        "extrathumbs" => return FileKind::Thumb,
        _ => {}
    }

    let lower = stem.to_lowercase();
    if matches_role(&lower, POSTER_NAMES) {
        FileKind::Poster
    } else if matches_role(&lower, FANART_NAMES) {
        FileKind::Fanart
    } else if matches_role(&lower, BANNER_NAMES) {
        FileKind::Banner
    } else if matches_role(&lower, THUMB_NAMES) {
        FileKind::Thumb
    } else {
        FileKind::Graphic
    }
}

/// Exact role name (`poster`) or a `<name>-poster` / `<name>.poster` / `<name>_poster` suffix
fn matches_role(stem: &str, roles: &[&str]) -> bool {
    roles.iter().any(|role| {
        stem == *role
            || stem.strip_suffix(role).is_some_and(|prefix| {
                prefix.len() > 1 && prefix.ends_with(['-', '.', '_'])
            })
    })
}

/// Item basename encoded in an artwork filename (`movie-poster` -> `movie`)
pub fn artwork_owner_basename(stem: &str) -> Option<&str> {
    let roles = POSTER_NAMES
        .iter()
        .chain(FANART_NAMES)
        .chain(BANNER_NAMES)
        .chain(THUMB_NAMES);
    for role in roles {
        if stem.len() <= role.len() + 1 {
            continue;
        }
        let split = stem.len() - role.len();
        let (Some(head), Some(tail)) = (stem.get(..split), stem.get(split..)) else {
            continue;
        };
        if tail.eq_ignore_ascii_case(role) {
            if let Some(owner) = head.strip_suffix(['-', '.', '_']) {
                return Some(owner);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(path: &str) -> FileKind {
        classify(Path::new(path), &EngineConfig::default()).kind
    }

    #[test]
    fn test_video_kinds() {
        assert_eq!(kind_of("/m/Alien/Alien.mkv"), FileKind::Video);
        assert_eq!(kind_of("/m/Alien/Alien-trailer.mkv"), FileKind::Trailer);
        assert_eq!(kind_of("/m/Alien/trailers/teaser.mp4"), FileKind::Trailer);
        assert_eq!(kind_of("/m/Alien/alien-sample.mkv"), FileKind::Sample);
        assert_eq!(kind_of("/m/Alien/Sample/alien.mkv"), FileKind::Sample);
        assert_eq!(kind_of("/m/Alien/extras/making of.mkv"), FileKind::VideoExtra);
        assert_eq!(kind_of("/m/Alien/alien-behindthescenes.mkv"), FileKind::VideoExtra);
    }

    #[test]
    fn test_other_kinds() {
        assert_eq!(kind_of("/m/Alien/Alien.srt"), FileKind::Subtitle);
        assert_eq!(kind_of("/m/Alien/movie.nfo"), FileKind::Nfo);
        assert_eq!(kind_of("/m/Alien/readme.txt"), FileKind::Unknown);
        assert_eq!(kind_of("/m/Alien/no_extension"), FileKind::Unknown);
    }

    #[test]
    fn test_image_kinds() {
        assert_eq!(kind_of("/m/Alien/poster.jpg"), FileKind::Poster);
        assert_eq!(kind_of("/m/Alien/folder.png"), FileKind::Poster);
        assert_eq!(kind_of("/m/Alien/Alien-poster.jpg"), FileKind::Poster);
        assert_eq!(kind_of("/m/Alien/Alien.fanart.jpg"), FileKind::Fanart);
        assert_eq!(kind_of("/m/Alien/fanart.jpg"), FileKind::Fanart);
        assert_eq!(kind_of("/m/Alien/banner.jpg"), FileKind::Banner);
        assert_eq!(kind_of("/m/Alien/Alien-thumb.jpg"), FileKind::Thumb);
        assert_eq!(kind_of("/m/Alien/extrafanart/fanart1.jpg"), FileKind::ExtraFanart);
        assert_eq!(kind_of("/m/Alien/Alien.jpg"), FileKind::Graphic);
        assert_eq!(kind_of("/m/Alien/Alienposter.jpg"), FileKind::Graphic);
    }

    #[test]
    fn test_stacking() {
        let config = EngineConfig::default();
        let c = classify(Path::new("/m/Alien/alien.cd2.avi"), &config);
        assert_eq!((c.kind, c.stacking, c.stacking_marker.as_str()), (FileKind::Video, 2, "cd2"));

        let c = classify(Path::new("/m/Alien/CD1/alien.avi"), &config);
        assert_eq!(c.stacking, 1);

        let c = classify(Path::new("/m/Alien/alien.avi"), &config);
        assert_eq!((c.stacking, c.stacking_marker.as_str()), (0, ""));
    }

    #[test]
    fn test_classify_is_total_and_deterministic() {
        let config = EngineConfig::default();
        for name in ["", ".", "..", "/", "a.", ".mkv", "weird.name.with.many.dots", "ünïcødé.MKV"] {
            let first = classify(Path::new(name), &config);
            let second = classify(Path::new(name), &config);
            assert_eq!(first, second, "input: {name:?}");
        }
    }

    #[test]
    fn test_artwork_owner_basename() {
        assert_eq!(artwork_owner_basename("Alien-poster"), Some("Alien"));
        assert_eq!(artwork_owner_basename("Alien (1979).fanart"), Some("Alien (1979)"));
        assert_eq!(artwork_owner_basename("poster"), None);
    }
}
