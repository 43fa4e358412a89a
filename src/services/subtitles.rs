//! Subtitle language and forced-flag detection from filenames

use tracing::debug;

use crate::media::{FileKind, MediaFile};

/// ISO 639-1 code, ISO 639-2 codes, English names
const LANGUAGES: &[(&str, &[&str], &[&str])] = &[
    ("en", &["eng"], &["english"]),
    ("de", &["ger", "deu"], &["german", "deutsch"]),
    ("fr", &["fre", "fra"], &["french", "francais"]),
    ("es", &["spa"], &["spanish", "espanol"]),
    ("it", &["ita"], &["italian", "italiano"]),
    ("pt", &["por"], &["portuguese"]),
    ("nl", &["dut", "nld"], &["dutch"]),
    ("sv", &["swe"], &["swedish"]),
    ("da", &["dan"], &["danish"]),
    ("no", &["nor"], &["norwegian"]),
    ("fi", &["fin"], &["finnish"]),
    ("pl", &["pol"], &["polish"]),
    ("cs", &["cze", "ces"], &["czech"]),
    ("hu", &["hun"], &["hungarian"]),
    ("ru", &["rus"], &["russian"]),
    ("uk", &["ukr"], &["ukrainian"]),
    ("el", &["gre", "ell"], &["greek"]),
    ("tr", &["tur"], &["turkish"]),
    ("he", &["heb"], &["hebrew"]),
    ("ar", &["ara"], &["arabic"]),
    ("hi", &["hin"], &["hindi"]),
    ("ja", &["jpn"], &["japanese"]),
    ("ko", &["kor"], &["korean"]),
    ("zh", &["chi", "zho"], &["chinese"]),
    ("th", &["tha"], &["thai"]),
    ("ro", &["rum", "ron"], &["romanian"]),
    ("hr", &["hrv"], &["croatian"]),
    ("sr", &["srp"], &["serbian"]),
];

/// Language and forced flag parsed from a subtitle filename
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleInfo {
    pub language: Option<String>,
    pub forced: bool,
}

/// Map a language token to its ISO 639-1 code
pub fn normalize_language(token: &str) -> Option<&'static str> {
    let token = token.to_lowercase();
    LANGUAGES
        .iter()
        .find(|(iso1, iso2, names)| {
            *iso1 == token || iso2.contains(&token.as_str()) || names.contains(&token.as_str())
        })
        .map(|(iso1, _, _)| *iso1)
}

/// Detect language and forced flag from a subtitle filename
///
/// The basename of the primary media file is removed first so that a title
/// word never passes as a language code.
pub fn detect(filename: &str, video_basename: &str) -> SubtitleInfo {
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };
    let rest = if !video_basename.is_empty()
        && stem.len() >= video_basename.len()
        && stem
            .get(..video_basename.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(video_basename))
    {
        &stem[video_basename.len()..]
    } else {
        stem
    };

    let mut info = SubtitleInfo::default();
    for token in rest.split(['.', '_', '-', ' ', '[', ']', '(', ')']) {
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case("forced") {
            info.forced = true;
        } else if info.language.is_none() {
            info.language = normalize_language(token).map(str::to_string);
        }
    }
    debug!(filename, language = ?info.language, forced = info.forced, "Detected subtitle info");
    info
}

/// Fill language/forced on a subtitle that carries no structured metadata
pub fn fill_from_filename(subtitle: &mut MediaFile, video_basename: &str) {
    if subtitle.kind != FileKind::Subtitle || subtitle.language.is_some() {
        return;
    }
    let info = detect(&subtitle.filename, video_basename);
    subtitle.language = info.language;
    subtitle.forced |= info.forced;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(
            detect("Alien.en.srt", "Alien"),
            SubtitleInfo {
                language: Some("en".into()),
                forced: false
            }
        );
        assert_eq!(detect("Alien.German.forced.srt", "Alien").language.as_deref(), Some("de"));
        assert!(detect("Alien.German.forced.srt", "Alien").forced);
        assert_eq!(detect("Alien-spa.ass", "alien").language.as_deref(), Some("es"));
    }

    #[test]
    fn test_title_words_are_not_languages() {
        // "It" is both a title and the Italian code
        assert_eq!(detect("It.srt", "It").language, None);
        assert_eq!(detect("It.fre.srt", "It").language.as_deref(), Some("fr"));
    }

    #[test]
    fn test_structured_metadata_wins() {
        let mut sub = MediaFile::new("/m/Alien", "Alien.en.srt", FileKind::Subtitle);
        sub.language = Some("de".into());
        fill_from_filename(&mut sub, "Alien");
        assert_eq!(sub.language.as_deref(), Some("de"));

        let mut sub = MediaFile::new("/m/Alien", "Alien.en.forced.srt", FileKind::Subtitle);
        fill_from_filename(&mut sub, "Alien");
        assert_eq!(sub.language.as_deref(), Some("en"));
        assert!(sub.forced);
    }
}
