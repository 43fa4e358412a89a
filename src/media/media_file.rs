//! Observed media files and their semantic kinds

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Semantic role of a file inside an item
///
/// The declaration order is the display/sort order of an item's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Primary media (the movie itself, possibly one part of a stack)
    Video,
    Trailer,
    Sample,
    VideoExtra,
    Subtitle,
    Nfo,
    Poster,
    Fanart,
    Banner,
    Thumb,
    ExtraFanart,
    /// Image whose role could not be determined from its name
    Graphic,
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Trailer => "trailer",
            Self::Sample => "sample",
            Self::VideoExtra => "video_extra",
            Self::Subtitle => "subtitle",
            Self::Nfo => "nfo",
            Self::Poster => "poster",
            Self::Fanart => "fanart",
            Self::Banner => "banner",
            Self::Thumb => "thumb",
            Self::ExtraFanart => "extra_fanart",
            Self::Graphic => "graphic",
            Self::Unknown => "unknown",
        }
    }

    /// Kinds that carry a video stream worth probing
    pub fn is_probeable(&self) -> bool {
        matches!(self, Self::Video | Self::Trailer)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file observed on disk and attached to an item
///
/// Identity is `(path, filename)`; the remaining fields are attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    /// Directory containing the file
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub kind: FileKind,
    /// 0 when the file is not part of a multi-part set
    pub stacking: u32,
    /// Normalized marker such as `cd1`, empty when not stacked
    pub stacking_marker: String,

    // Filled by the probing collaborator
    pub container: Option<String>,
    pub video_codec: Option<String>,
    pub video_format: Option<String>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub video_3d: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<u32>,

    // Subtitle metadata
    pub language: Option<String>,
    pub forced: bool,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, filename: impl Into<String>, kind: FileKind) -> Self {
        let filename = filename.into();
        let container = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        Self {
            path: path.into(),
            filename,
            size: 0,
            kind,
            stacking: 0,
            stacking_marker: String::new(),
            container,
            video_codec: None,
            video_format: None,
            video_width: None,
            video_height: None,
            video_3d: None,
            audio_codec: None,
            audio_channels: None,
            language: None,
            forced: false,
        }
    }

    /// Build a media file from a full file path
    pub fn from_path(file: &Path, kind: FileKind) -> Self {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(dir, name, kind)
    }

    pub fn full_path(&self) -> PathBuf {
        self.path.join(&self.filename)
    }

    /// Filename without its final extension
    pub fn basename(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) if idx > 0 => &self.filename[..idx],
            _ => &self.filename,
        }
    }

    /// Lowercase extension without the dot, empty when absent
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default()
    }

    /// Resolution label derived from the probed frame size (`1080p`, `2160p`, ...)
    pub fn video_resolution(&self) -> Option<String> {
        let (width, height) = (self.video_width?, self.video_height?);
        if width == 0 || height == 0 {
            return None;
        }
        let label = match (width, height) {
            (w, h) if w >= 3200 || h >= 2000 => "2160p",
            (w, h) if w >= 1800 || h >= 1000 => "1080p",
            (w, h) if w >= 1200 || h >= 700 => "720p",
            (w, h) if w >= 1000 || h >= 560 => "576p",
            (_, h) if h >= 400 => "480p",
            _ => "SD",
        };
        Some(label.to_string())
    }

    /// Audio codec with channel count, e.g. `AC3 6ch`
    pub fn audio_label(&self) -> Option<String> {
        let codec = self.audio_codec.as_deref().filter(|c| !c.is_empty())?;
        Some(match self.audio_channels {
            Some(ch) if ch > 0 => format!("{} {}ch", codec.to_uppercase(), ch),
            _ => codec.to_uppercase(),
        })
    }

    /// Video codec with format, e.g. `h264 1080p`
    pub fn video_label(&self) -> Option<String> {
        let codec = self.video_codec.as_deref().filter(|c| !c.is_empty())?;
        Some(match self.video_format.as_deref().filter(|f| !f.is_empty()) {
            Some(format) => format!("{} {}", codec, format),
            None => codec.to_string(),
        })
    }
}

impl PartialEq for MediaFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.filename == other.filename
    }
}

impl Eq for MediaFile {}

impl Hash for MediaFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.filename.hash(state);
    }
}
