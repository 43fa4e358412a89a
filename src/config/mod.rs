//! Engine configuration
//!
//! The engine only consumes a resolved configuration. It can be built in code
//! (tests, embedding) or loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Resolved configuration consumed by the scanner, reconciler and renamer
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Datasource roots scanned by the binary
    pub data_sources: Vec<PathBuf>,

    /// Video extensions, lowercase without dot
    pub video_extensions: Vec<String>,

    /// Subtitle extensions, lowercase without dot
    pub subtitle_extensions: Vec<String>,

    /// Image extensions, lowercase without dot
    pub image_extensions: Vec<String>,

    /// Extra folder names skipped during scanning (case-insensitive)
    pub skip_folders: Vec<String>,

    /// A directory containing one of these files is skipped with its subtree
    pub ignore_marker_files: Vec<String>,

    /// Template for the item directory, relative to the datasource
    pub dir_template: String,

    /// Template for the primary media filename (without extension)
    pub file_template: String,

    /// NFO naming variants (`<basename>.nfo`, `movie.nfo`)
    pub nfo_names: Vec<String>,

    /// Poster naming variants (`poster.ext`, `folder.ext`, `<basename>-poster.ext`)
    pub poster_names: Vec<String>,

    /// Fanart naming variants (`fanart.ext`, `<basename>-fanart.ext`)
    pub fanart_names: Vec<String>,

    /// Replace spaces in generated names
    pub space_substitution: bool,

    /// Replacement used when `space_substitution` is on
    pub space_replacement: String,

    /// Fold generated names to ASCII
    pub ascii_replacement: bool,

    /// Detect directories holding several items
    pub detect_multi_item_dirs: bool,

    /// Treat a media file lying directly in the datasource root as part of a multi-item directory
    pub datasource_root_is_multi_item: bool,

    /// Worker count for the directory-mutating scan phase
    pub scan_workers: usize,

    /// Worker count for the read-only probe phase
    pub probe_workers: usize,

    /// Worker count for the rename phase
    pub rename_workers: usize,

    /// Binary only: rename every item after the scan
    pub rename_after_scan: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_sources: Vec::new(),
            video_extensions: strings(&[
                "mkv", "mp4", "avi", "m4v", "mov", "wmv", "flv", "webm", "mpeg", "mpg", "ts",
                "m2ts", "vob", "iso", "divx",
            ]),
            subtitle_extensions: strings(&["srt", "sub", "idx", "ssa", "ass", "smi", "vtt", "sup"]),
            image_extensions: strings(&["jpg", "jpeg", "png", "tbn", "gif", "bmp", "webp"]),
            skip_folders: Vec::new(),
            ignore_marker_files: strings(&[".mkignore", ".nomedia"]),
            dir_template: "$T {($Y)}".to_string(),
            file_template: "$T {($Y)}".to_string(),
            nfo_names: strings(&["<basename>.nfo"]),
            poster_names: strings(&["poster.ext"]),
            fanart_names: strings(&["fanart.ext"]),
            space_substitution: false,
            space_replacement: "_".to_string(),
            ascii_replacement: false,
            detect_multi_item_dirs: true,
            datasource_root_is_multi_item: true,
            scan_workers: 1,
            probe_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            rename_workers: 1,
            rename_after_scan: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            data_sources: env::var("MK_DATASOURCES")
                .map(|v| {
                    v.split(';')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_default(),

            video_extensions: list_var("MK_VIDEO_EXTENSIONS").unwrap_or(defaults.video_extensions),

            subtitle_extensions: list_var("MK_SUBTITLE_EXTENSIONS")
                .unwrap_or(defaults.subtitle_extensions),

            image_extensions: list_var("MK_IMAGE_EXTENSIONS").unwrap_or(defaults.image_extensions),

            skip_folders: list_var("MK_SKIP_FOLDERS").unwrap_or(defaults.skip_folders),

            ignore_marker_files: list_var("MK_IGNORE_MARKERS")
                .unwrap_or(defaults.ignore_marker_files),

            dir_template: env::var("MK_DIR_TEMPLATE").unwrap_or(defaults.dir_template),

            file_template: env::var("MK_FILE_TEMPLATE").unwrap_or(defaults.file_template),

            nfo_names: list_var("MK_NFO_NAMES").unwrap_or(defaults.nfo_names),

            poster_names: list_var("MK_POSTER_NAMES").unwrap_or(defaults.poster_names),

            fanart_names: list_var("MK_FANART_NAMES").unwrap_or(defaults.fanart_names),

            space_substitution: bool_var("MK_SPACE_SUBSTITUTION", defaults.space_substitution),

            space_replacement: env::var("MK_SPACE_REPLACEMENT")
                .unwrap_or(defaults.space_replacement),

            ascii_replacement: bool_var("MK_ASCII_REPLACEMENT", defaults.ascii_replacement),

            detect_multi_item_dirs: bool_var(
                "MK_DETECT_MULTI_ITEM_DIRS",
                defaults.detect_multi_item_dirs,
            ),

            datasource_root_is_multi_item: bool_var(
                "MK_DATASOURCE_ROOT_IS_MULTI_ITEM",
                defaults.datasource_root_is_multi_item,
            ),

            scan_workers: usize_var("MK_SCAN_WORKERS", defaults.scan_workers)?,

            probe_workers: usize_var("MK_PROBE_WORKERS", defaults.probe_workers)?,

            rename_workers: usize_var("MK_RENAME_WORKERS", defaults.rename_workers)?,

            rename_after_scan: bool_var("MK_RENAME_AFTER_SCAN", defaults.rename_after_scan),
        })
    }

    pub fn is_video_extension(&self, ext: &str) -> bool {
        contains_ignore_case(&self.video_extensions, ext)
    }

    pub fn is_subtitle_extension(&self, ext: &str) -> bool {
        contains_ignore_case(&self.subtitle_extensions, ext)
    }

    pub fn is_image_extension(&self, ext: &str) -> bool {
        contains_ignore_case(&self.image_extensions, ext)
    }
}

fn contains_ignore_case(list: &[String], ext: &str) -> bool {
    let ext = ext.trim_start_matches('.');
    list.iter().any(|e| e.eq_ignore_ascii_case(ext))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn list_var(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().trim_start_matches('.').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn bool_var(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

fn usize_var(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<usize>()
            .map(|n| n.max(1))
            .with_context(|| format!("Invalid {}", key)),
        Err(_) => Ok(default),
    }
}
