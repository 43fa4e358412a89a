//! Directory scanner
//!
//! Walks a datasource to find candidate item directories, then gathers and
//! classifies the files belonging to each candidate. Filesystem walking is
//! blocking (`walkdir`) and runs on the blocking thread pool.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use super::classifier;
use super::events::EventSink;
use super::filename_parser;
use crate::config::EngineConfig;
use crate::media::{FileKind, MediaFile};

/// Disc, backup and playlist structure folders never descended into
const SKIP_DIRS: &[&str] = &[
    "CERTIFICATE",
    "BACKUP",
    "PLAYLIST",
    "CLPINF",
    "SSIF",
    "AUXDATA",
    "AUDIO_TS",
    "JAR",
    "$RECYCLE.BIN",
    "RECYCLER",
    "SYSTEM VOLUME INFORMATION",
    "@EADIR",
    "LOST+FOUND",
];

/// Files of one candidate item directory
#[derive(Debug, Clone)]
pub struct ScannedDirectory {
    pub path: PathBuf,
    pub data_source: PathBuf,
    pub files: Vec<MediaFile>,
    /// Several items share this directory
    pub multi_item: bool,
}

impl ScannedDirectory {
    /// Primary media files, in path order
    pub fn videos(&self) -> impl Iterator<Item = &MediaFile> {
        self.files.iter().filter(|f| f.kind == FileKind::Video)
    }
}

#[derive(Debug, Default)]
struct DirSummary {
    depth: usize,
    has_subdirs: bool,
    has_video: bool,
}

/// Scanner bound to one engine configuration
#[derive(Clone)]
pub struct DirectoryScanner {
    config: Arc<EngineConfig>,
    events: EventSink,
}

impl DirectoryScanner {
    pub fn new(config: Arc<EngineConfig>, events: EventSink) -> Self {
        Self { config, events }
    }

    /// Find every candidate item directory below a datasource
    pub async fn discover(&self, data_source: &Path) -> Result<BTreeSet<PathBuf>> {
        let config = self.config.clone();
        let events = self.events.clone();
        let root = data_source.to_path_buf();
        tokio::task::spawn_blocking(move || find_candidate_roots(&root, &config, &events))
            .await
            .context("Directory discovery task failed")?
    }

    /// Gather and classify the files of one candidate directory
    pub async fn gather(
        &self,
        data_source: &Path,
        root: &Path,
        candidates: Arc<BTreeSet<PathBuf>>,
    ) -> Result<ScannedDirectory> {
        let config = self.config.clone();
        let events = self.events.clone();
        let data_source = data_source.to_path_buf();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            gather_directory(&data_source, &root, &candidates, &config, &events)
        })
        .await
        .context("Directory gather task failed")?
    }
}

/// Whether a directory name is excluded from scanning
pub fn is_skipped_dir_name(name: &str, config: &EngineConfig) -> bool {
    name.starts_with('.')
        || SKIP_DIRS.iter().any(|s| s.eq_ignore_ascii_case(name))
        || config
            .skip_folders
            .iter()
            .any(|s| s.eq_ignore_ascii_case(name))
}

fn has_ignore_marker(dir: &Path, config: &EngineConfig) -> bool {
    config
        .ignore_marker_files
        .iter()
        .any(|marker| dir.join(marker).exists())
}

fn is_skipped(entry: &DirEntry, config: &EngineConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if is_skipped_dir_name(&name, config) {
        debug!(path = %entry.path().display(), "Skipping excluded directory");
        return true;
    }
    if has_ignore_marker(entry.path(), config) {
        debug!(path = %entry.path().display(), "Skipping directory with ignore marker");
        return true;
    }
    false
}

/// Walk a datasource and collect the candidate item roots
///
/// A directory holding primary media is a candidate. A stacking folder
/// (`CD1`, `Disc 2`) without subdirectories below the first level hands the
/// candidacy to its parent. Unreadable directories are reported and skipped.
pub fn find_candidate_roots(
    data_source: &Path,
    config: &EngineConfig,
    events: &EventSink,
) -> Result<BTreeSet<PathBuf>> {
    if !data_source.is_dir() {
        anyhow::bail!("Datasource {} is not a directory", data_source.display());
    }
    if has_ignore_marker(data_source, config) {
        info!(path = %data_source.display(), "Datasource carries an ignore marker");
        return Ok(BTreeSet::new());
    }

    let mut dirs: BTreeMap<PathBuf, DirSummary> = BTreeMap::new();
    let walker = WalkDir::new(data_source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e, config));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(data_source).display().to_string();
                events.warning(format!("Skipping unreadable directory {}: {}", path, e));
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            dirs.entry(entry.path().to_path_buf()).or_default().depth = entry.depth();
            if entry.depth() > 0 {
                if let Some(parent) = entry.path().parent() {
                    dirs.entry(parent.to_path_buf()).or_default().has_subdirs = true;
                }
            }
        } else if file_type.is_file()
            && classifier::classify(entry.path(), config).kind == FileKind::Video
        {
            if let Some(parent) = entry.path().parent() {
                dirs.entry(parent.to_path_buf()).or_default().has_video = true;
            }
        }
    }

    let mut candidates = BTreeSet::new();
    for (dir, summary) in dirs.into_iter().filter(|(_, s)| s.has_video) {
        let is_stacking_folder = dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(filename_parser::stacking_folder)
            .is_some();

        let root = match dir.parent() {
            Some(parent) if !summary.has_subdirs && summary.depth > 1 && is_stacking_folder => {
                parent.to_path_buf()
            }
            _ => dir,
        };
        candidates.insert(root);
    }

    info!(
        data_source = %data_source.display(),
        candidates = candidates.len(),
        "Directory discovery finished"
    );
    Ok(candidates)
}

/// Collect the files of a candidate root, descending into its subfolders but
/// not into nested candidate roots
pub fn gather_directory(
    data_source: &Path,
    root: &Path,
    candidates: &BTreeSet<PathBuf>,
    config: &EngineConfig,
    events: &EventSink,
) -> Result<ScannedDirectory> {
    if !root.is_dir() {
        anyhow::bail!("Directory {} vanished during scan", root.display());
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(e.file_type().is_dir()
                    && (is_skipped(e, config) || candidates.contains(e.path())))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).display().to_string();
                events.warning(format!("Skipping unreadable path {}: {}", path, e));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let mf = classifier::to_media_file(entry.path(), size, config);
        if mf.kind == FileKind::Unknown {
            continue;
        }
        files.push(mf);
    }

    let clean_names: BTreeSet<String> = files
        .iter()
        .filter(|f| f.kind == FileKind::Video)
        .map(|f| filename_parser::clean_name(&f.filename))
        .collect();

    let multi_item = (config.detect_multi_item_dirs && clean_names.len() > 1)
        || (config.datasource_root_is_multi_item && root == data_source);

    debug!(
        path = %root.display(),
        files = files.len(),
        items = clean_names.len(),
        multi_item,
        "Gathered directory"
    );

    Ok(ScannedDirectory {
        path: root.to_path_buf(),
        data_source: data_source.to_path_buf(),
        files,
        multi_item,
    })
}
