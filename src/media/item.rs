//! Tracked library items (movies, shows, games)

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media_file::{FileKind, MediaFile};

/// Item type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemKind {
    #[default]
    Movie,
    TvShow,
    Game,
}

/// A library item owning the set of files that belong to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    /// Datasource root the item was discovered under
    pub data_source: PathBuf,
    /// Directory of the item, a descendant of `data_source`
    pub path: PathBuf,
    pub title: String,
    pub original_title: Option<String>,
    pub sort_title: Option<String>,
    /// `None` or `Some(0)` both mean "unknown"
    pub year: Option<i32>,
    /// Provider -> external id (`imdb`, `tmdb`, ...)
    pub ids: BTreeMap<String, String>,
    /// Title of the collection/set the item belongs to
    pub collection: Option<String>,
    pub spoken_languages: Vec<String>,
    pub certification: Option<String>,
    pub genres: Vec<String>,
    pub media_source: Option<String>,
    /// Item shares its directory with other items
    pub multi_item_dir: bool,
    pub date_added: DateTime<Utc>,
    /// Set while the current reconciliation pass created this item
    #[serde(skip)]
    pub just_discovered: bool,
    media_files: Vec<MediaFile>,
}

impl Item {
    pub fn new(kind: ItemKind, data_source: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            data_source: data_source.into(),
            path: path.into(),
            title: String::new(),
            original_title: None,
            sort_title: None,
            year: None,
            ids: BTreeMap::new(),
            collection: None,
            spoken_languages: Vec::new(),
            certification: None,
            genres: Vec::new(),
            media_source: None,
            multi_item_dir: false,
            date_added: Utc::now(),
            just_discovered: false,
            media_files: Vec::new(),
        }
    }

    pub fn movie(data_source: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(ItemKind::Movie, data_source, path)
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Year if known (non-zero)
    pub fn known_year(&self) -> Option<i32> {
        self.year.filter(|y| *y != 0)
    }

    /// Preferred external id: imdb first, then tmdb, then any other
    pub fn external_id(&self) -> Option<&str> {
        self.ids
            .get("imdb")
            .or_else(|| self.ids.get("tmdb"))
            .or_else(|| self.ids.values().next())
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn media_files(&self) -> &[MediaFile] {
        &self.media_files
    }

    pub fn media_files_of(&self, kind: FileKind) -> impl Iterator<Item = &MediaFile> {
        self.media_files.iter().filter(move |mf| mf.kind == kind)
    }

    /// Attach a file; returns false when a file with the same identity is already present
    pub fn add_media_file(&mut self, file: MediaFile) -> bool {
        if self.media_files.contains(&file) {
            return false;
        }
        let pos = self
            .media_files
            .partition_point(|existing| sort_key(existing) <= sort_key(&file));
        self.media_files.insert(pos, file);
        true
    }

    pub fn remove_media_file(&mut self, file: &MediaFile) -> Option<MediaFile> {
        let idx = self.media_files.iter().position(|mf| mf == file)?;
        Some(self.media_files.remove(idx))
    }

    /// Replace a file in place (same identity), keeping order stable
    pub fn update_media_file(&mut self, file: MediaFile) -> bool {
        match self.media_files.iter_mut().find(|mf| **mf == file) {
            Some(slot) => {
                *slot = file;
                true
            }
            None => false,
        }
    }

    pub fn set_media_files(&mut self, files: Vec<MediaFile>) {
        self.media_files.clear();
        for file in files {
            self.add_media_file(file);
        }
    }

    /// The primary media file with the lowest stacking index
    pub fn main_file(&self) -> Option<&MediaFile> {
        self.media_files_of(FileKind::Video).next()
    }

    pub fn is_stacked(&self) -> bool {
        self.media_files_of(FileKind::Video).any(|mf| mf.stacking > 0)
    }
}

fn sort_key(mf: &MediaFile) -> (FileKind, u32, &str) {
    (mf.kind, mf.stacking, mf.filename.as_str())
}
