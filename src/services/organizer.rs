//! Item rename and relocation
//!
//! Computes where every file of an item belongs according to the naming
//! templates, then moves primary media, trailers and subtitles, copies NFO and
//! artwork to each naming variant, and deletes what is no longer referenced.
//!
//! Directory layout handled:
//! - single-item directory: the whole directory is moved, then files renamed
//! - multi-item directory: the new directory is created and only the item's
//!   own files are moved into it

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{EventSink, LibraryEvent};
use super::file_utils;
use super::filename_parser::remove_stacking;
use super::naming;
use super::providers::ItemStore;
use super::retry::{RetryConfig, retry_async};
use super::subtitles;
use crate::config::EngineConfig;
use crate::media::{FileKind, Item, ItemCollection, MediaFile};

/// Rename failures that abort one item
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("item {0} is not tracked")]
    UnknownItem(Uuid),

    #[error("file is locked or not writable: {0}")]
    FileLocked(PathBuf),

    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("refusing to delete protected path {0}")]
    UnsafeDelete(PathBuf),

    #[error("template for {0} expanded outside the datasource")]
    Template(String),

    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

/// What happens to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    /// Stays where the directory move puts it
    Keep,
    Move,
    /// Copied to a naming variant; the source is removed during cleanup
    /// unless it is itself a variant
    Copy,
}

/// One planned file operation
#[derive(Debug, Clone)]
pub struct PlannedFile {
    /// Location once the directory move is done
    pub source: PathBuf,
    pub dest: PathBuf,
    pub op: FileOp,
    /// The media file as it will be tracked afterwards
    pub file: MediaFile,
}

/// Dry-run result of a rename
#[derive(Debug, Clone)]
pub struct RenamePlan {
    pub item_id: Uuid,
    pub data_source: PathBuf,
    pub old_dir: PathBuf,
    pub new_dir: PathBuf,
    /// The whole directory is moved before files are renamed
    pub move_dir: bool,
    pub basename: String,
    pub files: Vec<PlannedFile>,
    /// Files referenced before the rename and not after it
    pub deletions: Vec<PathBuf>,
}

impl RenamePlan {
    /// Nothing to move, copy or delete
    pub fn is_noop(&self) -> bool {
        self.new_dir == self.old_dir
            && self.deletions.is_empty()
            && self.files.iter().all(|f| f.source == f.dest)
    }

    /// Whether deleting `path` would violate the protected-path rule
    pub fn is_protected(&self, path: &Path) -> bool {
        path == self.data_source
            || path == self.old_dir
            || path == self.new_dir
            || self.data_source.starts_with(path)
    }
}

/// Tells whether a file can be moved right now
#[async_trait]
pub trait WriteCheck: Send + Sync {
    async fn check(&self, path: &Path) -> io::Result<()>;
}

/// Renames the file onto itself, which fails while another process holds it
pub struct SelfRename;

#[async_trait]
impl WriteCheck for SelfRename {
    async fn check(&self, path: &Path) -> io::Result<()> {
        tokio::fs::rename(path, path).await
    }
}

/// Executes renames for tracked items
#[derive(Clone)]
pub struct Renamer {
    config: Arc<EngineConfig>,
    items: Arc<ItemCollection>,
    store: Arc<dyn ItemStore>,
    events: EventSink,
    write_check: Arc<dyn WriteCheck>,
    write_retry: RetryConfig,
}

impl Renamer {
    pub fn new(
        config: Arc<EngineConfig>,
        items: Arc<ItemCollection>,
        store: Arc<dyn ItemStore>,
        events: EventSink,
    ) -> Self {
        Self {
            config,
            items,
            store,
            events,
            write_check: Arc::new(SelfRename),
            write_retry: RetryConfig::file_write_check(),
        }
    }

    /// Replace the check run on primary media before anything is moved
    pub fn with_write_check(mut self, check: Arc<dyn WriteCheck>, retry: RetryConfig) -> Self {
        self.write_check = check;
        self.write_retry = retry;
        self
    }

    /// Compute the rename of an item without touching the disk
    pub fn plan(&self, item: &Item) -> Result<RenamePlan, OrganizeError> {
        let config = &self.config;
        let old_dir = item.path.clone();
        let new_dir = match naming::directory_name(item, config) {
            Some(rel) => {
                let dir = item.data_source.join(rel);
                if !dir.starts_with(&item.data_source) || dir == item.data_source {
                    return Err(OrganizeError::Template(item.title.clone()));
                }
                dir
            }
            None => old_dir.clone(),
        };

        // Moving a directory that holds other items would carry them along
        let holds_other_items = self
            .items
            .list_by_data_source(&item.data_source)
            .iter()
            .any(|other| other.id != item.id && other.path.starts_with(&old_dir));
        if holds_other_items {
            debug!(item_id = %item.id, dir = %old_dir.display(), "Directory holds other items, moving files only");
        }

        let move_dir = !item.multi_item_dir
            && !holds_other_items
            && new_dir != old_dir
            && !new_dir.starts_with(&old_dir)
            && !old_dir.starts_with(&new_dir);

        let basename = naming::file_basename(item, config);
        let main_basename = item
            .main_file()
            .map(|m| remove_stacking(m.basename()))
            .unwrap_or_default();

        // Where a file lives once the directory itself has been relocated
        let relocated = |mf: &MediaFile| -> PathBuf {
            match mf.path.strip_prefix(&old_dir) {
                Ok(rel) if move_dir => new_dir.join(rel),
                _ => mf.path.clone(),
            }
        };

        let mut files: Vec<PlannedFile> = Vec::new();
        let mut taken: HashSet<PathBuf> = HashSet::new();

        for mf in item.media_files() {
            let current_dir = relocated(mf);
            let source = current_dir.join(&mf.filename);

            match mf.kind {
                FileKind::Video | FileKind::Trailer | FileKind::Subtitle => {
                    let mut renamed = mf.clone();
                    if renamed.kind == FileKind::Subtitle {
                        subtitles::fill_from_filename(&mut renamed, &main_basename);
                    }
                    let filename = match mf.kind {
                        FileKind::Video => naming::video_filename(&basename, &renamed),
                        FileKind::Trailer => naming::trailer_filename(&basename, &renamed),
                        _ => naming::subtitle_filename(&basename, &renamed),
                    };
                    let mut dest = new_dir.join(&filename);
                    if taken.contains(&dest) {
                        // Two files would collide on the same name; keep the original one
                        dest = new_dir.join(&mf.filename);
                    }
                    renamed.path = new_dir.clone();
                    renamed.filename = dest
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or(filename);
                    taken.insert(dest.clone());
                    files.push(PlannedFile {
                        source,
                        dest,
                        op: FileOp::Move,
                        file: renamed,
                    });
                }
                FileKind::Nfo
                | FileKind::Poster
                | FileKind::Fanart
                | FileKind::Banner
                | FileKind::Thumb => {
                    let variants = naming::variant_filenames(
                        mf,
                        &basename,
                        &item.title,
                        config,
                        item.multi_item_dir,
                    );
                    if variants.is_empty() {
                        debug!(
                            path = %source.display(),
                            kind = %mf.kind,
                            "No naming variant for file, keeping it"
                        );
                        let kept = self.keep_or_carry(mf, &source, &old_dir, &new_dir, move_dir);
                        taken.insert(kept.dest.clone());
                        files.push(kept);
                        continue;
                    }
                    for name in variants {
                        let dest = new_dir.join(&name);
                        if !taken.insert(dest.clone()) {
                            continue;
                        }
                        let mut copy = mf.clone();
                        copy.path = new_dir.clone();
                        copy.filename = name;
                        files.push(PlannedFile {
                            source: source.clone(),
                            dest,
                            op: FileOp::Copy,
                            file: copy,
                        });
                    }
                }
                _ => {
                    let kept = self.keep_or_carry(mf, &source, &old_dir, &new_dir, move_dir);
                    taken.insert(kept.dest.clone());
                    files.push(kept);
                }
            }
        }

        let after: HashSet<&Path> = files.iter().map(|f| f.dest.as_path()).collect();
        let mut deletions: Vec<PathBuf> = Vec::new();
        for mf in item.media_files() {
            let before = relocated(mf).join(&mf.filename);
            if !after.contains(before.as_path()) && !deletions.contains(&before) {
                deletions.push(before);
            }
        }

        Ok(RenamePlan {
            item_id: item.id,
            data_source: item.data_source.clone(),
            old_dir,
            new_dir,
            move_dir,
            basename,
            files,
            deletions,
        })
    }

    /// Files without naming rules follow the directory; when the directory is
    /// not moved as a whole they are moved keeping their relative location
    fn keep_or_carry(
        &self,
        mf: &MediaFile,
        source: &Path,
        old_dir: &Path,
        new_dir: &Path,
        move_dir: bool,
    ) -> PlannedFile {
        let dest_dir = match mf.path.strip_prefix(old_dir) {
            Ok(rel) if !move_dir && new_dir != old_dir => new_dir.join(rel),
            _ => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let mut file = mf.clone();
        file.path = dest_dir.clone();
        let dest = dest_dir.join(&mf.filename);
        let op = if dest == source {
            FileOp::Keep
        } else {
            FileOp::Move
        };
        PlannedFile {
            source: source.to_path_buf(),
            dest,
            op,
            file,
        }
    }

    /// Rename one tracked item
    ///
    /// A primary media file that stays locked after the retries aborts the
    /// item before anything is moved.
    pub async fn rename(&self, item_id: Uuid) -> Result<RenamePlan, OrganizeError> {
        let item = self
            .items
            .get_by_id(item_id)
            .ok_or(OrganizeError::UnknownItem(item_id))?;
        let plan = self.plan(&item)?;

        if plan.is_noop() {
            debug!(item_id = %item_id, "Item already matches the naming templates");
            return Ok(plan);
        }

        info!(
            item_id = %item_id,
            from = %plan.old_dir.display(),
            to = %plan.new_dir.display(),
            "Renaming item"
        );

        // Every primary media file must be movable before anything is touched
        let mut vanished: HashSet<PathBuf> = HashSet::new();
        for video in item.media_files_of(FileKind::Video) {
            let path = video.full_path();
            if !self.ensure_writable(&path).await? {
                warn!(path = %path.display(), "File vanished before rename");
                vanished.insert(path);
            }
        }

        if plan.move_dir && path_exists(&plan.new_dir).await {
            return Err(OrganizeError::DestinationExists(plan.new_dir.clone()));
        }
        // Primary media never overwrites another file
        for planned in plan.files.iter().filter(|f| {
            f.file.kind == FileKind::Video && f.op == FileOp::Move && f.source != f.dest
        }) {
            let occupied = match planned.dest.strip_prefix(&plan.new_dir) {
                Ok(rel) if plan.move_dir => plan.old_dir.join(rel),
                _ => planned.dest.clone(),
            };
            if path_exists(&occupied).await {
                return Err(OrganizeError::DestinationExists(planned.dest.clone()));
            }
        }

        if plan.move_dir {
            file_utils::move_directory(&plan.old_dir, &plan.new_dir).await?;
        } else if plan.new_dir != plan.old_dir {
            tokio::fs::create_dir_all(&plan.new_dir)
                .await
                .map_err(|e| OrganizeError::Io(e.into()))?;
        }

        let mut final_files: Vec<MediaFile> = Vec::new();
        let mut kept_sources: HashSet<PathBuf> = HashSet::new();

        for planned in &plan.files {
            match planned.op {
                FileOp::Keep => final_files.push(planned.file.clone()),
                FileOp::Move => match self.move_one(planned).await {
                    Ok(true) => final_files.push(planned.file.clone()),
                    Ok(false) => {}
                    Err(e) => {
                        self.events.error(format!(
                            "Failed to move {}: {}",
                            planned.source.display(),
                            e
                        ));
                        kept_sources.insert(planned.source.clone());
                        final_files.push(file_at(&planned.file, &planned.source));
                    }
                },
                FileOp::Copy => {
                    match file_utils::copy_if_absent(&planned.source, &planned.dest).await {
                        Ok(_) => final_files.push(planned.file.clone()),
                        Err(e) => {
                            self.events.warning(format!(
                                "Failed to copy {}: {:#}",
                                planned.source.display(),
                                e
                            ));
                            if path_exists(&planned.source).await
                                && !kept_sources.contains(&planned.source)
                            {
                                kept_sources.insert(planned.source.clone());
                                final_files.push(file_at(&planned.file, &planned.source));
                            }
                        }
                    }
                }
            }
        }

        self.cleanup(&plan, &kept_sources).await;

        let new_dir = plan.new_dir.clone();
        let updated = self.items.update(item_id, |i| {
            i.path = new_dir;
            i.set_media_files(final_files);
        });
        if let Some(updated) = updated {
            self.store.save(&updated).await?;
            self.events.emit(LibraryEvent::ItemUpdated { item_id });
        }

        if !vanished.is_empty() {
            self.events.warning(format!(
                "{} file(s) of {} vanished during rename",
                vanished.len(),
                item.title
            ));
        }
        Ok(plan)
    }

    /// Retries the write check; `Ok(false)` when the file vanished
    async fn ensure_writable(&self, path: &Path) -> Result<bool, OrganizeError> {
        let check = self.write_check.as_ref();
        let result = retry_async(
            || async move {
                match check.check(path).await {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(e),
                }
            },
            &self.write_retry,
            "writability check",
        )
        .await;

        result.map_err(|e| {
            debug!(path = %path.display(), error = %e, "File stayed locked");
            OrganizeError::FileLocked(path.to_path_buf())
        })
    }

    /// Returns `Ok(false)` when the source is gone
    async fn move_one(&self, planned: &PlannedFile) -> Result<bool, OrganizeError> {
        if planned.source == planned.dest {
            return Ok(true);
        }
        if !path_exists(&planned.source).await {
            warn!(path = %planned.source.display(), "Source vanished, nothing to move");
            return Ok(false);
        }
        if path_exists(&planned.dest).await {
            return Err(OrganizeError::DestinationExists(planned.dest.clone()));
        }
        file_utils::move_file(&planned.source, &planned.dest).await?;
        debug!(from = %planned.source.display(), to = %planned.dest.display(), "Moved file");
        Ok(true)
    }

    /// Delete files no longer referenced and prune emptied directories
    async fn cleanup(&self, plan: &RenamePlan, kept_sources: &HashSet<PathBuf>) {
        let mut parents: Vec<PathBuf> = Vec::new();

        for path in &plan.deletions {
            if kept_sources.contains(path) {
                continue;
            }
            if plan.is_protected(path) {
                let e = OrganizeError::UnsafeDelete(path.clone());
                error!(path = %path.display(), "{}", e);
                self.events.error(e.to_string());
                continue;
            }
            match tokio::fs::symlink_metadata(path).await {
                Ok(meta) if meta.is_dir() => {
                    let e = OrganizeError::UnsafeDelete(path.clone());
                    error!(path = %path.display(), "{}", e);
                    self.events.error(e.to_string());
                    continue;
                }
                Ok(_) => {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        self.events
                            .warning(format!("Failed to delete {}: {}", path.display(), e));
                        continue;
                    }
                    debug!(path = %path.display(), "Deleted unreferenced file");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    self.events
                        .warning(format!("Failed to inspect {}: {}", path.display(), e));
                    continue;
                }
            }
            if let Some(parent) = path.parent() {
                parents.push(parent.to_path_buf());
            }
        }

        for planned in plan.files.iter().filter(|f| f.op == FileOp::Move) {
            if let Some(parent) = planned.source.parent() {
                parents.push(parent.to_path_buf());
            }
        }

        parents.sort();
        parents.dedup();
        // Deepest first so nested empty folders go before their parents
        parents.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

        for dir in parents {
            if plan.is_protected(&dir) || !dir.starts_with(&plan.data_source) {
                continue;
            }
            let stop_at = if dir.starts_with(&plan.new_dir) {
                plan.new_dir.as_path()
            } else if dir.starts_with(&plan.old_dir) {
                plan.old_dir.as_path()
            } else {
                plan.data_source.as_path()
            };
            file_utils::remove_empty_parents(&dir, stop_at).await;
        }
    }
}

fn file_at(file: &MediaFile, full: &Path) -> MediaFile {
    let mut file = file.clone();
    if let Some(parent) = full.parent() {
        file.path = parent.to_path_buf();
    }
    if let Some(name) = full.file_name() {
        file.filename = name.to_string_lossy().into_owned();
    }
    file
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier;
    use crate::services::providers::MemoryItemStore;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        ds: PathBuf,
        items: Arc<ItemCollection>,
        renamer: Renamer,
    }

    fn fixture(config: EngineConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ds = dir.path().join("movies");
        fs::create_dir_all(&ds).unwrap();
        let items = Arc::new(ItemCollection::new());
        let renamer = Renamer::new(
            Arc::new(config),
            items.clone(),
            Arc::new(MemoryItemStore::new()),
            EventSink::default(),
        );
        Fixture {
            _dir: dir,
            ds,
            items,
            renamer,
        }
    }

    fn add_item(f: &Fixture, dir: &str, files: &[&str], title: &str, year: i32) -> Uuid {
        let config = EngineConfig::default();
        let item_dir = if dir.is_empty() { f.ds.clone() } else { f.ds.join(dir) };
        let mut item = Item::movie(&f.ds, &item_dir).with_title(title).with_year(year);
        for rel in files {
            let full = item_dir.join(rel);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, rel.as_bytes()).unwrap();
            item.add_media_file(classifier::to_media_file(&full, 1, &config));
        }
        let id = item.id;
        f.items.upsert(item);
        id
    }

    fn tree(root: &Path) -> Vec<String> {
        let mut out: Vec<String> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        out.sort();
        out
    }

    #[tokio::test]
    async fn test_single_item_rename() {
        let f = fixture(EngineConfig::default());
        let id = add_item(
            &f,
            "alien.1979.dvdrip",
            &[
                "alien.1979.dvdrip.avi",
                "alien.1979.dvdrip.en.srt",
                "movie.nfo",
                "folder.jpg",
                "extrafanart/fanart1.jpg",
            ],
            "Alien",
            1979,
        );

        f.renamer.rename(id).await.unwrap();

        assert_eq!(
            tree(&f.ds),
            vec![
                "Alien (1979)/Alien (1979).avi",
                "Alien (1979)/Alien (1979).en.srt",
                "Alien (1979)/Alien (1979).nfo",
                "Alien (1979)/extrafanart/fanart1.jpg",
                "Alien (1979)/poster.jpg",
            ]
        );

        let item = f.items.get_by_id(id).unwrap();
        assert_eq!(item.path, f.ds.join("Alien (1979)"));
        for mf in item.media_files() {
            assert!(mf.full_path().exists(), "missing {}", mf.full_path().display());
        }
        let sub = item.media_files_of(FileKind::Subtitle).next().unwrap();
        assert_eq!(sub.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_rename_is_idempotent() {
        let f = fixture(EngineConfig::default());
        let id = add_item(&f, "x", &["x.mkv", "poster.jpg"], "Heat", 1995);

        f.renamer.rename(id).await.unwrap();
        let first = tree(&f.ds);
        let plan = f.renamer.rename(id).await.unwrap();
        assert!(plan.is_noop());
        assert_eq!(tree(&f.ds), first);
    }

    #[tokio::test]
    async fn test_stacked_files_keep_their_markers() {
        let f = fixture(EngineConfig::default());
        let id = add_item(&f, "heat", &["heat.cd1.avi", "heat.cd2.avi"], "Heat", 1995);

        f.renamer.rename(id).await.unwrap();
        assert_eq!(
            tree(&f.ds),
            vec!["Heat (1995)/Heat (1995).cd1.avi", "Heat (1995)/Heat (1995).cd2.avi"]
        );
    }

    #[tokio::test]
    async fn test_multi_item_rename_moves_only_own_files() {
        let f = fixture(EngineConfig::default());
        let alien = add_item(&f, "", &["Alien.mkv", "Alien-poster.jpg"], "Alien", 1979);
        add_item(&f, "", &["Heat.mkv", "Heat-poster.jpg"], "Heat", 1995);
        f.items.update(alien, |i| i.multi_item_dir = true);

        f.renamer.rename(alien).await.unwrap();

        assert_eq!(
            tree(&f.ds),
            vec![
                "Alien (1979)/Alien (1979)-poster.jpg",
                "Alien (1979)/Alien (1979).mkv",
                "Heat-poster.jpg",
                "Heat.mkv",
            ]
        );
        assert!(f.ds.exists());
    }

    #[tokio::test]
    async fn test_empty_templates_never_touch_protected_paths() {
        let config = EngineConfig {
            dir_template: "{$I}".into(),
            file_template: "{$C}".into(),
            ..EngineConfig::default()
        };
        let f = fixture(config);
        let id = add_item(&f, "Alien", &["Alien.mkv", "poster.jpg"], "", 0);

        let plan = f.renamer.rename(id).await.unwrap();
        assert_eq!(plan.new_dir, f.ds.join("Alien"));
        assert!(f.ds.join("Alien").is_dir());
        assert_eq!(tree(&f.ds), vec!["Alien/Alien.mkv", "Alien/poster.jpg"]);
    }

    #[tokio::test]
    async fn test_plan_never_deletes_roots() {
        let f = fixture(EngineConfig::default());
        let id = add_item(&f, "old", &["old.mkv", "fanart.jpg"], "New", 2000);
        let item = f.items.get_by_id(id).unwrap();

        let plan = f.renamer.plan(&item).unwrap();
        assert!(plan.move_dir);
        for path in &plan.deletions {
            assert!(!plan.is_protected(path), "{}", path.display());
        }
        assert!(plan.is_protected(&f.ds));
        assert!(plan.is_protected(&f.ds.join("old")));
        assert!(plan.is_protected(f.ds.parent().unwrap()));
    }

    #[tokio::test]
    async fn test_existing_destination_aborts_item() {
        let f = fixture(EngineConfig::default());
        let id = add_item(&f, "old", &["old.mkv"], "Brazil", 1985);
        fs::create_dir_all(f.ds.join("Brazil (1985)")).unwrap();

        let err = f.renamer.rename(id).await.unwrap_err();
        assert_matches!(err, OrganizeError::DestinationExists(_));
        assert!(f.ds.join("old/old.mkv").exists());
        assert_eq!(f.items.get_by_id(id).unwrap().path, f.ds.join("old"));
    }

    #[tokio::test]
    async fn test_untracked_file_at_video_destination_aborts_item() {
        let f = fixture(EngineConfig::default());
        let id = add_item(&f, "old", &["old.mkv", "old.srt"], "Brazil", 1985);
        fs::write(f.ds.join("old/Brazil (1985).mkv"), b"other").unwrap();

        let err = f.renamer.rename(id).await.unwrap_err();
        assert_matches!(err, OrganizeError::DestinationExists(_));
        assert_eq!(
            tree(&f.ds),
            vec!["old/Brazil (1985).mkv", "old/old.mkv", "old/old.srt"]
        );
    }

    #[tokio::test]
    async fn test_artwork_variant_with_other_extension_is_skipped() {
        let config = EngineConfig {
            poster_names: vec!["poster.png".into()],
            ..EngineConfig::default()
        };
        let f = fixture(config);
        let id = add_item(&f, "old", &["old.mkv", "poster.jpg"], "Brazil", 1985);

        f.renamer.rename(id).await.unwrap();
        // No matching variant: the poster travels with the directory unchanged
        assert_eq!(
            tree(&f.ds),
            vec!["Brazil (1985)/Brazil (1985).mkv", "Brazil (1985)/poster.jpg"]
        );
    }

    #[tokio::test]
    async fn test_vanished_primary_file_is_not_an_error() {
        let f = fixture(EngineConfig::default());
        let id = add_item(&f, "old", &["old.mkv", "old.srt"], "Brazil", 1985);
        fs::remove_file(f.ds.join("old/old.mkv")).unwrap();

        f.renamer.rename(id).await.unwrap();
        let item = f.items.get_by_id(id).unwrap();
        assert_eq!(item.media_files_of(FileKind::Video).count(), 0);
        assert_eq!(tree(&f.ds), vec!["Brazil (1985)/Brazil (1985).srt"]);
    }

    #[tokio::test]
    async fn test_directory_holding_other_items_is_not_moved() {
        let f = fixture(EngineConfig::default());
        let heat = add_item(&f, "Collection", &["Heat.1995.mkv"], "Heat", 1995);
        let brazil = add_item(&f, "Collection/Brazil", &["Brazil.1985.mkv"], "Brazil", 1985);

        let plan = f.renamer.rename(heat).await.unwrap();

        assert!(!plan.move_dir);
        assert_eq!(
            tree(&f.ds),
            vec!["Collection/Brazil/Brazil.1985.mkv", "Heat (1995)/Heat (1995).mkv"]
        );
        assert_eq!(f.items.get_by_id(heat).unwrap().path, f.ds.join("Heat (1995)"));
        for mf in f.items.get_by_id(brazil).unwrap().media_files() {
            assert!(mf.full_path().exists(), "missing {}", mf.full_path().display());
        }
    }

    struct AlwaysLocked(std::sync::atomic::AtomicU32);

    #[async_trait]
    impl WriteCheck for AlwaysLocked {
        async fn check(&self, _path: &Path) -> io::Result<()> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "in use"))
        }
    }

    #[tokio::test]
    async fn test_locked_primary_file_aborts_item_after_retries() {
        let f = fixture(EngineConfig::default());
        let id = add_item(&f, "old", &["old.mkv", "old.srt"], "Brazil", 1985);
        let check = Arc::new(AlwaysLocked(Default::default()));
        let retry = RetryConfig {
            max_attempts: 3,
            initial_interval: std::time::Duration::from_millis(1),
            max_interval: std::time::Duration::from_millis(2),
            multiplier: 2.0,
        };
        let renamer = f.renamer.clone().with_write_check(check.clone(), retry);

        let err = renamer.rename(id).await.unwrap_err();

        assert_matches!(err, OrganizeError::FileLocked(path) if path == f.ds.join("old/old.mkv"));
        assert_eq!(check.0.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(tree(&f.ds), vec!["old/old.mkv", "old/old.srt"]);
        assert_eq!(f.items.get_by_id(id).unwrap().path, f.ds.join("old"));
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let f = fixture(EngineConfig::default());
        assert_matches!(
            f.renamer.rename(Uuid::new_v4()).await,
            Err(OrganizeError::UnknownItem(_))
        );
    }
}
