//! Item reconciler
//!
//! Turns scanned directories into tracked items: finds or creates the owning
//! item, attaches newly observed files, and after a full datasource pass
//! removes items and files that disappeared from disk.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::classifier;
use super::events::{EventSink, LibraryEvent};
use super::filename_parser;
use super::providers::{ItemStore, NfoParser};
use super::scanner::ScannedDirectory;
use super::text_utils;
use crate::media::{FileKind, Item, ItemCollection, ItemKind, MediaFile};

/// Minimum clean-name similarity for reusing an item in a multi-item directory
const SIMILARITY_THRESHOLD: f64 = 0.9;

/// State shared by every unit of one datasource pass
#[derive(Debug, Default)]
pub struct ScanPass {
    observed: Mutex<HashSet<PathBuf>>,
    touched: Mutex<HashSet<PathBuf>>,
    probe_queue: Mutex<Vec<(Uuid, MediaFile)>>,
}

impl ScanPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, file: PathBuf) {
        self.observed.lock().insert(file);
    }

    pub fn touch(&self, dir: PathBuf) {
        self.touched.lock().insert(dir);
    }

    pub fn was_observed(&self, file: &Path) -> bool {
        self.observed.lock().contains(file)
    }

    pub fn was_touched(&self, dir: &Path) -> bool {
        self.touched.lock().contains(dir)
    }

    fn queue_probe(&self, item_id: Uuid, file: MediaFile) {
        self.probe_queue.lock().push((item_id, file));
    }

    /// Newly discovered files awaiting technical probing
    pub fn take_probe_queue(&self) -> Vec<(Uuid, MediaFile)> {
        std::mem::take(&mut *self.probe_queue.lock())
    }
}

/// Counters reported after orphan cleanup
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub items_removed: usize,
    pub files_removed: usize,
    pub inconsistent: usize,
}

#[derive(Clone)]
pub struct Reconciler {
    items: Arc<ItemCollection>,
    store: Arc<dyn ItemStore>,
    nfo_parser: Arc<dyn NfoParser>,
    events: EventSink,
}

impl Reconciler {
    pub fn new(
        items: Arc<ItemCollection>,
        store: Arc<dyn ItemStore>,
        nfo_parser: Arc<dyn NfoParser>,
        events: EventSink,
    ) -> Self {
        Self {
            items,
            store,
            nfo_parser,
            events,
        }
    }

    /// Reconcile one scanned candidate directory
    pub async fn reconcile(&self, pass: &ScanPass, dir: ScannedDirectory) -> Result<()> {
        pass.touch(dir.path.clone());
        for file in &dir.files {
            pass.observe(file.full_path());
        }

        if dir.multi_item {
            self.reconcile_multi(pass, &dir).await
        } else {
            self.reconcile_single(pass, &dir).await
        }
    }

    async fn reconcile_single(&self, pass: &ScanPass, dir: &ScannedDirectory) -> Result<()> {
        let existing = self.items.get_by_path(&dir.path).or_else(|| {
            // A former multi-item directory keeps the item owning the surviving file
            let adopted = lowest_stacked(dir.videos()).and_then(|main| {
                let clean = filename_parser::clean_name(&main.filename);
                self.find_in_multi_dir(&dir.path, &clean, &HashSet::new())
            });
            adopted.or_else(|| {
                let mut in_dir = self.items.list_in_dir(&dir.path);
                (in_dir.len() == 1).then(|| in_dir.remove(0))
            })
        });

        let mut item = match existing {
            Some(item) => item,
            None => {
                let nfos: Vec<&MediaFile> =
                    dir.files.iter().filter(|f| f.kind == FileKind::Nfo).collect();
                let mut item = match self.seed_from_nfo(dir, &nfos).await {
                    Some(item) => item,
                    None => Item::new(ItemKind::Movie, &dir.data_source, &dir.path),
                };
                let main = lowest_stacked(dir.videos());
                fill_title(&mut item, main, Some(dir.path.as_path()));
                item.just_discovered = true;
                item
            }
        };
        let regime_changed = std::mem::replace(&mut item.multi_item_dir, false);

        let main_stem = lowest_stacked(dir.videos())
            .map(|v| filename_parser::remove_stacking(v.basename()).to_lowercase());

        let mut changed = item.just_discovered || regime_changed;
        for file in &dir.files {
            let file = match file.kind {
                FileKind::Graphic => match &main_stem {
                    Some(stem) if file.basename().to_lowercase() == *stem => {
                        let mut poster = file.clone();
                        poster.kind = FileKind::Poster;
                        poster
                    }
                    _ => {
                        debug!(path = %file.full_path().display(), "Discarding unrecognized graphic");
                        continue;
                    }
                },
                _ => file.clone(),
            };
            changed |= self.attach(pass, &mut item, file);
        }

        self.commit(item, changed).await
    }

    async fn reconcile_multi(&self, pass: &ScanPass, dir: &ScannedDirectory) -> Result<()> {
        // Group primary media by clean name; stacked parts share one group
        let mut groups: BTreeMap<String, Vec<&MediaFile>> = BTreeMap::new();
        for video in dir.videos() {
            groups
                .entry(filename_parser::clean_name(&video.filename))
                .or_default()
                .push(video);
        }

        let mut claimed: HashSet<Uuid> = HashSet::new();
        for (clean, videos) in groups {
            let main = lowest_stacked(videos.iter().copied());
            let Some(main) = main else { continue };
            let base = filename_parser::remove_stacking(main.basename());

            let mut item = match self.find_in_multi_dir(&dir.path, &clean, &claimed) {
                Some(item) => item,
                None => {
                    let nfos: Vec<&MediaFile> = dir
                        .files
                        .iter()
                        .filter(|f| f.kind == FileKind::Nfo && belongs_to(f.basename(), &base))
                        .collect();
                    let mut item = match self.seed_from_nfo(dir, &nfos).await {
                        Some(item) => item,
                        None => Item::new(ItemKind::Movie, &dir.data_source, &dir.path),
                    };
                    fill_title(&mut item, Some(main), None);
                    item.just_discovered = true;
                    item
                }
            };
            claimed.insert(item.id);
            let regime_changed = !std::mem::replace(&mut item.multi_item_dir, true);

            let mut changed = item.just_discovered || regime_changed;
            for video in &videos {
                changed |= self.attach(pass, &mut item, (*video).clone());
            }
            for file in dir.files.iter().filter(|f| f.kind != FileKind::Video) {
                if let Some(file) = multi_item_file(file, &base) {
                    changed |= self.attach(pass, &mut item, file);
                }
            }

            self.commit(item, changed).await?;
        }
        Ok(())
    }

    /// Existing item in a multi-item directory whose main file has the same
    /// clean name, or a near-identical one
    fn find_in_multi_dir(&self, dir: &Path, clean: &str, claimed: &HashSet<Uuid>) -> Option<Item> {
        let candidates: Vec<(Item, String)> = self
            .items
            .list_in_dir(dir)
            .into_iter()
            .filter(|i| !claimed.contains(&i.id))
            .filter_map(|i| {
                let name = filename_parser::clean_name(&i.main_file()?.filename);
                Some((i, name))
            })
            .collect();

        if let Some(idx) = candidates.iter().position(|(_, name)| name == clean) {
            return candidates.into_iter().nth(idx).map(|(item, _)| item);
        }

        candidates
            .into_iter()
            .map(|(item, name)| (text_utils::title_similarity(&name, clean), item))
            .filter(|(score, _)| *score >= SIMILARITY_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(score, item)| {
                debug!(item_id = %item.id, score, clean, "Matched item by similarity");
                item
            })
    }

    async fn seed_from_nfo(&self, dir: &ScannedDirectory, nfos: &[&MediaFile]) -> Option<Item> {
        for nfo in nfos {
            let path = nfo.full_path();
            match self.nfo_parser.parse(&path, ItemKind::Movie).await {
                Ok(Some(mut item)) => {
                    info!(path = %path.display(), title = %item.title, "Seeded item from NFO");
                    item.data_source = dir.data_source.clone();
                    item.path = dir.path.clone();
                    return Some(item);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse NFO");
                }
            }
        }
        None
    }

    /// Attach a file to an item, refreshing the size of a known file
    fn attach(&self, pass: &ScanPass, item: &mut Item, file: MediaFile) -> bool {
        if let Some(known) = item.media_files().iter().find(|mf| **mf == file) {
            if known.size == file.size {
                return false;
            }
            let mut refreshed = known.clone();
            refreshed.size = file.size;
            return item.update_media_file(refreshed);
        }

        if file.kind.is_probeable() {
            pass.queue_probe(item.id, file.clone());
        }
        debug!(item_id = %item.id, path = %file.full_path().display(), kind = %file.kind, "Attaching file");
        item.add_media_file(file)
    }

    async fn commit(&self, item: Item, changed: bool) -> Result<()> {
        if !changed {
            return Ok(());
        }
        let id = item.id;
        let path = item.path.clone();
        let is_new = self.items.upsert(item.clone());
        self.store.save(&item).await?;

        if is_new {
            info!(item_id = %id, path = %path.display(), title = %item.title, "Item added");
            self.events.emit(LibraryEvent::ItemAdded { item_id: id, path });
        } else {
            self.events.emit(LibraryEvent::ItemUpdated { item_id: id });
        }
        Ok(())
    }

    /// Remove items and files of one datasource that vanished from disk
    ///
    /// Must run after every directory of the datasource was reconciled.
    pub async fn cleanup_orphans(&self, pass: &ScanPass, data_source: &Path) -> CleanupStats {
        let mut stats = CleanupStats::default();

        for item in self.items.list_by_data_source(data_source) {
            if item.just_discovered {
                continue;
            }

            if !pass.was_touched(&item.path) && !path_exists(&item.path).await {
                self.remove_item(&item).await;
                stats.items_removed += 1;
                continue;
            }

            let mut missing = Vec::new();
            for mf in item.media_files() {
                let full = mf.full_path();
                if pass.was_observed(&full) {
                    continue;
                }
                if path_exists(&full).await {
                    stats.inconsistent += 1;
                    self.events.warning(format!(
                        "File {} is tracked but was not seen during the scan",
                        full.display()
                    ));
                } else {
                    missing.push(mf.clone());
                }
            }

            if missing.is_empty() {
                continue;
            }
            stats.files_removed += missing.len();

            // In a shared directory an item is its primary media; without it
            // the remaining files belong to whichever item owns the directory now
            let videos_gone = item
                .media_files_of(FileKind::Video)
                .all(|v| missing.contains(v));
            if item.multi_item_dir && item.main_file().is_some() && videos_gone {
                self.remove_item(&item).await;
                stats.items_removed += 1;
                continue;
            }

            let updated = self.items.update(item.id, |i| {
                for mf in &missing {
                    i.remove_media_file(mf);
                }
            });
            if let Some(updated) = updated {
                debug!(item_id = %updated.id, removed = missing.len(), "Removed vanished files");
                if let Err(e) = self.store.save(&updated).await {
                    self.events
                        .error(format!("Failed to save {}: {:#}", updated.path.display(), e));
                }
                self.events.emit(LibraryEvent::ItemUpdated { item_id: updated.id });
            }
        }

        info!(
            data_source = %data_source.display(),
            items_removed = stats.items_removed,
            files_removed = stats.files_removed,
            inconsistent = stats.inconsistent,
            "Orphan cleanup finished"
        );
        stats
    }

    async fn remove_item(&self, item: &Item) {
        self.items.delete(item.id);
        if let Err(e) = self.store.remove(item).await {
            self.events
                .error(format!("Failed to remove {}: {:#}", item.path.display(), e));
        }
        info!(item_id = %item.id, path = %item.path.display(), "Removed orphaned item");
        self.events.emit(LibraryEvent::ItemRemoved {
            item_id: item.id,
            path: item.path.clone(),
        });
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn lowest_stacked<'a>(files: impl Iterator<Item = &'a MediaFile>) -> Option<&'a MediaFile> {
    files.min_by(|a, b| {
        a.stacking
            .cmp(&b.stacking)
            .then_with(|| a.filename.cmp(&b.filename))
    })
}

/// Fill an empty title (and unknown year) from the main file, then the directory
fn fill_title(item: &mut Item, main: Option<&MediaFile>, dir: Option<&Path>) {
    if item.title.is_empty() || item.known_year().is_none() {
        if let Some(main) = main {
            let (title, year) = filename_parser::parse_title_year(&main.filename);
            if item.title.is_empty() {
                item.title = title;
            }
            if item.known_year().is_none() {
                item.year = year;
            }
        }
    }
    if let Some(name) = dir.and_then(|d| d.file_name()).and_then(|n| n.to_str()) {
        if item.title.is_empty() || item.known_year().is_none() {
            let (title, year) = filename_parser::parse_folder_title_year(name);
            if item.title.is_empty() {
                item.title = title;
            }
            if item.known_year().is_none() {
                item.year = year;
            }
        }
    }
}

/// `stem` names the item with basename `base` (`Alien.en`, `Alien-trailer`)
fn belongs_to(stem: &str, base: &str) -> bool {
    let (stem, base) = (stem.to_lowercase(), base.to_lowercase());
    match stem.strip_prefix(&base) {
        Some("") => true,
        Some(rest) => rest.starts_with(['.', '-', '_', ' ']),
        None => false,
    }
}

/// The file of a multi-item directory that belongs to the item named `base`
fn multi_item_file(file: &MediaFile, base: &str) -> Option<MediaFile> {
    let stem = file.basename();
    match file.kind {
        FileKind::Poster | FileKind::Fanart | FileKind::Banner | FileKind::Thumb => {
            let owner = classifier::artwork_owner_basename(stem)?;
            owner.eq_ignore_ascii_case(base).then(|| file.clone())
        }
        FileKind::Graphic => stem.eq_ignore_ascii_case(base).then(|| {
            let mut poster = file.clone();
            poster.kind = FileKind::Poster;
            poster
        }),
        FileKind::Nfo | FileKind::Subtitle | FileKind::Trailer | FileKind::Sample
        | FileKind::VideoExtra => belongs_to(stem, base).then(|| file.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::services::providers::{KodiNfoParser, MemoryItemStore, NoNfoParser};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"data").unwrap();
        path
    }

    fn scanned(ds: &Path, dir: &str, files: &[&str], multi_item: bool) -> ScannedDirectory {
        let config = EngineConfig::default();
        let path = ds.join(dir);
        let files = files
            .iter()
            .map(|f| {
                let full = touch(ds, &format!("{dir}/{f}"));
                classifier::to_media_file(&full, 4, &config)
            })
            .collect();
        ScannedDirectory {
            path,
            data_source: ds.to_path_buf(),
            files,
            multi_item,
        }
    }

    fn reconciler(nfo_parser: Arc<dyn NfoParser>) -> (Reconciler, Arc<ItemCollection>) {
        let items = Arc::new(ItemCollection::new());
        let r = Reconciler::new(
            items.clone(),
            Arc::new(MemoryItemStore::new()),
            nfo_parser,
            EventSink::default(),
        );
        (r, items)
    }

    fn filenames(item: &Item) -> Vec<(String, FileKind)> {
        item.media_files()
            .iter()
            .map(|f| (f.filename.clone(), f.kind))
            .collect()
    }

    #[tokio::test]
    async fn test_single_item_is_synthesized_from_filename() {
        let dir = tempfile::tempdir().unwrap();
        let (r, items) = reconciler(Arc::new(NoNfoParser));
        let pass = ScanPass::new();

        let scan = scanned(dir.path(), "Alien", &["Alien.1979.1080p.mkv", "Alien.1979.1080p.jpg", "random.png"], false);
        r.reconcile(&pass, scan).await.unwrap();

        let item = items.get_by_path(&dir.path().join("Alien")).unwrap();
        assert_eq!(item.title, "Alien");
        assert_eq!(item.year, Some(1979));
        assert!(item.just_discovered);
        assert_eq!(
            filenames(&item),
            vec![
                ("Alien.1979.1080p.mkv".to_string(), FileKind::Video),
                ("Alien.1979.1080p.jpg".to_string(), FileKind::Poster),
            ]
        );
        assert_eq!(pass.take_probe_queue().len(), 1);
    }

    #[tokio::test]
    async fn test_single_item_takes_year_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (r, items) = reconciler(Arc::new(NoNfoParser));
        let pass = ScanPass::new();

        let scan = scanned(dir.path(), "Heat (1995)", &["heat.cd1.avi", "heat.cd2.avi"], false);
        r.reconcile(&pass, scan).await.unwrap();

        let item = items.get_by_path(&dir.path().join("Heat (1995)")).unwrap();
        assert_eq!((item.title.as_str(), item.year), ("heat", Some(1995)));
        let stacks: Vec<u32> = item.media_files_of(FileKind::Video).map(|f| f.stacking).collect();
        assert_eq!(stacks, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_single_item_is_seeded_from_nfo() {
        let dir = tempfile::tempdir().unwrap();
        let (r, items) = reconciler(Arc::new(KodiNfoParser));
        let pass = ScanPass::new();

        let scan = scanned(dir.path(), "x", &["x.mkv", "movie.nfo"], false);
        fs::write(
            dir.path().join("x/movie.nfo"),
            "<movie><title>Brazil</title><year>1985</year></movie>",
        )
        .unwrap();
        r.reconcile(&pass, scan).await.unwrap();

        let item = items.get_by_path(&dir.path().join("x")).unwrap();
        assert_eq!((item.title.as_str(), item.year), ("Brazil", Some(1985)));
        assert_eq!(item.media_files().len(), 2);
    }

    #[tokio::test]
    async fn test_rescan_keeps_existing_item() {
        let dir = tempfile::tempdir().unwrap();
        let (r, items) = reconciler(Arc::new(NoNfoParser));

        let scan = scanned(dir.path(), "Alien", &["Alien.mkv"], false);
        r.reconcile(&ScanPass::new(), scan).await.unwrap();
        let first = items.get_by_path(&dir.path().join("Alien")).unwrap();
        items.clear_just_discovered();

        let scan = scanned(dir.path(), "Alien", &["Alien.mkv", "Alien.srt"], false);
        r.reconcile(&ScanPass::new(), scan).await.unwrap();

        assert_eq!(items.len(), 1);
        let second = items.get_by_id(first.id).unwrap();
        assert_eq!(second.media_files().len(), 2);
        assert!(!second.just_discovered);
    }

    #[tokio::test]
    async fn test_multi_item_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (r, items) = reconciler(Arc::new(NoNfoParser));
        let pass = ScanPass::new();

        let scan = scanned(
            dir.path(),
            "Shelf",
            &[
                "Alien (1979).mkv",
                "Alien (1979)-poster.jpg",
                "Alien (1979).en.srt",
                "Heat.cd1.avi",
                "Heat.cd2.avi",
                "Heat-fanart.jpg",
                "poster.jpg",
            ],
            true,
        );
        r.reconcile(&pass, scan).await.unwrap();

        let shelf = items.list_in_dir(&dir.path().join("Shelf"));
        assert_eq!(shelf.len(), 2);
        let alien = shelf.iter().find(|i| i.title == "Alien").unwrap();
        assert!(alien.multi_item_dir);
        assert_eq!(
            filenames(alien),
            vec![
                ("Alien (1979).mkv".to_string(), FileKind::Video),
                ("Alien (1979).en.srt".to_string(), FileKind::Subtitle),
                ("Alien (1979)-poster.jpg".to_string(), FileKind::Poster),
            ]
        );
        let heat = shelf.iter().find(|i| i.title == "Heat").unwrap();
        assert_eq!(heat.media_files_of(FileKind::Video).count(), 2);
        assert_eq!(heat.media_files_of(FileKind::Fanart).count(), 1);

        // Rescanning matches the same items by clean name
        items.clear_just_discovered();
        let scan = scanned(dir.path(), "Shelf", &["Alien (1979).mkv", "Heat.cd1.avi", "Heat.cd2.avi"], true);
        r.reconcile(&ScanPass::new(), scan).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_orphan_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dir.path();
        let (r, items) = reconciler(Arc::new(NoNfoParser));

        let pass = ScanPass::new();
        r.reconcile(&pass, scanned(ds, "Alien", &["Alien.mkv", "Alien.srt"], false)).await.unwrap();
        r.reconcile(&pass, scanned(ds, "Heat", &["Heat.mkv"], false)).await.unwrap();
        r.reconcile(&pass, scanned(ds, "Brazil", &["Brazil.mkv", "Brazil.nfo"], false)).await.unwrap();
        items.clear_just_discovered();

        let mut unrelated = Item::movie("/elsewhere", "/elsewhere/Gone");
        unrelated.title = "Gone".into();
        items.upsert(unrelated);

        fs::remove_dir_all(ds.join("Heat")).unwrap();
        fs::remove_file(ds.join("Alien/Alien.srt")).unwrap();

        // Second pass: Alien rescanned, Brazil's nfo hidden from the scan but still on disk
        let pass = ScanPass::new();
        r.reconcile(&pass, scanned(ds, "Alien", &["Alien.mkv"], false)).await.unwrap();
        let brazil = ScannedDirectory {
            path: ds.join("Brazil"),
            data_source: ds.to_path_buf(),
            files: vec![classifier::to_media_file(&ds.join("Brazil/Brazil.mkv"), 4, &EngineConfig::default())],
            multi_item: false,
        };
        r.reconcile(&pass, brazil).await.unwrap();

        let stats = r.cleanup_orphans(&pass, ds).await;
        assert_eq!(
            stats,
            CleanupStats {
                items_removed: 1,
                files_removed: 1,
                inconsistent: 1
            }
        );
        assert!(items.get_by_path(&ds.join("Heat")).is_none());
        assert_eq!(items.get_by_path(&ds.join("Alien")).unwrap().media_files().len(), 1);
        assert_eq!(items.get_by_path(&ds.join("Brazil")).unwrap().media_files().len(), 2);
        assert!(items.get_by_path(Path::new("/elsewhere/Gone")).is_some());
    }

    #[tokio::test]
    async fn test_just_discovered_items_are_exempt_from_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dir.path();
        let (r, items) = reconciler(Arc::new(NoNfoParser));

        let pass = ScanPass::new();
        r.reconcile(&pass, scanned(ds, "Alien", &["Alien.mkv"], false)).await.unwrap();
        fs::remove_dir_all(ds.join("Alien")).unwrap();

        let stats = r.cleanup_orphans(&ScanPass::new(), ds).await;
        assert_eq!(stats.items_removed, 0);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_multi_item_directory_shrinking_to_one_item() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dir.path();
        let (r, items) = reconciler(Arc::new(NoNfoParser));

        r.reconcile(&ScanPass::new(), scanned(ds, "Shelf", &["Alien.mkv", "Heat.mkv"], true))
            .await
            .unwrap();
        items.clear_just_discovered();
        let alien = items
            .list_in_dir(&ds.join("Shelf"))
            .into_iter()
            .find(|i| i.title == "Alien")
            .unwrap();

        fs::remove_file(ds.join("Shelf/Heat.mkv")).unwrap();
        let pass = ScanPass::new();
        r.reconcile(&pass, scanned(ds, "Shelf", &["Alien.mkv"], false)).await.unwrap();
        let stats = r.cleanup_orphans(&pass, ds).await;

        assert_eq!(stats.items_removed, 1);
        assert_eq!(items.len(), 1);
        let kept = items.get_by_path(&ds.join("Shelf")).unwrap();
        assert_eq!(kept.id, alien.id);
        assert!(!kept.multi_item_dir);
        assert_eq!(filenames(&kept), vec![("Alien.mkv".to_string(), FileKind::Video)]);
    }

    #[tokio::test]
    async fn test_multi_item_directory_reuses_similar_item() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dir.path();
        let (r, items) = reconciler(Arc::new(NoNfoParser));

        let files = ["Terminator.2.Judgment.Day.1991.mkv", "Heat.1995.mkv"];
        r.reconcile(&ScanPass::new(), scanned(ds, "Shelf", &files, true)).await.unwrap();
        items.clear_just_discovered();
        let terminator = items
            .list_in_dir(&ds.join("Shelf"))
            .into_iter()
            .find(|i| i.title.starts_with("Terminator"))
            .unwrap();

        // One letter apart: still the same item
        let files = ["Terminator.2.Judgement.Day.1991.mkv", "Heat.1995.mkv"];
        r.reconcile(&ScanPass::new(), scanned(ds, "Shelf", &files, true)).await.unwrap();

        assert_eq!(items.len(), 2);
        let reused = items.get_by_id(terminator.id).unwrap();
        assert!(
            reused
                .media_files()
                .iter()
                .any(|f| f.filename == "Terminator.2.Judgement.Day.1991.mkv")
        );
        assert!(!reused.just_discovered);
    }

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to("Alien", "alien"));
        assert!(belongs_to("Alien.en.forced", "Alien"));
        assert!(belongs_to("Alien-trailer", "Alien"));
        assert!(!belongs_to("Aliens", "Alien"));
    }
}
