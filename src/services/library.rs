//! Library orchestrator
//!
//! Owns the item collection and every engine component, and runs whole
//! datasource scans and batch renames on bounded task pools. Partial failures
//! never surface as errors here; they are published as messages and the
//! operation ends with a `Done` event.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::events::{EventSink, LibraryEvent};
use super::job_queue::{PoolOutcome, TaskPool};
use super::organizer::Renamer;
use super::providers::{ItemStore, MediaProber, NfoParser};
use super::reconciler::{CleanupStats, Reconciler, ScanPass};
use super::scanner::DirectoryScanner;
use crate::config::EngineConfig;
use crate::media::ItemCollection;

/// Result of one datasource scan
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub data_source: PathBuf,
    pub directories: usize,
    pub scan: PoolOutcome,
    pub cleanup: CleanupStats,
    pub probed: usize,
    /// Items first seen during this scan
    pub discovered: Vec<Uuid>,
    pub cancelled: bool,
}

/// The engine context: configuration, items and collaborators
pub struct MediaLibrary {
    config: Arc<EngineConfig>,
    items: Arc<ItemCollection>,
    store: Arc<dyn ItemStore>,
    prober: Arc<dyn MediaProber>,
    scanner: DirectoryScanner,
    reconciler: Reconciler,
    renamer: Renamer,
    events: EventSink,
    cancel: Mutex<CancellationToken>,
}

impl MediaLibrary {
    pub fn new(
        config: EngineConfig,
        items: Arc<ItemCollection>,
        store: Arc<dyn ItemStore>,
        nfo_parser: Arc<dyn NfoParser>,
        prober: Arc<dyn MediaProber>,
    ) -> Self {
        let config = Arc::new(config);
        let events = EventSink::default();
        Self {
            scanner: DirectoryScanner::new(config.clone(), events.clone()),
            reconciler: Reconciler::new(
                items.clone(),
                store.clone(),
                nfo_parser,
                events.clone(),
            ),
            renamer: Renamer::new(config.clone(), items.clone(), store.clone(), events.clone()),
            config,
            items,
            store,
            prober,
            events,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn items(&self) -> &Arc<ItemCollection> {
        &self.items
    }

    pub fn renamer(&self) -> &Renamer {
        &self.renamer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Request cancellation of the running scan or rename
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancel.lock().cancel();
    }

    /// Every operation gets a fresh token so an earlier cancel does not leak
    /// into the next run
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        token
    }

    /// Scan every configured datasource in turn
    pub async fn scan_all(&self) -> Vec<ScanSummary> {
        let mut summaries = Vec::new();
        for data_source in self.config.data_sources.clone() {
            match self.scan_datasource(&data_source).await {
                Ok(summary) => {
                    let cancelled = summary.cancelled;
                    summaries.push(summary);
                    if cancelled {
                        break;
                    }
                }
                Err(e) => {
                    self.events.error(format!(
                        "Scan of {} failed: {:#}",
                        data_source.display(),
                        e
                    ));
                }
            }
        }
        summaries
    }

    /// Scan one datasource: discover candidate directories, reconcile each
    /// one, remove orphans, then probe newly found media files
    ///
    /// Only an unreadable datasource root is returned as an error.
    pub async fn scan_datasource(&self, data_source: &Path) -> Result<ScanSummary> {
        let cancel = self.begin();
        info!(data_source = %data_source.display(), "Starting datasource scan");

        let candidates = match self.scanner.discover(data_source).await {
            Ok(candidates) => Arc::new(candidates),
            Err(e) => {
                self.events.emit(LibraryEvent::Done {
                    task: "scan".into(),
                    cancelled: false,
                });
                return Err(e);
            }
        };
        info!(
            data_source = %data_source.display(),
            directories = candidates.len(),
            "Candidate directories found"
        );

        let pass = Arc::new(ScanPass::new());
        let mut pool = TaskPool::new(
            "scan",
            self.config.scan_workers,
            cancel.clone(),
            self.events.clone(),
        );
        for root in candidates.iter() {
            let scanner = self.scanner.clone();
            let reconciler = self.reconciler.clone();
            let pass = pass.clone();
            let candidates = candidates.clone();
            let data_source = data_source.to_path_buf();
            let root = root.clone();
            let message = format!("Scanning {}", root.display());
            pool.submit(message, async move {
                let dir = scanner.gather(&data_source, &root, candidates).await?;
                reconciler.reconcile(&pass, dir).await
            });
        }
        let scan = pool.await_completion_or_cancel().await;

        let mut summary = ScanSummary {
            data_source: data_source.to_path_buf(),
            directories: candidates.len(),
            scan,
            cleanup: CleanupStats::default(),
            probed: 0,
            discovered: Vec::new(),
            cancelled: scan.cancelled,
        };

        // A partial pass must not be taken as evidence that files are gone
        if summary.cancelled {
            warn!(data_source = %data_source.display(), "Scan cancelled, skipping cleanup");
            self.finish("scan", true);
            return Ok(summary);
        }

        summary.cleanup = self.reconciler.cleanup_orphans(&pass, data_source).await;

        let probe = self.probe(&pass, cancel).await;
        summary.probed = probe.completed - probe.failed;
        summary.cancelled = probe.cancelled;

        summary.discovered = self
            .items
            .list_by_data_source(data_source)
            .into_iter()
            .filter(|i| i.just_discovered)
            .map(|i| i.id)
            .collect();
        self.items.clear_just_discovered();

        info!(
            data_source = %data_source.display(),
            directories = summary.directories,
            discovered = summary.discovered.len(),
            items_removed = summary.cleanup.items_removed,
            files_removed = summary.cleanup.files_removed,
            "Datasource scan finished"
        );
        self.finish("scan", summary.cancelled);
        Ok(summary)
    }

    async fn probe(&self, pass: &ScanPass, cancel: CancellationToken) -> PoolOutcome {
        let mut pool = TaskPool::new(
            "probe",
            self.config.probe_workers,
            cancel,
            self.events.clone(),
        );
        for (item_id, file) in pass.take_probe_queue() {
            let prober = self.prober.clone();
            let items = self.items.clone();
            let store = self.store.clone();
            let message = format!("Probing {}", file.filename);
            pool.submit(message, async move {
                let mut file = file;
                prober.enrich(&mut file).await?;
                if let Some(item) = items.update(item_id, |i| {
                    i.update_media_file(file);
                }) {
                    store.save(&item).await?;
                }
                Ok(())
            });
        }
        pool.await_completion_or_cancel().await
    }

    /// Rename a batch of items, each one as an independent unit
    pub async fn rename_items(&self, ids: &[Uuid]) -> PoolOutcome {
        let cancel = self.begin();
        let mut pool = TaskPool::new(
            "rename",
            self.config.rename_workers,
            cancel,
            self.events.clone(),
        );
        for &id in ids {
            let renamer = self.renamer.clone();
            let title = self
                .items
                .get_by_id(id)
                .map(|i| i.title)
                .unwrap_or_else(|| id.to_string());
            pool.submit(format!("Renaming {}", title), async move {
                renamer.rename(id).await?;
                Ok(())
            });
        }
        let outcome = pool.await_completion_or_cancel().await;
        self.finish("rename", outcome.cancelled);
        outcome
    }

    fn finish(&self, task: &str, cancelled: bool) {
        self.events.emit(LibraryEvent::Done {
            task: task.to_string(),
            cancelled,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{MemoryItemStore, NoNfoParser, NoopProber};
    use std::fs;

    fn library(ds: &Path) -> MediaLibrary {
        let config = EngineConfig {
            data_sources: vec![ds.to_path_buf()],
            ..EngineConfig::default()
        };
        MediaLibrary::new(
            config,
            Arc::new(ItemCollection::new()),
            Arc::new(MemoryItemStore::new()),
            Arc::new(NoNfoParser),
            Arc::new(NoopProber),
        )
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    #[tokio::test]
    async fn test_scan_emits_done() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Alien (1979)/Alien.mkv"));
        let lib = library(dir.path());
        let mut rx = lib.subscribe();

        let summaries = lib.scan_all().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].discovered.len(), 1);
        assert_eq!(summaries[0].probed, 1);

        let mut done = false;
        while let Ok(event) = rx.try_recv() {
            if let LibraryEvent::Done { task, cancelled } = event {
                assert_eq!(task, "scan");
                assert!(!cancelled);
                done = true;
            }
        }
        assert!(done);
        assert!(lib.items().list().iter().all(|i| !i.just_discovered));
    }

    #[tokio::test]
    async fn test_missing_datasource_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library(dir.path());
        assert!(lib.scan_datasource(&dir.path().join("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_earlier_cancel_does_not_leak_into_next_scan() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Heat/Heat.mkv"));
        let lib = library(dir.path());

        lib.cancel();
        let summary = lib.scan_datasource(dir.path()).await.unwrap();
        assert!(!summary.cancelled);
        assert_eq!(lib.items().len(), 1);
    }
}
