//! Engine components: scanning, reconciliation, naming and relocation

pub mod classifier;
pub mod events;
pub mod file_utils;
pub mod filename_parser;
pub mod job_queue;
pub mod library;
pub mod naming;
pub mod organizer;
pub mod providers;
pub mod reconciler;
pub mod retry;
pub mod scanner;
pub mod subtitles;
pub mod text_utils;

pub use events::{EventSink, LibraryEvent, MessageLevel};
pub use job_queue::{PoolOutcome, TaskPool};
pub use library::{MediaLibrary, ScanSummary};
pub use organizer::{OrganizeError, PlannedFile, RenamePlan, Renamer, SelfRename, WriteCheck};
pub use providers::{
    ItemStore, KodiNfoParser, MediaProber, MemoryItemStore, NfoParser, NoNfoParser, NoopProber,
};
pub use reconciler::{CleanupStats, Reconciler, ScanPass};
pub use scanner::{DirectoryScanner, ScannedDirectory};
