//! Datasource reconciliation and rename engine for a personal media library

pub mod config;
pub mod media;
pub mod services;

pub use config::EngineConfig;
pub use media::{FileKind, Item, ItemCollection, ItemKind, MediaFile};
pub use services::{EventSink, LibraryEvent, MediaLibrary, OrganizeError, Renamer};
