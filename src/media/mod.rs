//! Library domain model

pub mod collection;
pub mod item;
pub mod media_file;

pub use collection::ItemCollection;
pub use item::{Item, ItemKind};
pub use media_file::{FileKind, MediaFile};
