//! Collaborators consumed by the engine
//!
//! Persistence, on-disk metadata parsing and technical probing are owned by
//! other parts of the application; the engine only talks to these traits.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::media::{Item, ItemKind, MediaFile};

/// Persists items after every structural change
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn save(&self, item: &Item) -> Result<()>;
    async fn remove(&self, item: &Item) -> Result<()>;
}

/// Seeds a new item from an existing metadata file
#[async_trait]
pub trait NfoParser: Send + Sync {
    /// `Ok(None)` when the file carries nothing usable
    async fn parse(&self, nfo: &Path, kind: ItemKind) -> Result<Option<Item>>;
}

/// Fills technical attributes of a primary media or trailer file
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn enrich(&self, file: &mut MediaFile) -> Result<()>;
}

/// Item store kept in memory
#[derive(Default)]
pub struct MemoryItemStore {
    items: Mutex<HashMap<Uuid, Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<Item> {
        self.items.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn save(&self, item: &Item) -> Result<()> {
        self.items.lock().insert(item.id, item.clone());
        Ok(())
    }

    async fn remove(&self, item: &Item) -> Result<()> {
        self.items.lock().remove(&item.id);
        Ok(())
    }
}

/// Prober that leaves files untouched
pub struct NoopProber;

#[async_trait]
impl MediaProber for NoopProber {
    async fn enrich(&self, _file: &mut MediaFile) -> Result<()> {
        Ok(())
    }
}

/// Parser that never recognizes a metadata file
pub struct NoNfoParser;

#[async_trait]
impl NfoParser for NoNfoParser {
    async fn parse(&self, _nfo: &Path, _kind: ItemKind) -> Result<Option<Item>> {
        Ok(None)
    }
}

static IMDB_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"imdb\.com/title/(tt\d{6,})").expect("valid imdb url regex"));

/// Minimal Kodi-style NFO reader
///
/// Reads the handful of top-level tags needed to name an item. A URL-only NFO
/// pointing at IMDb yields an item with just the id set.
pub struct KodiNfoParser;

#[async_trait]
impl NfoParser for KodiNfoParser {
    async fn parse(&self, nfo: &Path, kind: ItemKind) -> Result<Option<Item>> {
        let raw = tokio::fs::read(nfo)
            .await
            .with_context(|| format!("Failed to read {}", nfo.display()))?;
        let text = String::from_utf8_lossy(&raw);
        Ok(parse_nfo_text(&text, kind))
    }
}

fn parse_nfo_text(text: &str, kind: ItemKind) -> Option<Item> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    // Path and datasource are filled in by the reconciler
    let mut item = Item::new(kind, "", "");

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut tags: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                tags.push(String::from_utf8_lossy(e.name().as_ref()).to_lowercase());
            }
            Ok(Event::End(_)) => {
                tags.pop();
            }
            Ok(Event::Text(ref e)) => {
                let value = e.unescape().unwrap_or_default();
                apply_tag(&mut item, &tags, value.trim());
            }
            Ok(Event::CData(ref e)) => {
                let value = String::from_utf8_lossy(e.as_ref()).to_string();
                apply_tag(&mut item, &tags, value.trim());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "Stopped reading malformed NFO");
                break;
            }
            _ => {}
        }
    }

    if item.ids.is_empty() {
        if let Some(caps) = IMDB_URL_RE.captures(text) {
            item.ids.insert("imdb".to_string(), caps[1].to_string());
        }
    }

    if item.title.is_empty() && item.ids.is_empty() {
        debug!("NFO carries neither title nor id");
        return None;
    }
    Some(item)
}

/// Apply the text of the innermost open tag; only children of the root
/// element count, plus `<set><name>`
fn apply_tag(item: &mut Item, tags: &[String], value: &str) {
    if value.is_empty() {
        return;
    }
    let tag = match tags {
        [_, tag] => tag.as_str(),
        [_, set, name] if set == "set" && name == "name" => "set",
        _ => return,
    };
    match tag {
        "title" if item.title.is_empty() => item.title = value.to_string(),
        "originaltitle" => item.original_title = Some(value.to_string()),
        "sorttitle" => item.sort_title = Some(value.to_string()),
        "year" => item.year = value.parse().ok(),
        "id" | "imdbid" if value.starts_with("tt") => {
            item.ids.insert("imdb".to_string(), value.to_string());
        }
        "tmdbid" => {
            item.ids.insert("tmdb".to_string(), value.to_string());
        }
        "set" => item.collection = Some(value.to_string()),
        "mpaa" => item.certification = Some(value.to_string()),
        "genre" => item.genres.push(value.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kodi_nfo() {
        let nfo = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <title>Die Hard</title>
  <originaltitle>Die Hard</originaltitle>
  <year>1988</year>
  <id>tt0095016</id>
  <tmdbid>562</tmdbid>
  <set><name>Die Hard Collection</name></set>
  <genre>Action</genre>
  <genre>Thriller</genre>
</movie>"#;
        let item = parse_nfo_text(nfo, ItemKind::Movie).unwrap();
        assert_eq!(item.title, "Die Hard");
        assert_eq!(item.year, Some(1988));
        assert_eq!(item.external_id(), Some("tt0095016"));
        assert_eq!(item.ids.get("tmdb").map(String::as_str), Some("562"));
        assert_eq!(item.collection.as_deref(), Some("Die Hard Collection"));
        assert_eq!(item.genres, vec!["Action", "Thriller"]);
    }

    #[test]
    fn test_parse_url_only_nfo() {
        let item = parse_nfo_text("https://www.imdb.com/title/tt0078748/", ItemKind::Movie).unwrap();
        assert_eq!(item.external_id(), Some("tt0078748"));
        assert!(item.title.is_empty());
    }

    #[test]
    fn test_nested_titles_are_ignored() {
        let nfo = "<movie><title>Heat</title><actor><name>Al Pacino</name><role>Hanna</role></actor>\
                   <fileinfo><streamdetails><video><title>main</title></video></streamdetails></fileinfo></movie>";
        let item = parse_nfo_text(nfo, ItemKind::Movie).unwrap();
        assert_eq!(item.title, "Heat");
        assert_eq!(item.collection, None);
    }

    #[test]
    fn test_parse_garbage_nfo() {
        assert!(parse_nfo_text("just some release notes", ItemKind::Movie).is_none());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryItemStore::new();
        let item = Item::movie("/m", "/m/Alien").with_title("Alien");
        store.save(&item).await.unwrap();
        assert_eq!(store.get(item.id).map(|i| i.title), Some("Alien".to_string()));
        store.remove(&item).await.unwrap();
        assert!(store.is_empty());
    }
}
