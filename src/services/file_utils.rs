//! Shared file utility functions
//!
//! Extension helpers, illegal-character policy and the low-level move/copy
//! primitives used by the organizer.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Characters never allowed inside a generated path segment
pub const ILLEGAL_FILENAME_CHARS: &[char] = &['"', '\\', ':', '<', '>', '|', '/', '?', '*'];

/// Remove every character of the illegal-filename class
pub fn strip_illegal_chars(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect()
}

/// Sanitize one path segment produced by the renamer
///
/// Strips the illegal-character class, lets `sanitize_filename` drop control
/// characters and reserved device names, and removes trailing dots/spaces.
/// Applying it twice yields the same result.
pub fn sanitize_segment(segment: &str) -> String {
    let stripped = strip_illegal_chars(segment);
    let options = sanitize_filename::Options {
        truncate: true,
        windows: true,
        replacement: "",
    };
    let sanitized = sanitize_filename::sanitize_with_options(stripped, options);
    sanitized
        .trim_start()
        .trim_end_matches(['.', ' '])
        .to_string()
}

/// Treat `jpg` and `jpeg` (and `tbn`) as the same image container
pub fn same_image_extension(a: &str, b: &str) -> bool {
    fn canonical(ext: &str) -> String {
        match ext.to_lowercase().as_str() {
            "jpeg" | "tbn" => "jpg".to_string(),
            other => other.to_string(),
        }
    }
    canonical(a) == canonical(b)
}

/// Move a file, falling back to copy + delete when a plain rename fails
/// (for example across filesystems)
pub async fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    match tokio::fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("Source vanished: {}", source.display()))
        }
        Err(rename_err) => {
            debug!(
                source = %source.display(),
                dest = %dest.display(),
                error = %rename_err,
                "Rename failed, falling back to copy + delete"
            );
            tokio::fs::copy(source, dest).await.with_context(|| {
                format!(
                    "Failed to move {} -> {} (rename: {})",
                    source.display(),
                    dest.display(),
                    rename_err
                )
            })?;
            tokio::fs::remove_file(source)
                .await
                .with_context(|| format!("Failed to delete {} after copy", source.display()))?;
            Ok(())
        }
    }
}

/// Copy a file unless the destination already exists
///
/// Returns `true` when a copy was made.
pub async fn copy_if_absent(source: &Path, dest: &Path) -> Result<bool> {
    if tokio::fs::try_exists(dest).await.unwrap_or(false) {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(source, dest)
        .await
        .with_context(|| format!("Failed to copy {} -> {}", source.display(), dest.display()))?;
    Ok(true)
}

/// Whether a directory has no entries at all
pub async fn is_dir_empty(path: &Path) -> Result<bool> {
    let mut entries = tokio::fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}

/// Move a whole directory; when a plain rename fails the contents are moved
/// file by file and the emptied source tree is removed
pub async fn move_directory(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    match tokio::fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("Directory vanished: {}", source.display()))
        }
        Err(rename_err) => {
            debug!(
                source = %source.display(),
                dest = %dest.display(),
                error = %rename_err,
                "Directory rename failed, moving contents"
            );
            move_folder_contents(source, dest).await
        }
    }
}

async fn move_folder_contents(source: &Path, dest: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dest)
        .await
        .with_context(|| format!("Failed to create directory {}", dest.display()))?;

    let mut entries = tokio::fs::read_dir(source)
        .await
        .with_context(|| format!("Failed to list {}", source.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if entry.file_type().await?.is_dir() {
            Box::pin(move_folder_contents(&entry_path, &dest_path)).await?;
        } else {
            move_file(&entry_path, &dest_path).await?;
        }
    }

    tokio::fs::remove_dir(source)
        .await
        .with_context(|| format!("Failed to remove {}", source.display()))
}

/// Remove `dir` and its parents while they are empty, never touching `stop_at`
/// or anything above it
///
/// Returns the number of directories removed.
pub async fn remove_empty_parents(dir: &Path, stop_at: &Path) -> usize {
    let mut removed = 0;
    let mut current = dir.to_path_buf();
    while current.starts_with(stop_at) && current != stop_at {
        match is_dir_empty(&current).await {
            Ok(true) => {}
            _ => break,
        }
        if let Err(e) = tokio::fs::remove_dir(&current).await {
            debug!(path = %current.display(), error = %e, "Could not remove folder");
            break;
        }
        debug!(path = %current.display(), "Removed empty folder");
        removed += 1;
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
    removed
}
