//! Discovering markdown notes under a user-chosen directory.
//!
//! The notes root is chosen by the user; we only read and index it. Our own
//! data lives in [`INDEX_DIR_NAME`] under the root and is never scanned.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

/// Directory under the notes root reserved for the index.
pub const INDEX_DIR_NAME: &str = ".margin";

/// A note found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    /// Path relative to the notes root, with forward slashes.
    pub path: String,
    /// Modification time in whole seconds since the Unix epoch.
    pub modified: i64,
}

/// Scans `root` for all `.md` files. Order is unspecified.
/// Symlinked files are kept (with their target's mtime); symlinks to
/// directories are not descended into, and dangling links are skipped.
/// Any walk or metadata error fails the whole scan.
pub fn scan_notes(root: &Path) -> Result<Vec<NoteFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let mut notes = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry?;
        if !entry.path().is_file() || !is_markdown(entry.path()) {
            continue;
        }
        let meta = std::fs::metadata(entry.path())
            .map_err(|e| ScanError::Metadata(entry.path().to_path_buf(), e.to_string()))?;
        let modified = meta
            .modified()
            .map_err(|e| ScanError::Metadata(entry.path().to_path_buf(), e.to_string()))?;
        notes.push(NoteFile {
            path: relative_slash_path(root, entry.path()),
            modified: unix_seconds(modified),
        });
    }
    Ok(notes)
}

/// Hidden entries. Covers [`INDEX_DIR_NAME`] and `._` AppleDouble files.
fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Seconds since the epoch; times before the epoch are negative.
fn unix_seconds(t: std::time::SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Absolute path of a note given its relative slash path.
pub fn note_abs_path(root: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(root.to_path_buf(), |p, part| p.join(part))
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("metadata error for {0}: {1}")]
    Metadata(PathBuf, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str, body: &str) {
        let p = note_abs_path(root, rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, body).unwrap();
    }

    #[test]
    fn finds_markdown_with_relative_slash_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.md", "a");
        touch(dir.path(), "Daily/2026-01-01.MD", "b");
        touch(dir.path(), "Daily/deep/c.md", "c");
        touch(dir.path(), "image.png", "x");
        touch(dir.path(), "todo.txt", "x");

        let mut paths: Vec<String> = scan_notes(dir.path())
            .unwrap()
            .into_iter()
            .map(|n| n.path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["Daily/2026-01-01.MD", "Daily/deep/c.md", "a.md"]);
    }

    #[test]
    fn skips_index_dir_and_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "keep.md", "k");
        touch(dir.path(), ".margin/notes.md", "x");
        touch(dir.path(), ".git/HEAD.md", "x");
        touch(dir.path(), "._keep.md", "x");

        let notes = scan_notes(dir.path()).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].path, "keep.md");
        assert!(notes[0].modified > 0);
    }

    #[cfg(unix)]
    #[test]
    fn keeps_file_symlinks_but_not_directory_links() {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "linked.md", "l");
        touch(outside.path(), "folder/inner.md", "i");

        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "real.md", "r");
        symlink(outside.path().join("linked.md"), dir.path().join("alias.md")).unwrap();
        symlink(outside.path().join("folder"), dir.path().join("folder")).unwrap();
        symlink(outside.path().join("missing.md"), dir.path().join("dangling.md")).unwrap();

        let mut paths: Vec<String> = scan_notes(dir.path())
            .unwrap()
            .into_iter()
            .map(|n| n.path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["alias.md", "real.md"]);
    }

    #[test]
    fn rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            scan_notes(&missing),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn abs_path_round_trips_relative_path() {
        let root = Path::new("/notes");
        assert_eq!(
            note_abs_path(root, "Daily/x.md"),
            Path::new("/notes").join("Daily").join("x.md")
        );
    }
}
