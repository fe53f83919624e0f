//! Where margin stores its own per-user data (config).
//!
//! The index itself lives next to the notes, see [`crate::store::index_path`].

use std::path::PathBuf;

/// Returns the directory where margin stores its config.
/// On macOS: `~/Library/Application Support/Margin/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "Margin", "Margin")?
        .data_local_dir()
        .to_path_buf();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "cannot create app data dir");
        return None;
    }
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_exists_when_resolved() {
        if let Some(dir) = app_data_dir() {
            assert!(dir.is_dir());
        }
    }
}
