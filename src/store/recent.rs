//! Recently viewed emails, persisted as a JSON list of paths.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{EmlError, Result};

/// Number of entries kept.
pub const MAX_RECENT: usize = 5;

/// Most recently viewed email paths, newest first, without duplicates.
#[derive(Debug, Clone)]
pub struct RecentEmails {
    file: PathBuf,
    entries: Vec<PathBuf>,
}

impl RecentEmails {
    /// Load the list stored in `file`.
    ///
    /// A missing file is an empty list. An unreadable or corrupt file is
    /// logged and also treated as empty; it is overwritten on the next add.
    pub fn load(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let entries = match std::fs::read_to_string(&file) {
            Ok(json) => serde_json::from_str::<Vec<PathBuf>>(&json).unwrap_or_else(|e| {
                warn!(path = %file.display(), error = %e, "Ignoring corrupt recent emails file");
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Cannot read recent emails file");
                Vec::new()
            }
        };
        let mut recent = Self { file, entries };
        recent.entries.truncate(MAX_RECENT);
        recent
    }

    /// Paths, most recent first.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Move `path` to the front (adding it if new), drop the oldest beyond
    /// [`MAX_RECENT`], and save.
    pub fn add(&mut self, path: &Path) -> Result<()> {
        self.entries.retain(|p| p != path);
        self.entries.insert(0, path.to_path_buf());
        self.entries.truncate(MAX_RECENT);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EmlError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| EmlError::io(&self.file, std::io::Error::other(e)))?;
        std::fs::write(&self.file, json).map_err(|e| EmlError::io(&self.file, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut recent = RecentEmails::load(dir.path().join("recent.json"));
        recent.add(Path::new("a.eml")).unwrap();
        recent.add(Path::new("b.eml")).unwrap();
        recent.add(Path::new("a.eml")).unwrap();
        assert_eq!(
            recent.entries(),
            &[PathBuf::from("a.eml"), PathBuf::from("b.eml")]
        );
    }

    #[test]
    fn test_capped_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("recent.json");
        let mut recent = RecentEmails::load(&file);
        for i in 0..7 {
            recent.add(Path::new(&format!("{i}.eml"))).unwrap();
        }
        assert_eq!(recent.entries().len(), MAX_RECENT);
        assert_eq!(recent.entries()[0], PathBuf::from("6.eml"));

        let reloaded = RecentEmails::load(&file);
        assert_eq!(reloaded.entries(), recent.entries());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("recent.json");
        std::fs::write(&file, "{not json").unwrap();
        assert!(RecentEmails::load(&file).entries().is_empty());
    }
}
