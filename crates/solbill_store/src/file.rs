//! File-based store backend for persistent storage.

use crate::backend::{valid_name, StoreBackend};
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File extension for stored documents.
const DOC_EXT: &str = "doc";

/// Name of the exclusive-access lock file.
const LOCK_FILE: &str = "store.lock";

/// A file-based document store.
///
/// Each document is one file (`<name>.doc`) under a root directory. Data
/// survives process restarts.
///
/// # Durability
///
/// Saves write to a temporary file, `sync_all`, then rename over the target.
/// A crash mid-save leaves either the old document or the new one, never a
/// torn write.
///
/// # Exclusive access
///
/// The directory is guarded by an advisory lock (`store.lock`); opening a
/// directory another process holds fails with [`StoreError::Locked`]. The
/// sync engine owns its cache exclusively, and the lock makes a second
/// dashboard instance pointing at the same profile directory fail fast
/// instead of corrupting the outbox.
///
/// # Example
///
/// ```no_run
/// use solbill_store::{FileBackend, StoreBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("/var/lib/solbill/cache")).unwrap();
/// backend.save("customers", b"[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    // Held for the lifetime of the backend; dropping releases the lock.
    _lock: File,
}

impl FileBackend {
    /// Opens or creates a file store at the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the
    /// directory, or an I/O error if the directory cannot be created.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(root.join(LOCK_FILE))?;
        lock.try_lock_exclusive().map_err(|_| StoreError::Locked)?;

        Ok(Self {
            root: root.to_path_buf(),
            _lock: lock,
        })
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, name: &str) -> StoreResult<PathBuf> {
        if !valid_name(name) {
            return Err(StoreError::InvalidName { name: name.into() });
        }
        Ok(self.root.join(format!("{name}.{DOC_EXT}")))
    }
}

impl StoreBackend for FileBackend {
    fn load(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.doc_path(name)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.doc_path(name)?;
        let tmp = self.root.join(format!("{name}.{DOC_EXT}.tmp"));

        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> StoreResult<()> {
        let path = self.doc_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(DOC_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.save("customers", b"[1,2,3]").unwrap();
        assert_eq!(
            backend.load("customers").unwrap(),
            Some(b"[1,2,3]".to_vec())
        );
    }

    #[test]
    fn file_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.load("missing").unwrap(), None);
    }

    #[test]
    fn file_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.save("outbox", b"queued").unwrap();
        }

        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.load("outbox").unwrap(), Some(b"queued".to_vec()));
    }

    #[test]
    fn file_save_replaces_atomically() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.save("doc", b"old").unwrap();
        backend.save("doc", b"new").unwrap();
        assert_eq!(backend.load("doc").unwrap(), Some(b"new".to_vec()));

        // No leftover temp file
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn file_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.save("doc", b"data").unwrap();
        backend.remove("doc").unwrap();
        backend.remove("doc").unwrap();
        assert_eq!(backend.load("doc").unwrap(), None);
    }

    #[test]
    fn file_list_ignores_lock_and_tmp() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.save("a", b"1").unwrap();
        backend.save("b", b"2").unwrap();

        let mut names = backend.list().unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn file_second_open_fails_locked() {
        let dir = TempDir::new().unwrap();
        let _first = FileBackend::open(dir.path()).unwrap();

        let second = FileBackend::open(dir.path());
        assert!(matches!(second, Err(StoreError::Locked)));
    }

    #[test]
    fn file_invalid_name_fails() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        let result = backend.save("../escape", b"data");
        assert!(matches!(result, Err(StoreError::InvalidName { .. })));
    }
}
