//! Object storage seam: the transaction log and price snapshots are read
//! from, and snapshots written to, a bucket-like store.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

use crate::error::StoreError;

/// Bucket-like object storage addressed by `/`-separated relative paths.
pub trait ObjectStore: Send + Sync {
    /// Opens an object for streaming reads.
    fn reader(&self, path: &str) -> Result<Box<dyn Read + Send>, StoreError>;

    /// Starts a replacement of the object at `path`.
    ///
    /// Readers keep seeing the previous content until
    /// [`ObjectWriter::commit`] succeeds. Dropping the writer without
    /// committing discards everything written to it.
    fn writer(&self, path: &str) -> Result<Box<dyn ObjectWriter>, StoreError>;
}

/// Pending object content, published all at once.
pub trait ObjectWriter: Write + Send {
    /// Flushes and atomically replaces the target object.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// A local directory standing in for a bucket.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        if path.is_empty() {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
                reason: "path is empty",
            });
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(StoreError::InvalidPath {
                        path: path.to_string(),
                        reason: "path must be relative and stay inside the bucket",
                    })
                }
            }
        }

        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn reader(&self, path: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let full_path = self.resolve(path)?;
        let file = File::open(&full_path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound {
                path: path.to_string(),
            },
            _ => StoreError::io(path, error),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn writer(&self, path: &str) -> Result<Box<dyn ObjectWriter>, StoreError> {
        let target = self.resolve(path)?;
        let parent = target.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent).map_err(|error| StoreError::io(path, error))?;
        let staged = NamedTempFile::new_in(parent).map_err(|error| StoreError::io(path, error))?;

        Ok(Box::new(FsObjectWriter {
            path: path.to_string(),
            target,
            staged: BufWriter::new(staged),
        }))
    }
}

/// Stages content in a temporary sibling of the target and renames it over
/// the target on commit. The temporary file is removed if never committed.
struct FsObjectWriter {
    path: String,
    target: PathBuf,
    staged: BufWriter<NamedTempFile>,
}

impl Write for FsObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staged.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staged.flush()
    }
}

impl ObjectWriter for FsObjectWriter {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self {
            path,
            target,
            staged,
        } = *self;

        let staged = staged
            .into_inner()
            .map_err(|error| StoreError::io(path.as_str(), error.into_error()))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|error| StoreError::io(path.as_str(), error))?;
        staged
            .persist(&target)
            .map_err(|error| StoreError::io(path.as_str(), error.error))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<String, Vec<u8>>,
    reads: HashMap<String, usize>,
}

/// Deterministic in-memory store for offline tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.lock().objects.insert(path.into(), contents.into());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(path).cloned()
    }

    /// How many times `path` has been opened for reading.
    pub fn read_count(&self, path: &str) -> usize {
        self.lock().reads.get(path).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory object store mutex poisoned")
    }
}

impl ObjectStore for MemoryObjectStore {
    fn reader(&self, path: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let mut state = self.lock();
        *state.reads.entry(path.to_string()).or_insert(0) += 1;
        let contents = state
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })?;
        Ok(Box::new(Cursor::new(contents)))
    }

    fn writer(&self, path: &str) -> Result<Box<dyn ObjectWriter>, StoreError> {
        Ok(Box::new(MemoryWriter {
            path: path.to_string(),
            buffer: Vec::new(),
            state: Arc::clone(&self.state),
        }))
    }
}

/// Buffers writes and publishes the object on commit.
struct MemoryWriter {
    path: String,
    buffer: Vec<u8>,
    state: Arc<Mutex<MemoryState>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWriter for MemoryWriter {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self {
            path,
            buffer,
            state,
        } = *self;
        let mut state = state.lock().map_err(|_| {
            StoreError::io(
                path.as_str(),
                io::Error::other("memory object store mutex poisoned"),
            )
        })?;
        state.objects.insert(path, buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_all(store: &dyn ObjectStore, path: &str) -> String {
        let mut contents = String::new();
        store
            .reader(path)
            .expect("reader")
            .read_to_string(&mut contents)
            .expect("read");
        contents
    }

    #[test]
    fn fs_store_round_trips_nested_objects() {
        let temp = tempdir().expect("tempdir");
        let store = FsObjectStore::new(temp.path());

        let mut writer = store.writer("2024/4/15/prices.csv").expect("writer");
        writer.write_all(b"sfl,2\n").expect("write");
        writer.commit().expect("commit");

        assert_eq!(read_all(&store, "2024/4/15/prices.csv"), "sfl,2\n");
        assert!(temp.path().join("2024/4/15/prices.csv").exists());
    }

    #[test]
    fn fs_store_keeps_previous_object_until_commit() {
        let temp = tempdir().expect("tempdir");
        let store = FsObjectStore::new(temp.path());
        let mut writer = store.writer("2024/4/15/prices.csv").expect("writer");
        writer.write_all(b"sfl,2\nusdc,1\n").expect("write");
        writer.commit().expect("commit");

        {
            let mut replacement = store.writer("2024/4/15/prices.csv").expect("writer");
            replacement.write_all(b"sfl,3\nus").expect("partial write");
            replacement.flush().expect("flush");
            assert_eq!(read_all(&store, "2024/4/15/prices.csv"), "sfl,2\nusdc,1\n");
        }

        assert_eq!(read_all(&store, "2024/4/15/prices.csv"), "sfl,2\nusdc,1\n");
        let leftovers: Vec<_> = fs::read_dir(temp.path().join("2024/4/15"))
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["prices.csv".to_string()]);
    }

    #[test]
    fn fs_store_maps_missing_objects_and_escapes() {
        let temp = tempdir().expect("tempdir");
        let store = FsObjectStore::new(temp.path());

        assert!(matches!(
            store.reader("missing.csv"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.reader("../outside.csv"),
            Err(StoreError::InvalidPath { .. })
        ));
        assert!(matches!(
            store.writer("/etc/passwd"),
            Err(StoreError::InvalidPath { .. })
        ));
    }

    #[test]
    fn memory_store_replaces_objects_and_counts_reads() {
        let store = MemoryObjectStore::new();
        store.put("a.csv", "old");

        let mut abandoned = store.writer("a.csv").expect("writer");
        abandoned.write_all(b"lost").expect("write");
        drop(abandoned);
        assert_eq!(read_all(&store, "a.csv"), "old");

        let mut writer = store.writer("a.csv").expect("writer");
        writer.write_all(b"new").expect("write");
        writer.commit().expect("commit");

        assert_eq!(read_all(&store, "a.csv"), "new");
        assert_eq!(store.read_count("a.csv"), 2);
        assert!(matches!(
            store.reader("b.csv"),
            Err(StoreError::NotFound { .. })
        ));
    }
}
