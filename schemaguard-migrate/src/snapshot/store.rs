//! Byte-level storage for snapshot files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::error::{MigrateResult, MigrationError};

/// Flat storage of named files.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Read a file.
    async fn read(&self, name: &str) -> MigrateResult<String>;

    /// Write a file, replacing any previous content.
    async fn write(&self, name: &str, content: &str) -> MigrateResult<()>;

    /// Whether a file exists.
    async fn exists(&self, name: &str) -> MigrateResult<bool>;

    /// All file names.
    async fn list(&self) -> MigrateResult<Vec<String>>;

    /// Delete a file. Missing files are not an error.
    async fn delete(&self, name: &str) -> MigrateResult<()>;

    /// Last modification time of a file.
    async fn modified(&self, name: &str) -> MigrateResult<SystemTime>;
}

/// Files in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait::async_trait]
impl ArtifactStore for FileStore {
    async fn read(&self, name: &str) -> MigrateResult<String> {
        Ok(tokio::fs::read_to_string(self.path(name)).await?)
    }

    async fn write(&self, name: &str, content: &str) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path(name), content).await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> MigrateResult<bool> {
        Ok(tokio::fs::try_exists(self.path(name)).await?)
    }

    async fn list(&self) -> MigrateResult<Vec<String>> {
        let mut names = Vec::new();
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(names);
        }
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> MigrateResult<()> {
        match tokio::fs::remove_file(self.path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn modified(&self, name: &str) -> MigrateResult<SystemTime> {
        Ok(tokio::fs::metadata(self.path(name)).await?.modified()?)
    }
}

/// In-process store. Every write gets a strictly later modification time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, (String, SystemTime)>>,
    clock: Mutex<Option<SystemTime>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> SystemTime {
        let mut clock = self.clock.lock();
        let now = SystemTime::now();
        let next = match *clock {
            Some(last) if now <= last => last + Duration::from_millis(1),
            _ => now,
        };
        *clock = Some(next);
        next
    }
}

fn not_found(name: &str) -> MigrationError {
    std::io::Error::new(std::io::ErrorKind::NotFound, format!("no artifact named '{}'", name)).into()
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryStore {
    async fn read(&self, name: &str) -> MigrateResult<String> {
        self.files
            .lock()
            .get(name)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| not_found(name))
    }

    async fn write(&self, name: &str, content: &str) -> MigrateResult<()> {
        let at = self.tick();
        self.files.lock().insert(name.to_string(), (content.to_string(), at));
        Ok(())
    }

    async fn exists(&self, name: &str) -> MigrateResult<bool> {
        Ok(self.files.lock().contains_key(name))
    }

    async fn list(&self) -> MigrateResult<Vec<String>> {
        Ok(self.files.lock().keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> MigrateResult<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    async fn modified(&self, name: &str) -> MigrateResult<SystemTime> {
        self.files
            .lock()
            .get(name)
            .map(|(_, at)| *at)
            .ok_or_else(|| not_found(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn ArtifactStore) {
        assert!(store.list().await.unwrap().is_empty());
        store.write("b.json", "{}").await.unwrap();
        store.write("a.yaml", "x: 1").await.unwrap();

        assert!(store.exists("a.yaml").await.unwrap());
        assert_eq!(store.read("b.json").await.unwrap(), "{}");
        assert_eq!(store.list().await.unwrap(), vec!["a.yaml", "b.json"]);
        assert!(store.modified("a.yaml").await.unwrap() >= store.modified("b.json").await.unwrap());

        store.delete("a.yaml").await.unwrap();
        store.delete("a.yaml").await.unwrap();
        assert!(!store.exists("a.yaml").await.unwrap());
        assert!(store.read("a.yaml").await.is_err());
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileStore::new(dir.path().join("snapshots"))).await;
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store).await;

        store.write("c", "1").await.unwrap();
        store.write("d", "2").await.unwrap();
        assert!(store.modified("d").await.unwrap() > store.modified("c").await.unwrap());
    }
}
