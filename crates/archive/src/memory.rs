//! In-memory container.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{ArchiveFactory, ArchiveWriter, ContractError, Result};
use parking_lot::Mutex;

/// Entries appended to every archive a [`MemoryArchiveFactory`] created, keyed by archive path.
#[derive(Clone, Default)]
pub struct MemoryEntries {
    inner: Arc<Mutex<Vec<(PathBuf, String, Vec<u8>)>>>,
}

impl MemoryEntries {
    /// Entry names of one archive, in append order.
    pub fn names(&self, archive: &Path) -> Vec<String> {
        self.inner
            .lock()
            .iter()
            .filter(|(path, _, _)| path == archive)
            .map(|(_, name, _)| name.clone())
            .collect()
    }

    pub fn get(&self, archive: &Path, name: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .iter()
            .find(|(path, entry, _)| path == archive && entry == name)
            .map(|(_, _, data)| data.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

pub struct MemoryArchive {
    path: PathBuf,
    entries: MemoryEntries,
    closed: bool,
}

impl MemoryArchive {
    pub fn new(path: impl Into<PathBuf>, entries: MemoryEntries) -> Self {
        Self {
            path: path.into(),
            entries,
            closed: false,
        }
    }
}

impl ArchiveWriter for MemoryArchive {
    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(ContractError::ArchiveClosed {
                archive: self.path.display().to_string(),
            });
        }
        self.entries
            .inner
            .lock()
            .push((self.path.clone(), name.to_string(), data.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(ContractError::ArchiveClosed {
                archive: self.path.display().to_string(),
            });
        }
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Hands out [`MemoryArchive`]s sharing one [`MemoryEntries`] store.
#[derive(Clone, Default)]
pub struct MemoryArchiveFactory {
    entries: MemoryEntries,
}

impl MemoryArchiveFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> MemoryEntries {
        self.entries.clone()
    }
}

impl ArchiveFactory for MemoryArchiveFactory {
    fn create(&self, path: &Path) -> Result<Box<dyn ArchiveWriter>> {
        Ok(Box::new(MemoryArchive::new(path, self.entries.clone())))
    }
}
