//! Directory container: one file per entry.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use contracts::{ArchiveFactory, ArchiveWriter, ContractError, Result};
use tracing::{debug, error};

/// Writes every entry as `<root>/<name>`.
pub struct DirectoryArchive {
    root: PathBuf,
    closed: bool,
    written: HashSet<String>,
}

impl DirectoryArchive {
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(archive = %root.display(), "Directory archive opened");
        Ok(Self {
            root,
            closed: false,
            written: HashSet::new(),
        })
    }

    pub fn entry_count(&self) -> usize {
        self.written.len()
    }
}

impl ArchiveWriter for DirectoryArchive {
    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(ContractError::ArchiveClosed {
                archive: self.root.display().to_string(),
            });
        }
        if name.contains('/') || name.contains('\\') || name == ".." {
            return Err(ContractError::archive_write(
                self.root.display().to_string(),
                format!("invalid entry name '{name}'"),
            ));
        }

        fs::write(self.root.join(name), data).map_err(|e| {
            error!(archive = %self.root.display(), entry = name, error = %e, "Write failed");
            ContractError::archive_write(self.root.display().to_string(), e.to_string())
        })?;
        self.written.insert(name.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(ContractError::ArchiveClosed {
                archive: self.root.display().to_string(),
            });
        }
        self.closed = true;
        debug!(archive = %self.root.display(), entries = self.written.len(), "Directory archive closed");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.root
    }
}

/// Creates the directory `<path>/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryArchiveFactory;

impl ArchiveFactory for DirectoryArchiveFactory {
    fn create(&self, path: &Path) -> Result<Box<dyn ArchiveWriter>> {
        Ok(Box::new(DirectoryArchive::create(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_file_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = DirectoryArchiveFactory
            .create(&dir.path().join("AHAT"))
            .unwrap();
        archive.add_entry("5.pgm", &[1, 2, 3]).unwrap();
        archive.add_entry("5_ab.pgm", &[4]).unwrap();
        archive.close().unwrap();

        assert_eq!(fs::read(dir.path().join("AHAT/5.pgm")).unwrap(), vec![1, 2, 3]);
        assert_eq!(fs::read(dir.path().join("AHAT/5_ab.pgm")).unwrap(), vec![4]);
    }

    #[test]
    fn test_rejects_nested_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = DirectoryArchive::create(dir.path()).unwrap();
        assert!(archive.add_entry("../escape", b"x").is_err());
    }
}
