//! Tar container.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use contracts::{ArchiveFactory, ArchiveWriter, ContractError, Result};
use tracing::{debug, instrument};

/// Append-only tar file.
pub struct TarArchive {
    path: PathBuf,
    builder: Option<tar::Builder<BufWriter<File>>>,
    entries: usize,
}

impl TarArchive {
    /// Create (or truncate) `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        debug!(archive = %path.display(), "Tar archive opened");
        Ok(Self {
            path,
            builder: Some(tar::Builder::new(BufWriter::new(file))),
            entries: 0,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    fn closed(&self) -> ContractError {
        ContractError::ArchiveClosed {
            archive: self.path.display().to_string(),
        }
    }
}

impl ArchiveWriter for TarArchive {
    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let archive = self.path.display().to_string();
        let builder = self.builder.as_mut().ok_or_else(|| ContractError::ArchiveClosed {
            archive: archive.clone(),
        })?;

        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );
        header.set_cksum();

        builder
            .append_data(&mut header, name, data)
            .map_err(|e| ContractError::archive_write(archive, e.to_string()))?;
        self.entries += 1;
        Ok(())
    }

    #[instrument(name = "tar_close", skip(self), fields(archive = %self.path.display()))]
    fn close(&mut self) -> Result<()> {
        let builder = self.builder.take().ok_or_else(|| self.closed())?;
        let mut writer = builder
            .into_inner()
            .map_err(|e| ContractError::archive_write(self.path.display().to_string(), e.to_string()))?;
        std::io::Write::flush(&mut writer)?;
        debug!(entries = self.entries, "Tar archive closed");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Creates `<path>.tar`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarArchiveFactory;

impl ArchiveFactory for TarArchiveFactory {
    fn create(&self, path: &Path) -> Result<Box<dyn ArchiveWriter>> {
        let mut file_name = path.as_os_str().to_owned();
        file_name.push(".tar");
        Ok(Box::new(TarArchive::create(PathBuf::from(file_name))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_entries_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = TarArchiveFactory.create(&dir.path().join("VLC LF")).unwrap();
        archive.add_entry("100.pgm", b"first").unwrap();
        archive.add_entry("200.pgm", b"second").unwrap();
        archive.close().unwrap();

        let file = File::open(dir.path().join("VLC LF.tar")).unwrap();
        let mut reader = tar::Archive::new(file);
        let mut seen = Vec::new();
        for entry in reader.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().display().to_string();
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            seen.push((name, body));
        }
        assert_eq!(
            seen,
            vec![
                ("100.pgm".to_string(), b"first".to_vec()),
                ("200.pgm".to_string(), b"second".to_vec()),
            ]
        );
    }

    #[test]
    fn test_add_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = TarArchive::create(dir.path().join("PV.tar")).unwrap();
        archive.close().unwrap();
        let err = archive.add_entry("1.bytes", b"x").unwrap_err();
        assert!(matches!(err, ContractError::ArchiveClosed { .. }));
        assert!(archive.close().is_err());
    }
}
