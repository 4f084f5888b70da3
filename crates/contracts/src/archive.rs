//! Archive container collaborator.

use std::path::Path;

use crate::Result;

/// Append-only container of named blobs.
pub trait ArchiveWriter: Send {
    /// Append one entry.
    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Flush and finish the container. Further `add_entry` calls fail.
    fn close(&mut self) -> Result<()>;

    /// Container location, used in logs.
    fn location(&self) -> &Path;
}

/// Opens archive containers.
pub trait ArchiveFactory: Send + Sync {
    /// Open a container at `path`. The extension is chosen by the factory.
    fn create(&self, path: &Path) -> Result<Box<dyn ArchiveWriter>>;
}
