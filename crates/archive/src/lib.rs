//! # Archive
//!
//! [`ArchiveWriter`](contracts::ArchiveWriter) containers.
//!
//! - [`TarArchive`]: one `.tar` file per stream, the recording format
//! - [`DirectoryArchive`]: one file per entry, handy for inspection
//! - [`MemoryArchive`]: entries kept in memory, shared with the creator for tests

mod directory;
mod memory;
mod tar_archive;

pub use directory::{DirectoryArchive, DirectoryArchiveFactory};
pub use memory::{MemoryArchive, MemoryArchiveFactory, MemoryEntries};
pub use tar_archive::{TarArchive, TarArchiveFactory};

use std::sync::Arc;

use contracts::{ArchiveFactory, ContainerKind};

/// Factory for the configured container kind.
pub fn factory_for(kind: ContainerKind) -> Arc<dyn ArchiveFactory> {
    match kind {
        ContainerKind::Tar => Arc::new(TarArchiveFactory),
        ContainerKind::Directory => Arc::new(DirectoryArchiveFactory),
    }
}
