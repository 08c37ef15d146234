//! Archive abstraction
//!
//! Random-access, whole-file readers over named paths. A bank never owns an
//! archive; it asks one for a fresh, exclusive reader each time a decode
//! session is opened, so any number of sessions can read the same file.

pub mod disk;
pub mod memory;

use std::io;
use std::path::{Path, PathBuf};

pub use disk::{DiskArchive, DiskReader};
pub use memory::{MemoryArchive, MemoryReader};

/// Errors reported by archive implementations
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to open archive '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    /// Path the failing request was made for
    pub fn path(&self) -> &Path {
        match self {
            ArchiveError::NotFound { path } | ArchiveError::Io { path, .. } => path,
        }
    }

    pub(crate) fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ArchiveError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ArchiveError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }
}

/// A random-access reader over one archive file.
///
/// Positions are absolute byte offsets from the start of the archive.
pub trait ArchiveReader: Send {
    /// Read up to `buf.len()` bytes at the current position
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Move to an absolute position
    fn seek(&mut self, position: u64) -> io::Result<()>;

    /// Current absolute position
    fn tell(&self) -> u64;

    /// Total archive size in bytes
    fn size(&self) -> u64;
}

/// Source of independent archive readers.
///
/// Implementations must allow several readers over the same path to be alive
/// at once.
pub trait Archive: Send + Sync {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError>;
}

impl<A: Archive + ?Sized> Archive for &A {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
        (**self).open_reader(path)
    }
}

impl<A: Archive + ?Sized> Archive for std::sync::Arc<A> {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
        (**self).open_reader(path)
    }
}

/// Read the whole content of `path` through `archive`
pub fn read_all(archive: &dyn Archive, path: &Path) -> Result<Vec<u8>, ArchiveError> {
    let mut reader = archive.open_reader(path)?;
    let size = reader.size();
    let mut data = vec![0u8; size as usize];
    let mut filled = 0;
    while filled < data.len() {
        let n = reader
            .read(&mut data[filled..])
            .map_err(|e| ArchiveError::from_io(path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    data.truncate(filled);
    Ok(data)
}
