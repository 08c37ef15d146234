//! In-memory archive
//!
//! Holds whole archive images keyed by path. Used by tools that build
//! archives in memory and by tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Archive, ArchiveError, ArchiveReader};

#[derive(Debug, Default)]
pub struct MemoryArchive {
    files: RwLock<HashMap<PathBuf, Arc<[u8]>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the file at `path`
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Arc<[u8]>>) {
        self.files.write().insert(path.into(), data.into());
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }
}

impl Archive for MemoryArchive {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
        let data = self
            .files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound {
                path: path.to_path_buf(),
            })?;
        Ok(Box::new(MemoryReader::new(data)))
    }
}

/// Reader over a shared in-memory archive image
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Arc<[u8]>,
    position: u64,
}

impl MemoryReader {
    pub fn new(data: Arc<[u8]>) -> Self {
        Self { data, position: 0 }
    }
}

impl ArchiveReader for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = (self.position as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        self.position = position;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
