// Disk-backed archive readers

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{Archive, ArchiveError, ArchiveReader};

/// Opens archives from the local file system.
///
/// Relative paths are resolved against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct DiskArchive {
    root: Option<PathBuf>,
}

impl DiskArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Archive for DiskArchive {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
        let full = self.resolve(path);
        let metadata = fs::metadata(&full).map_err(|e| ArchiveError::from_io(path, e))?;
        if metadata.is_dir() {
            return Err(ArchiveError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
            });
        }

        let file = File::open(&full).map_err(|e| ArchiveError::from_io(path, e))?;
        log::trace!("Opened archive reader for {:?}", full);
        Ok(Box::new(DiskReader {
            file: BufReader::new(file),
            position: 0,
            size: metadata.len(),
        }))
    }
}

/// Buffered reader over one file on disk
pub struct DiskReader {
    file: BufReader<File>,
    position: u64,
    size: u64,
}

impl ArchiveReader for DiskReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        self.position = self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.size
    }
}
