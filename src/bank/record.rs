//! Bank records
//!
//! A [`BankRecord`] is the persisted description of one bank: where its
//! compressed payload lives and how long it is. It holds no decode state and
//! can be opened any number of times.
//!
//! Persisted layout inside an asset stream:
//!
//! ```text
//! [u64 LE byte_length][byte_length payload bytes]
//! ```
//!
//! On load only the coordinates are captured; the payload is skipped and
//! opened lazily from the archive.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "editor")]
use std::sync::Arc;

use super::error::OpenError;
#[cfg(feature = "editor")]
use super::range::MemoryRangeReader;
use super::range::RangeDescriptor;
use super::session::{BankMetadata, DecodeSession};
use crate::archive::Archive;
#[cfg(feature = "editor")]
use crate::archive::ArchiveError;
use crate::config::BankOptions;

/// Process-unique identity of a bank record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BankId(u64);

impl BankId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BankId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct BankRecord {
    id: BankId,
    archive_path: PathBuf,
    /// Absolute offset of the payload; None until loaded or ingested
    byte_offset: Option<u64>,
    byte_length: u64,
    #[cfg(feature = "editor")]
    raw_bytes: Option<Arc<[u8]>>,
}

impl Default for BankRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl BankRecord {
    /// An empty record with no payload
    pub fn new() -> Self {
        Self {
            id: BankId::next(),
            archive_path: PathBuf::new(),
            byte_offset: None,
            byte_length: 0,
            #[cfg(feature = "editor")]
            raw_bytes: None,
        }
    }

    pub fn id(&self) -> BankId {
        self.id
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn byte_offset(&self) -> Option<u64> {
        self.byte_offset
    }

    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    pub fn is_empty(&self) -> bool {
        self.byte_length == 0
    }

    /// Payload bytes held in memory by authoring tools
    #[cfg(feature = "editor")]
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        self.raw_bytes.as_deref()
    }

    /// Load the record from an asset stream read out of `archive_path`.
    ///
    /// The stream is left just past the payload.
    pub fn deserialize<R: Read + Seek>(&mut self, stream: &mut R, archive_path: &Path) -> io::Result<()> {
        let mut length = [0u8; 8];
        stream.read_exact(&mut length)?;
        self.byte_length = u64::from_le_bytes(length);

        #[cfg(feature = "editor")]
        {
            self.raw_bytes = None;
        }

        if self.byte_length > 0 {
            let offset = stream.stream_position()?;
            let end = offset.checked_add(self.byte_length).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bank length {} overflows the stream", self.byte_length),
                )
            })?;
            self.byte_offset = Some(offset);
            self.archive_path = archive_path.to_path_buf();
            stream.seek(SeekFrom::Start(end))?;
        }
        Ok(())
    }

    /// Write the record to an asset stream.
    ///
    /// Authoring builds embed the payload; runtime builds only write the length.
    pub fn serialize<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.byte_length.to_le_bytes())?;

        #[cfg(feature = "editor")]
        {
            if self.byte_length > 0 {
                let raw = self.raw_bytes.as_deref().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        "bank payload is not resident; ingest the source before saving",
                    )
                })?;
                out.write_all(raw)?;
            }
        }
        Ok(())
    }

    /// Replace the payload with the whole content of a standalone source file
    #[cfg(feature = "editor")]
    pub fn ingest_source_file(&mut self, archive: &dyn Archive, path: &Path) -> Result<(), ArchiveError> {
        let data = crate::archive::read_all(archive, path).map_err(|e| {
            log::warn!("Failed open archive '{}'", path.display());
            e
        })?;

        if data.is_empty() {
            log::warn!("Archive '{}' is empty", path.display());
        }

        self.byte_offset = Some(0);
        self.archive_path = path.to_path_buf();
        self.byte_length = data.len() as u64;
        self.raw_bytes = Some(Arc::from(data));
        Ok(())
    }

    /// Open a decode session, logging and swallowing failures.
    ///
    /// Returns None for empty banks and for banks that failed to open.
    pub fn open_bank(&self, archive: &dyn Archive, options: &BankOptions) -> Option<(DecodeSession, BankMetadata)> {
        match self.try_open_bank(archive, options) {
            Ok(opened) => opened,
            Err(e) => {
                log::warn!("Failed loading bank: {}", e);
                None
            }
        }
    }

    /// Open a decode session.
    ///
    /// Empty banks yield `Ok(None)` without touching the archive.
    ///
    /// # Panics
    /// Panics if the record has a length but was never loaded or ingested.
    pub fn try_open_bank(
        &self,
        archive: &dyn Archive,
        options: &BankOptions,
    ) -> Result<Option<(DecodeSession, BankMetadata)>, OpenError> {
        if self.is_empty() {
            return Ok(None);
        }

        let Some(offset) = self.byte_offset else {
            panic!("bank {:?} opened before its payload offset was resolved", self.id);
        };

        #[cfg(feature = "editor")]
        {
            if let Some(raw) = &self.raw_bytes {
                let range = RangeDescriptor::new(0, self.byte_length);
                let reader = MemoryRangeReader::new(raw.clone(), range);
                return DecodeSession::open(Box::new(reader), options).map(Some);
            }
        }

        let range = RangeDescriptor::from_offset_len(offset, self.byte_length).ok_or_else(|| {
            OpenError::ReadFault(format!(
                "bank range {}+{} overflows",
                offset, self.byte_length
            ))
        })?;
        DecodeSession::open_archive_range(archive, &self.archive_path, range, options).map(Some)
    }
}
