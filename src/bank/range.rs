//! Range-limited readers
//!
//! A bank's compressed payload sits somewhere inside a larger archive. The
//! codecs want a private, seekable stream that starts at byte 0 and ends where
//! the payload ends, so every reader here exposes a sub-range `[begin, end)`
//! of its backing store as if it were a standalone file:
//!
//! - reads never move the backing position past `end`
//! - seeks are clamped into `[begin, end]` and report whether they were
//! - `tell` is relative to `begin`

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::archive::ArchiveReader;

/// Origin of a [`BankIo::seek`] request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Offset from the start of the range
    Start,
    /// Offset added to the current position
    Current,
    /// Offset back from the end of the range (`end - offset`)
    End,
}

/// Outcome of a seek. The position is moved in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    /// The requested position was inside the range
    Landed,
    /// The request fell outside the range and was clamped to its nearest edge
    Clamped,
}

/// Absolute byte range of a payload inside its backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeDescriptor {
    pub begin: u64,
    pub end: u64,
}

impl RangeDescriptor {
    pub fn new(begin: u64, end: u64) -> Self {
        assert!(end >= begin, "range end {} before begin {}", end, begin);
        Self { begin, end }
    }

    /// None if `offset + len` overflows
    pub fn from_offset_len(offset: u64, len: u64) -> Option<Self> {
        offset.checked_add(len).map(|end| Self { begin: offset, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Number of bytes a read of `requested` bytes may transfer at absolute `position`
    fn clamp_read(&self, position: u64, requested: usize) -> usize {
        let remaining = self.end.saturating_sub(position);
        (requested as u64).min(remaining) as usize
    }

    /// Absolute target of a seek, clamped into `[begin, end]`
    fn clamp_seek(&self, position: u64, target: i64, origin: SeekOrigin) -> (u64, SeekStatus) {
        let candidate = match origin {
            SeekOrigin::Current => position as i128 + target as i128,
            SeekOrigin::End => self.end as i128 - target as i128,
            SeekOrigin::Start => self.begin as i128 + target as i128,
        };

        if candidate < self.begin as i128 {
            (self.begin, SeekStatus::Clamped)
        } else if candidate > self.end as i128 {
            (self.end, SeekStatus::Clamped)
        } else {
            (candidate as u64, SeekStatus::Landed)
        }
    }
}

/// Virtual I/O consumed by the codecs.
///
/// Coordinates are relative to the start of the payload.
pub trait BankIo: Send {
    /// Read up to `dst.len()` bytes without crossing the end of the range
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize>;

    /// Best-effort seek; the clamped position is applied even when `Clamped`
    fn seek(&mut self, target: i64, origin: SeekOrigin) -> io::Result<SeekStatus>;

    /// Position relative to the start of the range
    fn tell(&self) -> u64;

    /// Length of the range in bytes
    fn len(&self) -> u64;

    /// Release the backing reader
    fn close(self: Box<Self>);
}

/// Exposes `[begin, end)` of an archive reader
pub struct RangeLimitedReader {
    reader: Box<dyn ArchiveReader>,
    range: RangeDescriptor,
}

impl RangeLimitedReader {
    /// Take exclusive ownership of `reader` and position it at `range.begin`
    pub fn bind(mut reader: Box<dyn ArchiveReader>, range: RangeDescriptor) -> io::Result<Self> {
        reader.seek(range.begin)?;
        Ok(Self { reader, range })
    }

    pub fn range(&self) -> RangeDescriptor {
        self.range
    }

    /// Absolute position in the archive
    pub fn absolute_position(&self) -> u64 {
        self.reader.tell()
    }
}

impl BankIo for RangeLimitedReader {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let size = self.range.clamp_read(self.reader.tell(), dst.len());
        if size == 0 {
            return Ok(0);
        }
        self.reader.read(&mut dst[..size])
    }

    fn seek(&mut self, target: i64, origin: SeekOrigin) -> io::Result<SeekStatus> {
        let (position, status) = self.range.clamp_seek(self.reader.tell(), target, origin);
        if status == SeekStatus::Clamped {
            log::trace!(
                "Clamped bank seek ({:?} {}) to {} in [{}, {}]",
                origin,
                target,
                position,
                self.range.begin,
                self.range.end
            );
        }
        self.reader.seek(position)?;
        Ok(status)
    }

    fn tell(&self) -> u64 {
        self.reader.tell() - self.range.begin
    }

    fn len(&self) -> u64 {
        self.range.len()
    }

    fn close(self: Box<Self>) {
        log::trace!(
            "Closing range reader [{}, {})",
            self.range.begin,
            self.range.end
        );
        drop(self.reader);
    }
}

/// Exposes `[begin, end)` of a buffer already held in memory
#[derive(Debug, Clone)]
pub struct MemoryRangeReader {
    data: Arc<[u8]>,
    range: RangeDescriptor,
    position: u64,
}

impl MemoryRangeReader {
    /// `range` is clipped to the buffer length
    pub fn new(data: Arc<[u8]>, range: RangeDescriptor) -> Self {
        let len = data.len() as u64;
        let range = RangeDescriptor::new(range.begin.min(len), range.end.min(len));
        Self {
            data,
            position: range.begin,
            range,
        }
    }

    /// The whole buffer as the range
    pub fn whole(data: Arc<[u8]>) -> Self {
        let len = data.len() as u64;
        Self::new(data, RangeDescriptor::new(0, len))
    }
}

impl BankIo for MemoryRangeReader {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let size = self.range.clamp_read(self.position, dst.len());
        let start = self.position as usize;
        dst[..size].copy_from_slice(&self.data[start..start + size]);
        self.position += size as u64;
        Ok(size)
    }

    fn seek(&mut self, target: i64, origin: SeekOrigin) -> io::Result<SeekStatus> {
        let (position, status) = self.range.clamp_seek(self.position, target, origin);
        self.position = position;
        Ok(status)
    }

    fn tell(&self) -> u64 {
        self.position - self.range.begin
    }

    fn len(&self) -> u64 {
        self.range.len()
    }

    fn close(self: Box<Self>) {}
}

/// `Read + Seek` view of a [`BankIo`], as handed to the codecs.
///
/// A clamped seek surfaces as an `InvalidInput` error after the clamped
/// position has been applied.
pub struct BankStream {
    io: Box<dyn BankIo>,
}

impl BankStream {
    pub fn new(io: Box<dyn BankIo>) -> Self {
        Self { io }
    }

    /// Length of the underlying range
    pub fn len(&self) -> u64 {
        self.io.len()
    }

    pub fn is_empty(&self) -> bool {
        self.io.len() == 0
    }

    pub fn close(self) {
        self.io.close();
    }
}

impl Read for BankStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.io.read(buf)
    }
}

impl Seek for BankStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let status = match pos {
            SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset).unwrap_or(i64::MAX);
                self.io.seek(offset, SeekOrigin::Start)?
            }
            SeekFrom::Current(offset) => self.io.seek(offset, SeekOrigin::Current)?,
            SeekFrom::End(offset) => self.io.seek(offset.saturating_neg(), SeekOrigin::End)?,
        };

        match status {
            SeekStatus::Landed => Ok(self.io.tell()),
            SeekStatus::Clamped => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek outside of bank range",
            )),
        }
    }
}
