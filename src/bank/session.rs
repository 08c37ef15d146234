//! Decode sessions
//!
//! A [`DecodeSession`] is the live decoding context for one bank: it owns the
//! range reader (inside the codec) and the PCM cursor. It is not `Clone`, and
//! [`DecodeSession::close`] consumes it, so a session is closed exactly once.
//! Dropping a session without calling `close` releases the same resources.

use std::path::Path;
use std::time::Duration;

use super::codec::{open_codec, BankCodec, BYTES_PER_SAMPLE};
use super::error::OpenError;
use super::range::{BankIo, BankStream, RangeDescriptor, RangeLimitedReader};
use crate::archive::Archive;
use crate::config::BankOptions;

/// Output sample layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit mono (2 bytes per frame)
    Mono16,
    /// 16-bit stereo (4 bytes per frame)
    Stereo16,
}

impl SampleFormat {
    /// Format tag for an accepted channel count (1 or 2)
    pub fn from_channels(channels: u16) -> Self {
        if channels == 1 {
            SampleFormat::Mono16
        } else {
            SampleFormat::Stereo16
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            SampleFormat::Mono16 => 1,
            SampleFormat::Stereo16 => 2,
        }
    }

    pub fn bytes_per_frame(&self) -> u64 {
        self.channels() as u64 * BYTES_PER_SAMPLE
    }
}

/// Stream properties reported when a bank is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankMetadata {
    pub num_channels: u16,
    pub format: SampleFormat,
    /// Sample rate in Hz
    pub rate: u32,
    /// Total decodable PCM, `frames * channels * 2`
    pub num_samples: u64,
}

impl BankMetadata {
    fn from_codec(codec: &dyn BankCodec) -> Self {
        let num_channels = codec.channels();
        Self {
            num_channels,
            format: SampleFormat::from_channels(num_channels),
            rate: codec.sample_rate(),
            num_samples: codec.total_frames() * num_channels as u64 * BYTES_PER_SAMPLE,
        }
    }

    /// Bytes per interleaved frame
    pub fn block_align(&self) -> u64 {
        self.num_channels as u64 * BYTES_PER_SAMPLE
    }

    pub fn total_frames(&self) -> u64 {
        match self.block_align() {
            0 => 0,
            align => self.num_samples / align,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_frames() as f64 / self.rate as f64)
    }
}

/// Open decoding context for one bank
pub struct DecodeSession {
    pub(super) codec: Box<dyn BankCodec>,
    pub(super) metadata: BankMetadata,
    /// PCM cursor, in the same unit as `BankMetadata::num_samples`
    pub(super) sample_offset: u64,
}

impl DecodeSession {
    /// Open a codec over `io` and validate the stream.
    ///
    /// `io` is released before returning on every failure path.
    pub fn open(
        io: Box<dyn BankIo>,
        options: &BankOptions,
    ) -> Result<(Self, BankMetadata), OpenError> {
        let codec = open_codec(BankStream::new(io), options)?;
        Self::from_codec(codec)
    }

    /// Open `range` of the archive file at `path` with a fresh, exclusive reader
    pub fn open_archive_range(
        archive: &dyn Archive,
        path: &Path,
        range: RangeDescriptor,
        options: &BankOptions,
    ) -> Result<(Self, BankMetadata), OpenError> {
        let reader = archive.open_reader(path).map_err(|e| {
            log::debug!("Archive reader unavailable: {}", e);
            OpenError::SourceNotFound {
                path: path.to_path_buf(),
            }
        })?;

        let reader = RangeLimitedReader::bind(reader, range)
            .map_err(|e| OpenError::ReadFault(e.to_string()))?;
        Self::open(Box::new(reader), options)
    }

    /// Accept a codec whose headers parsed, rejecting unsupported channel layouts
    pub(crate) fn from_codec(codec: Box<dyn BankCodec>) -> Result<(Self, BankMetadata), OpenError> {
        let channels = codec.channels();
        if !(1..=2).contains(&channels) {
            let err = OpenError::MalformedHeader(format!("unsupported channel count {}", channels));
            Self::release(codec);
            return Err(err);
        }

        let metadata = BankMetadata::from_codec(codec.as_ref());
        log::debug!(
            "Opened {} bank: {} channel(s), {} Hz, {} PCM bytes",
            codec.name(),
            metadata.num_channels,
            metadata.rate,
            metadata.num_samples
        );

        let session = Self {
            codec,
            metadata,
            sample_offset: 0,
        };
        Ok((session, metadata))
    }

    pub fn metadata(&self) -> &BankMetadata {
        &self.metadata
    }

    /// Name of the codec decoding this session
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Release the codec state, then the reader
    pub fn close(self) {
        log::debug!("Closing {} bank session", self.codec.name());
        Self::release(self.codec);
    }

    fn release(codec: Box<dyn BankCodec>) {
        if let Some(stream) = codec.into_stream() {
            stream.close();
        }
    }
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("codec", &self.codec.name())
            .field("metadata", &self.metadata)
            .field("sample_offset", &self.sample_offset)
            .finish()
    }
}
