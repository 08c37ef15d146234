//! Ogg Vorbis codec
//!
//! Uses the `lewton` crate for pure Rust Ogg Vorbis decoding. lewton has no
//! notion of a total sample count, so the final page's granule position is
//! read from the tail of the range before the headers are parsed.

use std::io::{Read, Seek, SeekFrom};

use lewton::header::HeaderReadError;
use lewton::inside_ogg::OggStreamReader;
use lewton::VorbisError;

use super::codec::{BankCodec, PcmQueue, BYTES_PER_SAMPLE};
use super::error::{DecodeFault, OpenError};
use super::range::BankStream;
use crate::config::BankOptions;

/// Ogg page header length up to and including the segment count
const PAGE_HEADER_LEN: usize = 27;

/// Find the granule position of the last page within the final `window` bytes.
///
/// Leaves the stream at its start.
fn last_granule_position<R: Read + Seek>(data: &mut R, window: u64) -> std::io::Result<Option<u64>> {
    let len = data.seek(SeekFrom::End(0))?;
    let search_size = window.min(len);
    data.seek(SeekFrom::Start(len - search_size))?;

    let mut buffer = vec![0u8; search_size as usize];
    data.read_exact(&mut buffer)?;
    data.seek(SeekFrom::Start(0))?;

    // Search backwards for the last "OggS" marker with a usable granule
    for i in (0..buffer.len().saturating_sub(PAGE_HEADER_LEN - 1)).rev() {
        if !buffer[i..].starts_with(b"OggS") || buffer[i + 4] != 0 {
            continue;
        }

        let mut granule = [0u8; 8];
        granule.copy_from_slice(&buffer[i + 6..i + 14]);
        let granule = u64::from_le_bytes(granule);

        // -1 marks a page on which no packet ends
        if granule != u64::MAX {
            return Ok(Some(granule));
        }
    }

    Ok(None)
}

/// Map a lewton open failure onto the bank error taxonomy
fn open_error(err: VorbisError) -> OpenError {
    match err {
        VorbisError::BadHeader(HeaderReadError::NotVorbisHeader)
        | VorbisError::BadHeader(HeaderReadError::HeaderIsAudio)
        | VorbisError::BadHeader(HeaderReadError::HeaderBadType(_)) => {
            OpenError::NotRecognizedFormat
        }
        VorbisError::BadHeader(HeaderReadError::UnsupportedVorbisVersion) => {
            OpenError::VersionMismatch
        }
        VorbisError::BadHeader(HeaderReadError::BufferNotAddressable) => {
            OpenError::InternalFault("header buffer not addressable".to_string())
        }
        VorbisError::BadHeader(e) => OpenError::MalformedHeader(format!("{:?}", e)),
        VorbisError::BadAudio(e) => OpenError::InternalFault(format!("{:?}", e)),
        VorbisError::OggError(e) => OpenError::MalformedHeader(format!("invalid Ogg page: {:?}", e)),
    }
}

/// Ogg Vorbis decoder using lewton
pub struct VorbisCodec {
    /// None only after a failed rewind
    reader: Option<OggStreamReader<BankStream>>,
    channels: u16,
    sample_rate: u32,
    total_frames: u64,
    /// Decoded samples not yet handed out
    queue: PcmQueue,
    /// Output bytes handed out (or skipped) since the start of the stream
    position: u64,
}

impl VorbisCodec {
    pub fn open(mut stream: BankStream, options: &BankOptions) -> Result<Self, OpenError> {
        let total_frames = match last_granule_position(&mut stream, options.tail_scan_window) {
            Ok(Some(granule)) => granule,
            Ok(None) => {
                log::warn!("No granule position found in the last {} bytes of bank", options.tail_scan_window);
                0
            }
            Err(e) => {
                stream.close();
                return Err(OpenError::ReadFault(e.to_string()));
            }
        };

        // The stream is dropped by lewton on failure
        let reader = OggStreamReader::new(stream).map_err(open_error)?;

        Ok(Self {
            channels: reader.ident_hdr.audio_channels as u16,
            sample_rate: reader.ident_hdr.audio_sample_rate,
            total_frames,
            reader: Some(reader),
            queue: PcmQueue::default(),
            position: 0,
        })
    }

    fn block_align(&self) -> u64 {
        self.channels as u64 * BYTES_PER_SAMPLE
    }

    fn total_bytes(&self) -> u64 {
        self.total_frames * self.block_align()
    }

    /// Decode the next packet into the queue. Returns false at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool, DecodeFault> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| DecodeFault::Corrupt("stream lost after failed rewind".to_string()))?;

        match reader.read_dec_packet_itl() {
            Ok(Some(samples)) => {
                self.queue.fill_i16(&samples);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(DecodeFault::Corrupt(format!("Ogg decode error: {:?}", e))),
        }
    }

    /// Reopen the stream at its first page
    fn rewind(&mut self) -> Result<(), DecodeFault> {
        self.queue.clear();
        self.position = 0;

        let reader = self
            .reader
            .take()
            .ok_or_else(|| DecodeFault::Corrupt("stream lost after failed rewind".to_string()))?;
        let mut stream = reader.into_inner().into_inner();
        stream.seek(SeekFrom::Start(0))?;

        let reader = OggStreamReader::new(stream)
            .map_err(|e| DecodeFault::Corrupt(format!("Failed to rewind: {:?}", e)))?;
        self.reader = Some(reader);
        Ok(())
    }
}

impl BankCodec for VorbisCodec {
    fn name(&self) -> &'static str {
        "Ogg Vorbis"
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn decode(&mut self, dst: &mut [u8]) -> Result<usize, DecodeFault> {
        // Trailing padding in the last packet is cut at the final granule
        let limit = match self.total_bytes() {
            0 => dst.len(),
            total => total.saturating_sub(self.position).min(dst.len() as u64) as usize,
        };

        let mut written = 0;
        while written < limit {
            if self.queue.is_empty() {
                if !self.decode_next_packet()? {
                    break;
                }
                continue;
            }
            written += self.queue.drain_into(&mut dst[written..limit]);
        }

        self.position += written as u64;
        Ok(written)
    }

    fn seek_frame(&mut self, frame: u64) -> Result<(), DecodeFault> {
        let mut target = frame * self.block_align();
        if self.total_bytes() > 0 {
            target = target.min(self.total_bytes());
        }

        if target < self.position {
            self.rewind()?;
        }

        while self.position < target {
            if self.queue.is_empty() {
                if !self.decode_next_packet()? {
                    break;
                }
                continue;
            }
            let skipped = self.queue.skip((target - self.position) as usize);
            self.position += skipped as u64;
        }

        Ok(())
    }

    fn into_stream(self: Box<Self>) -> Option<BankStream> {
        self.reader.map(|reader| reader.into_inner().into_inner())
    }
}
