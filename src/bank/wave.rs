//! WAV codec
//!
//! Streams RIFF WAVE PCM payloads. Supports:
//! - 8-bit and 16-bit PCM (8-bit is widened to 16-bit on output)
//! - Any channel count the session accepts
//! - Any sample rate
//!
//! Only the headers are parsed at open; sample data is read from the bank
//! range on demand.

use std::io::{self, Read, Seek, SeekFrom};

use super::codec::{BankCodec, PcmQueue};
use super::error::{DecodeFault, OpenError};
use super::range::BankStream;

// WAV format constants (little-endian IDs)
const RIFF_ID: u32 = 0x46464952; // "RIFF"
const WAVE_ID: u32 = 0x45564157; // "WAVE"
const FMT_ID: u32 = 0x20746d66; // "fmt "
const DATA_ID: u32 = 0x61746164; // "data"

// WAV format codes
const WAVE_FORMAT_PCM: u16 = 1;

/// Source bytes decoded per refill
const CHUNK_LEN: u64 = 4096;

/// WAV format chunk
#[derive(Debug, Default, Clone, Copy)]
struct WavFormatHeader {
    channels: u16,        // 1 = mono, 2 = stereo
    sample_rate: u32,     // Samples per second
    block_align: u16,     // bytes per sample frame
    bits_per_sample: u16, // 8 or 16
}

/// Running out of range bytes means a truncated header; anything else is a media fault
fn header_error(err: io::Error, what: &str) -> OpenError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidInput => {
            OpenError::MalformedHeader(format!("Failed to {}: {}", what, err))
        }
        _ => OpenError::ReadFault(err.to_string()),
    }
}

fn read_le_u16(stream: &mut BankStream) -> Result<u16, OpenError> {
    let mut buf = [0u8; 2];
    stream
        .read_exact(&mut buf)
        .map_err(|e| header_error(e, "read u16"))?;
    Ok(u16::from_le_bytes(buf))
}

fn read_le_u32(stream: &mut BankStream) -> Result<u32, OpenError> {
    let mut buf = [0u8; 4];
    stream
        .read_exact(&mut buf)
        .map_err(|e| header_error(e, "read u32"))?;
    Ok(u32::from_le_bytes(buf))
}

fn skip(stream: &mut BankStream, len: u64) -> Result<(), OpenError> {
    stream
        .seek(SeekFrom::Current(len as i64))
        .map(|_| ())
        .map_err(|e| header_error(e, "skip chunk"))
}

fn parse_format_header(stream: &mut BankStream, size: u32) -> Result<WavFormatHeader, OpenError> {
    if size < 16 {
        return Err(OpenError::MalformedHeader(
            "Format chunk too small".to_string(),
        ));
    }

    let format = read_le_u16(stream)?;
    let channels = read_le_u16(stream)?;
    let sample_rate = read_le_u32(stream)?;
    let _byte_rate = read_le_u32(stream)?;
    let block_align = read_le_u16(stream)?;
    let bits_per_sample = read_le_u16(stream)?;

    // Skip any extra format bytes, keeping word alignment
    let extra = (size - 16) as u64 + (size & 1) as u64;
    if extra > 0 {
        skip(stream, extra)?;
    }

    if format != WAVE_FORMAT_PCM {
        return Err(OpenError::MalformedHeader(format!(
            "Unsupported WAV format: {} (only PCM supported)",
            format
        )));
    }

    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(OpenError::MalformedHeader(format!(
            "Unsupported bits per sample: {}",
            bits_per_sample
        )));
    }

    if channels == 0 || block_align as u32 != channels as u32 * (bits_per_sample as u32 / 8) {
        return Err(OpenError::MalformedHeader(format!(
            "Inconsistent block alignment {} for {} channels",
            block_align, channels
        )));
    }

    Ok(WavFormatHeader {
        channels,
        sample_rate,
        block_align,
        bits_per_sample,
    })
}

/// WAV decoder
pub struct WaveCodec {
    stream: BankStream,
    header: WavFormatHeader,
    /// Offset of the first sample byte within the range
    data_start: u64,
    /// Whole frames' worth of sample bytes
    data_len: u64,
    /// Sample bytes consumed from the data chunk
    data_pos: u64,
    queue: PcmQueue,
    scratch: Vec<u8>,
}

impl WaveCodec {
    pub fn open(mut stream: BankStream) -> Result<Self, OpenError> {
        let id = read_le_u32(&mut stream)?;
        let _size = read_le_u32(&mut stream)?;
        let format = read_le_u32(&mut stream)?;
        if id != RIFF_ID || format != WAVE_ID {
            return Err(OpenError::NotRecognizedFormat);
        }

        // Find and parse chunks
        let mut header = None;
        let (data_start, declared_len) = loop {
            let chunk_id = read_le_u32(&mut stream)?;
            let chunk_size = read_le_u32(&mut stream)?;

            match chunk_id {
                FMT_ID => header = Some(parse_format_header(&mut stream, chunk_size)?),
                DATA_ID => {
                    let position = stream
                        .stream_position()
                        .map_err(|e| OpenError::ReadFault(e.to_string()))?;
                    break (position, chunk_size as u64);
                }
                // Skip unknown chunk
                _ => skip(&mut stream, chunk_size as u64 + (chunk_size & 1) as u64)?,
            }
        };

        let header =
            header.ok_or_else(|| OpenError::MalformedHeader("No format chunk found".to_string()))?;

        let available = stream.len().saturating_sub(data_start);
        if declared_len > available {
            log::warn!(
                "WAV data chunk declares {} bytes but only {} are present",
                declared_len,
                available
            );
        }
        let block = header.block_align as u64;
        let data_len = declared_len.min(available) / block * block;

        Ok(Self {
            stream,
            header,
            data_start,
            data_len,
            data_pos: 0,
            queue: PcmQueue::default(),
            scratch: Vec::new(),
        })
    }

    fn refill(&mut self) -> Result<bool, DecodeFault> {
        let remaining = self.data_len - self.data_pos;
        if remaining == 0 {
            return Ok(false);
        }

        let block = self.header.block_align as u64;
        let len = remaining.min((CHUNK_LEN / block).max(1) * block) as usize;
        self.scratch.resize(len, 0);
        self.stream.read_exact(&mut self.scratch)?;
        self.data_pos += len as u64;

        if self.header.bits_per_sample == 8 {
            self.queue.fill_u8(&self.scratch);
        } else {
            self.queue.fill_le_bytes(&self.scratch);
        }
        Ok(true)
    }
}

impl BankCodec for WaveCodec {
    fn name(&self) -> &'static str {
        "Wave"
    }

    fn channels(&self) -> u16 {
        self.header.channels
    }

    fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    fn total_frames(&self) -> u64 {
        self.data_len / self.header.block_align as u64
    }

    fn decode(&mut self, dst: &mut [u8]) -> Result<usize, DecodeFault> {
        let mut written = 0;
        while written < dst.len() {
            if self.queue.is_empty() {
                if !self.refill()? {
                    break;
                }
                continue;
            }
            written += self.queue.drain_into(&mut dst[written..]);
        }
        Ok(written)
    }

    fn seek_frame(&mut self, frame: u64) -> Result<(), DecodeFault> {
        let frame = frame.min(self.total_frames());
        self.data_pos = frame * self.header.block_align as u64;
        self.queue.clear();
        self.stream
            .seek(SeekFrom::Start(self.data_start + self.data_pos))?;
        Ok(())
    }

    fn into_stream(self: Box<Self>) -> Option<BankStream> {
        Some(self.stream)
    }
}
