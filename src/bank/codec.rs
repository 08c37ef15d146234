//! Codec interface for bank sessions
//!
//! A codec owns the [`BankStream`] it decodes from and produces 16-bit
//! little-endian interleaved PCM. The payload's leading bytes decide which
//! codec is used.

use std::io::{Read, Seek, SeekFrom};

use super::error::{DecodeFault, OpenError};
use super::range::BankStream;
use super::vorbis::VorbisCodec;
use super::wave::WaveCodec;
use crate::config::BankOptions;

/// Bytes per channel sample in decoded output
pub const BYTES_PER_SAMPLE: u64 = 2;

const SNIFF_LEN: usize = 12;

/// Streaming decoder over one bank payload
pub trait BankCodec: Send {
    /// Returns the codec name (e.g., "Ogg Vorbis")
    fn name(&self) -> &'static str;

    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Total PCM frames in the stream
    fn total_frames(&self) -> u64;

    /// Decode into `dst`, returning the number of bytes written.
    ///
    /// `Ok(0)` means end of stream.
    fn decode(&mut self, dst: &mut [u8]) -> Result<usize, DecodeFault>;

    /// Reposition so the next decoded byte belongs to `frame`
    fn seek_frame(&mut self, frame: u64) -> Result<(), DecodeFault>;

    /// Tear down the decoder state and hand back its stream, if it still has one
    fn into_stream(self: Box<Self>) -> Option<BankStream>;
}

/// Container formats recognised from a payload's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankFormat {
    OggVorbis,
    Wave,
}

impl BankFormat {
    /// Identify a payload from its first bytes
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.starts_with(b"OggS") {
            Some(BankFormat::OggVorbis)
        } else if head.len() >= SNIFF_LEN && &head[0..4] == b"RIFF" && &head[8..12] == b"WAVE" {
            Some(BankFormat::Wave)
        } else {
            None
        }
    }
}

/// Sniff the payload format and open the matching codec.
///
/// The stream is released on every failure path.
pub fn open_codec(
    mut stream: BankStream,
    options: &BankOptions,
) -> Result<Box<dyn BankCodec>, OpenError> {
    let format = match sniff_stream(&mut stream) {
        Ok(Some(format)) => format,
        Ok(None) => {
            stream.close();
            return Err(OpenError::NotRecognizedFormat);
        }
        Err(e) => {
            stream.close();
            return Err(OpenError::ReadFault(e.to_string()));
        }
    };

    log::debug!("Opening {:?} bank payload ({} bytes)", format, stream.len());
    match format {
        BankFormat::OggVorbis => {
            VorbisCodec::open(stream, options).map(|c| Box::new(c) as Box<dyn BankCodec>)
        }
        BankFormat::Wave => WaveCodec::open(stream).map(|c| Box::new(c) as Box<dyn BankCodec>),
    }
}

fn sniff_stream(stream: &mut BankStream) -> std::io::Result<Option<BankFormat>> {
    let mut head = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < head.len() {
        let n = stream.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    stream.seek(SeekFrom::Start(0))?;
    Ok(BankFormat::sniff(&head[..filled]))
}

/// Decoded PCM waiting to be handed out
#[derive(Debug, Default)]
pub(crate) struct PcmQueue {
    bytes: Vec<u8>,
    pos: usize,
}

impl PcmQueue {
    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.pos = 0;
    }

    /// Replace the contents with little-endian encoded samples
    pub fn fill_i16(&mut self, samples: &[i16]) {
        self.clear();
        self.bytes.reserve(samples.len() * 2);
        for sample in samples {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    /// Replace the contents with 8-bit unsigned samples widened to 16-bit
    pub fn fill_u8(&mut self, samples: &[u8]) {
        self.clear();
        self.bytes.reserve(samples.len() * 2);
        for &sample in samples {
            let wide = ((sample as i16) - 128) << 8;
            self.bytes.extend_from_slice(&wide.to_le_bytes());
        }
    }

    /// Replace the contents with bytes that are already 16-bit little-endian
    pub fn fill_le_bytes(&mut self, bytes: &[u8]) {
        self.clear();
        self.bytes.extend_from_slice(bytes);
    }

    /// Copy as many queued bytes as fit into `dst`
    pub fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.bytes.len() - self.pos);
        dst[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Drop up to `n` queued bytes
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.bytes.len() - self.pos);
        self.pos += n;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::range::MemoryRangeReader;
    use std::sync::Arc;

    fn stream_of(data: &[u8]) -> BankStream {
        BankStream::new(Box::new(MemoryRangeReader::whole(Arc::from(data))))
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(BankFormat::sniff(b"OggS\0\x02"), Some(BankFormat::OggVorbis));
        assert_eq!(
            BankFormat::sniff(b"RIFF\x24\0\0\0WAVEfmt "),
            Some(BankFormat::Wave)
        );
        assert_eq!(BankFormat::sniff(b"RIFF\x24\0\0\0AVI "), None);
        assert_eq!(BankFormat::sniff(b"ID3\x03"), None);
        assert_eq!(BankFormat::sniff(b""), None);
    }

    #[test]
    fn test_open_codec_unrecognized() {
        let result = open_codec(stream_of(b"definitely not audio"), &BankOptions::default());
        assert!(matches!(result, Err(OpenError::NotRecognizedFormat)));
    }

    #[test]
    fn test_open_codec_too_short() {
        let result = open_codec(stream_of(b"Og"), &BankOptions::default());
        assert!(matches!(result, Err(OpenError::NotRecognizedFormat)));
    }

    #[test]
    fn test_pcm_queue_drain_and_skip() {
        let mut queue = PcmQueue::default();
        queue.fill_i16(&[1, -1, 0x0102]);
        assert!(!queue.is_empty());

        let mut out = [0u8; 3];
        assert_eq!(queue.drain_into(&mut out), 3);
        assert_eq!(out, [0x01, 0x00, 0xFF]);
        assert_eq!(queue.skip(1), 1);

        let mut rest = [0u8; 8];
        assert_eq!(queue.drain_into(&mut rest), 2);
        assert_eq!(&rest[..2], &[0x02, 0x01]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pcm_queue_widen_u8() {
        let mut queue = PcmQueue::default();
        queue.fill_u8(&[128, 255, 0]);
        let mut out = [0u8; 6];
        assert_eq!(queue.drain_into(&mut out), 6);
        assert_eq!(i16::from_le_bytes([out[0], out[1]]), 0);
        assert_eq!(i16::from_le_bytes([out[2], out[3]]), 127 << 8);
        assert_eq!(i16::from_le_bytes([out[4], out[5]]), -128 << 8);
    }
}
