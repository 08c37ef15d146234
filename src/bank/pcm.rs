//! PCM streaming and seeking on an open session
//!
//! Counts and offsets are bytes of 16-bit interleaved PCM, the unit of
//! `BankMetadata::num_samples`.

use std::io::Write;

use super::error::DecodeFault;
use super::session::DecodeSession;

impl DecodeSession {
    /// Fill `dst[..max_samples]` with decoded PCM.
    ///
    /// Returns `max_samples` when the request was satisfied and 0 when the
    /// stream ended first. A short tail is discarded rather than reported,
    /// so a return of 0 while more was expected marks end of stream.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than `max_samples`, or if the codec reports
    /// a fault mid-stream: a bank that opened cleanly and then fails to
    /// decode is corrupt.
    pub fn read_pcm(&mut self, dst: &mut [u8], max_samples: u64) -> u64 {
        match self.try_read_pcm(dst, max_samples) {
            Ok(size) => size,
            Err(fault) => {
                log::error!("Failed read from bank: {}", fault);
                panic!("Failed read from bank: {}", fault);
            }
        }
    }

    /// [`read_pcm`](Self::read_pcm) with the mid-stream fault returned instead
    pub fn try_read_pcm(&mut self, dst: &mut [u8], max_samples: u64) -> Result<u64, DecodeFault> {
        assert!(
            max_samples <= dst.len() as u64,
            "destination holds {} bytes, {} requested",
            dst.len(),
            max_samples
        );
        let max = max_samples as usize;

        // Stop only on error or end of stream
        let mut size = 0;
        while size < max {
            let read = self.codec.decode(&mut dst[size..max])?;
            if read == 0 {
                size = 0;
                break;
            }
            size += read;
            self.sample_offset += read as u64;
        }

        Ok(size as u64)
    }

    /// Move the PCM cursor to `sample_offset`.
    ///
    /// The cursor is set even if the codec could not land exactly.
    pub fn seek_pcm(&mut self, sample_offset: u64) {
        let frame = match self.metadata.block_align() {
            0 => 0,
            align => sample_offset / align,
        };
        if let Err(fault) = self.codec.seek_frame(frame) {
            log::warn!("Bank seek to frame {} failed: {}", frame, fault);
        }
        self.sample_offset = sample_offset;
    }

    /// Current PCM cursor
    pub fn pcm_offset(&self) -> u64 {
        self.sample_offset
    }

    /// Stream the rest of the bank into `out`, `chunk` bytes per read.
    ///
    /// `chunk` is rounded down to whole frames. A session that does not know
    /// its length (`num_samples == 0`) reads until the codec runs dry.
    /// Returns the number of bytes written.
    pub fn copy_pcm_to<W: Write>(&mut self, out: &mut W, chunk: u64) -> Result<u64, DecodeFault> {
        let align = self.metadata.block_align().max(1);
        let chunk = (chunk / align).max(1) * align;
        let total = self.metadata.num_samples;

        let mut buf = vec![0u8; chunk as usize];
        let mut written = 0u64;
        loop {
            let request = match total {
                0 => chunk,
                total => match total.saturating_sub(self.sample_offset) {
                    0 => break,
                    remaining => remaining.min(chunk),
                },
            };

            let read = self.try_read_pcm(&mut buf, request)?;
            if read == 0 {
                break;
            }
            out.write_all(&buf[..read as usize])?;
            written += read;
        }

        Ok(written)
    }
}
