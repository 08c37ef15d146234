//! Streaming decode of audio banks embedded in archives
//!
//! # Architecture
//!
//! - [`BankRecord`] describes where a bank's payload lives
//! - [`RangeLimitedReader`] exposes that payload's byte range as a private stream
//! - [`BankCodec`] implementations decode the stream (Ogg Vorbis, WAV)
//! - [`DecodeSession`] ties a codec to a PCM cursor for reading and seeking
//! - [`AudioBank`] links a record to the decoded-buffer manager

pub mod buffer;
pub mod codec;
pub mod error;
pub mod pcm;
pub mod range;
pub mod record;
pub mod session;
pub mod vorbis;
pub mod wave;

pub use buffer::{AudioBank, AudioBuffer, AudioBufferManager, AudioBufferRef, BufferRegistry};
pub use codec::{BankCodec, BankFormat};
pub use error::{DecodeFault, OpenError};
pub use range::{
    BankIo, BankStream, MemoryRangeReader, RangeDescriptor, RangeLimitedReader, SeekOrigin,
    SeekStatus,
};
pub use record::{BankId, BankRecord};
pub use session::{BankMetadata, DecodeSession, SampleFormat};
pub use vorbis::VorbisCodec;
pub use wave::WaveCodec;
