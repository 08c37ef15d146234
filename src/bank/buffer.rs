//! Audio buffer manager and the bank asset
//!
//! Fully decoded buffers are owned by an [`AudioBufferManager`] keyed by
//! [`BankId`]. Banks only look buffers up and release their registration when
//! they are destroyed; they never decode into the cache themselves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::record::{BankId, BankRecord};
use super::session::{BankMetadata, DecodeSession};
use crate::archive::Archive;
use crate::config::BankOptions;

/// Decoded PCM shared between playing sounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pub metadata: BankMetadata,
    pub pcm: Vec<u8>,
}

pub type AudioBufferRef = Arc<AudioBuffer>;

/// Owner of decoded buffers
pub trait AudioBufferManager: Send + Sync {
    fn find(&self, bank: BankId) -> Option<AudioBufferRef>;

    /// Drop any buffer registered for `bank`
    fn remove(&self, bank: BankId);
}

/// Map-backed buffer manager
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: Mutex<HashMap<BankId, AudioBufferRef>>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `buffer` for `bank`, returning the previous one
    pub fn insert(&self, bank: BankId, buffer: AudioBuffer) -> Option<AudioBufferRef> {
        self.buffers.lock().insert(bank, Arc::new(buffer))
    }

    pub fn contains(&self, bank: BankId) -> bool {
        self.buffers.lock().contains_key(&bank)
    }

    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }
}

impl AudioBufferManager for BufferRegistry {
    fn find(&self, bank: BankId) -> Option<AudioBufferRef> {
        self.buffers.lock().get(&bank).cloned()
    }

    fn remove(&self, bank: BankId) {
        if self.buffers.lock().remove(&bank).is_some() {
            log::debug!("Released audio buffer for bank {}", bank.get());
        }
    }
}

/// Audio bank asset: a record plus its link to the buffer manager
pub struct AudioBank {
    record: BankRecord,
    buffers: Arc<dyn AudioBufferManager>,
    audio_buffer: Option<AudioBufferRef>,
}

impl AudioBank {
    pub fn new(buffers: Arc<dyn AudioBufferManager>) -> Self {
        Self::from_record(BankRecord::new(), buffers)
    }

    pub fn from_record(record: BankRecord, buffers: Arc<dyn AudioBufferManager>) -> Self {
        Self {
            record,
            buffers,
            audio_buffer: None,
        }
    }

    pub fn id(&self) -> BankId {
        self.record.id()
    }

    pub fn record(&self) -> &BankRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut BankRecord {
        &mut self.record
    }

    /// See [`BankRecord::open_bank`]
    pub fn open_bank(&self, archive: &dyn Archive, options: &BankOptions) -> Option<(DecodeSession, BankMetadata)> {
        self.record.open_bank(archive, options)
    }

    /// Decoded buffer for this bank, if the manager holds one
    pub fn audio_buffer(&mut self) -> Option<AudioBufferRef> {
        if let Some(buffer) = &self.audio_buffer {
            return Some(buffer.clone());
        }

        self.audio_buffer = self.buffers.find(self.record.id());
        self.audio_buffer.clone()
    }
}

impl Drop for AudioBank {
    fn drop(&mut self) {
        if self.audio_buffer.take().is_some() {
            self.buffers.remove(self.record.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::session::SampleFormat;

    fn buffer() -> AudioBuffer {
        AudioBuffer {
            metadata: BankMetadata {
                num_channels: 1,
                format: SampleFormat::Mono16,
                rate: 8000,
                num_samples: 4,
            },
            pcm: vec![0, 1, 2, 3],
        }
    }

    #[test]
    fn test_registry_insert_find_remove() {
        let registry = BufferRegistry::new();
        let bank = BankRecord::new().id();
        assert!(registry.find(bank).is_none());

        registry.insert(bank, buffer());
        assert!(registry.contains(bank));
        assert_eq!(registry.find(bank).unwrap().pcm, vec![0, 1, 2, 3]);

        registry.remove(bank);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_audio_buffer_lookup_is_cached() {
        let registry = Arc::new(BufferRegistry::new());
        let mut bank = AudioBank::new(registry.clone());
        assert!(bank.audio_buffer().is_none());

        registry.insert(bank.id(), buffer());
        let first = bank.audio_buffer().unwrap();
        let second = bank.audio_buffer().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_drop_releases_registration() {
        let registry = Arc::new(BufferRegistry::new());
        let mut bank = AudioBank::new(registry.clone());
        registry.insert(bank.id(), buffer());
        bank.audio_buffer();

        drop(bank);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drop_without_lookup_leaves_registry() {
        let registry = Arc::new(BufferRegistry::new());
        let bank = AudioBank::new(registry.clone());
        registry.insert(bank.id(), buffer());

        drop(bank);
        assert_eq!(registry.len(), 1);
    }
}
