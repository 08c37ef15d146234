//! Bank session integration tests
//!
//! These open banks stored inside packed archive files and stream them back
//! through the public session API.

use std::io::{self, Cursor, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use audio_bank::archive::{Archive, ArchiveError, ArchiveReader, DiskArchive, MemoryArchive};
use audio_bank::bank::{
    AudioBank, AudioBuffer, AudioBufferManager, BankRecord, BufferRegistry, DecodeSession,
    OpenError, SampleFormat,
};
use audio_bank::config::BankOptions;
use rstest::rstest;

const PACK_PATH: &str = "bank.pak";

/// Archive double that counts readers handed out and released
#[derive(Default)]
struct CountingArchive {
    inner: MemoryArchive,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl CountingArchive {
    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Archive for CountingArchive {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
        let inner = self.inner.open_reader(path)?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingReader {
            inner,
            closes: self.closes.clone(),
        }))
    }
}

struct CountingReader {
    inner: Box<dyn ArchiveReader>,
    closes: Arc<AtomicUsize>,
}

impl ArchiveReader for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        self.inner.seek(position)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

impl Drop for CountingReader {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn ramp_pcm(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn wav_bytes(channels: u16, rate: u32, pcm: &[u8]) -> Vec<u8> {
    let block_align = channels * 2;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&rate.to_le_bytes());
    out.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Pack `payload` between unrelated bytes, as an asset file would hold it
fn pack(payload: &[u8]) -> Vec<u8> {
    let mut out = b"PACKHEAD".to_vec();
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(b"RIFFWAVEOggS trailing asset data");
    out
}

fn load_record(packed: &[u8]) -> BankRecord {
    let mut stream = Cursor::new(packed);
    stream.seek(SeekFrom::Start(8)).unwrap();
    let mut record = BankRecord::new();
    record.deserialize(&mut stream, Path::new(PACK_PATH)).unwrap();
    record
}

fn archive_with(payload: &[u8]) -> (CountingArchive, BankRecord) {
    let packed = pack(payload);
    let archive = CountingArchive::default();
    archive.inner.insert(PACK_PATH, packed.clone());
    (archive, load_record(&packed))
}

fn read_all(session: &mut DecodeSession, chunk: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk as usize];
    loop {
        let read = session.read_pcm(&mut buf, chunk);
        if read == 0 {
            break;
        }
        out.extend_from_slice(&buf[..read as usize]);
    }
    out
}

#[test]
fn test_empty_bank_performs_no_io() {
    let (archive, record) = archive_with(&[]);
    assert!(record.is_empty());

    let opened = record.try_open_bank(&archive, &BankOptions::default()).unwrap();
    assert!(opened.is_none());
    assert_eq!(archive.opens(), 0);
}

#[test]
fn test_unrecognized_payload_releases_reader() {
    let (archive, record) = archive_with(&[0x55u8; 64]);

    let result = record.try_open_bank(&archive, &BankOptions::default());
    assert!(matches!(result, Err(OpenError::NotRecognizedFormat)));
    assert_eq!(archive.opens(), 1);
    assert_eq!(archive.closes(), 1);
}

#[test]
fn test_corrupt_ogg_payload_releases_reader() {
    let mut payload = b"OggS".to_vec();
    payload.extend_from_slice(&[0xA5u8; 200]);
    let (archive, record) = archive_with(&payload);

    assert!(record.try_open_bank(&archive, &BankOptions::default()).is_err());
    assert!(record.open_bank(&archive, &BankOptions::default()).is_none());
    assert_eq!(archive.opens(), 2);
    assert_eq!(archive.closes(), 2);
}

#[test]
fn test_mono_metadata() {
    let (archive, record) = archive_with(&wav_bytes(1, 22050, &ramp_pcm(600)));

    let (session, metadata) = record.open_bank(&archive, &BankOptions::default()).unwrap();
    assert_eq!(metadata.num_channels, 1);
    assert_eq!(metadata.format, SampleFormat::Mono16);
    assert_eq!(metadata.rate, 22050);
    assert_eq!(metadata.num_samples, 300 * 2);
    assert_eq!(session.pcm_offset(), 0);
    session.close();
}

#[test]
fn test_stereo_stream_to_end() {
    let pcm = ramp_pcm(4000);
    let (archive, record) = archive_with(&wav_bytes(2, 44100, &pcm));

    let (mut session, metadata) = record.open_bank(&archive, &BankOptions::default()).unwrap();
    assert_eq!(metadata.format, SampleFormat::Stereo16);
    assert_eq!(metadata.num_samples, 4000);

    let mut buf = vec![0u8; 5000];
    let read = session.read_pcm(&mut buf, 5000);
    assert!(read <= 4000);
    assert_eq!(session.read_pcm(&mut buf, 5000), 0);
    session.close();

    assert_eq!(archive.opens(), archive.closes());
}

#[test]
fn test_exact_read_then_end_of_stream() {
    let pcm = ramp_pcm(4000);
    let (archive, record) = archive_with(&wav_bytes(2, 44100, &pcm));
    let (mut session, _) = record.open_bank(&archive, &BankOptions::default()).unwrap();

    let mut buf = vec![0u8; 4000];
    assert_eq!(session.read_pcm(&mut buf, 4000), 4000);
    assert_eq!(buf, pcm);
    assert_eq!(session.pcm_offset(), 4000);
    assert_eq!(session.read_pcm(&mut buf, 4000), 0);
}

#[test]
fn test_seek_then_read() {
    let pcm = ramp_pcm(4000);
    let (archive, record) = archive_with(&wav_bytes(2, 44100, &pcm));
    let (mut session, _) = record.open_bank(&archive, &BankOptions::default()).unwrap();

    session.seek_pcm(400);
    assert_eq!(session.pcm_offset(), 400);

    let mut buf = [0u8; 8];
    assert_eq!(session.read_pcm(&mut buf, 8), 8);
    assert_eq!(&buf[..], &pcm[400..408]);
    assert_eq!(session.pcm_offset(), 408);

    // Back to the start after reading
    session.seek_pcm(0);
    assert_eq!(session.pcm_offset(), 0);
    assert_eq!(session.read_pcm(&mut buf, 8), 8);
    assert_eq!(&buf[..], &pcm[..8]);
}

#[rstest]
#[case(4)]
#[case(100)]
#[case(400)]
#[case(1000)]
#[case(4000)]
fn test_chunked_reads_cover_whole_stream(#[case] chunk: u64) {
    let pcm = ramp_pcm(4000);
    let (archive, record) = archive_with(&wav_bytes(2, 44100, &pcm));
    let (mut session, metadata) = record.open_bank(&archive, &BankOptions::default()).unwrap();

    let decoded = read_all(&mut session, chunk);
    assert_eq!(decoded.len() as u64, metadata.num_samples);
    assert_eq!(decoded, pcm);
}

#[test]
fn test_concurrent_sessions_on_one_record() {
    let pcm = ramp_pcm(8000);
    let (archive, record) = archive_with(&wav_bytes(2, 44100, &pcm));

    std::thread::scope(|scope| {
        let handles: Vec<_> = [64u64, 500, 2000]
            .into_iter()
            .map(|chunk| {
                let archive = &archive;
                let record = &record;
                scope.spawn(move || {
                    let (mut session, _) = record.open_bank(archive, &BankOptions::default()).unwrap();
                    let decoded = read_all(&mut session, chunk);
                    session.close();
                    decoded
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), pcm);
        }
    });

    assert_eq!(archive.opens(), 3);
    assert_eq!(archive.closes(), 3);
}

#[test]
fn test_interleaved_sessions_keep_separate_cursors() {
    let pcm = ramp_pcm(1000);
    let (archive, record) = archive_with(&wav_bytes(1, 8000, &pcm));
    let options = BankOptions::default();

    let (mut first, _) = record.open_bank(&archive, &options).unwrap();
    let (mut second, _) = record.open_bank(&archive, &options).unwrap();

    let mut buf = [0u8; 10];
    first.read_pcm(&mut buf, 10);
    first.read_pcm(&mut buf, 10);
    second.read_pcm(&mut buf, 10);
    assert_eq!(&buf[..], &pcm[..10]);
    assert_eq!(first.pcm_offset(), 20);
    assert_eq!(second.pcm_offset(), 10);

    drop(first);
    assert_eq!(archive.closes(), 1);
    second.close();
    assert_eq!(archive.closes(), 2);
}

#[test]
fn test_missing_archive_file() {
    let packed = pack(&wav_bytes(1, 8000, &ramp_pcm(16)));
    let record = load_record(&packed);

    let result = record.try_open_bank(&MemoryArchive::new(), &BankOptions::default());
    assert!(matches!(result, Err(OpenError::SourceNotFound { .. })));
}

#[test]
fn test_disk_archive_bank() {
    let dir = tempfile::tempdir().unwrap();
    let pcm = ramp_pcm(2000);
    let packed = pack(&wav_bytes(2, 32000, &pcm));
    std::fs::write(dir.path().join(PACK_PATH), &packed).unwrap();

    let mut file = std::fs::File::open(dir.path().join(PACK_PATH)).unwrap();
    file.seek(SeekFrom::Start(8)).unwrap();
    let mut record = BankRecord::new();
    record.deserialize(&mut file, Path::new(PACK_PATH)).unwrap();

    let archive = DiskArchive::with_root(dir.path());
    let (mut session, metadata) = record.open_bank(&archive, &BankOptions::default()).unwrap();
    assert_eq!(metadata.rate, 32000);
    assert_eq!(read_all(&mut session, 256), pcm);
}

#[cfg(feature = "editor")]
#[test]
fn test_ingested_source_reopens() {
    let pcm = ramp_pcm(400);
    let archive = CountingArchive::default();
    archive.inner.insert("source.wav", wav_bytes(1, 11025, &pcm));

    let mut record = BankRecord::new();
    record.ingest_source_file(&archive, Path::new("source.wav")).unwrap();
    assert_eq!(archive.opens(), 1);

    let (mut session, first) = record.open_bank(&archive, &BankOptions::default()).unwrap();
    assert_eq!(read_all(&mut session, 40), pcm);
    session.close();

    let (session, second) = record.open_bank(&archive, &BankOptions::default()).unwrap();
    assert_eq!(first, second);
    session.close();

    // Resident payloads decode without touching the archive
    assert_eq!(archive.opens(), 1);
}

#[cfg(feature = "editor")]
#[test]
fn test_serialized_record_loads_back() {
    let archive = MemoryArchive::new();
    archive.insert("source.wav", wav_bytes(2, 22050, &ramp_pcm(80)));

    let mut record = BankRecord::new();
    record.ingest_source_file(&archive, Path::new("source.wav")).unwrap();

    let mut packed = b"PACKHEAD".to_vec();
    record.serialize(&mut packed).unwrap();
    archive.insert(PACK_PATH, packed.clone());

    let loaded = load_record(&packed);
    assert_eq!(loaded.byte_length(), record.byte_length());
    assert_eq!(loaded.byte_offset(), Some(16));

    let (_, metadata) = loaded.open_bank(&archive, &BankOptions::default()).unwrap();
    assert_eq!(metadata.num_samples, 80);
}

#[test]
fn test_audio_bank_releases_buffer() {
    let pcm = ramp_pcm(200);
    let (archive, record) = archive_with(&wav_bytes(1, 8000, &pcm));
    let registry = Arc::new(BufferRegistry::new());
    let mut bank = AudioBank::from_record(record, registry.clone());

    let (mut session, metadata) = bank.open_bank(&archive, &BankOptions::default()).unwrap();
    let decoded = read_all(&mut session, 50);
    session.close();
    registry.insert(bank.id(), AudioBuffer { metadata, pcm: decoded });

    let buffer = bank.audio_buffer().unwrap();
    assert_eq!(buffer.pcm, pcm);
    assert!(registry.find(bank.id()).is_some());

    drop(bank);
    assert!(registry.is_empty());
}
