// Audio bank streaming library

pub mod archive;
pub mod bank;
pub mod cli;
pub mod config;
pub mod logging;

pub use archive::{Archive, ArchiveReader, DiskArchive, MemoryArchive};
pub use bank::{BankMetadata, BankRecord, DecodeSession, OpenError};
pub use config::BankOptions;
pub use logging::LogLevel;
