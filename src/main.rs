use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use audio_bank::archive::{Archive, DiskArchive};
use audio_bank::bank::{BankMetadata, DecodeSession, RangeDescriptor};
use audio_bank::cli::{BankArgs, Cli, Command};
use audio_bank::config::{self, BankOptions};
use audio_bank::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = match &cli.config {
        Some(path) => config::load_options(path)?,
        None => BankOptions::default(),
    };
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level);
    log::info!("bank-tool starting");

    let archive = DiskArchive::new();
    match &cli.command {
        Command::Info { bank } => {
            let (session, metadata) = open_session(&archive, bank, &options)?;
            print_metadata(session.codec_name(), &metadata);
            session.close();
        }
        Command::Decode {
            bank,
            out,
            chunk,
            start,
        } => {
            let (mut session, _) = open_session(&archive, bank, &options)?;
            if let Some(offset) = start {
                session.seek_pcm(*offset);
            }

            let written = decode_to_file(&mut session, *chunk, out)?;
            log::info!("Wrote {} PCM bytes to {}", written, out.display());
            session.close();
        }
    }

    Ok(())
}

fn open_session(
    archive: &DiskArchive,
    bank: &BankArgs,
    options: &BankOptions,
) -> Result<(DecodeSession, BankMetadata)> {
    let length = match bank.length {
        Some(length) => length,
        None => {
            let reader = archive
                .open_reader(&bank.archive)
                .with_context(|| format!("Failed to open {}", bank.archive.display()))?;
            reader.size().saturating_sub(bank.offset)
        }
    };

    let range = RangeDescriptor::from_offset_len(bank.offset, length)
        .with_context(|| format!("Range {}+{} overflows", bank.offset, length))?;
    DecodeSession::open_archive_range(archive, &bank.archive, range, options)
        .with_context(|| format!("Failed to open bank in {}", bank.archive.display()))
}

fn print_metadata(codec: &str, metadata: &BankMetadata) {
    println!("codec:       {}", codec);
    println!("channels:    {}", metadata.num_channels);
    println!("format:      {:?}", metadata.format);
    println!("rate:        {} Hz", metadata.rate);
    println!("frames:      {}", metadata.total_frames());
    println!("pcm bytes:   {}", metadata.num_samples);
    println!("duration:    {:.3} s", metadata.duration().as_secs_f64());
}

/// Stream the session into `out`, returning the bytes written
fn decode_to_file(session: &mut DecodeSession, chunk: u64, out: &Path) -> Result<u64> {
    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut writer = BufWriter::new(file);

    let written = session
        .copy_pcm_to(&mut writer, chunk)
        .context("Bank decode failed")?;
    writer.flush()?;
    Ok(written)
}
