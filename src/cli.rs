use crate::config::{parse_log_level, parse_window, BankOptions};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and decode audio banks stored in archive files
#[derive(Parser, Debug)]
#[command(name = "bank-tool")]
#[command(version = "0.8.0")]
#[command(about = "Inspect and decode audio banks embedded in archives", long_about = None)]
pub struct Cli {
    /// Log level (nothing, user, error, warning, info, debug, all)
    #[arg(short, long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Options file (key = value lines)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bytes scanned from the end of an Ogg payload (e.g. 64k)
    #[arg(long, global = true, value_name = "BYTES")]
    pub tail_window: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the metadata of a bank
    Info {
        #[command(flatten)]
        bank: BankArgs,
    },

    /// Decode a bank to raw 16-bit little-endian PCM
    Decode {
        #[command(flatten)]
        bank: BankArgs,

        /// Output file for the PCM stream
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,

        /// Bytes requested per read
        #[arg(long, value_name = "BYTES", default_value_t = 4096)]
        chunk: u64,

        /// PCM offset to seek to before decoding
        #[arg(long, value_name = "BYTES")]
        start: Option<u64>,
    },
}

/// Location of a bank inside an archive file
#[derive(clap::Args, Debug, Clone)]
pub struct BankArgs {
    /// Archive file holding the bank
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Byte offset of the payload
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub offset: u64,

    /// Payload length; defaults to the rest of the archive
    #[arg(long, value_name = "BYTES")]
    pub length: Option<u64>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: BankOptions) -> Result<BankOptions> {
        if let Some(ref level) = self.log_level {
            opts.log_level = parse_log_level(level).context("Invalid log level")?;
        }

        if let Some(ref window) = self.tail_window {
            opts.tail_scan_window = parse_window(window).context("Invalid tail window")?;
        }

        Ok(opts)
    }
}
