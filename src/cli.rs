//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use packt_sync::{DownloadMode, config::DEFAULT_BATCH_CAP};

/// Sync and download a Packt ebook library.
///
/// Logs into the publisher's site, refreshes the local catalog of purchased
/// ebooks, and downloads PDF assets that are not yet in the ledger.
#[derive(Parser, Debug)]
#[command(name = "packt-sync")]
#[command(author, version, about)]
pub struct Args {
    /// Account email (prompted when omitted on a terminal)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Account password (prompted when omitted on a terminal)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Output directory for the catalog, ledger, and downloads
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Refresh the library catalog without downloading
    #[arg(long)]
    pub sync: bool,

    /// Refresh the catalog, then download per --mode
    #[arg(long)]
    pub download: bool,

    /// Claim the current free-ebook offer
    #[arg(long)]
    pub claim: bool,

    /// Which books to download
    #[arg(short, long, value_enum, default_value_t = ModeArg::New)]
    pub mode: ModeArg,

    /// Maximum downloads per invocation (1-50)
    #[arg(short, long, default_value_t = DEFAULT_BATCH_CAP as u8, value_parser = clap::value_parser!(u8).range(1..=50))]
    pub batch_cap: u8,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// True when no action flag was given and one must be prompted for.
    #[must_use]
    pub fn needs_action_prompt(&self) -> bool {
        !(self.sync || self.download || self.claim)
    }
}

/// CLI spelling of the download modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Only the first book in the catalog.
    First,
    /// Books not yet recorded in the ledger.
    New,
    /// Everything, up to the batch cap.
    All,
}

/// Maps an interactive checklist answer ("1"/"first", "2"/"new", "3"/"all")
/// to a mode. Returns `None` for anything else.
#[must_use]
pub fn parse_mode_choice(input: &str) -> Option<ModeArg> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "first" => Some(ModeArg::First),
        "2" | "new" => Some(ModeArg::New),
        "3" | "all" => Some(ModeArg::All),
        _ => None,
    }
}

impl From<ModeArg> for DownloadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::First => DownloadMode::First,
            ModeArg::New => DownloadMode::NotYetDownloaded,
            ModeArg::All => DownloadMode::All,
        }
    }
}
