//! CLI entry point for the packt-sync tool.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use packt_sync::{DownloadMode, SessionClient, SiteConfig, catalog, download, library, offers};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, ModeArg};

/// Which workflow steps this invocation runs.
#[derive(Debug, Clone, Copy)]
struct Actions {
    claim: bool,
    sync: bool,
    download: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let output_dir = match args.output.clone() {
        Some(dir) => dir,
        None => default_output_dir()?,
    };

    let prompted = args.needs_action_prompt();
    let actions = resolve_actions(&args)?;
    if !(actions.claim || actions.sync || actions.download) {
        info!("nothing to do; pass --sync, --download, or --claim");
        return Ok(());
    }

    // When the download step came from the checklist, the mode does too.
    let mode = if prompted && actions.download {
        resolve_mode(args.mode)?
    } else {
        args.mode
    };

    let user = resolve_value(args.user.clone(), "PACKT USER")?;
    let password = resolve_value(args.password.clone(), "PACKT PASSWORD")?;

    let config = SiteConfig {
        batch_cap: usize::from(args.batch_cap),
        ..SiteConfig::default()
    };

    let session = SessionClient::new(&config);

    let spinner = start_spinner("Authentication...");
    let login_result = packt_sync::login(&session, &config, &user, &password).await;
    spinner.finish_and_clear();
    login_result.context("login failed")?;

    if actions.claim {
        offers::claim_free_ebook(&session, &config)
            .await
            .context("claiming the free ebook failed")?;
    }

    if actions.sync || actions.download {
        let spinner = start_spinner("Fetching library...");
        let result = library::fetch_library(&session, &config).await;
        spinner.finish_and_clear();
        let fetched = result.context("library sync failed")?;
        catalog::save(&fetched, &output_dir)
            .await
            .context("saving the catalog failed")?;
        info!(books = fetched.len(), output = %output_dir.display(), "catalog updated");
    }

    if actions.download {
        run_downloads(&session, mode, &config, &output_dir).await?;
    }

    Ok(())
}

/// Runs the selection and download phase against the persisted catalog.
async fn run_downloads(
    session: &SessionClient,
    mode: ModeArg,
    config: &SiteConfig,
    output_dir: &Path,
) -> Result<()> {
    let stored = catalog::load(output_dir)
        .await
        .context("loading the catalog failed")?;
    let ledger = catalog::read_downloaded(output_dir)
        .await
        .context("reading the download ledger failed")?;

    let mode = DownloadMode::from(mode);
    let selection = packt_sync::select(&stored, &ledger, mode, config.batch_cap);
    if selection.is_empty() {
        info!("nothing selected for download");
        return Ok(());
    }

    info!(selected = selection.len(), ?mode, "starting downloads");
    let spinner = start_spinner(&format!("Downloading {} book(s)...", selection.len()));
    let report = download::download_all(session, &selection, output_dir).await;
    spinner.finish_and_clear();

    info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        total = report.total(),
        "downloads finished"
    );
    for (id, error) in &report.failed {
        warn!(id = %id, error = %error, "book failed to download");
    }
    if !report.is_complete() {
        bail!(
            "{} of {} downloads failed",
            report.failed.len(),
            report.total()
        );
    }
    Ok(())
}

/// Maps action flags to the steps to run, prompting when none were given
/// and stdin is a terminal (mirroring the interactive checklist of the
/// original tool).
fn resolve_actions(args: &Args) -> Result<Actions> {
    if !args.needs_action_prompt() {
        return Ok(Actions {
            claim: args.claim,
            sync: args.sync,
            download: args.download,
        });
    }
    if !io::stdin().is_terminal() {
        bail!("no action given; pass --sync, --download, or --claim");
    }

    let answer = prompt_line(
        "Actions: [1] Claim free ebook  [2] Update library info  [3] Download\nChoose (comma-separated, e.g. 2,3): ",
    )?;
    let mut actions = Actions {
        claim: false,
        sync: false,
        download: false,
    };
    for choice in answer.split(',') {
        match choice.trim() {
            "1" => actions.claim = true,
            "2" => actions.sync = true,
            "3" => actions.download = true,
            "" => {}
            other => warn!(choice = %other, "ignoring unknown action"),
        }
    }
    Ok(actions)
}

/// Prompts for the download mode after the download step was chosen from
/// the interactive checklist. An empty or unrecognized answer keeps the
/// `--mode` default.
fn resolve_mode(default: ModeArg) -> Result<ModeArg> {
    let answer = prompt_line("Download mode: [1] first  [2] new  [3] all (default: new): ")?;
    if answer.is_empty() {
        return Ok(default);
    }
    match cli::parse_mode_choice(&answer) {
        Some(mode) => Ok(mode),
        None => {
            warn!(choice = %answer, "ignoring unknown mode");
            Ok(default)
        }
    }
}

/// Returns a flag value, prompting for it when missing and on a terminal.
fn resolve_value(flag: Option<String>, label: &str) -> Result<String> {
    if let Some(value) = flag {
        return Ok(value);
    }
    if !io::stdin().is_terminal() {
        bail!("{label} not provided and stdin is not a terminal");
    }
    let value = prompt_line(&format!("{label}: "))?;
    if value.is_empty() {
        bail!("{label} must not be empty");
    }
    Ok(value)
}

/// Reads one trimmed line from stdin after printing a label to stderr.
fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush().context("flushing stderr failed")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading stdin failed")?;
    Ok(line.trim().to_string())
}

/// `<cwd>/books`, the default output directory of the original tool.
fn default_output_dir() -> Result<PathBuf> {
    Ok(std::env::current_dir()
        .context("cannot determine current directory")?
        .join("books"))
}

fn start_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
