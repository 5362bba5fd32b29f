//! `bulkmail send`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bulkmail::controller::{
    CampaignMessage, HttpDeliveryClient, RunEvent, RunSummary, SendController,
};
use bulkmail::observability::{self, ObservabilityConfig};
use bulkmail::recipients::{extract_from_cells, extract_from_text};
use bulkmail::roster::{Roster, RosterError};
use clap::Args;
use console::{style, Emoji};
use csv::{ReaderBuilder, StringRecord, Trim};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

static SENT: Emoji = Emoji("✓", "+");
static FAILED: Emoji = Emoji("✗", "x");
static STOPPED: Emoji = Emoji("⊘", "-");

/// Run a campaign: one delivery call per recipient, in order
#[derive(Debug, Args)]
pub struct SendCommand {
    /// Sender address
    #[arg(long, env = "BULKMAIL_FROM")]
    pub from: String,

    /// Recipient list; `.csv`/`.tsv` files are read cell by cell, anything
    /// else as free text
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Extra recipient address
    #[arg(long)]
    pub to: Vec<String>,

    /// Subject line (default from configuration)
    #[arg(long)]
    pub subject: Option<String>,

    /// Plain text body; `{sender}` is replaced with the sender address
    #[arg(long)]
    pub text: Option<String>,

    /// HTML body
    #[arg(long)]
    pub html: Option<String>,

    /// Delivery endpoint base URL (default from configuration)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log controller activity to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl SendCommand {
    /// Execute the command
    ///
    /// Returns whether every recipient was delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if no recipients are found or configuration is invalid.
    /// Per-recipient failures are reported, not returned.
    pub async fn execute(&self, log_json: bool) -> Result<bool> {
        if self.verbose {
            observability::init_with(
                &ObservabilityConfig::new("bulkmail-send").with_json(log_json),
            )?;
        }

        let config = super::load_config(self.config.as_deref())?;
        let roster = self.build_roster()?;
        if roster.is_empty() {
            bail!("No recipients given; use --file or --to");
        }

        let mut message = CampaignMessage::from_settings(&config.campaign);
        if let Some(subject) = &self.subject {
            message.subject.clone_from(subject);
        }
        if let Some(text) = &self.text {
            message.text.clone_from(text);
        }
        message.html.clone_from(&self.html);

        let endpoint = self.endpoint.as_deref().unwrap_or(&config.campaign.endpoint);
        let total = roster.len();

        println!(
            "{} {} {} {}",
            style("Sending").green().bold(),
            style(format!("to {total} recipient(s) as")).bold(),
            style(&self.from).cyan().bold(),
            style(format!("via {endpoint}")).dim()
        );

        let controller =
            SendController::with_roster(Arc::new(HttpDeliveryClient::new(endpoint)), roster);

        let progress = ProgressBar::new(total as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .context("Failed to set progress style")?,
        );

        let renderer = tokio::spawn(render(controller.subscribe(), progress.clone()));
        let interrupt = tokio::spawn(watch_interrupts(controller.clone(), progress.clone()));

        let summary = controller.start_run(&self.from, &message).await?;
        interrupt.abort();
        renderer.await.context("progress renderer failed")?;
        progress.finish_and_clear();

        tracing::info!(
            sent = summary.sent,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "campaign finished"
        );
        print_summary(&summary);
        Ok(summary.all_sent())
    }

    fn build_roster(&self) -> Result<Roster> {
        let mut roster = Roster::new();

        for path in &self.files {
            for address in read_recipients(path)? {
                add_unique(&mut roster, address)?;
            }
        }
        for address in &self.to {
            add_unique(&mut roster, address.trim().to_string())?;
        }

        Ok(roster)
    }
}

fn add_unique(roster: &mut Roster, address: String) -> Result<()> {
    match roster.add(address) {
        Ok(()) | Err(RosterError::DuplicateAddress(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Addresses found in one recipient file
fn read_recipients(path: &Path) -> Result<Vec<String>> {
    let found = match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => extract_from_cells(&read_records(path, b',')?),
        Some("tsv") => extract_from_cells(&read_records(path, b'\t')?),
        _ => {
            let content = fs::read_to_string(path).with_context(|| {
                format!("Failed to read recipient file: {}", path.display())
            })?;
            extract_from_text(&content)
        }
    };

    found.with_context(|| format!("{}", path.display()))
}

/// Every row of a delimited file, headers included
fn read_records(path: &Path, delimiter: u8) -> Result<Vec<StringRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to read recipient file: {}", path.display()))?;

    reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Malformed recipient file: {}", path.display()))
}

/// What a Ctrl-C does, by how many came before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Stop dispatching and let the run wind down
    Cancel,
    /// Give up on a run that will not stop
    Quit,
}

impl Interrupt {
    const fn nth(received: usize) -> Self {
        if received == 0 {
            Self::Cancel
        } else {
            Self::Quit
        }
    }
}

async fn watch_interrupts(controller: SendController, progress: ProgressBar) {
    let mut received = 0;
    while tokio::signal::ctrl_c().await.is_ok() {
        match Interrupt::nth(received) {
            Interrupt::Cancel => {
                controller.request_cancel();
                progress.println(format!(
                    "{} {}",
                    style("Cancelling").yellow().bold(),
                    style("(Ctrl-C again to quit)").dim()
                ));
            }
            Interrupt::Quit => {
                progress.abandon();
                std::process::exit(130);
            }
        }
        received += 1;
    }
}

async fn render(mut events: tokio::sync::broadcast::Receiver<RunEvent>, progress: ProgressBar) {
    loop {
        match events.recv().await {
            Ok(RunEvent::Dispatching { address }) => progress.set_message(address),
            Ok(RunEvent::Sent { address, .. }) => {
                progress.println(format!("{} {address}", style(SENT).green()));
            }
            Ok(RunEvent::Failed {
                address,
                kind,
                detail,
            }) => {
                progress.println(format!(
                    "{} {address} {} {}",
                    style(FAILED).red(),
                    style(kind).red(),
                    style(detail).dim()
                ));
            }
            Ok(RunEvent::Cancelled { address }) => {
                progress.println(format!(
                    "{} {address} {}",
                    style(STOPPED).yellow(),
                    style("cancelled").yellow()
                ));
            }
            Ok(RunEvent::Progress { completed, .. }) => progress.set_position(completed as u64),
            Ok(RunEvent::Finished(_)) | Err(RecvError::Closed) => break,
            Ok(RunEvent::Started { .. }) | Err(RecvError::Lagged(_)) => {}
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} sent, {} failed{}",
        style(summary.sent).green().bold(),
        style(summary.failed).red().bold(),
        if summary.cancelled > 0 || summary.stopped_early {
            format!(", {}", style("stopped early").yellow())
        } else {
            String::new()
        }
    );
}
