//! CLI parsing and orchestration. Parses args, runs claim and/or download
//! flows, sends the optional notification email, and maps errors to exit
//! codes.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::error;
use thiserror::Error;

use crate::api::{ApiClient, ApiError, ReqwestTransport};
use crate::captcha::CaptchaSolver;
use crate::claim::{self, ClaimError};
use crate::config::{self, DownloadConfig};
use crate::download::{self, DownloadReport};
use crate::library;
use crate::model::{Credentials, DownloadFormat, Product};
use crate::notify::EmailNotifier;

/// Formats downloaded when neither the CLI nor the config narrows them.
const DEFAULT_FORMATS: [DownloadFormat; 4] = [
    DownloadFormat::Pdf,
    DownloadFormat::Mobi,
    DownloadFormat::Epub,
    DownloadFormat::Code,
];

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Claim(#[from] ClaimError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Notification failed: {0:#}")]
    Notify(anyhow::Error),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Claim(_) | CliRunError::Api(_) => 2,
            CliRunError::Notify(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "packtgrab")]
#[command(about = "Claim the Packt Free Learning daily ebook and download your titles")]
#[command(
    after_help = "Config file sections ([login], [anticaptcha], [download], [notify]) are documented in the README. CLI flags override config."
)]
pub struct Args {
    /// Claim today's free ebook.
    #[arg(short, long)]
    pub grab: bool,

    /// Claim today's free ebook and download it afterwards.
    #[arg(short = 'd', long)]
    pub grab_download: bool,

    /// Download every ebook in your library.
    #[arg(short = 'a', long)]
    pub download_all: bool,

    /// Claim and download today's ebook, then email a report to the
    /// configured recipients.
    #[arg(short, long)]
    pub mail: bool,

    /// Email a status report when the claim succeeds or fails.
    #[arg(long)]
    pub status_mail: bool,

    /// Download each product into its own subfolder.
    #[arg(short, long)]
    pub folder: bool,

    /// Formats to download (overrides config), e.g. --formats pdf,epub.
    #[arg(long, value_delimiter = ',', value_parser = DownloadFormat::parse)]
    pub formats: Option<Vec<DownloadFormat>>,

    /// Path to the config file. Default: ./packtgrab.toml, then
    /// the user config directory.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log errors only.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long)]
    pub verbose: bool,
}

/// What a run produced; feeds the notification email.
#[derive(Debug, Default)]
struct RunSummary {
    claimed: Option<Product>,
    report: DownloadReport,
}

/// Formats from the CLI override the config; the config overrides the
/// default set.
fn resolve_formats(
    cli: &Option<Vec<DownloadFormat>>,
    config: &DownloadConfig,
) -> Result<Vec<DownloadFormat>, String> {
    if let Some(formats) = cli {
        return Ok(formats.clone());
    }
    match &config.formats {
        Some(names) => names.iter().map(|name| DownloadFormat::parse(name)).collect(),
        None => Ok(DEFAULT_FORMATS.to_vec()),
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code
/// and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let wants_grab = args.grab || args.grab_download || args.mail;
    if !wants_grab && !args.download_all {
        return Err(CliRunError::InvalidInput(
            "Nothing to do. Use --grab, --grab-download, --download-all, or --mail.".to_string(),
        ));
    }

    let config = match &args.config {
        Some(path) => config::load_config_from(path).map_err(CliRunError::InvalidInput)?,
        None => config::load_config()
            .map_err(CliRunError::InvalidInput)?
            .ok_or_else(|| {
                CliRunError::InvalidInput(
                    "No configuration found. Create ./packtgrab.toml or pass --config.".to_string(),
                )
            })?,
    };

    let login = config.login.as_ref().ok_or_else(|| {
        CliRunError::InvalidInput("Config is missing the [login] section.".to_string())
    })?;
    let credentials = Credentials {
        email: login.email.clone(),
        password: login.password.clone(),
    };

    let anticaptcha_key = if wants_grab {
        let section = config.anticaptcha.as_ref().ok_or_else(|| {
            CliRunError::InvalidInput("Config is missing the [anticaptcha] section.".to_string())
        })?;
        Some(section.key.clone())
    } else {
        None
    };

    let notifier = if args.mail || args.status_mail {
        let section = config.notify.as_ref().ok_or_else(|| {
            CliRunError::InvalidInput(
                "--mail and --status-mail need the [notify] config section.".to_string(),
            )
        })?;
        Some(EmailNotifier::from_config(section).map_err(CliRunError::Notify)?)
    } else {
        None
    };

    let formats = resolve_formats(&args.formats, &config.download).map_err(CliRunError::InvalidInput)?;
    let download_dir = config
        .download
        .directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let needs_download = args.grab_download || args.download_all || args.mail;
    if needs_download && !download_dir.is_dir() {
        return Err(CliRunError::InvalidInput(format!(
            "Download folder '{}' doesn't exist.",
            download_dir.display()
        )));
    }
    let into_folder = args.folder || config.download.into_folder.unwrap_or(false);

    let outcome = execute(
        args,
        credentials,
        anticaptcha_key,
        &formats,
        &download_dir,
        into_folder,
    );

    match &outcome {
        Ok(summary) => {
            if let (Some(notifier), Some(product)) = (&notifier, &summary.claimed) {
                notifier
                    .send_grab_success(product, &summary.report.paths)
                    .map_err(CliRunError::Notify)?;
            }
        }
        Err(e) => {
            // Failure report is best-effort; the original error is what the
            // process exits with.
            if args.status_mail {
                if let Some(ref notifier) = notifier {
                    if let Err(mail_err) = notifier.send_grab_failure(&e.to_string()) {
                        error!("Could not send the failure report: {:#}", mail_err);
                    }
                }
            }
        }
    }

    outcome.map(|_| ())
}

fn execute(
    args: &Args,
    credentials: Credentials,
    anticaptcha_key: Option<String>,
    formats: &[DownloadFormat],
    download_dir: &Path,
    into_folder: bool,
) -> Result<RunSummary, CliRunError> {
    let transport = ReqwestTransport::new()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    let mut client = ApiClient::new(transport, credentials);

    let mut summary = RunSummary::default();
    if let Some(key) = anticaptcha_key {
        let solver_transport = ReqwestTransport::new().map_err(|e| {
            CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e))
        })?;
        let solver = CaptchaSolver::new(solver_transport, key);
        summary.claimed = Some(claim::claim_offer(&mut client, &solver)?);
    }

    if args.download_all {
        let products = library::fetch_all(&mut client)?;
        summary.report =
            download::download_products(&mut client, download_dir, formats, &products, into_folder);
    } else if args.grab_download || args.mail {
        if let Some(ref product) = summary.claimed {
            summary.report = download::download_products(
                &mut client,
                download_dir,
                formats,
                std::slice::from_ref(product),
                into_folder,
            );
        }
    }
    Ok(summary)
}
