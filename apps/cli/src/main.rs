//! capyupload: command-line front end for the upload manager.

mod config;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use capyupload_uploader::{UploadEvent, UploadManager, UploadTask};

use crate::config::CliConfig;
use crate::report::BatchReport;

/// Upload files to an HTTP endpoint with a bounded worker pool
#[derive(Parser, Debug)]
#[command(name = "capyupload")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Endpoint receiving the uploads
    #[arg(long)]
    url: Option<String>,

    /// Configuration file (defaults to the per-user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent uploads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Retries after the first attempt
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base retry delay in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Send a Content-MD5 header
    #[arg(long, overrides_with = "no_md5")]
    md5: bool,

    /// Do not send a Content-MD5 header
    #[arg(long, overrides_with = "md5")]
    no_md5: bool,

    /// Deadline for the whole batch in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliConfig {
        CliConfig {
            url: self.url.clone(),
            workers: self.workers,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            use_md5: match (self.md5, self.no_md5) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            request_timeout_secs: None,
            batch_timeout_secs: self.timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays parseable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load(cli.config.as_deref())?.merge(cli.overrides());
    let url = config
        .url
        .clone()
        .context("no upload URL given (use --url or set `url` in the config file)")?;

    let tasks: Vec<UploadTask> = cli
        .files
        .iter()
        .map(|path| UploadTask::new(path.clone(), url.clone()))
        .collect();

    let mut manager =
        UploadManager::new(config.upload_config()).context("failed to start upload manager")?;
    let events = manager.take_events().context("event stream already taken")?;
    let logger = tokio::spawn(log_events(events));

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());
    if let Some(timeout) = config.batch_timeout() {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(timeout_secs = timeout.as_secs(), "batch deadline reached, cancelling");
            cancel.cancel();
        });
    }

    info!(files = tasks.len(), url = %url, workers = manager.workers(), "starting upload");
    let start = Instant::now();
    let outcomes = manager.upload_files(&cancel, &tasks).await;
    let elapsed = start.elapsed();

    manager.close().await;
    drop(manager);
    if let Ok(events) = logger.await {
        debug!(events, "event stream drained");
    }

    let report = BatchReport::new(&tasks, &outcomes, elapsed);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Cancels the batch on the first Ctrl-C.
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling remaining uploads");
            cancel.cancel();
        }
    });
}

/// Traces pool events until the manager is gone.
///
/// The uploader already logs retries and failures; this only adds the
/// per-worker view at debug level.
async fn log_events(mut events: mpsc::Receiver<UploadEvent>) -> usize {
    let mut seen = 0;
    while let Some(event) = events.recv().await {
        seen += 1;
        match event {
            UploadEvent::Started { path, worker } => {
                debug!(worker, path = %path.display(), "uploading");
            }
            UploadEvent::Retrying { path, attempt, .. } => {
                debug!(path = %path.display(), attempt, "retry scheduled");
            }
            UploadEvent::Completed { path, bytes } => {
                debug!(path = %path.display(), bytes, "uploaded");
            }
            UploadEvent::Failed { path, .. } => {
                debug!(path = %path.display(), "gave up");
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags_into_overrides() {
        let cli = Cli::try_parse_from([
            "capyupload",
            "--url",
            "http://localhost/upload",
            "-w",
            "4",
            "--no-md5",
            "--timeout-secs",
            "9",
            "a.txt",
            "b.txt",
        ])
        .unwrap();

        assert_eq!(cli.files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        let overrides = cli.overrides();
        assert_eq!(overrides.url.as_deref(), Some("http://localhost/upload"));
        assert_eq!(overrides.workers, Some(4));
        assert_eq!(overrides.use_md5, Some(false));
        assert_eq!(overrides.batch_timeout_secs, Some(9));
        assert_eq!(overrides.max_retries, None);
    }

    #[test]
    fn last_md5_flag_wins() {
        let cli = Cli::try_parse_from(["capyupload", "--no-md5", "--md5", "a.txt"]).unwrap();
        assert_eq!(cli.overrides().use_md5, Some(true));
    }

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["capyupload", "--url", "http://x/"]).is_err());
    }

    #[tokio::test]
    async fn event_log_drains_until_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(UploadEvent::Started {
            path: "a".into(),
            worker: 0,
        })
        .await
        .unwrap();
        tx.send(UploadEvent::Completed {
            path: "a".into(),
            bytes: 42,
        })
        .await
        .unwrap();
        tx.send(UploadEvent::Failed {
            path: "b".into(),
            error: "boom".into(),
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(log_events(rx).await, 3);
    }
}
