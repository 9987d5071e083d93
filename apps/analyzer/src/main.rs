mod analyzer_client;
mod config;
mod errors;
mod feedback;
mod form;
mod state;
mod status;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::errors::FormError;
use crate::feedback::formatter::format_feedback;
use crate::feedback::render::render_blocks;
use crate::form::upload::load_resume;
use crate::form::SubmissionState;
use crate::state::Session;
use crate::status::indicator::render_indicator;
use crate::status::ServerStatus;

/// Slack on top of the probe timeout when waiting for a post-failure recheck.
const RECHECK_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "analyzer",
    version,
    about = "Check a resume against a job description using the remote analysis service"
)]
struct Cli {
    /// Analysis service origin (overrides ANALYZER_ORIGIN)
    #[arg(long, global = true)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the service once and print its status
    Status(StatusArgs),
    /// Keep probing and print every status change until interrupted
    Watch,
    /// Upload a resume with a job description and render the feedback
    Analyze(AnalyzeArgs),
    /// Format feedback text from a file or stdin without contacting the service
    Format(FormatArgs),
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Print the status snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Resume to upload (PDF)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Job description text
    #[arg(long, conflicts_with = "job_file")]
    job: Option<String>,

    /// Read the job description from a file
    #[arg(long)]
    job_file: Option<PathBuf>,

    /// Wait up to this many seconds for a waking service to become live
    #[arg(long, value_name = "SECONDS")]
    wait: Option<u64>,

    /// Print the feedback exactly as received
    #[arg(long)]
    raw: bool,
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Feedback text file; stdin if omitted
    path: Option<PathBuf>,

    /// Print render blocks as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(origin) = &cli.origin {
        config = config.with_origin(origin)?;
    }

    // Logs go to stderr; stdout carries rendered output only.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Resume analyzer v{} using {}",
        env!("CARGO_PKG_VERSION"),
        config.origin
    );

    let outcome = match cli.command {
        Command::Status(args) => run_status(&config, args).await,
        Command::Watch => run_watch(&config).await,
        Command::Analyze(args) => run_analyze(&config, args).await,
        Command::Format(args) => run_format(args).await,
    };

    match outcome {
        Err(e) => match e.downcast_ref::<FormError>() {
            Some(prompt) => {
                eprintln!("{} {}", "⚠".yellow().bold(), prompt);
                Ok(ExitCode::from(2))
            }
            None => Err(e),
        },
        ok => ok,
    }
}

async fn run_status(config: &Config, args: StatusArgs) -> Result<ExitCode> {
    let snapshot = Session::check_once(config).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", render_indicator(&snapshot));
    }

    Ok(if snapshot.status == ServerStatus::Live {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_watch(config: &Config) -> Result<ExitCode> {
    let session = Session::start(config)?;
    let mut rx = session.status();
    eprintln!(
        "{} {} (Ctrl-C to stop)",
        "Watching".dimmed(),
        session.origin()
    );

    loop {
        let line = render_indicator(&rx.borrow_and_update());
        println!("{line}");

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_analyze(config: &Config, args: AnalyzeArgs) -> Result<ExitCode> {
    let session = Session::start(config)?;
    let mut form = session.form();

    if let Some(path) = &args.resume {
        let resume = load_resume(path).await?;
        eprintln!(
            "{} {} ({} bytes)",
            "Resume:".dimmed(),
            resume.name,
            resume.size()
        );
        form.select_file(resume);
    }

    let job_description = match (args.job, &args.job_file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description '{}'", path.display()))?,
        (None, None) => String::new(),
    };
    form.set_job_description(job_description);

    match args.wait {
        Some(secs) => session.wait_until_live(Duration::from_secs(secs)).await,
        None => session.wait_until_resolved().await,
    };
    eprintln!("{}", render_indicator(&session.snapshot()));

    eprintln!("{}", "Analyzing...".dimmed());
    let before = session.snapshot().seq;
    let text = form.submit().await?;

    if args.raw {
        println!("{text}");
    } else {
        print!("{}", render_blocks(&format_feedback(&text)));
    }

    match form.state() {
        SubmissionState::Completed { .. } => Ok(ExitCode::SUCCESS),
        SubmissionState::Failed { recheck: true, .. } => {
            // The prober stops with the session, so the recheck is awaited here.
            let limit = config.probe_timeout + RECHECK_GRACE;
            match session.wait_for_probe_after(before, limit).await {
                Some(snapshot) => eprintln!("{}", render_indicator(&snapshot)),
                None => eprintln!("{}", "Server status check did not finish".dimmed()),
            }
            Ok(ExitCode::FAILURE)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

async fn run_format(args: FormatArgs) -> Result<ExitCode> {
    let raw = match &args.path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read '{}'", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read feedback from stdin")?;
            buf
        }
    };

    let blocks = format_feedback(&raw);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    } else {
        print!("{}", render_blocks(&blocks));
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_analyze_args() {
        let cli = Cli::try_parse_from([
            "analyzer",
            "--origin",
            "http://localhost:8000",
            "analyze",
            "--resume",
            "cv.pdf",
            "--job",
            "Rust engineer",
            "--wait",
            "60",
        ])
        .unwrap();

        assert_eq!(cli.origin.as_deref(), Some("http://localhost:8000"));
        match cli.command {
            Command::Analyze(args) => {
                assert_eq!(args.resume, Some(PathBuf::from("cv.pdf")));
                assert_eq!(args.job.as_deref(), Some("Rust engineer"));
                assert_eq!(args.wait, Some(60));
                assert!(!args.raw);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_both_job_sources() {
        let result = Cli::try_parse_from([
            "analyzer",
            "analyze",
            "--job",
            "text",
            "--job-file",
            "jd.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_status_json() {
        let cli = Cli::try_parse_from(["analyzer", "status", "--json"]).unwrap();
        match cli.command {
            Command::Status(args) => assert!(args.json),
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["analyzer", "status"]).unwrap();
        assert!(matches!(cli.command, Command::Status(StatusArgs { json: false })));
    }

    #[test]
    fn test_cli_parses_format_json() {
        let cli = Cli::try_parse_from(["analyzer", "format", "feedback.txt", "--json"]).unwrap();
        match cli.command {
            Command::Format(args) => {
                assert_eq!(args.path, Some(PathBuf::from("feedback.txt")));
                assert!(args.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
