use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facegate_cloud::FaceServiceClient;
use facegate_core::{
    CancellationToken, EncodedImage, FrameSource, LivenessOrchestrator, Outcome, SessionEvent,
};
use facegate_hw::{ReplaySource, SnapshotSource};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Config, FrameSpec};

#[derive(Parser)]
#[command(name = "facegate", version, about = "Unattended liveness check and face verification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one liveness session against the enrolled reference photo
    Verify(VerifyArgs),
    /// Detect faces in one image
    Detect { image: PathBuf },
    /// Compare the face in SOURCE with the faces in TARGET
    Compare {
        source: PathBuf,
        target: PathBuf,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Validate an image locally without calling the service
    Check { image: PathBuf },
}

#[derive(Args)]
struct VerifyArgs {
    /// Enrolled reference photo
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Snapshot file kept fresh by a capture process
    #[arg(long, conflicts_with = "replay")]
    snapshot: Option<PathBuf>,
    /// Replay frames from a directory
    #[arg(long)]
    replay: Option<PathBuf>,
    #[arg(long)]
    deadline_ms: Option<u64>,
    /// Suppress "no face" alerts
    #[arg(long)]
    no_alerts: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Verify(args) => verify(config, args).await,
        Command::Detect { image } => {
            let client = FaceServiceClient::new(config.service()?)?;
            let result = client.detect_bytes(read(&image)?).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Compare {
            source,
            target,
            threshold,
        } => {
            let client = FaceServiceClient::new(config.service()?)?;
            let threshold = threshold.unwrap_or(config.session.similarity_threshold);
            let result = client
                .compare_bytes(read(&source)?, read(&target)?, threshold)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { image } => {
            let parsed = EncodedImage::parse(read(&image)?)
                .with_context(|| format!("{} is not a usable image", image.display()))?;
            let report = serde_json::json!({
                "format": parsed.format(),
                "width": parsed.width(),
                "height": parsed.height(),
                "bytes": parsed.len(),
                "sha256": parsed.fingerprint(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

async fn verify(mut config: Config, args: VerifyArgs) -> Result<ExitCode> {
    if let Some(path) = args.reference {
        config.reference = Some(path);
    }
    if args.snapshot.is_some() || args.replay.is_some() {
        config.snapshot = args.snapshot;
        config.replay = args.replay;
    }
    if let Some(ms) = args.deadline_ms {
        config.session.deadline_ms = ms;
    }
    if args.no_alerts {
        config.session.alerts_enabled = false;
    }

    let reference_path = config
        .reference
        .clone()
        .context("no reference photo (use --reference or FACEGATE_REFERENCE)")?;
    let reference = EncodedImage::parse(read(&reference_path)?)
        .with_context(|| format!("reference {} is not usable", reference_path.display()))?;
    let client = FaceServiceClient::new(config.service()?)?;

    let outcome = match config.frame_source()? {
        FrameSpec::Replay(dir) => {
            let source = ReplaySource::open(&dir)
                .with_context(|| format!("opening replay directory {}", dir.display()))?;
            run_session(&config, source, client, reference).await?
        }
        FrameSpec::Snapshot(path) => {
            let source = SnapshotSource::new(path);
            run_session(&config, source, client, reference).await?
        }
    };

    match outcome {
        Some(outcome) => {
            println!("{}", serde_json::to_string(&outcome)?);
            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        None => {
            tracing::info!("session cancelled");
            Ok(ExitCode::from(130))
        }
    }
}

async fn run_session<S: FrameSource>(
    config: &Config,
    source: S,
    client: FaceServiceClient,
    reference: EncodedImage,
) -> Result<Option<Outcome>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut orchestrator = LivenessOrchestrator::new(
        config.session.clone(),
        source,
        client.clone(),
        client,
        reference,
    )
    .context("invalid session configuration")?
    .with_events(tx);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let printer = tokio::spawn(print_events(rx));
    let outcome = orchestrator.run(cancel).await;
    drop(orchestrator);
    let _ = printer.await;
    Ok(outcome)
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Status(status) => eprintln!("{status}"),
            SessionEvent::Alert(status) => eprintln!("! {status}"),
            SessionEvent::PhaseChanged(_) | SessionEvent::Resolved(_) => {}
        }
    }
}
