use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use facegate_cloud::ServiceConfig;
use facegate_core::SessionConfig;
use serde::Deserialize;

/// CLI configuration: defaults, then the `FACEGATE_CONFIG` TOML file, then
/// `FACEGATE_*` environment variables. Command-line flags are applied last by
/// the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the face service.
    pub endpoint: Option<String>,
    /// Bearer token for the face service.
    pub api_key: Option<String>,
    /// Enrolled reference photo.
    pub reference: Option<PathBuf>,
    /// Snapshot file kept fresh by an external capture process.
    pub snapshot: Option<PathBuf>,
    /// Directory of frames to replay instead of a live snapshot.
    pub replay: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// `[session]` table.
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            reference: None,
            snapshot: None,
            replay: None,
            request_timeout_secs: 30,
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Load from `FACEGATE_CONFIG` (if set) and `FACEGATE_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("FACEGATE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.overlay_env(&lookup);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    fn overlay_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEGATE_ENDPOINT") {
            self.endpoint = Some(v);
        }
        if let Some(v) = lookup("FACEGATE_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("FACEGATE_REFERENCE") {
            self.reference = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FACEGATE_SNAPSHOT") {
            self.snapshot = Some(PathBuf::from(v));
        }

        let session = &mut self.session;
        session.poll_interval_ms =
            env_parse(lookup, "FACEGATE_POLL_INTERVAL_MS", session.poll_interval_ms);
        session.deadline_ms = env_parse(lookup, "FACEGATE_DEADLINE_MS", session.deadline_ms);
        session.confidence_threshold = env_parse(
            lookup,
            "FACEGATE_CONFIDENCE_THRESHOLD",
            session.confidence_threshold,
        );
        session.similarity_threshold = env_parse(
            lookup,
            "FACEGATE_SIMILARITY_THRESHOLD",
            session.similarity_threshold,
        );
        session.alerts_enabled = lookup("FACEGATE_ALERTS_ENABLED")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(session.alerts_enabled);

        self.request_timeout_secs = env_parse(
            lookup,
            "FACEGATE_REQUEST_TIMEOUT_SECS",
            self.request_timeout_secs,
        );
    }

    pub fn service(&self) -> Result<ServiceConfig> {
        let endpoint = self
            .endpoint
            .clone()
            .context("no face service endpoint configured (set FACEGATE_ENDPOINT)")?;
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(ServiceConfig {
            endpoint,
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

/// Where session frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSpec {
    Snapshot(PathBuf),
    Replay(PathBuf),
}

impl Config {
    /// Exactly one of `snapshot` and `replay` must be set once all layers
    /// are applied.
    pub fn frame_source(&self) -> Result<FrameSpec> {
        match (&self.snapshot, &self.replay) {
            (Some(snapshot), Some(replay)) => bail!(
                "both snapshot ({}) and replay ({}) are configured; keep one",
                snapshot.display(),
                replay.display()
            ),
            (Some(snapshot), None) => Ok(FrameSpec::Snapshot(snapshot.clone())),
            (None, Some(replay)) => Ok(FrameSpec::Replay(replay.clone())),
            (None, None) => bail!("no frame source (use --snapshot or --replay)"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    current: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            current
        }),
        None => current,
    }
}
