use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use facegate_core::{DeviceError, Frame, FrameSource};
use tokio::time::Instant;

const READY_POLL: Duration = Duration::from_millis(100);

/// Frame source backed by a single image file that an external capture
/// process keeps overwriting (for example `ffmpeg -update 1 frame.jpg`).
///
/// A missing, empty or stale file is reported as [`DeviceError::Busy`] so the
/// caller's retry policy applies. A frozen capture process therefore cannot
/// feed the same picture to every poll.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
    ready_timeout: Duration,
    max_age: Option<Duration>,
}

impl SnapshotSource {
    pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(2);

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ready_timeout: Self::DEFAULT_READY_TIMEOUT,
            max_age: Some(Self::DEFAULT_MAX_AGE),
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Frames older than `max_age` are refused. `None` accepts any age.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn io_error(&self, e: io::Error) -> DeviceError {
        match e.kind() {
            io::ErrorKind::PermissionDenied => {
                DeviceError::PermissionDenied(format!("{}: {e}", self.path.display()))
            }
            io::ErrorKind::NotFound => DeviceError::Busy,
            _ => DeviceError::Unavailable(format!("{}: {e}", self.path.display())),
        }
    }
}

impl FrameSource for SnapshotSource {
    async fn request_access(&self) -> Result<(), DeviceError> {
        let dir = self.directory();
        match tokio::fs::read_dir(dir).await {
            Ok(_) => {
                tracing::debug!(dir = %dir.display(), "snapshot directory readable");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(
                DeviceError::PermissionDenied(format!("{}: {e}", dir.display())),
            ),
            Err(e) => Err(DeviceError::Unavailable(format!("{}: {e}", dir.display()))),
        }
    }

    async fn wait_ready(&self) -> Result<(), DeviceError> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            match tokio::fs::metadata(&self.path).await {
                Ok(meta) if meta.len() > 0 => {
                    tracing::info!(path = %self.path.display(), "snapshot source ready");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => match self.io_error(e) {
                    DeviceError::Busy => {}
                    other => return Err(other),
                },
            }
            if Instant::now() >= deadline {
                return Err(DeviceError::Unavailable(format!(
                    "no frame at {} after {} ms",
                    self.path.display(),
                    self.ready_timeout.as_millis()
                )));
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    async fn capture(&self) -> Result<Frame, DeviceError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());

        if let Some(max_age) = self.max_age {
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO);
            if age > max_age {
                tracing::debug!(age_ms = age.as_millis() as u64, "snapshot is stale");
                return Err(DeviceError::Busy);
            }
        }

        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        if data.is_empty() {
            // Writer truncated the file and has not finished the new frame
            return Err(DeviceError::Busy);
        }

        Ok(Frame {
            data,
            captured_at: DateTime::<Utc>::from(modified),
        })
    }
}
