use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use facegate_core::{DeviceError, Frame, FrameSource};

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Replays a directory of encoded frames in file-name order, cycling.
///
/// Useful for offline runs and for checking a deployment end to end without a
/// camera attached.
#[derive(Debug)]
pub struct ReplaySource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl ReplaySource {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DeviceError> {
        let dir = dir.into();
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            DeviceError::Unavailable(format!("cannot read {}: {e}", dir.display()))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(DeviceError::Unavailable(format!(
                "no .jpg/.jpeg/.png frames in {}",
                dir.display()
            )));
        }
        tracing::info!(dir = %dir.display(), frames = frames.len(), "replay source opened");

        Ok(Self {
            dir,
            frames,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl FrameSource for ReplaySource {
    async fn request_access(&self) -> Result<(), DeviceError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(DeviceError::Unavailable(format!(
                "{} disappeared",
                self.dir.display()
            )))
        }
    }

    async fn wait_ready(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn capture(&self) -> Result<Frame, DeviceError> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let path = &self.frames[index];
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| DeviceError::Unavailable(format!("{}: {e}", path.display())))?;
        tracing::debug!(frame = %path.display(), bytes = data.len(), "replayed frame");
        Ok(Frame::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_name_order_and_cycles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"second").unwrap();
        std::fs::write(dir.path().join("a.JPG"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let source = ReplaySource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);
        source.request_access().await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(source.capture().await.unwrap().data);
        }
        assert_eq!(
            seen,
            vec![b"first".to_vec(), b"second".to_vec(), b"first".to_vec()]
        );
    }

    #[test]
    fn test_empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.md"), b"no frames").unwrap();
        assert!(matches!(
            ReplaySource::open(dir.path()).unwrap_err(),
            DeviceError::Unavailable(_)
        ));
    }

    #[test]
    fn test_missing_directory_is_unavailable() {
        assert!(ReplaySource::open("/nonexistent/facegate/frames").is_err());
    }
}
