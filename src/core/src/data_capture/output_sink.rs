use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error_handling::types::CaptureError;

type Mirror = Box<dyn AsyncWrite + Send + Unpin>;

/// Destination for captured bytes: a file plus an optional mirror.
///
/// Each [`write`](Self::write) holds the sink lock across the file write, its
/// flush and the mirror write, so chunks never interleave.
pub struct OutputSink {
    path: PathBuf,
    inner: Mutex<SinkInner>,
    bytes_written: AtomicU64,
}

struct SinkInner {
    file: File,
    mirror: Option<Mirror>,
}

impl OutputSink {
    /// Creates or truncates `path`.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .await
            .map_err(|source| CaptureError::OutputUnavailable {
                path: path.display().to_string(),
                source,
            })?;
        debug!("Output file {} opened", path.display());

        Ok(Self {
            path,
            inner: Mutex::new(SinkInner { file, mirror: None }),
            bytes_written: AtomicU64::new(0),
        })
    }

    pub fn with_mirror<W>(mut self, mirror: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.inner.get_mut().mirror = Some(Box::new(mirror));
        self
    }

    pub fn with_console_mirror(self) -> Self {
        self.with_mirror(tokio::io::stdout())
    }

    /// Appends `bytes` to the file and flushes, then mirrors them.
    ///
    /// A failing mirror is logged and detached; only file failures are errors.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().await;

        inner
            .file
            .write_all(bytes)
            .await
            .map_err(CaptureError::OutputWrite)?;
        inner.file.flush().await.map_err(CaptureError::OutputWrite)?;
        self.bytes_written
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        if let Some(mirror) = inner.mirror.as_mut() {
            let mirrored = match mirror.write_all(bytes).await {
                Ok(()) => mirror.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = mirrored {
                warn!("Console mirror for {} failed, detaching it: {}", self.path.display(), e);
                inner.mirror = None;
            }
        }
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
