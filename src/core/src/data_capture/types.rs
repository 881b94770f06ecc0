//! Common data types used across the data_capture subsystem.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error_handling::types::CaptureError;
use crate::transport::types::EndpointDescriptor;

pub const DEFAULT_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a [`CaptureSession`](super::CaptureSession) needs, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Upper bound on a single read chunk. Must be > 0.
    pub buffer_size: usize,
    /// Final, already resolved destination file.
    pub output_path: PathBuf,
    pub endpoint: EndpointDescriptor,
    /// Echo captured bytes to stdout as well as the file.
    pub mirror_to_console: bool,
    /// Bound on TCP connection establishment.
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new(
        buffer_size: usize,
        output_path: impl Into<PathBuf>,
        endpoint: EndpointDescriptor,
    ) -> Self {
        Self {
            buffer_size,
            output_path: output_path.into(),
            endpoint,
            mirror_to_console: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_console_mirror(mut self, enabled: bool) -> Self {
        self.mirror_to_console = enabled;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.buffer_size == 0 {
            return Err(CaptureError::InvalidConfig(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "output_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Listening,
    Stopped,
}

/// Why the capture loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureEnd {
    /// The peer closed the stream.
    EndOfStream,
    /// `stop_listening` was called.
    Stopped,
}

/// Outcome of one capture run, handed back by `stop_listening`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub session_id: Uuid,
    pub endpoint: String,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Total bytes handed to the output file
    pub bytes_captured: u64,
    /// Number of reads that produced data
    pub chunks: u64,
    pub end: CaptureEnd,
}
