//! Capture session: one channel recorded to one file.
//!
//! A [`CaptureSession`] opens its [`TransportChannel`] on construction, lets
//! the caller push commands at any time, and drains the channel into an
//! [`OutputSink`] from one background task between `start_listening` and
//! `stop_listening`.
//!
//! ```text
//!   Idle ── start_listening ──▶ Listening ── stop_listening ──▶ Stopped
//!     └──────────────── stop_listening ────────────────────────────┘
//! ```
//!
//! The capture loop races each read against the stop signal, so a stop is
//! honoured even when the device is silent. Bytes the channel can already
//! deliver are read and written first; the stop flag is checked after each
//! chunk. The only latency left is that one chunk's sink write.
//!
//! Minimal usage
//! ```no_run
//! use port_listener::data_capture::{CaptureSession, SessionConfig};
//! use port_listener::transport::EndpointDescriptor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = EndpointDescriptor::Serial { device_path: "/dev/ttyUSB0".into() };
//! let session = CaptureSession::connect(SessionConfig::new(1024, "timea.log", endpoint)).await?;
//! session.send_command("LOG TIMEA ONTIME 1\r\n").await?;
//! session.start_listening().await?;
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! let summary = session.stop_listening().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Mutex as StdMutex, MutexGuard};

use chrono::Utc;
use log::{debug, error, info, trace, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::output_sink::OutputSink;
use super::shutdown::ShutdownCoordinator;
use super::types::{CaptureEnd, CaptureSummary, SessionConfig, SessionState};
use crate::error_handling::types::CaptureError;
use crate::transport::transport_channel::{ChannelReader, ChannelWriter, TransportChannel};
use crate::transport::types::ReadOutcome;

const PREVIEW_LEN: usize = 64;

type CaptureTask = JoinHandle<Result<CaptureSummary, CaptureError>>;

pub struct CaptureSession {
    id: Uuid,
    config: SessionConfig,
    endpoint: String,
    /// Command writes only; the read half belongs to the capture task.
    writer: Mutex<ChannelWriter>,
    shutdown: ShutdownCoordinator,
    /// Serializes start/stop. Held across the sink open and the join.
    control: Mutex<Control>,
    status: StdMutex<Status>,
}

struct Control {
    reader: Option<ChannelReader>,
    task: Option<CaptureTask>,
}

struct Status {
    state: SessionState,
    finished: Option<watch::Receiver<bool>>,
}

impl CaptureSession {
    /// Validates `config` and opens its endpoint.
    ///
    /// # Errors
    ///
    /// [`CaptureError::InvalidConfig`] for a zero `buffer_size` or empty
    /// output path, [`CaptureError::Connection`] when the channel can't be
    /// opened.
    pub async fn connect(config: SessionConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        let channel = TransportChannel::open(&config.endpoint, config.connect_timeout)
            .await
            .map_err(|e| {
                error!("Unable to open {}: {}", config.endpoint, e);
                e
            })?;
        Self::with_channel(config, channel)
    }

    /// Builds a session over an already opened channel.
    pub fn with_channel(
        config: SessionConfig,
        channel: TransportChannel,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        let id = Uuid::new_v4();
        let endpoint = channel.endpoint().to_string();
        let (reader, writer) = channel.into_split();
        debug!("[{}] CaptureSession created for {}", id, endpoint);

        Ok(Self {
            id,
            config,
            endpoint,
            writer: Mutex::new(writer),
            shutdown: ShutdownCoordinator::new(),
            control: Mutex::new(Control {
                reader: Some(reader),
                task: None,
            }),
            status: StdMutex::new(Status {
                state: SessionState::Idle,
                finished: None,
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.status().state
    }

    /// Writes `command` to the channel verbatim.
    ///
    /// Allowed in every state, including while listening. Writes are
    /// serialized, so two commands never interleave on the wire. An empty
    /// command succeeds without touching the channel.
    pub async fn send_command(&self, command: &str) -> Result<(), CaptureError> {
        if command.is_empty() {
            debug!("[{}] Empty command, nothing sent", self.id);
            return Ok(());
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(command.as_bytes()).await.map_err(|e| {
            warn!("[{}] Failed to send command {:?}: {}", self.id, command, e);
            e
        })?;
        info!("[{}] Command sent: {}", self.id, command.trim_end());
        Ok(())
    }

    /// Opens the output file and spawns the capture task.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidState`] unless the session is idle.
    /// - [`CaptureError::OutputUnavailable`] when the file can't be created;
    ///   the session stays idle with its channel open and no task runs.
    pub async fn start_listening(&self) -> Result<(), CaptureError> {
        let mut control = self.control.lock().await;

        let state = self.state();
        if state != SessionState::Idle {
            return Err(CaptureError::InvalidState(format!(
                "start_listening called while {:?}",
                state
            )));
        }
        let Some(reader) = control.reader.take() else {
            return Err(CaptureError::InvalidState(
                "channel reader already consumed".to_string(),
            ));
        };

        let sink = match OutputSink::create(&self.config.output_path).await {
            Ok(sink) if self.config.mirror_to_console => sink.with_console_mirror(),
            Ok(sink) => sink,
            Err(e) => {
                error!("[{}] Failed to open output file: {}", self.id, e);
                control.reader = Some(reader);
                return Err(e);
            }
        };

        let (done_tx, done_rx) = watch::channel(false);
        let capture = CaptureLoop {
            session_id: self.id,
            endpoint: self.endpoint.clone(),
            buffer_size: self.config.buffer_size,
            reader,
            sink,
            shutdown: self.shutdown.clone(),
        };
        control.task = Some(tokio::spawn(async move {
            let result = capture.run().await;
            let _ = done_tx.send(true);
            result
        }));

        let mut status = self.status();
        status.state = SessionState::Listening;
        status.finished = Some(done_rx);
        info!(
            "[{}] Listening on {} into {}",
            self.id,
            self.endpoint,
            self.config.output_path.display()
        );
        Ok(())
    }

    /// Signals the capture task and waits for it to exit.
    ///
    /// The first call after `start_listening` returns the capture outcome:
    /// the summary, or the read/write error that ended the loop early. Every
    /// other call returns `Ok(None)` without blocking on the task. Stopping an
    /// idle session moves it straight to `Stopped`.
    pub async fn stop_listening(&self) -> Result<Option<CaptureSummary>, CaptureError> {
        let mut control = self.control.lock().await;

        self.shutdown.signal();
        let previous = std::mem::replace(&mut self.status().state, SessionState::Stopped);
        let task = control.task.take();

        match (previous, task) {
            (SessionState::Listening, Some(task)) => {
                debug!("[{}] Waiting for capture task", self.id);
                let outcome = task.await.map_err(|e| {
                    error!("[{}] Capture task failed: {}", self.id, e);
                    CaptureError::CaptureTask(e.to_string())
                })?;
                info!("[{}] Listening stopped", self.id);
                outcome.map(Some)
            }
            (SessionState::Stopped, _) => {
                debug!("[{}] stop_listening: already stopped", self.id);
                Ok(None)
            }
            _ => {
                debug!("[{}] stop_listening before start", self.id);
                Ok(None)
            }
        }
    }

    /// Resolves once the capture task has left its loop, for whatever
    /// reason. Returns immediately if listening never started.
    pub async fn wait_for_capture_end(&self) {
        let finished = self.status().finished.clone();
        if let Some(mut finished) = finished {
            // Err means the sender is gone, i.e. the task is gone too.
            let _ = finished.wait_for(|done| *done).await;
        }
    }

    /// `true` once the capture task has exited on its own or been stopped.
    pub fn capture_finished(&self) -> bool {
        match self.status().finished.as_ref() {
            Some(finished) => *finished.borrow() || finished.has_changed().is_err(),
            None => false,
        }
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shutdown.signal();
        if let Some(task) = self.control.get_mut().task.take() {
            warn!("[{}] Session dropped while listening, aborting capture", self.id);
            task.abort();
        }
    }
}

struct CaptureLoop {
    session_id: Uuid,
    endpoint: String,
    buffer_size: usize,
    reader: ChannelReader,
    sink: OutputSink,
    shutdown: ShutdownCoordinator,
}

impl CaptureLoop {
    async fn run(mut self) -> Result<CaptureSummary, CaptureError> {
        let id = self.session_id;
        let started_at = Utc::now();
        let mut buf = vec![0u8; self.buffer_size];
        let mut chunks = 0u64;
        trace!("[{}] capture task started", id);

        let end = loop {
            let read = tokio::select! {
                biased;
                // Data already waiting on the channel wins over a pending stop.
                read = self.reader.read_some(&mut buf) => Some(read),
                _ = self.shutdown.wait() => None,
            };
            let Some(read) = read else {
                debug!("[{}] Stop requested while waiting for data", id);
                break CaptureEnd::Stopped;
            };

            match read {
                Ok(ReadOutcome::EndOfStream) => {
                    info!("[{}] Connection closed by peer", id);
                    break CaptureEnd::EndOfStream;
                }
                Ok(ReadOutcome::Data(n)) => {
                    let chunk = &buf[..n];
                    if let Err(e) = self.sink.write(chunk).await {
                        error!("[{}] Capture aborted: {}", id, e);
                        return Err(e);
                    }
                    chunks += 1;
                    let preview = &chunk[..n.min(PREVIEW_LEN)];
                    trace!(
                        "[{}] captured {} bytes: {}{}",
                        id,
                        n,
                        String::from_utf8_lossy(preview),
                        if n > PREVIEW_LEN { " ..." } else { "" }
                    );
                    if self.shutdown.is_signaled() {
                        debug!("[{}] Stop requested after chunk", id);
                        break CaptureEnd::Stopped;
                    }
                }
                Err(e) => {
                    error!("[{}] Capture aborted: {}", id, e);
                    return Err(e);
                }
            }
        };

        let summary = CaptureSummary {
            session_id: id,
            endpoint: self.endpoint,
            output_path: self.sink.path().to_path_buf(),
            started_at,
            ended_at: Utc::now(),
            bytes_captured: self.sink.bytes_written(),
            chunks,
            end,
        };
        info!(
            "[{}] Finalized capture: bytes={}, chunks={}, end={:?}, duration={:?}",
            id,
            summary.bytes_captured,
            summary.chunks,
            summary.end,
            summary.ended_at - summary.started_at
        );
        Ok(summary)
    }
}
