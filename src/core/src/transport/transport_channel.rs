//! Byte channel over TCP or a serial line.
//!
//! Whatever the transport, a [`TransportChannel`] is a boxed async duplex
//! stream. It is split once into a [`ChannelReader`], owned by the capture
//! task, and a [`ChannelWriter`], owned by the session for command writes.
//! Nothing above this module knows which transport is underneath.

use std::io;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;

use super::types::{EndpointDescriptor, ReadOutcome, SerialSettings, TransportKind};
use crate::error_handling::types::CaptureError;

/// Async read + write stream usable as a channel.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

type BoxedStream = Box<dyn ByteStream>;

pub struct TransportChannel {
    kind: TransportKind,
    endpoint: String,
    stream: BoxedStream,
}

impl TransportChannel {
    /// Opens the endpoint.
    ///
    /// TCP resolves `host` and connects within `connect_timeout`. Serial opens
    /// the device with [`SerialSettings::FIXED`].
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Connection`] when resolution, connection or
    /// device open fails.
    pub async fn open(
        endpoint: &EndpointDescriptor,
        connect_timeout: Duration,
    ) -> Result<Self, CaptureError> {
        let label = endpoint.to_string();
        let connection_error = |source: io::Error| CaptureError::Connection {
            endpoint: label.clone(),
            source,
        };

        let stream: BoxedStream = match endpoint {
            EndpointDescriptor::Tcp { host, port } => {
                debug!("Connecting to {}", label);
                let connect = TcpStream::connect((host.as_str(), *port));
                let socket = match tokio::time::timeout(connect_timeout, connect).await {
                    Ok(Ok(socket)) => socket,
                    Ok(Err(e)) => return Err(connection_error(e)),
                    Err(_) => {
                        return Err(connection_error(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("no connection after {:?}", connect_timeout),
                        )))
                    }
                };
                // Telemetry lines are small; don't let Nagle sit on commands.
                socket.set_nodelay(true).map_err(&connection_error)?;
                Box::new(socket)
            }
            EndpointDescriptor::Serial { device_path } => {
                let settings = SerialSettings::FIXED;
                debug!("Opening {} at {} baud", label, settings.baud_rate);
                let port = tokio_serial::new(device_path.as_str(), settings.baud_rate)
                    .data_bits(settings.data_bits)
                    .parity(settings.parity)
                    .stop_bits(settings.stop_bits)
                    .flow_control(settings.flow_control)
                    .open_native_async()
                    .map_err(|e| connection_error(io::Error::from(e)))?;
                Box::new(port)
            }
        };

        info!("Channel open: {}", label);
        Ok(Self {
            kind: endpoint.kind(),
            endpoint: label,
            stream,
        })
    }

    /// Wraps an already connected stream, e.g. an in-memory duplex.
    pub fn from_stream<S>(kind: TransportKind, endpoint: impl Into<String>, stream: S) -> Self
    where
        S: ByteStream + 'static,
    {
        Self {
            kind,
            endpoint: endpoint.into(),
            stream: Box::new(stream),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn into_split(self) -> (ChannelReader, ChannelWriter) {
        let (reader, writer) = tokio::io::split(self.stream);
        (ChannelReader { inner: reader }, ChannelWriter { inner: writer })
    }
}

pub struct ChannelReader {
    inner: ReadHalf<BoxedStream>,
}

impl ChannelReader {
    /// Blocks until some bytes are available, the peer closes, or the read
    /// fails. Returns at most `buf.len()` bytes.
    ///
    /// Cancel-safe: dropping the future before completion loses no data.
    pub async fn read_some(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, CaptureError> {
        loop {
            match self.inner.read(buf).await {
                Ok(0) => return Ok(ReadOutcome::EndOfStream),
                Ok(n) => return Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CaptureError::Read(e)),
            }
        }
    }
}

pub struct ChannelWriter {
    inner: WriteHalf<BoxedStream>,
}

impl ChannelWriter {
    /// Writes every byte of `bytes` then flushes. There is no partial success.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        self.inner
            .write_all(bytes)
            .await
            .map_err(CaptureError::Write)?;
        self.inner.flush().await.map_err(CaptureError::Write)
    }
}
