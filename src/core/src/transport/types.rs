use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Baud rate applied to every serial endpoint.
pub const SERIAL_BAUD_RATE: u32 = 9600;

/// Identifies which transport to open and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EndpointDescriptor {
    Tcp { host: String, port: u16 },
    Serial { device_path: String },
}

impl EndpointDescriptor {
    pub fn kind(&self) -> TransportKind {
        match self {
            EndpointDescriptor::Tcp { .. } => TransportKind::Tcp,
            EndpointDescriptor::Serial { .. } => TransportKind::Serial,
        }
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointDescriptor::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            EndpointDescriptor::Serial { device_path } => write!(f, "serial://{}", device_path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    Tcp,
    Serial,
}

/// Fixed serial line parameters: 8N1, no flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl SerialSettings {
    pub const FIXED: SerialSettings = SerialSettings {
        baud_rate: SERIAL_BAUD_RATE,
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
        flow_control: FlowControl::None,
    };
}

/// Result of one successful channel read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were placed at the front of the caller's buffer.
    Data(usize),
    /// The peer closed the stream cleanly.
    EndOfStream,
}
