pub mod transport_channel;
pub mod types;

pub use transport_channel::{ByteStream, ChannelReader, ChannelWriter, TransportChannel};
pub use types::{EndpointDescriptor, ReadOutcome, SerialSettings, TransportKind, SERIAL_BAUD_RATE};
