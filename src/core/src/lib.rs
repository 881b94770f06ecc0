pub mod configuration;
pub mod data_capture;
pub mod error_handling;
pub mod output_path;
pub mod transport;

pub use data_capture::{CaptureSession, CaptureSummary, SessionConfig, SessionState};
pub use error_handling::types::{CaptureError, ConfigError};
pub use transport::types::EndpointDescriptor;
