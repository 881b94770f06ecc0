pub mod capture_session;
pub mod output_sink;
pub mod shutdown;
pub mod types;

pub use capture_session::CaptureSession;
pub use output_sink::OutputSink;
pub use shutdown::ShutdownCoordinator;
pub use types::{CaptureEnd, CaptureSummary, SessionConfig, SessionState};
