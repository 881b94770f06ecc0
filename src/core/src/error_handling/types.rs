use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    MissingEndpoint,
    BadEndpoint(String),
    NotInRange(String),
    Conflict(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::MissingEndpoint => write!(f, "No TCP or serial endpoint configured"),
            ConfigError::BadEndpoint(e) => write!(f, "Endpoint error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::Conflict(e) => write!(f, "Conflicting options: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures raised by the capture core.
///
/// `Connection` and `OutputUnavailable` come back synchronously from setup
/// calls. `Read` and `OutputWrite` happen inside the capture task and are
/// handed back by `stop_listening`.
#[derive(Debug)]
pub enum CaptureError {
    /// The channel could not be opened (resolve, connect or device open).
    Connection { endpoint: String, source: std::io::Error },
    /// A command write to the channel failed.
    Write(std::io::Error),
    /// The capture read failed for a reason other than end of stream.
    Read(std::io::Error),
    /// The destination file could not be created.
    OutputUnavailable { path: String, source: std::io::Error },
    /// Writing captured bytes to the destination failed.
    OutputWrite(std::io::Error),
    /// The operation is not allowed in the session's current state.
    InvalidState(String),
    /// The session configuration was rejected before connecting.
    InvalidConfig(String),
    /// The capture task panicked or was cancelled before reporting.
    CaptureTask(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Connection { endpoint, source } => {
                write!(f, "Connection to {} failed: {}", endpoint, source)
            }
            CaptureError::Write(e) => write!(f, "Channel write error: {}", e),
            CaptureError::Read(e) => write!(f, "Channel read error: {}", e),
            CaptureError::OutputUnavailable { path, source } => {
                write!(f, "Output file {} unavailable: {}", path, source)
            }
            CaptureError::OutputWrite(e) => write!(f, "Output write error: {}", e),
            CaptureError::InvalidState(e) => write!(f, "Invalid session state: {}", e),
            CaptureError::InvalidConfig(e) => write!(f, "Invalid session configuration: {}", e),
            CaptureError::CaptureTask(e) => write!(f, "Capture task failed: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Connection { source, .. }
            | CaptureError::OutputUnavailable { source, .. } => Some(source),
            CaptureError::Write(e) | CaptureError::Read(e) | CaptureError::OutputWrite(e) => {
                Some(e)
            }
            CaptureError::InvalidState(_)
            | CaptureError::InvalidConfig(_)
            | CaptureError::CaptureTask(_) => None,
        }
    }
}
