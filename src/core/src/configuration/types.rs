use clap::Parser;
use std::path::PathBuf;

use crate::error_handling::types::ConfigError;
use crate::transport::types::EndpointDescriptor;

/// Command-line arguments of the `port-listener` binary.
///
/// Every flag overrides the matching key of the `--config` file when both
/// are given.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "port-listener")]
#[command(version)]
#[command(about = "Configure a TCP or serial instrument and record everything it sends")]
pub struct CommandLine {
    /// TOML configuration file
    #[arg(short, long, env = "PORT_LISTENER_CONFIG")]
    pub config: Option<PathBuf>,

    /// TCP endpoint as HOST:PORT
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "serial")]
    pub tcp: Option<String>,

    /// Serial device, e.g. /dev/ttyUSB0 or COM3
    #[arg(long, value_name = "DEVICE")]
    pub serial: Option<String>,

    /// Destination file. A unique name is generated if omitted or already present
    #[arg(short, long, env = "PORT_LISTENER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Read chunk size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Command sent before listening; CRLF is appended when missing. Repeatable
    #[arg(long = "command", value_name = "TEXT")]
    pub commands: Vec<String>,

    /// Stop after this many seconds; 0 waits for Ctrl-C or end of stream
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Delay between the last command and the start of capture
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Mirror captured bytes to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub echo: bool,

    /// Print the capture summary as JSON on exit
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "echo")]
    pub summary_json: bool,
}

/// Parses `HOST:PORT`. IPv6 hosts may be bracketed: `[::1]:3001`.
pub fn parse_tcp_endpoint(text: &str) -> Result<EndpointDescriptor, ConfigError> {
    let (host, port) = text
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::BadEndpoint(format!("expected HOST:PORT, got {:?}", text)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(ConfigError::BadEndpoint(format!("missing host in {:?}", text)));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| ConfigError::BadEndpoint(format!("bad port in {:?}: {}", text, e)))?;

    Ok(EndpointDescriptor::Tcp {
        host: host.to_string(),
        port,
    })
}

/// Appends the device line terminator unless the command already ends with one.
pub fn terminate_command(command: &str) -> String {
    if command.ends_with("\r\n") {
        command.to_string()
    } else {
        format!("{}\r\n", command.trim_end_matches(['\r', '\n']))
    }
}
