use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::{parse_tcp_endpoint, terminate_command, CommandLine};
use crate::data_capture::types::{SessionConfig, DEFAULT_BUFFER_SIZE};
use crate::error_handling::types::ConfigError;
use crate::transport::types::EndpointDescriptor;

const MAX_BUFFER_SIZE: usize = 1 << 20;

/// Application configuration, loaded from TOML and/or the command line.
///
/// # Examples
///
/// ```toml
/// buffer_size = 1024
/// output_path = "timea.log"
/// mirror_to_console = true
/// commands = ["LOG TIMEA ONTIME 1\r\n"]
///
/// [endpoint]
/// kind = "tcp"
/// host = "192.168.1.20"
/// port = 3001
/// ```
///
/// # Fields Overview
///
/// - `endpoint`: which transport to open; required before connecting
/// - `buffer_size`: read chunk size, `1..=1 MiB`
/// - `output_path`: requested destination, resolved by `output_path::resolve_output_path`
/// - `commands`: sent in order before listening starts; CRLF is appended to
///   any command that does not already end with it
/// - `settle_ms`: pause after the commands, e.g. while a receiver resets
/// - `duration_secs`: capture length, `0` meaning until interrupted or closed
/// - `connect_timeout_secs`: bound on TCP connection establishment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub endpoint: Option<EndpointDescriptor>,
    pub buffer_size: usize,
    pub output_path: Option<PathBuf>,
    pub commands: Vec<String>,
    pub mirror_to_console: bool,
    pub settle_ms: u64,
    pub duration_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            output_path: None,
            commands: Vec::new(),
            mirror_to_console: false,
            settle_ms: 0,
            duration_secs: 0,
            connect_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_toml(text)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.commands = config.commands.iter().map(|c| terminate_command(c)).collect();
        Ok(config)
    }

    /// Builds the configuration from the command line, starting from the
    /// `--config` file when one is given.
    pub fn from_args(args: &CommandLine) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::parse_toml(&fs::read_to_string(path)?)?,
            None => Config::default(),
        };

        if let Some(tcp) = &args.tcp {
            config.endpoint = Some(parse_tcp_endpoint(tcp)?);
        }
        if let Some(device) = &args.serial {
            config.endpoint = Some(EndpointDescriptor::Serial {
                device_path: device.clone(),
            });
        }
        if let Some(output) = &args.output {
            config.output_path = Some(output.clone());
        }
        if let Some(size) = args.buffer_size {
            config.buffer_size = size;
        }
        if !args.commands.is_empty() {
            config.commands = args.commands.iter().map(|c| terminate_command(c)).collect();
        }
        if let Some(secs) = args.duration_secs {
            config.duration_secs = secs;
        }
        if let Some(ms) = args.settle_ms {
            config.settle_ms = ms;
        }
        config.mirror_to_console |= args.echo;
        if args.summary_json && config.mirror_to_console {
            // Both would go to stdout.
            return Err(ConfigError::Conflict(
                "--summary-json cannot be combined with console mirroring".to_string(),
            ));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(ConfigError::NotInRange(format!(
                "buffer_size {} not in 1..={}",
                self.buffer_size, MAX_BUFFER_SIZE
            )));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "connect_timeout_secs must be at least 1".to_string(),
            ));
        }
        match &self.endpoint {
            None => Err(ConfigError::MissingEndpoint),
            Some(EndpointDescriptor::Tcp { host, port }) => {
                if host.trim().is_empty() {
                    Err(ConfigError::BadEndpoint("empty TCP host".to_string()))
                } else if *port == 0 {
                    Err(ConfigError::BadEndpoint("TCP port must not be 0".to_string()))
                } else {
                    Ok(())
                }
            }
            Some(EndpointDescriptor::Serial { device_path }) => {
                if device_path.trim().is_empty() {
                    Err(ConfigError::BadEndpoint("empty serial device path".to_string()))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Core session parameters for an already resolved `output_path`.
    pub fn session_config(&self, output_path: PathBuf) -> Result<SessionConfig, ConfigError> {
        let endpoint = self.endpoint.clone().ok_or(ConfigError::MissingEndpoint)?;
        Ok(SessionConfig::new(self.buffer_size, output_path, endpoint)
            .with_console_mirror(self.mirror_to_console)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs)))
    }

    pub fn capture_duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }

    pub fn settle_delay(&self) -> Option<Duration> {
        (self.settle_ms > 0).then(|| Duration::from_millis(self.settle_ms))
    }
}
