//! Server configuration.
//!
//! Every option can be given on the command line or through the environment.

use crate::error::ConfigError;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_OPENERZ_API: &str = "https://openerz.metaodi.ch/api";
pub const DEFAULT_TECDOTTIR_API: &str = "https://tecdottir.metaodi.ch";

/// MCP server for Zurich waste collection dates and lake weather stations
#[derive(Parser, Debug, Clone)]
#[command(name = "openerz-mcp")]
#[command(version)]
#[command(about = "MCP server for Zurich waste collection and weather station data")]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Base URL of the OpenERZ API
    #[arg(long, env = "OPENERZ_API_URL", default_value = DEFAULT_OPENERZ_API)]
    pub openerz_api_url: String,

    /// Base URL of the Tecdottir weather API
    #[arg(long, env = "TECDOTTIR_API_URL", default_value = DEFAULT_TECDOTTIR_API)]
    pub tecdottir_api_url: String,

    /// Comma-separated weather station identifiers
    #[arg(
        long,
        env = "WEATHER_STATIONS",
        value_delimiter = ',',
        default_value = "mythenquai,tiefenbrunnen"
    )]
    pub weather_stations: Vec<String>,

    /// Timeout for a single upstream HTTP request, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 8)]
    pub upstream_timeout_secs: u64,

    /// Upper bound for a whole tool call, in seconds
    #[arg(long, env = "TOOL_CALL_TIMEOUT_SECS", default_value_t = 10)]
    pub call_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            openerz_api_url: DEFAULT_OPENERZ_API.into(),
            tecdottir_api_url: DEFAULT_TECDOTTIR_API.into(),
            weather_stations: vec!["mythenquai".into(), "tiefenbrunnen".into()],
            upstream_timeout_secs: 8,
            call_timeout_secs: 10,
            verbose: false,
        }
    }
}

impl ServerConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| ConfigError::InvalidValue {
            field: "host",
            message: format!("'{}' is not an IP address", self.host),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Station identifiers with blanks removed.
    pub fn stations(&self) -> Vec<String> {
        self.weather_stations
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        for (field, url) in [
            ("openerz_api_url", &self.openerz_api_url),
            ("tecdottir_api_url", &self.tecdottir_api_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: format!("'{}' is not an http(s) URL", url),
                });
            }
        }

        if self.stations().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "weather_stations",
                message: "at least one station is required".into(),
            });
        }

        if self.upstream_timeout_secs == 0 || self.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeouts",
                message: "timeouts must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 8000);
        assert_eq!(config.call_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_command_line() {
        let config = ServerConfig::try_parse_from([
            "openerz-mcp",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--weather-stations",
            "mythenquai, ,tiefenbrunnen",
            "--call-timeout-secs",
            "3",
        ])
        .unwrap();
        assert_eq!(config.bind_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.stations(), vec!["mythenquai", "tiefenbrunnen"]);
        assert_eq!(config.call_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_validation_errors() {
        let config = ServerConfig {
            host: "localhost:80".into(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            openerz_api_url: "ftp://example.org".into(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            weather_stations: vec![" ".into()],
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            call_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
