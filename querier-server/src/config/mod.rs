use crate::config::clickhouse::ClickhouseConfig;
use confique::Config;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub mod clickhouse;

/// Environment variable holding the path of the optional TOML config file
pub const CONFIG_FILE_ENV: &str = "QUERIER_CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "/etc/querier/querier.toml";

/// Main configuration structure for the querier server
#[derive(Debug, Config, Clone)]
pub struct QuerierConfig {
    /// The address the server will listen on (default: 0.0.0.0)
    #[config(env = "QUERIER_HOST", default = "0.0.0.0")]
    pub host: String,

    /// The port the server will listen on (default: 20416)
    #[config(env = "QUERIER_PORT", default = 20416)]
    pub port: u16,

    /// Debug mode (attaches execution details to query results)
    #[config(env = "QUERIER_DEBUG", default = false)]
    pub debug: bool,

    /// Where the `ip` argument of a query comes from (default: request)
    #[config(env = "QUERIER_IP_SOURCE", default = "request")]
    pub ip_source: IpSource,

    /// ClickHouse backend configuration
    #[config(nested)]
    pub clickhouse: ClickhouseConfig,
}

impl QuerierConfig {
    /// Loads the configuration from the environment and the config file named by
    /// `QUERIER_CONFIG_FILE`. A missing file is not an error.
    pub fn new() -> Result<Self, confique::Error> {
        let file =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(Some(Path::new(&file)))
    }

    /// Loads the configuration with environment variables taking precedence over `file`
    pub fn from_sources(file: Option<&Path>) -> Result<Self, confique::Error> {
        let mut builder = Self::builder().env();
        if let Some(file) = file {
            builder = builder.file(file);
        }
        builder.load()
    }

    #[cfg(test)]
    pub fn for_test_with_mock(clickhouse_mock: &wiremock::MockServer) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Let the OS choose a port
            debug: false,
            ip_source: IpSource::Request,
            clickhouse: ClickhouseConfig {
                host: clickhouse_mock.address().ip().to_string(),
                port: clickhouse_mock.address().port(),
                user: "querier".to_string(),
                password: "secret".to_string(),
                database: "flow_log".to_string(),
                query_timeout: 5,
                allowed_hosts: String::new(),
            },
        }
    }
}

/// Source of the `ip` argument handed to the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpSource {
    /// The `ip` query parameter supplied by the client
    #[default]
    Request,
    /// The configured ClickHouse host, ignoring the client
    Config,
    /// The TCP peer address of the connection
    Peer,
}

impl FromStr for IpSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" => Ok(IpSource::Request),
            "config" => Ok(IpSource::Config),
            "peer" => Ok(IpSource::Peer),
            other => Err(format!(
                "invalid ip source '{other}', expected one of: request, config, peer"
            )),
        }
    }
}

impl fmt::Display for IpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IpSource::Request => "request",
            IpSource::Config => "config",
            IpSource::Peer => "peer",
        };
        f.write_str(name)
    }
}

impl<'de> Deserialize<'de> for IpSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
