//! Service configuration.
//!
//! Resolution order per setting: command line / environment, then the
//! optional YAML file, then built-in defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use orderbook::MAX_RECORDS;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable with colours
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "exchange-service", version, about = "Order matching engine service")]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, env = "MATCHBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP/WebSocket listen address
    #[arg(long, env = "MATCHBOOK_HTTP_ADDR")]
    pub http_addr: Option<String>,

    /// Milliseconds between market picture sweeps
    #[arg(long, env = "MATCHBOOK_SNAPSHOT_INTERVAL_MS")]
    pub snapshot_interval_ms: Option<u64>,

    /// Records per published market picture (1-10)
    #[arg(long, env = "MATCHBOOK_SNAPSHOT_MAX_RECORDS")]
    pub snapshot_max_records: Option<usize>,

    /// host:port to send market pictures to over UDP
    #[arg(long, env = "MATCHBOOK_UDP_TARGET")]
    pub udp_target: Option<String>,

    #[arg(long, env = "MATCHBOOK_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Do not read operator commands from stdin
    #[arg(long)]
    pub no_console: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub http_addr: Option<String>,
    pub snapshot_interval_ms: Option<u64>,
    pub snapshot_max_records: Option<usize>,
    pub udp_target: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("snapshot interval must be greater than zero")]
    ZeroInterval,

    #[error("snapshot max records must be between 1 and 10, got {0}")]
    MaxRecordsOutOfRange(usize),

    #[error("invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http_addr: SocketAddr,
    pub snapshot_interval: Duration,
    pub snapshot_max_records: usize,
    pub udp_target: Option<SocketAddr>,
    pub log_format: LogFormat,
    pub console: bool,
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

impl Config {
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_path(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(cli, file)?)
    }

    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let http_addr = cli
            .http_addr
            .or(file.http_addr)
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let interval_ms = cli
            .snapshot_interval_ms
            .or(file.snapshot_interval_ms)
            .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_MS);
        let max_records = cli
            .snapshot_max_records
            .or(file.snapshot_max_records)
            .unwrap_or(MAX_RECORDS);

        if interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !(1..=MAX_RECORDS).contains(&max_records) {
            return Err(ConfigError::MaxRecordsOutOfRange(max_records));
        }

        let udp_target = cli
            .udp_target
            .or(file.udp_target)
            .map(|addr| parse_addr("udp_target", &addr))
            .transpose()?;

        Ok(Self {
            http_addr: parse_addr("http_addr", &http_addr)?,
            snapshot_interval: Duration::from_millis(interval_ms),
            snapshot_max_records: max_records,
            udp_target,
            log_format: cli.log_format.or(file.log_format).unwrap_or_default(),
            console: !cli.no_console,
        })
    }
}
