use crate::regions;
use std::{net::IpAddr, num::NonZeroU32, path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Nameserver file {0} is empty or only contains comments")]
    EmptyNameservers(String),
    #[error("Not a valid nameserver IP address: {0}")]
    InvalidNameserver(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NameserverSelection {
    #[default]
    System,
    Custom(Vec<IpAddr>),
}

impl NameserverSelection {
    pub fn custom<I, S>(servers: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let servers = servers
            .into_iter()
            .map(|s| parse_nameserver(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if servers.is_empty() {
            Ok(Self::System)
        } else {
            Ok(Self::Custom(servers))
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Pause after every this many HTTP requests.
    pub requests: u64,
    pub pause: Duration,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub threads: usize,
    pub nameservers: NameserverSelection,
    pub rate_limit: Option<RateLimit>,
    pub requests_per_second: Option<NonZeroU32>,
    pub quick_scan: bool,
    /// Raw brute-force wordlist, cleaned per check.
    pub brute_list: String,
    pub azure_regions: Vec<String>,
    pub gcp_regions: Vec<String>,
    pub firebase_apps: bool,
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 25,
            nameservers: NameserverSelection::System,
            rate_limit: Some(RateLimit {
                requests: 8000,
                pause: Duration::from_secs(240),
            }),
            requests_per_second: None,
            quick_scan: false,
            brute_list: String::new(),
            azure_regions: regions::DEFAULT_AZURE_REGIONS
                .iter()
                .map(|r| r.to_string())
                .collect(),
            gcp_regions: regions::DEFAULT_GCP_REGIONS
                .iter()
                .map(|r| r.to_string())
                .collect(),
            firebase_apps: false,
            show_progress: false,
        }
    }
}

fn parse_nameserver(value: &str) -> Result<IpAddr, ConfigError> {
    let value = value.trim();
    value
        .parse()
        .map_err(|_| ConfigError::InvalidNameserver(value.to_string()))
}

/// One nameserver IP per line; blank lines and `#` comments are skipped.
pub fn parse_nameservers(content: &str) -> Result<Vec<IpAddr>, ConfigError> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_nameserver)
        .collect()
}

pub fn read_nameservers(path: &Path) -> Result<Vec<IpAddr>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let servers = parse_nameservers(&content)?;
    if servers.is_empty() {
        return Err(ConfigError::EmptyNameservers(path.display().to_string()));
    }
    Ok(servers)
}
