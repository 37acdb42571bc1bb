// Copyright (C) 2019-2026 The gossipmap authors.
// This file is part of the gossipmap library.

// The gossipmap library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The gossipmap library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the gossipmap library. If not, see <https://www.gnu.org/licenses/>.

//! Configuration structs for the crawler and pinger binaries (spec §6).
//!
//! The original crawler reads an INI file with `configparser.ConfigParser`.
//! We keep the same option names (one struct field per option, `snake_case`
//! letter-for-letter) but deserialize from TOML with `serde`, the way the
//! rest of this codebase's ecosystem favors typed config over hand-parsed
//! INI.

use std::{fmt, path::Path, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("could not parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("magic_number must be a hex string: {0}")]
    BadMagicNumber(String),
    #[error("tor_proxies entry must be host:port, got {0}")]
    BadProxyEntry(String),
}

/// Process role, the second positional CLI argument (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub fn is_master(self) -> bool {
        matches!(self, Role::Master)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Master => "master",
            Role::Slave => "slave",
        })
    }
}

/// A `host:port` pair, used for `tor_proxies`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl FromStr for HostPort {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| ConfigError::BadProxyEntry(s.to_string()))?;
        let port: u16 = port.parse().map_err(|_| ConfigError::BadProxyEntry(s.to_string()))?;
        Ok(HostPort { host: host.to_string(), port })
    }
}

fn parse_magic_number(hex_str: &str) -> Result<[u8; 4], ConfigError> {
    let bytes = hex::decode(hex_str).map_err(|_| ConfigError::BadMagicNumber(hex_str.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::BadMagicNumber(hex_str.to_string()))
}

/// Returns `snapshot:{hex_lowercase(magic_number)}`, the pub/sub channel
/// name from spec §6.
pub fn snapshot_channel(magic_number: [u8; 4]) -> String {
    format!("snapshot:{}", hex::encode(magic_number))
}

fn nonempty_lines(raw: &str) -> Vec<String> {
    raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}

/// The `[crawl]` section, one field per option named in spec §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CrawlerConfig {
    pub logfile: String,
    #[serde(default)]
    pub log_to_console: bool,
    pub magic_number: String,
    pub port: u16,
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub seeders: String,
    pub workers: usize,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub source_address: String,
    pub protocol_version: u32,
    pub user_agent: String,
    pub services: u64,
    #[serde(default)]
    pub relay: bool,
    pub socket_timeout: u64,
    pub cron_delay: u64,
    pub snapshot_delay: u64,
    pub addr_ttl: u64,
    pub addr_ttl_var: u64,
    pub max_age: i64,
    pub peers_per_node: usize,
    #[serde(default)]
    pub ipv6: bool,
    pub ipv6_prefix: u8,
    pub nodes_per_ipv6_prefix: u64,
    #[serde(default)]
    pub include_asns: String,
    #[serde(default)]
    pub include_asns_from_url: String,
    #[serde(default)]
    pub exclude_asns: String,
    #[serde(default)]
    pub exclude_private: bool,
    #[serde(default)]
    pub exclude_ipv4_networks: String,
    #[serde(default)]
    pub exclude_ipv6_networks: String,
    #[serde(default)]
    pub exclude_ipv4_bogons: bool,
    #[serde(default)]
    pub exclude_ipv6_bogons: bool,
    #[serde(default)]
    pub exclude_ipv4_networks_from_url: String,
    #[serde(default)]
    pub exclude_ipv6_networks_from_url: String,
    #[serde(default)]
    pub onion: bool,
    #[serde(default)]
    pub tor_proxies: String,
    #[serde(default)]
    pub onion_nodes: String,
    #[serde(default)]
    pub include_checked: bool,
    pub crawl_dir: String,
}

impl CrawlerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        #[derive(Deserialize)]
        struct Wrapper {
            crawl: CrawlerConfig,
        }
        let wrapper: Wrapper = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(wrapper.crawl)
    }

    pub fn magic_number(&self) -> Result<[u8; 4], ConfigError> {
        parse_magic_number(&self.magic_number)
    }

    pub fn seeders(&self) -> Vec<String> {
        nonempty_lines(&self.seeders)
    }

    pub fn onion_nodes(&self) -> Vec<String> {
        nonempty_lines(&self.onion_nodes)
    }

    pub fn include_asns(&self) -> Option<Vec<String>> {
        let trimmed = self.include_asns.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(nonempty_lines(trimmed))
        }
    }

    pub fn exclude_asns(&self) -> Option<Vec<String>> {
        let trimmed = self.exclude_asns.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(nonempty_lines(trimmed))
        }
    }

    pub fn tor_proxies(&self) -> Result<Vec<HostPort>, ConfigError> {
        nonempty_lines(&self.tor_proxies).into_iter().map(|l| HostPort::from_str(&l)).collect()
    }
}

/// The `[ping]` section, one field per option named in spec §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PingerConfig {
    pub logfile: String,
    #[serde(default)]
    pub log_to_console: bool,
    pub magic_number: String,
    #[serde(default)]
    pub db: i64,
    pub workers: usize,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub source_address: String,
    pub protocol_version: u32,
    pub user_agent: String,
    pub services: u64,
    #[serde(default)]
    pub relay: bool,
    pub socket_timeout: u64,
    pub cron_delay: u64,
    pub rtt_ttl: u64,
    pub inv_ttl: u64,
    pub version_delay: u64,
    pub ipv6_prefix: u8,
    pub nodes_per_ipv6_prefix: u64,
    #[serde(default)]
    pub onion: bool,
    #[serde(default)]
    pub tor_proxies: String,
    pub crawl_dir: String,
}

impl PingerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        #[derive(Deserialize)]
        struct Wrapper {
            ping: PingerConfig,
        }
        let wrapper: Wrapper = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(wrapper.ping)
    }

    pub fn magic_number(&self) -> Result<[u8; 4], ConfigError> {
        parse_magic_number(&self.magic_number)
    }

    pub fn tor_proxies(&self) -> Result<Vec<HostPort>, ConfigError> {
        nonempty_lines(&self.tor_proxies).into_iter().map(|l| HostPort::from_str(&l)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE_CRAWL_TOML: &str = r#"
        [crawl]
        logfile = "crawl.log"
        magic_number = "f9beb4d9"
        port = 8333
        seeders = "seed.example.com"
        workers = 64
        protocol_version = 70016
        user_agent = "/gossipmap:0.1.0/"
        services = 9
        socket_timeout = 15
        cron_delay = 10
        snapshot_delay = 60
        addr_ttl = 21600
        addr_ttl_var = 10
        max_age = 10800
        peers_per_node = 100
        ipv6_prefix = 64
        nodes_per_ipv6_prefix = 4
        crawl_dir = "/tmp/crawl"
    "#;

    #[test]
    fn parses_minimal_crawler_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            crawl: CrawlerConfig,
        }
        let wrapper: Wrapper = toml::from_str(SAMPLE_CRAWL_TOML).unwrap();
        let conf = wrapper.crawl;
        assert_eq!(conf.port, 8333);
        assert_eq!(conf.seeders(), vec!["seed.example.com".to_string()]);
        assert_eq!(conf.magic_number().unwrap(), [0xf9, 0xbe, 0xb4, 0xd9]);
    }

    #[test]
    fn snapshot_channel_is_hex_lowercase() {
        assert_eq!(snapshot_channel([0xf9, 0xbe, 0xb4, 0xd9]), "snapshot:f9beb4d9");
    }

    #[test]
    fn tor_proxy_parses_host_port() {
        assert_eq!(
            HostPort::from_str("127.0.0.1:9050").unwrap(),
            HostPort { host: "127.0.0.1".to_string(), port: 9050 }
        );
    }
}
