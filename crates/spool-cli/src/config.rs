// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Demo configuration.
//!
//! Optional JSON file passed with `--config`; every field has a default and
//! positional arguments override what the file says.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub host: String,
    pub port: u16,
    /// Bytes a server handler reads from each client.
    pub read_chunk: usize,
    /// Requests fired by `spool request`.
    pub requests: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            read_chunk: 8192,
            requests: 3,
        }
    }
}

impl DemoConfig {
    pub fn load_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.read_chunk == 0 {
            return Err("read_chunk must be at least 1".to_string());
        }
        if self.requests == 0 {
            return Err("requests must be at least 1".to_string());
        }
        Ok(())
    }

    /// Override host and port from a `host:port` argument.
    pub fn set_addr(&mut self, addr: &str) -> Result<(), String> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got '{}'", addr))?;
        self.port = port
            .parse()
            .map_err(|_| format!("invalid port '{}' in '{}'", port, addr))?;
        self.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        Ok(())
    }

    pub fn set_requests(&mut self, count: &str) -> Result<(), String> {
        self.requests = count
            .parse()
            .map_err(|_| format!("invalid request count '{}'", count))?;
        self.validate()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| format!("cannot resolve {}:{}: {}", self.host, self.port, e))?
            .next()
            .ok_or_else(|| format!("{}:{} resolved to nothing", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spool.json");
        fs::write(&path, r#"{ "port": 9090, "requests": 5 }"#).unwrap();

        let config = DemoConfig::load_file(&path).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.read_chunk, 8192);
        assert_eq!(config.requests, 5);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spool.json");
        fs::write(&path, r#"{ "prot": 9090 }"#).unwrap();

        let err = DemoConfig::load_file(&path).unwrap_err();
        assert!(err.contains("failed to parse"), "{}", err);
    }

    #[test]
    fn zero_requests_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spool.json");
        fs::write(&path, r#"{ "requests": 0 }"#).unwrap();
        assert!(DemoConfig::load_file(&path).is_err());

        let mut config = DemoConfig::default();
        assert!(config.set_requests("0").is_err());
        assert!(config.set_requests("many").is_err());
    }

    #[test]
    fn address_argument_overrides_host_and_port() {
        let mut config = DemoConfig::default();
        config.set_addr("localhost:3000").unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3000);

        config.set_addr("[::1]:4000").unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.socket_addr().unwrap().port(), 4000);

        assert!(config.set_addr("no-port").is_err());
        assert!(config.set_addr("host:99999").is_err());
    }
}
