//! `host:port` addressing used throughout the Atlas interface (spec §4.5).

use std::fmt;
use std::net::ToSocketAddrs;

use crate::error::{AtlasError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn parse(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AtlasError::InvalidHostPort(s.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AtlasError::InvalidHostPort(s.to_string()))?;
        if host.is_empty() {
            return Err(AtlasError::InvalidHostPort(s.to_string()));
        }
        Ok(Self { host: host.to_string(), port })
    }

    pub fn to_socket_addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn resolves(&self) -> bool {
        self.to_socket_addr_string().to_socket_addrs().is_ok()
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let hp = HostPort::parse("node.example.com:6264").unwrap();
        assert_eq!(hp.host, "node.example.com");
        assert_eq!(hp.port, 6264);
    }

    #[test]
    fn rejects_missing_port() {
        assert!(HostPort::parse("node.example.com").is_err());
    }

    #[test]
    fn rejects_empty_host() {
        assert!(HostPort::parse(":6264").is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let hp = HostPort::parse("1.2.3.4:80").unwrap();
        assert_eq!(hp.to_string(), "1.2.3.4:80");
    }
}
