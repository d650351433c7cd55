use std::fmt;
use std::str::FromStr;

use crate::error::StreamError;

/// Remote `host:port` the streamer connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Port must be in `1..=65535`, host non-empty.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, StreamError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(StreamError::InvalidHost(host));
        }
        if port == 0 {
            return Err(StreamError::InvalidPort(0));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = StreamError;

    /// Accepts `host:port` and `[v6-addr]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| StreamError::InvalidHost(s.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port: u32 = port
            .parse()
            .map_err(|_| StreamError::InvalidHost(s.to_string()))?;
        let port = u16::try_from(port).map_err(|_| StreamError::InvalidPort(port))?;
        Self::new(host, port)
    }
}
