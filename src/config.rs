//! Agent configuration
//!
//! Values come from the command line (or matching environment variables) in
//! the `dlogger` binary; this module only holds the typed result.

use std::fmt;
use std::time::Duration;

/// Default master address
pub const DEFAULT_MASTER_HOST: &str = "127.0.0.1";
/// Default master port
pub const DEFAULT_MASTER_PORT: u16 = 1337;
/// Role tag this agent registers under by default
pub const DEFAULT_IDENTITY: &str = "datalogger";
/// Default time allowed for connect plus registration
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Network address of the master
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEndpoint {
    pub host: String,
    pub port: u16,
}

impl MasterEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for MasterEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_MASTER_HOST, DEFAULT_MASTER_PORT)
    }
}

impl fmt::Display for MasterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// What to do when the initial connection to the master fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConnectPolicy {
    /// Log the failure and keep running without a transport until signalled
    #[default]
    Continue,
    /// Exit immediately with a non-zero status
    Abort,
}

/// Static configuration for one agent process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub master: MasterEndpoint,
    pub identity: String,
    pub connect_timeout: Duration,
    pub on_connect_failure: ConnectPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            master: MasterEndpoint::default(),
            identity: DEFAULT_IDENTITY.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            on_connect_failure: ConnectPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(MasterEndpoint::new("10.0.0.2", 1337).to_string(), "10.0.0.2:1337");
        assert_eq!(MasterEndpoint::new("::1", 80).to_string(), "[::1]:80");
    }

    #[test]
    fn test_defaults_continue_on_failure() {
        let config = AgentConfig::default();
        assert_eq!(config.on_connect_failure, ConnectPolicy::Continue);
        assert_eq!(config.identity, "datalogger");
        assert_eq!(config.master.port, DEFAULT_MASTER_PORT);
    }
}
