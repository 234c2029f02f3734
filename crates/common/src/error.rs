//! Common error types for the LVS crates.

use std::fmt;

/// A specialized Result type for LVS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for LVS operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{command} failed (exit status {}): {stderr}", exit_status(.status))]
    Command {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Invalid service type: {0:?}")]
    InvalidServiceType(String),

    #[error("Invalid service scheduler: {0:?}")]
    InvalidServiceScheduler(String),

    #[error("Invalid forwarding method: {0:?}")]
    InvalidForwarder(String),

    #[error("Invalid server port {server}: must match service port {service} unless masquerading")]
    InvalidServerPort { service: u16, server: u16 },

    #[error("Invalid service port: port 0 requires a persistent service")]
    InvalidServicePort,

    #[error("Invalid firewall mark: {0:?}")]
    InvalidFirewallMark(String),

    #[error("Invalid netmask: {0:?}")]
    InvalidNetmask(String),

    #[error("Invalid weight {0}: must be between 0 and 65535")]
    InvalidWeight(u32),

    #[error("Invalid thresholds: lower {lower} exceeds upper {upper}")]
    InvalidThreshold { upper: u32, lower: u32 },

    #[error("ipvsadm terminated prematurely")]
    PrematureEof,

    #[error("Unexpected token: {0:?}")]
    UnexpectedToken(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn exit_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "unknown".to_string(), |code| code.to_string())
}

impl Error {
    /// Create a new command failure error.
    pub fn command(command: impl fmt::Display, status: Option<i32>, stderr: impl Into<String>) -> Self {
        Error::Command {
            command: command.to_string(),
            status,
            stderr: stderr.into(),
        }
    }

    /// Create a new unexpected token error.
    pub fn unexpected(token: impl Into<String>) -> Self {
        Error::UnexpectedToken(token.into())
    }

    /// Whether this error comes from a rejected field value rather than
    /// from running or parsing the external tool.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidServiceType(_)
                | Error::InvalidServiceScheduler(_)
                | Error::InvalidForwarder(_)
                | Error::InvalidServerPort { .. }
                | Error::InvalidServicePort
                | Error::InvalidFirewallMark(_)
                | Error::InvalidNetmask(_)
                | Error::InvalidWeight(_)
                | Error::InvalidThreshold { .. }
        )
    }
}
