//! Real servers behind a virtual service.

use crate::types::Forwarder;
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest weight ipvsadm accepts for a real server.
pub const MAX_WEIGHT: u32 = 65535;

fn default_weight() -> u32 {
    1
}

/// A real server (destination) of an IPVS service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub host: String,

    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub forwarder: Forwarder,

    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Connection count above which the server stops receiving new connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_threshold: Option<u32>,

    /// Connection count below which an overloaded server is used again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_threshold: Option<u32>,
}

impl Server {
    /// Create a server with weight 1 and no connection thresholds.
    pub fn new(host: impl Into<String>, port: u16, forwarder: Forwarder) -> Self {
        Self {
            host: host.into(),
            port,
            forwarder,
            weight: default_weight(),
            upper_threshold: None,
            lower_threshold: None,
        }
    }

    /// Builder-style weight setter.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Builder-style threshold setter.
    pub fn with_thresholds(mut self, upper: Option<u32>, lower: Option<u32>) -> Self {
        self.upper_threshold = upper;
        self.lower_threshold = lower;
        self
    }

    /// Check the fields ipvsadm would reject.
    pub fn validate(&self) -> Result<()> {
        if self.weight > MAX_WEIGHT {
            return Err(Error::InvalidWeight(self.weight));
        }
        if let (Some(upper), Some(lower)) = (self.upper_threshold, self.lower_threshold) {
            if lower > upper {
                return Err(Error::InvalidThreshold { upper, lower });
            }
        }
        Ok(())
    }

    /// Whether this entry refers to `host:port`.
    pub fn matches(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn address(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// Arguments describing this server, as they follow `-r` on an ipvsadm command line.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            self.address(),
            self.forwarder.flag().to_string(),
            "-w".to_string(),
            self.weight.to_string(),
        ];
        if let Some(upper) = self.upper_threshold {
            args.push("-x".to_string());
            args.push(upper.to_string());
        }
        if let Some(lower) = self.lower_threshold {
            args.push("-y".to_string());
            args.push(lower.to_string());
        }
        args
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_args().join(" "))
    }
}

pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
