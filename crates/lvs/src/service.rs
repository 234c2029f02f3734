//! Virtual services and the rules that keep them acceptable to the kernel.

use crate::server::{Server, join_host_port};
use crate::types::{Protocol, Scheduler};
use common::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Persistence timeout ipvsadm applies when `-p` is given without a value.
pub const DEFAULT_PERSISTENCE: u32 = 300;

/// An IPVS virtual service together with its real servers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Service {
    /// Virtual IP address, or the firewall mark for fwmark services
    pub host: String,

    #[serde(default)]
    pub port: u16,

    #[serde(rename = "type", default)]
    pub protocol: Protocol,

    #[serde(default)]
    pub scheduler: Scheduler,

    /// Persistence timeout in seconds, 0 when connections are not persistent
    #[serde(default)]
    pub persistence: u32,

    /// Persistence granularity: a dotted mask for IPv4 services, a prefix
    /// length for IPv6 services. An empty string means no netmask.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub netmask: Option<String>,

    #[serde(default)]
    pub servers: Vec<Server>,
}

impl Service {
    /// Create a service with the default scheduler and no persistence.
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            ..Default::default()
        }
    }

    /// Create a firewall-mark service.
    pub fn fwmark(mark: u32) -> Self {
        Self::new(Protocol::FwMark, mark.to_string(), 0)
    }

    /// Builder-style scheduler setter.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Builder-style persistence setter.
    pub fn with_persistence(mut self, timeout: u32) -> Self {
        self.persistence = timeout;
        self
    }

    /// Builder-style netmask setter.
    pub fn with_netmask(mut self, netmask: impl Into<String>) -> Self {
        let netmask = netmask.into();
        self.netmask = (!netmask.is_empty()).then_some(netmask);
        self
    }

    /// Validate the service fields and every attached server.
    pub fn validate(&self) -> Result<()> {
        self.validate_fields()?;
        for server in &self.servers {
            self.check_server(server)?;
        }
        Ok(())
    }

    fn validate_fields(&self) -> Result<()> {
        match self.protocol {
            Protocol::FwMark => match self.host.parse::<u32>() {
                Ok(mark) if mark > 0 => {}
                _ => return Err(Error::InvalidFirewallMark(self.host.clone())),
            },
            Protocol::Tcp | Protocol::Udp => {
                if self.port == 0 && self.persistence == 0 {
                    return Err(Error::InvalidServicePort);
                }
            }
        }
        if let Some(netmask) = &self.netmask {
            self.validate_netmask(netmask)?;
        }
        Ok(())
    }

    /// ipvsadm reads `-M` as a dotted mask for IPv4 and as a prefix length
    /// for IPv6; a prefix on an IPv4 service would be taken as `0.0.0.N`.
    fn validate_netmask(&self, netmask: &str) -> Result<()> {
        let accepted = match self.protocol {
            Protocol::FwMark => is_ipv4_mask(netmask) || is_ipv6_prefix(netmask),
            Protocol::Tcp | Protocol::Udp if self.host.parse::<Ipv6Addr>().is_ok() => {
                is_ipv6_prefix(netmask)
            }
            Protocol::Tcp | Protocol::Udp => is_ipv4_mask(netmask),
        };
        if accepted {
            Ok(())
        } else {
            Err(Error::InvalidNetmask(netmask.to_string()))
        }
    }

    /// Validate a server on its own and against this service.
    ///
    /// Direct routing and tunneling cannot rewrite the destination port, so
    /// such servers must listen on the service port.
    pub fn check_server(&self, server: &Server) -> Result<()> {
        server.validate()?;
        if !server.forwarder.can_remap_port() && server.port != self.port {
            return Err(Error::InvalidServerPort {
                service: self.port,
                server: server.port,
            });
        }
        Ok(())
    }

    /// Look up an attached server by address.
    pub fn find_server(&self, host: &str, port: u16) -> Option<&Server> {
        self.servers.iter().find(|s| s.matches(host, port))
    }

    pub(crate) fn find_server_mut(&mut self, host: &str, port: u16) -> Option<&mut Server> {
        self.servers.iter_mut().find(|s| s.matches(host, port))
    }

    /// The service address as ipvsadm expects it: `host:port`, or the bare
    /// host when no port is set.
    pub fn address(&self) -> String {
        if self.port == 0 {
            self.host.clone()
        } else {
            join_host_port(&self.host, self.port)
        }
    }

    /// Whether this service is keyed by `protocol`, `host` and `port`.
    pub fn matches(&self, protocol: Protocol, host: &str, port: u16) -> bool {
        self.protocol == protocol && self.host == host && self.port == port
    }

    /// Arguments identifying this service: its type flag and address.
    pub fn service_args(&self) -> Vec<String> {
        vec![self.protocol.flag().to_string(), self.address()]
    }

    /// Arguments fully describing this service for `-A` or `-E`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.service_args();
        args.push("-s".to_string());
        args.push(self.scheduler.to_string());
        args.extend(self.persistence_args());
        args.extend(self.netmask_args());
        args
    }

    fn persistence_args(&self) -> Vec<String> {
        if self.persistence != 0 {
            vec!["-p".to_string(), self.persistence.to_string()]
        } else {
            Vec::new()
        }
    }

    fn netmask_args(&self) -> Vec<String> {
        match &self.netmask {
            Some(netmask) if !netmask.is_empty() => vec!["-M".to_string(), netmask.clone()],
            _ => Vec::new(),
        }
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Renders the service in ipvsadm save format, one rule per line.
impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-A {}", self.to_args().join(" "))?;
        let key = self.service_args().join(" ");
        for server in &self.servers {
            writeln!(f, "-a {} -r {}", key, server)?;
        }
        Ok(())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let netmask = Option::<String>::deserialize(deserializer)?;
    Ok(netmask.filter(|n| !n.is_empty()))
}

/// Dotted IPv4 mask with contiguous ones.
fn is_ipv4_mask(netmask: &str) -> bool {
    netmask.parse::<Ipv4Addr>().is_ok_and(|mask| {
        let bits = u32::from(mask);
        bits.leading_ones() + bits.trailing_zeros() == 32
    })
}

fn is_ipv6_prefix(netmask: &str) -> bool {
    netmask
        .parse::<u8>()
        .is_ok_and(|prefix| (1..=128).contains(&prefix))
}
