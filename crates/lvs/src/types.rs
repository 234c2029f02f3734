//! Field types shared by services and servers, and their ipvsadm flags.

use common::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// IPVS version information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpvsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for IpvsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Serializes a token enum as its `Display` form and deserializes it through `FromStr`.
macro_rules! token_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let token = String::deserialize(deserializer)?;
                token.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Service type. Firewall-mark services are keyed by a mark instead of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    FwMark,
}

impl Protocol {
    /// The ipvsadm flag selecting this service type.
    pub fn flag(self) -> &'static str {
        match self {
            Protocol::Tcp => "-t",
            Protocol::Udp => "-u",
            Protocol::FwMark => "-f",
        }
    }

    /// Map a short or long ipvsadm service flag back to a protocol.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-t" | "--tcp-service" => Some(Protocol::Tcp),
            "-u" | "--udp-service" => Some(Protocol::Udp),
            "-f" | "--fwmark-service" => Some(Protocol::FwMark),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::FwMark => write!(f, "fwmark"),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "fwmark" => Ok(Protocol::FwMark),
            other => Err(Error::InvalidServiceType(other.to_string())),
        }
    }
}

token_serde!(Protocol);

/// IPVS scheduling algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheduler {
    /// Round robin
    Rr,
    /// Weighted round robin
    Wrr,
    /// Least connection
    Lc,
    /// Weighted least connection
    #[default]
    Wlc,
    /// Locality-based least connection
    Lblc,
    /// Locality-based least connection with replication
    Lblcr,
    /// Destination hashing
    Dh,
    /// Source hashing
    Sh,
    /// Shortest expected delay
    Sed,
    /// Never queue
    Nq,
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scheduler::Rr => "rr",
            Scheduler::Wrr => "wrr",
            Scheduler::Lc => "lc",
            Scheduler::Wlc => "wlc",
            Scheduler::Lblc => "lblc",
            Scheduler::Lblcr => "lblcr",
            Scheduler::Dh => "dh",
            Scheduler::Sh => "sh",
            Scheduler::Sed => "sed",
            Scheduler::Nq => "nq",
        };
        f.write_str(name)
    }
}

impl FromStr for Scheduler {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rr" => Ok(Scheduler::Rr),
            "wrr" => Ok(Scheduler::Wrr),
            "lc" => Ok(Scheduler::Lc),
            "" | "wlc" => Ok(Scheduler::Wlc),
            "lblc" => Ok(Scheduler::Lblc),
            "lblcr" => Ok(Scheduler::Lblcr),
            "dh" => Ok(Scheduler::Dh),
            "sh" => Ok(Scheduler::Sh),
            "sed" => Ok(Scheduler::Sed),
            "nq" => Ok(Scheduler::Nq),
            other => Err(Error::InvalidServiceScheduler(other.to_string())),
        }
    }
}

token_serde!(Scheduler);

/// Packet forwarding method for a real server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Forwarder {
    /// Direct routing
    #[default]
    Gatewaying,
    /// IP-in-IP tunneling
    Tunneling,
    /// NAT
    Masquerading,
}

impl Forwarder {
    /// The ipvsadm flag selecting this forwarding method.
    pub fn flag(self) -> &'static str {
        match self {
            Forwarder::Gatewaying => "-g",
            Forwarder::Tunneling => "-i",
            Forwarder::Masquerading => "-m",
        }
    }

    /// Map a short or long ipvsadm forwarding flag back to a method.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-g" | "--gatewaying" => Some(Forwarder::Gatewaying),
            "-i" | "--ipip" => Some(Forwarder::Tunneling),
            "-m" | "--masquerading" => Some(Forwarder::Masquerading),
            _ => None,
        }
    }

    /// Only NAT can rewrite the destination port.
    pub fn can_remap_port(self) -> bool {
        self == Forwarder::Masquerading
    }
}

impl fmt::Display for Forwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forwarder::Gatewaying => write!(f, "g"),
            Forwarder::Tunneling => write!(f, "i"),
            Forwarder::Masquerading => write!(f, "m"),
        }
    }
}

impl FromStr for Forwarder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "g" => Ok(Forwarder::Gatewaying),
            "i" => Ok(Forwarder::Tunneling),
            "m" => Ok(Forwarder::Masquerading),
            other => Err(Error::InvalidForwarder(other.to_string())),
        }
    }
}

token_serde!(Forwarder);
