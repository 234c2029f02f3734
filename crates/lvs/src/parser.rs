//! Parsing of ipvsadm's textual output.
//!
//! `ipvsadm -S -n` prints the rule table in the same syntax used to create it:
//!
//! ```text
//! -A -t 10.0.0.1:80 -s wlc -p 300
//! -a -t 10.0.0.1:80 -r 192.168.1.10:80 -g -w 1
//! -A -f 7 -s rr
//! ```

use crate::server::Server;
use crate::service::{DEFAULT_PERSISTENCE, Service};
use crate::types::{Forwarder, IpvsVersion, Protocol};
use common::{Error, Result};
use std::iter::Peekable;
use std::str::SplitWhitespace;
use tracing::trace;

type Tokens<'a> = Peekable<SplitWhitespace<'a>>;

/// A real-server rule, keyed by the service it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRule {
    pub protocol: Protocol,
    pub service_host: String,
    pub service_port: u16,
    pub server: Server,
}

/// Split `host:port` or `[host]:port`.
///
/// Anything that is not a well-formed host/port pair is returned unchanged
/// with port 0, which is how fwmark services and port-less addresses appear.
pub fn split_host_port(host_port: &str) -> (String, u16) {
    try_split_host_port(host_port).unwrap_or_else(|| (host_port.to_string(), 0))
}

fn try_split_host_port(host_port: &str) -> Option<(String, u16)> {
    let (host, port) = if let Some(rest) = host_port.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        (host, rest.strip_prefix(':')?)
    } else {
        let (host, port) = host_port.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        (host, port)
    };
    if host.contains(['[', ']']) {
        return None;
    }
    let port = port.parse().ok()?;
    Some((host.to_string(), port))
}

fn value<'a>(tokens: &mut Tokens<'a>) -> Result<&'a str> {
    tokens.next().ok_or(Error::PrematureEof)
}

fn number(token: &str) -> Result<u32> {
    token.parse().map_err(|_| Error::unexpected(token))
}

/// Parse a virtual service rule (`-A ...`, `-E ...`, or a bare flag list).
///
/// Unset fields take ipvsadm's defaults: TCP, `wlc`, not persistent.
pub fn parse_service(line: &str) -> Result<Service> {
    let mut service = Service::default();
    let mut keyed = false;
    let mut tokens = line.split_whitespace().peekable();

    while let Some(token) = tokens.next() {
        if let Some(protocol) = Protocol::from_flag(token) {
            let (host, port) = split_host_port(value(&mut tokens)?);
            service.protocol = protocol;
            service.host = host;
            service.port = port;
            keyed = true;
            continue;
        }
        match token {
            "-s" | "--scheduler" => service.scheduler = value(&mut tokens)?.parse()?,
            "-p" | "--persistent" => {
                // The timeout is optional on the ipvsadm command line.
                service.persistence = match tokens.peek().and_then(|t| t.parse::<u32>().ok()) {
                    Some(timeout) => {
                        tokens.next();
                        timeout
                    }
                    None => DEFAULT_PERSISTENCE,
                };
            }
            "-M" | "--netmask" => service.netmask = Some(value(&mut tokens)?.to_string()),
            _ => trace!(token, "ignoring service token"),
        }
    }

    if !keyed {
        return Err(Error::unexpected(line.trim()));
    }
    Ok(service)
}

/// Parse a real server rule (`-a ...` or `-e ...`).
pub fn parse_server(line: &str) -> Result<ServerRule> {
    let mut key: Option<(Protocol, String, u16)> = None;
    let mut address: Option<(String, u16)> = None;
    let mut forwarder = Forwarder::default();
    let mut weight = 1;
    let mut upper_threshold = None;
    let mut lower_threshold = None;
    let mut tokens = line.split_whitespace().peekable();

    while let Some(token) = tokens.next() {
        if let Some(protocol) = Protocol::from_flag(token) {
            let (host, port) = split_host_port(value(&mut tokens)?);
            key = Some((protocol, host, port));
            continue;
        }
        if let Some(method) = Forwarder::from_flag(token) {
            forwarder = method;
            continue;
        }
        match token {
            "-r" | "--real-server" => address = Some(split_host_port(value(&mut tokens)?)),
            "-w" | "--weight" => weight = number(value(&mut tokens)?)?,
            "-x" | "--u-threshold" => upper_threshold = Some(number(value(&mut tokens)?)?),
            "-y" | "--l-threshold" => lower_threshold = Some(number(value(&mut tokens)?)?),
            _ => trace!(token, "ignoring server token"),
        }
    }

    let (Some((protocol, service_host, service_port)), Some((host, port))) = (key, address) else {
        return Err(Error::unexpected(line.trim()));
    };

    Ok(ServerRule {
        protocol,
        service_host,
        service_port,
        server: Server {
            host,
            port,
            forwarder,
            weight,
            upper_threshold,
            lower_threshold,
        },
    })
}

/// Parse a complete `ipvsadm -S -n` dump into services with their servers.
pub fn parse_rules(text: &str) -> Result<Vec<Service>> {
    let mut services: Vec<Service> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        trace!(line, "parsing rule");
        let command = line.split_whitespace().next().unwrap_or_default();
        match command {
            "-A" | "--add-service" => services.push(parse_service(line)?),
            "-a" | "--add-server" => {
                let rule = parse_server(line)?;
                let service = services
                    .iter_mut()
                    .find(|s| s.matches(rule.protocol, &rule.service_host, rule.service_port))
                    .ok_or_else(|| {
                        Error::UnknownService(format!(
                            "{} {}",
                            rule.protocol.flag(),
                            Service::new(rule.protocol, rule.service_host.clone(), rule.service_port)
                                .address()
                        ))
                    })?;
                service.servers.push(rule.server);
            }
            other => return Err(Error::unexpected(other)),
        }
    }

    Ok(services)
}

/// Extract the kernel IPVS version from `ipvsadm --version` output.
///
/// The output looks like
/// `ipvsadm v1.31 2019/12/24 (compiled with popt and IPVS v1.2.1)`.
pub fn parse_version(text: &str) -> Result<IpvsVersion> {
    let malformed = || Error::unexpected(text.trim());

    let (_, rest) = text.split_once("IPVS v").ok_or_else(malformed)?;
    let version = rest
        .split(|c: char| c.is_whitespace() || c == ')')
        .next()
        .unwrap_or_default();

    let mut parts = version.split('.').map(str::parse::<u32>);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) => Ok(IpvsVersion {
            major,
            minor,
            patch,
        }),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scheduler;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("10.0.0.1:80"), ("10.0.0.1".to_string(), 80));
        assert_eq!(
            split_host_port("[2001:db8::1]:443"),
            ("2001:db8::1".to_string(), 443)
        );
        assert_eq!(split_host_port("7"), ("7".to_string(), 0));
        assert_eq!(split_host_port("2001:db8::1"), ("2001:db8::1".to_string(), 0));
        assert_eq!(split_host_port("10.0.0.1:http"), ("10.0.0.1:http".to_string(), 0));
        assert_eq!(split_host_port("10.0.0.1:70000"), ("10.0.0.1:70000".to_string(), 0));
        assert_eq!(split_host_port("host]:80"), ("host]:80".to_string(), 0));
        assert_eq!(split_host_port("[a[b]:80"), ("[a[b]:80".to_string(), 0));
    }

    #[test]
    fn test_parse_service_full() {
        let service =
            parse_service("-A -u 10.0.0.2:53 -s sh -p 120 -M 255.255.255.0").unwrap();
        assert_eq!(service.protocol, Protocol::Udp);
        assert_eq!(service.host, "10.0.0.2");
        assert_eq!(service.port, 53);
        assert_eq!(service.scheduler, Scheduler::Sh);
        assert_eq!(service.persistence, 120);
        assert_eq!(service.netmask.as_deref(), Some("255.255.255.0"));
    }

    #[test]
    fn test_parse_service_defaults() {
        let service = parse_service("-A --tcp-service 10.0.0.1:80").unwrap();
        assert_eq!(service.protocol, Protocol::Tcp);
        assert_eq!(service.scheduler, Scheduler::Wlc);
        assert_eq!(service.persistence, 0);
        assert_eq!(service.netmask, None);
    }

    #[test]
    fn test_parse_service_persistence_without_timeout() {
        let service = parse_service("-A -t 10.0.0.1:0 -p -M 255.255.255.0").unwrap();
        assert_eq!(service.persistence, DEFAULT_PERSISTENCE);
        assert_eq!(service.netmask.as_deref(), Some("255.255.255.0"));

        let service = parse_service("-A -t 10.0.0.1:443 -s rr -p").unwrap();
        assert_eq!(service.persistence, DEFAULT_PERSISTENCE);
    }

    #[test]
    fn test_parse_fwmark_service() {
        let service = parse_service("-A -f 42 -s lc").unwrap();
        assert_eq!(service.protocol, Protocol::FwMark);
        assert_eq!(service.host, "42");
        assert_eq!(service.port, 0);
    }

    #[test]
    fn test_parse_service_errors() {
        assert!(matches!(parse_service("-A -t"), Err(Error::PrematureEof)));
        assert!(matches!(
            parse_service("-A -t 10.0.0.1:80 -s"),
            Err(Error::PrematureEof)
        ));
        assert!(matches!(
            parse_service("-A -t 10.0.0.1:80 -s fastest"),
            Err(Error::InvalidServiceScheduler(_))
        ));
        assert!(matches!(
            parse_service("-A -s rr"),
            Err(Error::UnexpectedToken(_))
        ));
        assert!(matches!(
            parse_service("-A -t 10.0.0.1:80 -M"),
            Err(Error::PrematureEof)
        ));
    }

    #[test]
    fn test_parse_server() {
        let rule = parse_server("-a -t 10.0.0.1:80 -r 192.168.1.10:8080 -m -w 3 -x 200 -y 100")
            .unwrap();
        assert_eq!(rule.protocol, Protocol::Tcp);
        assert_eq!(rule.service_host, "10.0.0.1");
        assert_eq!(rule.service_port, 80);
        assert_eq!(rule.server.host, "192.168.1.10");
        assert_eq!(rule.server.port, 8080);
        assert_eq!(rule.server.forwarder, Forwarder::Masquerading);
        assert_eq!(rule.server.weight, 3);
        assert_eq!(rule.server.upper_threshold, Some(200));
        assert_eq!(rule.server.lower_threshold, Some(100));
    }

    #[test]
    fn test_parse_server_matches_display() {
        let server = Server::new("192.168.1.20", 80, Forwarder::Tunneling).with_weight(9);
        let line = format!("-a -t 10.0.0.1:80 -r {}", server);
        assert_eq!(parse_server(&line).unwrap().server, server);
    }

    #[test]
    fn test_parse_server_errors() {
        assert!(matches!(
            parse_server("-a -t 10.0.0.1:80 -r"),
            Err(Error::PrematureEof)
        ));
        assert!(matches!(
            parse_server("-a -t 10.0.0.1:80 -r 192.168.1.10:80 -w heavy"),
            Err(Error::UnexpectedToken(t)) if t == "heavy"
        ));
        assert!(matches!(
            parse_server("-a -t 10.0.0.1:80 -r 192.168.1.10:80 -x many"),
            Err(Error::UnexpectedToken(t)) if t == "many"
        ));
        assert!(matches!(
            parse_server("-a -t 10.0.0.1:80 -r 192.168.1.10:80 -y few"),
            Err(Error::UnexpectedToken(t)) if t == "few"
        ));
        assert!(matches!(
            parse_server("-a -t 10.0.0.1:80 -g"),
            Err(Error::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_parse_rules() {
        let dump = "\
-A -t 10.0.0.1:80 -s wrr -p 300
-a -t 10.0.0.1:80 -r 192.168.1.10:80 -g -w 10
-a -t 10.0.0.1:80 -r 192.168.1.11:80 -g -w 20

-A -f 7 -s rr
-a -f 7 -r 192.168.1.12:0 -g -w 1
-A -u [2001:db8::1]:53 -s sh
-a -u [2001:db8::1]:53 -r [2001:db8::10]:5353 -m -w 1
";
        let services = parse_rules(dump).unwrap();
        assert_eq!(services.len(), 3);

        assert_eq!(services[0].scheduler, Scheduler::Wrr);
        assert_eq!(services[0].servers.len(), 2);
        assert_eq!(services[0].servers[1].weight, 20);

        assert_eq!(services[1].protocol, Protocol::FwMark);
        assert_eq!(services[1].servers[0].host, "192.168.1.12");

        assert_eq!(services[2].host, "2001:db8::1");
        assert_eq!(services[2].servers[0].port, 5353);
    }

    #[test]
    fn test_parse_rules_round_trips_display() {
        let mut service = Service::new(Protocol::Tcp, "10.0.0.1", 443)
            .with_scheduler(Scheduler::Lblc)
            .with_persistence(900)
            .with_netmask("255.255.255.0");
        service
            .servers
            .push(Server::new("192.168.1.10", 443, Forwarder::Gatewaying).with_weight(7));

        let parsed = parse_rules(&service.to_string()).unwrap();
        assert_eq!(parsed, vec![service]);
    }

    #[test]
    fn test_parse_rules_errors() {
        assert!(matches!(
            parse_rules("-a -t 10.0.0.1:80 -r 192.168.1.10:80 -g -w 1"),
            Err(Error::UnknownService(s)) if s == "-t 10.0.0.1:80"
        ));
        assert!(matches!(
            parse_rules("IP Virtual Server version 1.2.1"),
            Err(Error::UnexpectedToken(t)) if t == "IP"
        ));
        assert!(parse_rules("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_version() {
        let version =
            parse_version("ipvsadm v1.31 2019/12/24 (compiled with popt and IPVS v1.2.1)\n")
                .unwrap();
        assert_eq!(version, IpvsVersion { major: 1, minor: 2, patch: 1 });

        assert!(parse_version("ipvsadm v1.31").is_err());
        assert!(parse_version("compiled with IPVS v1.2)").is_err());
    }
}
