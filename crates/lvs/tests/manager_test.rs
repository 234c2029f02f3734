//! Command construction through the public API, using a runner that records
//! invocations instead of executing them.

use common::{Error, Result};
use lvs::{Forwarder, Ipvsadm, Protocol, Runner, Scheduler, Server, Service};
use std::cell::RefCell;

#[derive(Default)]
struct RecordingRunner {
    calls: RefCell<Vec<String>>,
    output: String,
    fail_on: Option<&'static str>,
}

impl RecordingRunner {
    fn with_output(output: &str) -> Self {
        Self {
            output: output.to_string(),
            ..Default::default()
        }
    }

    fn failing_on(command: &'static str) -> Self {
        Self {
            fail_on: Some(command),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Runner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        self.calls
            .borrow_mut()
            .push(format!("{} {}", program, args.join(" ")));
        if self.fail_on.is_some_and(|command| args.first().is_some_and(|a| a == command)) {
            return Err(Error::command(program, Some(2), "Memory allocation problem"));
        }
        Ok(self.output.clone())
    }
}

#[test]
fn test_server_lifecycle_commands() {
    let runner = RecordingRunner::default();
    let ipvsadm = Ipvsadm::with_runner(&runner).with_program("/sbin/ipvsadm");

    let mut service = Service::new(Protocol::Tcp, "10.0.0.1", 443)
        .with_scheduler(Scheduler::Wlc)
        .with_persistence(300);
    ipvsadm.add_service(&service).unwrap();
    ipvsadm
        .add_server(&mut service, Server::new("192.168.1.10", 443, Forwarder::Gatewaying))
        .unwrap();
    ipvsadm
        .add_server(&mut service, Server::new("192.168.1.11", 8443, Forwarder::Masquerading))
        .unwrap();
    ipvsadm
        .edit_server(
            &mut service,
            Server::new("192.168.1.10", 443, Forwarder::Gatewaying).with_weight(50),
        )
        .unwrap();
    ipvsadm.remove_server(&mut service, "192.168.1.11", 8443).unwrap();
    ipvsadm.remove_service(&service).unwrap();

    assert_eq!(
        runner.calls(),
        vec![
            "/sbin/ipvsadm -A -t 10.0.0.1:443 -s wlc -p 300",
            "/sbin/ipvsadm -a -t 10.0.0.1:443 -r 192.168.1.10:443 -g -w 1",
            "/sbin/ipvsadm -a -t 10.0.0.1:443 -r 192.168.1.11:8443 -m -w 1",
            "/sbin/ipvsadm -e -t 10.0.0.1:443 -r 192.168.1.10:443 -g -w 50",
            "/sbin/ipvsadm -d -t 10.0.0.1:443 -r 192.168.1.11:8443",
            "/sbin/ipvsadm -D -t 10.0.0.1:443",
        ]
    );
    assert_eq!(service.servers.len(), 1);
    assert_eq!(service.servers[0].weight, 50);
}

#[test]
fn test_ipv6_service_commands() {
    let runner = RecordingRunner::default();
    let ipvsadm = Ipvsadm::with_runner(&runner);

    let mut service = Service::new(Protocol::Udp, "2001:db8::1", 53).with_netmask("64").with_persistence(60);
    ipvsadm.add_service(&service).unwrap();
    ipvsadm
        .add_server(&mut service, Server::new("2001:db8::10", 53, Forwarder::Tunneling))
        .unwrap();

    assert_eq!(
        runner.calls(),
        vec![
            "ipvsadm -A -u [2001:db8::1]:53 -s wlc -p 60 -M 64",
            "ipvsadm -a -u [2001:db8::1]:53 -r [2001:db8::10]:53 -i -w 1",
        ]
    );
}

#[test]
fn test_failed_command_keeps_model() {
    let runner = RecordingRunner::failing_on("-a");
    let ipvsadm = Ipvsadm::with_runner(&runner);

    let mut service = Service::new(Protocol::Tcp, "10.0.0.1", 80);
    let err = ipvsadm
        .add_server(&mut service, Server::new("192.168.1.10", 80, Forwarder::Gatewaying))
        .unwrap_err();

    assert!(matches!(err, Error::Command { .. }));
    assert!(service.servers.is_empty());
    assert_eq!(runner.calls().len(), 1);
}

#[test]
fn test_validation_failures_run_nothing() {
    let runner = RecordingRunner::default();
    let ipvsadm = Ipvsadm::with_runner(&runner);

    let mut service = Service::new(Protocol::Tcp, "10.0.0.1", 80);
    let err = ipvsadm
        .add_server(&mut service, Server::new("192.168.1.10", 8080, Forwarder::Tunneling))
        .unwrap_err();
    assert!(err.is_validation());

    let err = ipvsadm
        .edit_server(
            &mut service,
            Server::new("192.168.1.10", 80, Forwarder::Gatewaying).with_weight(70_000),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidWeight(70_000)));

    let err = ipvsadm.add_service(&Service::fwmark(0)).unwrap_err();
    assert!(matches!(err, Error::InvalidFirewallMark(_)));

    assert!(runner.calls().is_empty());
}

#[test]
fn test_list_round_trips_applied_service() {
    let mut service = Service::new(Protocol::Tcp, "10.0.0.9", 80).with_scheduler(Scheduler::Sed);
    service
        .servers
        .push(Server::new("192.168.1.10", 80, Forwarder::Gatewaying).with_weight(3));
    service
        .servers
        .push(Server::new("192.168.1.11", 8080, Forwarder::Masquerading).with_thresholds(Some(500), Some(250)));

    let runner = RecordingRunner::with_output(&service.to_string());
    let ipvsadm = Ipvsadm::with_runner(&runner);
    ipvsadm.apply(&service).unwrap();

    assert_eq!(ipvsadm.list_services().unwrap(), vec![service]);
    assert_eq!(runner.calls().len(), 4);
    assert_eq!(runner.calls()[3], "ipvsadm -S -n");
}
