//! Management of Linux IPVS (IP Virtual Server) rules through `ipvsadm`.
//!
//! Services and their real servers are modelled as plain data. [`Ipvsadm`]
//! turns changes to that model into `ipvsadm` invocations and keeps the
//! in-memory server list in step with what the tool accepted.
//!
//! # Example
//!
//! ```no_run
//! use lvs::{Forwarder, Ipvsadm, Protocol, Scheduler, Server, Service};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ipvsadm = Ipvsadm::new();
//!
//! let mut service = Service::new(Protocol::Tcp, "10.0.0.1", 80).with_scheduler(Scheduler::Wrr);
//! ipvsadm.add_service(&service)?;
//! ipvsadm.add_server(&mut service, Server::new("192.168.1.10", 80, Forwarder::Gatewaying))?;
//!
//! for service in ipvsadm.list_services()? {
//!     print!("{}", service);
//! }
//! # Ok(())
//! # }
//! ```

pub mod parser;
mod runner;
mod server;
mod service;
mod types;

pub use parser::{ServerRule, parse_rules, parse_server, parse_service, parse_version, split_host_port};
pub use runner::{Runner, SystemRunner};
pub use server::{MAX_WEIGHT, Server};
pub use service::{DEFAULT_PERSISTENCE, Service};
pub use types::{Forwarder, IpvsVersion, Protocol, Scheduler};

#[cfg(test)]
pub use runner::MockRunner;

use common::Result;
use tracing::{debug, info};

/// Default name of the administration binary, resolved through `PATH`.
pub const IPVSADM: &str = "ipvsadm";

/// Drives `ipvsadm` through a [`Runner`].
pub struct Ipvsadm<R: Runner = SystemRunner> {
    runner: R,
    program: String,
}

impl Ipvsadm<SystemRunner> {
    /// Create a manager that spawns `ipvsadm` from `PATH`.
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for Ipvsadm<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Runner> Ipvsadm<R> {
    /// Create a manager that executes commands through `runner`.
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            program: IPVSADM.to_string(),
        }
    }

    /// Use a specific ipvsadm binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The binary invoked for every command.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn exec(&self, args: Vec<String>) -> Result<String> {
        debug!(program = %self.program, args = %args.join(" "), "invoking ipvsadm");
        self.runner.run(&self.program, &args)
    }

    fn service_command(&self, command: &str, service: &Service) -> Result<()> {
        let mut args = vec![command.to_string()];
        args.extend(service.service_args());
        self.exec(args)?;
        Ok(())
    }

    fn server_command(&self, command: &str, service: &Service, server: Vec<String>) -> Result<()> {
        let mut args = vec![command.to_string()];
        args.extend(service.service_args());
        args.push("-r".to_string());
        args.extend(server);
        self.exec(args)?;
        Ok(())
    }

    /// Create the virtual service. Attached servers are not added.
    pub fn add_service(&self, service: &Service) -> Result<()> {
        service.validate()?;
        let mut args = vec!["-A".to_string()];
        args.extend(service.to_args());
        self.exec(args)?;
        info!(service = %service.address(), protocol = %service.protocol, "service added");
        Ok(())
    }

    /// Change scheduler, persistence or netmask of an existing service.
    pub fn edit_service(&self, service: &Service) -> Result<()> {
        service.validate()?;
        let mut args = vec!["-E".to_string()];
        args.extend(service.to_args());
        self.exec(args)?;
        info!(service = %service.address(), scheduler = %service.scheduler, "service updated");
        Ok(())
    }

    /// Delete the service and, in the kernel, all of its servers.
    pub fn remove_service(&self, service: &Service) -> Result<()> {
        self.service_command("-D", service)?;
        info!(service = %service.address(), protocol = %service.protocol, "service removed");
        Ok(())
    }

    /// Reset the packet and byte counters of the service.
    pub fn zero_service(&self, service: &Service) -> Result<()> {
        self.service_command("-Z", service)
    }

    /// Add a real server to `service`.
    ///
    /// A server already present at the same address is left alone and no
    /// command is run.
    pub fn add_server(&self, service: &mut Service, server: Server) -> Result<()> {
        service.check_server(&server)?;
        if service.find_server(&server.host, server.port).is_some() {
            debug!(server = %server.address(), "server already present");
            return Ok(());
        }

        self.server_command("-a", service, server.to_args())?;
        info!(service = %service.address(), server = %server.address(), "server added");
        service.servers.push(server);
        Ok(())
    }

    /// Update forwarding method, weight or thresholds of a real server.
    pub fn edit_server(&self, service: &mut Service, server: Server) -> Result<()> {
        service.check_server(&server)?;
        self.server_command("-e", service, server.to_args())?;
        info!(service = %service.address(), server = %server.address(), weight = server.weight, "server updated");

        if let Some(existing) = service.find_server_mut(&server.host, server.port) {
            *existing = server;
        }
        Ok(())
    }

    /// Remove the real server at `host:port` from `service`.
    pub fn remove_server(&self, service: &mut Service, host: &str, port: u16) -> Result<()> {
        let address = server::join_host_port(host, port);
        self.server_command("-d", service, vec![address.clone()])?;
        info!(service = %service.address(), server = %address, "server removed");

        service.servers.retain(|s| !s.matches(host, port));
        Ok(())
    }

    /// Create the service and every server attached to it.
    pub fn apply(&self, service: &Service) -> Result<()> {
        self.add_service(service)?;
        for server in &service.servers {
            self.server_command("-a", service, server.to_args())?;
        }
        info!(service = %service.address(), servers = service.servers.len(), "service applied");
        Ok(())
    }

    /// Read back the kernel's rule table.
    pub fn list_services(&self) -> Result<Vec<Service>> {
        let output = self.exec(vec!["-S".to_string(), "-n".to_string()])?;
        parse_rules(&output)
    }

    /// Clear the whole virtual server table.
    pub fn flush(&self) -> Result<()> {
        self.exec(vec!["-C".to_string()])?;
        info!("virtual server table cleared");
        Ok(())
    }

    /// Reset the counters of every service.
    pub fn zero_all(&self) -> Result<()> {
        self.exec(vec!["-Z".to_string()])?;
        Ok(())
    }

    /// The kernel IPVS version reported by ipvsadm.
    pub fn version(&self) -> Result<IpvsVersion> {
        let output = self.exec(vec!["--version".to_string()])?;
        parse_version(&output)
    }
}
