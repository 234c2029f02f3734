//! Subcommand execution.

use crate::cli::Commands;
use crate::config::Config;
use anyhow::{Context, Result};
use lvs::{Ipvsadm, Runner, Service};
use std::io::Write;
use tracing::info;

/// Execute `command` against `ipvsadm`, writing any report to `out`.
pub fn run<R: Runner>(
    command: &Commands,
    config: &Config,
    ipvsadm: &Ipvsadm<R>,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::List { json } => {
            let services = ipvsadm
                .list_services()
                .context("failed to read the IPVS rule table")?;
            print_services(&services, *json, out)
        }
        Commands::Show { json } => print_services(&config.services, *json, out),
        Commands::Apply => {
            for service in &config.services {
                ipvsadm
                    .apply(service)
                    .with_context(|| format!("failed to apply service {}", service.address()))?;
            }
            info!(services = config.services.len(), "configuration applied");
            Ok(())
        }
        Commands::Remove => {
            for service in &config.services {
                ipvsadm
                    .remove_service(service)
                    .with_context(|| format!("failed to remove service {}", service.address()))?;
            }
            Ok(())
        }
        Commands::Flush => Ok(ipvsadm.flush()?),
        Commands::Zero => Ok(ipvsadm.zero_all()?),
        Commands::Version => {
            let version = ipvsadm.version()?;
            writeln!(out, "IPVS v{}", version)?;
            Ok(())
        }
    }
}

fn print_services(services: &[Service], json: bool, out: &mut impl Write) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, services)?;
        writeln!(out)?;
    } else {
        for service in services {
            write!(out, "{}", service)?;
        }
    }
    Ok(())
}
