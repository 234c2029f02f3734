//! lvsctl: apply and inspect IPVS rules described in a YAML file.

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::Cli;
use common::logging;
use config::Config;
use lvs::Ipvsadm;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging settings)
    let config = Config::load(cli.config.as_deref())?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_deref().unwrap_or("info")
    };
    logging::init_with(level, config.logging.format.unwrap_or_default());
    tracing::debug!(ipvsadm = %config.ipvsadm.path, services = config.services.len(), "configuration loaded");

    let ipvsadm = Ipvsadm::new().with_program(config.ipvsadm.path.clone());
    let stdout = std::io::stdout();
    commands::run(&cli.command, &config, &ipvsadm, &mut stdout.lock())
}
