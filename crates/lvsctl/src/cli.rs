use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lvsctl")]
#[command(about = "Manage IPVS load-balancing rules through ipvsadm", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (searched in /etc/lvs, ~/.config/lvs and . when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the rules currently loaded in the kernel
    List {
        /// Print JSON instead of ipvsadm save format
        #[arg(long)]
        json: bool,
    },

    /// Print the configured services without touching the kernel
    Show {
        /// Print JSON instead of ipvsadm save format
        #[arg(long)]
        json: bool,
    },

    /// Create the configured services and their real servers
    Apply,

    /// Delete the configured services
    Remove,

    /// Clear the whole virtual server table
    Flush,

    /// Reset packet and byte counters
    Zero,

    /// Print the kernel IPVS version
    Version,
}
