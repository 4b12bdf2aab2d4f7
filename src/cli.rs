use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ctd-relay")]
#[command(about = "Relay ship CTD casts to the GTS as KKYY messages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: PathBuf,

    /// Convert files locally without uploading or updating the ledger
    #[arg(short, long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short = 'g', long)]
    pub debug: bool,

    /// Run a single scan cycle and exit
    #[arg(short = 'x', long)]
    pub exit_when_done: bool,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug,ctd_relay=debug,suppaftp=info"
        } else {
            "info"
        }
    }
}
