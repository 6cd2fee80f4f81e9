//! CLI surface for the `pimsim` binary.
//!
//! Grounded on the teacher's `cli.rs`: a single clap-derive `Args`
//! struct with per-field overrides, trimmed down to what a simulator
//! driver actually needs (no subcommands, since there is only one
//! thing to do: run a request stream through the core).

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-accurate PIM architecture simulator", long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "pimsim.toml")]
    pub config: String,

    /// Path to a JSON-lines file of requests; reads stdin if omitted.
    #[arg(short, long)]
    pub requests: Option<String>,

    /// Overrides `rstfile` from the configuration file.
    #[arg(long)]
    pub rstfile: Option<String>,

    /// Overrides `netscheme` from the configuration file.
    #[arg(long)]
    pub netscheme: Option<String>,
}
