#[macro_use]
extern crate log;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;

use pimsim::cli::Args;
use pimsim::config::Config;
use pimsim::request::RequestSpec;
use pimsim::system::System;

pub fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;
    if let Some(rstfile) = args.rstfile {
        config.rstfile = rstfile;
    }
    if let Some(netscheme) = args.netscheme {
        config.netscheme = netscheme;
    }

    let mut system = System::new(&config);

    let mut raw = String::new();
    match &args.requests {
        Some(path) => {
            std::fs::File::open(path)
                .with_context(|| format!("opening {path}"))?
                .read_to_string(&mut raw)?;
        }
        None => {
            std::io::stdin().read_to_string(&mut raw)?;
        }
    }

    let mut count = 0u64;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let spec: RequestSpec =
            serde_json::from_str(line).with_context(|| format!("parsing request line: {line}"))?;
        let req = spec.into_request();
        let ticks = system.send(&req);
        trace!("{} -> {} ticks", req.describe(), ticks);
        count += 1;
    }
    info!("processed {count} request(s)");

    system.write_report()?;
    Ok(())
}
