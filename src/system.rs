//! Top-level driver (spec.md §3 "Lifecycles", §6 result file, §7 error
//! propagation). Owns the dispatcher, runs the synchroniser after every
//! top-level request, and owns the result-file writer.
//!
//! Grounded on the teacher's `Simulation` (`simulate/mod.rs`):
//! `from_args`/`run`/`print` map onto `new`/`send`/`write_report` here.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use log::error;

use crate::addr::Geometry;
use crate::chip::{ChipController, ChipProxy, Ticks};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, ERR};
use crate::network::NetworkOracle;
use crate::request::Request;
use crate::sync;

pub struct System {
    dispatcher: Dispatcher,
    rstfile: String,
}

impl System {
    pub fn new(config: &Config) -> Self {
        let geometry = Geometry::new(config.nchips, config.ntiles, config.nblocks, config.nrows, config.ncols);
        let chips: Vec<ChipController> = (0..config.nchips)
            .map(|i| ChipController::new(i as usize, config.chip_queue_capacity, config.clock_rate))
            .collect();
        let network = NetworkOracle::new(config.netscheme(), config.nchips);
        let dispatcher = Dispatcher::new(geometry, chips, network);
        System { dispatcher, rstfile: config.rstfile.clone() }
    }

    /// spec.md §4.5/§7: a geometric violation terminates the process
    /// with a diagnostic. Clients that want to recover instead of
    /// exiting should use [`System::try_send`].
    pub fn send(&mut self, req: &Request) -> Ticks {
        match self.try_send(req) {
            Ok(ticks) => ticks,
            Err(message) => {
                error!("{message}");
                std::process::exit(1);
            }
        }
    }

    pub fn try_send(&mut self, req: &Request) -> Result<Ticks, String> {
        let ticks = self.dispatcher.send(req);
        if ticks == ERR {
            return Err(format!(
                "geometric violation: request rejected by dispatcher: {}",
                req.describe()
            ));
        }
        sync::synchronize(self.dispatcher.chips_mut());
        Ok(ticks as Ticks)
    }

    pub fn write_report(&self) -> Result<()> {
        self.write_report_to(&self.rstfile)
    }

    fn write_report_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .with_context(|| format!("opening result file {}", path.display()))?;
        file.write_all(self.render_report().as_bytes())
            .with_context(|| format!("writing result file {}", path.display()))?;
        Ok(())
    }

    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("############# Backend ##############\n");
        for chip in self.dispatcher.chips() {
            let stats = chip.output_stats();
            let mut ops: Vec<_> = stats.op_counts.iter().collect();
            ops.sort_by_key(|(kind, _)| format!("{kind:?}"));
            let ops_str = ops
                .iter()
                .map(|(kind, count)| format!("{kind:?}={count}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "Chip#{} ticks={} busy={} ops=[{}]\n",
                stats.id, stats.ticks, stats.busy_ticks, ops_str
            ));
        }

        out.push_str("############# Network #############\n");
        out.push_str(&format!("scheme={:?}\n", self.dispatcher.network().scheme()));
        for ((src, dst), stats) in self.dispatcher.network().link_stats() {
            out.push_str(&format!(
                "Chip#{src} -> Chip#{dst}: transfers={} bytes={} total_latency_ticks={}\n",
                stats.transfers, stats.bytes, stats.total_latency_ticks
            ));
        }

        out.push_str("############# Summary #############\n");
        for chip in self.dispatcher.chips() {
            let stats = chip.output_stats();
            out.push_str(&format!("Chip#{} has ticked {} clocks\n", stats.id, stats.ticks));
            out.push_str(&format!(
                "Chip#{} has consumed {:.4} nj energy\n",
                stats.id, stats.energy_nj
            ));
        }
        out
    }
}
