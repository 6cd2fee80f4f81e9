//! Per-chip facade (spec.md §4.3) and its reference implementation.
//!
//! Grounded on the teacher's `NMPProcessor::tick` in
//! `simulate/nmpgc/mod.rs` / `simulate/nmpgc/work.rs`: a stall-ticks
//! countdown models multi-cycle primitives, and busy/idle ranges are
//! tracked the same way for stats purposes. The dispatcher never looks
//! past this trait.

use std::collections::HashMap;

use crate::request::{Kind, Request};

pub type Ticks = u64;

/// Per-chip counters surfaced only through [`ChipProxy::output_stats`].
#[derive(Debug, Clone, Default)]
pub struct ChipStats {
    pub id: usize,
    pub ticks: Ticks,
    pub busy_ticks: Ticks,
    pub energy_nj: f64,
    pub op_counts: HashMap<Kind, u64>,
}

/// The contract the core requires of a chip (spec.md §4.3). The core
/// treats every implementor as a black box.
pub trait ChipProxy {
    fn receive(&mut self, req: &Request) -> bool;
    fn tick(&mut self);
    fn time(&self) -> Ticks;
    fn finished(&self) -> bool;
    fn update_time(&mut self);
    fn output_stats(&self) -> ChipStats;
}

/// Roughly how many nJ a primitive of this kind burns, used only to
/// give the result-file energy numbers some per-kind texture. Not a
/// physical model (see spec.md Non-goals: "no bits are actually
/// computed").
fn energy_cost_nj(kind: Kind) -> f64 {
    match kind {
        Kind::Read | Kind::Write => 0.5,
        Kind::RowMv | Kind::ColMv => 0.8,
        k if k.is_row_pim() || k.is_col_pim() => 2.5,
        Kind::RowBufferRead | Kind::RowBufferWrite | Kind::ColBufferRead | Kind::ColBufferWrite => 1.2,
        Kind::NetworkSend | Kind::NetworkReceive => 4.0,
        _ => 0.0,
    }
}

/// How many ticks a primitive occupies an admitted slot for, once
/// admitted. A single tick is enough for every kind at this layer;
/// only back-pressure (queue depth) differentiates chip behaviour.
fn execution_latency(_kind: Kind) -> u32 {
    1
}

/// Reference `ChipProxy`: a bounded admission queue with per-slot
/// countdown, exactly the shape of the teacher's
/// `stall_ticks`/`stalled_work` pair but generalised to N concurrent
/// slots instead of one.
#[derive(Debug)]
pub struct ChipController {
    id: usize,
    capacity: usize,
    in_flight: Vec<u32>,
    time: Ticks,
    committed_time: Ticks,
    busy_ticks: Ticks,
    energy_nj: f64,
    op_counts: HashMap<Kind, u64>,
    /// Hz, as configured (spec.md §6: "passed through to chip proxies").
    /// Not consulted by the tick model itself — ticks are the unit of
    /// simulated time at this layer — but carried so a future stats
    /// consumer can convert `ticks` into wall-clock time.
    clock_rate: f64,
}

impl ChipController {
    pub fn new(id: usize, capacity: usize, clock_rate: f64) -> Self {
        ChipController {
            id,
            capacity: capacity.max(1),
            in_flight: Vec::new(),
            time: 0,
            committed_time: 0,
            busy_ticks: 0,
            energy_nj: 0.0,
            op_counts: HashMap::new(),
            clock_rate,
        }
    }

    pub fn clock_rate(&self) -> f64 {
        self.clock_rate
    }
}

impl ChipProxy for ChipController {
    fn receive(&mut self, req: &Request) -> bool {
        if self.in_flight.len() >= self.capacity {
            return false;
        }
        self.in_flight.push(execution_latency(req.kind));
        self.energy_nj += energy_cost_nj(req.kind);
        *self.op_counts.entry(req.kind).or_insert(0) += 1;
        true
    }

    fn tick(&mut self) {
        self.time += 1;
        if !self.in_flight.is_empty() {
            self.busy_ticks += 1;
        }
        self.in_flight.retain_mut(|remaining| {
            *remaining -= 1;
            *remaining > 0
        });
    }

    fn time(&self) -> Ticks {
        self.time
    }

    fn finished(&self) -> bool {
        self.in_flight.is_empty()
    }

    fn update_time(&mut self) {
        self.committed_time = self.time;
    }

    fn output_stats(&self) -> ChipStats {
        ChipStats {
            id: self.id,
            ticks: self.time,
            busy_ticks: self.busy_ticks,
            energy_nj: self.energy_nj,
            op_counts: self.op_counts.clone(),
        }
    }
}

impl ChipController {
    /// Tick count last committed by the synchroniser; exposed for tests
    /// that want to assert the post-`send` synchrony property without
    /// reaching into private state via a second `time()` call.
    #[cfg(test)]
    pub(crate) fn committed_time(&self) -> Ticks {
        self.committed_time
    }
}
