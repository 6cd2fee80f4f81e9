//! Network Oracle (spec.md §4.4): latency lookup plus transfer
//! bookkeeping under one of three topologies.
//!
//! Grounded on the teacher's `simulate/nmpgc/network.rs` (`Network`,
//! per-directed-link `LinkBandwidthStats`) and `simulate/nmpgc/topology.rs`
//! (`Topology` trait with multiple implementing structs).

use std::collections::HashMap;
use std::fmt::Debug;

use crate::chip::Ticks;

/// Selects one of the three named topologies, or the "ideal" fallback
/// spec.md §6 specifies for any other `netscheme` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetScheme {
    Ideal,
    Mesh,
    Dragonfly,
}

impl NetScheme {
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "mesh" => NetScheme::Mesh,
            "dragonfly" => NetScheme::Dragonfly,
            _ => NetScheme::Ideal,
        }
    }
}

/// Pure function of topology and geometry: latency in ticks for one
/// chip-to-chip transfer of `size` elements.
pub trait Topology: Debug {
    fn latency(&self, src_chip: u32, dst_chip: u32, size: u32) -> Ticks;
}

const IDEAL_LATENCY: Ticks = 10;
const MESH_HOP_LATENCY: Ticks = 4;
const DRAGONFLY_LOCAL_LATENCY: Ticks = 6;
const DRAGONFLY_GLOBAL_LATENCY: Ticks = 20;
const BYTES_PER_TICK: Ticks = 64;

#[derive(Debug, Default)]
struct IdealTopology;

impl Topology for IdealTopology {
    fn latency(&self, _src: u32, _dst: u32, _size: u32) -> Ticks {
        IDEAL_LATENCY
    }
}

/// A 2D mesh, side length derived from `nchips` (rounded up to a
/// square); latency is per-hop Manhattan distance plus a
/// size-dependent serialisation term.
#[derive(Debug)]
struct MeshTopology {
    side: u32,
}

impl MeshTopology {
    fn new(nchips: u32) -> Self {
        let side = (nchips as f64).sqrt().ceil().max(1.0) as u32;
        MeshTopology { side }
    }

    fn coords(&self, chip: u32) -> (u32, u32) {
        (chip % self.side, chip / self.side)
    }
}

impl Topology for MeshTopology {
    fn latency(&self, src: u32, dst: u32, size: u32) -> Ticks {
        let (sx, sy) = self.coords(src);
        let (dx, dy) = self.coords(dst);
        let hops = (sx as i64 - dx as i64).unsigned_abs() + (sy as i64 - dy as i64).unsigned_abs();
        hops.max(1) * MESH_HOP_LATENCY + size as Ticks / BYTES_PER_TICK
    }
}

/// A single-group dragonfly: chips are split into equally sized
/// groups; same-group hops are cheap, cross-group hops pay a global
/// link penalty.
#[derive(Debug)]
struct DragonflyTopology {
    group_size: u32,
}

impl DragonflyTopology {
    fn new(nchips: u32) -> Self {
        let group_size = (nchips as f64).sqrt().ceil().max(1.0) as u32;
        DragonflyTopology { group_size }
    }
}

impl Topology for DragonflyTopology {
    fn latency(&self, src: u32, dst: u32, size: u32) -> Ticks {
        if src == dst {
            return 0;
        }
        let base = if src / self.group_size == dst / self.group_size {
            DRAGONFLY_LOCAL_LATENCY
        } else {
            DRAGONFLY_GLOBAL_LATENCY
        };
        base + size as Ticks / BYTES_PER_TICK
    }
}

fn build_topology(scheme: NetScheme, nchips: u32) -> Box<dyn Topology> {
    match scheme {
        NetScheme::Ideal => Box::new(IdealTopology),
        NetScheme::Mesh => Box::new(MeshTopology::new(nchips)),
        NetScheme::Dragonfly => Box::new(DragonflyTopology::new(nchips)),
    }
}

/// Cumulative per-link bookkeeping; write-only from the core's
/// perspective (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    pub transfers: u64,
    pub bytes: u64,
    pub total_latency_ticks: u64,
}

#[derive(Debug)]
pub struct NetworkOracle {
    scheme: NetScheme,
    topology: Box<dyn Topology>,
    link_stats: HashMap<(u32, u32), LinkStats>,
}

impl NetworkOracle {
    pub fn new(scheme: NetScheme, nchips: u32) -> Self {
        NetworkOracle {
            scheme,
            topology: build_topology(scheme, nchips),
            link_stats: HashMap::new(),
        }
    }

    pub fn scheme(&self) -> NetScheme {
        self.scheme
    }

    pub fn latency(&self, src_chip: u32, dst_chip: u32, size: u32) -> Ticks {
        self.topology.latency(src_chip, dst_chip, size)
    }

    /// Record-keeping only (spec.md §4.4); no return value.
    pub fn issue(
        &mut self,
        src_chip: u32,
        dst_chip: u32,
        size: u32,
        _ticks_src_waited: u64,
        _ticks_dst_waited: u64,
        overhead: Ticks,
    ) {
        let entry = self.link_stats.entry((src_chip, dst_chip)).or_default();
        entry.transfers += 1;
        entry.bytes += size as u64;
        entry.total_latency_ticks += overhead;
    }

    pub fn link_stats(&self) -> Vec<((u32, u32), LinkStats)> {
        let mut stats: Vec<_> = self
            .link_stats
            .iter()
            .map(|(&link, s)| (link, s.clone()))
            .collect();
        stats.sort_by_key(|(link, _)| *link);
        stats
    }

    pub fn total_transfers(&self) -> u64 {
        self.link_stats.values().map(|s| s.transfers).sum()
    }
}
