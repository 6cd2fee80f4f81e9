//! The request router (spec.md §4.5): switches on request kind,
//! resolves locations, and either admits a primitive directly with
//! back-pressure or hands a system transfer to the decomposer.
//!
//! No single teacher file matches this one-to-one; it plays the role
//! the teacher's `NMPProcessor::tick` plays when it matches on
//! `NMPProcessorWork`, scaled up to the richer `Kind` enum and the
//! explicit admission-polling loop of spec.md §4.5/§5.

use log::trace;

use crate::addr::Geometry;
use crate::chip::{ChipController, ChipProxy, Ticks};
use crate::network::NetworkOracle;
use crate::request::{Axis, Kind, Request};

/// Returned by every handler in place of a tick count to signal a
/// geometric violation (spec.md §7 class 1). Preserved as a sentinel
/// rather than `Result` by design.
pub const ERR: i64 = -1;

pub struct Dispatcher {
    geometry: Geometry,
    chips: Vec<ChipController>,
    network: NetworkOracle,
}

impl Dispatcher {
    pub fn new(geometry: Geometry, chips: Vec<ChipController>, network: NetworkOracle) -> Self {
        Dispatcher { geometry, chips, network }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn chips(&self) -> &[ChipController] {
        &self.chips
    }

    pub fn chips_mut(&mut self) -> &mut [ChipController] {
        &mut self.chips
    }

    pub fn network(&self) -> &NetworkOracle {
        &self.network
    }

    /// Public entry point: ticks attributable to this request at top
    /// level (spec.md §4.5). Returns [`ERR`] on a geometric violation.
    pub fn send(&mut self, req: &Request) -> i64 {
        match req.kind {
            Kind::Read | Kind::Write => self.send_memory(req),
            Kind::RowMv => self.send_row_mv(req),
            Kind::ColMv => self.send_col_mv(req),
            k if k.is_row_pim() => self.send_row_pim(req),
            k if k.is_col_pim() => self.send_col_pim(req),
            Kind::RowBufferRead | Kind::RowBufferWrite => self.send_row_buffer(req),
            Kind::ColBufferRead | Kind::ColBufferWrite => self.send_col_buffer(req),
            Kind::NetworkSend | Kind::NetworkReceive => self.send_network(req),
            Kind::SystemRow2Row
            | Kind::SystemRow2Col
            | Kind::SystemCol2Row
            | Kind::SystemCol2Col => self.decompose_system_transfer(req),
        }
    }

    /// Primitive admission pattern (spec.md §4.5): one tick to inject,
    /// plus one tick per rejection.
    fn admit_with_backpressure(&mut self, chip: u32, primitive: &Request) -> i64 {
        let idx = chip as usize;
        let mut ticks: i64 = 1;
        while !self.chips[idx].receive(primitive) {
            ticks += 1;
            self.chips[idx].tick();
        }
        trace!(
            "admitted {:?} on chip {} after {} tick(s)",
            primitive.kind,
            chip,
            ticks
        );
        ticks
    }

    fn send_memory(&mut self, req: &Request) -> i64 {
        let (addr, _size) = req.operands[0];
        let (chip, tile, block, row, col) = self.geometry.decode_full(addr);
        let mut primitive = req.clone();
        primitive.set_location(chip, tile, block, row as i64, col as i64);
        self.admit_with_backpressure(chip, &primitive)
    }

    fn send_row_mv(&mut self, req: &Request) -> i64 {
        let mut total = 0i64;
        let mut i = 0;
        while i + 1 < req.operands.len() {
            let (src_addr, size) = req.operands[i];
            let (dst_addr, _) = req.operands[i + 1];
            let (sc, st, sb, sr, scol) = self.geometry.decode_full(src_addr);
            let (dc, dt, db, _dr, dcol) = self.geometry.decode_full(dst_addr);
            if (sc, st, sb) != (dc, dt, db) {
                return ERR;
            }
            if scol as u64 + size as u64 > self.geometry.ncols as u64
                || dcol as u64 + size as u64 > self.geometry.ncols as u64
            {
                return ERR;
            }
            let mut primitive = Request::new(Kind::RowMv);
            primitive.add_operand(src_addr, size);
            primitive.add_operand(dst_addr, size);
            primitive.set_location(sc, st, sb, sr as i64, -1);
            total += self.admit_with_backpressure(sc, &primitive);
            i += 2;
        }
        total
    }

    fn send_col_mv(&mut self, req: &Request) -> i64 {
        let mut total = 0i64;
        let mut i = 0;
        while i + 1 < req.operands.len() {
            let (src_addr, size) = req.operands[i];
            let (dst_addr, _) = req.operands[i + 1];
            let (sc, st, sb, srow, scol) = self.geometry.decode_full(src_addr);
            let (dc, _dt, db, _drow, _dcol) = self.geometry.decode_full(dst_addr);
            if (sc, sb) != (dc, db) {
                return ERR;
            }
            if srow as u64 + size as u64 > self.geometry.nrows as u64 {
                return ERR;
            }
            let mut primitive = Request::new(Kind::ColMv);
            primitive.add_operand(src_addr, size);
            primitive.add_operand(dst_addr, size);
            primitive.set_location(sc, st, sb, -1, scol as i64);
            total += self.admit_with_backpressure(sc, &primitive);
            i += 2;
        }
        total
    }

    /// Walks every operand (spec.md §4.5, §9 note 3: returns `0` on
    /// success rather than the accumulated tick count).
    fn send_row_pim(&mut self, req: &Request) -> i64 {
        for &(addr, _size) in &req.operands {
            let (chip, tile, block, row, _col) = self.geometry.decode_full(addr);
            let mut primitive = Request::new(req.kind);
            primitive.add_operand(addr, _size);
            primitive.set_location(chip, tile, block, row as i64, -1);
            if self.admit_with_backpressure(chip, &primitive) == ERR {
                return ERR;
            }
        }
        0
    }

    /// PRESERVED QUIRK (spec.md §9 note 2): steps by 2 over operands,
    /// dropping every odd-indexed one. Load-bearing for at least one
    /// example kernel; do not "fix" to match `send_row_pim`.
    fn send_col_pim(&mut self, req: &Request) -> i64 {
        let mut i = 0;
        while i < req.operands.len() {
            let (addr, size) = req.operands[i];
            let (chip, tile, block, _row, col) = self.geometry.decode_full(addr);
            let mut primitive = Request::new(req.kind);
            primitive.add_operand(addr, size);
            primitive.set_location(chip, tile, block, -1, col as i64);
            self.admit_with_backpressure(chip, &primitive);
            i += 2;
        }
        0
    }

    fn send_row_buffer(&mut self, req: &Request) -> i64 {
        let mut total = 0i64;
        for &(addr, size) in &req.operands {
            let (chip, tile, block, row, col) = self.geometry.decode_full(addr);
            if col as u64 + size as u64 > self.geometry.ncols as u64 {
                return ERR;
            }
            let mut primitive = Request::new(req.kind);
            primitive.add_operand(addr, size);
            primitive.set_location(chip, tile, block, row as i64, -1);
            total += self.admit_with_backpressure(chip, &primitive);
        }
        total
    }

    fn send_col_buffer(&mut self, req: &Request) -> i64 {
        let mut total = 0i64;
        for &(addr, size) in &req.operands {
            let (chip, tile, block, row, col) = self.geometry.decode_full(addr);
            if row as u64 + size as u64 > self.geometry.nrows as u64 {
                return ERR;
            }
            let mut primitive = Request::new(req.kind);
            primitive.add_operand(addr, size);
            primitive.set_location(chip, tile, block, -1, col as i64);
            total += self.admit_with_backpressure(chip, &primitive);
        }
        total
    }

    fn send_network(&mut self, req: &Request) -> i64 {
        let (src_addr, size) = req.operands[0];
        let (dst_addr, _) = req.operands[1];
        let (cp1, ..) = self.geometry.decode_full(src_addr);
        let (cp2, ..) = self.geometry.decode_full(dst_addr);

        let sync_time = self.chips[cp1 as usize].time().max(self.chips[cp2 as usize].time());
        let overhead = self.network.latency(cp1, cp2, size);

        let mut ticks1: Ticks = 0;
        while self.chips[cp1 as usize].time() < sync_time {
            self.chips[cp1 as usize].tick();
            ticks1 += 1;
        }
        let target2 = sync_time + overhead;
        let mut ticks2: Ticks = 0;
        while self.chips[cp2 as usize].time() < target2 {
            self.chips[cp2 as usize].tick();
            ticks2 += 1;
        }

        // NetworkSend and NetworkReceive both reach this handler (§4.6's
        // lowered sequence issues both), but they describe the two ends
        // of one transfer, not two transfers — record it once.
        if req.kind == Kind::NetworkSend {
            self.network.issue(cp1, cp2, size, ticks1, ticks2, overhead);
        }
        ticks1.max(ticks2) as i64
    }

    pub(crate) fn decompose_system_transfer(&mut self, req: &Request) -> i64 {
        let (src_axis, dst_axis) = req
            .kind
            .system_axes()
            .expect("decompose_system_transfer called with a non-system kind");

        let mut total = 0i64;
        let mut i = 0;
        while i + 1 < req.operands.len() {
            let (src_addr, size) = req.operands[i];
            let (dst_addr, _) = req.operands[i + 1];
            let (sc, st, sb, sr, scol) = self.geometry.decode_full(src_addr);
            let (dc, dt, db, dr, dcol) = self.geometry.decode_full(dst_addr);

            if !bounds_ok(src_axis, sr, scol, size, &self.geometry)
                || !bounds_ok(dst_axis, dr, dcol, size, &self.geometry)
            {
                return ERR;
            }

            let same_chip = sc == dc;
            let same_block = same_chip && st == dt && sb == db;

            let ticks = if !same_chip {
                self.lower_cross_chip(src_axis, dst_axis, src_addr, dst_addr, size)
            } else if same_block && src_axis == dst_axis {
                self.lower_intra_block_move(src_axis, src_addr, dst_addr, size)
            } else {
                self.lower_buffer_pair(src_axis, dst_axis, src_addr, dst_addr, size)
            };
            if ticks == ERR {
                return ERR;
            }
            total += ticks;
            i += 2;
        }
        total
    }

    fn lower_cross_chip(
        &mut self,
        src_axis: Axis,
        dst_axis: Axis,
        src_addr: u64,
        dst_addr: u64,
        size: u32,
    ) -> i64 {
        let mut read = Request::new(Kind::buffer_kind(src_axis, crate::request::BufferOp::Read));
        read.add_operand(src_addr, size);
        let t1 = self.send(&read);
        if t1 == ERR {
            return ERR;
        }

        let mut net_send = Request::new(Kind::NetworkSend);
        net_send.add_operand(src_addr, size);
        net_send.add_operand(dst_addr, size);
        let t2 = self.send(&net_send);
        if t2 == ERR {
            return ERR;
        }

        let mut net_recv = Request::new(Kind::NetworkReceive);
        net_recv.add_operand(src_addr, size);
        net_recv.add_operand(dst_addr, size);
        let t3 = self.send(&net_recv);
        if t3 == ERR {
            return ERR;
        }

        let mut write = Request::new(Kind::buffer_kind(dst_axis, crate::request::BufferOp::Write));
        write.add_operand(dst_addr, size);
        let t4 = self.send(&write);
        if t4 == ERR {
            return ERR;
        }

        t1 + t2 + t3 + t4
    }

    fn lower_buffer_pair(
        &mut self,
        src_axis: Axis,
        dst_axis: Axis,
        src_addr: u64,
        dst_addr: u64,
        size: u32,
    ) -> i64 {
        let mut read = Request::new(Kind::buffer_kind(src_axis, crate::request::BufferOp::Read));
        read.add_operand(src_addr, size);
        let t1 = self.send(&read);
        if t1 == ERR {
            return ERR;
        }

        let mut write = Request::new(Kind::buffer_kind(dst_axis, crate::request::BufferOp::Write));
        write.add_operand(dst_addr, size);
        let t2 = self.send(&write);
        if t2 == ERR {
            return ERR;
        }

        t1 + t2
    }

    fn lower_intra_block_move(&mut self, axis: Axis, src_addr: u64, dst_addr: u64, size: u32) -> i64 {
        let mut mv = Request::new(Kind::mv_kind(axis));
        mv.add_operand(src_addr, size);
        mv.add_operand(dst_addr, size);
        self.send(&mv)
    }
}

fn bounds_ok(axis: Axis, row: u32, col: u32, size: u32, geometry: &Geometry) -> bool {
    match axis {
        Axis::Row => col as u64 + size as u64 <= geometry.ncols as u64,
        Axis::Col => row as u64 + size as u64 <= geometry.nrows as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetScheme;

    fn make_dispatcher(nchips: u32) -> Dispatcher {
        let geometry = Geometry::new(nchips, 16, 256, 1024, 1024);
        let chips: Vec<_> = (0..nchips).map(|i| ChipController::new(i as usize, 8, 1.0e9)).collect();
        let network = NetworkOracle::new(NetScheme::Ideal, nchips);
        Dispatcher::new(geometry, chips, network)
    }

    #[test]
    fn test_every_kind_routes_without_hitting_default() {
        let kinds = [
            Kind::Read,
            Kind::Write,
            Kind::RowMv,
            Kind::ColMv,
            Kind::RowAdd,
            Kind::RowSub,
            Kind::RowMul,
            Kind::RowDiv,
            Kind::RowBitwise,
            Kind::RowSearch,
            Kind::ColAdd,
            Kind::ColSub,
            Kind::ColMul,
            Kind::ColDiv,
            Kind::ColBitwise,
            Kind::ColSearch,
            Kind::RowBufferRead,
            Kind::RowBufferWrite,
            Kind::ColBufferRead,
            Kind::ColBufferWrite,
            Kind::NetworkSend,
            Kind::NetworkReceive,
            Kind::SystemRow2Row,
            Kind::SystemRow2Col,
            Kind::SystemCol2Row,
            Kind::SystemCol2Col,
        ];
        for kind in kinds {
            let mut dispatcher = make_dispatcher(2);
            let geometry = *dispatcher.geometry();
            let mut req = Request::new(kind);
            match kind {
                Kind::NetworkSend | Kind::NetworkReceive => {
                    req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
                    req.add_operand(geometry.encode(1, 0, 0, 0, 0), 32);
                }
                Kind::SystemRow2Row | Kind::SystemRow2Col | Kind::SystemCol2Row | Kind::SystemCol2Col => {
                    req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
                    req.add_operand(geometry.encode(0, 0, 0, 1, 0), 32);
                }
                k if k == Kind::RowMv || k == Kind::ColMv => {
                    req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
                    req.add_operand(geometry.encode(0, 0, 0, 0, 64), 32);
                }
                _ => {
                    req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
                }
            }
            let ticks = dispatcher.send(&req);
            assert_ne!(ticks, ERR, "kind {:?} hit the default branch", kind);
        }
    }

    #[test]
    fn test_intra_block_row_mv_admits_one_primitive() {
        let mut dispatcher = make_dispatcher(1);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::RowMv);
        req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
        req.add_operand(geometry.encode(0, 0, 0, 0, 64), 32);
        let ticks = dispatcher.send(&req);
        assert!(ticks >= 1);
        assert_eq!(dispatcher.chips()[0].output_stats().op_counts.len(), 1);
    }

    #[test]
    fn test_col_mv_bounds_violation_returns_err() {
        let mut dispatcher = make_dispatcher(1);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::ColMv);
        req.add_operand(geometry.encode(0, 0, 0, 1020, 0), 10);
        req.add_operand(geometry.encode(0, 0, 0, 0, 1), 10);
        assert_eq!(dispatcher.send(&req), ERR);
    }

    #[test]
    fn test_row_pim_three_operands_admits_three_primitives() {
        let mut dispatcher = make_dispatcher(1);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::RowAdd);
        req.add_operand(geometry.encode(0, 0, 0, 0, 0), 1);
        req.add_operand(geometry.encode(0, 0, 1, 0, 0), 1);
        req.add_operand(geometry.encode(0, 0, 2, 0, 0), 1);
        let ticks = dispatcher.send(&req);
        assert_eq!(ticks, 0);
        let total_ops: u64 = dispatcher
            .chips()
            .iter()
            .map(|c| c.output_stats().op_counts.values().sum::<u64>())
            .sum();
        assert_eq!(total_ops, 3);
    }

    #[test]
    fn test_col_pim_drops_every_odd_operand() {
        let mut dispatcher = make_dispatcher(1);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::ColAdd);
        req.add_operand(geometry.encode(0, 0, 0, 0, 0), 1);
        req.add_operand(geometry.encode(0, 0, 1, 0, 0), 1);
        req.add_operand(geometry.encode(0, 0, 2, 0, 0), 1);
        req.add_operand(geometry.encode(0, 0, 3, 0, 0), 1);
        dispatcher.send(&req);
        let total_ops: u64 = dispatcher
            .chips()
            .iter()
            .map(|c| c.output_stats().op_counts.values().sum::<u64>())
            .sum();
        // Operands at index 0 and 2 only; 1 and 3 dropped.
        assert_eq!(total_ops, 2);
    }

    #[test]
    fn test_cross_chip_system_transfer_emits_four_primitives() {
        let mut dispatcher = make_dispatcher(2);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::SystemRow2Row);
        req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
        req.add_operand(geometry.encode(1, 0, 0, 0, 0), 32);
        let ticks = dispatcher.decompose_system_transfer(&req);
        assert_ne!(ticks, ERR);
        assert_eq!(dispatcher.network().total_transfers(), 1);
        let stats = dispatcher.network().link_stats();
        assert_eq!(stats[0].1.bytes, 32);
    }

    #[test]
    fn test_intra_block_same_axis_system_transfer_is_single_move() {
        let mut dispatcher = make_dispatcher(1);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::SystemRow2Row);
        req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
        req.add_operand(geometry.encode(0, 0, 0, 0, 64), 32);
        dispatcher.decompose_system_transfer(&req);
        let op_counts = dispatcher.chips()[0].output_stats().op_counts;
        assert_eq!(op_counts.get(&Kind::RowMv).copied().unwrap_or(0), 1);
        assert!(!op_counts.contains_key(&Kind::RowBufferRead));
    }

    #[test]
    fn test_intra_chip_inter_block_system_transfer_is_buffer_pair() {
        let mut dispatcher = make_dispatcher(1);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::SystemRow2Row);
        req.add_operand(geometry.encode(0, 0, 0, 0, 0), 32);
        req.add_operand(geometry.encode(0, 0, 1, 0, 0), 32);
        dispatcher.decompose_system_transfer(&req);
        let op_counts = dispatcher.chips()[0].output_stats().op_counts;
        assert_eq!(op_counts.get(&Kind::RowBufferRead).copied().unwrap_or(0), 1);
        assert_eq!(op_counts.get(&Kind::RowBufferWrite).copied().unwrap_or(0), 1);
        assert!(!op_counts.contains_key(&Kind::RowMv));
    }

    #[test]
    fn test_bounds_violation_on_system_transfer_returns_err() {
        let mut dispatcher = make_dispatcher(1);
        let geometry = *dispatcher.geometry();
        let mut req = Request::new(Kind::SystemRow2Row);
        req.add_operand(geometry.encode(0, 0, 0, 0, 1020), 10);
        req.add_operand(geometry.encode(0, 0, 1, 0, 0), 10);
        assert_eq!(dispatcher.decompose_system_transfer(&req), ERR);
    }
}
