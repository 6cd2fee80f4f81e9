//! Request kinds and the value object the dispatcher operates on.
//!
//! Generalises the teacher's tagged-union work items
//! (`simulate/nmpgc/work.rs`'s `NMPProcessorWork`/`NMPMessageWork`) to
//! the closed `Kind` enum of spec.md §6.

use crate::addr::Location;
use serde::Deserialize;

/// The closed set of request kinds (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Kind {
    Read,
    Write,
    RowMv,
    ColMv,
    RowAdd,
    RowSub,
    RowMul,
    RowDiv,
    RowBitwise,
    RowSearch,
    ColAdd,
    ColSub,
    ColMul,
    ColDiv,
    ColBitwise,
    ColSearch,
    RowBufferRead,
    RowBufferWrite,
    ColBufferRead,
    ColBufferWrite,
    NetworkSend,
    NetworkReceive,
    SystemRow2Row,
    SystemRow2Col,
    SystemCol2Row,
    SystemCol2Col,
}

/// Row or column axis a primitive/system-transfer kind operates along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

/// Which half of a buffer primitive pair is being lowered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOp {
    Read,
    Write,
}

impl Kind {
    /// `(source_axis, destination_axis)` for the four `SystemX2Y` kinds.
    pub fn system_axes(self) -> Option<(Axis, Axis)> {
        match self {
            Kind::SystemRow2Row => Some((Axis::Row, Axis::Row)),
            Kind::SystemRow2Col => Some((Axis::Row, Axis::Col)),
            Kind::SystemCol2Row => Some((Axis::Col, Axis::Row)),
            Kind::SystemCol2Col => Some((Axis::Col, Axis::Col)),
            _ => None,
        }
    }

    pub fn is_system(self) -> bool {
        self.system_axes().is_some()
    }

    pub fn is_row_pim(self) -> bool {
        matches!(
            self,
            Kind::RowAdd
                | Kind::RowSub
                | Kind::RowMul
                | Kind::RowDiv
                | Kind::RowBitwise
                | Kind::RowSearch
        )
    }

    pub fn is_col_pim(self) -> bool {
        matches!(
            self,
            Kind::ColAdd
                | Kind::ColSub
                | Kind::ColMul
                | Kind::ColDiv
                | Kind::ColBitwise
                | Kind::ColSearch
        )
    }

    pub fn buffer_kind(axis: Axis, op: BufferOp) -> Kind {
        match (axis, op) {
            (Axis::Row, BufferOp::Read) => Kind::RowBufferRead,
            (Axis::Row, BufferOp::Write) => Kind::RowBufferWrite,
            (Axis::Col, BufferOp::Read) => Kind::ColBufferRead,
            (Axis::Col, BufferOp::Write) => Kind::ColBufferWrite,
        }
    }

    pub fn mv_kind(axis: Axis) -> Kind {
        match axis {
            Axis::Row => Kind::RowMv,
            Axis::Col => Kind::ColMv,
        }
    }
}

/// A request: an operation kind plus an ordered list of `(addr, size)`
/// operand pairs. `location` is filled in by the dispatcher before the
/// request reaches a chip; client-constructed requests leave it unset.
#[derive(Debug, Clone)]
pub struct Request {
    pub kind: Kind,
    pub operands: Vec<(u64, u32)>,
    pub location: Option<Location>,
}

impl Request {
    pub fn new(kind: Kind) -> Self {
        Request { kind, operands: Vec::new(), location: None }
    }

    pub fn add_operand(&mut self, addr: u64, size: u32) -> &mut Self {
        self.operands.push((addr, size));
        self
    }

    pub fn set_location(&mut self, chip: u32, tile: u32, block: u32, row: i64, col: i64) {
        self.location = Some(Location { chip, tile, block, row, col });
    }

    pub fn describe(&self) -> String {
        format!(
            "{:?} operands={:?} location={:?}",
            self.kind, self.operands, self.location
        )
    }
}

/// Wire form of a client-issued request (JSON-lines input to the
/// binary): just kind and operands, since `location` is always
/// resolved internally by the dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSpec {
    pub kind: Kind,
    pub operands: Vec<(u64, u32)>,
}

impl RequestSpec {
    pub fn into_request(self) -> Request {
        let mut req = Request::new(self.kind);
        req.operands = self.operands;
        req
    }
}
