//! Tiled matrix-multiply kernel, re-expressed against the simulator's
//! public API rather than ported line-for-line: stage operand tiles
//! of A and B into PIM blocks with a column-wide system transfer,
//! shift/align them, multiply row-wise, reduce with column adds, and
//! ship the partial sums back out.

use pimsim::addr::Geometry;
use pimsim::config::Config;
use pimsim::request::{Kind, Request};
use pimsim::system::System;

const A_ROWS: u32 = 4;
const A_COLS: u32 = 4;
const B_COLS: u32 = 4;
const TILE: u32 = 32;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_toml_str(
        r#"
        nchips = 1
        ntiles = 4
        nblocks = 64
        nrows = 1024
        ncols = 1024
        "#,
    )?;
    let geometry = Geometry::new(config.nchips, config.ntiles, config.nblocks, config.nrows, config.ncols);
    let mut system = System::new(&config);

    let a_block = 0u32;
    let no_blocks = (A_ROWS / A_COLS).max(1) * (B_COLS / A_COLS).max(1);

    // Stage A and B operand tiles into their PIM blocks.
    let mut stage = Request::new(Kind::SystemCol2Col);
    for blk in 0..no_blocks {
        stage.add_operand(geometry.encode(0, 0, a_block, 0, blk * 2), TILE);
        stage.add_operand(geometry.encode(0, 0, blk % config.nblocks, 0, 0), TILE);
    }
    system.send(&stage);

    // Align the two operand columns with a bitwise shift.
    let mut shift = Request::new(Kind::ColBitwise);
    for blk in 0..no_blocks {
        shift.add_operand(geometry.encode(0, 0, blk % config.nblocks, 0, 2), TILE);
    }
    system.send(&shift);

    // Broadcast the aligned operand within the block via ColMv. ColMv
    // is an intra-block primitive (§4.5); relocating across blocks
    // needs a SystemCol2Col transfer instead, as the staging step above
    // already does.
    let mut broadcast = Request::new(Kind::ColMv);
    broadcast.add_operand(geometry.encode(0, 0, a_block, 0, 2), TILE);
    broadcast.add_operand(geometry.encode(0, 0, a_block, 0, 3), TILE);
    system.send(&broadcast);

    // Row-wise multiply of the staged operand pairs.
    let mut mul = Request::new(Kind::RowMul);
    for row in 0..A_ROWS {
        mul.add_operand(geometry.encode(0, 0, a_block, row, 0), 2 * TILE);
    }
    system.send(&mul);

    // Tree-reduce partial products with column adds.
    for level in 1..A_ROWS {
        let mut add = Request::new(Kind::ColAdd);
        for blk in 0..no_blocks {
            add.add_operand(geometry.encode(0, 0, blk % config.nblocks, level * 2, 0), 2 * TILE);
        }
        system.send(&add);
    }

    // Ship the reduced column back to host-visible storage.
    let mut writeback = Request::new(Kind::SystemCol2Col);
    writeback.add_operand(geometry.encode(0, 0, a_block, 2 * (A_ROWS - 1), 0), TILE);
    writeback.add_operand(geometry.encode(0, 0, a_block, 0, 500), TILE);
    system.send(&writeback);

    system.write_report()?;
    Ok(())
}
