//! Flat-address <-> (chip, tile, block, row, col) mapping.
//!
//! Mirrors the bit-sliced address decomposition in the teacher's
//! `simulate/nmpgc/topology.rs` (`SimulationMemoryConfiguration::get_*`),
//! but generalised from fixed bit-widths to arbitrary mixed-radix
//! dimensions, since PIM geometry is not constrained to powers of two.

/// Immutable, process-wide geometry of the PIM device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub nchips: u32,
    pub ntiles: u32,
    pub nblocks: u32,
    pub nrows: u32,
    pub ncols: u32,
}

/// Fully resolved location of an operand: `row`/`col` of `-1` denotes
/// an axis-wide primitive (see the crate-level glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub chip: u32,
    pub tile: u32,
    pub block: u32,
    pub row: i64,
    pub col: i64,
}

impl Location {
    pub fn cell(chip: u32, tile: u32, block: u32, row: u32, col: u32) -> Self {
        Location { chip, tile, block, row: row as i64, col: col as i64 }
    }

    pub fn same_block(&self, other: &Location) -> bool {
        self.chip == other.chip && self.tile == other.tile && self.block == other.block
    }

    pub fn same_chip_block(&self, other: &Location) -> bool {
        self.chip == other.chip && self.block == other.block
    }
}

impl Geometry {
    pub fn new(nchips: u32, ntiles: u32, nblocks: u32, nrows: u32, ncols: u32) -> Self {
        Geometry { nchips, ntiles, nblocks, nrows, ncols }
    }

    pub fn blocksize(&self) -> u64 {
        self.nrows as u64 * self.ncols as u64
    }

    pub fn total_addresses(&self) -> u64 {
        self.nchips as u64 * self.ntiles as u64 * self.nblocks as u64 * self.blocksize()
    }

    /// `A = (((chip * Ntiles + tile) * Nblocks + block) * Nrows + row) * Ncols + col`
    pub fn encode(&self, chip: u32, tile: u32, block: u32, row: u32, col: u32) -> u64 {
        let a = chip as u64 * self.ntiles as u64 + tile as u64;
        let a = a * self.nblocks as u64 + block as u64;
        let a = a * self.nrows as u64 + row as u64;
        a * self.ncols as u64 + col as u64
    }

    /// Inverse of [`Geometry::encode`]: successive modulo/division from
    /// the least significant digit (`col`) up to the most significant
    /// (`chip`).
    pub fn decode_full(&self, addr: u64) -> (u32, u32, u32, u32, u32) {
        let mut a = addr;
        let col = (a % self.ncols as u64) as u32;
        a /= self.ncols as u64;
        let row = (a % self.nrows as u64) as u32;
        a /= self.nrows as u64;
        let block = (a % self.nblocks as u64) as u32;
        a /= self.nblocks as u64;
        let tile = (a % self.ntiles as u64) as u32;
        a /= self.ntiles as u64;
        let chip = a as u32;
        (chip, tile, block, row, col)
    }

    pub fn decode_full_location(&self, addr: u64) -> Location {
        let (chip, tile, block, row, col) = self.decode_full(addr);
        Location::cell(chip, tile, block, row, col)
    }

    /// Decodes only chip/tile/block, dividing out `blocksize` first.
    ///
    /// PRESERVED QUIRK (spec.md §9 Open Question 1, DESIGN.md): the
    /// source this was distilled from swaps the `tile_idx`/`block_idx`
    /// names during extraction, so the tuple returned here has the
    /// tile and block slots swapped relative to what `decode_full`
    /// would report for the same address. No current caller relies on
    /// the correct order, so this is preserved bit-for-bit rather than
    /// silently fixed.
    pub fn decode_block(&self, addr: u64) -> (u32, u32, u32) {
        let mut a = addr / self.blocksize();
        let block_idx = (a % self.nblocks as u64) as u32;
        a /= self.nblocks as u64;
        let tile_idx = (a % self.ntiles as u64) as u32;
        a /= self.ntiles as u64;
        let chip_idx = a as u32;
        // Swapped on return relative to decode_full's (chip, tile, block).
        (chip_idx, block_idx, tile_idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> Geometry {
        Geometry::new(1, 16, 256, 1024, 1024)
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let g = geometry();
        let addr = g.encode(0, 3, 5, 100, 200);
        assert_eq!(g.decode_full(addr), (0, 3, 5, 100, 200));
    }

    #[test]
    fn test_round_trip_exhaustive_small_geometry() {
        let g = Geometry::new(2, 2, 2, 2, 2);
        for chip in 0..g.nchips {
            for tile in 0..g.ntiles {
                for block in 0..g.nblocks {
                    for row in 0..g.nrows {
                        for col in 0..g.ncols {
                            let addr = g.encode(chip, tile, block, row, col);
                            assert_eq!(g.decode_full(addr), (chip, tile, block, row, col));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_address_monotonic_in_col() {
        let g = geometry();
        let a0 = g.encode(0, 0, 0, 0, 0);
        let a1 = g.encode(0, 0, 0, 0, 1);
        assert!(a1 > a0);
    }

    #[test]
    fn test_address_monotonic_in_row() {
        let g = geometry();
        let a0 = g.encode(0, 0, 0, 0, 0);
        let a1 = g.encode(0, 0, 0, 1, 0);
        assert!(a1 > a0);
    }

    #[test]
    fn test_address_monotonic_in_chip() {
        let g = Geometry::new(4, 16, 256, 1024, 1024);
        let a0 = g.encode(0, 15, 255, 1023, 1023);
        let a1 = g.encode(1, 0, 0, 0, 0);
        assert!(a1 > a0);
    }

    #[test]
    fn test_decode_block_swap_quirk() {
        let g = geometry();
        let addr = g.encode(0, 3, 5, 100, 200);
        let (chip, tile_idx, block_idx) = g.decode_block(addr);
        // decode_full would give tile=3, block=5; decode_block returns
        // them in the opposite slots by design (preserved quirk).
        assert_eq!(chip, 0);
        assert_eq!(tile_idx, 5);
        assert_eq!(block_idx, 3);
    }

    #[test]
    fn test_total_addresses_in_bounds() {
        let g = geometry();
        let max_addr = g.encode(0, 15, 255, 1023, 1023);
        assert!(max_addr < g.total_addresses());
    }
}
