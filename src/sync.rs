//! Clock Synchroniser (spec.md §4.7): the happens-before edge between
//! top-level requests. Runs after every [`crate::system::System::send`].
//!
//! Grounded on the teacher's top-level `Simulation::run` loop
//! (`simulate/mod.rs`), which likewise drives every processor forward
//! by explicit `tick()` calls rather than a runtime scheduler.

use crate::chip::ChipProxy;

/// Drains every chip to `finished()`, computes the global maximum
/// time, ticks every chip up to that maximum, then commits via
/// `update_time()`. No synchronisation happens inside a request's
/// decomposition — only here, between top-level requests.
pub fn synchronize<C: ChipProxy>(chips: &mut [C]) {
    for chip in chips.iter_mut() {
        while !chip.finished() {
            chip.tick();
        }
    }

    let target = chips.iter().map(|c| c.time()).max().unwrap_or(0);

    for chip in chips.iter_mut() {
        while chip.time() < target {
            chip.tick();
        }
        chip.update_time();
    }
}
