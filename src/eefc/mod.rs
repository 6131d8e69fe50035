//! Enhanced Embedded Flash Controller.
//!
//! Two services live here: wait-state programming for the clock bring-up, and
//! the persistent key/value store in the reserved flash page ([store]).
pub mod regs;
pub mod store;

use arbitrary_int::u4;

pub use store::{KvStore, StoreError, TypeTag};

/// Internal flash page size in bytes.
pub const PAGE_SIZE: usize = 256;

/// Page index of the reserved key/value page within bank 1.
pub const RESERVED_PAGE_INDEX: u16 = 1023;

/// Absolute address of the reserved key/value page (last page of bank 1).
///
/// The linker script of the integrating firmware must keep code out of this
/// page; re-flashing the firmware erases it.
pub const RESERVED_PAGE_ADDR: usize = 0x000F_FF00;

/// Programs the read wait states of both flash banks.
///
/// Must be called before raising the master clock beyond what the current
/// setting supports; the caller is responsible for the subsequent barriers.
pub fn set_flash_wait_states(wait_states: u8) {
    for bank in [regs::Bank::Eefc0, regs::Bank::Eefc1] {
        let mut eefc = regs::Eefc::new_mmio(bank);
        eefc.modify_fmr(|mut fmr| {
            fmr.set_fws(u4::new(wait_states));
            fmr
        });
    }
}
