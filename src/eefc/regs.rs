use core::marker::PhantomData;

use arbitrary_int::u4;

/// Flash controller for bank 0 (0x0008_0000..0x000C_0000).
pub const BASE_ADDR_0: usize = 0x400E_0A00;
/// Flash controller for bank 1 (0x000C_0000..0x0010_0000).
pub const BASE_ADDR_1: usize = 0x400E_0C00;

/// Password required in the FKEY field of every FCR write.
pub const FCR_KEY: u8 = 0x5A;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bank {
    Eefc0 = 0,
    Eefc1 = 1,
}

impl Bank {
    /// Unsafely steal the flash controller register block for this bank.
    ///
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees by the HAL.
    pub unsafe fn steal_regs(&self) -> MmioEefc<'static> {
        Eefc::new_mmio(*self)
    }
}

/// Flash commands issued through [Command] (subset used by this crate).
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashCommand {
    GetDescriptor = 0x00,
    WritePage = 0x01,
    /// Erase page and write page in one command.
    EraseAndWritePage = 0x03,
    EraseAll = 0x05,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct Mode {
    /// Flash-ready interrupt enable (unused; this crate polls FSR).
    #[bit(0, rw)]
    frdy: bool,
    /// Flash wait states for read accesses.
    #[bits(8..=11, rw)]
    fws: u4,
    #[bit(16, rw)]
    scod: bool,
    #[bit(24, rw)]
    fam: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Command {
    #[bits(0..=7, w)]
    fcmd: u8,
    /// Command argument; the page index for page-oriented commands.
    #[bits(8..=23, w)]
    farg: u16,
    /// Must be [FCR_KEY] for the command to be accepted.
    #[bits(24..=31, w)]
    fkey: u8,
}

/// Flash status. FCMDE and FLOCKE are cleared by the read, so a caller
/// checking for command failure must use the same read that observed FRDY.
#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct Status {
    #[bit(0, r)]
    frdy: bool,
    /// Command error (bad command or bad FKEY).
    #[bit(1, r)]
    fcmde: bool,
    /// Attempted write to a locked region.
    #[bit(2, r)]
    flocke: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Eefc {
    fmr: Mode,
    #[mmio(Write)]
    fcr: Command,
    #[mmio(PureRead)]
    fsr: Status,
    #[mmio(PureRead)]
    frr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Eefc>(), 0x10);

impl Eefc {
    const fn new_mmio_at(base: usize) -> MmioEefc<'static> {
        MmioEefc {
            ptr: base as *mut _,
            phantom: PhantomData,
        }
    }

    pub const fn new_mmio(bank: Bank) -> MmioEefc<'static> {
        match bank {
            Bank::Eefc0 => Self::new_mmio_at(BASE_ADDR_0),
            Bank::Eefc1 => Self::new_mmio_at(BASE_ADDR_1),
        }
    }
}
