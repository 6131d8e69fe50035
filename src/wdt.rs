//! Watchdog timer.
//!
//! The runtime does not service the watchdog; the board facade disables it
//! once at boot. WDT_MR is write-once until the next reset, so [disable] must
//! run before any other WDT_MR write.

use core::marker::PhantomData;

use arbitrary_int::u12;

/// Watchdog Timer base address.
pub const BASE_ADDR: usize = 0x400E_1A50;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Mode {
    #[bits(0..=11, rw)]
    wdv: u12,
    #[bit(12, rw)]
    wdfien: bool,
    #[bit(13, rw)]
    wdrsten: bool,
    #[bit(14, rw)]
    wdrproc: bool,
    /// Disables the watchdog entirely. Write-once.
    #[bit(15, rw)]
    wddis: bool,
    #[bits(16..=27, rw)]
    wdd: u12,
    #[bit(28, rw)]
    wddbghlt: bool,
    #[bit(29, rw)]
    wdidlehlt: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Wdt {
    #[mmio(Write)]
    cr: u32,
    mr: Mode,
    #[mmio(PureRead)]
    sr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Wdt>(), 0xC);

impl Wdt {
    pub const fn new_mmio() -> MmioWdt<'static> {
        MmioWdt {
            ptr: BASE_ADDR as *mut _,
            phantom: PhantomData,
        }
    }
}

/// Turns the watchdog off for the rest of this power cycle.
pub fn disable() {
    let mut wdt = Wdt::new_mmio();
    wdt.write_mr(
        Mode::builder()
            .with_wdv(u12::new(0xFFF))
            .with_wdfien(false)
            .with_wdrsten(false)
            .with_wdrproc(false)
            .with_wddis(true)
            .with_wdd(u12::new(0xFFF))
            .with_wddbghlt(false)
            .with_wdidlehlt(false)
            .build(),
    );
}
