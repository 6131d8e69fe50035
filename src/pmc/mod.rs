//! Power Management Controller: peripheral clock gates and system clock bring-up.
//!
//! [init_84mhz] raises the core and master clock from the 4 MHz reset default
//! to 84 MHz (12 MHz crystal, PLLA x7). Every step of the sequence is guarded
//! by an iteration-capped wait; on any timeout the function reports failure
//! and the caller may continue at the reset default, passing the active MCK
//! to the drivers it constructs.
pub mod regs;

use crate::PeripheralId;
use crate::mmio;
use arbitrary_int::{u4, u6, u11};
use regs::{MasterClockPrescaler, MasterClockSource, UsbClockSource};

/// Spin cap for each individual clock bring-up step.
pub const CLOCK_WAIT_ITERS: u32 = 5_000_000;

/// Number of flash wait states required for 84 MHz operation.
const FLASH_WAIT_STATES_84MHZ: u8 = 4;

#[inline]
pub fn enable_peripheral_clock(id: PeripheralId) {
    let mut pmc = regs::Pmc::new_mmio();
    let id = id as u32;
    if id < 32 {
        pmc.write_pcer0(1 << id);
    } else {
        pmc.write_pcer1(1 << (id - 32));
    }
}

#[inline]
pub fn disable_peripheral_clock(id: PeripheralId) {
    let mut pmc = regs::Pmc::new_mmio();
    let id = id as u32;
    if id < 32 {
        pmc.write_pcdr0(1 << id);
    } else {
        pmc.write_pcdr1(1 << (id - 32));
    }
}

#[inline]
pub fn peripheral_clock_enabled(id: PeripheralId) -> bool {
    let pmc = regs::Pmc::new_mmio();
    let id = id as u32;
    if id < 32 {
        pmc.read_pcsr0() & (1 << id) != 0
    } else {
        pmc.read_pcsr1() & (1 << (id - 32)) != 0
    }
}

/// Switches the core and master clock to 84 MHz from the main crystal via PLLA.
///
/// Returns `false` if any step timed out. No rollback is attempted; the clock
/// tree is left at whatever step completed last and the caller should treat
/// the active MCK as the 4 MHz reset default.
pub fn init_84mhz() -> bool {
    let mut pmc = regs::Pmc::new_mmio();

    // The flash cannot keep up with 84 MHz at the reset wait-state setting.
    // Program both banks before touching the clock tree.
    crate::eefc::set_flash_wait_states(FLASH_WAIT_STATES_84MHZ);
    mmio::dsb();
    mmio::isb();

    // Start the main crystal oscillator with the longest startup time.
    pmc.modify_ckgr_mor(|mut mor| {
        mor.set_key(regs::MOR_KEY);
        mor.set_moscxtst(0xFF);
        mor.set_moscxten(true);
        mor
    });
    if !mmio::wait_until(CLOCK_WAIT_ITERS, || pmc.read_sr().moscxts()) {
        return false;
    }

    // Hand MAINCK over from the internal RC to the crystal.
    pmc.modify_ckgr_mor(|mut mor| {
        mor.set_key(regs::MOR_KEY);
        mor.set_moscsel(true);
        mor
    });
    if !mmio::wait_until(CLOCK_WAIT_ITERS, || pmc.read_sr().moscxts()) {
        return false;
    }

    // 12 MHz * 7 / 1 = 84 MHz. MULA holds the multiplier minus one.
    pmc.write_ckgr_pllar(
        regs::PllaConfig::builder()
            .with_diva(1)
            .with_pllacount(u6::new(0x3F))
            .with_mula(u11::new(6))
            .with_one(true)
            .build(),
    );
    if !mmio::wait_until(CLOCK_WAIT_ITERS, || pmc.read_sr().locka()) {
        return false;
    }

    // Prescaler first, source second; the datasheet forbids changing both in
    // one write.
    pmc.modify_mckr(|mut mckr| {
        mckr.set_pres(MasterClockPrescaler::Clk1);
        mckr
    });
    if !mmio::wait_until(CLOCK_WAIT_ITERS, || pmc.read_sr().mckrdy()) {
        return false;
    }

    pmc.modify_mckr(|mut mckr| {
        mckr.set_css(MasterClockSource::PllaClock);
        mckr
    });
    if !mmio::wait_until(CLOCK_WAIT_ITERS, || pmc.read_sr().mckrdy()) {
        return false;
    }

    mmio::dsb();
    mmio::isb();
    true
}

/// Brings up the 480 MHz UTMI PLL and routes it to the USB OTG peripheral.
///
/// Returns `false` if the PLL did not lock within the wait cap.
pub fn enable_usb_clocks() -> bool {
    let mut pmc = regs::Pmc::new_mmio();

    pmc.modify_ckgr_uckr(|mut uckr| {
        uckr.set_upllcount(u4::new(0xF));
        uckr.set_upllen(true);
        uckr
    });
    if !mmio::wait_until(CLOCK_WAIT_ITERS, || pmc.read_sr().locku()) {
        return false;
    }

    pmc.write_usb(
        regs::UsbClock::builder()
            .with_usbs(UsbClockSource::Upll)
            .with_usbdiv(u4::new(0))
            .build(),
    );
    pmc.write_scer(
        regs::SystemClocks::builder()
            .with_uotgclk(true)
            .with_pck0(false)
            .with_pck1(false)
            .with_pck2(false)
            .build(),
    );
    true
}
