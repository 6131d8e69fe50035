//! SysTick-backed millisecond timekeeping.
//!
//! The architected 24-bit SysTick counter fires once per millisecond and the
//! handler increments a process-wide tick counter with wrapping arithmetic.
//! The counter wraps every ~49.7 days; every comparison in this module uses
//! modular arithmetic, so sleeps and deadlines behave correctly across the
//! wrap.
//!
//! The crate does not install the exception vector itself. The firmware's
//! vector table must route the SysTick exception to [on_tick_interrupt].
//!
//! Fixed-period loops built from `sleep_for` accumulate drift proportional to
//! the loop body; for drift-free scheduling keep an absolute deadline and
//! advance it by the period:
//!
//! ```ignore
//! let mut next = timer.millis().wrapping_add(1000);
//! loop {
//!     timer.sleep_until(next);
//!     next = next.wrapping_add(1000);
//!     // work
//! }
//! ```

use core::cell::Cell;
use core::marker::PhantomData;

use critical_section::Mutex;

use crate::mmio;
use crate::time::Hertz;

/// SysTick register base inside the System Control Space.
pub const BASE_ADDR: usize = 0xE000_E010;

static TICK_MS: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    External = 0,
    Processor = 1,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Control {
    #[bit(0, rw)]
    enable: bool,
    #[bit(1, rw)]
    tickint: bool,
    #[bit(2, rw)]
    clksource: ClockSource,
    #[bit(16, r)]
    countflag: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct SysTickRegs {
    csr: Control,
    /// Reload value; the counter period is `rvr + 1` core clock cycles.
    rvr: u32,
    cvr: u32,
    #[mmio(PureRead)]
    calib: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<SysTickRegs>(), 0x10);

impl SysTickRegs {
    pub const fn new_mmio() -> MmioSysTickRegs<'static> {
        MmioSysTickRegs {
            ptr: BASE_ADDR as *mut _,
            phantom: PhantomData,
        }
    }
}

/// Snapshot of the global millisecond counter.
///
/// The read happens inside a critical section, which on this single-core part
/// reduces to a PRIMASK mask around one load. Monotonic modulo 2^32.
#[inline]
pub fn millis() -> u32 {
    critical_section::with(|cs| TICK_MS.borrow(cs).get())
}

/// The SysTick exception handler body: one wrapping increment, nothing else.
///
/// Must be called from the SysTick slot of the vector table and from nowhere
/// else.
#[inline]
pub fn on_tick_interrupt() {
    critical_section::with(|cs| {
        let tick = TICK_MS.borrow(cs);
        tick.set(tick.get().wrapping_add(1));
    });
}

/// True once `now` has reached or passed `deadline` in wrap-safe ordering.
#[inline]
pub const fn deadline_reached(now: u32, deadline: u32) -> bool {
    now.wrapping_sub(deadline) & 0x8000_0000 == 0
}

/// Milliseconds elapsed since `start`, wrap-safe.
#[inline]
pub const fn millis_since(now: u32, start: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Driver handle for the SysTick timer.
///
/// Created once with the active CPU clock, started once, then used for the
/// lifetime of the program.
pub struct SysTick {
    cpu_hz: Hertz,
    regs: MmioSysTickRegs<'static>,
}

impl SysTick {
    pub fn new(cpu_hz: Hertz) -> Self {
        SysTick {
            cpu_hz,
            regs: SysTickRegs::new_mmio(),
        }
    }

    pub const fn cpu_hz(&self) -> Hertz {
        self.cpu_hz
    }

    /// Programs a 1 ms period and enables the counter and its interrupt.
    pub fn start_tick_1ms(&mut self) {
        self.regs.write_rvr(self.cpu_hz.raw() / 1000 - 1);
        self.regs.write_cvr(0);
        self.regs.write_csr(
            Control::builder()
                .with_enable(true)
                .with_tickint(true)
                .with_clksource(ClockSource::Processor)
                .build(),
        );
        mmio::dsb();
        mmio::isb();
    }

    /// Snapshot of the global millisecond counter.
    #[inline]
    pub fn millis(&self) -> u32 {
        millis()
    }

    /// Busy-waits until at least `ms` milliseconds have elapsed.
    pub fn sleep(&self, ms: u32) {
        let start = millis();
        while millis_since(millis(), start) < ms {
            mmio::nop();
        }
    }

    /// Busy-waits until the wrap-safe deadline has been reached.
    pub fn sleep_until(&self, deadline: u32) {
        while !deadline_reached(millis(), deadline) {
            mmio::nop();
        }
    }

    /// Sleeps for `ms` milliseconds measured from now.
    pub fn sleep_for(&self, ms: u32) {
        self.sleep_until(millis().wrapping_add(ms));
    }
}

impl embedded_hal::delay::DelayNs for SysTick {
    fn delay_ns(&mut self, ns: u32) {
        // Millisecond granularity, rounding up.
        self.sleep(ns.div_ceil(1_000_000));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_ordering() {
        assert!(deadline_reached(10, 10));
        assert!(deadline_reached(11, 10));
        assert!(!deadline_reached(9, 10));
    }

    #[test]
    fn deadline_ordering_across_wrap() {
        // Counter wrapped: "now" is numerically tiny, deadline is huge.
        assert!(deadline_reached(5, 0xFFFF_FFF0));
        // Deadline itself sits past the wrap.
        let deadline = 0xFFFF_FF00u32.wrapping_add(1000); // 0x0000_02E8
        assert!(!deadline_reached(0xFFFF_FFFF, deadline));
        assert!(!deadline_reached(0x0000_00E8, deadline));
        assert!(deadline_reached(deadline, deadline));
        assert!(deadline_reached(deadline.wrapping_add(1), deadline));
    }

    #[test]
    fn elapsed_across_wrap() {
        let start = 0xFFFF_FF00u32;
        assert_eq!(millis_since(0x0000_00E8, start), 0x1E8);
        assert!(millis_since(0x0000_00E8, start) < 1000);
        assert_eq!(millis_since(start.wrapping_add(1000), start), 1000);
    }
}
