//! Bare-metal runtime and peripheral HAL for the Atmel SAM3X8E (ARM Cortex-M3)
//! as deployed on the Arduino Due.
//!
//! The crate runs without an operating system, a vendor HAL or a C library.
//! All register maps are hand-written typed register blocks. Peripheral I/O is
//! polled; the only interrupt used is the architected SysTick exception, which
//! feeds the millisecond tick counter in [systick].
//!
//! [board::Board::init] performs the one-shot bring-up (watchdog off, 84 MHz
//! PLLA clock, UART telemetry, tick timer, optional I2C master) and hands back
//! a context owning the constructed drivers.
#![cfg_attr(not(test), no_std)]

pub mod adc;
pub mod board;
pub mod dac;
pub mod eefc;
pub mod mmio;
pub mod pins;
pub mod pio;
pub mod pmc;
pub mod systick;
pub mod time;
pub mod twi;
pub mod uart;
pub mod usb;
pub mod wdt;

pub use pmc::{disable_peripheral_clock, enable_peripheral_clock};

/// Peripheral identifiers of the SAM3X8E.
///
/// The numeric value is the NVIC interrupt line as well as the bit position in
/// the PMC clock gate registers (PCER0/PCDR0 for identifiers below 32,
/// PCER1/PCDR1 for the rest).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralId {
    Supc = 0,
    Rstc = 1,
    Rtc = 2,
    Rtt = 3,
    Wdt = 4,
    Pmc = 5,
    Eefc0 = 6,
    Eefc1 = 7,
    Uart = 8,
    Smc = 9,
    PioA = 11,
    PioB = 12,
    PioC = 13,
    PioD = 14,
    Usart0 = 17,
    Usart1 = 18,
    Usart2 = 19,
    Usart3 = 20,
    Hsmci = 21,
    Twi0 = 22,
    Twi1 = 23,
    Spi0 = 24,
    Ssc = 26,
    Tc0 = 27,
    Tc1 = 28,
    Tc2 = 29,
    Tc3 = 30,
    Tc4 = 31,
    Tc5 = 32,
    Tc6 = 33,
    Tc7 = 34,
    Tc8 = 35,
    Pwm = 36,
    Adc = 37,
    Dacc = 38,
    Dmac = 39,
    Uotghs = 40,
    Trng = 41,
    Emac = 42,
    Can0 = 43,
    Can1 = 44,
}

/// PIO controller ports of the SAM3X8E.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

impl Port {
    /// Peripheral identifier controlling this port's clock gate.
    pub const fn peripheral_id(&self) -> PeripheralId {
        match self {
            Port::A => PeripheralId::PioA,
            Port::B => PeripheralId::PioB,
            Port::C => PeripheralId::PioC,
            Port::D => PeripheralId::PioD,
        }
    }

    /// Unsafely steal the PIO register block for this port.
    ///
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees by the HAL.
    pub unsafe fn steal_pio(&self) -> pio::regs::MmioPio<'static> {
        pio::regs::Pio::new_mmio(*self)
    }
}

/// Parks the CPU in an endless NOP loop.
///
/// Used for unrecoverable boot misconfiguration (e.g. constructing a GPIO
/// handle for a board pin that does not exist) where no logging facility is
/// available yet.
pub fn trap() -> ! {
    loop {
        mmio::nop();
    }
}

#[allow(dead_code)]
pub(crate) mod sealed {
    pub trait Sealed {}
}
