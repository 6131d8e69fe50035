//! # Board facade
//!
//! One-shot bring-up for the Arduino Due: watchdog off, 84 MHz clock tree,
//! Programming-Port UART, millisecond tick and (optionally) the I2C master.
//! The returned [Board] context owns the constructed drivers; construct it
//! exactly once. ADC, DAC, USB and the flash store are application-owned and
//! constructed on demand.
//!
//! ```ignore
//! let mut board = Board::init(BoardConfig::default());
//! let mut led = Pin::new(pins::LED_BUILTIN);
//! led.output(false);
//! loop {
//!     led.toggle();
//!     board.timer.sleep_for(1000);
//! }
//! ```

use crate::systick::SysTick;
use crate::time::{Hertz, MCK_84MHZ, MCK_RESET_DEFAULT};
use crate::twi::Twi;
use crate::uart::Uart;
use crate::{mmio, pmc, wdt};

/// Bring-up options.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardConfig {
    pub baud: Hertz,
    pub print_boot_banner: bool,
    /// Bus clock for the I2C master; `None` skips constructing it.
    pub i2c_clock: Option<Hertz>,
}

impl BoardConfig {
    pub fn baud(mut self, baud: Hertz) -> Self {
        self.baud = baud;
        self
    }

    pub fn print_boot_banner(mut self, on: bool) -> Self {
        self.print_boot_banner = on;
        self
    }

    pub fn i2c_clock(mut self, clock: Option<Hertz>) -> Self {
        self.i2c_clock = clock;
        self
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            baud: Hertz::from_raw(115_200),
            print_boot_banner: true,
            i2c_clock: Some(Hertz::from_raw(100_000)),
        }
    }
}

/// Board context owning the always-on drivers.
pub struct Board {
    pub clock_ok: bool,
    pub mck: Hertz,
    pub cpu_hz: Hertz,
    pub serial: Uart,
    pub timer: SysTick,
    pub i2c: Option<Twi>,
}

impl Board {
    /// Performs the one-shot board bring-up.
    ///
    /// If the PLL fails to lock the board keeps running at the 4 MHz reset
    /// default; `clock_ok` reports which happened and every driver is
    /// constructed against the clock that is actually active.
    pub fn init(config: BoardConfig) -> Board {
        wdt::disable();

        let clock_ok = pmc::init_84mhz();
        let mck = if clock_ok { MCK_84MHZ } else { MCK_RESET_DEFAULT };

        let mut serial = Uart::new(mck);
        serial.begin(config.baud);
        if config.print_boot_banner {
            serial.write_str("BOOT\nclock_ok=");
            serial.write_dec(clock_ok as u32);
            serial.write_str("\n");
        }

        let mut timer = SysTick::new(mck);
        timer.start_tick_1ms();
        unsafe { mmio::enable_irq() };

        let i2c = config.i2c_clock.map(|bus| {
            let mut twi = Twi::new(mck);
            twi.begin();
            twi.set_clock(bus);
            twi
        });

        Board {
            clock_ok,
            mck,
            cpu_hz: mck,
            serial,
            timer,
            i2c,
        }
    }
}
