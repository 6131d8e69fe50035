//! # GPIO driver on top of the PIO controllers
//!
//! A [Pin] owns one board pin descriptor and guarantees that the backing PIO
//! controller clock is enabled and the line is under PIO control for the
//! handle's lifetime. Board pins wired to two silicon pins (Due D4 and D10)
//! are handled transparently: writes are mirrored to both lines, reads are the
//! logical OR of both.
pub mod regs;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState, StatefulOutputPin};

use crate::pins::{self, PinDescriptor, SiliconPin};
use crate::{enable_peripheral_clock, trap};

/// GPIO pin handle.
pub struct Pin {
    descriptor: PinDescriptor,
}

impl Pin {
    /// Takes control of a board pin.
    ///
    /// Enables the PIO controller clock(s), asserts PIO control and clears
    /// interrupts, pull-up, multi-drive and the input filter on every silicon
    /// pin of the descriptor. The line starts out as a floating input.
    pub fn new(descriptor: PinDescriptor) -> Self {
        for silicon in descriptor.silicon_pins() {
            enable_peripheral_clock(silicon.port().peripheral_id());
            let mut pio = regs::Pio::new_mmio(silicon.port());
            let mask = silicon.mask();
            pio.write_per(mask);
            pio.write_idr(mask);
            pio.write_pudr(mask);
            pio.write_mddr(mask);
            pio.write_ifdr(mask);
        }
        Pin { descriptor }
    }

    /// Takes control of a board pin given its Arduino digital pin number.
    ///
    /// An unknown pin number is an unrecoverable boot misconfiguration and
    /// parks the CPU in [trap].
    pub fn from_arduino(number: u8) -> Self {
        match pins::by_arduino_number(number) {
            Some(descriptor) => Self::new(descriptor),
            None => trap(),
        }
    }

    pub const fn descriptor(&self) -> PinDescriptor {
        self.descriptor
    }

    fn for_each(&mut self, mut f: impl FnMut(&mut regs::MmioPio<'static>, u32)) {
        for silicon in self.descriptor.silicon_pins() {
            let mut pio = regs::Pio::new_mmio(silicon.port());
            f(&mut pio, silicon.mask());
        }
    }

    fn any(&self, f: impl Fn(&regs::MmioPio<'static>, u32) -> bool) -> bool {
        self.descriptor
            .silicon_pins()
            .any(|silicon: SiliconPin| f(&regs::Pio::new_mmio(silicon.port()), silicon.mask()))
    }

    /// Configures the pin as a push-pull output driving `initial`.
    pub fn output(&mut self, initial: bool) {
        self.write(initial);
        self.for_each(|pio, mask| pio.write_oer(mask));
    }

    /// Configures the pin as an input.
    pub fn input(&mut self) {
        self.for_each(|pio, mask| pio.write_odr(mask));
    }

    /// Configures the pin as an input with the internal pull-up enabled.
    pub fn input_pullup(&mut self) {
        self.input();
        self.pull_up(true);
    }

    pub fn pull_up(&mut self, on: bool) {
        self.for_each(|pio, mask| {
            if on {
                pio.write_puer(mask);
            } else {
                pio.write_pudr(mask);
            }
        });
    }

    /// Enables or disables multi-driver (open drain) operation.
    pub fn open_drain(&mut self, on: bool) {
        self.for_each(|pio, mask| {
            if on {
                pio.write_mder(mask);
            } else {
                pio.write_mddr(mask);
            }
        });
    }

    /// Enables or disables the input glitch filter.
    pub fn input_filter(&mut self, on: bool) {
        self.for_each(|pio, mask| {
            if on {
                pio.write_ifer(mask);
            } else {
                pio.write_ifdr(mask);
            }
        });
    }

    /// Drives the output latch high or low.
    pub fn write(&mut self, high: bool) {
        self.for_each(|pio, mask| {
            if high {
                pio.write_sodr(mask);
            } else {
                pio.write_codr(mask);
            }
        });
    }

    #[inline]
    pub fn on(&mut self) {
        self.write(true);
    }

    #[inline]
    pub fn off(&mut self) {
        self.write(false);
    }

    /// Samples the pin level (OR across dual-wired lines).
    pub fn read(&self) -> bool {
        self.any(|pio, mask| pio.read_pdsr() & mask != 0)
    }

    /// Reads back the output latch (OR across dual-wired lines).
    pub fn read_output_latch(&self) -> bool {
        self.any(|pio, mask| pio.read_odsr() & mask != 0)
    }

    /// Inverts the output latch.
    pub fn toggle(&mut self) {
        self.write(!self.read_output_latch());
    }
}

impl ErrorType for Pin {
    type Error = core::convert::Infallible;
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }

    fn set_state(&mut self, state: PinState) -> Result<(), Self::Error> {
        self.write(state == PinState::High);
        Ok(())
    }
}

impl StatefulOutputPin for Pin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_output_latch())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read_output_latch())
    }
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read())
    }
}
