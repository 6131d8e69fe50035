//! # ADC driver
//!
//! Polled 12-bit conversions through the last-converted-data register. One
//! channel is kept enabled at a time; switching channels swaps the enable
//! bits before starting the conversion.
pub mod regs;

use arbitrary_int::{u2, u3, u4};

use crate::time::Hertz;
use crate::{PeripheralId, enable_peripheral_clock, mmio};
use regs::{Control, Mode};

/// Highest ADC channel number on the SAM3X8E.
pub const MAX_CHANNEL: u8 = 15;

/// Sentinel returned by [Adc::read12] on timeout or a bad channel number.
pub const READ_FAILED: u16 = 0xFFFF;

/// Conversion-complete wait cap.
const DRDY_WAIT_ITERS: u32 = 400_000;

/// Prescaler for a target ADC clock: ceil(mck / (2 * adc_clock)) - 1.
pub(crate) const fn prescaler(mck: u32, adc_clock: u32) -> u8 {
    (mck.div_ceil(2 * adc_clock) - 1) as u8
}

/// ADC driver handle.
pub struct Adc {
    regs: regs::MmioAdc<'static>,
    active_channel: Option<u8>,
}

impl Adc {
    /// Resets and configures the controller for software-triggered 12-bit
    /// conversions at roughly `adc_clock`. All channels start disabled.
    pub fn new(mck: Hertz, adc_clock: Hertz) -> Self {
        enable_peripheral_clock(PeripheralId::Adc);
        let mut regs = regs::Adc::new_mmio();
        regs.write_cr(Control::builder().with_swrst(true).with_start(false).build());
        regs.write_mr(
            Mode::builder()
                .with_trgen(false)
                .with_trgsel(u3::new(0))
                .with_lowres(false)
                .with_sleep(false)
                .with_fwup(false)
                .with_freerun(false)
                .with_prescal(prescaler(mck.raw(), adc_clock.raw()))
                .with_startup(u4::new(8))
                .with_settling(u2::new(0))
                .with_anach(false)
                .with_tracktim(u4::new(3))
                .with_transfer(u2::new(1))
                .with_useq(false)
                .build(),
        );
        regs.write_chdr(0xFFFF);
        Adc {
            regs,
            active_channel: None,
        }
    }

    /// Samples `channel` and returns the 12-bit result.
    ///
    /// Returns [READ_FAILED] if the channel number is out of range or the
    /// conversion did not complete within the wait cap.
    pub fn read12(&mut self, channel: u8) -> u16 {
        if channel > MAX_CHANNEL {
            return READ_FAILED;
        }
        if self.active_channel != Some(channel) {
            self.regs.write_cher(1 << channel);
            if let Some(previous) = self.active_channel {
                self.regs.write_chdr(1 << previous);
            }
            self.active_channel = Some(channel);
        }
        self.regs.write_cr(Control::builder().with_swrst(false).with_start(true).build());
        if !mmio::wait_until(DRDY_WAIT_ITERS, || self.regs.read_isr().drdy()) {
            return READ_FAILED;
        }
        (self.regs.read_lcdr() & 0xFFF) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescaler_rounds_up() {
        // 84 MHz / (2 * 1 MHz) = 42 exactly.
        assert_eq!(prescaler(84_000_000, 1_000_000), 41);
        // 84 MHz / (2 * 20 MHz) = 2.1, rounded up to 3.
        assert_eq!(prescaler(84_000_000, 20_000_000), 2);
        // 4 MHz / (2 * 1 MHz) = 2.
        assert_eq!(prescaler(4_000_000, 1_000_000), 1);
    }
}
