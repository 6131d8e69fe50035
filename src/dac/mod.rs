//! # DAC driver
//!
//! Tagged half-word writes to the two DAC channels (Due pins DAC0/DAC1).
pub mod regs;

use arbitrary_int::{u2, u3, u6};

use crate::{PeripheralId, enable_peripheral_clock};
use regs::{Control, Mode, WordTransfer};

#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DacError {
    /// Only channels 0 and 1 exist.
    #[error("invalid DAC channel")]
    InvalidChannel,
    /// The converter takes 12-bit values.
    #[error("value out of range")]
    ValueOutOfRange,
}

/// DAC driver handle.
pub struct Dac {
    regs: regs::MmioDacc<'static>,
}

impl Dac {
    /// Resets the controller and enables both channels in tag mode with
    /// software-triggered half-word transfers.
    pub fn new() -> Self {
        enable_peripheral_clock(PeripheralId::Dacc);
        let mut regs = regs::Dacc::new_mmio();
        regs.write_cr(Control::builder().with_swrst(true).build());
        regs.write_mr(
            Mode::builder()
                .with_trgen(false)
                .with_trgsel(u3::new(0))
                .with_word(WordTransfer::HalfWord)
                .with_sleep(false)
                .with_fastwkup(false)
                .with_refresh(1)
                .with_user_sel(u2::new(0))
                .with_tag(true)
                .with_maxs(false)
                .with_startup(u6::new(0))
                .build(),
        );
        regs.write_cher((1 << 0) | (1 << 1));
        Dac { regs }
    }

    /// Queues a 12-bit conversion on `channel` (0 or 1).
    pub fn write12(&mut self, channel: u8, value: u16) -> Result<(), DacError> {
        if channel > 1 {
            return Err(DacError::InvalidChannel);
        }
        if value > 0xFFF {
            return Err(DacError::ValueOutOfRange);
        }
        while !self.regs.read_isr().txrdy() {}
        self.regs
            .write_cdr(((channel as u32) << 12) | (value as u32 & 0xFFF));
        Ok(())
    }
}

impl Default for Dac {
    fn default() -> Self {
        Self::new()
    }
}
