//! Clock rate units used across the driver APIs.

pub use fugit::HertzU32 as Hertz;
pub use fugit::RateExtU32;

/// CPU and master clock frequency after a successful PLLA bring-up.
pub const MCK_84MHZ: Hertz = Hertz::from_raw(84_000_000);

/// CPU and master clock frequency at the reset default (internal 4 MHz RC).
pub const MCK_RESET_DEFAULT: Hertz = Hertz::from_raw(4_000_000);
