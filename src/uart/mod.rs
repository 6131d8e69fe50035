//! # Programming-Port UART driver
//!
//! Polling transmitter and receiver on the UART peripheral behind the Due's
//! Programming Port (PA8 = RX, PA9 = TX, Peripheral A). Used for boot
//! telemetry and human-readable logs; TXRDY waits are bounded only by the
//! shift-register rate, so no timeout is applied.
//!
//! Line feeds are expanded to CR LF on the string path, hex and decimal
//! formatters avoid heap and fmt machinery.
pub mod regs;

use core::convert::Infallible;

use crate::pio;
use crate::time::Hertz;
use crate::{PeripheralId, Port, enable_peripheral_clock};
use regs::{ChannelMode, Control, Mode, Parity};

/// PA8 (URXD) and PA9 (UTXD).
const PIN_RX: u32 = 1 << 8;
const PIN_TX: u32 = 1 << 9;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Formats `value` as eight lowercase hex digits, most significant first.
/// Shift-and-lookup, no division.
pub(crate) const fn hex_digits(value: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    let mut i = 0;
    while i < 8 {
        let nibble = (value >> (28 - 4 * i)) & 0xF;
        out[i] = HEX_DIGITS[nibble as usize];
        i += 1;
    }
    out
}

/// Formats `value` in decimal. Returns the digit buffer and the digit count;
/// the digits occupy the end of the buffer.
pub(crate) const fn dec_digits(value: u32) -> ([u8; 10], usize) {
    let mut out = [b'0'; 10];
    if value == 0 {
        return (out, 1);
    }
    let mut rest = value;
    let mut count = 0;
    while rest > 0 {
        count += 1;
        out[10 - count] = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    (out, count)
}

/// Baud divisor: CD = round(mck / (16 * baud)).
pub(crate) const fn baud_divisor(mck: u32, baud: u32) -> u16 {
    ((mck + 8 * baud) / (16 * baud)) as u16
}

/// UART driver handle. Holds the active master clock for baud programming.
pub struct Uart {
    mck: Hertz,
    regs: regs::MmioUart<'static>,
}

impl Uart {
    /// Creates the handle without touching the hardware; call [Self::begin]
    /// before the first write.
    pub fn new(mck: Hertz) -> Self {
        Uart {
            mck,
            regs: regs::Uart::new_mmio(),
        }
    }

    /// Configures 8-N-1 at `baud` and enables both directions.
    ///
    /// Idempotent; calling it again reprograms the baud divisor.
    pub fn begin(&mut self, baud: Hertz) {
        enable_peripheral_clock(PeripheralId::Uart);
        enable_peripheral_clock(PeripheralId::PioA);

        // Hand PA8/PA9 to Peripheral A and keep a pull-up on the RX line.
        let mut pioa = pio::regs::Pio::new_mmio(Port::A);
        pioa.modify_absr(|absr| absr & !(PIN_RX | PIN_TX));
        pioa.write_pdr(PIN_RX | PIN_TX);
        pioa.write_puer(PIN_RX);

        self.regs.write_cr(
            Control::builder()
                .with_rstrx(true)
                .with_rsttx(true)
                .with_rxen(false)
                .with_rxdis(true)
                .with_txen(false)
                .with_txdis(true)
                .with_rststa(false)
                .build(),
        );
        self.regs.write_mr(
            Mode::builder()
                .with_par(Parity::No)
                .with_chmode(ChannelMode::Normal)
                .build(),
        );
        self.regs.write_brgr(
            regs::BaudRate::builder()
                .with_cd(baud_divisor(self.mck.raw(), baud.raw()))
                .build(),
        );
        self.regs.write_cr(
            Control::builder()
                .with_rstrx(false)
                .with_rsttx(false)
                .with_rxen(true)
                .with_rxdis(false)
                .with_txen(true)
                .with_txdis(false)
                .with_rststa(false)
                .build(),
        );
    }

    /// Blocks on TXRDY, then queues one byte.
    pub fn write_byte(&mut self, byte: u8) {
        while !self.regs.read_sr().txrdy() {}
        self.regs.write_thr(byte as u32);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    /// Writes the UTF-8 bytes of `text`, expanding `\n` to `\r\n`.
    pub fn write_str(&mut self, text: &str) {
        for byte in text.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }

    /// Writes `value` as eight lowercase hex digits (no prefix).
    pub fn write_hex32(&mut self, value: u32) {
        let digits = hex_digits(value);
        self.write_bytes(&digits);
    }

    /// Writes `value` in decimal without leading zeros.
    pub fn write_dec(&mut self, value: u32) {
        let (digits, count) = dec_digits(value);
        self.write_bytes(&digits[10 - count..]);
    }

    /// Returns a received byte if one is waiting, without blocking.
    pub fn read_byte(&mut self) -> Option<u8> {
        if self.regs.read_sr().rxrdy() {
            Some((self.regs.read_rhr() & 0xFF) as u8)
        } else {
            None
        }
    }
}

impl embedded_io::ErrorType for Uart {
    type Error = Infallible;
}

impl embedded_io::Write for Uart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while !self.regs.read_sr().txempty() {}
        Ok(())
    }
}

impl embedded_hal_nb::serial::ErrorType for Uart {
    type Error = Infallible;
}

impl embedded_hal_nb::serial::Read<u8> for Uart {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.read_byte().ok_or(nb::Error::WouldBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formatting_round_trips() {
        assert_eq!(&hex_digits(0xDEAD_BEEF), b"deadbeef");
        assert_eq!(&hex_digits(0), b"00000000");
        assert_eq!(&hex_digits(0x0000_03E8), b"000003e8");
        let parsed = u32::from_str_radix(core::str::from_utf8(&hex_digits(0x1234_ABCD)).unwrap(), 16);
        assert_eq!(parsed, Ok(0x1234_ABCD));
    }

    #[test]
    fn decimal_formatting() {
        let render = |v: u32| {
            let (digits, count) = dec_digits(v);
            std::string::String::from_utf8(digits[10 - count..].to_vec()).unwrap()
        };
        assert_eq!(render(0), "0");
        assert_eq!(render(42), "42");
        assert_eq!(render(u32::MAX), "4294967295");
    }

    #[test]
    fn baud_divisor_rounds_to_nearest() {
        // 84 MHz / (16 * 115200) = 45.57 -> 46
        assert_eq!(baud_divisor(84_000_000, 115_200), 46);
        // 84 MHz / (16 * 9600) = 546.875 -> 547
        assert_eq!(baud_divisor(84_000_000, 9_600), 547);
        // 4 MHz reset clock at 115200 -> 2.17 -> 2
        assert_eq!(baud_divisor(4_000_000, 115_200), 2);
    }
}
