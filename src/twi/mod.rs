//! # TWI (I2C) driver, master and slave
//!
//! Polling driver for TWI1, the bus on PB12 (SDA) / PB13 (SCL) routed to the
//! Due's pins 20/21. Master transactions follow the Arduino Wire call shape
//! (`begin_transmission` / `write` / `end_transmission` / `request_from`),
//! slave operation is a cooperative state machine driven by [Twi::poll], which
//! must be called from the main loop as often as possible.
//!
//! Master flag waits are bounded by a 20 ms budget measured with the
//! millisecond tick; start the SysTick timer before using the master API.
//!
//! The SAM3X TWI slave logic needs a disable/enable cycle after every
//! completed access before it reliably accepts the next repeated START; the
//! driver re-arms the peripheral on every terminal condition.
pub mod regs;

use arbitrary_int::{u3, u7};
use embedded_hal::i2c::{self, NoAcknowledgeSource, Operation, SevenBitAddress};
use heapless::Vec;

use crate::time::Hertz;
use crate::{PeripheralId, Port, enable_peripheral_clock, pio, systick};
use regs::{Control, InternalAddressSize, MasterMode, PdcTransfer, SlaveMode, Status, TwiCommand};

/// Capacity of the master TX, shared RX and slave TX buffers.
pub const BUFFER_CAPACITY: usize = 32;

/// Per-flag wait budget for master transactions.
const FLAG_TIMEOUT_MS: u32 = 20;

/// PB12 (SDA) and PB13 (SCL).
const PIN_SDA: u32 = 1 << 12;
const PIN_SCL: u32 = 1 << 13;

/// Default bus speed programmed by [Twi::begin].
pub const DEFAULT_CLOCK: Hertz = Hertz::from_raw(100_000);

#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// More bytes queued than the 32-byte transaction buffer holds.
    #[error("transaction buffer overflow")]
    BufferOverflow,
    /// The address byte was not acknowledged (no device answered).
    #[error("address not acknowledged")]
    AddressNack,
    /// A data byte was not acknowledged.
    #[error("data not acknowledged")]
    DataNack,
    /// A status flag did not rise within the wait budget.
    #[error("bus timeout")]
    Timeout,
}

impl TwiError {
    /// Arduino Wire compatible numeric code. Success is 0.
    pub const fn to_wire_code(&self) -> u8 {
        match self {
            TwiError::BufferOverflow => 1,
            TwiError::AddressNack => 2,
            TwiError::DataNack => 3,
            TwiError::Timeout => 4,
        }
    }
}

impl i2c::Error for TwiError {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            TwiError::AddressNack => {
                i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            TwiError::DataNack => i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            TwiError::BufferOverflow | TwiError::Timeout => i2c::ErrorKind::Other,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Mode {
    Idle,
    Master,
    Slave(u8),
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum SlaveState {
    Idle,
    Receiving,
    Transmitting,
}

enum FlagWait {
    Ok,
    Nack,
    Timeout,
}

/// Finds the smallest `ckdiv` for which `cldiv` fits in eight bits.
/// Returns `(ckdiv, cldiv)`; `chdiv` is programmed equal to `cldiv`.
pub(crate) const fn clock_dividers(mck: u32, bus_hz: u32) -> (u8, u8) {
    let base = (mck / (2 * bus_hz)).saturating_sub(4);
    let mut ckdiv = 0u8;
    while ckdiv < 7 && (base >> ckdiv) > 255 {
        ckdiv += 1;
    }
    (ckdiv, (base >> ckdiv) as u8)
}

/// TWI driver state over TWI1.
pub struct Twi {
    mck: Hertz,
    regs: regs::MmioTwi<'static>,
    mode: Mode,
    slave_state: SlaveState,
    target_addr: u8,
    tx_buffer: Vec<u8, BUFFER_CAPACITY>,
    rx_buffer: Vec<u8, BUFFER_CAPACITY>,
    rx_cursor: usize,
    slave_tx: Vec<u8, BUFFER_CAPACITY>,
    slave_tx_cursor: usize,
    in_request_callback: bool,
    receive_callback: Option<fn(&mut Twi, usize)>,
    request_callback: Option<fn(&mut Twi)>,
}

impl Twi {
    /// Creates the handle without touching the hardware; call [Self::begin]
    /// (master) or [Self::begin_slave] first.
    pub fn new(mck: Hertz) -> Self {
        Twi {
            mck,
            regs: regs::Twi::new_mmio(regs::Bank::Twi1),
            mode: Mode::Idle,
            slave_state: SlaveState::Idle,
            target_addr: 0,
            tx_buffer: Vec::new(),
            rx_buffer: Vec::new(),
            rx_cursor: 0,
            slave_tx: Vec::new(),
            slave_tx_cursor: 0,
            in_request_callback: false,
            receive_callback: None,
            request_callback: None,
        }
    }

    /// Registers the slave receive callback, invoked once per completed
    /// master write with the received byte count.
    pub fn on_receive(&mut self, callback: fn(&mut Twi, usize)) {
        self.receive_callback = Some(callback);
    }

    /// Registers the slave request callback. [Twi::write] only appends to the
    /// slave TX buffer while this callback is running.
    pub fn on_request(&mut self, callback: fn(&mut Twi)) {
        self.request_callback = Some(callback);
    }

    //==============================================================================================
    // Bring-up
    //==============================================================================================

    fn configure_bus_pins(&mut self) {
        enable_peripheral_clock(PeripheralId::PioB);
        let mut piob = pio::regs::Pio::new_mmio(Port::B);
        piob.modify_absr(|absr| absr & !(PIN_SDA | PIN_SCL));
        piob.write_puer(PIN_SDA | PIN_SCL);
        piob.write_pdr(PIN_SDA | PIN_SCL);
    }

    fn reset_peripheral(&mut self) {
        enable_peripheral_clock(PeripheralId::Twi1);
        self.regs.write_ptcr(
            PdcTransfer::builder()
                .with_rxten(false)
                .with_rxtdis(true)
                .with_txten(false)
                .with_txtdis(true)
                .build(),
        );
        self.write_command(TwiCommand::SoftwareReset);
        let _ = self.regs.read_rhr();
        self.settle();
        self.write_command(TwiCommand::SlaveAndMasterDisable);
    }

    /// Starts master mode at the default 100 kHz.
    pub fn begin(&mut self) {
        self.configure_bus_pins();
        self.reset_peripheral();
        self.write_command(TwiCommand::MasterEnable);
        self.set_clock(DEFAULT_CLOCK);
        self.reset_buffers();
        self.mode = Mode::Master;
    }

    /// Starts slave mode answering on the 7-bit address `addr`.
    pub fn begin_slave(&mut self, addr: u8) {
        let addr = addr & 0x7F;
        self.configure_bus_pins();
        self.reset_peripheral();
        self.regs
            .write_smr(SlaveMode::builder().with_sadr(u7::new(addr)).build());
        self.write_command(TwiCommand::SlaveEnable);
        self.settle();
        // Flush stale state left from a previous access.
        let _ = self.regs.read_sr();
        let _ = self.regs.read_rhr();
        self.reset_buffers();
        self.mode = Mode::Slave(addr);
        self.slave_state = SlaveState::Idle;
    }

    /// Programs the bus clock. `0` is a no-op.
    pub fn set_clock(&mut self, bus: Hertz) {
        if bus.raw() == 0 {
            return;
        }
        let (ckdiv, cldiv) = clock_dividers(self.mck.raw(), bus.raw());
        self.regs.write_cwgr(
            regs::ClockWaveform::builder()
                .with_cldiv(cldiv)
                .with_chdiv(cldiv)
                .with_ckdiv(u3::new(ckdiv))
                .build(),
        );
    }

    fn reset_buffers(&mut self) {
        self.tx_buffer.clear();
        self.rx_buffer.clear();
        self.rx_cursor = 0;
        self.slave_tx.clear();
        self.slave_tx_cursor = 0;
    }

    /// Short settle delay derived from the core clock (roughly 10 us).
    fn settle(&self) {
        cortex_m::asm::delay(self.mck.raw() / 100_000);
    }

    #[inline]
    fn write_command(&mut self, command: TwiCommand) {
        self.regs.write_cr(Control::new_with_raw_value(command as u32));
    }

    //==============================================================================================
    // Master
    //==============================================================================================

    /// Begins buffering a master write to the 7-bit address `addr`.
    pub fn begin_transmission(&mut self, addr: u8) {
        self.target_addr = addr & 0x7F;
        self.tx_buffer.clear();
    }

    /// Queues one byte.
    ///
    /// In master mode this appends to the transmission started by
    /// [Self::begin_transmission]; in slave mode it is accepted only from
    /// inside the `on_request` callback. Returns the number of bytes accepted
    /// (0 when the buffer is full or the call is out of context).
    pub fn write(&mut self, byte: u8) -> usize {
        let buffer = match self.mode {
            Mode::Slave(_) if self.in_request_callback => &mut self.slave_tx,
            Mode::Master => &mut self.tx_buffer,
            _ => return 0,
        };
        match buffer.push(byte) {
            Ok(()) => 1,
            Err(_) => 0,
        }
    }

    /// Sends the buffered bytes as one master write transaction.
    ///
    /// With `send_stop` false the bus is left claimed for a repeated-START
    /// follow-up ([Self::request_from]).
    pub fn end_transmission(&mut self, send_stop: bool) -> Result<(), TwiError> {
        self.regs.write_mmr(
            MasterMode::builder()
                .with_iadrsz(InternalAddressSize::None)
                .with_mread(false)
                .with_dadr(u7::new(self.target_addr))
                .build(),
        );

        if self.tx_buffer.is_empty() {
            // Zero-length probe: address phase only.
            self.write_command(TwiCommand::Quick);
            return match self.wait_flag(|sr| sr.txcomp()) {
                FlagWait::Ok => Ok(()),
                FlagWait::Nack => Err(TwiError::AddressNack),
                FlagWait::Timeout => Err(TwiError::Timeout),
            };
        }

        for index in 0..self.tx_buffer.len() {
            let byte = self.tx_buffer[index];
            self.regs.write_thr(byte as u32);
            match self.wait_flag(|sr| sr.txrdy()) {
                FlagWait::Ok => {}
                FlagWait::Nack if index == 0 => return Err(TwiError::AddressNack),
                FlagWait::Nack => return Err(TwiError::DataNack),
                FlagWait::Timeout => return Err(TwiError::Timeout),
            }
        }

        if send_stop {
            self.write_command(TwiCommand::Stop);
            match self.wait_flag(|sr| sr.txcomp()) {
                FlagWait::Ok => {}
                _ => return Err(TwiError::Timeout),
            }
        }
        Ok(())
    }

    /// Master read of up to [BUFFER_CAPACITY] bytes into the shared RX
    /// buffer. Returns the number of bytes read (0 on NACK or timeout).
    pub fn request_from(&mut self, addr: u8, quantity: usize, send_stop: bool) -> usize {
        let quantity = quantity.min(BUFFER_CAPACITY);
        self.rx_buffer.clear();
        self.rx_cursor = 0;
        if quantity == 0 {
            return 0;
        }

        self.regs.write_mmr(
            MasterMode::builder()
                .with_iadrsz(InternalAddressSize::None)
                .with_mread(true)
                .with_dadr(u7::new(addr & 0x7F))
                .build(),
        );

        // Single-byte reads with STOP must set START and STOP together.
        if quantity == 1 && send_stop {
            self.write_command(TwiCommand::StartWithStop);
        } else {
            self.write_command(TwiCommand::Start);
        }

        for index in 0..quantity {
            // STOP must be pending before the last byte is accepted.
            if send_stop && quantity > 1 && index == quantity - 1 {
                self.write_command(TwiCommand::Stop);
            }
            match self.wait_flag(|sr| sr.rxrdy()) {
                FlagWait::Ok => {}
                _ => {
                    self.rx_buffer.clear();
                    return 0;
                }
            }
            let byte = (self.regs.read_rhr() & 0xFF) as u8;
            // Cannot overflow: quantity was capped at the buffer capacity.
            self.rx_buffer.push(byte).unwrap();
        }

        if send_stop {
            let _ = self.wait_flag(|sr| sr.txcomp());
        }
        self.rx_buffer.len()
    }

    /// Bytes received by the last [Self::request_from] (or delivered to the
    /// slave receive callback) that have not been consumed by [Self::read].
    pub fn available(&self) -> usize {
        self.rx_buffer.len() - self.rx_cursor
    }

    /// Pops the next received byte.
    pub fn read(&mut self) -> Option<u8> {
        let byte = self.rx_buffer.get(self.rx_cursor).copied()?;
        self.rx_cursor += 1;
        Some(byte)
    }

    fn wait_flag(&mut self, test: impl Fn(Status) -> bool) -> FlagWait {
        let start = systick::millis();
        loop {
            let sr = self.regs.read_sr();
            if sr.nack() {
                return FlagWait::Nack;
            }
            if test(sr) {
                return FlagWait::Ok;
            }
            if systick::millis_since(systick::millis(), start) >= FLAG_TIMEOUT_MS {
                return FlagWait::Timeout;
            }
        }
    }

    //==============================================================================================
    // Slave
    //==============================================================================================

    /// Drives the slave state machine. Must be called from the main loop as
    /// fast as possible while in slave mode; a no-op otherwise.
    pub fn poll(&mut self) {
        if !matches!(self.mode, Mode::Slave(_)) {
            return;
        }
        let sr = self.regs.read_sr();
        if !sr.svacc() {
            return;
        }
        if sr.svread() {
            self.service_slave_read();
        } else {
            self.service_slave_write(sr);
        }
    }

    /// The master is reading from us.
    fn service_slave_read(&mut self) {
        if self.slave_state != SlaveState::Transmitting {
            // A repeated START flipped the direction mid-access: deliver the
            // bytes of the preceding write phase first.
            if self.slave_state == SlaveState::Receiving && !self.rx_buffer.is_empty() {
                self.deliver_receive();
            }
            self.slave_state = SlaveState::Transmitting;
            self.begin_slave_transmit();
        }
        loop {
            let sr = self.regs.read_sr();
            if sr.eosacc() || sr.nack() {
                self.rearm();
                return;
            }
            if !sr.txrdy() {
                return;
            }
            let byte = self
                .slave_tx
                .get(self.slave_tx_cursor)
                .copied()
                .unwrap_or(0);
            self.slave_tx_cursor += 1;
            self.regs.write_thr(byte as u32);
        }
    }

    /// The master is writing to us.
    fn service_slave_write(&mut self, sr: Status) {
        if self.slave_state != SlaveState::Receiving {
            self.rx_buffer.clear();
            self.rx_cursor = 0;
            self.slave_state = SlaveState::Receiving;
        }
        if sr.ovre() {
            let _ = self.regs.read_rhr();
        }
        while self.regs.read_sr().rxrdy() {
            let byte = (self.regs.read_rhr() & 0xFF) as u8;
            // Excess bytes beyond the buffer capacity are dropped.
            let _ = self.rx_buffer.push(byte);
        }
        if self.regs.read_sr().eosacc() {
            if !self.rx_buffer.is_empty() {
                self.deliver_receive();
            }
            self.rearm();
        }
    }

    /// Runs the user `on_request` callback with the re-entrancy flag set so
    /// that [Self::write] lands in the slave TX buffer. A callback that wrote
    /// nothing still produces a single `0` byte so the master's clock is
    /// never stalled indefinitely.
    fn begin_slave_transmit(&mut self) {
        self.slave_tx.clear();
        self.slave_tx_cursor = 0;
        let callback = self.request_callback;
        if let Some(callback) = callback {
            self.in_request_callback = true;
            callback(self);
            self.in_request_callback = false;
        }
        if self.slave_tx.is_empty() {
            // Cannot overflow: the buffer was just cleared.
            self.slave_tx.push(0).unwrap();
        }
    }

    fn deliver_receive(&mut self) {
        self.rx_cursor = 0;
        let count = self.rx_buffer.len();
        let callback = self.receive_callback;
        if let Some(callback) = callback {
            callback(self, count);
        }
    }

    /// Disable/enable cycle after a terminal slave condition; required before
    /// the peripheral reliably accepts the next (repeated) START.
    fn rearm(&mut self) {
        self.write_command(TwiCommand::SlaveDisable);
        self.write_command(TwiCommand::SlaveEnable);
        let _ = self.regs.read_sr();
        let _ = self.regs.read_rhr();
        self.reset_buffers();
        self.slave_state = SlaveState::Idle;
    }
}

//==================================================================================================
// Embedded HAL I2C implementation (master)
//==================================================================================================

impl i2c::ErrorType for Twi {
    type Error = TwiError;
}

impl i2c::I2c<SevenBitAddress> for Twi {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let last = operations.len().saturating_sub(1);
        for (index, operation) in operations.iter_mut().enumerate() {
            let send_stop = index == last;
            match operation {
                Operation::Write(bytes) => {
                    if bytes.len() > BUFFER_CAPACITY {
                        return Err(TwiError::BufferOverflow);
                    }
                    self.begin_transmission(address);
                    for &byte in bytes.iter() {
                        self.write(byte);
                    }
                    self.end_transmission(send_stop)?;
                }
                Operation::Read(buffer) => {
                    if buffer.len() > BUFFER_CAPACITY {
                        return Err(TwiError::BufferOverflow);
                    }
                    let got = self.request_from(address, buffer.len(), send_stop);
                    if got < buffer.len() {
                        return Err(TwiError::Timeout);
                    }
                    for slot in buffer.iter_mut() {
                        // Cannot fail: `got` bytes were just buffered.
                        *slot = self.read().unwrap();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_search_prefers_small_ckdiv() {
        // 84 MHz, 100 kHz: 84e6 / 200e3 - 4 = 416, needs one halving.
        assert_eq!(clock_dividers(84_000_000, 100_000), (1, 208));
        // 84 MHz, 400 kHz: 105 - 4 = 101 fits directly.
        assert_eq!(clock_dividers(84_000_000, 400_000), (0, 101));
        // 4 MHz reset clock, 100 kHz: 20 - 4 = 16.
        assert_eq!(clock_dividers(4_000_000, 100_000), (0, 16));
    }

    #[test]
    fn divider_saturates_for_fast_buses() {
        // Bus faster than mck/8: the subtraction saturates to zero.
        assert_eq!(clock_dividers(4_000_000, 1_000_000), (0, 0));
    }

    #[test]
    fn wire_codes_match_arduino() {
        assert_eq!(TwiError::BufferOverflow.to_wire_code(), 1);
        assert_eq!(TwiError::AddressNack.to_wire_code(), 2);
        assert_eq!(TwiError::DataNack.to_wire_code(), 3);
        assert_eq!(TwiError::Timeout.to_wire_code(), 4);
    }
}
