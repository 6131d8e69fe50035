//! # USB device controller with CDC-ACM class
//!
//! Full-speed device mode on the UOTGHS controller. Everything is polled:
//! [UsbDevice::poll] handles bus resets, services the EP0 control state
//! machine and drains received CDC data into a ring buffer. The device
//! enumerates on stock Linux/macOS CDC-ACM drivers as a plain serial port.
//!
//! IN endpoints only transmit in the configured state; [UsbDevice::cdc_write]
//! is a no-op before enumeration completes.
pub mod descriptors;
pub mod regs;

use arbitrary_int::{u2, u7};
use heapless::Deque;

use crate::{PeripheralId, enable_peripheral_clock, mmio, pmc};
use descriptors::{
    CDC_DATA_PACKET, CDC_GET_LINE_CODING, CDC_IN_EP, CDC_NOTIFY_EP, CDC_OUT_EP,
    CDC_SET_CONTROL_LINE_STATE, CDC_SET_LINE_CODING, EP0_SIZE, REQ_GET_DESCRIPTOR, REQ_SET_ADDRESS,
    REQ_SET_CONFIGURATION,
};
use regs::{
    BankCount, DeviceInterrupt, EP_FIFOCON, EP_RXOUTI, EP_RXSTPI, EP_STALLRQ, EP_TXINI,
    EndpointConfig, EndpointDirection, EndpointSize, EndpointType, GeneralControl, UsbMode,
    fifo_addr,
};

/// Capacity of the CDC receive ring; overflow is dropped silently.
pub const CDC_RX_CAPACITY: usize = 256;

/// Spin cap for control/bulk bank-ready waits.
const BANK_WAIT_ITERS: u32 = 200_000;

/// Cable detach pulse length in core cycles (~1 ms at 84 MHz).
const DETACH_PULSE_CYCLES: u32 = 100_000;

/// Flags cleared when an endpoint is (re)configured.
const EP_ALL_FLAGS: u32 = 0xFF;

/// Device lifecycle per USB 2.0 chapter 9.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    Detached,
    Powered,
    Default,
    Addressed(u8),
    Configured(u8),
}

/// CDC line coding. The driver stores whatever the host sets; the values do
/// not affect the USB transport itself.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineCoding {
    pub dte_rate: u32,
    pub char_format: u8,
    pub parity_type: u8,
    pub data_bits: u8,
}

impl Default for LineCoding {
    /// 115200 baud, one stop bit, no parity, eight data bits.
    fn default() -> Self {
        LineCoding {
            dte_rate: 115_200,
            char_format: 0,
            parity_type: 0,
            data_bits: 8,
        }
    }
}

impl LineCoding {
    pub(crate) const fn to_bytes(self) -> [u8; 7] {
        let rate = self.dte_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.char_format,
            self.parity_type,
            self.data_bits,
        ]
    }

    pub(crate) const fn from_bytes(raw: [u8; 7]) -> Self {
        LineCoding {
            dte_rate: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            char_format: raw[4],
            parity_type: raw[5],
            data_bits: raw[6],
        }
    }
}

/// An eight-byte SETUP packet.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    pub(crate) const fn from_bytes(raw: [u8; 8]) -> Self {
        SetupPacket {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }
}

/// USB device driver handle.
pub struct UsbDevice {
    regs: regs::MmioUotghs<'static>,
    state: DeviceState,
    pending_address: Option<u8>,
    address: u8,
    line_coding: LineCoding,
    rx_queue: Deque<u8, CDC_RX_CAPACITY>,
}

impl UsbDevice {
    pub fn new() -> Self {
        UsbDevice {
            regs: regs::Uotghs::new_mmio(),
            state: DeviceState::Detached,
            pending_address: None,
            address: 0,
            line_coding: LineCoding::default(),
            rx_queue: Deque::new(),
        }
    }

    pub const fn state(&self) -> DeviceState {
        self.state
    }

    pub const fn is_configured(&self) -> bool {
        matches!(self.state, DeviceState::Configured(_))
    }

    pub const fn line_coding(&self) -> LineCoding {
        self.line_coding
    }

    /// Brings up the UPLL, enables the controller in device mode and forces
    /// the host to re-enumerate by pulsing DETACH.
    ///
    /// Returns `false` if the USB PLL failed to lock; the controller is left
    /// untouched in that case.
    pub fn begin(&mut self) -> bool {
        if !pmc::enable_usb_clocks() {
            return false;
        }
        enable_peripheral_clock(PeripheralId::Uotghs);

        self.regs.write_ctrl(
            GeneralControl::builder()
                .with_idte(false)
                .with_vbuste(false)
                .with_srpe(false)
                .with_vberre(false)
                .with_bcerre(false)
                .with_roleexe(false)
                .with_hnperre(false)
                .with_stoe(false)
                .with_vbushwc(false)
                .with_srpsel(false)
                .with_srpreq(false)
                .with_hnpreq(false)
                .with_otgpade(true)
                .with_vbuspo(false)
                .with_frzclk(false)
                .with_usbe(true)
                .with_timvalue(u2::new(0))
                .with_timpage(u2::new(0))
                .with_unlock(false)
                .with_uide(false)
                .with_uimod(UsbMode::Device)
                .build(),
        );
        self.regs.write_dev_ier(
            DeviceInterrupt::builder()
                .with_susp(false)
                .with_msof(false)
                .with_sof(false)
                .with_eorst(true)
                .with_wakeup(false)
                .with_eorsm(false)
                .with_uprsm(false)
                .build(),
        );
        self.regs.modify_dev_ctrl(|mut ctrl| {
            ctrl.set_uadd(u7::new(0));
            ctrl.set_adden(false);
            ctrl
        });
        mmio::dsb();
        mmio::isb();

        // Pulse DETACH so a host that saw us before the reset re-enumerates.
        self.regs.modify_dev_ctrl(|mut ctrl| {
            ctrl.set_detach(true);
            ctrl
        });
        cortex_m::asm::delay(DETACH_PULSE_CYCLES);
        self.regs.modify_dev_ctrl(|mut ctrl| {
            ctrl.set_detach(false);
            ctrl
        });
        self.state = DeviceState::Powered;
        true
    }

    /// One cooperative service round: bus reset, EP0, CDC OUT data, deferred
    /// address commit. Call from the main loop as often as possible.
    pub fn poll(&mut self) {
        if self.regs.read_dev_isr().eorst() {
            self.regs.write_dev_icr(
                DeviceInterrupt::builder()
                    .with_susp(false)
                    .with_msof(false)
                    .with_sof(false)
                    .with_eorst(true)
                    .with_wakeup(false)
                    .with_eorsm(false)
                    .with_uprsm(false)
                    .build(),
            );
            self.handle_bus_reset();
        }

        self.service_ep0();

        if self.is_configured() {
            self.service_cdc_out();
        }

        // SET_ADDRESS commits only after its status stage went out.
        if let Some(address) = self.pending_address.take() {
            self.regs.modify_dev_ctrl(|mut ctrl| {
                ctrl.set_uadd(u7::new(address));
                ctrl.set_adden(true);
                ctrl
            });
            self.address = address;
            self.state = DeviceState::Addressed(address);
        }
    }

    fn handle_bus_reset(&mut self) {
        self.regs.modify_dev_ctrl(|mut ctrl| {
            ctrl.set_uadd(u7::new(0));
            ctrl.set_adden(false);
            ctrl
        });
        self.address = 0;
        self.pending_address = None;
        self.configure_endpoints();
        self.state = DeviceState::Default;
    }

    fn configure_endpoints(&mut self) {
        let endpoints = [
            (0, EndpointType::Control, EndpointSize::Bytes64, EndpointDirection::Out),
            (
                CDC_NOTIFY_EP,
                EndpointType::Interrupt,
                EndpointSize::Bytes8,
                EndpointDirection::In,
            ),
            (
                CDC_OUT_EP,
                EndpointType::Bulk,
                EndpointSize::Bytes64,
                EndpointDirection::Out,
            ),
            (
                CDC_IN_EP,
                EndpointType::Bulk,
                EndpointSize::Bytes64,
                EndpointDirection::In,
            ),
        ];
        for (ep, ep_type, size, direction) in endpoints {
            unsafe {
                self.regs.write_dev_ept_cfg_unchecked(
                    ep,
                    EndpointConfig::builder()
                        .with_alloc(true)
                        .with_epbk(BankCount::One)
                        .with_epsize(size)
                        .with_epdir(direction)
                        .with_autosw(false)
                        .with_eptype(ep_type)
                        .with_nbtrans(u2::new(0))
                        .build(),
                );
                self.regs.write_dev_ept_icr_unchecked(ep, EP_ALL_FLAGS);
            }
        }
        unsafe {
            self.regs.write_dev_ept_ier_unchecked(0, EP_RXSTPI);
            self.regs.write_dev_ept_ier_unchecked(CDC_OUT_EP, EP_RXOUTI);
        }
        // Enable endpoints 0..=3.
        self.regs.modify_dev_ept(|ept| ept | 0b1111);
    }

    //==============================================================================================
    // EP0 control state machine
    //==============================================================================================

    fn service_ep0(&mut self) {
        let isr = unsafe { self.regs.read_dev_ept_isr_unchecked(0) };
        if !isr.rxstpi() {
            return;
        }
        // A fresh SETUP cancels any stall left from the previous request.
        unsafe { self.regs.write_dev_ept_idr_unchecked(0, EP_STALLRQ) };

        let mut raw = [0u8; 8];
        let base = fifo_addr(0);
        for (i, slot) in raw.iter_mut().enumerate() {
            *slot = unsafe { mmio::read8(base + i) };
        }
        unsafe { self.regs.write_dev_ept_icr_unchecked(0, EP_RXSTPI) };

        self.dispatch_setup(SetupPacket::from_bytes(raw));
    }

    fn dispatch_setup(&mut self, setup: SetupPacket) {
        match setup.request {
            REQ_GET_DESCRIPTOR => {
                let descriptor_type = (setup.value >> 8) as u8;
                let index = setup.value as u8;
                match descriptors::descriptor(descriptor_type, index) {
                    Some(data) => {
                        let len = (setup.length as usize).min(data.len());
                        self.ep0_send(&data[..len]);
                    }
                    None => self.stall_ep0(),
                }
            }
            REQ_SET_ADDRESS => {
                self.ep0_send_zlp();
                self.pending_address = Some((setup.value & 0x7F) as u8);
            }
            REQ_SET_CONFIGURATION => {
                let value = setup.value as u8;
                self.ep0_send_zlp();
                self.state = if value != 0 {
                    DeviceState::Configured(value)
                } else if self.address != 0 {
                    DeviceState::Addressed(self.address)
                } else {
                    DeviceState::Default
                };
            }
            CDC_SET_LINE_CODING => {
                let mut raw = [0u8; 7];
                if self.ep0_read_out(&mut raw) {
                    self.line_coding = LineCoding::from_bytes(raw);
                }
                self.ep0_send_zlp();
            }
            CDC_GET_LINE_CODING => {
                let raw = self.line_coding.to_bytes();
                let len = (setup.length as usize).min(raw.len());
                self.ep0_send(&raw[..len]);
            }
            CDC_SET_CONTROL_LINE_STATE => {
                // DTR/RTS are irrelevant to this transport; just acknowledge.
                self.ep0_send_zlp();
            }
            _ => self.stall_ep0(),
        }
    }

    /// Requests a STALL handshake on EP0; cleared again by the next SETUP.
    fn stall_ep0(&mut self) {
        unsafe { self.regs.write_dev_ept_ier_unchecked(0, EP_STALLRQ) };
    }

    /// Transmits a control IN payload in max-packet chunks, closing with a
    /// zero-length packet.
    fn ep0_send(&mut self, data: &[u8]) {
        for chunk in data.chunks(EP0_SIZE) {
            if !self.wait_bank_free(0) {
                return;
            }
            let base = fifo_addr(0);
            for (i, &byte) in chunk.iter().enumerate() {
                unsafe { mmio::write8(base + i, byte) };
            }
            unsafe { self.regs.write_dev_ept_icr_unchecked(0, EP_TXINI) };
        }
        self.ep0_send_zlp();
    }

    fn ep0_send_zlp(&mut self) {
        if self.wait_bank_free(0) {
            unsafe { self.regs.write_dev_ept_icr_unchecked(0, EP_TXINI) };
        }
    }

    /// Reads the OUT data stage of a control transfer.
    fn ep0_read_out(&mut self, buffer: &mut [u8]) -> bool {
        let arrived = mmio::wait_until(BANK_WAIT_ITERS, || {
            unsafe { self.regs.read_dev_ept_isr_unchecked(0) }.rxouti()
        });
        if !arrived {
            return false;
        }
        let base = fifo_addr(0);
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = unsafe { mmio::read8(base + i) };
        }
        unsafe { self.regs.write_dev_ept_icr_unchecked(0, EP_RXOUTI) };
        true
    }

    fn wait_bank_free(&mut self, ep: usize) -> bool {
        mmio::wait_until(BANK_WAIT_ITERS, || {
            unsafe { self.regs.read_dev_ept_isr_unchecked(ep) }.txini()
        })
    }

    //==============================================================================================
    // CDC data path
    //==============================================================================================

    fn service_cdc_out(&mut self) {
        let isr = unsafe { self.regs.read_dev_ept_isr_unchecked(CDC_OUT_EP) };
        if !isr.rxouti() {
            return;
        }
        let count = isr.byct().value() as usize;
        unsafe { self.regs.write_dev_ept_icr_unchecked(CDC_OUT_EP, EP_RXOUTI) };
        let base = fifo_addr(CDC_OUT_EP);
        for i in 0..count {
            let byte = unsafe { mmio::read8(base + i) };
            // Overflow beyond the ring capacity is dropped.
            let _ = self.rx_queue.push_back(byte);
        }
        // Hand the bank back to the controller.
        unsafe { self.regs.write_dev_ept_idr_unchecked(CDC_OUT_EP, EP_FIFOCON) };
    }

    /// Bytes waiting in the CDC receive ring.
    pub fn cdc_available(&self) -> usize {
        self.rx_queue.len()
    }

    /// Pops the next received byte.
    pub fn cdc_read(&mut self) -> Option<u8> {
        self.rx_queue.pop_front()
    }

    /// Transmits on the bulk IN endpoint in max-packet chunks. Only allowed
    /// in the configured state; returns the number of bytes queued.
    pub fn cdc_write(&mut self, bytes: &[u8]) -> usize {
        if !self.is_configured() {
            return 0;
        }
        let mut sent = 0;
        for chunk in bytes.chunks(CDC_DATA_PACKET) {
            if !self.wait_bank_free(CDC_IN_EP) {
                break;
            }
            unsafe { self.regs.write_dev_ept_icr_unchecked(CDC_IN_EP, EP_TXINI) };
            let base = fifo_addr(CDC_IN_EP);
            for (i, &byte) in chunk.iter().enumerate() {
                unsafe { mmio::write8(base + i, byte) };
            }
            // Releasing the bank ships the packet.
            unsafe { self.regs.write_dev_ept_idr_unchecked(CDC_IN_EP, EP_FIFOCON) };
            sent += chunk.len();
        }
        sent
    }

    /// Transmits the UTF-8 bytes of `text` verbatim.
    pub fn cdc_write_str(&mut self, text: &str) -> usize {
        self.cdc_write(text.as_bytes())
    }
}

impl Default for UsbDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_packet_decoding() {
        // GET_DESCRIPTOR(device), wLength 64.
        let setup = SetupPacket::from_bytes([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00]);
        assert_eq!(setup.request_type, 0x80);
        assert_eq!(setup.request, REQ_GET_DESCRIPTOR);
        assert_eq!(setup.value, 0x0100);
        assert_eq!(setup.index, 0);
        assert_eq!(setup.length, 64);
    }

    #[test]
    fn line_coding_round_trips() {
        let coding = LineCoding {
            dte_rate: 921_600,
            char_format: 2,
            parity_type: 1,
            data_bits: 7,
        };
        assert_eq!(LineCoding::from_bytes(coding.to_bytes()), coding);
        let default = LineCoding::default().to_bytes();
        assert_eq!(default, [0x00, 0xC2, 0x01, 0x00, 0, 0, 8]);
    }
}
