use core::marker::PhantomData;

use arbitrary_int::{u2, u7, u11};

/// UOTGHS controller base address.
pub const BASE_ADDR: usize = 0x400A_C000;

/// Endpoint FIFO dual-port RAM window.
pub const DPRAM_BASE: usize = 0x2018_0000;

/// Stride between consecutive endpoint FIFO windows.
pub const DPRAM_STRIDE: usize = 0x800;

/// Number of device endpoints.
pub const NUM_ENDPOINTS: usize = 10;

/// Start of endpoint `ep`'s FIFO window.
pub const fn fifo_addr(ep: usize) -> usize {
    DPRAM_BASE + ep * DPRAM_STRIDE
}

//==================================================================================================
// Endpoint interrupt/status bits (DEVEPTISR / ICR / IFR / IMR / IER / IDR)
//==================================================================================================

/// IN bank free / transmit complete.
pub const EP_TXINI: u32 = 1 << 0;
/// OUT data received.
pub const EP_RXOUTI: u32 = 1 << 1;
/// SETUP packet received (control endpoints).
pub const EP_RXSTPI: u32 = 1 << 2;
pub const EP_STALLEDI: u32 = 1 << 7;
/// Bank ownership; cleared (via IDR) to hand a bank back to the controller.
pub const EP_FIFOCON: u32 = 1 << 14;
/// Data-toggle reset request (via IER).
pub const EP_RSTDT: u32 = 1 << 18;
/// Stall request (set via IER, cleared via IDR).
pub const EP_STALLRQ: u32 = 1 << 19;

//==================================================================================================
// Bitfields
//==================================================================================================

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct DeviceControl {
    /// Device address, committed by `adden`.
    #[bits(0..=6, rw)]
    uadd: u7,
    #[bit(7, rw)]
    adden: bool,
    /// Disconnects the DP/DM pads, forcing the host to re-enumerate.
    #[bit(8, rw)]
    detach: bool,
    #[bit(9, rw)]
    rmwkup: bool,
    #[bits(10..=11, rw)]
    spdconf: u2,
    #[bit(12, rw)]
    ls: bool,
}

/// Shared layout of DEVISR/DEVICR/DEVIFR/DEVIMR/DEVIDR/DEVIER (the endpoint
/// summary bits 12.. are read through DEVEPTISR instead).
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct DeviceInterrupt {
    #[bit(0, rw)]
    susp: bool,
    #[bit(1, rw)]
    msof: bool,
    #[bit(2, rw)]
    sof: bool,
    /// End of bus reset.
    #[bit(3, rw)]
    eorst: bool,
    #[bit(4, rw)]
    wakeup: bool,
    #[bit(5, rw)]
    eorsm: bool,
    #[bit(6, rw)]
    uprsm: bool,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BankCount {
    #[default]
    One = 0,
    Two = 1,
    Three = 2,
    Reserved = 3,
}

#[bitbybit::bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointSize {
    Bytes8 = 0,
    Bytes16 = 1,
    Bytes32 = 2,
    Bytes64 = 3,
    Bytes128 = 4,
    Bytes256 = 5,
    Bytes512 = 6,
    Bytes1024 = 7,
}

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointDirection {
    #[default]
    Out = 0,
    In = 1,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointType {
    #[default]
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct EndpointConfig {
    /// Reserves DPRAM for the endpoint; must be set last.
    #[bit(1, rw)]
    alloc: bool,
    #[bits(2..=3, rw)]
    epbk: BankCount,
    #[bits(4..=6, rw)]
    epsize: EndpointSize,
    #[bit(8, rw)]
    epdir: EndpointDirection,
    #[bit(9, rw)]
    autosw: bool,
    #[bits(11..=12, rw)]
    eptype: EndpointType,
    #[bits(13..=14, rw)]
    nbtrans: u2,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct EndpointStatus {
    #[bit(0, r)]
    txini: bool,
    #[bit(1, r)]
    rxouti: bool,
    #[bit(2, r)]
    rxstpi: bool,
    #[bit(3, r)]
    underfi: bool,
    #[bit(4, r)]
    nakouti: bool,
    #[bit(5, r)]
    nakini: bool,
    #[bit(6, r)]
    overfi: bool,
    #[bit(7, r)]
    stalledi: bool,
    #[bits(8..=9, r)]
    dtseq: u2,
    #[bits(12..=13, r)]
    nbusybk: u2,
    #[bits(14..=15, r)]
    currbk: u2,
    #[bit(16, r)]
    rwall: bool,
    #[bit(17, r)]
    ctrldir: bool,
    #[bit(18, r)]
    cfgok: bool,
    /// Byte count of the current bank.
    #[bits(20..=30, r)]
    byct: u11,
}

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbMode {
    #[default]
    Host = 0,
    Device = 1,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct GeneralControl {
    #[bit(0, rw)]
    idte: bool,
    #[bit(1, rw)]
    vbuste: bool,
    #[bit(2, rw)]
    srpe: bool,
    #[bit(3, rw)]
    vberre: bool,
    #[bit(4, rw)]
    bcerre: bool,
    #[bit(5, rw)]
    roleexe: bool,
    #[bit(6, rw)]
    hnperre: bool,
    #[bit(7, rw)]
    stoe: bool,
    #[bit(8, rw)]
    vbushwc: bool,
    #[bit(9, rw)]
    srpsel: bool,
    #[bit(10, rw)]
    srpreq: bool,
    #[bit(11, rw)]
    hnpreq: bool,
    /// Powers the OTG pad; required even in pure device mode.
    #[bit(12, rw)]
    otgpade: bool,
    #[bit(13, rw)]
    vbuspo: bool,
    /// Freezes the USB clock when set; must be cleared for operation.
    #[bit(14, rw)]
    frzclk: bool,
    #[bit(15, rw)]
    usbe: bool,
    #[bits(16..=17, rw)]
    timvalue: u2,
    #[bits(20..=21, rw)]
    timpage: u2,
    #[bit(22, rw)]
    unlock: bool,
    /// ID-pin mode selection; cleared so `uimod` decides the role.
    #[bit(24, rw)]
    uide: bool,
    #[bit(25, rw)]
    uimod: UsbMode,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct GeneralStatus {
    #[bits(12..=13, r)]
    speed: u2,
    /// The 48 MHz/30 MHz clocks are usable.
    #[bit(14, r)]
    clkusable: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Uotghs {
    dev_ctrl: DeviceControl,
    #[mmio(PureRead)]
    dev_isr: DeviceInterrupt,
    #[mmio(Write)]
    dev_icr: DeviceInterrupt,
    #[mmio(Write)]
    dev_ifr: DeviceInterrupt,
    #[mmio(PureRead)]
    dev_imr: DeviceInterrupt,
    #[mmio(Write)]
    dev_idr: DeviceInterrupt,
    #[mmio(Write)]
    dev_ier: DeviceInterrupt,
    /// Endpoint enables in bits 0..=8, endpoint resets in bits 16..=24.
    dev_ept: u32,
    #[mmio(PureRead)]
    dev_fnum: u32,
    _reserved_0: [u32; 55],
    dev_ept_cfg: [EndpointConfig; NUM_ENDPOINTS],
    _reserved_1: [u32; 2],
    #[mmio(PureRead)]
    dev_ept_isr: [EndpointStatus; NUM_ENDPOINTS],
    _reserved_2: [u32; 2],
    /// Write-one-to-clear views of the endpoint status bits.
    #[mmio(Write)]
    dev_ept_icr: [u32; NUM_ENDPOINTS],
    _reserved_3: [u32; 2],
    #[mmio(Write)]
    dev_ept_ifr: [u32; NUM_ENDPOINTS],
    _reserved_4: [u32; 2],
    #[mmio(PureRead)]
    dev_ept_imr: [u32; NUM_ENDPOINTS],
    _reserved_5: [u32; 2],
    /// Write-one-to-enable views of the endpoint interrupt masks.
    #[mmio(Write)]
    dev_ept_ier: [u32; NUM_ENDPOINTS],
    _reserved_6: [u32; 2],
    #[mmio(Write)]
    dev_ept_idr: [u32; NUM_ENDPOINTS],
    _reserved_7: [u32; 366],
    ctrl: GeneralControl,
    #[mmio(PureRead)]
    sr: GeneralStatus,
    #[mmio(Write)]
    scr: u32,
    #[mmio(Write)]
    sfr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Uotghs>(), 0x810);

impl Uotghs {
    pub const fn new_mmio() -> MmioUotghs<'static> {
        MmioUotghs {
            ptr: BASE_ADDR as *mut _,
            phantom: PhantomData,
        }
    }
}

/// Unsafely steal the UOTGHS register block.
///
/// # Safety
///
/// Circumvents ownership and safety guarantees by the HAL.
pub unsafe fn steal_regs() -> MmioUotghs<'static> {
    Uotghs::new_mmio()
}
