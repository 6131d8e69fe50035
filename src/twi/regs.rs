use core::marker::PhantomData;

use arbitrary_int::{u3, u7, u24};

/// TWI0 base address (PA17/PA18, Due "Wire1").
pub const BASE_ADDR_0: usize = 0x4008_C000;
/// TWI1 base address (PB12/PB13, Due "Wire").
pub const BASE_ADDR_1: usize = 0x4009_0000;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bank {
    Twi0 = 0,
    Twi1 = 1,
}

impl Bank {
    /// Unsafely steal the TWI register block for this bank.
    ///
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees by the HAL.
    pub unsafe fn steal_regs(&self) -> MmioTwi<'static> {
        Twi::new_mmio(*self)
    }
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Control {
    /// Sends a START condition (master).
    #[bit(0, w)]
    start: bool,
    /// Sends a STOP condition after the current byte (master).
    #[bit(1, w)]
    stop: bool,
    #[bit(2, w)]
    msen: bool,
    #[bit(3, w)]
    msdis: bool,
    #[bit(4, w)]
    sven: bool,
    #[bit(5, w)]
    svdis: bool,
    #[bit(6, w)]
    quick: bool,
    #[bit(7, w)]
    swrst: bool,
}

/// Write-one command combinations for the [Control] register.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiCommand {
    Start = 1 << 0,
    Stop = 1 << 1,
    /// Single-byte master read: START and STOP in the same write.
    StartWithStop = (1 << 0) | (1 << 1),
    MasterEnable = 1 << 2,
    SlaveEnable = 1 << 4,
    SlaveDisable = 1 << 5,
    /// Both state machines off, the state after reset.
    SlaveAndMasterDisable = (1 << 5) | (1 << 3),
    /// Address-only transaction without a data phase.
    Quick = 1 << 6,
    SoftwareReset = 1 << 7,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InternalAddressSize {
    #[default]
    None = 0,
    OneByte = 1,
    TwoBytes = 2,
    ThreeBytes = 3,
}

/// Master mode register (MMR).
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct MasterMode {
    #[bits(8..=9, rw)]
    iadrsz: InternalAddressSize,
    /// Read direction when set, write direction when clear.
    #[bit(12, rw)]
    mread: bool,
    #[bits(16..=22, rw)]
    dadr: u7,
}

/// Slave mode register (SMR).
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct SlaveMode {
    #[bits(16..=22, rw)]
    sadr: u7,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct InternalAddress {
    #[bits(0..=23, rw)]
    iadr: u24,
}

/// Clock waveform generator (CWGR). SCL low/high periods are
/// `((div * 2^ckdiv) + 4) / mck`.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct ClockWaveform {
    #[bits(0..=7, rw)]
    cldiv: u8,
    #[bits(8..=15, rw)]
    chdiv: u8,
    #[bits(16..=18, rw)]
    ckdiv: u3,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct Status {
    /// Transmission completed (bus released).
    #[bit(0, r)]
    txcomp: bool,
    #[bit(1, r)]
    rxrdy: bool,
    #[bit(2, r)]
    txrdy: bool,
    /// Slave: the master is reading from us.
    #[bit(3, r)]
    svread: bool,
    /// Slave: our address matched, access in progress.
    #[bit(4, r)]
    svacc: bool,
    #[bit(5, r)]
    gacc: bool,
    #[bit(6, r)]
    ovre: bool,
    #[bit(8, r)]
    nack: bool,
    #[bit(9, r)]
    arblst: bool,
    #[bit(10, r)]
    sclws: bool,
    /// Slave: end of slave access (cleared on read).
    #[bit(11, r)]
    eosacc: bool,
    #[bit(12, r)]
    endrx: bool,
    #[bit(13, r)]
    endtx: bool,
    #[bit(14, r)]
    rxbuff: bool,
    #[bit(15, r)]
    txbufe: bool,
}

/// PDC transfer control (PTCR). The drivers only ever disable the PDC.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct PdcTransfer {
    #[bit(0, w)]
    rxten: bool,
    #[bit(1, w)]
    rxtdis: bool,
    #[bit(8, w)]
    txten: bool,
    #[bit(9, w)]
    txtdis: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Twi {
    #[mmio(Write)]
    cr: Control,
    mmr: MasterMode,
    smr: SlaveMode,
    iadr: InternalAddress,
    cwgr: ClockWaveform,
    _reserved_0: [u32; 3],
    #[mmio(PureRead)]
    sr: Status,
    #[mmio(Write)]
    ier: u32,
    #[mmio(Write)]
    idr: u32,
    #[mmio(PureRead)]
    imr: u32,
    /// Receive holding register; the read pops the byte.
    rhr: u32,
    #[mmio(Write)]
    thr: u32,
    _reserved_1: [u32; 50],
    rpr: u32,
    rcr: u32,
    tpr: u32,
    tcr: u32,
    rnpr: u32,
    rncr: u32,
    tnpr: u32,
    tncr: u32,
    #[mmio(Write)]
    ptcr: PdcTransfer,
    #[mmio(PureRead)]
    ptsr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Twi>(), 0x128);

impl Twi {
    const fn new_mmio_at(base: usize) -> MmioTwi<'static> {
        MmioTwi {
            ptr: base as *mut _,
            phantom: PhantomData,
        }
    }

    pub const fn new_mmio(bank: Bank) -> MmioTwi<'static> {
        match bank {
            Bank::Twi0 => Self::new_mmio_at(BASE_ADDR_0),
            Bank::Twi1 => Self::new_mmio_at(BASE_ADDR_1),
        }
    }
}
