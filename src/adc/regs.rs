use core::marker::PhantomData;

use arbitrary_int::{u2, u3, u4};

/// ADC controller base address.
pub const BASE_ADDR: usize = 0x400C_0000;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Control {
    #[bit(0, w)]
    swrst: bool,
    /// Starts a conversion on all enabled channels.
    #[bit(1, w)]
    start: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Mode {
    #[bit(0, rw)]
    trgen: bool,
    #[bits(1..=3, rw)]
    trgsel: u3,
    #[bit(4, rw)]
    lowres: bool,
    #[bit(5, rw)]
    sleep: bool,
    #[bit(6, rw)]
    fwup: bool,
    #[bit(7, rw)]
    freerun: bool,
    /// ADC clock is MCK / (2 * (prescal + 1)).
    #[bits(8..=15, rw)]
    prescal: u8,
    #[bits(16..=19, rw)]
    startup: u4,
    #[bits(20..=21, rw)]
    settling: u2,
    #[bit(23, rw)]
    anach: bool,
    #[bits(24..=27, rw)]
    tracktim: u4,
    #[bits(28..=29, rw)]
    transfer: u2,
    #[bit(31, rw)]
    useq: bool,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct InterruptStatus {
    /// The last converted data in LCDR has not been read yet.
    #[bit(24, r)]
    drdy: bool,
    #[bit(25, r)]
    govre: bool,
    #[bit(26, r)]
    compe: bool,
    #[bit(27, r)]
    endrx: bool,
    #[bit(28, r)]
    rxbuff: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Adc {
    #[mmio(Write)]
    cr: Control,
    mr: Mode,
    seqr1: u32,
    seqr2: u32,
    /// Channel enable. Write-one-to-enable.
    #[mmio(Write)]
    cher: u32,
    #[mmio(Write)]
    chdr: u32,
    #[mmio(PureRead)]
    chsr: u32,
    _reserved_0: u32,
    /// Last converted data; the read clears DRDY.
    lcdr: u32,
    #[mmio(Write)]
    ier: u32,
    #[mmio(Write)]
    idr: u32,
    #[mmio(PureRead)]
    imr: u32,
    #[mmio(PureRead)]
    isr: InterruptStatus,
    _reserved_1: [u32; 2],
    #[mmio(PureRead)]
    over: u32,
    emr: u32,
    cwr: u32,
    cgr: u32,
    cor: u32,
    #[mmio(PureRead)]
    cdr: [u32; 16],
    _reserved_2: u32,
    acr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Adc>(), 0x98);

impl Adc {
    pub const fn new_mmio() -> MmioAdc<'static> {
        MmioAdc {
            ptr: BASE_ADDR as *mut _,
            phantom: PhantomData,
        }
    }
}
