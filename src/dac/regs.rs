use core::marker::PhantomData;

use arbitrary_int::{u2, u3, u6};

/// DAC controller base address.
pub const BASE_ADDR: usize = 0x400C_8000;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Control {
    #[bit(0, w)]
    swrst: bool,
}

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordTransfer {
    /// One 16-bit data item per CDR write.
    #[default]
    HalfWord = 0,
    Word = 1,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Mode {
    #[bit(0, rw)]
    trgen: bool,
    #[bits(1..=3, rw)]
    trgsel: u3,
    #[bit(4, rw)]
    word: WordTransfer,
    #[bit(5, rw)]
    sleep: bool,
    #[bit(6, rw)]
    fastwkup: bool,
    #[bits(8..=15, rw)]
    refresh: u8,
    #[bits(16..=17, rw)]
    user_sel: u2,
    /// Tag mode: bits 12..=15 of each data item select the channel.
    #[bit(20, rw)]
    tag: bool,
    #[bit(21, rw)]
    maxs: bool,
    #[bits(24..=29, rw)]
    startup: u6,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct InterruptStatus {
    /// CDR can accept the next data item.
    #[bit(0, r)]
    txrdy: bool,
    #[bit(1, r)]
    eoc: bool,
    #[bit(2, r)]
    endtx: bool,
    #[bit(3, r)]
    txbufe: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Dacc {
    #[mmio(Write)]
    cr: Control,
    mr: Mode,
    _reserved_0: [u32; 2],
    /// Channel enable. Write-one-to-enable.
    #[mmio(Write)]
    cher: u32,
    #[mmio(Write)]
    chdr: u32,
    #[mmio(PureRead)]
    chsr: u32,
    _reserved_1: u32,
    /// Conversion data; in tag mode the channel rides in bits 12..=15.
    #[mmio(Write)]
    cdr: u32,
    #[mmio(Write)]
    ier: u32,
    #[mmio(Write)]
    idr: u32,
    #[mmio(PureRead)]
    imr: u32,
    #[mmio(PureRead)]
    isr: InterruptStatus,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Dacc>(), 0x34);

impl Dacc {
    pub const fn new_mmio() -> MmioDacc<'static> {
        MmioDacc {
            ptr: BASE_ADDR as *mut _,
            phantom: PhantomData,
        }
    }
}
