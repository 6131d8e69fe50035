use core::marker::PhantomData;

use crate::Port;

/// PIOA base address.
pub const BASE_ADDR_A: usize = 0x400E_0E00;
/// PIOB base address.
pub const BASE_ADDR_B: usize = 0x400E_1000;
/// PIOC base address.
pub const BASE_ADDR_C: usize = 0x400E_1200;
/// PIOD base address.
pub const BASE_ADDR_D: usize = 0x400E_1400;

/// Parallel I/O controller register block.
///
/// Nearly every register is a write-one-to-act enable/disable pair plus a
/// status register, one bit per line, so the driver stores plain masks and no
/// read-modify-write is needed.
#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Pio {
    /// PIO enable: gives the line back to the PIO controller.
    #[mmio(Write)]
    per: u32,
    /// PIO disable: hands the line to the peripheral selected in ABSR.
    #[mmio(Write)]
    pdr: u32,
    #[mmio(PureRead)]
    psr: u32,
    _reserved_0: u32,
    /// Output enable.
    #[mmio(Write)]
    oer: u32,
    /// Output disable (input direction).
    #[mmio(Write)]
    odr: u32,
    #[mmio(PureRead)]
    osr: u32,
    _reserved_1: u32,
    /// Input glitch filter enable.
    #[mmio(Write)]
    ifer: u32,
    #[mmio(Write)]
    ifdr: u32,
    #[mmio(PureRead)]
    ifsr: u32,
    _reserved_2: u32,
    /// Set output data.
    #[mmio(Write)]
    sodr: u32,
    /// Clear output data.
    #[mmio(Write)]
    codr: u32,
    /// Output data status (the output latch).
    #[mmio(PureRead)]
    odsr: u32,
    /// Pin data status (the input synchronizer).
    #[mmio(PureRead)]
    pdsr: u32,
    #[mmio(Write)]
    ier: u32,
    #[mmio(Write)]
    idr: u32,
    #[mmio(PureRead)]
    imr: u32,
    /// Interrupt status; cleared by the read.
    isr: u32,
    /// Multi-driver (open drain) enable.
    #[mmio(Write)]
    mder: u32,
    #[mmio(Write)]
    mddr: u32,
    #[mmio(PureRead)]
    mdsr: u32,
    _reserved_3: u32,
    /// Pull-up disable.
    #[mmio(Write)]
    pudr: u32,
    /// Pull-up enable.
    #[mmio(Write)]
    puer: u32,
    #[mmio(PureRead)]
    pusr: u32,
    _reserved_4: u32,
    /// Peripheral A/B select: 0 = Peripheral A, 1 = Peripheral B.
    absr: u32,
    _reserved_5: [u32; 3],
    #[mmio(Write)]
    scifsr: u32,
    #[mmio(Write)]
    difsr: u32,
    #[mmio(PureRead)]
    ifdgsr: u32,
    scdr: u32,
    _reserved_6: [u32; 4],
    #[mmio(Write)]
    ower: u32,
    #[mmio(Write)]
    owdr: u32,
    #[mmio(PureRead)]
    owsr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Pio>(), 0xAC);

impl Pio {
    const fn new_mmio_at(base: usize) -> MmioPio<'static> {
        MmioPio {
            ptr: base as *mut _,
            phantom: PhantomData,
        }
    }

    pub const fn new_mmio(port: Port) -> MmioPio<'static> {
        match port {
            Port::A => Self::new_mmio_at(BASE_ADDR_A),
            Port::B => Self::new_mmio_at(BASE_ADDR_B),
            Port::C => Self::new_mmio_at(BASE_ADDR_C),
            Port::D => Self::new_mmio_at(BASE_ADDR_D),
        }
    }
}
