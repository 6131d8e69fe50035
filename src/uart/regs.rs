use core::marker::PhantomData;

/// UART (Programming Port) base address.
pub const BASE_ADDR: usize = 0x400E_0800;

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Control {
    /// Resets and disables the receiver.
    #[bit(2, w)]
    rstrx: bool,
    /// Resets and disables the transmitter.
    #[bit(3, w)]
    rsttx: bool,
    #[bit(4, w)]
    rxen: bool,
    #[bit(5, w)]
    rxdis: bool,
    #[bit(6, w)]
    txen: bool,
    #[bit(7, w)]
    txdis: bool,
    /// Clears the sticky error status bits.
    #[bit(8, w)]
    rststa: bool,
}

#[bitbybit::bitenum(u3)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    Even = 0,
    Odd = 1,
    Space = 2,
    Mark = 3,
    No = 4,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelMode {
    Normal = 0,
    AutomaticEcho = 1,
    LocalLoopback = 2,
    RemoteLoopback = 3,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Mode {
    #[bits(9..=11, rw)]
    par: Option<Parity>,
    #[bits(14..=15, rw)]
    chmode: ChannelMode,
}

#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct Status {
    /// A received byte is waiting in RHR.
    #[bit(0, r)]
    rxrdy: bool,
    /// THR is empty and can take the next byte.
    #[bit(1, r)]
    txrdy: bool,
    #[bit(3, r)]
    endrx: bool,
    #[bit(4, r)]
    endtx: bool,
    #[bit(5, r)]
    ovre: bool,
    #[bit(6, r)]
    frame: bool,
    #[bit(7, r)]
    pare: bool,
    /// Transmitter shift register and THR are both empty.
    #[bit(9, r)]
    txempty: bool,
    #[bit(11, r)]
    txbufe: bool,
    #[bit(12, r)]
    rxbuff: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct BaudRate {
    /// Clock divisor; the baud rate is MCK / (16 * cd).
    #[bits(0..=15, rw)]
    cd: u16,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Uart {
    #[mmio(Write)]
    cr: Control,
    mr: Mode,
    #[mmio(Write)]
    ier: u32,
    #[mmio(Write)]
    idr: u32,
    #[mmio(PureRead)]
    imr: u32,
    #[mmio(PureRead)]
    sr: Status,
    /// Receive holding register; the read pops the byte.
    rhr: u32,
    #[mmio(Write)]
    thr: u32,
    brgr: BaudRate,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Uart>(), 0x24);

impl Uart {
    pub const fn new_mmio() -> MmioUart<'static> {
        MmioUart {
            ptr: BASE_ADDR as *mut _,
            phantom: PhantomData,
        }
    }
}

/// Unsafely steal the UART register block.
///
/// # Safety
///
/// Circumvents ownership and safety guarantees by the HAL.
pub unsafe fn steal_regs() -> MmioUart<'static> {
    Uart::new_mmio()
}
