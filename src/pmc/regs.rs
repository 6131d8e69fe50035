use core::marker::PhantomData;

use arbitrary_int::{u3, u4, u6, u11};

/// Power Management Controller base address.
pub const BASE_ADDR: usize = 0x400E_0600;

/// Password required in the KEY field of every CKGR_MOR write.
pub const MOR_KEY: u8 = 0x37;

/// System clock enable/disable bits (SCER/SCDR/SCSR).
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct SystemClocks {
    /// USB OTG clock (48 MHz, UPLL-derived).
    #[bit(5, rw)]
    uotgclk: bool,
    #[bit(8, rw)]
    pck0: bool,
    #[bit(9, rw)]
    pck1: bool,
    #[bit(10, rw)]
    pck2: bool,
}

/// Main oscillator register (CKGR_MOR).
#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct MainOscillator {
    #[bit(0, rw)]
    moscxten: bool,
    #[bit(1, rw)]
    moscxtby: bool,
    #[bit(3, rw)]
    moscrcen: bool,
    #[bits(4..=6, rw)]
    moscrcf: u3,
    /// Crystal startup time in units of 8 slow-clock cycles.
    #[bits(8..=15, rw)]
    moscxtst: u8,
    /// Must be [MOR_KEY] on every write for the write to take effect.
    #[bits(16..=23, rw)]
    key: u8,
    /// Selects the crystal oscillator (true) or the internal RC (false) as MAINCK.
    #[bit(24, rw)]
    moscsel: bool,
    #[bit(25, rw)]
    cfden: bool,
}

/// PLLA configuration register (CKGR_PLLAR).
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct PllaConfig {
    #[bits(0..=7, rw)]
    diva: u8,
    #[bits(8..=13, rw)]
    pllacount: u6,
    /// Multiplier minus one; the PLL output is MAINCK * (mula + 1) / diva.
    #[bits(16..=26, rw)]
    mula: u11,
    /// Datasheet: must always be written as one.
    #[bit(29, rw)]
    one: bool,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterClockSource {
    SlowClock = 0,
    MainClock = 1,
    PllaClock = 2,
    UpllClock = 3,
}

#[bitbybit::bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterClockPrescaler {
    Clk1 = 0,
    Clk2 = 1,
    Clk4 = 2,
    Clk8 = 3,
    Clk16 = 4,
    Clk32 = 5,
    Clk64 = 6,
    Clk3 = 7,
}

/// Master clock register (PMC_MCKR).
#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct MasterClock {
    #[bits(0..=1, rw)]
    css: MasterClockSource,
    #[bits(4..=6, rw)]
    pres: MasterClockPrescaler,
    #[bit(12, rw)]
    plladiv2: bool,
    #[bit(13, rw)]
    uplldiv2: bool,
}

/// UTMI PLL register (CKGR_UCKR).
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct UtmiPll {
    #[bit(16, rw)]
    upllen: bool,
    /// Startup time in units of 8 slow-clock cycles.
    #[bits(20..=23, rw)]
    upllcount: u4,
}

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbClockSource {
    #[default]
    Plla = 0,
    Upll = 1,
}

/// USB clock register (PMC_USB).
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct UsbClock {
    #[bit(0, rw)]
    usbs: UsbClockSource,
    /// Divider minus one applied to the selected source.
    #[bits(8..=11, rw)]
    usbdiv: u4,
}

/// PMC status register (PMC_SR).
#[bitbybit::bitfield(u32)]
#[derive(Debug)]
pub struct Status {
    /// Main crystal oscillator stabilized.
    #[bit(0, r)]
    moscxts: bool,
    /// PLLA locked.
    #[bit(1, r)]
    locka: bool,
    /// Master clock ready.
    #[bit(3, r)]
    mckrdy: bool,
    /// UTMI PLL locked.
    #[bit(6, r)]
    locku: bool,
    #[bit(7, r)]
    oscsels: bool,
    #[bit(8, r)]
    pckrdy0: bool,
    #[bit(9, r)]
    pckrdy1: bool,
    #[bit(10, r)]
    pckrdy2: bool,
    /// Main oscillator selection done.
    #[bit(16, r)]
    moscsels: bool,
    #[bit(17, r)]
    moscrcs: bool,
    #[bit(18, r)]
    cfdev: bool,
    #[bit(19, r)]
    cfds: bool,
    #[bit(20, r)]
    fos: bool,
}

#[derive(derive_mmio::Mmio)]
#[mmio(no_ctors)]
#[repr(C)]
pub struct Pmc {
    #[mmio(Write)]
    scer: SystemClocks,
    #[mmio(Write)]
    scdr: SystemClocks,
    #[mmio(PureRead)]
    scsr: SystemClocks,
    _reserved_0: u32,
    /// Peripheral clock enable, identifiers 0..=31. Write-one-to-enable.
    #[mmio(Write)]
    pcer0: u32,
    #[mmio(Write)]
    pcdr0: u32,
    #[mmio(PureRead)]
    pcsr0: u32,
    ckgr_uckr: UtmiPll,
    ckgr_mor: MainOscillator,
    #[mmio(PureRead)]
    ckgr_mcfr: u32,
    ckgr_pllar: PllaConfig,
    _reserved_1: u32,
    mckr: MasterClock,
    _reserved_2: u32,
    usb: UsbClock,
    _reserved_3: u32,
    pck0: u32,
    pck1: u32,
    pck2: u32,
    _reserved_4: [u32; 5],
    #[mmio(Write)]
    ier: u32,
    #[mmio(Write)]
    idr: u32,
    #[mmio(PureRead)]
    sr: Status,
    #[mmio(PureRead)]
    imr: u32,
    fsmr: u32,
    fspr: u32,
    #[mmio(Write)]
    focr: u32,
    _reserved_5: [u32; 26],
    wpmr: u32,
    #[mmio(PureRead)]
    wpsr: u32,
    _reserved_6: [u32; 5],
    /// Peripheral clock enable, identifiers 32..=44. Write-one-to-enable.
    #[mmio(Write)]
    pcer1: u32,
    #[mmio(Write)]
    pcdr1: u32,
    #[mmio(PureRead)]
    pcsr1: u32,
    pcr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Pmc>(), 0x110);

impl Pmc {
    pub const fn new_mmio() -> MmioPmc<'static> {
        MmioPmc {
            ptr: BASE_ADDR as *mut _,
            phantom: PhantomData,
        }
    }
}

/// Unsafely steal the PMC register block.
///
/// # Safety
///
/// Circumvents ownership and safety guarantees by the HAL.
pub unsafe fn steal_regs() -> MmioPmc<'static> {
    Pmc::new_mmio()
}
