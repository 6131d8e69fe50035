//! Board pin database for the Arduino Due.
//!
//! Maps each Arduino digital pin number to the silicon pin(s) behind it. Two
//! board pins (D4 and D10) are wired to two silicon pins at once; their
//! descriptors carry a secondary pin and the GPIO driver mirrors every write
//! and ORs every read across both.

use crate::Port;

/// One silicon pin: a PIO port and a line offset within it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SiliconPin {
    port: Port,
    offset: u8,
}

impl SiliconPin {
    pub const fn new(port: Port, offset: u8) -> Self {
        if offset >= 32 {
            panic!("silicon pin offset out of range");
        }
        SiliconPin { port, offset }
    }

    pub const fn port(&self) -> Port {
        self.port
    }

    pub const fn offset(&self) -> u8 {
        self.offset
    }

    /// Bit mask of this line in its port's registers.
    pub const fn mask(&self) -> u32 {
        1 << self.offset
    }
}

/// Immutable description of one board pin.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinDescriptor {
    primary: SiliconPin,
    secondary: Option<SiliconPin>,
}

impl PinDescriptor {
    pub const fn single(port: Port, offset: u8) -> Self {
        PinDescriptor {
            primary: SiliconPin::new(port, offset),
            secondary: None,
        }
    }

    pub const fn dual(port: Port, offset: u8, second_port: Port, second_offset: u8) -> Self {
        PinDescriptor {
            primary: SiliconPin::new(port, offset),
            secondary: Some(SiliconPin::new(second_port, second_offset)),
        }
    }

    pub const fn primary(&self) -> SiliconPin {
        self.primary
    }

    pub const fn secondary(&self) -> Option<SiliconPin> {
        self.secondary
    }

    /// Iterates over the one or two silicon pins of this board pin.
    pub fn silicon_pins(&self) -> impl Iterator<Item = SiliconPin> + '_ {
        core::iter::once(self.primary).chain(self.secondary)
    }
}

macro_rules! board_pin {
    ($Name:ident, $num:literal, $Port:ident, $offset:literal) => {
        paste::paste! {
            #[doc = "Arduino digital pin " $num " (P" $Port $offset ")."]
            pub const $Name: PinDescriptor = PinDescriptor::single(Port::$Port, $offset);
        }
    };
    ($Name:ident, $num:literal, $Port:ident, $offset:literal, $Port2:ident, $offset2:literal) => {
        paste::paste! {
            #[doc = "Arduino digital pin " $num ", wired to both P" $Port $offset
                " and P" $Port2 $offset2 "."]
            pub const $Name: PinDescriptor =
                PinDescriptor::dual(Port::$Port, $offset, Port::$Port2, $offset2);
        }
    };
}

board_pin!(D0, 0, A, 8);
board_pin!(D1, 1, A, 9);
board_pin!(D2, 2, B, 25);
board_pin!(D3, 3, C, 28);
board_pin!(D4, 4, C, 26, A, 29);
board_pin!(D5, 5, C, 25);
board_pin!(D6, 6, C, 24);
board_pin!(D7, 7, C, 23);
board_pin!(D8, 8, C, 22);
board_pin!(D9, 9, C, 21);
board_pin!(D10, 10, C, 29, A, 28);
board_pin!(D11, 11, D, 7);
board_pin!(D12, 12, D, 8);
board_pin!(D13, 13, B, 27);
board_pin!(D14, 14, D, 4);
board_pin!(D15, 15, D, 5);
board_pin!(D16, 16, A, 13);
board_pin!(D17, 17, A, 12);
board_pin!(D18, 18, A, 11);
board_pin!(D19, 19, A, 10);
board_pin!(D20, 20, B, 12);
board_pin!(D21, 21, B, 13);
board_pin!(D22, 22, B, 26);
board_pin!(D23, 23, A, 14);
board_pin!(D24, 24, A, 15);
board_pin!(D25, 25, D, 0);
board_pin!(D26, 26, D, 1);
board_pin!(D27, 27, D, 2);
board_pin!(D28, 28, D, 3);
board_pin!(D29, 29, D, 6);
board_pin!(D30, 30, D, 9);
board_pin!(D31, 31, A, 7);
board_pin!(D32, 32, D, 10);
board_pin!(D33, 33, C, 1);
board_pin!(D34, 34, C, 2);
board_pin!(D35, 35, C, 3);
board_pin!(D36, 36, C, 4);
board_pin!(D37, 37, C, 5);
board_pin!(D38, 38, C, 6);
board_pin!(D39, 39, C, 7);
board_pin!(D40, 40, C, 8);
board_pin!(D41, 41, C, 9);
board_pin!(D42, 42, A, 19);
board_pin!(D43, 43, A, 20);
board_pin!(D44, 44, C, 19);
board_pin!(D45, 45, C, 18);
board_pin!(D46, 46, C, 17);
board_pin!(D47, 47, C, 16);
board_pin!(D48, 48, C, 15);
board_pin!(D49, 49, C, 14);
board_pin!(D50, 50, C, 13);
board_pin!(D51, 51, C, 12);
board_pin!(D52, 52, B, 21);
board_pin!(D53, 53, B, 14);

/// The amber LED next to the reset button (D13).
pub const LED_BUILTIN: PinDescriptor = D13;

/// Looks up a board pin by its Arduino digital pin number.
pub const fn by_arduino_number(number: u8) -> Option<PinDescriptor> {
    match number {
        0 => Some(D0),
        1 => Some(D1),
        2 => Some(D2),
        3 => Some(D3),
        4 => Some(D4),
        5 => Some(D5),
        6 => Some(D6),
        7 => Some(D7),
        8 => Some(D8),
        9 => Some(D9),
        10 => Some(D10),
        11 => Some(D11),
        12 => Some(D12),
        13 => Some(D13),
        14 => Some(D14),
        15 => Some(D15),
        16 => Some(D16),
        17 => Some(D17),
        18 => Some(D18),
        19 => Some(D19),
        20 => Some(D20),
        21 => Some(D21),
        22 => Some(D22),
        23 => Some(D23),
        24 => Some(D24),
        25 => Some(D25),
        26 => Some(D26),
        27 => Some(D27),
        28 => Some(D28),
        29 => Some(D29),
        30 => Some(D30),
        31 => Some(D31),
        32 => Some(D32),
        33 => Some(D33),
        34 => Some(D34),
        35 => Some(D35),
        36 => Some(D36),
        37 => Some(D37),
        38 => Some(D38),
        39 => Some(D39),
        40 => Some(D40),
        41 => Some(D41),
        42 => Some(D42),
        43 => Some(D43),
        44 => Some(D44),
        45 => Some(D45),
        46 => Some(D46),
        47 => Some(D47),
        48 => Some(D48),
        49 => Some(D49),
        50 => Some(D50),
        51 => Some(D51),
        52 => Some(D52),
        53 => Some(D53),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn led_is_pb27() {
        assert_eq!(LED_BUILTIN.primary(), SiliconPin::new(Port::B, 27));
        assert_eq!(LED_BUILTIN.secondary(), None);
        assert_eq!(by_arduino_number(13), Some(LED_BUILTIN));
    }

    #[test]
    fn dual_wired_pins() {
        assert_eq!(D4.primary(), SiliconPin::new(Port::C, 26));
        assert_eq!(D4.secondary(), Some(SiliconPin::new(Port::A, 29)));
        assert_eq!(D10.primary(), SiliconPin::new(Port::C, 29));
        assert_eq!(D10.secondary(), Some(SiliconPin::new(Port::A, 28)));
        assert_eq!(D4.silicon_pins().count(), 2);
        assert_eq!(D13.silicon_pins().count(), 1);
    }

    #[test]
    fn unknown_pins_have_no_descriptor() {
        assert_eq!(by_arduino_number(54), None);
        assert_eq!(by_arduino_number(255), None);
    }

    #[test]
    fn masks_follow_offsets() {
        assert_eq!(SiliconPin::new(Port::B, 27).mask(), 1 << 27);
        assert_eq!(SiliconPin::new(Port::A, 0).mask(), 1);
    }
}
