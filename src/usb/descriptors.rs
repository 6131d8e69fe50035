//! CDC-ACM descriptor tables, assembled at compile time.
//!
//! The configuration descriptor carries an Interface Association Descriptor
//! so composite-aware hosts bind both interfaces to one function; stock
//! Linux/macOS CDC-ACM drivers enumerate the device as a plain serial port.

/// Arduino's vendor ID; substitute a project-specific pair for products.
pub const VENDOR_ID: u16 = 0x2341;
pub const PRODUCT_ID: u16 = 0x003E;

/// Control endpoint max packet size.
pub const EP0_SIZE: usize = 64;

/// Interrupt IN notification endpoint.
pub const CDC_NOTIFY_EP: usize = 1;
/// Bulk OUT data endpoint.
pub const CDC_OUT_EP: usize = 2;
/// Bulk IN data endpoint.
pub const CDC_IN_EP: usize = 3;

/// Max packet size of the notification endpoint.
pub const CDC_NOTIFY_PACKET: usize = 8;
/// Max packet size of the bulk data endpoints.
pub const CDC_DATA_PACKET: usize = 64;

// Standard request codes serviced by the control state machine.
pub const REQ_SET_ADDRESS: u8 = 0x05;
pub const REQ_GET_DESCRIPTOR: u8 = 0x06;
pub const REQ_SET_CONFIGURATION: u8 = 0x09;

// CDC class request codes.
pub const CDC_SET_LINE_CODING: u8 = 0x20;
pub const CDC_GET_LINE_CODING: u8 = 0x21;
pub const CDC_SET_CONTROL_LINE_STATE: u8 = 0x22;

// Descriptor type codes.
pub const DESC_DEVICE: u8 = 1;
pub const DESC_CONFIGURATION: u8 = 2;
pub const DESC_STRING: u8 = 3;

/// Device descriptor: bcdUSB 2.00, IAD-style class triple, EP0 size 64.
pub static DEVICE: [u8; 18] = [
    18,                        // bLength
    DESC_DEVICE,               // bDescriptorType
    0x00, 0x02,                // bcdUSB 2.00
    0xEF,                      // bDeviceClass (miscellaneous)
    0x02,                      // bDeviceSubClass (common)
    0x01,                      // bDeviceProtocol (IAD)
    EP0_SIZE as u8,            // bMaxPacketSize0
    (VENDOR_ID & 0xFF) as u8,
    (VENDOR_ID >> 8) as u8,
    (PRODUCT_ID & 0xFF) as u8,
    (PRODUCT_ID >> 8) as u8,
    0x00, 0x01,                // bcdDevice 1.00
    1,                         // iManufacturer
    2,                         // iProduct
    3,                         // iSerialNumber
    1,                         // bNumConfigurations
];

/// Total length of the one-and-only configuration descriptor.
pub const CONFIG_TOTAL_LENGTH: u16 = 9 + 8 + 9 + 5 + 5 + 4 + 5 + 7 + 9 + 7 + 7;

/// Configuration descriptor: IAD + CDC COMM interface (notify EP1) + CDC
/// functional descriptors + DATA interface (bulk EP2 OUT / EP3 IN).
pub static CONFIGURATION: [u8; CONFIG_TOTAL_LENGTH as usize] = [
    // Configuration
    9,
    DESC_CONFIGURATION,
    (CONFIG_TOTAL_LENGTH & 0xFF) as u8,
    (CONFIG_TOTAL_LENGTH >> 8) as u8,
    2,    // bNumInterfaces
    1,    // bConfigurationValue
    0,    // iConfiguration
    0x80, // bmAttributes: bus powered
    50,   // bMaxPower: 100 mA
    // Interface Association: CDC ACM function spanning interfaces 0..=1
    8, 0x0B, 0, 2, 0x02, 0x02, 0x01, 0,
    // Interface 0: communications, one notification endpoint
    9, 0x04, 0, 0, 1, 0x02, 0x02, 0x01, 0,
    // CDC header functional, bcdCDC 1.10
    5, 0x24, 0x00, 0x10, 0x01,
    // CDC call management: handled by the data interface
    5, 0x24, 0x01, 0x01, 1,
    // CDC abstract control management: line coding + serial state
    4, 0x24, 0x02, 0x06,
    // CDC union: master interface 0, slave interface 1
    5, 0x24, 0x06, 0, 1,
    // EP1 interrupt IN, 8 bytes, interval 16
    7, 0x05, 0x80 | CDC_NOTIFY_EP as u8, 0x03, CDC_NOTIFY_PACKET as u8, 0, 16,
    // Interface 1: CDC data, two bulk endpoints
    9, 0x04, 1, 0, 2, 0x0A, 0x00, 0x00, 0,
    // EP2 bulk OUT, 64 bytes
    7, 0x05, CDC_OUT_EP as u8, 0x02, CDC_DATA_PACKET as u8, 0, 0,
    // EP3 bulk IN, 64 bytes
    7, 0x05, 0x80 | CDC_IN_EP as u8, 0x02, CDC_DATA_PACKET as u8, 0, 0,
];

/// String descriptor 0: one language identifier, en-US.
pub static STRING_LANGUAGE: [u8; 4] = [4, DESC_STRING, 0x09, 0x04];

/// Encodes an ASCII string as a UTF-16LE string descriptor.
const fn string_descriptor<const N: usize>(text: &str) -> [u8; N] {
    let bytes = text.as_bytes();
    let mut out = [0u8; N];
    out[0] = N as u8;
    out[1] = DESC_STRING;
    let mut i = 0;
    while i < bytes.len() {
        out[2 + 2 * i] = bytes[i];
        out[3 + 2 * i] = 0;
        i += 1;
    }
    out
}

pub static STRING_MANUFACTURER: [u8; 2 + 2 * 11] = string_descriptor("Arduino LLC");
pub static STRING_PRODUCT: [u8; 2 + 2 * 11] = string_descriptor("Arduino Due");
pub static STRING_SERIAL: [u8; 2 + 2 * 12] = string_descriptor("HSDUE-000001");

/// Resolves a GET_DESCRIPTOR lookup. Unknown types or indices return `None`
/// and the control endpoint stalls.
pub fn descriptor(descriptor_type: u8, index: u8) -> Option<&'static [u8]> {
    match (descriptor_type, index) {
        (DESC_DEVICE, _) => Some(&DEVICE),
        (DESC_CONFIGURATION, _) => Some(&CONFIGURATION),
        (DESC_STRING, 0) => Some(&STRING_LANGUAGE),
        (DESC_STRING, 1) => Some(&STRING_MANUFACTURER),
        (DESC_STRING, 2) => Some(&STRING_PRODUCT),
        (DESC_STRING, 3) => Some(&STRING_SERIAL),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_descriptor_well_formed() {
        assert_eq!(DEVICE.len(), 18);
        assert_eq!(DEVICE[0] as usize, DEVICE.len());
        assert_eq!(DEVICE[1], DESC_DEVICE);
        assert_eq!(u16::from_le_bytes([DEVICE[2], DEVICE[3]]), 0x0200);
        assert_eq!(u16::from_le_bytes([DEVICE[8], DEVICE[9]]), VENDOR_ID);
        assert_eq!(u16::from_le_bytes([DEVICE[10], DEVICE[11]]), PRODUCT_ID);
        assert_eq!(DEVICE[7] as usize, EP0_SIZE);
    }

    #[test]
    fn configuration_lengths_are_consistent() {
        // wTotalLength matches the actual byte count...
        assert_eq!(
            u16::from_le_bytes([CONFIGURATION[2], CONFIGURATION[3]]) as usize,
            CONFIGURATION.len()
        );
        // ...and the sub-descriptor bLength fields tile the whole table.
        let mut offset = 0;
        while offset < CONFIGURATION.len() {
            let len = CONFIGURATION[offset] as usize;
            assert!(len >= 2, "descriptor with bogus length at {offset}");
            offset += len;
        }
        assert_eq!(offset, CONFIGURATION.len());
    }

    #[test]
    fn iad_binds_both_interfaces_as_cdc_acm() {
        // The IAD follows the 9-byte configuration header.
        let iad = &CONFIGURATION[9..17];
        assert_eq!(iad[1], 0x0B);
        assert_eq!(iad[2], 0); // first interface
        assert_eq!(iad[3], 2); // interface count
        assert_eq!(&iad[4..7], &[0x02, 0x02, 0x01]);
    }

    #[test]
    fn endpoint_addresses_match_the_constants() {
        let mut endpoints = std::vec::Vec::new();
        let mut offset = 0;
        while offset < CONFIGURATION.len() {
            let len = CONFIGURATION[offset] as usize;
            if CONFIGURATION[offset + 1] == 0x05 {
                endpoints.push((CONFIGURATION[offset + 2], CONFIGURATION[offset + 4]));
            }
            offset += len;
        }
        assert_eq!(
            endpoints,
            [
                (0x80 | CDC_NOTIFY_EP as u8, CDC_NOTIFY_PACKET as u8),
                (CDC_OUT_EP as u8, CDC_DATA_PACKET as u8),
                (0x80 | CDC_IN_EP as u8, CDC_DATA_PACKET as u8),
            ]
        );
    }

    #[test]
    fn string_descriptors_are_utf16le() {
        assert_eq!(STRING_LANGUAGE, [4, 3, 0x09, 0x04]);
        for (descriptor, text) in [
            (&STRING_MANUFACTURER[..], "Arduino LLC"),
            (&STRING_PRODUCT[..], "Arduino Due"),
            (&STRING_SERIAL[..], "HSDUE-000001"),
        ] {
            assert_eq!(descriptor[0] as usize, descriptor.len());
            assert_eq!(descriptor[1], DESC_STRING);
            let units: std::vec::Vec<u16> = descriptor[2..]
                .chunks(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let decoded = std::string::String::from_utf16(&units).unwrap();
            assert_eq!(decoded, text);
        }
    }

    #[test]
    fn descriptor_lookup() {
        assert_eq!(descriptor(DESC_DEVICE, 0), Some(&DEVICE[..]));
        assert_eq!(descriptor(DESC_CONFIGURATION, 0), Some(&CONFIGURATION[..]));
        assert_eq!(descriptor(DESC_STRING, 3), Some(&STRING_SERIAL[..]));
        assert_eq!(descriptor(DESC_STRING, 4), None);
        assert_eq!(descriptor(0x21, 0), None);
    }
}
