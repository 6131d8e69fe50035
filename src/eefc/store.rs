//! Persistent key/value storage in the reserved flash page.
//!
//! The store owns the last page of flash bank 1. On-page layout:
//!
//! | Offset | Bytes | Meaning |
//! |--------|-------|---------------------------------------------|
//! | 0      | 4     | Magic `0x4545_4B56`, little-endian          |
//! | 4      | 4     | Format version (1)                          |
//! | 8      | 4     | Payload byte count                          |
//! | 12     | 4     | CRC-32 of the payload                       |
//! | 16     | ...   | Concatenated entries, `0xFF` padded         |
//!
//! Each entry is `{key_len: u8, type_tag: u8, value_len: u16 LE, key, value}`.
//! Keys are unique within the payload; a save removes any previous entry for
//! the key before appending. An erased page (all `0xFF`) decodes as
//! [StoreError::Empty].
//!
//! Writes go through the memory-mapped flash write buffer followed by an
//! erase-and-write-page command on EEFC1. Re-flashing the firmware erases the
//! page; the linker script must keep code out of it.

use heapless::Vec;

use super::{PAGE_SIZE, RESERVED_PAGE_ADDR, RESERVED_PAGE_INDEX, regs};
use crate::mmio;

/// Bytes taken by the page header.
pub const HEADER_LEN: usize = 16;
/// Maximum payload size, i.e. the page minus its header.
pub const PAYLOAD_CAPACITY: usize = PAGE_SIZE - HEADER_LEN;

const MAGIC: u32 = 0x4545_4B56;
const ERASED_MAGIC: u32 = 0xFFFF_FFFF;
const FORMAT_VERSION: u32 = 1;
const MAX_KEY_LEN: usize = 255;
const MAX_VALUE_LEN: usize = 65_535;

const READY_WAIT_ITERS: u32 = 5_000_000;
const WRITE_WAIT_ITERS: u32 = 20_000_000;

/// Value interpretation stored alongside each entry.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TypeTag {
    Raw = 1,
    Utf8 = 2,
    U32 = 3,
    Bool = 4,
}

impl TypeTag {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(TypeTag::Raw),
            2 => Some(TypeTag::Utf8),
            3 => Some(TypeTag::U32),
            4 => Some(TypeTag::Bool),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// The page is erased; no store has ever been written.
    #[error("page is erased")]
    Empty,
    #[error("bad page magic {found:#010x}")]
    BadMagic { found: u32 },
    #[error("unsupported format version {found}")]
    UnsupportedVersion { found: u32 },
    #[error("header payload length {len} exceeds capacity")]
    CorruptHeader { len: u32 },
    #[error("payload CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { stored: u32, computed: u32 },
    /// An entry header points past the end of the payload.
    #[error("malformed payload entry")]
    CorruptPayload,
    #[error("key not found")]
    KeyNotFound,
    /// Key is empty, longer than 255 bytes or contains a byte outside
    /// `[A-Za-z0-9._-]`.
    #[error("invalid key")]
    InvalidKey,
    #[error("value too large ({len} bytes)")]
    ValueTooLarge { len: usize },
    /// The payload would exceed the page capacity by `missing` bytes.
    #[error("no room left on page, {missing} bytes over capacity")]
    NoRoom { missing: usize },
    #[error("stored bytes are not valid UTF-8")]
    InvalidUtf8,
    /// The entry exists but carries a different type tag.
    #[error("wrong type tag {found}")]
    WrongType { found: u8 },
    #[error("flash controller timeout")]
    Timeout,
    #[error("flash command error")]
    CommandError,
    #[error("flash lock error")]
    LockError,
}

/// A decoded payload entry borrowing from the page image.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Entry<'a> {
    pub key: &'a [u8],
    pub type_tag: u8,
    pub value: &'a [u8],
}

//==================================================================================================
// Page codec
//==================================================================================================

/// Bytewise CRC-32, reflected IEEE polynomial, init and final xor `0xFFFFFFFF`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let lsb = crc & 1;
            crc >>= 1;
            if lsb != 0 {
                crc ^= 0xEDB8_8320;
            }
        }
    }
    !crc
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey);
    }
    if !key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    {
        return Err(StoreError::InvalidKey);
    }
    Ok(())
}

fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Validates the page header and CRC, returning the payload slice.
pub fn parse_page(page: &[u8]) -> Result<&[u8], StoreError> {
    if page.len() < HEADER_LEN {
        return Err(StoreError::CorruptHeader {
            len: page.len() as u32,
        });
    }
    let magic = read_u32_le(page, 0);
    if magic == ERASED_MAGIC {
        return Err(StoreError::Empty);
    }
    if magic != MAGIC {
        return Err(StoreError::BadMagic { found: magic });
    }
    let version = read_u32_le(page, 4);
    if version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion { found: version });
    }
    let len = read_u32_le(page, 8);
    if len as usize > PAYLOAD_CAPACITY || HEADER_LEN + len as usize > page.len() {
        return Err(StoreError::CorruptHeader { len });
    }
    let stored = read_u32_le(page, 12);
    let payload = &page[HEADER_LEN..HEADER_LEN + len as usize];
    let computed = crc32(payload);
    if stored != computed {
        return Err(StoreError::CrcMismatch { stored, computed });
    }
    Ok(payload)
}

/// Builds the full page image for a payload: header, payload, `0xFF` padding.
pub fn build_image(payload: &[u8]) -> [u8; PAGE_SIZE] {
    let mut image = [0xFFu8; PAGE_SIZE];
    image[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    image[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    image[8..12].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    image[12..16].copy_from_slice(&crc32(payload).to_le_bytes());
    image[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
    image
}

/// Decodes the entry starting at `at`, returning it together with the offset
/// of the next entry. `Ok(None)` marks the end of the payload.
fn parse_entry(payload: &[u8], at: usize) -> Result<Option<(Entry<'_>, usize)>, StoreError> {
    if at == payload.len() {
        return Ok(None);
    }
    if at + 4 > payload.len() {
        return Err(StoreError::CorruptPayload);
    }
    let key_len = payload[at] as usize;
    let type_tag = payload[at + 1];
    let value_len = u16::from_le_bytes([payload[at + 2], payload[at + 3]]) as usize;
    let key_start = at + 4;
    let value_start = key_start + key_len;
    let next = value_start + value_len;
    if key_len == 0 || next > payload.len() {
        return Err(StoreError::CorruptPayload);
    }
    Ok(Some((
        Entry {
            key: &payload[key_start..value_start],
            type_tag,
            value: &payload[value_start..next],
        },
        next,
    )))
}

/// Iterator over the entries of a parsed payload.
///
/// Stops at the first malformed entry; [parse_page] level validation makes
/// that unreachable for payloads this crate wrote itself.
pub struct Entries<'a> {
    payload: &'a [u8],
    pos: usize,
}

/// Iterates over the entries of a payload obtained from [parse_page].
pub fn entries(payload: &[u8]) -> Entries<'_> {
    Entries { payload, pos: 0 }
}

impl<'a> Iterator for Entries<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Entry<'a>> {
        match parse_entry(self.payload, self.pos) {
            Ok(Some((entry, next))) => {
                self.pos = next;
                Some(entry)
            }
            _ => None,
        }
    }
}

fn find<'a>(payload: &'a [u8], key: &[u8]) -> Result<Option<Entry<'a>>, StoreError> {
    let mut pos = 0;
    while let Some((entry, next)) = parse_entry(payload, pos)? {
        if entry.key == key {
            return Ok(Some(entry));
        }
        pos = next;
    }
    Ok(None)
}

/// Copies `payload` without any entry matching `key`. The boolean reports
/// whether an entry was dropped.
fn without_key(
    payload: &[u8],
    key: &[u8],
) -> Result<(Vec<u8, PAYLOAD_CAPACITY>, bool), StoreError> {
    let mut out = Vec::new();
    let mut removed = false;
    let mut pos = 0;
    while let Some((entry, next)) = parse_entry(payload, pos)? {
        if entry.key == key {
            removed = true;
        } else {
            // Cannot overflow: the output is a subset of a payload that fit.
            out.extend_from_slice(&payload[pos..next]).unwrap();
        }
        pos = next;
    }
    Ok((out, removed))
}

/// Appends one encoded entry, reporting the overflow amount on failure.
fn push_entry(
    out: &mut Vec<u8, PAYLOAD_CAPACITY>,
    key: &[u8],
    type_tag: TypeTag,
    value: &[u8],
) -> Result<(), StoreError> {
    let needed = 4 + key.len() + value.len();
    if out.len() + needed > PAYLOAD_CAPACITY {
        return Err(StoreError::NoRoom {
            missing: out.len() + needed - PAYLOAD_CAPACITY,
        });
    }
    out.push(key.len() as u8).unwrap();
    out.push(type_tag as u8).unwrap();
    out.extend_from_slice(&(value.len() as u16).to_le_bytes()).unwrap();
    out.extend_from_slice(key).unwrap();
    out.extend_from_slice(value).unwrap();
    Ok(())
}

//==================================================================================================
// Store driver
//==================================================================================================

/// Key/value store over the reserved flash page.
///
/// Construct exactly one instance; concurrent use of EEFC1 from two handles
/// is undefined.
pub struct KvStore {
    regs: regs::MmioEefc<'static>,
}

impl KvStore {
    pub fn new() -> Self {
        KvStore {
            regs: regs::Eefc::new_mmio(regs::Bank::Eefc1),
        }
    }

    /// Copies the reserved page out of flash.
    pub fn read_page(&self) -> [u8; PAGE_SIZE] {
        let mut page = [0u8; PAGE_SIZE];
        unsafe {
            core::ptr::copy_nonoverlapping(
                RESERVED_PAGE_ADDR as *const u8,
                page.as_mut_ptr(),
                PAGE_SIZE,
            );
        }
        page
    }

    /// Looks up `key`, returning its type tag and a copy of the value bytes.
    pub fn load(&mut self, key: &str) -> Result<(TypeTag, Vec<u8, PAYLOAD_CAPACITY>), StoreError> {
        validate_key(key)?;
        let page = self.read_page();
        let payload = parse_page(&page)?;
        match find(payload, key.as_bytes())? {
            Some(entry) => {
                let tag =
                    TypeTag::from_raw(entry.type_tag).ok_or(StoreError::CorruptPayload)?;
                // Cannot overflow: the value is a slice of the payload.
                Ok((tag, Vec::from_slice(entry.value).unwrap()))
            }
            None => Err(StoreError::KeyNotFound),
        }
    }

    /// True if `key` is present and the page decodes cleanly.
    pub fn contains(&mut self, key: &str) -> bool {
        self.load(key).is_ok()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// An erased or foreign page (bad magic) is treated as an empty store.
    pub fn save(&mut self, key: &str, type_tag: TypeTag, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        if value.len() > MAX_VALUE_LEN {
            return Err(StoreError::ValueTooLarge { len: value.len() });
        }
        let page = self.read_page();
        let mut payload = match parse_page(&page) {
            Ok(payload) => without_key(payload, key.as_bytes())?.0,
            Err(StoreError::Empty) | Err(StoreError::BadMagic { .. }) => Vec::new(),
            Err(other) => return Err(other),
        };
        push_entry(&mut payload, key.as_bytes(), type_tag, value)?;
        self.write_payload(&payload)
    }

    /// Drops the entry for `key`. Fails with [StoreError::KeyNotFound] if the
    /// key was absent.
    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let page = self.read_page();
        let payload = parse_page(&page)?;
        let (rebuilt, removed) = without_key(payload, key.as_bytes())?;
        if !removed {
            return Err(StoreError::KeyNotFound);
        }
        self.write_payload(&rebuilt)
    }

    /// Rewrites the page with an empty payload.
    pub fn remove_all(&mut self) -> Result<(), StoreError> {
        self.write_payload(&[])
    }

    /// Alias for [Self::remove_all].
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.remove_all()
    }

    pub fn save_u32(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.save(key, TypeTag::U32, &value.to_le_bytes())
    }

    pub fn load_u32(&mut self, key: &str) -> Result<u32, StoreError> {
        let (tag, value) = self.load(key)?;
        if tag != TypeTag::U32 {
            return Err(StoreError::WrongType { found: tag as u8 });
        }
        if value.len() != 4 {
            return Err(StoreError::CorruptPayload);
        }
        Ok(u32::from_le_bytes([value[0], value[1], value[2], value[3]]))
    }

    pub fn save_bool(&mut self, key: &str, value: bool) -> Result<(), StoreError> {
        self.save(key, TypeTag::Bool, &[value as u8])
    }

    pub fn load_bool(&mut self, key: &str) -> Result<bool, StoreError> {
        let (tag, value) = self.load(key)?;
        if tag != TypeTag::Bool {
            return Err(StoreError::WrongType { found: tag as u8 });
        }
        match value.as_slice() {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(StoreError::CorruptPayload),
        }
    }

    pub fn save_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.save(key, TypeTag::Utf8, value.as_bytes())
    }

    pub fn load_str(&mut self, key: &str) -> Result<heapless::String<PAYLOAD_CAPACITY>, StoreError> {
        let (tag, value) = self.load(key)?;
        if tag != TypeTag::Utf8 {
            return Err(StoreError::WrongType { found: tag as u8 });
        }
        let text = core::str::from_utf8(&value).map_err(|_| StoreError::InvalidUtf8)?;
        // Cannot overflow: the value came out of a payload-sized buffer.
        Ok(heapless::String::try_from(text).unwrap())
    }

    /// Streams the page image into the flash write buffer and issues the
    /// erase-and-write-page command on EEFC1.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<(), StoreError> {
        if payload.len() > PAYLOAD_CAPACITY {
            return Err(StoreError::NoRoom {
                missing: payload.len() - PAYLOAD_CAPACITY,
            });
        }
        self.wait_ready(READY_WAIT_ITERS)?;

        let image = build_image(payload);
        let mut addr = RESERVED_PAGE_ADDR;
        for chunk in image.chunks_exact(4) {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            unsafe { mmio::write32(addr, word) };
            addr += 4;
        }
        mmio::dsb();
        mmio::isb();

        self.regs.write_fcr(
            regs::Command::builder()
                .with_fcmd(regs::FlashCommand::EraseAndWritePage as u8)
                .with_farg(RESERVED_PAGE_INDEX)
                .with_fkey(regs::FCR_KEY)
                .build(),
        );

        let status = self.wait_ready(WRITE_WAIT_ITERS)?;
        if status.fcmde() {
            return Err(StoreError::CommandError);
        }
        if status.flocke() {
            return Err(StoreError::LockError);
        }
        Ok(())
    }

    /// Spins until FRDY, returning the status word that observed it. The
    /// error bits are clear-on-read, so callers must check them on this exact
    /// value.
    fn wait_ready(&mut self, cap: u32) -> Result<regs::Status, StoreError> {
        for _ in 0..cap {
            let status = self.regs.read_fsr();
            if status.frdy() {
                return Ok(status);
            }
        }
        Err(StoreError::Timeout)
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with(entries_in: &[(&str, TypeTag, &[u8])]) -> Vec<u8, PAYLOAD_CAPACITY> {
        let mut payload = Vec::new();
        for (key, tag, value) in entries_in {
            push_entry(&mut payload, key.as_bytes(), *tag, value).unwrap();
        }
        payload
    }

    #[test]
    fn crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn erased_page_reads_as_empty() {
        let page = [0xFFu8; PAGE_SIZE];
        assert_eq!(parse_page(&page), Err(StoreError::Empty));
    }

    #[test]
    fn foreign_page_reads_as_bad_magic() {
        let mut page = [0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(
            parse_page(&page),
            Err(StoreError::BadMagic { found: 0xDEAD_BEEF })
        );
    }

    #[test]
    fn image_round_trips() {
        let payload = payload_with(&[("time", TypeTag::U32, &0x1234_5678u32.to_le_bytes())]);
        let image = build_image(&payload);
        assert_eq!(&image[0..4], &[0x56, 0x4B, 0x45, 0x45]);
        let parsed = parse_page(&image).unwrap();
        assert_eq!(parsed, payload.as_slice());
        let entry = find(parsed, b"time").unwrap().unwrap();
        assert_eq!(entry.type_tag, TypeTag::U32 as u8);
        assert_eq!(entry.value, &0x1234_5678u32.to_le_bytes());
    }

    #[test]
    fn version_and_length_are_checked() {
        let image = build_image(&[]);
        let mut wrong_version = image;
        wrong_version[4] = 2;
        assert_eq!(
            parse_page(&wrong_version),
            Err(StoreError::UnsupportedVersion { found: 2 })
        );
        let mut oversized = image;
        oversized[8..12].copy_from_slice(&(PAYLOAD_CAPACITY as u32 + 1).to_le_bytes());
        assert_eq!(
            parse_page(&oversized),
            Err(StoreError::CorruptHeader {
                len: PAYLOAD_CAPACITY as u32 + 1
            })
        );
    }

    #[test]
    fn crc_corruption_is_detected() {
        let payload = payload_with(&[("k", TypeTag::Raw, b"v")]);
        let mut image = build_image(&payload);
        image[12] ^= 0xFF;
        assert!(matches!(
            parse_page(&image),
            Err(StoreError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn last_write_wins() {
        let payload = payload_with(&[("a", TypeTag::Raw, b"one"), ("b", TypeTag::Raw, b"two")]);
        let (mut rebuilt, removed) = without_key(&payload, b"a").unwrap();
        assert!(removed);
        push_entry(&mut rebuilt, b"a", TypeTag::Raw, b"three").unwrap();
        let entry = find(&rebuilt, b"a").unwrap().unwrap();
        assert_eq!(entry.value, b"three");
        assert_eq!(find(&rebuilt, b"b").unwrap().unwrap().value, b"two");
        assert_eq!(entries(&rebuilt).count(), 2);
    }

    #[test]
    fn removing_missing_key_changes_nothing() {
        let payload = payload_with(&[("a", TypeTag::Raw, b"one")]);
        let (rebuilt, removed) = without_key(&payload, b"zzz").unwrap();
        assert!(!removed);
        assert_eq!(rebuilt.as_slice(), payload.as_slice());
    }

    #[test]
    fn overflow_reports_missing_bytes() {
        let mut payload = Vec::new();
        let big = [0u8; 200];
        push_entry(&mut payload, b"first", TypeTag::Raw, &big).unwrap();
        // 209 bytes used; a 4 + 3 + 40 byte entry exceeds 240 by 16.
        let err = push_entry(&mut payload, b"big", TypeTag::Raw, &[0u8; 40]).unwrap_err();
        assert_eq!(err, StoreError::NoRoom { missing: 16 });
    }

    #[test]
    fn truncated_entry_is_corrupt() {
        let payload = payload_with(&[("key", TypeTag::Raw, b"value")]);
        assert_eq!(
            find(&payload[..payload.len() - 1], b"key"),
            Err(StoreError::CorruptPayload)
        );
        assert_eq!(find(&payload[..2], b"key"), Err(StoreError::CorruptPayload));
    }

    #[test]
    fn key_charset_is_enforced() {
        assert_eq!(validate_key("ok.key_1-2"), Ok(()));
        assert_eq!(validate_key(""), Err(StoreError::InvalidKey));
        assert_eq!(validate_key("has space"), Err(StoreError::InvalidKey));
        assert_eq!(validate_key("uml\u{e4}ut"), Err(StoreError::InvalidKey));
    }

    #[test]
    fn entries_iterates_in_order() {
        let payload = payload_with(&[
            ("a", TypeTag::Raw, b"1"),
            ("b", TypeTag::Utf8, b"2"),
            ("c", TypeTag::Bool, &[1]),
        ]);
        let keys: std::vec::Vec<&[u8]> = entries(&payload).map(|e| e.key).collect();
        assert_eq!(keys, [b"a".as_slice(), b"b".as_slice(), b"c".as_slice()]);
    }
}
