//! # RSDT / XSDT table-pointer arrays
//!
//! The Root System Description Table (RSDT, 32-bit entries) and its 64-bit
//! counterpart (XSDT) are a standard header followed by a tightly packed
//! array of table addresses:
//!
//! ```text
//! ┌──────────────────────┬────────┬────────┬─────┐
//! │ header (36 bytes)    │ entry0 │ entry1 │ ... │   entry = 4 (RSDT) or 8 (XSDT) bytes
//! └──────────────────────┴────────┴────────┴─────┘
//!   count = (length - 36) / width
//! ```
//!
//! Entries are not naturally aligned (the header is 36 bytes long), so all
//! access goes through explicit little-endian reads and writes on a copy of
//! the table bytes.

use crate::header::{HEADER_LEN, Signature, TableHeader, write_length};
use crate::{AcpiError, PhysMemory, checksum, read_u32, read_u64};
use alloc::vec::Vec;

/// Width of the entries of a table-pointer array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryWidth {
    /// 32-bit entries of the RSDT.
    Rsdt,
    /// 64-bit entries of the XSDT.
    Xsdt,
}

impl EntryWidth {
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Rsdt => 4,
            Self::Xsdt => 8,
        }
    }

    /// The signature a table with entries of this width must carry.
    #[must_use]
    pub const fn signature(self) -> Signature {
        match self {
            Self::Rsdt => Signature::RSDT,
            Self::Xsdt => Signature::XSDT,
        }
    }
}

/// Decode the entries following the header of the table image `table`.
///
/// 32-bit entries are zero-extended so both widths yield plain addresses.
///
/// # Errors
/// [`AcpiError::MalformedTable`] if the declared length is below the header
/// size or exceeds the bytes actually present.
pub fn enumerate_entries(table: &[u8], width: EntryWidth) -> Result<Vec<u64>, AcpiError> {
    let header = TableHeader::parse(table)?;
    if header.len() > table.len() {
        return Err(header.malformed());
    }

    let count = header.payload_len() / width.bytes();
    let entries = (0..count)
        .map(|i| read_entry(table, width, i))
        .collect();
    Ok(entries)
}

/// Overwrite slot `index` of the table image `table` with `address`.
///
/// Only the slot changes; the table checksum is left for the caller.
///
/// # Errors
/// [`AcpiError::MalformedTable`] if `index` is not a slot of the table, or
/// [`AcpiError::RelinkInconsistency`] if `address` does not fit a 32-bit slot.
pub fn set_entry(
    table: &mut [u8],
    width: EntryWidth,
    index: usize,
    address: u64,
) -> Result<(), AcpiError> {
    let header = TableHeader::parse(table)?;
    let count = header.payload_len() / width.bytes();
    if index >= count || header.len() > table.len() {
        return Err(header.malformed());
    }

    let offset = HEADER_LEN + index * width.bytes();
    match width {
        EntryWidth::Rsdt => {
            let address = u32::try_from(address).map_err(|_| {
                AcpiError::RelinkInconsistency("table address does not fit an RSDT entry")
            })?;
            table[offset..offset + 4].copy_from_slice(&address.to_le_bytes());
        }
        EntryWidth::Xsdt => {
            table[offset..offset + 8].copy_from_slice(&address.to_le_bytes());
        }
    }
    Ok(())
}

/// Build a copy of the table image `table` with one extra slot holding
/// `address`, its length updated and its checksum recomputed.
///
/// Bytes beyond the last whole entry are dropped.
///
/// # Errors
/// As [`set_entry`].
pub fn append_entry(table: &[u8], width: EntryWidth, address: u64) -> Result<Vec<u8>, AcpiError> {
    let entries = enumerate_entries(table, width)?;
    let used = HEADER_LEN + entries.len() * width.bytes();
    let grown_len = used + width.bytes();
    let length = u32::try_from(grown_len).map_err(|_| {
        AcpiError::RelinkInconsistency("grown table-pointer array exceeds 4 GiB")
    })?;

    let mut grown = Vec::with_capacity(grown_len);
    grown.extend_from_slice(&table[..used]);
    grown.resize(grown_len, 0);
    write_length(&mut grown, length)?;
    set_entry(&mut grown, width, entries.len(), address)?;
    checksum::update(&mut grown, crate::header::CHECKSUM_OFFSET)?;
    Ok(grown)
}

fn read_entry(table: &[u8], width: EntryWidth, index: usize) -> u64 {
    let offset = HEADER_LEN + index * width.bytes();
    match width {
        EntryWidth::Rsdt => u64::from(read_u32(table, offset)),
        EntryWidth::Xsdt => read_u64(table, offset),
    }
}

/// A table-pointer array copied out of firmware memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerArray {
    address: u64,
    width: EntryWidth,
    header: TableHeader,
    image: Vec<u8>,
    entries: Vec<u64>,
}

impl PointerArray {
    /// Read the RSDT or XSDT at `address`.
    ///
    /// # Errors
    /// [`AcpiError::MalformedTable`] if the header does not carry the
    /// signature `width` demands or declares an impossible length;
    /// [`AcpiError::MemoryAccess`] if the table cannot be read.
    pub fn read(
        memory: &impl PhysMemory,
        address: u64,
        width: EntryWidth,
    ) -> Result<Self, AcpiError> {
        let header = TableHeader::parse(&memory.read_vec(address, HEADER_LEN)?)?;
        if !header.matches_signature(width.signature()) {
            return Err(header.malformed());
        }

        let image = memory.read_vec(address, header.len())?;
        let entries = enumerate_entries(&image, width)?;
        Ok(Self {
            address,
            width,
            header,
            image,
            entries,
        })
    }

    #[must_use]
    pub const fn address(&self) -> u64 {
        self.address
    }

    #[must_use]
    pub const fn width(&self) -> EntryWidth {
        self.width
    }

    #[must_use]
    pub const fn header(&self) -> &TableHeader {
        &self.header
    }

    #[must_use]
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    /// The table bytes exactly as read from firmware memory.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    #[must_use]
    pub fn has_valid_checksum(&self) -> bool {
        checksum::is_valid(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(sig: &[u8; 4], width: EntryWidth, entries: &[u64]) -> Vec<u8> {
        let len = HEADER_LEN + entries.len() * width.bytes();
        let mut bytes = vec![0u8; len];
        bytes[..4].copy_from_slice(sig);
        bytes[4..8].copy_from_slice(&u32::try_from(len).unwrap().to_le_bytes());
        bytes[10..16].copy_from_slice(b"ACME01");
        for (i, &e) in entries.iter().enumerate() {
            let off = HEADER_LEN + i * width.bytes();
            match width {
                EntryWidth::Rsdt => {
                    bytes[off..off + 4].copy_from_slice(&u32::try_from(e).unwrap().to_le_bytes());
                }
                EntryWidth::Xsdt => bytes[off..off + 8].copy_from_slice(&e.to_le_bytes()),
            }
        }
        checksum::update(&mut bytes, 9).unwrap();
        bytes
    }

    #[test]
    fn entry_count_follows_length() {
        for k in 0..5u64 {
            let entries: Vec<u64> = (1..=k).map(|i| i * 0x1000).collect();
            let x = table(b"XSDT", EntryWidth::Xsdt, &entries);
            assert_eq!(enumerate_entries(&x, EntryWidth::Xsdt).unwrap(), entries);
            let r = table(b"RSDT", EntryWidth::Rsdt, &entries);
            assert_eq!(enumerate_entries(&r, EntryWidth::Rsdt).unwrap(), entries);
        }
    }

    #[test]
    fn rsdt_entries_are_zero_extended() {
        let r = table(b"RSDT", EntryWidth::Rsdt, &[0xFFFF_FFF0]);
        assert_eq!(
            enumerate_entries(&r, EntryWidth::Rsdt).unwrap(),
            vec![0x0000_0000_FFFF_FFF0]
        );
    }

    #[test]
    fn length_35_is_malformed() {
        let mut r = table(b"RSDT", EntryWidth::Rsdt, &[]);
        r[4..8].copy_from_slice(&35u32.to_le_bytes());
        assert!(matches!(
            enumerate_entries(&r, EntryWidth::Rsdt),
            Err(AcpiError::MalformedTable { length: 35, .. })
        ));
    }

    #[test]
    fn length_past_image_is_malformed() {
        let mut x = table(b"XSDT", EntryWidth::Xsdt, &[0x1000]);
        x[4..8].copy_from_slice(&100u32.to_le_bytes());
        assert!(enumerate_entries(&x, EntryWidth::Xsdt).is_err());
    }

    #[test]
    fn partial_trailing_entry_is_ignored() {
        let mut x = table(b"XSDT", EntryWidth::Xsdt, &[0x1000]);
        x.extend_from_slice(&[0xAA; 4]);
        let len = u32::try_from(x.len()).unwrap();
        x[4..8].copy_from_slice(&len.to_le_bytes());
        assert_eq!(enumerate_entries(&x, EntryWidth::Xsdt).unwrap(), vec![0x1000]);
    }

    #[test]
    fn set_entry_overwrites_one_slot() {
        let mut x = table(b"XSDT", EntryWidth::Xsdt, &[0x1000, 0x2000, 0x3000]);
        set_entry(&mut x, EntryWidth::Xsdt, 1, 0x1_2345_6789).unwrap();
        assert_eq!(
            enumerate_entries(&x, EntryWidth::Xsdt).unwrap(),
            vec![0x1000, 0x1_2345_6789, 0x3000]
        );
        assert!(set_entry(&mut x, EntryWidth::Xsdt, 3, 0x4000).is_err());
    }

    #[test]
    fn rsdt_slot_rejects_high_addresses() {
        let mut r = table(b"RSDT", EntryWidth::Rsdt, &[0x1000]);
        assert!(matches!(
            set_entry(&mut r, EntryWidth::Rsdt, 0, 0x1_0000_0000),
            Err(AcpiError::RelinkInconsistency(_))
        ));
    }

    #[test]
    fn append_grows_by_one_slot_and_stays_valid() {
        let r = table(b"RSDT", EntryWidth::Rsdt, &[0x1000, 0x2000]);
        let grown = append_entry(&r, EntryWidth::Rsdt, 0x9000).unwrap();
        assert_eq!(grown.len(), r.len() + 4);
        assert_eq!(
            enumerate_entries(&grown, EntryWidth::Rsdt).unwrap(),
            vec![0x1000, 0x2000, 0x9000]
        );
        assert!(checksum::is_valid(&grown));
        assert_eq!(&grown[10..16], b"ACME01");
    }
}
