//! # System Description Table header
//!
//! Every ACPI table except the RSDP and FACS starts with the same 36-byte
//! header:
//!
//! ```text
//! offset  size  field
//!      0     4  signature
//!      4     4  length (header + payload)
//!      8     1  revision
//!      9     1  checksum
//!     10     6  OEM id
//!     16     8  OEM table id
//!     24     4  OEM revision
//!     28     4  creator id
//!     32     4  creator revision
//! ```
//!
//! This module only interprets the layout. Whether the bytes sum to zero is
//! the [`checksum`](crate::checksum) module's business.

use crate::{AcpiError, Ascii, read_u32};
use core::fmt;

/// Size of the common table header.
pub const HEADER_LEN: usize = 36;

/// Offset of the checksum byte within the header.
pub const CHECKSUM_OFFSET: usize = 9;

/// Largest declared table length accepted before a table is copied out of
/// firmware memory. Real DSDTs stay well below this.
pub const MAX_TABLE_LEN: usize = 16 * 1024 * 1024;

const LENGTH_OFFSET: usize = 4;
const REVISION_OFFSET: usize = 8;
const OEM_ID_OFFSET: usize = 10;
const OEM_TABLE_ID_OFFSET: usize = 16;
const OEM_REVISION_OFFSET: usize = 24;
const CREATOR_ID_OFFSET: usize = 28;
const CREATOR_REVISION_OFFSET: usize = 32;

/// A 4-byte table signature. Compared byte for byte, without case folding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 4]);

impl Signature {
    pub const RSDT: Self = Self(*b"RSDT");
    pub const XSDT: Self = Self(*b"XSDT");
    pub const SLIC: Self = Self(*b"SLIC");
    pub const FACP: Self = Self(*b"FACP");
    pub const DSDT: Self = Self(*b"DSDT");
    pub const APIC: Self = Self(*b"APIC");

    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Best-effort signature of a possibly truncated table, for diagnostics.
    /// Missing bytes read as `?`.
    pub(crate) fn from_prefix(bytes: &[u8]) -> Self {
        let mut sig = [b'?'; 4];
        for (dst, src) in sig.iter_mut().zip(bytes) {
            *dst = *src;
        }
        Self(sig)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ascii(&self.0).fmt(f)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Decoded copy of a table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub signature: Signature,
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub oem_revision: u32,
    pub creator_id: [u8; 4],
    pub creator_revision: u32,
}

impl TableHeader {
    /// Decode the header at the start of `bytes`.
    ///
    /// # Errors
    /// [`AcpiError::MalformedTable`] if fewer than [`HEADER_LEN`] bytes are
    /// given, or if the declared length cannot even hold the header or
    /// exceeds [`MAX_TABLE_LEN`].
    pub fn parse(bytes: &[u8]) -> Result<Self, AcpiError> {
        if bytes.len() < HEADER_LEN {
            return Err(AcpiError::MalformedTable {
                signature: Signature::from_prefix(bytes),
                length: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
            });
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&bytes[..4]);
        let mut oem_id = [0u8; 6];
        oem_id.copy_from_slice(&bytes[OEM_ID_OFFSET..OEM_ID_OFFSET + 6]);
        let mut oem_table_id = [0u8; 8];
        oem_table_id.copy_from_slice(&bytes[OEM_TABLE_ID_OFFSET..OEM_TABLE_ID_OFFSET + 8]);
        let mut creator_id = [0u8; 4];
        creator_id.copy_from_slice(&bytes[CREATOR_ID_OFFSET..CREATOR_ID_OFFSET + 4]);

        let header = Self {
            signature: Signature(signature),
            length: read_u32(bytes, LENGTH_OFFSET),
            revision: bytes[REVISION_OFFSET],
            checksum: bytes[CHECKSUM_OFFSET],
            oem_id,
            oem_table_id,
            oem_revision: read_u32(bytes, OEM_REVISION_OFFSET),
            creator_id,
            creator_revision: read_u32(bytes, CREATOR_REVISION_OFFSET),
        };

        if !(HEADER_LEN..=MAX_TABLE_LEN).contains(&header.len()) {
            return Err(header.malformed());
        }
        Ok(header)
    }

    #[must_use]
    pub fn matches_signature(&self, signature: Signature) -> bool {
        self.signature == signature
    }

    /// Declared table length in bytes, header included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length as usize
    }

    /// Length of the payload following the header.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.len().saturating_sub(HEADER_LEN)
    }

    #[must_use]
    pub const fn checksum_offset(&self) -> usize {
        CHECKSUM_OFFSET
    }

    #[must_use]
    pub fn oem_id_str(&self) -> impl fmt::Display + '_ {
        Ascii(&self.oem_id)
    }

    #[must_use]
    pub fn oem_table_id_str(&self) -> impl fmt::Display + '_ {
        Ascii(&self.oem_table_id)
    }

    pub(crate) const fn malformed(&self) -> AcpiError {
        AcpiError::MalformedTable {
            signature: self.signature,
            length: self.length,
        }
    }
}

/// Overwrite the OEM id and OEM table id of the table image in `bytes`.
///
/// # Errors
/// [`AcpiError::MalformedTable`] if `bytes` is shorter than a header.
pub fn write_oem_ids(
    bytes: &mut [u8],
    oem_id: &[u8; 6],
    oem_table_id: &[u8; 8],
) -> Result<(), AcpiError> {
    ensure_header(bytes)?;
    bytes[OEM_ID_OFFSET..OEM_ID_OFFSET + 6].copy_from_slice(oem_id);
    bytes[OEM_TABLE_ID_OFFSET..OEM_TABLE_ID_OFFSET + 8].copy_from_slice(oem_table_id);
    Ok(())
}

/// Overwrite the declared length of the table image in `bytes`.
///
/// # Errors
/// [`AcpiError::MalformedTable`] if `bytes` is shorter than a header.
pub fn write_length(bytes: &mut [u8], length: u32) -> Result<(), AcpiError> {
    ensure_header(bytes)?;
    bytes[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&length.to_le_bytes());
    Ok(())
}

fn ensure_header(bytes: &[u8]) -> Result<(), AcpiError> {
    if bytes.len() < HEADER_LEN {
        return Err(AcpiError::MalformedTable {
            signature: Signature::from_prefix(bytes),
            length: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
        });
    }
    Ok(())
}
