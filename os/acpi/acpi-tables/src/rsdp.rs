//! # RSDP/XSDP (Root/Extended System Description Pointer)
//!
//! ```text
//! offset  size  field                     revision
//!      0     8  "RSD PTR "                all
//!      8     1  checksum (bytes 0..20)    all
//!      9     6  OEM id                    all
//!     15     1  revision                  all
//!     16     4  RSDT address              all
//!     20     4  length                    >= 2
//!     24     8  XSDT address              >= 2
//!     32     1  extended checksum         >= 2
//!     33     3  reserved                  >= 2
//! ```

use crate::checksum::{checksum, complement, is_valid};
use crate::header::Signature;
use crate::{AcpiError, PhysMemory, read_u32, read_u64};
use alloc::vec::Vec;

pub const RSDP_SIGNATURE: &[u8; 8] = b"RSD PTR ";

/// Size of the ACPI 1.0 structure, which is also the range of the first checksum.
pub const RSDP_V1_LEN: usize = 20;

/// Size of the ACPI 2.0 structure.
pub const RSDP_V2_LEN: usize = 36;

/// Longest revision 2 structure `read` accepts.
const RSDP_MAX_LEN: usize = 4096;

const CHECKSUM_OFFSET: usize = 8;
const OEM_ID_OFFSET: usize = 9;
const REVISION_OFFSET: usize = 15;
const RSDT_OFFSET: usize = 16;
const LENGTH_OFFSET: usize = 20;
const XSDT_OFFSET: usize = 24;
const EXT_CHECKSUM_OFFSET: usize = 32;

/// The RSDT/XSDT addresses published by a root pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcpiRoots {
    pub rsdp_addr: u64,
    pub rsdt_addr: Option<u64>,
    pub xsdt_addr: Option<u64>,
}

/// A copy of the root pointer bytes, decoded on access.
///
/// Holds 20 bytes for revision 0/1 and the full declared length for
/// revision 2 and later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPointer {
    bytes: Vec<u8>,
}

impl RootPointer {
    /// Take ownership of a root pointer image.
    ///
    /// # Errors
    /// [`AcpiError::MalformedTable`] if the image is too short for its revision.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, AcpiError> {
        if bytes.len() < RSDP_V1_LEN {
            return Err(malformed(bytes.len()));
        }
        let root = Self { bytes };
        if root.revision() >= 2 && root.bytes.len() < RSDP_V2_LEN {
            return Err(malformed(root.bytes.len()));
        }
        Ok(root)
    }

    /// Copy the root pointer out of physical memory.
    ///
    /// # Errors
    /// [`AcpiError::MemoryAccess`] if the structure cannot be read, or
    /// [`AcpiError::MalformedTable`] if a revision 2 structure declares a
    /// length shorter than 36 bytes or longer than a page.
    pub fn read(memory: &impl PhysMemory, address: u64) -> Result<Self, AcpiError> {
        let v1 = memory.read_vec(address, RSDP_V1_LEN)?;
        if v1[REVISION_OFFSET] < 2 {
            return Self::parse(v1);
        }

        // Need the full v2 structure to learn the declared length.
        let v2 = memory.read_vec(address, RSDP_V2_LEN)?;
        let length = read_u32(&v2, LENGTH_OFFSET) as usize;
        if !(RSDP_V2_LEN..=RSDP_MAX_LEN).contains(&length) {
            return Err(malformed(length));
        }
        if length == RSDP_V2_LEN {
            return Self::parse(v2);
        }
        Self::parse(memory.read_vec(address, length)?)
    }

    #[must_use]
    pub fn has_valid_signature(&self) -> bool {
        &self.bytes[..8] == RSDP_SIGNATURE
    }

    /// `true` if the v1 checksum holds and, for revision 2 and later, the
    /// extended checksum over the full structure holds as well.
    #[must_use]
    pub fn has_valid_checksums(&self) -> bool {
        if !is_valid(&self.bytes[..RSDP_V1_LEN]) {
            return false;
        }
        self.revision() < 2 || is_valid(&self.bytes)
    }

    #[must_use]
    pub fn revision(&self) -> u8 {
        self.bytes[REVISION_OFFSET]
    }

    #[must_use]
    pub fn oem_id(&self) -> [u8; 6] {
        let mut id = [0u8; 6];
        id.copy_from_slice(&self.bytes[OEM_ID_OFFSET..OEM_ID_OFFSET + 6]);
        id
    }

    /// Raw RSDT address field.
    #[must_use]
    pub fn rsdt_field(&self) -> u32 {
        read_u32(&self.bytes, RSDT_OFFSET)
    }

    /// Raw XSDT address field, or `None` for revisions that do not carry one.
    #[must_use]
    pub fn xsdt_field(&self) -> Option<u64> {
        (self.revision() >= 2).then(|| read_u64(&self.bytes, XSDT_OFFSET))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Point the RSDT field at `address`. Checksums are left stale until
    /// [`update_checksums`](Self::update_checksums).
    ///
    /// # Errors
    /// [`AcpiError::RelinkInconsistency`] if `address` exceeds 32 bits.
    pub fn set_rsdt_address(&mut self, address: u64) -> Result<(), AcpiError> {
        let address = u32::try_from(address)
            .map_err(|_| AcpiError::RelinkInconsistency("RSDT address above 4 GiB"))?;
        self.bytes[RSDT_OFFSET..RSDT_OFFSET + 4].copy_from_slice(&address.to_le_bytes());
        Ok(())
    }

    /// Point the XSDT field at `address`.
    ///
    /// # Errors
    /// [`AcpiError::RelinkInconsistency`] if the revision has no XSDT field.
    pub fn set_xsdt_address(&mut self, address: u64) -> Result<(), AcpiError> {
        if self.revision() < 2 {
            return Err(AcpiError::RelinkInconsistency(
                "root pointer revision has no XSDT field",
            ));
        }
        self.bytes[XSDT_OFFSET..XSDT_OFFSET + 8].copy_from_slice(&address.to_le_bytes());
        Ok(())
    }

    /// Recompute the v1 checksum and, for revision 2 and later, the extended
    /// checksum. The extended one covers the v1 checksum byte, so order matters.
    pub fn update_checksums(&mut self) {
        let sum = checksum(&self.bytes[..RSDP_V1_LEN], Some(CHECKSUM_OFFSET));
        self.bytes[CHECKSUM_OFFSET] = complement(sum);

        if self.revision() >= 2 {
            let sum = checksum(&self.bytes, Some(EXT_CHECKSUM_OFFSET));
            self.bytes[EXT_CHECKSUM_OFFSET] = complement(sum);
        }
    }

    /// Resolve both table addresses of this root located at `rsdp_addr`.
    #[must_use]
    pub fn roots(&self, rsdp_addr: u64) -> AcpiRoots {
        AcpiRoots {
            rsdp_addr,
            rsdt_addr: resolve_rsdt(self),
            xsdt_addr: resolve_xsdt(self),
        }
    }
}

/// RSDT address of `root`, absent if the field is zero.
#[must_use]
pub fn resolve_rsdt(root: &RootPointer) -> Option<u64> {
    match root.rsdt_field() {
        0 => None,
        addr => Some(u64::from(addr)),
    }
}

/// XSDT address of `root`; only revision 2 and later carry one, and a zero
/// field counts as absent.
#[must_use]
pub fn resolve_xsdt(root: &RootPointer) -> Option<u64> {
    root.xsdt_field().filter(|&addr| addr != 0)
}

fn malformed(len: usize) -> AcpiError {
    AcpiError::MalformedTable {
        signature: Signature::new(*b"RSD "),
        length: u32::try_from(len).unwrap_or(u32::MAX),
    }
}
