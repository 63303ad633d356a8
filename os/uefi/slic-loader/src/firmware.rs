//! # UEFI-backed ACPI firmware access
//!
//! Boot services run with physical memory identity mapped, so a physical
//! address is a valid pointer as long as the firmware owns the memory behind
//! it. Tables are copied in and out; no reference into firmware memory
//! outlives a call.

use crate::acpi_protocol::install_table;
use acpi_tables::{AcpiError, AcpiFirmware, PhysMemory, Signature};
use log::{debug, error};
use uefi::boot::{self, AllocateType, MemoryType, PAGE_SIZE};

/// Highest address a block may end at; the RSDT holds 32-bit pointers.
const MAX_TABLE_ADDRESS: u64 = 0xFFFF_FFFF;

pub struct UefiFirmware {
    rsdp: Option<u64>,
}

impl UefiFirmware {
    #[must_use]
    pub const fn new(rsdp: Option<u64>) -> Self {
        Self { rsdp }
    }
}

/// Pointer to `len` bytes at `address`, rejecting null and wrapping ranges.
fn checked_ptr(address: u64, len: usize) -> Result<*mut u8, AcpiError> {
    let err = AcpiError::MemoryAccess { address, len };
    let start = usize::try_from(address).map_err(|_| err.clone())?;
    if start == 0 || start.checked_add(len).is_none() {
        return Err(err);
    }
    Ok(core::ptr::with_exposed_provenance_mut(start))
}

impl PhysMemory for UefiFirmware {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), AcpiError> {
        let src = checked_ptr(address, buf.len())?;
        // SAFETY: boot services identity-map physical memory, and ACPI
        // tables live in firmware-reserved memory that is never freed.
        unsafe { core::ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }

    fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), AcpiError> {
        let dst = checked_ptr(address, bytes.len())?;
        // SAFETY: as for `read`; only ACPI structures and blocks handed out
        // by `allocate` are ever written.
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
        Ok(())
    }
}

impl AcpiFirmware for UefiFirmware {
    fn rsdp_address(&self) -> Option<u64> {
        self.rsdp
    }

    fn allocate(&mut self, size: usize) -> Option<u64> {
        let pages = size.div_ceil(PAGE_SIZE).max(1);
        match boot::allocate_pages(
            AllocateType::MaxAddress(MAX_TABLE_ADDRESS),
            MemoryType::ACPI_RECLAIM,
            pages,
        ) {
            Ok(ptr) => {
                let address = ptr.as_ptr() as usize as u64;
                debug!("Allocated {pages} ACPI_RECLAIM page(s) at {address:#x}");
                Some(address)
            }
            Err(e) => {
                error!("Failed to allocate {pages} ACPI_RECLAIM page(s): {e:?}");
                None
            }
        }
    }

    fn register_table(
        &mut self,
        signature: Signature,
        address: u64,
        length: usize,
    ) -> Result<(), AcpiError> {
        let table = self.read_vec(address, length)?;
        match install_table(&table) {
            Ok(key) => {
                debug!("{signature} installed through the ACPI table protocol (key {key:#x})");
                Ok(())
            }
            Err(e) => {
                error!("ACPI table protocol rejected {signature}: {e:?}");
                Err(AcpiError::RegistrationFailure { signature })
            }
        }
    }
}
