//! # Boot environment collaborators

use crate::AcpiError;
use crate::header::Signature;
use alloc::vec;
use alloc::vec::Vec;

/// Copy bytes in and out of identity-mapped physical memory.
///
/// Implementors decide what is reachable (all of RAM under UEFI, a simulated
/// region in tests) and must reject anything else with
/// [`AcpiError::MemoryAccess`] instead of touching it.
pub trait PhysMemory {
    /// Fill `buf` with the bytes starting at physical address `address`.
    ///
    /// # Errors
    /// [`AcpiError::MemoryAccess`] if the range is not readable.
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), AcpiError>;

    /// Store `bytes` at physical address `address`.
    ///
    /// # Errors
    /// [`AcpiError::MemoryAccess`] if the range is not writable.
    fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), AcpiError>;

    /// Read `len` bytes starting at `address` into a fresh buffer.
    ///
    /// # Errors
    /// [`AcpiError::MemoryAccess`] if the range is not readable.
    fn read_vec(&self, address: u64, len: usize) -> Result<Vec<u8>, AcpiError> {
        let mut buf = vec![0u8; len];
        self.read(address, &mut buf)?;
        Ok(buf)
    }
}

/// The services the patcher borrows from the boot environment.
pub trait AcpiFirmware: PhysMemory {
    /// Physical address of the RSDP, or `None` if the firmware publishes none.
    fn rsdp_address(&self) -> Option<u64>;

    /// Allocate `size` bytes of table memory that stays valid for the rest
    /// of the boot session. The block must be addressable by a 32-bit RSDT
    /// entry. Returns `None` if no memory is available.
    fn allocate(&mut self, size: usize) -> Option<u64>;

    /// Hand a complete table to the firmware's own table registry, which is
    /// then responsible for linking it into the RSDT and XSDT.
    ///
    /// # Errors
    /// [`AcpiError::RegistrationFailure`] if the firmware rejects the table.
    fn register_table(
        &mut self,
        signature: Signature,
        address: u64,
        length: usize,
    ) -> Result<(), AcpiError>;
}
