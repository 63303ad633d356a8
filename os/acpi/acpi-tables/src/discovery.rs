//! # Table discovery
//!
//! Collects every table reachable from the root pointer, in discovery order.
//! The XSDT is walked before the RSDT, and a table listed by both arrays is
//! recorded once.

use crate::header::{HEADER_LEN, Signature, TableHeader};
use crate::registry::TableRegistry;
use crate::{AcpiError, AcpiRoots, PhysMemory};
use alloc::vec::Vec;
use log::{debug, warn};

/// A table found through the RSDT or XSDT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredTable {
    pub address: u64,
    pub header: TableHeader,
    /// Whether the whole table summed to zero when it was discovered.
    pub checksum_valid: bool,
}

/// Append-only collection of discovered tables.
///
/// Grows as needed unless created with [`TableStack::bounded`], in which case
/// pushing past the bound fails instead of dropping tables.
#[derive(Debug, Default, Clone)]
pub struct TableStack {
    tables: Vec<DiscoveredTable>,
    capacity: Option<usize>,
}

impl TableStack {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: Vec::new(),
            capacity: None,
        }
    }

    /// A stack that refuses to hold more than `capacity` tables.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self {
            tables: Vec::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Record `table` unless its address is already known.
    ///
    /// # Errors
    /// [`AcpiError::DiscoveryOverflow`] if the stack is bounded and full.
    pub fn push(&mut self, table: DiscoveredTable) -> Result<(), AcpiError> {
        if self.contains(table.address) {
            return Ok(());
        }
        if let Some(capacity) = self.capacity
            && self.tables.len() >= capacity
        {
            return Err(AcpiError::DiscoveryOverflow { capacity });
        }
        self.tables.push(table);
        Ok(())
    }

    /// The first table carrying `signature`, in discovery order.
    #[must_use]
    pub fn find_by_signature(&self, signature: Signature) -> Option<&DiscoveredTable> {
        self.tables
            .iter()
            .find(|t| t.header.matches_signature(signature))
    }

    /// The table recorded at `address`, if any.
    #[must_use]
    pub fn get(&self, address: u64) -> Option<&DiscoveredTable> {
        self.tables.iter().find(|t| t.address == address)
    }

    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        self.get(address).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredTable> {
        self.tables.iter()
    }
}

/// Read the header of the table at `address` and record it in `stack`.
///
/// A table failing its checksum is still recorded, with
/// [`DiscoveredTable::checksum_valid`] cleared; rejecting it is up to the caller.
///
/// # Errors
/// [`AcpiError::MemoryAccess`] or [`AcpiError::MalformedTable`] if the table
/// cannot be read, [`AcpiError::DiscoveryOverflow`] if `stack` is full.
pub fn discover_table(
    memory: &impl PhysMemory,
    address: u64,
    stack: &mut TableStack,
) -> Result<(), AcpiError> {
    if stack.contains(address) {
        return Ok(());
    }

    let header = TableHeader::parse(&memory.read_vec(address, HEADER_LEN)?)?;
    let image = memory.read_vec(address, header.len())?;
    let checksum_valid = crate::checksum::is_valid(&image);
    if !checksum_valid {
        warn!(
            "{} table at {address:#x} fails its checksum",
            header.signature
        );
    }

    debug!(
        "{} @ {address:#010x}: len={}, rev={}, oem=\"{}\", table=\"{}\"",
        header.signature,
        header.length,
        header.revision,
        header.oem_id_str(),
        header.oem_table_id_str()
    );
    stack.push(DiscoveredTable {
        address,
        header,
        checksum_valid,
    })
}

/// Walk the arrays published by `roots` and record every table in `stack`.
///
/// # Errors
/// Any error of reading the arrays or their tables; overflow of a bounded
/// `stack` stops discovery with [`AcpiError::DiscoveryOverflow`].
pub fn find_all_tables(
    memory: &impl PhysMemory,
    roots: &AcpiRoots,
    stack: &mut TableStack,
) -> Result<(), AcpiError> {
    TableRegistry::load(memory, roots)?.discover_into(memory, stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(address: u64, sig: &[u8; 4]) -> DiscoveredTable {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(sig);
        bytes[4..8].copy_from_slice(&36u32.to_le_bytes());
        DiscoveredTable {
            address,
            header: TableHeader::parse(&bytes).unwrap(),
            checksum_valid: true,
        }
    }

    #[test]
    fn first_match_wins() {
        let mut stack = TableStack::new();
        stack.push(table(0x1000, b"FACP")).unwrap();
        stack.push(table(0x2000, b"SLIC")).unwrap();
        stack.push(table(0x3000, b"SLIC")).unwrap();

        assert_eq!(
            stack.find_by_signature(Signature::SLIC).map(|t| t.address),
            Some(0x2000)
        );
        assert!(stack.find_by_signature(Signature::APIC).is_none());
    }

    #[test]
    fn duplicate_addresses_are_recorded_once() {
        let mut stack = TableStack::bounded(1);
        stack.push(table(0x1000, b"FACP")).unwrap();
        stack.push(table(0x1000, b"FACP")).unwrap();
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn bounded_stack_reports_overflow() {
        let mut stack = TableStack::bounded(2);
        stack.push(table(0x1000, b"FACP")).unwrap();
        stack.push(table(0x2000, b"APIC")).unwrap();
        assert_eq!(
            stack.push(table(0x3000, b"SLIC")),
            Err(AcpiError::DiscoveryOverflow { capacity: 2 })
        );
        assert_eq!(stack.len(), 2);
        assert!(!stack.contains(0x3000));
    }

    #[test]
    fn unbounded_stack_grows() {
        let mut stack = TableStack::new();
        for i in 0..300u64 {
            stack.push(table(0x1000 + i * 0x100, b"SSDT")).unwrap();
        }
        assert_eq!(stack.len(), 300);
        assert!(!stack.is_empty());
    }
}
