//! # RSDT/XSDT table registry
//!
//! The RSDT and XSDT describe the same set of tables at two pointer widths.
//! [`TableRegistry`] treats them as one logical set: lookups see both arrays,
//! and the only mutation, [`TableRegistry::relink`], plans the new byte image
//! of every structure it touches before writing any of them.
//!
//! ## Relink
//!
//! For each array the firmware published:
//!
//! * slots that pointed at a table with the target signature are overwritten
//!   in place, and the array checksum is recomputed;
//! * an array without such a slot is copied into a fresh allocation one entry
//!   larger, and the root pointer is repointed (both root checksums are
//!   recomputed).
//!
//! Fresh allocations are written first, in-place arrays next and the root
//! pointer last. A failed write restores the original bytes of every
//! in-place structure already written, so the firmware never observes one
//! array updated and the other not.

use crate::discovery::{DiscoveredTable, TableStack, discover_table};
use crate::header::{CHECKSUM_OFFSET, Signature, TableHeader};
use crate::sdt::{EntryWidth, PointerArray, append_entry, set_entry};
use crate::{AcpiError, AcpiFirmware, AcpiRoots, PhysMemory, RootPointer, checksum};
use alloc::vec::Vec;
use log::{debug, error, warn};

/// Slot indices, per array, of the entries that point at one kind of table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Slots {
    pub rsdt: Vec<usize>,
    pub xsdt: Vec<usize>,
}

impl Slots {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rsdt.is_empty() && self.xsdt.is_empty()
    }
}

/// What relinking did to one table-pointer array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayChange {
    /// The listed slots now point at the new table.
    Replaced { slots: Vec<usize> },
    /// The array was copied to `address` with the new table appended.
    Grown { address: u64 },
}

/// How the new table ended up in the firmware's table set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelinkOutcome {
    /// Linked by rewriting the arrays; `None` for an array the firmware lacks.
    Linked {
        rsdt: Option<ArrayChange>,
        xsdt: Option<ArrayChange>,
    },
    /// Handed to the firmware's table-registration service.
    Registered,
}

/// The RSDT and XSDT of one root pointer.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    rsdt: Option<PointerArray>,
    xsdt: Option<PointerArray>,
}

impl TableRegistry {
    /// Read the arrays published by `roots`.
    ///
    /// # Errors
    /// Propagates [`PointerArray::read`] failures.
    pub fn load(memory: &impl PhysMemory, roots: &AcpiRoots) -> Result<Self, AcpiError> {
        let rsdt = roots
            .rsdt_addr
            .map(|addr| PointerArray::read(memory, addr, EntryWidth::Rsdt))
            .transpose()?;
        let xsdt = roots
            .xsdt_addr
            .map(|addr| PointerArray::read(memory, addr, EntryWidth::Xsdt))
            .transpose()?;

        for array in rsdt.iter().chain(xsdt.iter()) {
            if !array.has_valid_checksum() {
                warn!(
                    "{} at {:#x} fails its checksum",
                    array.header().signature,
                    array.address()
                );
            }
        }

        Ok(Self { rsdt, xsdt })
    }

    #[must_use]
    pub const fn rsdt(&self) -> Option<&PointerArray> {
        self.rsdt.as_ref()
    }

    #[must_use]
    pub const fn xsdt(&self) -> Option<&PointerArray> {
        self.xsdt.as_ref()
    }

    /// The present arrays, XSDT first.
    pub fn arrays(&self) -> impl Iterator<Item = &PointerArray> {
        self.xsdt.iter().chain(self.rsdt.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rsdt.is_none() && self.xsdt.is_none()
    }

    /// Header whose OEM identifiers the platform presents: the XSDT's if
    /// there is one, the RSDT's otherwise.
    #[must_use]
    pub fn oem_source(&self) -> Option<&TableHeader> {
        self.arrays().next().map(PointerArray::header)
    }

    /// Record every table referenced by either array in `stack`.
    ///
    /// # Errors
    /// As [`discover_table`].
    pub fn discover_into(
        &self,
        memory: &impl PhysMemory,
        stack: &mut TableStack,
    ) -> Result<(), AcpiError> {
        for array in self.arrays() {
            for (slot, &address) in array.entries().iter().enumerate() {
                if address == 0 {
                    warn!("{} slot {slot} is empty", array.header().signature);
                    continue;
                }
                discover_table(memory, address, stack)?;
            }
        }
        Ok(())
    }

    /// Slots whose table, as recorded in `stack`, carries `signature`.
    #[must_use]
    pub fn slots_for(&self, stack: &TableStack, signature: Signature) -> Slots {
        let matching = |array: &Option<PointerArray>| -> Vec<usize> {
            array.as_ref().map_or_else(Vec::new, |array| {
                array
                    .entries()
                    .iter()
                    .enumerate()
                    .filter(|&(_, &addr)| {
                        stack
                            .get(addr)
                            .is_some_and(|t| t.header.matches_signature(signature))
                    })
                    .map(|(slot, _)| slot)
                    .collect()
            })
        };

        Slots {
            rsdt: matching(&self.rsdt),
            xsdt: matching(&self.xsdt),
        }
    }

    /// Point both arrays at the table at `table`: overwrite `slots` where
    /// present, grow the arrays that have none.
    ///
    /// `root` must be the root pointer located at `roots.rsdp_addr` from
    /// which this registry was loaded.
    ///
    /// # Errors
    /// [`AcpiError::RelinkInconsistency`] if there is no array at all, if an
    /// address does not fit a 32-bit field, or if a write fails (after
    /// rolling back); [`AcpiError::AllocationFailure`] if a grown array
    /// cannot be allocated. Nothing has been written when planning fails.
    pub fn relink(
        &self,
        firmware: &mut impl AcpiFirmware,
        root: &RootPointer,
        roots: &AcpiRoots,
        slots: &Slots,
        table: u64,
    ) -> Result<RelinkOutcome, AcpiError> {
        if self.is_empty() {
            return Err(AcpiError::RelinkInconsistency(
                "root pointer lists neither RSDT nor XSDT",
            ));
        }

        let mut writes = Vec::new();
        let mut new_root = root.clone();

        let rsdt = self
            .rsdt
            .as_ref()
            .map(|array| plan_array(firmware, array, &slots.rsdt, table, &mut new_root, &mut writes))
            .transpose()?;
        let xsdt = self
            .xsdt
            .as_ref()
            .map(|array| plan_array(firmware, array, &slots.xsdt, table, &mut new_root, &mut writes))
            .transpose()?;

        if new_root != *root {
            new_root.update_checksums();
            writes.push(PendingWrite {
                address: roots.rsdp_addr,
                bytes: new_root.as_bytes().to_vec(),
                original: Some(root.as_bytes().to_vec()),
            });
        }

        // Stable: fresh blocks first, in-place structures in planned order.
        writes.sort_by_key(|w| w.original.is_some());
        commit(firmware, &writes)?;

        Ok(RelinkOutcome::Linked { rsdt, xsdt })
    }
}

struct PendingWrite {
    address: u64,
    bytes: Vec<u8>,
    /// Bytes to restore on rollback; `None` for fresh allocations.
    original: Option<Vec<u8>>,
}

fn plan_array(
    firmware: &mut impl AcpiFirmware,
    array: &PointerArray,
    slots: &[usize],
    table: u64,
    root: &mut RootPointer,
    writes: &mut Vec<PendingWrite>,
) -> Result<ArrayChange, AcpiError> {
    let width = array.width();

    if !slots.is_empty() {
        let mut image = array.image().to_vec();
        for &slot in slots {
            set_entry(&mut image, width, slot, table)?;
        }
        checksum::update(&mut image, CHECKSUM_OFFSET)?;
        debug!(
            "{}: replacing slots {slots:?} with {table:#x}",
            array.header().signature
        );
        writes.push(PendingWrite {
            address: array.address(),
            bytes: image,
            original: Some(array.image().to_vec()),
        });
        return Ok(ArrayChange::Replaced {
            slots: slots.to_vec(),
        });
    }

    let grown = append_entry(array.image(), width, table)?;
    let address = firmware
        .allocate(grown.len())
        .ok_or(AcpiError::AllocationFailure { size: grown.len() })?;
    match width {
        EntryWidth::Rsdt => root.set_rsdt_address(address)?,
        EntryWidth::Xsdt => root.set_xsdt_address(address)?,
    }
    debug!(
        "{}: grown to {} bytes at {address:#x}",
        array.header().signature,
        grown.len()
    );
    writes.push(PendingWrite {
        address,
        bytes: grown,
        original: None,
    });
    Ok(ArrayChange::Grown { address })
}

fn commit(memory: &mut impl PhysMemory, writes: &[PendingWrite]) -> Result<(), AcpiError> {
    for (done, write) in writes.iter().enumerate() {
        let Err(e) = memory.write(write.address, &write.bytes) else {
            continue;
        };

        error!("Relink write at {:#x} failed: {e}", write.address);
        for undo in writes[..done].iter().rev() {
            if let Some(original) = &undo.original
                && let Err(e) = memory.write(undo.address, original)
            {
                error!("Rollback at {:#x} failed: {e}", undo.address);
            }
        }
        return Err(AcpiError::RelinkInconsistency(
            "table-pointer update could not be applied",
        ));
    }
    Ok(())
}

/// Re-discover the tables reachable from the root pointer at `rsdp_addr` and
/// return those carrying `signature`, requiring every present array to list
/// exactly the same non-empty set of them, each with a valid checksum.
///
/// # Errors
/// [`AcpiError::RelinkInconsistency`] if an array lacks the table, the
/// arrays disagree or a linked table fails its checksum; any discovery error.
pub fn verify_linked(
    memory: &impl PhysMemory,
    rsdp_addr: u64,
    signature: Signature,
) -> Result<Vec<DiscoveredTable>, AcpiError> {
    let roots = RootPointer::read(memory, rsdp_addr)?.roots(rsdp_addr);
    let registry = TableRegistry::load(memory, &roots)?;
    let mut stack = TableStack::new();
    registry.discover_into(memory, &mut stack)?;

    let linked = |array: &PointerArray| -> Vec<u64> {
        let mut found: Vec<u64> = array
            .entries()
            .iter()
            .copied()
            .filter(|&addr| {
                stack
                    .get(addr)
                    .is_some_and(|t| t.header.matches_signature(signature))
            })
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    };

    let mut sets = registry.arrays().map(linked);
    let Some(expected) = sets.next() else {
        return Err(AcpiError::RelinkInconsistency(
            "root pointer lists neither RSDT nor XSDT",
        ));
    };
    if expected.is_empty() {
        return Err(AcpiError::RelinkInconsistency(
            "table is not referenced after relinking",
        ));
    }
    if sets.any(|other| other != expected) {
        return Err(AcpiError::RelinkInconsistency(
            "RSDT and XSDT reference different tables",
        ));
    }

    let tables: Vec<DiscoveredTable> = expected
        .into_iter()
        .filter_map(|addr| stack.get(addr).copied())
        .collect();
    if let Some(bad) = tables.iter().find(|t| !t.checksum_valid) {
        error!("Linked {signature} at {:#x} fails its checksum", bad.address);
        return Err(AcpiError::RelinkInconsistency(
            "linked table fails its checksum",
        ));
    }
    Ok(tables)
}
