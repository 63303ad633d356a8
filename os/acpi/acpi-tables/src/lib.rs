//! # ACPI Table Discovery and Patching
//!
//! This crate discovers the ACPI tables published by platform firmware and
//! replaces (or injects) a single table identified by its 4-byte signature,
//! typically the SLIC (Software Licensing Information Table). The injected
//! table inherits the OEM identifiers of the platform's root tables so that
//! an operating system observes one consistent OEM signature.
//!
//! ## Architecture
//!
//! ```text
//! Boot environment (UEFI configuration table)
//!     ↓
//! RSDP/XSDP (Root System Description Pointer)        rsdp
//!     ↓                    ↓
//! RSDT (32-bit entries)    XSDT (64-bit entries)     sdt
//!     ↓                    ↓
//! TableStack: every table, deduplicated by address    discovery
//!     ↓
//! TableRegistry: RSDT + XSDT as one logical set       registry
//!     ↓
//! patch_tables: locate, prepare, write, relink        patch
//! ```
//!
//! ## Key Components
//!
//! * [`checksum`]: byte-sum arithmetic with single-byte exclusion.
//! * [`header`]: the 36-byte System Description Table header.
//! * [`rsdp`]: the root pointer and its RSDT/XSDT addresses.
//! * [`sdt`]: walking and rewriting the table-pointer arrays.
//! * [`discovery`]: the collection of every discovered table.
//! * [`registry`]: synchronized, all-or-nothing RSDT/XSDT mutation.
//! * [`patch`]: the patch state machine.
//!
//! ## Memory Access
//!
//! Firmware tables live in identity-mapped physical memory owned by the boot
//! environment. The crate never dereferences raw addresses itself; every
//! access goes through the [`PhysMemory`] trait, which copies bytes in and
//! out of bounds-checked buffers. All structure decoding happens on those
//! buffers with explicit little-endian reads at fixed offsets.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use acpi_tables::{AcpiFirmware, PatchOptions, patch_tables};
//!
//! fn inject(firmware: &mut impl AcpiFirmware, slic: &[u8]) {
//!     match patch_tables(firmware, slic, &PatchOptions::default()) {
//!         Ok(report) => log::info!("SLIC installed at {:#x}", report.table_address),
//!         Err(e) => log::error!("SLIC patch failed: {e}"),
//!     }
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod checksum;
pub mod discovery;
mod error;
mod firmware;
pub mod header;
pub mod patch;
pub mod registry;
pub mod rsdp;
pub mod sdt;

pub use discovery::{DiscoveredTable, TableStack, find_all_tables};
pub use error::AcpiError;
pub use firmware::{AcpiFirmware, PhysMemory};
pub use header::{Signature, TableHeader};
pub use patch::{InsertMode, PatchOptions, PatchReport, patch_tables};
pub use registry::{ArrayChange, RelinkOutcome, Slots, TableRegistry};
pub use rsdp::{AcpiRoots, RootPointer};

/// Reads a little-endian `u32` at `offset`. The caller guarantees the bounds.
#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

/// Reads a little-endian `u64` at `offset`. The caller guarantees the bounds.
#[inline]
fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// Renders fixed-width ASCII identifier fields (signatures, OEM ids).
pub(crate) struct Ascii<'a>(pub &'a [u8]);

impl core::fmt::Display for Ascii<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use core::fmt::Write;
        for &b in self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            };
            f.write_char(c)?;
        }
        Ok(())
    }
}
