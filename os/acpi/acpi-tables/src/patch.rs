//! # Patch orchestration
//!
//! ```text
//! ResolveRoot → Discover → Locate → Prepare → Write → Relink → Done
//!      └───────────┴──────────┴─────────┴────────┴────────┴──→ Err(AcpiError)
//! ```
//!
//! * **ResolveRoot**: ask the firmware for the root pointer and decode it.
//! * **Discover**: load the RSDT/XSDT and record every table they list.
//! * **Locate**: look for a table already carrying the target signature.
//! * **Prepare**: validate the payload, allocate a block for it and copy it,
//!   taking over the OEM id and OEM table id of the XSDT (or RSDT).
//! * **Write**: fix the checksum and store the block in firmware memory.
//! * **Relink**: point both arrays at the block (or register it), then
//!   re-discover from the root to confirm both arrays agree.
//!
//! Every run starts from scratch: relinking invalidates the addresses the
//! previous discovery recorded.

use crate::discovery::{DiscoveredTable, TableStack};
use crate::header::{CHECKSUM_OFFSET, HEADER_LEN, Signature, TableHeader, write_oem_ids};
use crate::registry::{RelinkOutcome, Slots, TableRegistry, verify_linked};
use crate::{AcpiError, AcpiFirmware, AcpiRoots, RootPointer, checksum};
use alloc::vec::Vec;
use log::{debug, info, warn};

/// What to do when no array lists a table with the target signature yet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Copy the RSDT/XSDT into larger allocations with the table appended.
    #[default]
    GrowTables,
    /// Hand the table to [`AcpiFirmware::register_table`].
    Register,
}

/// Tunables of a patch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOptions {
    /// Signature of the table to replace or inject.
    pub signature: Signature,
    pub insert: InsertMode,
    /// Upper bound on discovered tables; `None` grows as needed.
    pub max_tables: Option<usize>,
    /// Fail on any firmware structure with an invalid checksum (root pointer,
    /// RSDT/XSDT or a listed table) instead of warning.
    pub strict_checksums: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            signature: Signature::SLIC,
            insert: InsertMode::GrowTables,
            max_tables: None,
            strict_checksums: false,
        }
    }
}

/// Result of a successful patch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Physical address of the table the firmware now lists.
    pub table_address: u64,
    pub length: usize,
    /// Address of the table that carried the signature before, if any.
    pub replaced: Option<u64>,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub relink: RelinkOutcome,
}

/// Replace or inject the table in `payload` so that both the RSDT and the
/// XSDT list it, carrying the platform's OEM identifiers.
///
/// # Errors
/// Any [`AcpiError`]; the state reached is logged. A failure before
/// `Relink` leaves the firmware's tables untouched, and `Relink` itself
/// either completes for both arrays or rolls back.
pub fn patch_tables(
    firmware: &mut impl AcpiFirmware,
    payload: &[u8],
    options: &PatchOptions,
) -> Result<PatchReport, AcpiError> {
    let mut state = PatchState::ResolveRoot;
    loop {
        let name = state.name();
        state = match state.advance(firmware, payload, options) {
            Ok(PatchState::Done(report)) => {
                info!(
                    "{} installed at {:#x} ({} bytes, OEM \"{}\" / \"{}\")",
                    options.signature,
                    report.table_address,
                    report.length,
                    crate::Ascii(&report.oem_id),
                    crate::Ascii(&report.oem_table_id)
                );
                return Ok(report);
            }
            Ok(next) => {
                debug!("{name} → {}", next.name());
                next
            }
            Err(e) => {
                warn!("Patching {} failed in {name}: {e}", options.signature);
                return Err(e);
            }
        };
    }
}

/// Everything learned about the firmware's tables before touching them.
struct Platform {
    root: RootPointer,
    roots: AcpiRoots,
    registry: TableRegistry,
}

/// The replacement table, built in local memory.
struct Prepared {
    address: u64,
    image: Vec<u8>,
}

enum PatchState {
    ResolveRoot,
    Discover {
        root: RootPointer,
        roots: AcpiRoots,
    },
    Locate {
        platform: Platform,
        stack: TableStack,
    },
    Prepare {
        platform: Platform,
        slots: Slots,
        existing: Option<DiscoveredTable>,
    },
    Write {
        platform: Platform,
        slots: Slots,
        existing: Option<DiscoveredTable>,
        table: Prepared,
    },
    Relink {
        platform: Platform,
        slots: Slots,
        existing: Option<DiscoveredTable>,
        table: Prepared,
    },
    Done(PatchReport),
}

impl PatchState {
    const fn name(&self) -> &'static str {
        match self {
            Self::ResolveRoot => "ResolveRoot",
            Self::Discover { .. } => "Discover",
            Self::Locate { .. } => "Locate",
            Self::Prepare { .. } => "Prepare",
            Self::Write { .. } => "Write",
            Self::Relink { .. } => "Relink",
            Self::Done(_) => "Done",
        }
    }

    fn advance(
        self,
        firmware: &mut impl AcpiFirmware,
        payload: &[u8],
        options: &PatchOptions,
    ) -> Result<Self, AcpiError> {
        match self {
            Self::ResolveRoot => resolve_root(firmware, options),
            Self::Discover { root, roots } => {
                let registry = TableRegistry::load(firmware, &roots)?;
                if options.strict_checksums
                    && let Some(bad) = registry.arrays().find(|a| !a.has_valid_checksum())
                {
                    return Err(AcpiError::ChecksumMismatch {
                        signature: bad.header().signature,
                        address: bad.address(),
                    });
                }

                let mut stack = options
                    .max_tables
                    .map_or_else(TableStack::new, TableStack::bounded);
                registry.discover_into(firmware, &mut stack)?;
                info!("Discovered {} ACPI tables", stack.len());
                if options.strict_checksums
                    && let Some(bad) = stack.iter().find(|t| !t.checksum_valid)
                {
                    return Err(AcpiError::ChecksumMismatch {
                        signature: bad.header.signature,
                        address: bad.address,
                    });
                }

                Ok(Self::Locate {
                    platform: Platform {
                        root,
                        roots,
                        registry,
                    },
                    stack,
                })
            }
            Self::Locate { platform, stack } => {
                let existing = stack.find_by_signature(options.signature).copied();
                let slots = platform.registry.slots_for(&stack, options.signature);
                match &existing {
                    Some(table) => info!(
                        "Replacing {} at {:#x} (OEM \"{}\")",
                        options.signature,
                        table.address,
                        table.header.oem_id_str()
                    ),
                    None => info!("No {} table present, inserting one", options.signature),
                }
                Ok(Self::Prepare {
                    platform,
                    slots,
                    existing,
                })
            }
            Self::Prepare {
                platform,
                slots,
                existing,
            } => {
                let table = prepare(firmware, &platform, payload, options)?;
                Ok(Self::Write {
                    platform,
                    slots,
                    existing,
                    table,
                })
            }
            Self::Write {
                platform,
                slots,
                existing,
                mut table,
            } => {
                checksum::update(&mut table.image, CHECKSUM_OFFSET)?;
                firmware.write(table.address, &table.image)?;
                Ok(Self::Relink {
                    platform,
                    slots,
                    existing,
                    table,
                })
            }
            Self::Relink {
                platform,
                slots,
                existing,
                table,
            } => relink(firmware, &platform, &slots, existing, &table, options),
            Self::Done(report) => Ok(Self::Done(report)),
        }
    }
}

fn resolve_root(
    firmware: &impl AcpiFirmware,
    options: &PatchOptions,
) -> Result<PatchState, AcpiError> {
    let rsdp_addr = firmware.rsdp_address().ok_or(AcpiError::RootNotFound)?;
    let root = RootPointer::read(firmware, rsdp_addr)?;
    if !root.has_valid_signature() {
        return Err(AcpiError::MalformedTable {
            signature: Signature::from_prefix(root.as_bytes()),
            length: u32::try_from(root.as_bytes().len()).unwrap_or(u32::MAX),
        });
    }

    if !root.has_valid_checksums() {
        if options.strict_checksums {
            return Err(AcpiError::ChecksumMismatch {
                signature: Signature::new(*b"RSD "),
                address: rsdp_addr,
            });
        }
        warn!("RSDP at {rsdp_addr:#x} fails its checksum");
    }

    let roots = root.roots(rsdp_addr);
    debug!(
        "RSDP @ {rsdp_addr:#x}: revision {}, RSDT {:x?}, XSDT {:x?}",
        root.revision(),
        roots.rsdt_addr,
        roots.xsdt_addr
    );
    Ok(PatchState::Discover { root, roots })
}

fn prepare(
    firmware: &mut impl AcpiFirmware,
    platform: &Platform,
    payload: &[u8],
    options: &PatchOptions,
) -> Result<Prepared, AcpiError> {
    if payload.len() < HEADER_LEN {
        return Err(AcpiError::InvalidPayload("shorter than a table header"));
    }
    let header = TableHeader::parse(payload)
        .map_err(|_| AcpiError::InvalidPayload("declared length out of range"))?;
    if !header.matches_signature(options.signature) {
        return Err(AcpiError::InvalidPayload("signature does not match"));
    }
    if header.len() != payload.len() {
        return Err(AcpiError::InvalidPayload(
            "declared length differs from payload size",
        ));
    }

    let source = platform
        .registry
        .oem_source()
        .ok_or(AcpiError::RelinkInconsistency(
            "root pointer lists neither RSDT nor XSDT",
        ))?;

    let address = firmware
        .allocate(payload.len())
        .ok_or(AcpiError::AllocationFailure {
            size: payload.len(),
        })?;

    let mut image = payload.to_vec();
    write_oem_ids(&mut image, &source.oem_id, &source.oem_table_id)?;
    debug!(
        "{} block at {address:#x}: OEM \"{}\" → \"{}\" (from {})",
        options.signature,
        header.oem_id_str(),
        source.oem_id_str(),
        source.signature
    );
    Ok(Prepared { address, image })
}

fn relink(
    firmware: &mut impl AcpiFirmware,
    platform: &Platform,
    slots: &Slots,
    existing: Option<DiscoveredTable>,
    table: &Prepared,
    options: &PatchOptions,
) -> Result<PatchState, AcpiError> {
    let outcome = if slots.is_empty() && options.insert == InsertMode::Register {
        firmware.register_table(options.signature, table.address, table.image.len())?;
        RelinkOutcome::Registered
    } else {
        platform.registry.relink(
            firmware,
            &platform.root,
            &platform.roots,
            slots,
            table.address,
        )?
    };

    // The firmware may have moved the arrays (or, when registering, copied
    // the table), so confirm from the root what the OS will see.
    let linked = verify_linked(firmware, platform.roots.rsdp_addr, options.signature)?;
    let expected = TableHeader::parse(&table.image)?;
    let installed = linked
        .iter()
        .find(|t| t.header.oem_id == expected.oem_id && t.header.oem_table_id == expected.oem_table_id)
        .ok_or(AcpiError::RelinkInconsistency(
            "linked table does not carry the platform OEM id",
        ))?;
    if linked.len() > 1 {
        warn!(
            "{} {} tables are linked after patching",
            linked.len(),
            options.signature
        );
    }

    Ok(PatchState::Done(PatchReport {
        table_address: installed.address,
        length: installed.header.len(),
        replaced: existing.map(|t| t.address),
        oem_id: expected.oem_id,
        oem_table_id: expected.oem_table_id,
        relink: outcome,
    }))
}
