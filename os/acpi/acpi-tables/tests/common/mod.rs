#![allow(dead_code)]

use acpi_tables::header::{CHECKSUM_OFFSET, HEADER_LEN};
use acpi_tables::registry::Slots;
use acpi_tables::sdt::{EntryWidth, append_entry};
use acpi_tables::{
    AcpiError, AcpiFirmware, PhysMemory, RootPointer, Signature, TableRegistry, checksum,
};

/// Physical address at which the simulated memory starts.
pub const BASE: u64 = 0x0010_0000;
const SIZE: usize = 256 * 1024;

pub const XSDT_OEM: &[u8; 6] = b"ACME01";
pub const XSDT_TABLE_ID: &[u8; 8] = b"ACMEXSDT";
pub const RSDT_OEM: &[u8; 6] = b"LEGACY";
pub const RSDT_TABLE_ID: &[u8; 8] = b"LEGACYRS";

/// Flat physical memory with a bump allocator, standing in for UEFI.
pub struct FakeFirmware {
    memory: Vec<u8>,
    next_free: u64,
    pub rsdp: Option<u64>,
    /// Allocations left before `allocate` starts failing; `None` is unlimited.
    pub allocation_budget: Option<usize>,
    /// Writes to exactly this address fail.
    pub fail_writes_at: Option<u64>,
    pub reject_registrations: bool,
    /// When registering, link the table into the arrays like real firmware would.
    pub link_on_register: bool,
    /// When registering, link the table into the XSDT but not the RSDT.
    pub link_xsdt_only: bool,
    /// When registering, damage the byte at this offset of the table first.
    pub corrupt_on_register: Option<usize>,
    pub registrations: Vec<(Signature, u64, usize)>,
}

impl FakeFirmware {
    pub fn new() -> Self {
        Self {
            memory: vec![0u8; SIZE],
            next_free: BASE,
            rsdp: None,
            allocation_budget: None,
            fail_writes_at: None,
            reject_registrations: false,
            link_on_register: true,
            link_xsdt_only: false,
            corrupt_on_register: None,
            registrations: Vec::new(),
        }
    }

    fn bump(&mut self, len: usize) -> Option<u64> {
        let addr = self.next_free;
        let end = addr + len as u64;
        if end > BASE + SIZE as u64 {
            return None;
        }
        self.next_free = (end + 15) & !15;
        Some(addr)
    }

    /// Place `bytes` in fresh memory, bypassing the allocation budget.
    pub fn place(&mut self, bytes: &[u8]) -> u64 {
        let addr = self.bump(bytes.len()).expect("simulated memory exhausted");
        self.write(addr, bytes).unwrap();
        addr
    }

    pub fn bytes(&self, address: u64, len: usize) -> &[u8] {
        let start = usize::try_from(address - BASE).unwrap();
        &self.memory[start..start + len]
    }

    /// The full table at `address`, as long as its header declares.
    pub fn table(&self, address: u64) -> &[u8] {
        let len = u32::from_le_bytes(self.bytes(address + 4, 4).try_into().unwrap());
        self.bytes(address, len as usize)
    }

    fn range(&self, address: u64, len: usize) -> Result<core::ops::Range<usize>, AcpiError> {
        let err = AcpiError::MemoryAccess { address, len };
        let start = address.checked_sub(BASE).ok_or(err.clone())?;
        let start = usize::try_from(start).map_err(|_| err.clone())?;
        let end = start.checked_add(len).ok_or(err.clone())?;
        if end > self.memory.len() {
            return Err(err);
        }
        Ok(start..end)
    }
}

impl PhysMemory for FakeFirmware {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), AcpiError> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.memory[range]);
        Ok(())
    }

    fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), AcpiError> {
        if self.fail_writes_at == Some(address) {
            return Err(AcpiError::MemoryAccess {
                address,
                len: bytes.len(),
            });
        }
        let range = self.range(address, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }
}

impl AcpiFirmware for FakeFirmware {
    fn rsdp_address(&self) -> Option<u64> {
        self.rsdp
    }

    fn allocate(&mut self, size: usize) -> Option<u64> {
        match &mut self.allocation_budget {
            Some(0) => return None,
            Some(left) => *left -= 1,
            None => {}
        }
        self.bump(size)
    }

    fn register_table(
        &mut self,
        signature: Signature,
        address: u64,
        length: usize,
    ) -> Result<(), AcpiError> {
        if self.reject_registrations {
            return Err(AcpiError::RegistrationFailure { signature });
        }
        self.registrations.push((signature, address, length));

        if let Some(offset) = self.corrupt_on_register {
            let at = address + offset as u64;
            let mut byte = [0u8];
            self.read(at, &mut byte)?;
            self.write(at, &[byte[0].wrapping_add(1)])?;
        }

        let rsdp = self.rsdp.expect("registering without a root pointer");
        let mut root = RootPointer::read(&*self, rsdp)?;
        let roots = root.roots(rsdp);
        if self.link_xsdt_only {
            let xsdt = roots.xsdt_addr.expect("linking into a missing XSDT");
            let grown = append_entry(self.table(xsdt), EntryWidth::Xsdt, address)?;
            let grown = self.place(&grown);
            root.set_xsdt_address(grown)?;
            root.update_checksums();
            self.write(rsdp, root.as_bytes())?;
        } else if self.link_on_register {
            let registry = TableRegistry::load(&*self, &roots)?;
            registry.relink(self, &root, &roots, &Slots::default(), address)?;
        }
        Ok(())
    }
}

/// A table with a valid checksum and `payload_len` bytes of filler.
pub fn sdt(sig: &[u8; 4], oem_id: &[u8; 6], oem_table_id: &[u8; 8], payload_len: usize) -> Vec<u8> {
    let len = HEADER_LEN + payload_len;
    let mut bytes = vec![0u8; len];
    bytes[..4].copy_from_slice(sig);
    bytes[4..8].copy_from_slice(&u32::try_from(len).unwrap().to_le_bytes());
    bytes[8] = 1;
    bytes[10..16].copy_from_slice(oem_id);
    bytes[16..24].copy_from_slice(oem_table_id);
    bytes[24..28].copy_from_slice(&1u32.to_le_bytes());
    bytes[28..32].copy_from_slice(b"TEST");
    for (i, b) in bytes[HEADER_LEN..].iter_mut().enumerate() {
        *b = (i * 7 + 3) as u8;
    }
    checksum::update(&mut bytes, CHECKSUM_OFFSET).unwrap();
    bytes
}

/// A SLIC payload of exactly `len` bytes.
pub fn slic_payload(len: usize, oem_id: &[u8; 6]) -> Vec<u8> {
    sdt(b"SLIC", oem_id, b"PAYLOADT", len - HEADER_LEN)
}

pub fn pointer_array(width: EntryWidth, oem: (&[u8; 6], &[u8; 8]), entries: &[u64]) -> Vec<u8> {
    let sig = width.signature();
    let mut bytes = sdt(sig.as_bytes(), oem.0, oem.1, entries.len() * width.bytes());
    for (i, &e) in entries.iter().enumerate() {
        let off = HEADER_LEN + i * width.bytes();
        match width {
            EntryWidth::Rsdt => {
                bytes[off..off + 4].copy_from_slice(&u32::try_from(e).unwrap().to_le_bytes());
            }
            EntryWidth::Xsdt => bytes[off..off + 8].copy_from_slice(&e.to_le_bytes()),
        }
    }
    checksum::update(&mut bytes, CHECKSUM_OFFSET).unwrap();
    bytes
}

pub fn rsdp(revision: u8, rsdt: u64, xsdt: u64) -> Vec<u8> {
    let len = if revision >= 2 { 36 } else { 20 };
    let mut bytes = vec![0u8; len];
    bytes[..8].copy_from_slice(b"RSD PTR ");
    bytes[9..15].copy_from_slice(XSDT_OEM);
    bytes[15] = revision;
    bytes[16..20].copy_from_slice(&u32::try_from(rsdt).unwrap().to_le_bytes());
    if revision >= 2 {
        bytes[20..24].copy_from_slice(&36u32.to_le_bytes());
        bytes[24..32].copy_from_slice(&xsdt.to_le_bytes());
    }
    let mut root = RootPointer::parse(bytes).unwrap();
    root.update_checksums();
    root.as_bytes().to_vec()
}

/// Addresses of a simulated platform.
pub struct Platform {
    pub fw: FakeFirmware,
    pub tables: Vec<u64>,
    pub rsdt: Option<u64>,
    pub xsdt: Option<u64>,
    pub rsdp: u64,
}

/// Place `tables`, then an RSDT listing the tables at indices `rsdt` and an
/// XSDT listing those at indices `xsdt`, then the root pointer.
pub fn platform(
    revision: u8,
    tables: &[Vec<u8>],
    rsdt: Option<&[usize]>,
    xsdt: Option<&[usize]>,
) -> Platform {
    let mut fw = FakeFirmware::new();
    let addrs: Vec<u64> = tables.iter().map(|t| fw.place(t)).collect();
    let pick = |idx: &[usize]| idx.iter().map(|&i| addrs[i]).collect::<Vec<_>>();

    let rsdt_addr = rsdt.map(|idx| {
        fw.place(&pointer_array(
            EntryWidth::Rsdt,
            (RSDT_OEM, RSDT_TABLE_ID),
            &pick(idx),
        ))
    });
    let xsdt_addr = xsdt.map(|idx| {
        fw.place(&pointer_array(
            EntryWidth::Xsdt,
            (XSDT_OEM, XSDT_TABLE_ID),
            &pick(idx),
        ))
    });

    let rsdp_addr = fw.place(&rsdp(
        revision,
        rsdt_addr.unwrap_or(0),
        xsdt_addr.unwrap_or(0),
    ));
    fw.rsdp = Some(rsdp_addr);

    Platform {
        fw,
        tables: addrs,
        rsdt: rsdt_addr,
        xsdt: xsdt_addr,
        rsdp: rsdp_addr,
    }
}

/// The current root pointer of `fw`.
pub fn root(fw: &FakeFirmware) -> RootPointer {
    RootPointer::read(fw, fw.rsdp.unwrap()).unwrap()
}
