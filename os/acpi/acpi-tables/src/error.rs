use crate::header::Signature;

/// Everything that can stop a table discovery or patch run.
///
/// Failures are never retried: they stem from absent firmware structures or
/// exhausted resources, neither of which changes within one boot session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcpiError {
    #[error("no ACPI root pointer is available")]
    RootNotFound,
    #[error("malformed {signature} table (declared length {length})")]
    MalformedTable { signature: Signature, length: u32 },
    #[error("more than {capacity} ACPI tables discovered")]
    DiscoveryOverflow { capacity: usize },
    #[error("failed to allocate {size} bytes of ACPI memory")]
    AllocationFailure { size: usize },
    #[error("RSDT and XSDT could not be kept consistent: {0}")]
    RelinkInconsistency(&'static str),
    #[error("firmware refused to register the {signature} table")]
    RegistrationFailure { signature: Signature },
    #[error("replacement payload rejected: {0}")]
    InvalidPayload(&'static str),
    #[error("{signature} table at {address:#x} fails its checksum")]
    ChecksumMismatch { signature: Signature, address: u64 },
    /// The physical range is not accessible through the memory collaborator.
    #[error("cannot access {len} bytes of physical memory at {address:#x}")]
    MemoryAccess { address: u64, len: usize },
}

#[cfg(feature = "uefi")]
impl From<AcpiError> for uefi::Status {
    fn from(value: AcpiError) -> Self {
        match value {
            AcpiError::RootNotFound => Self::NOT_FOUND,
            AcpiError::MalformedTable { .. } => Self::VOLUME_CORRUPTED,
            AcpiError::DiscoveryOverflow { .. } => Self::BUFFER_TOO_SMALL,
            AcpiError::AllocationFailure { .. } => Self::OUT_OF_RESOURCES,
            AcpiError::RelinkInconsistency(_) => Self::ABORTED,
            AcpiError::RegistrationFailure { .. } => Self::ACCESS_DENIED,
            AcpiError::InvalidPayload(_) => Self::INVALID_PARAMETER,
            AcpiError::ChecksumMismatch { .. } => Self::CRC_ERROR,
            AcpiError::MemoryAccess { .. } => Self::DEVICE_ERROR,
        }
    }
}
