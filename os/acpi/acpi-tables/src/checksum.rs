//! # ACPI checksum arithmetic
//!
//! Every ACPI structure carries a checksum byte chosen so that all bytes of
//! the structure sum to zero modulo 256. Validating a table sums it whole;
//! computing the byte to store sums it with the checksum byte treated as
//! zero and stores the two's complement.

use crate::AcpiError;
use crate::header::Signature;

/// Sum `bytes` modulo 256, treating the byte at `exclude` (if in range) as zero.
#[must_use]
pub fn checksum(bytes: &[u8], exclude: Option<usize>) -> u8 {
    bytes
        .iter()
        .enumerate()
        .filter(|&(i, _)| Some(i) != exclude)
        .fold(0u8, |acc, (_, &b)| acc.wrapping_add(b))
}

/// The byte that brings a partial sum of `sum` back to zero.
#[must_use]
pub const fn complement(sum: u8) -> u8 {
    0u8.wrapping_sub(sum)
}

/// `true` if the full byte range sums to zero.
#[must_use]
pub fn is_valid(bytes: &[u8]) -> bool {
    checksum(bytes, None) == 0
}

/// Recompute the checksum stored at `offset` so that `bytes` validates.
///
/// # Errors
/// [`AcpiError::MalformedTable`] if `offset` lies outside `bytes`.
pub fn update(bytes: &mut [u8], offset: usize) -> Result<(), AcpiError> {
    if offset >= bytes.len() {
        return Err(AcpiError::MalformedTable {
            signature: Signature::from_prefix(bytes),
            length: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
        });
    }

    bytes[offset] = complement(checksum(bytes, Some(offset)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_byte_counts_as_zero() {
        let bytes = [1u8, 2, 200, 3];
        assert_eq!(checksum(&bytes, None), 206);
        assert_eq!(checksum(&bytes, Some(2)), 6);
        // out of range exclusion excludes nothing
        assert_eq!(checksum(&bytes, Some(17)), 206);
    }

    #[test]
    fn sum_wraps_modulo_256() {
        let bytes = [0xFFu8; 3];
        assert_eq!(checksum(&bytes, None), 0xFD);
    }

    #[test]
    fn complement_of_zero_is_zero() {
        assert_eq!(complement(0), 0);
        assert_eq!(complement(1), 0xFF);
        assert_eq!(complement(0x80), 0x80);
    }

    #[test]
    fn update_makes_table_valid() {
        let mut table: Vec<u8> = (0u8..=120).collect();
        table[9] = 0x5A;
        assert!(!is_valid(&table));

        update(&mut table, 9).unwrap();
        assert!(is_valid(&table));
        assert_eq!(checksum(&table, None), 0);
    }

    #[test]
    fn update_is_stable() {
        let mut table = vec![0x11u8; 64];
        update(&mut table, 9).unwrap();
        let first = table[9];
        update(&mut table, 9).unwrap();
        assert_eq!(table[9], first);
    }

    #[test]
    fn update_rejects_offset_past_end() {
        let mut short = [0u8; 4];
        assert!(matches!(
            update(&mut short, 9),
            Err(AcpiError::MalformedTable { length: 4, .. })
        ));
    }
}
