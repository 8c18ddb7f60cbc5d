//! El Torito boot catalog structures.
//!
//! Layout mirrors the validation/initial entries used by `hadris-iso`'s boot
//! catalog writer, trimmed to the read-only sanity check this crate performs:
//! we only need to confirm the validation signature and the boot indicator,
//! not reconstruct a full catalog.

use flashd_common::types::{LittleEndian, U16};

/// The 32-byte Validation Entry that must be the first record in a boot
/// catalog.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct BootValidationEntry {
    pub header_id: u8,
    pub platform_id: u8,
    pub reserved: [u8; 2],
    pub manufacturer: [u8; 24],
    pub checksum: U16<LittleEndian>,
    /// Must equal `[0x55, 0xAA]`.
    pub key: [u8; 2],
}

impl BootValidationEntry {
    pub fn parse(bytes: [u8; 32]) -> Self {
        bytemuck::cast(bytes)
    }

    /// Validation signature check: key bytes `0x55, 0xAA`.
    pub fn has_valid_signature(&self) -> bool {
        self.key == [0x55, 0xAA]
    }

    pub fn checksum_is_valid(&self) -> bool {
        self.checksum.get() == self.calculate_checksum()
    }

    /// The checksum of the entry (including the checksum field) must sum to
    /// zero modulo 2^16.
    pub(crate) fn calculate_checksum(&self) -> u16 {
        let mut bytes = bytemuck::bytes_of(self).to_vec();
        bytes[28] = 0;
        bytes[29] = 0;
        let mut checksum = 0u16;
        for chunk in bytes.chunks_exact(2) {
            checksum = checksum.wrapping_add(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
        (!checksum).wrapping_add(1)
    }
}

/// The 32-byte Initial/Default Entry that immediately follows the
/// Validation Entry.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct BootInitialEntry {
    /// Must equal `0x88` for a bootable entry, `0x00` otherwise.
    pub boot_indicator: u8,
    pub boot_media_type: u8,
    pub load_segment: U16<LittleEndian>,
    pub system_type: u8,
    pub reserved: u8,
    pub sector_count: U16<LittleEndian>,
    pub load_rba: flashd_common::types::U32<LittleEndian>,
    pub selection_criteria: u8,
    pub vendor_unique: [u8; 19],
}

impl BootInitialEntry {
    pub fn parse(bytes: [u8; 32]) -> Self {
        bytemuck::cast(bytes)
    }

    /// Boot indicator check: `0x88`.
    pub fn is_bootable(&self) -> bool {
        self.boot_indicator == 0x88
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_eq_size!(BootValidationEntry, [u8; 32]);
    static_assertions::assert_eq_size!(BootInitialEntry, [u8; 32]);

    fn validation_entry_bytes(key: [u8; 2]) -> [u8; 32] {
        let mut entry = BootValidationEntry {
            header_id: 1,
            platform_id: 0,
            reserved: [0; 2],
            manufacturer: [0; 24],
            checksum: U16::new(0),
            key,
        };
        let checksum = entry.calculate_checksum();
        entry.checksum.set(checksum);
        bytemuck::cast(entry)
    }

    #[test]
    fn validation_entry_checksum_round_trips() {
        let entry = BootValidationEntry::parse(validation_entry_bytes([0x55, 0xAA]));
        assert!(entry.checksum_is_valid());
        assert!(entry.has_valid_signature());
    }

    #[test]
    fn validation_entry_rejects_wrong_key() {
        let entry = BootValidationEntry::parse(validation_entry_bytes([0x00, 0x00]));
        assert!(!entry.has_valid_signature());
    }

    #[test]
    fn initial_entry_bootable_iff_indicator_0x88() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x88;
        assert!(BootInitialEntry::parse(bytes).is_bootable());

        bytes[0] = 0x00;
        assert!(!BootInitialEntry::parse(bytes).is_bootable());
    }
}
