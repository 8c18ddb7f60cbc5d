//! Fixed-offset fields of an ISO 9660 volume descriptor, just enough to
//! identify a descriptor's kind and follow the El Torito boot record to its
//! boot catalog.

use flashd_common::types::{LittleEndian, U32};

pub const SECTOR_SIZE: usize = 2048;
pub const SYSTEM_AREA_SECTORS: u64 = 16;
pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";
pub const SUPPORTED_VERSION: u8 = 0x01;

/// The first byte of a volume descriptor identifies its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    BootRecord,
    Primary,
    SetTerminator,
    Other(u8),
}

impl DescriptorKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::BootRecord,
            1 => Self::Primary,
            255 => Self::SetTerminator,
            other => Self::Other(other),
        }
    }
}

/// The common header shared by every volume descriptor: type byte, standard
/// identifier, and version.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorHeader {
    pub kind: DescriptorKind,
    pub identifier_valid: bool,
    pub version_valid: bool,
}

impl DescriptorHeader {
    /// Parses the header from a full 2048-byte sector buffer.
    pub fn parse(sector: &[u8; SECTOR_SIZE]) -> Self {
        let kind = DescriptorKind::from_byte(sector[0]);
        let identifier_valid = &sector[1..6] == STANDARD_IDENTIFIER;
        let version_valid = sector[6] == SUPPORTED_VERSION;
        Self {
            kind,
            identifier_valid,
            version_valid,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.identifier_valid && self.version_valid
    }
}

/// The offset of the boot catalog LBA within a Boot Record Volume
/// Descriptor's `boot_system_use` area: 1 (type) + 5 (identifier) + 1
/// (version) + 32 (boot_system_identifier) + 32 (boot_identifier).
const CATALOG_PTR_OFFSET: usize = 1 + 5 + 1 + 32 + 32;

/// Reads the El Torito boot catalog pointer out of a Boot Record Volume
/// Descriptor sector.
pub fn read_catalog_ptr(sector: &[u8; SECTOR_SIZE]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&sector[CATALOG_PTR_OFFSET..CATALOG_PTR_OFFSET + 4]);
    U32::<LittleEndian>::new(u32::from_le_bytes(bytes)).get()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector_with(kind: u8, identifier: &[u8; 5], version: u8) -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];
        sector[0] = kind;
        sector[1..6].copy_from_slice(identifier);
        sector[6] = version;
        sector
    }

    #[test]
    fn recognizes_descriptor_kinds() {
        assert_eq!(DescriptorKind::from_byte(0), DescriptorKind::BootRecord);
        assert_eq!(DescriptorKind::from_byte(1), DescriptorKind::Primary);
        assert_eq!(DescriptorKind::from_byte(255), DescriptorKind::SetTerminator);
        assert_eq!(DescriptorKind::from_byte(42), DescriptorKind::Other(42));
    }

    #[test]
    fn header_requires_cd001_and_version_one() {
        let sector = sector_with(1, STANDARD_IDENTIFIER, SUPPORTED_VERSION);
        let header = DescriptorHeader::parse(&sector);
        assert!(header.is_well_formed());

        let sector = sector_with(1, b"XXXXX", SUPPORTED_VERSION);
        assert!(!DescriptorHeader::parse(&sector).is_well_formed());

        let sector = sector_with(1, STANDARD_IDENTIFIER, 0x02);
        assert!(!DescriptorHeader::parse(&sector).is_well_formed());
    }

    #[test]
    fn reads_catalog_ptr_at_fixed_offset() {
        let mut sector = sector_with(0, STANDARD_IDENTIFIER, SUPPORTED_VERSION);
        sector[CATALOG_PTR_OFFSET..CATALOG_PTR_OFFSET + 4].copy_from_slice(&42u32.to_le_bytes());
        assert_eq!(read_catalog_ptr(&sector), 42);
    }
}
