use std::io::{Read, Seek, SeekFrom};

use crate::boot::{BootInitialEntry, BootValidationEntry};
use crate::descriptor::{DescriptorHeader, DescriptorKind, SECTOR_SIZE, SYSTEM_AREA_SECTORS};
use crate::error::ValidationError;

/// Maximum number of sectors scanned past the system area before giving up
/// on finding all three required descriptors. ISO 9660 images in practice
/// carry only a handful of volume descriptors; this bounds a malformed image
/// from forcing an unbounded scan.
const MAX_DESCRIPTOR_SECTORS: u64 = 64;

#[derive(Default)]
struct SeenDescriptors {
    boot_record_sector: Option<[u8; SECTOR_SIZE]>,
    primary: bool,
    terminator: bool,
}

impl SeenDescriptors {
    fn complete(&self) -> bool {
        self.boot_record_sector.is_some() && self.primary && self.terminator
    }
}

/// Walks the volume descriptors starting at sector 16, confirms a Boot
/// Record, a Primary Volume Descriptor, and a Set Terminator are all
/// present, then validates the El Torito boot catalog reachable from the
/// Boot Record.
pub fn validate_structure<R: Read + Seek>(reader: &mut R) -> Result<(), ValidationError> {
    let total_len = reader.seek(SeekFrom::End(0))?;
    if total_len < SYSTEM_AREA_SECTORS * SECTOR_SIZE as u64 {
        return Err(ValidationError::SystemBlockTooShort);
    }

    let mut seen = SeenDescriptors::default();
    let mut sector_index = SYSTEM_AREA_SECTORS;

    while sector_index < SYSTEM_AREA_SECTORS + MAX_DESCRIPTOR_SECTORS && !seen.complete() {
        reader.seek(SeekFrom::Start(sector_index * SECTOR_SIZE as u64))?;
        let mut sector = [0u8; SECTOR_SIZE];
        let read = read_sector(reader, &mut sector)?;
        if read < SECTOR_SIZE {
            return Err(ValidationError::SectorTooShort);
        }

        let header = DescriptorHeader::parse(&sector);
        if header.is_well_formed() {
            match header.kind {
                DescriptorKind::BootRecord if seen.boot_record_sector.is_none() => {
                    seen.boot_record_sector = Some(sector);
                }
                DescriptorKind::Primary => seen.primary = true,
                DescriptorKind::SetTerminator => seen.terminator = true,
                _ => {}
            }
        }

        sector_index += 1;
    }

    if !seen.complete() {
        tracing::debug!(
            boot_record = seen.boot_record_sector.is_some(),
            primary = seen.primary,
            terminator = seen.terminator,
            "required volume descriptors missing"
        );
        return Err(ValidationError::InvalidRequiredDescriptors);
    }

    // `complete()` guarantees this is `Some`.
    let boot_record_sector = seen.boot_record_sector.expect("boot record sector present");
    validate_boot_catalog(reader, &boot_record_sector)?;

    Ok(())
}

fn validate_boot_catalog<R: Read + Seek>(
    reader: &mut R,
    boot_record_sector: &[u8; SECTOR_SIZE],
) -> Result<(), ValidationError> {
    let catalog_lba = crate::descriptor::read_catalog_ptr(boot_record_sector);
    reader
        .seek(SeekFrom::Start(catalog_lba as u64 * SECTOR_SIZE as u64))
        .map_err(|_| ValidationError::InvalidBootCatalog)?;

    let mut validation_bytes = [0u8; 32];
    reader
        .read_exact(&mut validation_bytes)
        .map_err(|_| ValidationError::InvalidBootCatalog)?;
    let validation = BootValidationEntry::parse(validation_bytes);
    if !validation.has_valid_signature() || !validation.checksum_is_valid() {
        return Err(ValidationError::InvalidBootSignature);
    }

    let mut initial_bytes = [0u8; 32];
    reader
        .read_exact(&mut initial_bytes)
        .map_err(|_| ValidationError::InvalidBootCatalog)?;
    let initial = BootInitialEntry::parse(initial_bytes);
    if !initial.is_bootable() {
        return Err(ValidationError::InvalidBootIndicator);
    }

    Ok(())
}

/// Checks the image does not exceed the target device's capacity. Only
/// meaningful once the device size is known.
pub fn check_capacity(image_bytes: u64, device_bytes: u64) -> Result<(), ValidationError> {
    if image_bytes > device_bytes {
        return Err(ValidationError::InsufficientDeviceCapacity {
            image_bytes,
            device_bytes,
        });
    }
    Ok(())
}

fn read_sector<R: Read>(reader: &mut R, buf: &mut [u8; SECTOR_SIZE]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < SECTOR_SIZE {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::STANDARD_IDENTIFIER;
    use std::io::{Cursor, Write};

    fn blank_image(sectors: u64) -> Vec<u8> {
        vec![0u8; (sectors * SECTOR_SIZE as u64) as usize]
    }

    fn write_descriptor_header(sector: &mut [u8], kind: u8) {
        sector[0] = kind;
        sector[1..6].copy_from_slice(STANDARD_IDENTIFIER);
        sector[6] = 0x01;
    }

    fn build_valid_bootable_image() -> Vec<u8> {
        let mut image = blank_image(20);

        // Boot Record at sector 16, pointing the catalog at sector 19.
        let boot_record = &mut image[16 * SECTOR_SIZE..17 * SECTOR_SIZE];
        write_descriptor_header(boot_record, 0);
        let catalog_ptr_offset = 1 + 5 + 1 + 32 + 32;
        boot_record[catalog_ptr_offset..catalog_ptr_offset + 4]
            .copy_from_slice(&19u32.to_le_bytes());

        // Primary Volume Descriptor at sector 17.
        let pvd = &mut image[17 * SECTOR_SIZE..18 * SECTOR_SIZE];
        write_descriptor_header(pvd, 1);

        // Set Terminator at sector 18.
        let terminator = &mut image[18 * SECTOR_SIZE..19 * SECTOR_SIZE];
        write_descriptor_header(terminator, 255);

        // Boot catalog at sector 19: validation entry + initial entry.
        let mut validation = BootValidationEntry {
            header_id: 1,
            platform_id: 0,
            reserved: [0; 2],
            manufacturer: [0; 24],
            checksum: flashd_common::types::U16::new(0),
            key: [0x55, 0xAA],
        };
        let checksum = validation.calculate_checksum();
        validation.checksum.set(checksum);

        let catalog_sector_start = 19 * SECTOR_SIZE;
        let mut cursor = Cursor::new(&mut image[catalog_sector_start..catalog_sector_start + 64]);
        cursor.write_all(bytemuck::bytes_of(&validation)).unwrap();
        let initial = BootInitialEntry {
            boot_indicator: 0x88,
            boot_media_type: 0,
            load_segment: flashd_common::types::U16::new(0),
            system_type: 0,
            reserved: 0,
            sector_count: flashd_common::types::U16::new(4),
            load_rba: flashd_common::types::U32::new(20),
            selection_criteria: 0,
            vendor_unique: [0; 19],
        };
        cursor.write_all(bytemuck::bytes_of(&initial)).unwrap();

        image
    }

    #[test]
    fn rejects_image_shorter_than_system_area() {
        let mut cursor = Cursor::new(blank_image(10));
        assert!(matches!(
            validate_structure(&mut cursor),
            Err(ValidationError::SystemBlockTooShort)
        ));
    }

    #[test]
    fn rejects_missing_descriptors() {
        let mut cursor = Cursor::new(blank_image(20));
        assert!(matches!(
            validate_structure(&mut cursor),
            Err(ValidationError::InvalidRequiredDescriptors)
        ));
    }

    #[test]
    fn accepts_well_formed_bootable_image() {
        let mut cursor = Cursor::new(build_valid_bootable_image());
        validate_structure(&mut cursor).expect("valid bootable image should pass");
    }

    #[test]
    fn rejects_bad_boot_signature() {
        let mut image = build_valid_bootable_image();
        let catalog_sector_start = 19 * SECTOR_SIZE;
        // Corrupt the validation entry's key bytes.
        image[catalog_sector_start + 30] = 0x00;
        image[catalog_sector_start + 31] = 0x00;
        let mut cursor = Cursor::new(image);
        assert!(matches!(
            validate_structure(&mut cursor),
            Err(ValidationError::InvalidBootSignature)
        ));
    }

    #[test]
    fn rejects_bad_boot_indicator() {
        let mut image = build_valid_bootable_image();
        let catalog_sector_start = 19 * SECTOR_SIZE;
        image[catalog_sector_start + 32] = 0x00; // initial entry boot_indicator
        let mut cursor = Cursor::new(image);
        assert!(matches!(
            validate_structure(&mut cursor),
            Err(ValidationError::InvalidBootIndicator)
        ));
    }

    #[test]
    fn capacity_check_rejects_oversized_image() {
        assert!(check_capacity(2048, 1024).is_err());
        assert!(check_capacity(1024, 2048).is_ok());
    }
}
