/// Failure kinds for [`crate::validate_structure`].
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("system area is shorter than the required 16 sectors")]
    SystemBlockTooShort,

    #[error("a volume descriptor sector is shorter than 2048 bytes")]
    SectorTooShort,

    #[error(
        "image is missing one or more required volume descriptors (boot record, primary, terminator)"
    )]
    InvalidRequiredDescriptors,

    #[error("El Torito initial/default entry has an invalid boot indicator (expected 0x88)")]
    InvalidBootIndicator,

    #[error("El Torito validation entry has an invalid signature (expected key 0x55, 0xAA)")]
    InvalidBootSignature,

    #[error("El Torito boot catalog could not be read at the record boot record's catalog LBA")]
    InvalidBootCatalog,

    #[error("image is larger than the target device ({image_bytes}b > {device_bytes}b)")]
    InsufficientDeviceCapacity { image_bytes: u64, device_bytes: u64 },

    #[error("I/O error while reading image: {0}")]
    Io(#[from] std::io::Error),
}
