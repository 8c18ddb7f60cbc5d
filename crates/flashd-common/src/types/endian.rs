//! Endianness markers used as the type parameter of [`crate::types::number::U16`] /
//! [`crate::types::number::U32`] / [`crate::types::number::U64`].

/// A trait that represents the endianness of a number wrapper at compile time.
pub trait Endianness: Copy + Sized {
    fn get_u16(bytes: [u8; 2]) -> u16;
    fn set_u16(value: u16, bytes: &mut [u8; 2]);
    fn get_u32(bytes: [u8; 4]) -> u32;
    fn set_u32(value: u32, bytes: &mut [u8; 4]);
    fn get_u64(bytes: [u8; 8]) -> u64;
    fn set_u64(value: u64, bytes: &mut [u8; 8]);
}

/// Zero-sized marker for the host's native endianness.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, bytemuck::Zeroable, bytemuck::Pod)]
pub struct NativeEndian;

/// Zero-sized marker for little-endian fields.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, bytemuck::Zeroable, bytemuck::Pod)]
pub struct LittleEndian;

/// Zero-sized marker for big-endian fields.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, bytemuck::Zeroable, bytemuck::Pod)]
pub struct BigEndian;

impl Endianness for NativeEndian {
    #[inline]
    fn get_u16(bytes: [u8; 2]) -> u16 {
        u16::from_ne_bytes(bytes)
    }
    #[inline]
    fn set_u16(value: u16, bytes: &mut [u8; 2]) {
        *bytes = value.to_ne_bytes();
    }
    #[inline]
    fn get_u32(bytes: [u8; 4]) -> u32 {
        u32::from_ne_bytes(bytes)
    }
    #[inline]
    fn set_u32(value: u32, bytes: &mut [u8; 4]) {
        *bytes = value.to_ne_bytes();
    }
    #[inline]
    fn get_u64(bytes: [u8; 8]) -> u64 {
        u64::from_ne_bytes(bytes)
    }
    #[inline]
    fn set_u64(value: u64, bytes: &mut [u8; 8]) {
        *bytes = value.to_ne_bytes();
    }
}

impl Endianness for LittleEndian {
    #[inline]
    fn get_u16(bytes: [u8; 2]) -> u16 {
        u16::from_le_bytes(bytes)
    }
    #[inline]
    fn set_u16(value: u16, bytes: &mut [u8; 2]) {
        *bytes = value.to_le_bytes();
    }
    #[inline]
    fn get_u32(bytes: [u8; 4]) -> u32 {
        u32::from_le_bytes(bytes)
    }
    #[inline]
    fn set_u32(value: u32, bytes: &mut [u8; 4]) {
        *bytes = value.to_le_bytes();
    }
    #[inline]
    fn get_u64(bytes: [u8; 8]) -> u64 {
        u64::from_le_bytes(bytes)
    }
    #[inline]
    fn set_u64(value: u64, bytes: &mut [u8; 8]) {
        *bytes = value.to_le_bytes();
    }
}

impl Endianness for BigEndian {
    #[inline]
    fn get_u16(bytes: [u8; 2]) -> u16 {
        u16::from_be_bytes(bytes)
    }
    #[inline]
    fn set_u16(value: u16, bytes: &mut [u8; 2]) {
        *bytes = value.to_be_bytes();
    }
    #[inline]
    fn get_u32(bytes: [u8; 4]) -> u32 {
        u32::from_be_bytes(bytes)
    }
    #[inline]
    fn set_u32(value: u32, bytes: &mut [u8; 4]) {
        *bytes = value.to_be_bytes();
    }
    #[inline]
    fn get_u64(bytes: [u8; 8]) -> u64 {
        u64::from_be_bytes(bytes)
    }
    #[inline]
    fn set_u64(value: u64, bytes: &mut [u8; 8]) {
        *bytes = value.to_be_bytes();
    }
}
