//! "Both-endian" fields as used by the ISO 9660 Primary Volume Descriptor:
//! certain integer fields are stored twice, once little-endian and once
//! big-endian, back to back. Readers are expected to trust the
//! little-endian half.

use crate::types::endian::{BigEndian, LittleEndian};
use crate::types::number::{U16, U32};

macro_rules! dual_endian {
    ($name:ident, $half:ident, $prim:ty, $size:literal) => {
        #[repr(C)]
        #[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
        pub struct $name {
            le: $half<LittleEndian>,
            be: $half<BigEndian>,
        }

        impl $name {
            pub fn new(value: $prim) -> Self {
                Self {
                    le: $half::new(value),
                    be: $half::new(value),
                }
            }

            /// Returns the value decoded from the little-endian half.
            ///
            /// The big-endian half is not authoritative; a mismatch between
            /// the two halves is tolerated (some tools write malformed
            /// both-endian fields) and is not itself a validation failure.
            pub fn read(&self) -> $prim {
                self.le.get()
            }

            pub fn write(&mut self, value: $prim) {
                self.le.set(value);
                self.be.set(value);
            }

            pub const SIZE: usize = $size;
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.read()).finish()
            }
        }
    };
}

dual_endian!(DualEndian16, U16, u16, 4);
dual_endian!(DualEndian32, U32, u32, 8);
