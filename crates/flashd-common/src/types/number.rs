use crate::types::endian::Endianness;
use core::marker::PhantomData;

macro_rules! number_wrapper {
    ($name:ident, $prim:ty, $size:literal, $get:ident, $set:ident) => {
        #[repr(transparent)]
        #[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
        pub struct $name<E: Endianness> {
            bytes: [u8; $size],
            _marker: PhantomData<E>,
        }

        impl<E: Endianness> $name<E> {
            pub fn new(value: $prim) -> Self {
                let mut bytes = [0u8; $size];
                E::$set(value, &mut bytes);
                Self {
                    bytes,
                    _marker: PhantomData,
                }
            }

            pub fn get(&self) -> $prim {
                E::$get(self.bytes)
            }

            pub fn set(&mut self, value: $prim) {
                E::$set(value, &mut self.bytes);
            }
        }

        impl<E: Endianness> core::fmt::Debug for $name<E> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.get()).finish()
            }
        }

        impl<E: Endianness> PartialEq for $name<E> {
            fn eq(&self, other: &Self) -> bool {
                self.get() == other.get()
            }
        }
        impl<E: Endianness> Eq for $name<E> {}
    };
}

number_wrapper!(U16, u16, 2, get_u16, set_u16);
number_wrapper!(U32, u32, 4, get_u32, set_u32);
number_wrapper!(U64, u64, 8, get_u64, set_u64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::endian::{BigEndian, LittleEndian};

    #[test]
    fn le_be_disagree_on_non_palindromic_bytes() {
        let le = U16::<LittleEndian>::new(0x0201);
        let be = U16::<BigEndian>::new(0x0201);
        assert_ne!(le.bytes, be.bytes);
        assert_eq!(le.bytes, [0x01, 0x02]);
        assert_eq!(be.bytes, [0x02, 0x01]);
    }

    #[test]
    fn u16_round_trips() {
        for value in [0u16, 1, 0x1234, 0xffff] {
            assert_eq!(U16::<LittleEndian>::new(value).get(), value);
            assert_eq!(U16::<BigEndian>::new(value).get(), value);
        }
    }

    #[test]
    fn u32_round_trips() {
        for value in [0u32, 1, 0x01020304, 0xffffffff] {
            assert_eq!(U32::<LittleEndian>::new(value).get(), value);
            assert_eq!(U32::<BigEndian>::new(value).get(), value);
        }
    }

    #[test]
    fn u64_round_trips() {
        for value in [0u64, 1, 0x0102030405060708, u64::MAX] {
            assert_eq!(U64::<LittleEndian>::new(value).get(), value);
            assert_eq!(U64::<BigEndian>::new(value).get(), value);
        }
    }
}
