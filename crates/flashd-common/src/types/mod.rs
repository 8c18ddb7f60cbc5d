pub mod dual_endian;
pub mod endian;
pub mod number;

pub use dual_endian::{DualEndian16, DualEndian32};
pub use endian::{BigEndian, Endianness, LittleEndian, NativeEndian};
pub use number::{U16, U32, U64};
