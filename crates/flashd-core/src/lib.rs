//! Path validation, device acquisition, and the streaming write/verify
//! engines that do the actual flashing.

pub mod chunk;
pub mod device;
#[cfg(target_os = "macos")]
pub mod disk_arbitration;
pub mod error;
pub mod path_validator;
pub mod progress;
pub mod verify_engine;
pub mod write_engine;

pub use device::DeviceDescriptor;
pub use error::{DeviceError, EngineError, PathError};
pub use path_validator::{ImageKind, ValidatedImage};
pub use progress::{VerifyProgress, WriteProgress};
