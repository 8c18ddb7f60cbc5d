/// Errors from [`crate::path_validator::validate`].
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("image path exceeds the maximum allowed length")]
    PathTooLong,

    #[error("image path could not be resolved to a real path: {0}")]
    PathUnresolvable(std::io::Error),

    #[error("image path is not under an allowed directory")]
    PathNotAllowed,

    #[error("could not open the image's parent directory: {0}")]
    DirectoryOpenFailed(std::io::Error),

    #[error("could not open the image file: {0}")]
    FileOpenFailed(std::io::Error),

    #[error("image path does not refer to a regular file")]
    NotRegularFile,

    #[error("image file is smaller than the minimum ISO system area size")]
    FileTooSmall,
}

/// Errors from [`crate::disk_arbitration::acquire`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device BSD name is malformed")]
    DeviceNameMalformed,

    #[error("failed to create a Disk Arbitration session")]
    DASessionCreateFailed,

    #[error("failed to create a disk reference for the given BSD name")]
    DiskRefCreateFailed,

    #[error("disk description dictionary is unavailable")]
    DiskDescriptionUnavailable,

    #[error("the `DeviceInternal` key is missing or not a boolean")]
    InternalDeviceKeyUnavailable,

    #[error("refusing to unmount an internal device")]
    UnmountOnInternalDevice,

    #[error("unmount failed: status {status}, {message}")]
    UnmountFailed { status: i32, message: String },

    #[error("could not open /dev/: {0}")]
    DirectoryOpenFailed(std::io::Error),

    #[error("could not open device: {0}")]
    DeviceOpenFailed(std::io::Error),

    #[error("opened handle does not refer to a block device")]
    NotBlockDevice,

    #[error("refusing to operate on the root filesystem's device")]
    RootFilesystemRefused,
}

/// Errors from the streaming write/verify engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to read from image: {0}")]
    ReadFailed(std::io::Error),

    #[error("failed to write to device: {0}")]
    WriteFailed(std::io::Error),

    #[error("failed to sync device: {0}")]
    SyncFailed(std::io::Error),

    #[error("verification found mismatching bytes at offset {offset}")]
    MismatchingBytesDetected { offset: u64 },
}
