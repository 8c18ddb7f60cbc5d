//! The `DeviceDescriptor` produced by [`crate::disk_arbitration::acquire`].

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::os::unix::io::AsRawFd;

use crate::error::DeviceError;

/// Upper bound on a BSD device name's length, including the `r` prefix
/// variant (e.g. `rdisk99`).
pub const MAX_NAME_BYTES: usize = 16;

/// Sanitizes a caller-supplied BSD name into a fixed-size buffer, mapping
/// non-printable bytes to `.`.
///
/// This does not by itself authorize the name against the `disk<N>` /
/// `rdisk<N>` grammar — that check happens at the request-handler
/// boundary, where `deviceServiceId` context is also available. This
/// function only guarantees a short, printable, separator-free buffer safe
/// to hand to Disk Arbitration.
pub fn sanitize_name(raw: &str) -> Result<String, DeviceError> {
    if raw.is_empty() || raw.len() > MAX_NAME_BYTES || raw.contains('/') {
        return Err(DeviceError::DeviceNameMalformed);
    }
    Ok(raw
        .bytes()
        .map(|b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect())
}

/// A device acquired and validated by [`crate::disk_arbitration`], ready for
/// the Write Engine.
pub struct DeviceDescriptor {
    bsd_name: String,
    handle: File,
}

impl DeviceDescriptor {
    pub(crate) fn new(bsd_name: String, handle: File) -> Self {
        Self { bsd_name, handle }
    }

    pub fn bsd_name(&self) -> &str {
        &self.bsd_name
    }

    pub fn handle(&self) -> &File {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut File {
        &mut self.handle
    }

    /// Confirms the open handle refers to a block device.
    pub fn check_is_block_device(&self) -> Result<(), DeviceError> {
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: `handle` is a valid, open file descriptor for the lifetime of this call.
        let rc = unsafe { libc::fstat(self.handle.as_raw_fd(), &mut stat) };
        if rc != 0 {
            return Err(DeviceError::DeviceOpenFailed(std::io::Error::last_os_error()));
        }
        if stat.st_mode & libc::S_IFMT != libc::S_IFBLK {
            return Err(DeviceError::NotBlockDevice);
        }
        Ok(())
    }

    /// Confirms the device's inode differs from `/`'s inode.
    pub fn check_not_root_filesystem(&self) -> Result<(), DeviceError> {
        let mut device_stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: `handle` is a valid, open file descriptor for the lifetime of this call.
        let rc = unsafe { libc::fstat(self.handle.as_raw_fd(), &mut device_stat) };
        if rc != 0 {
            return Err(DeviceError::DeviceOpenFailed(std::io::Error::last_os_error()));
        }

        let root = std::ffi::CString::new("/").expect("static string has no interior NUL");
        let mut root_stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: `root` is a valid NUL-terminated path and `root_stat` is a valid out-param.
        let rc = unsafe { libc::stat(root.as_ptr(), &mut root_stat) };
        if rc != 0 {
            return Err(DeviceError::DeviceOpenFailed(std::io::Error::last_os_error()));
        }

        if device_stat.st_ino == root_stat.st_ino && device_stat.st_dev == root_stat.st_dev {
            return Err(DeviceError::RootFilesystemRefused);
        }
        Ok(())
    }

    /// Returns the device's total addressable size in bytes, by seeking to
    /// the end and back. Block devices report a zero `st_size` from `stat`,
    /// so this is the portable way to size one.
    pub fn size(&mut self) -> Result<u64, DeviceError> {
        let size = self
            .handle
            .seek(SeekFrom::End(0))
            .map_err(DeviceError::DeviceOpenFailed)?;
        self.handle
            .seek(SeekFrom::Start(0))
            .map_err(DeviceError::DeviceOpenFailed)?;
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_printable_bytes() {
        assert_eq!(sanitize_name("disk4").unwrap(), "disk4");
        assert_eq!(sanitize_name("dis\u{0}k4").unwrap(), "dis.k4");
    }

    #[test]
    fn rejects_path_separators() {
        assert!(matches!(
            sanitize_name("disk/4"),
            Err(DeviceError::DeviceNameMalformed)
        ));
    }

    #[test]
    fn rejects_empty_and_overlong_names() {
        assert!(sanitize_name("").is_err());
        assert!(sanitize_name(&"d".repeat(MAX_NAME_BYTES + 1)).is_err());
    }
}
