//! Chunk-size probing and cache-bypass hints shared by the Write and Verify
//! Engines.

use std::fs::File;
use std::os::unix::io::AsRawFd;

const MIN_CHUNK_BYTES: u64 = 4 * 1024 * 1024;
const MAX_CHUNK_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_PHYSICAL_BLOCK_SIZE: u64 = 4096;
const DEFAULT_MAX_BLOCKS_PER_WRITE: u64 = 1024;

/// Probes `device`'s physical block size via `DKIOCGETBLOCKSIZE`, falling
/// back to the documented default when the ioctl is unavailable or returns
/// zero.
pub fn probe_physical_block_size(device: &File) -> u64 {
    let mut block_size: u32 = 0;
    // SAFETY: `device` is a valid, open file descriptor; `DKIOCGETBLOCKSIZE`
    // writes exactly one `u32` into `block_size`.
    let rc = unsafe { dkioctl_get_block_size(device.as_raw_fd(), &mut block_size) };
    if rc != 0 || block_size == 0 {
        DEFAULT_PHYSICAL_BLOCK_SIZE
    } else {
        block_size as u64
    }
}

/// Computes the chunk size used by both streaming engines: clamp
/// `physical_block_size * max_blocks_per_write` into `[4 MiB, 16 MiB]`, then
/// round down to a multiple of `physical_block_size`, falling back to 4 MiB
/// if that rounds to zero.
pub fn compute_chunk_size(physical_block_size: u64, max_blocks_per_write: u64) -> u64 {
    let physical_block_size = if physical_block_size == 0 {
        DEFAULT_PHYSICAL_BLOCK_SIZE
    } else {
        physical_block_size
    };
    let max_blocks_per_write = if max_blocks_per_write == 0 {
        DEFAULT_MAX_BLOCKS_PER_WRITE
    } else {
        max_blocks_per_write
    };

    let raw = physical_block_size.saturating_mul(max_blocks_per_write);
    let clamped = raw.clamp(MIN_CHUNK_BYTES, MAX_CHUNK_BYTES);
    let rounded = (clamped / physical_block_size) * physical_block_size;
    if rounded == 0 {
        MIN_CHUNK_BYTES
    } else {
        rounded
    }
}

/// Hints the kernel to bypass filesystem caching for `file`. Failures are
/// non-fatal and logged by the caller; a cache-bypass hint is an
/// optimization, not a correctness requirement.
pub fn hint_bypass_cache(file: &File) {
    // SAFETY: `file`'s raw fd is valid for the duration of this call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
    if rc != 0 {
        tracing::debug!(error = %std::io::Error::last_os_error(), "F_NOCACHE hint failed");
    }
}

/// Hints the kernel to read ahead aggressively on `file` (the source
/// image).
pub fn hint_read_ahead(file: &File) {
    // SAFETY: `file`'s raw fd is valid for the duration of this call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_RDAHEAD, 1) };
    if rc != 0 {
        tracing::debug!(error = %std::io::Error::last_os_error(), "F_RDAHEAD hint failed");
    }
}

const DKIOCGETBLOCKSIZE: libc::c_ulong = 0x40046418;

unsafe fn dkioctl_get_block_size(fd: libc::c_int, out: *mut u32) -> libc::c_int {
    libc::ioctl(fd, DKIOCGETBLOCKSIZE, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_clamps_into_range() {
        assert_eq!(compute_chunk_size(512, 1), MIN_CHUNK_BYTES);
        assert_eq!(compute_chunk_size(4096, 1024), 4 * 1024 * 1024);
    }

    #[test]
    fn chunk_size_is_multiple_of_block_size() {
        let chunk = compute_chunk_size(4096, 4096);
        assert_eq!(chunk % 4096, 0);
        assert!(chunk <= MAX_CHUNK_BYTES);
    }

    #[test]
    fn zero_inputs_fall_back_to_defaults() {
        let chunk = compute_chunk_size(0, 0);
        assert_eq!(chunk % DEFAULT_PHYSICAL_BLOCK_SIZE, 0);
        assert!(chunk >= MIN_CHUNK_BYTES);
    }
}
