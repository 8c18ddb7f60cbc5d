//! Block-aligned streaming copy from image file to device.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::chunk::{compute_chunk_size, hint_bypass_cache, hint_read_ahead, probe_physical_block_size};
use crate::error::EngineError;
use crate::progress::{ProgressTracker, WriteProgress};

/// Streams `image` to `device` byte-for-byte, invoking `on_progress` per the
/// dual 8 MiB / 100 ms trigger. Returns the chunk size used, so the Verify
/// Engine can reuse it without re-probing.
pub fn write(
    image: &mut File,
    device: &mut File,
    image_len: u64,
    mut on_progress: impl FnMut(WriteProgress),
) -> Result<u64, EngineError> {
    hint_bypass_cache(device);
    hint_read_ahead(image);

    let physical_block_size = probe_physical_block_size(device);
    let chunk_size = compute_chunk_size(physical_block_size, 1024);
    let mut buffer = vec![0u8; chunk_size as usize];

    image.seek(SeekFrom::Start(0)).map_err(EngineError::ReadFailed)?;
    device.seek(SeekFrom::Start(0)).map_err(EngineError::WriteFailed)?;

    let mut tracker = ProgressTracker::new(image_len);
    let mut bytes_written: u64 = 0;

    loop {
        let n = read_fully(image, &mut buffer).map_err(EngineError::ReadFailed)?;
        if n == 0 {
            break;
        }

        write_all_retrying(device, &buffer[..n]).map_err(EngineError::WriteFailed)?;
        bytes_written += n as u64;

        let finished = bytes_written >= image_len;
        if let Some(progress) = tracker.record(n as u64, finished) {
            on_progress(progress);
        }

        if finished {
            break;
        }
    }

    device.sync_all().map_err(EngineError::SyncFailed)?;

    Ok(chunk_size)
}

/// Reads up to `buf.len()` bytes, retrying on `Interrupted`. Unlike
/// `read_exact`, a short read here is a legitimate EOF signal, not an
/// error — a single `read` call's result is treated as the unit of work.
fn read_fully(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match file.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Writes all of `buf`, retrying short writes until the slice is drained.
fn write_all_retrying(file: &mut File, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        match file.write(buf) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "device accepted zero bytes",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn fixture(size: usize, fill: u8) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture");
        let mut file = File::create(&path).unwrap();
        file.write_all(&vec![fill; size]).unwrap();
        (dir, path)
    }

    #[test]
    fn writes_image_byte_for_byte() {
        let size = 5 * 1024 * 1024;
        let (_dir_a, image_path) = fixture(size, 0xAB);
        let (_dir_b, device_path) = fixture(size, 0x00);

        let mut image = File::open(&image_path).unwrap();
        let mut device = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device_path)
            .unwrap();

        let mut progress_records = Vec::new();
        write(&mut image, &mut device, size as u64, |p| progress_records.push(p)).unwrap();

        let written = std::fs::read(&device_path).unwrap();
        assert_eq!(written, vec![0xABu8; size]);
        assert!(!progress_records.is_empty());
        let last = progress_records.last().unwrap();
        assert_eq!(last.bytes_done, size as u64);
        assert_eq!(last.bytes_done, last.total);
    }

    #[test]
    fn progress_never_exceeds_total() {
        let size = 2 * 1024 * 1024;
        let (_dir_a, image_path) = fixture(size, 0x11);
        let (_dir_b, device_path) = fixture(size, 0x00);

        let mut image = File::open(&image_path).unwrap();
        let mut device = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device_path)
            .unwrap();

        write(&mut image, &mut device, size as u64, |p| {
            assert!(p.percent <= 100);
            assert!(p.bytes_done <= p.total);
        })
        .unwrap();
    }
}
