//! Read-back byte-for-byte comparison of image against device.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::EngineError;
use crate::progress::{ProgressTracker, VerifyProgress};

/// Matches the Write Engine's 100-iteration timer-throttle cadence,
/// applied here to the simpler percent-only verify progress.
const PROGRESS_CHECK_EVERY: u64 = 100;

/// Verifies that the first `image_len` bytes of `device` match `image`,
/// using `chunk_size` (the value returned by [`crate::write_engine::write`]).
pub fn verify(
    image: &mut File,
    device: &mut File,
    image_len: u64,
    chunk_size: u64,
    mut on_progress: impl FnMut(VerifyProgress),
) -> Result<(), EngineError> {
    let mut image_buffer = vec![0u8; chunk_size as usize];
    let mut device_buffer = vec![0u8; chunk_size as usize];

    image.seek(SeekFrom::Start(0)).map_err(EngineError::ReadFailed)?;
    device.seek(SeekFrom::Start(0)).map_err(EngineError::ReadFailed)?;

    let mut bytes_done: u64 = 0;
    let mut iteration: u64 = 0;

    loop {
        let n = read_fully(image, &mut image_buffer).map_err(EngineError::ReadFailed)?;
        if n == 0 {
            break;
        }

        read_exact_from_device(device, &mut device_buffer[..n])?;

        if image_buffer[..n] != device_buffer[..n] {
            return Err(EngineError::MismatchingBytesDetected { offset: bytes_done });
        }

        bytes_done += n as u64;
        iteration += 1;

        let finished = bytes_done >= image_len;
        if iteration % PROGRESS_CHECK_EVERY == 0 || finished {
            let progress = ProgressTracker::verify_progress(bytes_done, image_len);
            on_progress(progress);
        }

        if finished {
            break;
        }
    }

    Ok(())
}

/// Reads exactly `buf.len()` bytes from `device`, looping over short reads.
/// A zero-byte short read mid-loop is `MismatchingBytesDetected`: the
/// device ran out of readable bytes before the image did.
fn read_exact_from_device(device: &mut File, buf: &mut [u8]) -> Result<(), EngineError> {
    let mut filled = 0;
    while filled < buf.len() {
        match device.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(EngineError::MismatchingBytesDetected {
                    offset: filled as u64,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EngineError::ReadFailed(e)),
        }
    }
    Ok(())
}

fn read_fully(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match file.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn fixture(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture");
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn identical_content_verifies_successfully() {
        let data = vec![0x42u8; 3 * 1024 * 1024];
        let (_dir_a, image_path) = fixture(&data);
        let (_dir_b, device_path) = fixture(&data);

        let mut image = File::open(&image_path).unwrap();
        let mut device = File::open(&device_path).unwrap();

        let mut records = Vec::new();
        verify(&mut image, &mut device, data.len() as u64, 1024 * 1024, |p| {
            records.push(p)
        })
        .unwrap();
        assert!(records.last().unwrap().percent == 100);
    }

    #[test]
    fn mismatched_byte_is_detected() {
        let mut data = vec![0x42u8; 2 * 1024 * 1024];
        let (_dir_a, image_path) = fixture(&data);
        data[1_500_000] = 0x43;
        let (_dir_b, device_path) = fixture(&data);

        let mut image = File::open(&image_path).unwrap();
        let mut device = File::open(&device_path).unwrap();

        let result = verify(&mut image, &mut device, data.len() as u64, 1024 * 1024, |_| {});
        assert!(matches!(
            result,
            Err(EngineError::MismatchingBytesDetected { .. })
        ));
    }

    #[test]
    fn truncated_device_is_a_mismatch() {
        let data = vec![0x11u8; 2 * 1024 * 1024];
        let (_dir_a, image_path) = fixture(&data);
        let (_dir_b, device_path) = fixture(&data[..1024]);

        let mut image = File::open(&image_path).unwrap();
        let mut device = File::open(&device_path).unwrap();

        let result = verify(&mut image, &mut device, data.len() as u64, 1024 * 1024, |_| {});
        assert!(matches!(
            result,
            Err(EngineError::MismatchingBytesDetected { .. })
        ));
    }
}
