//! Resolves and authorizes image-file paths against a per-user allow-list.
//!
//! A root-privileged helper must never be tricked into opening `/etc/*`,
//! `/dev/*`, or similar. The allow-list and the canonicalize-before-prefix-check
//! ordering below are both load-bearing, not incidental.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::error::PathError;

/// Upper bound on an incoming path's byte length, before any resolution is
/// attempted.
pub const MAX_PATH_BYTES: usize = 4096;

/// Minimum length of a resolved path; guards against degenerate paths like
/// `/` that would otherwise slip past the directory-prefix check.
const MIN_RESOLVED_PATH_BYTES: usize = 8;

/// System area plus one byte: the minimum plausible size of an image file.
const MIN_IMAGE_BYTES: u64 = 16 * 2048 + 1;

const ALLOWED_SUBDIRS: [&str; 3] = ["Downloads", "Documents", "Desktop"];

/// The image kind, inferred from its file extension. `Iso` images are
/// eligible for the structural sanity check; other kinds are flashed as
/// opaque byte streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Iso,
    Img,
    Other,
}

impl ImageKind {
    fn classify(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("iso") => Self::Iso,
            Some(ext) if ext.eq_ignore_ascii_case("img") => Self::Img,
            _ => Self::Other,
        }
    }
}

/// A resolved, opened, and authorized image file.
pub struct ValidatedImage {
    pub absolute_path: PathBuf,
    pub file: std::fs::File,
    pub len: u64,
    pub kind: ImageKind,
}

/// Validates `image_path` against the allow-list rooted at `user_home`,
/// opening the file exclusively on success.
///
/// `user_home` is expected to come from the authenticated peer's identity,
/// never from the helper process's own environment.
pub fn validate(image_path: &Path, user_home: &Path) -> Result<ValidatedImage, PathError> {
    if image_path.as_os_str().len() > MAX_PATH_BYTES {
        return Err(PathError::PathTooLong);
    }

    let real_path = image_path
        .canonicalize()
        .map_err(PathError::PathUnresolvable)?;

    if real_path.as_os_str().len() < MIN_RESOLVED_PATH_BYTES {
        return Err(PathError::PathNotAllowed);
    }

    let allow_list = build_allow_list(user_home);
    let parent = real_path.parent().ok_or(PathError::PathNotAllowed)?;
    if !allow_list.iter().any(|allowed| parent.starts_with(allowed)) {
        return Err(PathError::PathNotAllowed);
    }

    let parent_handle = open_dir_no_follow(parent).map_err(PathError::DirectoryOpenFailed)?;
    let file_name = real_path
        .file_name()
        .ok_or(PathError::PathNotAllowed)?
        .to_owned();
    let file = open_exclusive_readonly(&parent_handle, file_name.as_ref())
        .map_err(PathError::FileOpenFailed)?;

    let metadata = file.metadata().map_err(PathError::FileOpenFailed)?;
    if !metadata.is_file() {
        return Err(PathError::NotRegularFile);
    }
    if metadata.len() < MIN_IMAGE_BYTES {
        return Err(PathError::FileTooSmall);
    }

    let kind = ImageKind::classify(&real_path);

    Ok(ValidatedImage {
        absolute_path: real_path,
        file,
        len: metadata.len(),
        kind,
    })
}

fn build_allow_list(user_home: &Path) -> Vec<PathBuf> {
    ALLOWED_SUBDIRS
        .iter()
        .filter_map(|subdir| user_home.join(subdir).canonicalize().ok())
        .collect()
}

fn open_dir_no_follow(dir: &Path) -> io::Result<std::fs::File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW | libc::O_DIRECTORY)
        .open(dir)
}

/// Opens `name` relative to the already-opened parent directory, with an
/// exclusive advisory lock and read-only access. `openat` semantics are
/// approximated here via `/dev/fd/<n>/<name>`, which the kernel resolves
/// relative to the open directory descriptor without a second path lookup
/// from the filesystem root.
fn open_exclusive_readonly(parent: &std::fs::File, name: &std::ffi::OsStr) -> io::Result<std::fs::File> {
    use std::os::unix::io::AsRawFd;

    let fd_path = PathBuf::from(format!("/dev/fd/{}", parent.as_raw_fd()));
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW)
        .open(fd_path.join(name))?;

    // SAFETY: `file`'s raw fd is valid for the duration of this call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_home() -> tempfile::TempDir {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join("Downloads")).unwrap();
        std::fs::create_dir(home.path().join("Documents")).unwrap();
        std::fs::create_dir(home.path().join("Desktop")).unwrap();
        home
    }

    fn write_fake_image(path: &Path, size: u64) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(&vec![0xABu8; size as usize]).unwrap();
    }

    #[test]
    fn accepts_file_under_allow_listed_directory() {
        let home = make_home();
        let image_path = home.path().join("Downloads").join("test.iso");
        write_fake_image(&image_path, MIN_IMAGE_BYTES);

        let validated = validate(&image_path, home.path()).expect("path should validate");
        assert_eq!(validated.len, MIN_IMAGE_BYTES);
        assert_eq!(validated.kind, ImageKind::Iso);
    }

    #[test]
    fn classifies_by_extension() {
        let home = make_home();
        let image_path = home.path().join("Documents").join("raw.img");
        write_fake_image(&image_path, MIN_IMAGE_BYTES);

        let validated = validate(&image_path, home.path()).expect("path should validate");
        assert_eq!(validated.kind, ImageKind::Img);
    }

    #[test]
    fn rejects_file_outside_allow_list() {
        let home = make_home();
        let outside = tempfile::tempdir().unwrap();
        let image_path = outside.path().join("test.iso");
        write_fake_image(&image_path, MIN_IMAGE_BYTES);

        assert!(matches!(
            validate(&image_path, home.path()),
            Err(PathError::PathNotAllowed)
        ));
    }

    #[test]
    fn rejects_undersized_file() {
        let home = make_home();
        let image_path = home.path().join("Documents").join("tiny.iso");
        write_fake_image(&image_path, 512);

        assert!(matches!(
            validate(&image_path, home.path()),
            Err(PathError::FileTooSmall)
        ));
    }

    #[test]
    fn rejects_overlong_path() {
        let home = make_home();
        let long_name = "a".repeat(MAX_PATH_BYTES + 1);
        let image_path = home.path().join("Downloads").join(long_name);

        assert!(matches!(
            validate(&image_path, home.path()),
            Err(PathError::PathTooLong)
        ));
    }

    #[test]
    fn rejects_missing_file() {
        let home = make_home();
        let image_path = home.path().join("Desktop").join("missing.iso");

        assert!(matches!(
            validate(&image_path, home.path()),
            Err(PathError::PathUnresolvable(_))
        ));
    }
}
