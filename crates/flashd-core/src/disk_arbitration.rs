//! Disk Arbitration–mediated device acquisition.
//!
//! The state machine is `Idle → SessionCreated → DiskRefCreated →
//! DescriptionCopied → InternalnessChecked → UnmountInFlight → (Success |
//! Dissented)`. Every state owns a scoped resource that is released on every
//! exit path; Rust's ordinary drop order does the releasing, so the "state
//! machine" below is really a sequence of RAII guards rather than an
//! explicit enum.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::raw::{c_char, c_void};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::sync::mpsc;
use std::time::Duration;

use core_foundation::base::{CFRelease, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_foundation::string::CFString;

use crate::device::{sanitize_name, DeviceDescriptor};
use crate::error::DeviceError;

#[allow(non_camel_case_types)]
type DASessionRef = *mut c_void;
#[allow(non_camel_case_types)]
type DADiskRef = *mut c_void;
#[allow(non_camel_case_types)]
type DADissenterRef = *mut c_void;
#[allow(non_camel_case_types)]
type CFRunLoopRef = *mut c_void;
#[allow(non_camel_case_types)]
type CFAllocatorRef = *const c_void;
#[allow(non_camel_case_types)]
type CFStringRef = *const c_void;
#[allow(non_camel_case_types)]
type CFDictionaryRef = *const c_void;

const DA_UNMOUNT_OPTION_WHOLE: u32 = 1 << 1;

#[link(name = "DiskArbitration", kind = "framework")]
extern "C" {
    fn DASessionCreate(allocator: CFAllocatorRef) -> DASessionRef;
    fn DASessionScheduleWithRunLoop(
        session: DASessionRef,
        run_loop: CFRunLoopRef,
        run_loop_mode: CFStringRef,
    );
    fn DASessionUnscheduleFromRunLoop(
        session: DASessionRef,
        run_loop: CFRunLoopRef,
        run_loop_mode: CFStringRef,
    );
    fn DADiskCreateFromBSDName(
        allocator: CFAllocatorRef,
        session: DASessionRef,
        bsd_name: *const c_char,
    ) -> DADiskRef;
    fn DADiskCopyDescription(disk: DADiskRef) -> CFDictionaryRef;
    fn DADiskUnmount(
        disk: DADiskRef,
        options: u32,
        callback: extern "C" fn(disk: DADiskRef, dissenter: DADissenterRef, context: *mut c_void),
        context: *mut c_void,
    );
    fn DADiskEject(
        disk: DADiskRef,
        options: u32,
        callback: extern "C" fn(disk: DADiskRef, dissenter: DADissenterRef, context: *mut c_void),
        context: *mut c_void,
    );
    fn DADissenterGetStatus(dissenter: DADissenterRef) -> i32;
    fn DADissenterGetStatusString(dissenter: DADissenterRef) -> CFStringRef;
}

/// Acquires a removable block device exclusively. On
/// return, `device.handle()` holds an exclusive lock on `/dev/<bsd_name>`.
pub fn acquire(bsd_name_raw: &str) -> Result<DeviceDescriptor, DeviceError> {
    let bsd_name = sanitize_name(bsd_name_raw)?;

    // SessionCreated.
    let session = unsafe { DASessionCreate(std::ptr::null()) };
    if session.is_null() {
        return Err(DeviceError::DASessionCreateFailed);
    }
    let _session_guard = SessionGuard(session);

    let run_loop = CFRunLoop::get_current();
    unsafe {
        DASessionScheduleWithRunLoop(
            session,
            run_loop.as_concrete_TypeRef() as CFRunLoopRef,
            kCFRunLoopDefaultMode as CFStringRef,
        );
    }
    let _schedule_guard = ScheduleGuard {
        session,
        run_loop: run_loop.as_concrete_TypeRef() as CFRunLoopRef,
    };

    // DiskRefCreated.
    let bsd_name_c = CString::new(bsd_name.as_str()).map_err(|_| DeviceError::DeviceNameMalformed)?;
    let disk = unsafe { DADiskCreateFromBSDName(std::ptr::null(), session, bsd_name_c.as_ptr()) };
    if disk.is_null() {
        return Err(DeviceError::DiskRefCreateFailed);
    }
    let _disk_guard = DiskGuard(disk);

    // DescriptionCopied.
    let description_ref = unsafe { DADiskCopyDescription(disk) };
    if description_ref.is_null() {
        return Err(DeviceError::DiskDescriptionUnavailable);
    }
    let description: CFDictionary<CFString, CFTypeRef> =
        unsafe { CFDictionary::wrap_under_create_rule(description_ref as _) };

    // InternalnessChecked.
    check_not_internal(&description)?;

    // UnmountInFlight → (Success | Dissented).
    unmount_whole_disk(disk)?;

    // Open the sanitized device node exclusively.
    open_device(&bsd_name)
}

fn check_not_internal(description: &CFDictionary<CFString, CFTypeRef>) -> Result<(), DeviceError> {
    let key = CFString::new("DeviceInternal");
    let value = description
        .find(&key)
        .ok_or(DeviceError::InternalDeviceKeyUnavailable)?;

    let is_internal = unsafe {
        let boolean = CFBoolean::wrap_under_get_rule(*value as _);
        bool::from(boolean)
    };

    if is_internal {
        return Err(DeviceError::UnmountOnInternalDevice);
    }
    Ok(())
}

enum UnmountOutcome {
    Success,
    Dissented { status: i32, message: String },
}

extern "C" fn unmount_completion(_disk: DADiskRef, dissenter: DADissenterRef, context: *mut c_void) {
    // SAFETY: `context` was set to a leaked `Sender<UnmountOutcome>` boxed
    // pointer by `unmount_whole_disk`/`eject`, and this callback fires
    // exactly once. `dissenter` is a "Get"-rule reference borrowed for the
    // duration of this callback only: not owned by us, not to be released,
    // and not valid to read after we return, so any status/message it
    // carries must be copied out here.
    let sender = unsafe { Box::from_raw(context as *mut mpsc::Sender<UnmountOutcome>) };
    let outcome = if dissenter.is_null() {
        UnmountOutcome::Success
    } else {
        let status = unsafe { DADissenterGetStatus(dissenter) };
        let message = unsafe {
            let string_ref = DADissenterGetStatusString(dissenter);
            if string_ref.is_null() {
                String::new()
            } else {
                CFString::wrap_under_get_rule(string_ref as _).to_string()
            }
        };
        UnmountOutcome::Dissented { status, message }
    };
    let _ = sender.send(outcome);
}

/// Issues an asynchronous whole-device unmount and blocks on a one-shot
/// channel until the completion callback fires: submit the async
/// operation, then block on a one-shot signal rather than spinning the
/// run loop.
fn unmount_whole_disk(disk: DADiskRef) -> Result<(), DeviceError> {
    let (tx, rx) = mpsc::channel::<UnmountOutcome>();
    let context = Box::into_raw(Box::new(tx)) as *mut c_void;

    unsafe {
        DADiskUnmount(disk, DA_UNMOUNT_OPTION_WHOLE, unmount_completion, context);
    }

    wait_for_dissenter(rx).map_err(|(status, message)| DeviceError::UnmountFailed { status, message })
}

/// Issues an asynchronous whole-device eject and blocks the same way
/// `unmount_whole_disk` does. Eject must run after the exclusive device
/// handle is closed — the platform refuses to eject a device still held
/// open — so this is a separate operation the caller drives explicitly.
pub fn eject(bsd_name_raw: &str) -> Result<(), DeviceError> {
    let bsd_name = sanitize_name(bsd_name_raw)?;

    let session = unsafe { DASessionCreate(std::ptr::null()) };
    if session.is_null() {
        return Err(DeviceError::DASessionCreateFailed);
    }
    let _session_guard = SessionGuard(session);

    let run_loop = CFRunLoop::get_current();
    unsafe {
        DASessionScheduleWithRunLoop(
            session,
            run_loop.as_concrete_TypeRef() as CFRunLoopRef,
            kCFRunLoopDefaultMode as CFStringRef,
        );
    }
    let _schedule_guard = ScheduleGuard {
        session,
        run_loop: run_loop.as_concrete_TypeRef() as CFRunLoopRef,
    };

    let bsd_name_c = CString::new(bsd_name.as_str()).map_err(|_| DeviceError::DeviceNameMalformed)?;
    let disk = unsafe { DADiskCreateFromBSDName(std::ptr::null(), session, bsd_name_c.as_ptr()) };
    if disk.is_null() {
        return Err(DeviceError::DiskRefCreateFailed);
    }
    let _disk_guard = DiskGuard(disk);

    let (tx, rx) = mpsc::channel::<UnmountOutcome>();
    let context = Box::into_raw(Box::new(tx)) as *mut c_void;
    unsafe {
        DADiskEject(disk, 0, unmount_completion, context);
    }

    wait_for_dissenter(rx).map_err(|(status, message)| DeviceError::UnmountFailed { status, message })
}

/// Blocks on `rx` for the dissenter outcome, pumping the scheduled run loop
/// in between so the completion callback has a chance to fire.
fn wait_for_dissenter(rx: mpsc::Receiver<UnmountOutcome>) -> Result<(), (i32, String)> {
    loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(UnmountOutcome::Success) => return Ok(()),
            Ok(UnmountOutcome::Dissented { status, message }) => return Err((status, message)),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err((0, "completion callback never fired".to_owned()))
            }
        }
        CFRunLoop::run_current_in_mode(
            unsafe { kCFRunLoopDefaultMode },
            Duration::from_millis(50),
            true,
        );
    }
}

fn open_device(bsd_name: &str) -> Result<DeviceDescriptor, DeviceError> {
    let dev_dir = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW | libc::O_DIRECTORY)
        .open("/dev")
        .map_err(DeviceError::DirectoryOpenFailed)?;

    let fd_path = std::path::PathBuf::from(format!("/dev/fd/{}", dev_dir.as_raw_fd()));
    let handle = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOFOLLOW)
        .open(fd_path.join(bsd_name))
        .map_err(DeviceError::DeviceOpenFailed)?;

    // SAFETY: `handle`'s raw fd is valid for the duration of this call.
    let rc = unsafe { libc::flock(handle.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(DeviceError::DeviceOpenFailed(std::io::Error::last_os_error()));
    }

    let descriptor = DeviceDescriptor::new(bsd_name.to_owned(), handle);
    descriptor.check_is_block_device()?;
    descriptor.check_not_root_filesystem()?;
    Ok(descriptor)
}

struct SessionGuard(DASessionRef);
impl Drop for SessionGuard {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) };
    }
}

struct ScheduleGuard {
    session: DASessionRef,
    run_loop: CFRunLoopRef,
}
impl Drop for ScheduleGuard {
    fn drop(&mut self) {
        unsafe {
            DASessionUnscheduleFromRunLoop(self.session, self.run_loop, kCFRunLoopDefaultMode as CFStringRef);
        }
    }
}

struct DiskGuard(DADiskRef);
impl Drop for DiskGuard {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) };
    }
}
