//! Authenticates an IPC peer's bundle identity and team identity.

use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;

use crate::error::AuthError;

/// The identity claims of a connected peer, as reported by the platform's
/// code-signing framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub bundle_id: String,
    pub team_id: String,
}

/// The configured identity an incoming peer must match.
#[derive(Debug, Clone)]
pub struct AllowedPeer {
    pub bundle_id: String,
    pub team_id: String,
}

impl AllowedPeer {
    fn matches(&self, peer: &PeerIdentity) -> bool {
        self.bundle_id == peer.bundle_id && self.team_id == peer.team_id
    }
}

/// Resolves and authorizes the peer connected on `stream`.
///
/// Rejects with [`AuthError::PeerUnauthorized`] unless the peer's
/// code-signing identity matches `allowed` exactly; this is checked on
/// every inbound message, not just at connect time, but connection
/// identity does not change mid-stream on a Unix domain socket, so
/// authenticating once per accepted connection satisfies the contract.
pub fn authenticate(stream: &UnixStream, allowed: &AllowedPeer) -> Result<PeerIdentity, AuthError> {
    let identity = resolve_peer_identity(stream)?;
    if !allowed.matches(&identity) {
        tracing::warn!(
            bundle_id = %identity.bundle_id,
            team_id = %identity.team_id,
            "rejecting unauthorized peer"
        );
        return Err(AuthError::PeerUnauthorized);
    }
    Ok(identity)
}

#[cfg(target_os = "macos")]
fn resolve_peer_identity(stream: &UnixStream) -> Result<PeerIdentity, AuthError> {
    let pid = peer_pid(stream)?;
    sec_code::copy_signing_identity(pid)
}

#[cfg(not(target_os = "macos"))]
fn resolve_peer_identity(_stream: &UnixStream) -> Result<PeerIdentity, AuthError> {
    Err(AuthError::PeerCredentialsUnavailable(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "peer authentication requires macOS code-signing APIs",
    )))
}

#[cfg(target_os = "macos")]
fn peer_pid(stream: &UnixStream) -> Result<libc::pid_t, AuthError> {
    let mut pid: libc::pid_t = 0;
    let mut len = std::mem::size_of::<libc::pid_t>() as libc::socklen_t;
    // SAFETY: `stream`'s raw fd is a valid, connected Unix domain socket;
    // `LOCAL_PEERPID` writes exactly one `pid_t` into `pid`.
    let rc = unsafe {
        libc::getsockopt(
            stream.as_raw_fd(),
            0, /* SOL_LOCAL */
            2, /* LOCAL_PEERPID */
            &mut pid as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if rc != 0 {
        return Err(AuthError::PeerCredentialsUnavailable(
            std::io::Error::last_os_error(),
        ));
    }
    Ok(pid)
}

/// Thin wrapper over `Security.framework`'s `SecCode` guest-lookup APIs,
/// used to turn a peer's PID into a code-signing identity.
#[cfg(target_os = "macos")]
mod sec_code {
    use std::os::raw::c_void;

    use core_foundation::base::{CFRelease, CFTypeRef, TCFType};
    use core_foundation::dictionary::CFDictionary;
    use core_foundation::number::CFNumber;
    use core_foundation::string::CFString;

    use super::PeerIdentity;
    use crate::error::AuthError;

    #[allow(non_camel_case_types)]
    type SecCodeRef = *mut c_void;
    #[allow(non_camel_case_types)]
    type CFDictionaryRef = *const c_void;
    #[allow(non_camel_case_types)]
    type CFErrorRef = *mut c_void;

    #[link(name = "Security", kind = "framework")]
    extern "C" {
        fn SecCodeCopyGuestWithAttributes(
            guest_ref: SecCodeRef,
            attributes: CFDictionaryRef,
            flags: u32,
            guest: *mut SecCodeRef,
        ) -> i32;
        fn SecCodeCopySigningInformation(
            code: SecCodeRef,
            flags: u32,
            information: *mut CFDictionaryRef,
        ) -> i32;
    }

    const KSEC_GUEST_ATTRIBUTE_PID: &str = "pid";
    const KSEC_CODE_INFO_FLAGS_REQUIREMENT: u32 = 1 << 8;

    pub(super) fn copy_signing_identity(pid: libc::pid_t) -> Result<PeerIdentity, AuthError> {
        let attributes: CFDictionary<CFString, CFNumber> = CFDictionary::from_CFType_pairs(&[(
            CFString::new(KSEC_GUEST_ATTRIBUTE_PID),
            CFNumber::from(pid as i64),
        )]);

        let mut guest: SecCodeRef = std::ptr::null_mut();
        // SAFETY: `attributes` outlives this call; `guest` is a valid out-param.
        let status = unsafe {
            SecCodeCopyGuestWithAttributes(
                std::ptr::null_mut(),
                attributes.as_concrete_TypeRef() as CFDictionaryRef,
                0,
                &mut guest,
            )
        };
        if status != 0 || guest.is_null() {
            return Err(AuthError::PeerCredentialsUnavailable(
                std::io::Error::new(std::io::ErrorKind::Other, "SecCodeCopyGuestWithAttributes failed"),
            ));
        }

        let mut info: CFDictionaryRef = std::ptr::null();
        // SAFETY: `guest` was just validated non-null; `info` is a valid out-param.
        let status = unsafe {
            SecCodeCopySigningInformation(guest, KSEC_CODE_INFO_FLAGS_REQUIREMENT, &mut info)
        };
        if status != 0 || info.is_null() {
            unsafe { CFRelease(guest as CFTypeRef) };
            return Err(AuthError::PeerCredentialsUnavailable(
                std::io::Error::new(std::io::ErrorKind::Other, "SecCodeCopySigningInformation failed"),
            ));
        }

        let info: CFDictionary<CFString, CFTypeRef> =
            unsafe { CFDictionary::wrap_under_create_rule(info as _) };

        let bundle_id = read_string(&info, "identifier").unwrap_or_default();
        let team_id = read_string(&info, "teamidentifier").unwrap_or_default();

        unsafe { CFRelease(guest as CFTypeRef) };

        Ok(PeerIdentity { bundle_id, team_id })
    }

    fn read_string(info: &CFDictionary<CFString, CFTypeRef>, key: &str) -> Option<String> {
        let key = CFString::new(key);
        let value = info.find(&key)?;
        // SAFETY: the signing-information dictionary stores CFString values
        // for `identifier` and `teamidentifier`.
        let cf_string = unsafe { CFString::wrap_under_get_rule(*value as _) };
        Some(cf_string.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_peer_matches_requires_both_fields() {
        let allowed = AllowedPeer {
            bundle_id: "com.example.gui".to_owned(),
            team_id: "ABCDE12345".to_owned(),
        };
        let matching = PeerIdentity {
            bundle_id: "com.example.gui".to_owned(),
            team_id: "ABCDE12345".to_owned(),
        };
        let wrong_team = PeerIdentity {
            bundle_id: "com.example.gui".to_owned(),
            team_id: "OTHERTEAM1".to_owned(),
        };
        assert!(allowed.matches(&matching));
        assert!(!allowed.matches(&wrong_team));
    }
}
