use std::path::PathBuf;

use clap::Parser;
use flashd_ipc::Message;

use crate::error::HelperError;

/// Command-line configuration for a single helper invocation: the helper is
/// launched by the privileged-tool launcher with the client identity it must
/// authenticate against already known.
#[derive(Debug, Clone, Parser)]
#[command(name = "flashd-helper", version = crate::version::VERSION)]
pub struct Args {
    /// Unix domain socket path to bind and accept one connection on.
    #[arg(long)]
    pub socket_path: PathBuf,

    /// The calling GUI's code-signing bundle identifier.
    #[arg(long)]
    pub allowed_bundle_id: String,

    /// The calling GUI's code-signing team identifier.
    #[arg(long)]
    pub allowed_team_id: String,

    /// The authenticated peer's home directory, used as the root for the
    /// Path Validator's allow-list.
    #[arg(long)]
    pub user_home: PathBuf,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long)]
    pub log_json: bool,
}

/// The per-request configuration flags carried by a `WRITE_ISO_TO_DEVICE`
/// message. Missing flags default to `false` (most-cautious).
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub skip_image_validation: bool,
    pub skip_verification: bool,
    pub skip_eject: bool,
}

/// A parsed `WRITE_ISO_TO_DEVICE` request payload.
#[derive(Debug, Clone)]
pub struct WriteImageRequest {
    pub iso_path: PathBuf,
    pub disk: String,
    pub device_service_id: Option<u64>,
    pub config: RequestConfig,
}

impl WriteImageRequest {
    pub fn parse(message: &Message) -> Result<Self, HelperError> {
        let iso_path = message
            .get_str("isoPath")
            .ok_or(HelperError::MalformedRequest)?;
        let disk = message
            .get_str("disk")
            .ok_or(HelperError::MalformedRequest)?;

        Ok(Self {
            iso_path: PathBuf::from(iso_path),
            disk: disk.to_owned(),
            device_service_id: message.get_u64("deviceServiceId"),
            config: RequestConfig {
                skip_image_validation: message.get_bool_or_false("skipImageValidation"),
                skip_verification: message.get_bool_or_false("skipVerification"),
                skip_eject: message.get_bool_or_false("skipEject"),
            },
        })
    }
}

/// Validates a device BSD name against the `disk<N>` / `rdisk<N>` grammar
/// (1 < N < 100).
pub fn validate_device_grammar(disk: &str) -> bool {
    let digits = disk
        .strip_prefix("rdisk")
        .or_else(|| disk.strip_prefix("disk"));
    let Some(digits) = digits else { return false };
    match digits.parse::<u32>() {
        Ok(n) => n > 1 && n < 100,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_disk_and_rdisk_within_range() {
        assert!(validate_device_grammar("disk4"));
        assert!(validate_device_grammar("rdisk4"));
        assert!(!validate_device_grammar("disk0"));
        assert!(!validate_device_grammar("disk1"));
        assert!(!validate_device_grammar("disk100"));
        assert!(!validate_device_grammar("notadisk"));
    }
}
