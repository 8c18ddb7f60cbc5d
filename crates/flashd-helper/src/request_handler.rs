//! Orchestrates a single `WRITE_ISO_TO_DEVICE` request end to end: path
//! validation, optional ISO structural validation, device acquisition, the
//! streaming write, optional verification, and optional eject.

use flashd_core::{DeviceError, ImageKind};
use flashd_ipc::{response_tag, Connection, Message};

use crate::config::{Args, WriteImageRequest};
use crate::error::HelperError;

/// Runs the full write-image pipeline for `payload`, sending every
/// intermediate and terminal response on `connection`.
///
/// Returns `Ok(())` only once `ISO_WRITE_SUCCESS` has been sent. Any other
/// outcome sends the narrowest applicable failure response (unless sending
/// itself failed) and returns the underlying error, which the caller hands
/// to the Shutdown Controller's error path.
pub fn handle_write_image(
    connection: &mut Connection,
    args: &Args,
    payload: &Message,
) -> Result<(), HelperError> {
    let request = WriteImageRequest::parse(payload)?;

    if !crate::config::validate_device_grammar(&request.disk) {
        send(connection, response_tag::DEVICE_INVALID)?;
        return Err(HelperError::Device(DeviceError::DeviceNameMalformed));
    }

    let mut validated = match flashd_core::path_validator::validate(&request.iso_path, &args.user_home) {
        Ok(image) => image,
        Err(err) => {
            send(connection, response_tag::ISO_FILE_INVALID)?;
            return Err(HelperError::Path(err));
        }
    };

    if validated.kind == ImageKind::Iso && !request.config.skip_image_validation {
        if let Err(err) = flashd_iso::validate_structure(&mut validated.file) {
            tracing::warn!(error = %err, "ISO structural validation failed");
            send(connection, response_tag::ISO_FILE_INVALID)?;
            return Err(HelperError::Iso(err));
        }
    }

    send(connection, response_tag::ISO_FILE_VALID)?;

    let mut device = match acquire_device(&request.disk) {
        Ok(device) => device,
        Err(err) => {
            tracing::warn!(error = %err, "device acquisition failed");
            send(connection, response_tag::DEVICE_INVALID)?;
            return Err(HelperError::Device(err));
        }
    };

    if let Ok(device_bytes) = device.size() {
        if let Err(err) = flashd_iso::check_capacity(validated.len, device_bytes) {
            tracing::warn!(error = %err, "image exceeds device capacity");
            send(connection, response_tag::DEVICE_INVALID)?;
            return Err(HelperError::Iso(err));
        }
    }

    let chunk_size = match flashd_core::write_engine::write(
        &mut validated.file,
        device.handle_mut(),
        validated.len,
        |progress| {
            let mut message = Message::new(response_tag::ISO_WRITE_PROGRESS);
            message.set_u64("write_progress", progress.percent);
            message.set_u64("write_rate", progress.instant_rate_bps);
            message.set_u64("write_rate_avg", progress.avg_rate_bps);
            message.set_u64("write_bytes", progress.bytes_done);
            message.set_u64("write_total_size", progress.total);
            let _ = connection.send(&message);
        },
    ) {
        Ok(chunk_size) => chunk_size,
        Err(err) => {
            tracing::error!(error = %err, "write failed");
            send(connection, response_tag::ISO_WRITE_FAIL)?;
            return Err(HelperError::Engine(err));
        }
    };

    if !request.config.skip_verification {
        let verify_result = flashd_core::verify_engine::verify(
            &mut validated.file,
            device.handle_mut(),
            validated.len,
            chunk_size,
            |progress| {
                let mut message = Message::new(response_tag::WRITE_VERIFICATION_PROGRESS);
                message.set_u64("verification_progress", progress.percent);
                let _ = connection.send(&message);
            },
        );
        if let Err(err) = verify_result {
            tracing::error!(error = %err, "verification failed");
            send(connection, response_tag::ISO_WRITE_FAIL)?;
            return Err(HelperError::Engine(err));
        }
    }

    if !request.config.skip_eject {
        let bsd_name = device.bsd_name().to_owned();
        // Close the exclusive handle before ejecting; the platform refuses
        // to eject a device that is still held open.
        drop(device);
        if let Err(err) = request_eject(&bsd_name) {
            tracing::warn!(error = %err, "eject failed, continuing to report write success");
        }
    }

    send(connection, response_tag::ISO_WRITE_SUCCESS)?;
    Ok(())
}

fn send(connection: &mut Connection, tag: &str) -> Result<(), HelperError> {
    connection
        .send(&Message::new(tag))
        .map_err(HelperError::Transport)
}

#[cfg(target_os = "macos")]
fn acquire_device(disk: &str) -> Result<flashd_core::DeviceDescriptor, DeviceError> {
    flashd_core::disk_arbitration::acquire(disk)
}

#[cfg(target_os = "macos")]
fn request_eject(bsd_name: &str) -> Result<(), DeviceError> {
    flashd_core::disk_arbitration::eject(bsd_name)
}

#[cfg(not(target_os = "macos"))]
fn acquire_device(_disk: &str) -> Result<flashd_core::DeviceDescriptor, DeviceError> {
    Err(DeviceError::DASessionCreateFailed)
}

#[cfg(not(target_os = "macos"))]
fn request_eject(_bsd_name: &str) -> Result<(), DeviceError> {
    Err(DeviceError::DASessionCreateFailed)
}
