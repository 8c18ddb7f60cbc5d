use flashd_core::{DeviceError, EngineError, PathError};
use flashd_ipc::TransportError;

/// Aggregates every component's error type. `TransportError` also carries
/// `AuthError`: an unauthorized peer never gets a response, only the
/// Shutdown Controller's error path, so it needs no separate variant here.
///
/// The response tag sent to the client for each failure is chosen at the
/// call site in the Request Handler, since the same underlying error
/// (e.g. `flashd_iso::ValidationError::InsufficientDeviceCapacity`, raised
/// only once the device is already known) can map to different tags
/// depending on which pipeline step it was detected in.
#[derive(Debug, thiserror::Error)]
pub enum HelperError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Iso(#[from] flashd_iso::ValidationError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("request payload was missing required keys or had the wrong shape")]
    MalformedRequest,
}
