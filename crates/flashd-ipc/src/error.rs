/// Errors from [`crate::auth`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("could not determine the peer's credentials: {0}")]
    PeerCredentialsUnavailable(std::io::Error),

    #[error("peer identity does not match the configured client bundle/team identity")]
    PeerUnauthorized,
}

/// Errors from [`crate::transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind the listening socket: {0}")]
    BindFailed(std::io::Error),

    #[error("failed to accept a connection: {0}")]
    AcceptFailed(std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("message payload is null or not a dictionary")]
    PayloadNullOrMalformed,

    #[error("failed to read from the connection: {0}")]
    ReadFailed(std::io::Error),

    #[error("failed to send a response: {0}")]
    ResponseSendFailed(std::io::Error),

    #[error("message framing was malformed: {0}")]
    FramingError(#[from] serde_json::Error),
}
