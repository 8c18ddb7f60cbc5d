//! Authenticated local IPC transport: dictionary-of-typed-values messages
//! framed over a Unix domain socket, peer identity checked against a
//! configured bundle/team identity.

pub mod auth;
pub mod error;
pub mod message;
pub mod transport;

pub use auth::{AllowedPeer, PeerIdentity};
pub use error::{AuthError, TransportError};
pub use message::{request_tag, response_tag, Message, Value};
pub use transport::Connection;
