//! Length-prefixed JSON framing over a Unix domain socket.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use crate::auth::{authenticate, AllowedPeer, PeerIdentity};
use crate::error::TransportError;
use crate::message::Message;

/// A single accepted and authenticated connection. Requests are read and
/// responses written on the same connection.
pub struct Connection {
    stream: UnixStream,
    pub peer: PeerIdentity,
}

impl Connection {
    /// Reads one length-prefixed JSON message. Returns `Ok(None)` on a
    /// clean EOF (the client disconnected between requests).
    pub fn recv(&mut self) -> Result<Option<Message>, TransportError> {
        let mut len_bytes = [0u8; 4];
        if !read_exact_or_eof(&mut self.stream, &mut len_bytes)? {
            return Ok(None);
        }
        let len = u32::from_be_bytes(len_bytes) as usize;

        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .map_err(TransportError::ReadFailed)?;

        let message: Message = serde_json::from_slice(&payload)?;
        Ok(Some(message))
    }

    /// Writes one length-prefixed JSON message.
    pub fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(message)?;
        let len = (payload.len() as u32).to_be_bytes();
        self.stream
            .write_all(&len)
            .map_err(TransportError::ResponseSendFailed)?;
        self.stream
            .write_all(&payload)
            .map_err(TransportError::ResponseSendFailed)
    }
}

/// Binds a Unix domain socket at `socket_path` and returns a listener ready
/// to accept authenticated connections.
pub fn bind(socket_path: &Path) -> Result<UnixListener, TransportError> {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
    UnixListener::bind(socket_path).map_err(TransportError::BindFailed)
}

/// Accepts the single connection this one-shot helper will ever serve,
/// authenticating the peer against `allowed` before returning it.
///
/// Any message whose peer identity does not
/// match `allowed` is rejected entirely — the connection is dropped and no
/// response is sent.
pub fn accept(listener: &UnixListener, allowed: &AllowedPeer) -> Result<Connection, TransportError> {
    loop {
        let (stream, _addr) = listener.accept().map_err(TransportError::AcceptFailed)?;
        match authenticate(&stream, allowed) {
            Ok(peer) => return Ok(Connection { stream, peer }),
            Err(auth_error) => {
                tracing::warn!(error = %auth_error, "dropping connection from unauthorized peer");
                // The one-shot helper has nothing else to serve; an
                // unauthorized peer is fatal to this invocation.
                return Err(TransportError::Auth(auth_error));
            }
        }
    }
}

fn read_exact_or_eof(stream: &mut UnixStream, buf: &mut [u8]) -> Result<bool, TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(TransportError::ReadFailed(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::ReadFailed(e)),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{request_tag, response_tag};
    use std::os::unix::net::UnixStream as RawUnixStream;

    #[test]
    fn frames_round_trip_over_a_socketpair() {
        let (left, right) = RawUnixStream::pair().unwrap();
        let mut server = Connection {
            stream: left,
            peer: PeerIdentity {
                bundle_id: "com.example.gui".to_owned(),
                team_id: "TEAM123456".to_owned(),
            },
        };
        let mut client = right;

        let mut request = Message::new(request_tag::INITIAL_PING);
        request.set_bool("skipEject", false);
        let payload = serde_json::to_vec(&request).unwrap();
        let len = (payload.len() as u32).to_be_bytes();
        client.write_all(&len).unwrap();
        client.write_all(&payload).unwrap();

        let received = server.recv().unwrap().expect("message should be present");
        assert_eq!(received.tag(), Some(request_tag::INITIAL_PING));

        server
            .send(&Message::new(response_tag::INITIAL_PONG))
            .unwrap();

        let mut len_bytes = [0u8; 4];
        client.read_exact(&mut len_bytes).unwrap();
        let len = u32::from_be_bytes(len_bytes) as usize;
        let mut reply_bytes = vec![0u8; len];
        client.read_exact(&mut reply_bytes).unwrap();
        let reply: Message = serde_json::from_slice(&reply_bytes).unwrap();
        assert_eq!(reply.tag(), Some(response_tag::INITIAL_PONG));
    }
}
