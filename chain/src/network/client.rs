//! Outbound gossip: one fresh TCP connection per message.
//!
//! The dialer is deliberately blocking — every send is a short-lived
//! connect/write/close. Broadcasts walk the peer list sequentially and
//! log per-peer failures without aborting; a dead peer therefore costs
//! one failed connect and nothing more.

use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use super::message::{self, BlockMessage, HandshakeMessage, InvMessage, TxMessage};

/// Delay between handshake attempts against an unresponsive peer.
pub const HANDSHAKE_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Sends one framed payload to `peer_addr` and closes the connection.
pub fn send_message(peer_addr: &str, payload: &[u8]) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(peer_addr)?;
    stream.write_all(payload)?;
    Ok(())
}

/// Encodes `message` and sends it to `peer_addr`.
pub fn send_to_peer<T: Serialize>(peer_addr: &str, message: &T) -> std::io::Result<()> {
    let payload = message::encode(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    send_message(peer_addr, &payload)
}

fn broadcast<T: Serialize>(what: &str, message: &T, peers: &[String]) {
    let payload = match message::encode(message) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("failed to encode {what} for broadcast: {e}");
            return;
        }
    };

    for peer in peers {
        match send_message(peer, &payload) {
            Ok(()) => tracing::debug!(peer = %peer, "{what} sent"),
            Err(e) => tracing::warn!(peer = %peer, "failed to send {what}: {e}"),
        }
    }
}

/// Sends a transaction to every known peer, best-effort.
pub fn broadcast_transaction(tx: &TxMessage, peers: &[String]) {
    broadcast("transaction", tx, peers);
}

/// Sends a mined block to every known peer, best-effort.
pub fn broadcast_block(block: &BlockMessage, peers: &[String]) {
    broadcast("block", block, peers);
}

/// Sends an inventory announcement to every known peer, best-effort.
pub fn broadcast_inv(inv: &InvMessage, peers: &[String]) {
    broadcast("inventory", inv, peers);
}

/// Announces this node to `peer_addr`, retrying every
/// [`HANDSHAKE_RETRY_INTERVAL`] until the first successful send.
pub fn handshake_loop(peer_addr: &str, hello: &HandshakeMessage) {
    loop {
        match send_to_peer(peer_addr, hello) {
            Ok(()) => {
                tracing::info!(peer = %peer_addr, "handshake sent");
                return;
            }
            Err(e) => {
                tracing::warn!(peer = %peer_addr, "handshake failed, retrying: {e}");
                thread::sleep(HANDSHAKE_RETRY_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    /// Binds an ephemeral listener and returns its address plus a
    /// handle resolving to the first line it receives.
    fn spawn_listener() -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().unwrap().to_string();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut received = String::new();
            stream.read_to_string(&mut received).expect("read");
            received
        });
        (addr, handle)
    }

    #[test]
    fn send_to_peer_delivers_one_framed_message() {
        let (addr, handle) = spawn_listener();

        let hello = HandshakeMessage::new("0.1.0", "127.0.0.1:9999");
        send_to_peer(&addr, &hello).expect("send should succeed");

        let received = handle.join().expect("listener thread");
        assert!(received.ends_with('\n'));
        assert!(received.contains("\"type\":\"handshake\""));
        assert!(received.contains("0.1.0"));
    }

    #[test]
    fn send_to_dead_peer_reports_io_error() {
        // Nobody listens on port 1.
        let hello = HandshakeMessage::new("0.1.0", "127.0.0.1:9999");
        assert!(send_to_peer("127.0.0.1:1", &hello).is_err());
    }

    #[test]
    fn broadcast_survives_dead_peers() {
        let (addr, handle) = spawn_listener();
        let peers = vec!["127.0.0.1:1".to_string(), addr];

        let inv = InvMessage {
            hashes: vec!["00ff".to_string()],
            kind: message::DATA_TYPE_BLOCK.to_string(),
        };
        broadcast_inv(&inv, &peers);

        // The live peer still got the message after the dead one failed.
        let received = handle.join().expect("listener thread");
        assert!(received.contains("\"hashes\""));
    }
}
