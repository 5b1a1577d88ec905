//! Gossip plane: wire codec, TCP server, peer dialer, and the message
//! dispatcher.
//!
//! Every message is a single newline-terminated JSON object carried on
//! its own TCP connection. The server accepts connections and spawns a
//! task per connection; the dialer opens a fresh connection per
//! outbound message. Broadcasts are best-effort: a slow or dead peer
//! never blocks the others.

pub mod client;
pub mod dispatcher;
pub mod message;
pub mod peer;
pub mod server;

pub use dispatcher::Node;
pub use message::{
    BlockMessage, BlocksMessage, CodecError, GetBlocksMessage, GetDataMessage, HandshakeMessage,
    InvMessage, Message, TxMessage,
};
pub use peer::{load_peers, save_peers, Peer};
