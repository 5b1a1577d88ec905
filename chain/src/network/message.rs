// chain/src/network/message.rs

//! Wire message schemas and the framed JSON codec.
//!
//! Field names and tag strings are part of the protocol and must not
//! change. Byte-string values (block hashes, Merkle roots, transaction
//! ids) travel as lowercase hex; decoding falls back to the raw string
//! bytes for values that are not valid hex, which is how the literal
//! `"GENESIS"` sentinel survives a round trip.
//!
//! Incoming messages are classified by the `type` discriminator where
//! one exists (`handshake`, `transaction`) and by schema-distinctive
//! fields otherwise, because `InvMessage` and `GetDataMessage` reuse
//! `type` for the payload kind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash;
use crate::types::{Block, BlockHeader, Transaction};

/// `type` value of a handshake message.
pub const MSG_TYPE_HANDSHAKE: &str = "handshake";
/// `type` value of a transaction message.
pub const MSG_TYPE_TRANSACTION: &str = "transaction";
/// Payload kind for block inventories and data requests.
pub const DATA_TYPE_BLOCK: &str = "block";
/// Payload kind for transaction inventories and data requests.
pub const DATA_TYPE_TRANSACTION: &str = "transaction";

/// Encapsulates a new transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub tx_id: String,
    pub data_hash: String,
    pub algo_hash: String,
    pub metadata: String,
    pub timestamp: i64,
}

/// Encapsulates a newly mined block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub block_id: String,
    pub merkle_root: String,
    pub previous_hash: String,
    pub transactions: Vec<TxMessage>,
    pub timestamp: i64,
}

/// Requests a height range from a peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetBlocksMessage {
    pub requesting_node: String,
    pub start_height: u64,
    pub end_height: u64,
}

/// Reply to [`GetBlocksMessage`]: full block structures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlocksMessage {
    pub blocks: Vec<Block>,
}

/// Announces hashes the sender has.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvMessage {
    pub hashes: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Asks a peer for a concrete block or transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetDataMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub hash: String,
    pub peer_address: String,
}

/// Announces a node joining the mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub peer_address: String,
}

impl HandshakeMessage {
    pub fn new(version: impl Into<String>, peer_address: impl Into<String>) -> Self {
        Self {
            kind: MSG_TYPE_HANDSHAKE.to_string(),
            version: version.into(),
            peer_address: peer_address.into(),
        }
    }
}

/// A decoded inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Handshake(HandshakeMessage),
    Transaction(TxMessage),
    Block(BlockMessage),
    GetBlocks(GetBlocksMessage),
    Blocks(BlocksMessage),
    Inv(InvMessage),
    GetData(GetDataMessage),
}

/// Errors produced by the wire codec.
#[derive(Debug)]
pub enum CodecError {
    /// The payload was not a JSON object of any known shape.
    Malformed(serde_json::Error),
    /// The payload parsed but its discriminator names nothing known.
    UnknownType(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Malformed(e)
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Malformed(e) => write!(f, "malformed message: {e}"),
            CodecError::UnknownType(t) => write!(f, "unknown message type: {t}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encodes a message as a single newline-terminated JSON object.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    let mut payload = serde_json::to_vec(message)?;
    payload.push(b'\n');
    Ok(payload)
}

/// Decodes one framed message, classifying it by shape.
pub fn decode(raw: &[u8]) -> Result<Message, CodecError> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;

    if value.get("block_id").is_some() {
        return Ok(Message::Block(serde_json::from_value(value)?));
    }
    if value.get("requesting_node").is_some() {
        return Ok(Message::GetBlocks(serde_json::from_value(value)?));
    }
    if value.get("blocks").is_some() {
        return Ok(Message::Blocks(serde_json::from_value(value)?));
    }
    if value.get("hashes").is_some() {
        return Ok(Message::Inv(serde_json::from_value(value)?));
    }
    if value.get("hash").is_some() && value.get("peer_address").is_some() {
        return Ok(Message::GetData(serde_json::from_value(value)?));
    }

    match value.get("type").and_then(serde_json::Value::as_str) {
        Some(MSG_TYPE_HANDSHAKE) => Ok(Message::Handshake(serde_json::from_value(value)?)),
        Some(MSG_TYPE_TRANSACTION) => Ok(Message::Transaction(serde_json::from_value(value)?)),
        Some(other) => Err(CodecError::UnknownType(other.to_string())),
        None => Err(CodecError::UnknownType("<missing>".to_string())),
    }
}

/// Hex-encodes a byte string for the wire.
pub fn to_wire_bytes(bytes: &[u8]) -> String {
    hash::to_hex(bytes)
}

/// Recovers a byte string from its wire form.
///
/// Values we emit are always hex; non-hex input (a foreign peer, or
/// the literal genesis sentinel) degrades to the raw string bytes.
pub fn from_wire_bytes(value: &str) -> Vec<u8> {
    hex::decode(value).unwrap_or_else(|_| value.as_bytes().to_vec())
}

impl TxMessage {
    /// Builds the wire form of a transaction.
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            kind: MSG_TYPE_TRANSACTION.to_string(),
            tx_id: to_wire_bytes(&tx.tx_id),
            data_hash: tx.data_hash.clone(),
            algo_hash: tx.algorithm_hash.clone(),
            metadata: tx.metadata.clone(),
            timestamp: tx.timestamp,
        }
    }

    /// Rebuilds the domain transaction. The execution result does not
    /// travel on this message, so `vm_output` starts empty.
    pub fn to_transaction(&self) -> Transaction {
        Transaction {
            tx_id: from_wire_bytes(&self.tx_id),
            data_hash: self.data_hash.clone(),
            algorithm_hash: self.algo_hash.clone(),
            metadata: self.metadata.clone(),
            vm_output: Vec::new(),
            timestamp: self.timestamp,
        }
    }
}

impl BlockMessage {
    /// Builds the wire form of a block.
    pub fn from_block(block: &Block) -> Self {
        Self {
            block_id: to_wire_bytes(&block.header.hash),
            merkle_root: to_wire_bytes(&block.header.merkle_root),
            previous_hash: to_wire_bytes(&block.header.previous_hash),
            transactions: block
                .transactions
                .iter()
                .map(TxMessage::from_transaction)
                .collect(),
            timestamp: block.header.timestamp,
        }
    }

    /// Rebuilds a domain block. Fields that do not travel on this
    /// message (nonce, VM outputs digest) start at their defaults.
    pub fn to_block(&self) -> Block {
        Block {
            header: BlockHeader {
                previous_hash: from_wire_bytes(&self.previous_hash),
                timestamp: self.timestamp,
                merkle_root: from_wire_bytes(&self.merkle_root),
                hash: from_wire_bytes(&self.block_id),
                ..BlockHeader::default()
            },
            transactions: self.transactions.iter().map(TxMessage::to_transaction).collect(),
        }
    }
}
