//! Inbound gossip: TCP listener with one task per connection.
//!
//! Each accepted connection carries exactly one newline-terminated
//! message. The read happens on the async runtime; dispatch runs on
//! the blocking pool because handlers may dial peers synchronously.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::dispatcher::Node;

/// Binds `listen_addr` and serves gossip connections forever.
pub async fn run_gossip_server(listen_addr: String, node: Arc<Node>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "gossip server listening");

    loop {
        let (stream, remote) = listener.accept().await?;
        let node = node.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, node).await {
                tracing::warn!(peer = %remote, "connection error: {e}");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, node: Arc<Node>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    if line.trim().is_empty() {
        return Ok(());
    }

    // Handlers may block on outbound sends; keep them off the reactor.
    tokio::task::spawn_blocking(move || node.handle_message(line.as_bytes()))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ChainManager;
    use crate::mempool::Mempool;
    use crate::metrics::MetricsRegistry;
    use crate::network::message::{self, TxMessage};

    fn test_node() -> Arc<Node> {
        let chain = Arc::new(ChainManager::new());
        let mempool = Arc::new(Mempool::new());
        let metrics = Arc::new(MetricsRegistry::new().expect("metrics registry"));
        Arc::new(Node::new(
            chain,
            mempool,
            Vec::new(),
            "127.0.0.1:0",
            metrics,
        ))
    }

    #[tokio::test]
    async fn server_dispatches_one_message_per_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let node = test_node();

        let accept_node = node.clone();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(stream, accept_node).await.unwrap();
        });

        let msg = TxMessage {
            kind: message::MSG_TYPE_TRANSACTION.to_string(),
            tx_id: message::to_wire_bytes(&[5u8; 32]),
            data_hash: "QmData".to_string(),
            algo_hash: "QmAlgo".to_string(),
            metadata: "server test".to_string(),
            timestamp: 1,
        };
        let payload = message::encode(&msg).unwrap();

        tokio::task::spawn_blocking(move || {
            crate::network::client::send_message(&addr, &payload).unwrap();
        })
        .await
        .unwrap();

        server.await.unwrap();

        // The transaction made it through read + dispatch.
        assert!(node.mempool().has(&[5u8; 32]));
    }

    #[tokio::test]
    async fn empty_connections_are_ignored() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let node = test_node();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(stream, node).await.unwrap();
        });

        tokio::task::spawn_blocking(move || {
            // Connect and close without writing anything.
            let _ = std::net::TcpStream::connect(&addr).unwrap();
        })
        .await
        .unwrap();

        server.await.unwrap();
    }
}
