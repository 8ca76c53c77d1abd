//! TCP front end for a backend node

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, error, info};

use quarry_common::error::{Error, Result, RpcError};
use quarry_common::types::QueryId;
use quarry_protocol::frame::{self, ClientFrame, ServerFrame};
use quarry_protocol::user::{QueryResultBatch, ResultsListener};

use crate::node::Node;

/// Serves queries for one node over the frame protocol
pub struct TcpServer {
    listener: TcpListener,
    node: Arc<Node>,
}

impl TcpServer {
    pub async fn bind(addr: &str, node: Arc<Node>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, node })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped
    pub async fn run(&self) -> Result<()> {
        info!("Backend node {} listening on {}", self.node.id(), self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    let node = Arc::clone(&self.node);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, addr, node).await {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(socket: TcpStream, addr: SocketAddr, node: Arc<Node>) -> Result<()> {
    debug!("New connection from {}", addr);
    socket.set_nodelay(true)?;
    let mut framed = Framed::new(socket, frame::codec());

    while let Some(request) = framed.next().await {
        let ClientFrame::Submit { query_type, plan } = ClientFrame::decode(&request?)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let query = node.submit(query_type, plan, Arc::new(FrameForwarder(tx)));

        while let Some(frame) = rx.recv().await {
            framed.send(frame.encode()?).await?;
        }
        query
            .await
            .map_err(|e| Error::Internal(format!("query task failed: {}", e)))?;
    }

    debug!("Connection closed from {}", addr);
    Ok(())
}

/// Turns listener callbacks into outgoing frames
struct FrameForwarder(mpsc::UnboundedSender<ServerFrame>);

impl FrameForwarder {
    fn forward(&self, frame: ServerFrame) {
        if self.0.send(frame).is_err() {
            debug!("Client went away, dropping frame");
        }
    }
}

impl ResultsListener for FrameForwarder {
    fn on_query_id(&self, id: QueryId) {
        self.forward(ServerFrame::QueryId(id));
    }

    fn on_chunk(&self, chunk: QueryResultBatch) {
        let (header, data) = chunk.into_parts();
        self.forward(ServerFrame::Chunk {
            header,
            payload: data.unwrap_or_default(),
        });
    }

    fn on_submission_failed(&self, cause: RpcError) {
        let message = match cause {
            RpcError::Remote(message) => message,
            other => other.to_string(),
        };
        self.forward(ServerFrame::Failed { message });
    }
}
