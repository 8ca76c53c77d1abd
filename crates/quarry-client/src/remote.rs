//! TCP connection to a remote backend

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use quarry_common::error::{Error, NetworkError, Result, RpcError};
use quarry_common::types::QueryType;
use quarry_protocol::frame::{self, ClientFrame, ServerFrame};
use quarry_protocol::user::{Connection, QueryResultBatch, ResultsListener};

use crate::discovery::Discovery;

/// Connection to one backend chosen through discovery.
///
/// Each query gets its own TCP stream; a reader task per stream turns
/// server frames into listener callbacks, one at a time.
pub struct RemoteConnection {
    addr: SocketAddr,
    connect_timeout: Duration,
    idle: tokio::sync::Mutex<Option<TcpStream>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

impl RemoteConnection {
    /// Connect to the first reachable endpoint `discovery` yields
    pub async fn connect(discovery: &dyn Discovery, connect_timeout: Duration) -> Result<Self> {
        let mut last_error = None;
        for addr in discovery.endpoints().await? {
            match open(addr, connect_timeout).await {
                Ok(stream) => {
                    info!(%addr, "Connected to backend");
                    return Ok(Self {
                        addr,
                        connect_timeout,
                        idle: tokio::sync::Mutex::new(Some(stream)),
                        readers: Mutex::new(Vec::new()),
                    });
                }
                Err(e) => {
                    warn!(%addr, error = %e, "Backend unreachable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| NetworkError::NoBackend.into()))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Connection for RemoteConnection {
    async fn submit_query(
        &self,
        query_type: QueryType,
        plan: String,
        listener: Arc<dyn ResultsListener>,
    ) -> Result<()> {
        let idle = self.idle.lock().await.take();
        let stream = match idle {
            Some(stream) => stream,
            None => open(self.addr, self.connect_timeout).await?,
        };

        let mut framed = Framed::new(stream, frame::codec());
        let submit = ClientFrame::Submit { query_type, plan }.encode()?;
        framed
            .send(submit)
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("{}: {}", self.addr, e)))?;
        debug!(addr = %self.addr, %query_type, "Query submitted");

        let reader = tokio::spawn(read_results(framed, listener));
        let mut readers = self.readers.lock();
        readers.retain(|handle| !handle.is_finished());
        readers.push(reader);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.idle.lock().await.take();
        for reader in self.readers.lock().drain(..) {
            reader.abort();
        }
        debug!(addr = %self.addr, "Connection closed");
        Ok(())
    }
}

async fn open(addr: SocketAddr, connect_timeout: Duration) -> Result<TcpStream> {
    match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            stream.set_nodelay(true)?;
            Ok(stream)
        }
        Ok(Err(e)) => Err(NetworkError::ConnectionFailed(format!("{}: {}", addr, e)).into()),
        Err(_) => Err(NetworkError::Timeout(format!("connecting to {}", addr)).into()),
    }
}

async fn read_results(
    mut framed: Framed<TcpStream, LengthDelimitedCodec>,
    listener: Arc<dyn ResultsListener>,
) {
    while let Some(next) = framed.next().await {
        let frame = match next
            .map_err(Error::from)
            .and_then(|bytes| ServerFrame::decode(&bytes))
        {
            Ok(frame) => frame,
            Err(e) => {
                listener.on_submission_failed(RpcError::ConnectionLost(e.to_string()));
                return;
            }
        };

        match frame {
            ServerFrame::QueryId(id) => listener.on_query_id(id),
            ServerFrame::Chunk { header, payload } => {
                let last = header.is_last_chunk;
                listener.on_chunk(QueryResultBatch::new(header, Some(payload)));
                if last {
                    return;
                }
            }
            ServerFrame::Failed { message } => {
                listener.on_submission_failed(RpcError::Remote(message));
                return;
            }
        }
    }

    listener.on_submission_failed(RpcError::ConnectionLost(
        "backend closed the stream before the last chunk".to_string(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticDiscovery;
    use crate::listener::QueryResultsListener;
    use quarry_common::error::QueryError;
    use quarry_common::types::{ChunkHeader, Layout, QueryId};
    use tokio::net::TcpListener;

    async fn serve_once(frames: Vec<ServerFrame>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, frame::codec());
            let request = framed.next().await.unwrap().unwrap();
            assert!(matches!(
                ClientFrame::decode(&request).unwrap(),
                ClientFrame::Submit { .. }
            ));
            for f in frames {
                framed.send(f.encode().unwrap()).await.unwrap();
            }
        });
        addr
    }

    async fn serve_many(queries: usize, frames: Vec<ServerFrame>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for _ in 0..queries {
                let (socket, _) = listener.accept().await.unwrap();
                let mut framed = Framed::new(socket, frame::codec());
                framed.next().await.unwrap().unwrap();
                for f in frames.clone() {
                    framed.send(f.encode().unwrap()).await.unwrap();
                }
            }
        });
        addr
    }

    async fn run(
        frames: Vec<ServerFrame>,
    ) -> (Arc<QueryResultsListener>, std::result::Result<u64, QueryError>) {
        let addr = serve_once(frames).await;
        let discovery = StaticDiscovery::parse(&addr.to_string()).unwrap();
        let connection = RemoteConnection::connect(&discovery, Duration::from_secs(5))
            .await
            .unwrap();

        let listener = Arc::new(QueryResultsListener::new());
        connection
            .submit_query(QueryType::Physical, "{}".to_string(), listener.clone())
            .await
            .unwrap();

        let waiter = listener.clone();
        let outcome = tokio::task::spawn_blocking(move || waiter.wait_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        connection.close().await.unwrap();
        (listener, outcome)
    }

    #[tokio::test]
    async fn test_frames_drive_listener() {
        let id = QueryId::new();
        let (listener, outcome) = run(vec![
            ServerFrame::QueryId(id),
            ServerFrame::Chunk {
                header: ChunkHeader::new(0, Layout::default(), true),
                payload: bytes::Bytes::new(),
            },
        ])
        .await;

        assert_eq!(outcome, Ok(0));
        assert_eq!(listener.query_id(), Some(id));
    }

    #[tokio::test]
    async fn test_failed_frame_is_remote_failure() {
        let (_, outcome) = run(vec![ServerFrame::Failed {
            message: "backend OOM".to_string(),
        }])
        .await;

        assert_eq!(
            outcome,
            Err(QueryError::Failed(RpcError::Remote("backend OOM".to_string())))
        );
    }

    #[tokio::test]
    async fn test_stream_closed_early_is_connection_lost() {
        let (_, outcome) = run(vec![ServerFrame::QueryId(QueryId::new())]).await;
        assert!(matches!(
            outcome,
            Err(QueryError::Failed(RpcError::ConnectionLost(_)))
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let discovery = StaticDiscovery::parse(&addr.to_string()).unwrap();
        assert!(RemoteConnection::connect(&discovery, Duration::from_secs(1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_finished_readers_are_pruned() {
        let frames = vec![
            ServerFrame::QueryId(QueryId::new()),
            ServerFrame::Chunk {
                header: ChunkHeader::new(0, Layout::default(), true),
                payload: bytes::Bytes::new(),
            },
        ];
        let addr = serve_many(3, frames).await;
        let discovery = StaticDiscovery::parse(&addr.to_string()).unwrap();
        let connection = RemoteConnection::connect(&discovery, Duration::from_secs(5))
            .await
            .unwrap();

        for _ in 0..3 {
            let listener = Arc::new(QueryResultsListener::new());
            connection
                .submit_query(QueryType::Physical, "{}".to_string(), listener.clone())
                .await
                .unwrap();
            assert_eq!(connection.readers.lock().len(), 1);

            let outcome = tokio::task::spawn_blocking(move || listener.wait_timeout(Duration::from_secs(5)))
                .await
                .unwrap();
            assert_eq!(outcome, Ok(0));

            while !connection.readers.lock().iter().all(JoinHandle::is_finished) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        connection.close().await.unwrap();
    }
}
