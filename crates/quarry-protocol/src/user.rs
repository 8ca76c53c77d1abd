//! User-facing contracts between a transport and a result consumer

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use quarry_common::error::{Result, RpcError};
use quarry_common::types::{ChunkHeader, QueryId, QueryType};

/// One chunk as delivered by a transport.
///
/// The payload buffer belongs to the transport; consumers read it while
/// handling the chunk and hand it back with [`QueryResultBatch::release`].
#[derive(Debug)]
pub struct QueryResultBatch {
    header: ChunkHeader,
    data: Option<Bytes>,
}

impl QueryResultBatch {
    pub fn new(header: ChunkHeader, data: Option<Bytes>) -> Self {
        Self { header, data }
    }

    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }

    /// Payload bytes, `None` when the chunk carries no data
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref().filter(|data| !data.is_empty())
    }

    pub fn has_data(&self) -> bool {
        self.data().is_some()
    }

    /// Return the payload buffer to the transport
    pub fn release(self) {
        drop(self.data);
    }

    pub fn into_parts(self) -> (ChunkHeader, Option<Bytes>) {
        (self.header, self.data)
    }
}

/// Callbacks a transport invokes for one submitted query.
///
/// Calls for a single query arrive one at a time, in stream order.
pub trait ResultsListener: Send + Sync {
    /// The backend assigned an identifier to the query
    fn on_query_id(&self, id: QueryId);

    /// A result chunk arrived
    fn on_chunk(&self, chunk: QueryResultBatch);

    /// The query could not run or was aborted
    fn on_submission_failed(&self, cause: RpcError);
}

/// A session able to run queries against a backend
#[async_trait]
pub trait Connection: Send + Sync {
    /// Submit `plan`; results are delivered to `listener` from a transport task
    async fn submit_query(
        &self,
        query_type: QueryType,
        plan: String,
        listener: Arc<dyn ResultsListener>,
    ) -> Result<()>;

    /// Close the session
    async fn close(&self) -> Result<()>;
}
