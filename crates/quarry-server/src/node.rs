//! Embedded backend node

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use quarry_common::config::LocalConfig;
use quarry_common::error::{Error, RpcError};
use quarry_common::types::{QueryId, QueryType};
use quarry_protocol::user::ResultsListener;

use crate::executor::PlanExecutor;
use crate::plan::Plan;

/// Node identifier
pub type NodeId = u64;

/// A backend node that runs plans and streams their chunks
pub struct Node {
    id: NodeId,
    executor: PlanExecutor,
    chunk_delay: Duration,
    running: AtomicBool,
    queries: AtomicU64,
}

impl Node {
    pub fn new(id: NodeId, config: &LocalConfig) -> Self {
        info!("Starting backend node {}", id);

        Self {
            id,
            executor: PlanExecutor::from_config(config),
            chunk_delay: Duration::from_millis(config.chunk_delay_ms),
            running: AtomicBool::new(true),
            queries: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop accepting queries; streams in flight fail at their next chunk
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Stopping backend node {}", self.id);
        }
    }

    pub fn queries_executed(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Run one query, delivering every callback to `listener`.
    ///
    /// The listener always sees `on_query_id` first, then either the full
    /// chunk stream or a single failure.
    pub async fn execute(&self, query_type: QueryType, plan: &str, listener: &dyn ResultsListener) {
        let query_id = QueryId::new();
        listener.on_query_id(query_id);

        if !self.is_running() {
            listener.on_submission_failed(RpcError::Remote(format!("node {} is stopped", self.id)));
            return;
        }

        self.queries.fetch_add(1, Ordering::Relaxed);
        debug!(node = self.id, %query_id, %query_type, "Executing query");

        let chunks = match Plan::parse(query_type, plan)
            .map_err(Error::from)
            .and_then(|plan| self.executor.execute(&plan))
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(node = self.id, %query_id, "Query failed: {}", e);
                listener.on_submission_failed(RpcError::Remote(e.to_string()));
                return;
            }
        };

        for (index, chunk) in chunks.into_iter().enumerate() {
            if index > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            if !self.is_running() {
                listener.on_submission_failed(RpcError::Remote(format!(
                    "node {} stopped while streaming query {}",
                    self.id, query_id
                )));
                return;
            }
            listener.on_chunk(chunk);
        }

        debug!(node = self.id, %query_id, "Query completed");
    }

    /// Run a query on a background task
    pub fn submit(
        self: &Arc<Self>,
        query_type: QueryType,
        plan: String,
        listener: Arc<dyn ResultsListener>,
    ) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            node.execute(query_type, &plan, listener.as_ref()).await;
        })
    }
}
