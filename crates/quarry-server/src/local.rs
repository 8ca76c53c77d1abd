//! In-process connection to a local service set

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use quarry_common::error::{NetworkError, Result};
use quarry_common::types::QueryType;
use quarry_protocol::user::{Connection, ResultsListener};

use crate::service_set::LocalServiceSet;

/// Connection that hands queries straight to nodes in this process
pub struct LocalConnection {
    services: Arc<LocalServiceSet>,
    queries: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalConnection {
    pub fn new(services: Arc<LocalServiceSet>) -> Self {
        Self {
            services,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn services(&self) -> &Arc<LocalServiceSet> {
        &self.services
    }
}

#[async_trait]
impl Connection for LocalConnection {
    async fn submit_query(
        &self,
        query_type: QueryType,
        plan: String,
        listener: Arc<dyn ResultsListener>,
    ) -> Result<()> {
        let node = self.services.pick().ok_or(NetworkError::NoBackend)?;
        debug!(node = node.id(), %query_type, "Submitting query locally");

        let handle = node.submit(query_type, plan, listener);
        let mut queries = self.queries.lock();
        queries.retain(|handle| !handle.is_finished());
        queries.push(handle);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for handle in self.queries.lock().drain(..) {
            handle.abort();
        }
        Ok(())
    }
}
