//! Plan submission: connect, submit, wait, report

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use quarry_client::{QueryResultsListener, TableRenderer};
use quarry_common::config::{ClientConfig, Config};
use quarry_common::types::QueryType;
use quarry_protocol::user::{Connection, ResultsListener};

use crate::bootstrap::Session;

/// Exit status for an unknown plan type
pub const EXIT_INVALID_TYPE: i32 = -1;
/// Exit status for any other failure
pub const EXIT_FAILURE: i32 = 1;

/// Outcome of a successful query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub rows: u64,
    pub elapsed: Duration,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Got {} record{} in {:.6} seconds",
            self.rows,
            if self.rows > 1 { "s" } else { "" },
            self.elapsed.as_secs_f64()
        )
    }
}

/// Run the plan stored at `location` and print the outcome.
///
/// Returns the process exit status. The session is closed on every path.
pub async fn submit_plan(config: &Config, location: &Path, plan_type: &str, local: bool) -> i32 {
    let session = match Session::open(config, local).await {
        Ok(session) => session,
        Err(e) => {
            println!("Failed to connect: {e:#}");
            return EXIT_FAILURE;
        }
    };

    let status = run(&session, config, location, plan_type).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close session: {:#}", e);
    }
    status
}

async fn run(session: &Session, config: &Config, location: &Path, plan_type: &str) -> i32 {
    let plan = match tokio::fs::read_to_string(location).await {
        Ok(plan) => plan,
        Err(e) => {
            println!("Failed to read plan {}: {}", location.display(), e);
            return EXIT_FAILURE;
        }
    };

    let Ok(query_type) = plan_type.parse::<QueryType>() else {
        println!("Invalid query type: {}", plan_type.to_lowercase());
        return EXIT_INVALID_TYPE;
    };

    match execute(session.connection(), &config.client, query_type, plan).await {
        Ok(summary) => {
            println!("{summary}");
            0
        }
        Err(e) => {
            println!("Query failed: {e:#}");
            EXIT_FAILURE
        }
    }
}

/// Submit one query and block until its result stream completes
pub async fn execute(
    connection: &Arc<dyn Connection>,
    client: &ClientConfig,
    query_type: QueryType,
    plan: String,
) -> Result<Summary> {
    let mut listener = QueryResultsListener::new();
    if client.render_results {
        listener = listener.with_renderer(Arc::new(TableRenderer::stdout(client.max_render_rows)));
    }
    let listener = Arc::new(listener);

    let watch = Instant::now();
    connection
        .submit_query(query_type, plan, Arc::clone(&listener) as Arc<dyn ResultsListener>)
        .await
        .context("submission rejected")?;

    let timeout = client.await_timeout();
    let waiter = Arc::clone(&listener);
    let rows = tokio::task::spawn_blocking(move || match timeout {
        Some(timeout) => waiter.wait_timeout(timeout),
        None => waiter.wait(),
    })
    .await??;
    let elapsed = watch.elapsed();

    if let Some(id) = listener.query_id() {
        info!(query_id = %id, rows, ?elapsed, "Query completed");
    }

    Ok(Summary { rows, elapsed })
}
