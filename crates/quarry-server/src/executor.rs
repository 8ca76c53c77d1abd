//! Plan execution into result chunks

use tracing::debug;

use quarry_common::config::LocalConfig;
use quarry_common::error::{Error, Result};
use quarry_common::types::{ChunkHeader, Layout};
use quarry_protocol::user::QueryResultBatch;
use quarry_protocol::vector::encode_payload;

use crate::plan::Plan;

/// Turns a plan into the chunk stream a client receives.
///
/// Rows are cut into chunks of at most `batch_size`. The stream always ends
/// with an empty chunk marked last, carrying the final layout.
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    batch_size: usize,
}

impl PlanExecutor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &LocalConfig) -> Self {
        Self::new(config.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn execute(&self, plan: &Plan) -> Result<Vec<QueryResultBatch>> {
        let mut chunks = Vec::new();
        let mut layout = Layout::default();

        for fragment in &plan.fragments {
            layout = Layout::new(fragment.columns.clone());

            for (index, rows) in fragment.rows.chunks(self.batch_size).enumerate() {
                let first_row = index * self.batch_size;
                let columns = (0..fragment.columns.len())
                    .map(|column| fragment.column(column, rows, first_row))
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let payload = encode_payload(&layout, rows.len(), &columns)?;
                let row_count = u32::try_from(rows.len())
                    .map_err(|_| Error::Internal(format!("{} rows do not fit one chunk", rows.len())))?;

                chunks.push(QueryResultBatch::new(
                    ChunkHeader::new(row_count, layout.clone(), false),
                    Some(payload),
                ));
            }
        }

        chunks.push(QueryResultBatch::new(ChunkHeader::new(0, layout, true), None));
        debug!(chunks = chunks.len(), "Plan executed");

        Ok(chunks)
    }
}
