//! Result listener and synchronous waiter

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use quarry_common::error::{QueryError, RpcError};
use quarry_common::types::{Layout, QueryId};
use quarry_protocol::user::{QueryResultBatch, ResultsListener};

use crate::loader::BatchLoader;
use crate::render::BatchRenderer;
use crate::signal::{Completion, CompletionSignal};

/// Lifecycle of one listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Open,
    ClosedNormal,
    ClosedFailed,
}

/// Accumulates the chunk stream of a single query.
///
/// A transport drives the [`ResultsListener`] callbacks; the submitting
/// thread blocks in [`wait`](Self::wait) until the last chunk or a failure
/// closes the completion signal. Every accepted chunk sets the current
/// layout; rows are counted and decoded only for chunks carrying data. A
/// decode fault fails the whole query.
pub struct QueryResultsListener {
    query_id: OnceCell<QueryId>,
    rows: AtomicU64,
    layout: Mutex<Option<Layout>>,
    loader: Mutex<BatchLoader>,
    signal: CompletionSignal,
    renderer: Option<Arc<dyn BatchRenderer>>,
}

impl QueryResultsListener {
    pub fn new() -> Self {
        Self {
            query_id: OnceCell::new(),
            rows: AtomicU64::new(0),
            layout: Mutex::new(None),
            loader: Mutex::new(BatchLoader::new()),
            signal: CompletionSignal::new(),
            renderer: None,
        }
    }

    /// Render every decoded batch with `renderer`
    pub fn with_renderer(mut self, renderer: Arc<dyn BatchRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Block until the query completes; returns the total row count
    pub fn wait(&self) -> Result<u64, QueryError> {
        let completion = self.signal.wait();
        self.outcome(completion)
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// Expiry yields [`QueryError::Abandoned`]; the query itself is left as is.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<u64, QueryError> {
        match self.signal.wait_for(timeout) {
            Some(completion) => self.outcome(completion),
            None => Err(QueryError::Abandoned { waited: timeout }),
        }
    }

    pub fn query_id(&self) -> Option<QueryId> {
        self.query_id.get().copied()
    }

    /// Layout declared by the most recently accepted chunk, data or not
    pub fn layout(&self) -> Option<Layout> {
        self.layout.lock().clone()
    }

    pub fn state(&self) -> ListenerState {
        match self.signal.completion() {
            None => ListenerState::Open,
            Some(Completion::Succeeded) => ListenerState::ClosedNormal,
            Some(Completion::Failed(_)) => ListenerState::ClosedFailed,
        }
    }

    fn outcome(&self, completion: Completion) -> Result<u64, QueryError> {
        match completion {
            Completion::Succeeded => Ok(self.rows.load(Ordering::SeqCst)),
            Completion::Failed(cause) => Err(QueryError::Failed(cause)),
        }
    }
}

impl Default for QueryResultsListener {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultsListener for QueryResultsListener {
    fn on_query_id(&self, id: QueryId) {
        if self.query_id.set(id).is_err() {
            warn!(%id, "Query id assigned twice, keeping the first");
            return;
        }
        debug!(%id, "Query id assigned");
    }

    fn on_chunk(&self, chunk: QueryResultBatch) {
        if self.signal.is_closed() {
            warn!(
                rows = chunk.header().row_count,
                "Chunk arrived after the result stream closed, ignoring"
            );
            return;
        }

        let header = chunk.header();
        {
            let mut layout = self.layout.lock();
            if layout.as_ref() != Some(&header.layout) {
                *layout = Some(header.layout.clone());
            }
        }

        if let Some(data) = chunk.data() {
            let rows = u64::from(header.row_count);
            self.rows.fetch_add(rows, Ordering::SeqCst);
            counter!("quarry_client_rows_received_total").increment(rows);

            let loaded = self.loader.lock().load(header, data);
            match loaded {
                Ok(batch) => {
                    counter!("quarry_client_batches_decoded_total").increment(1);
                    if batch.schema_change().is_change() {
                        counter!("quarry_client_schema_changes_total").increment(1);
                        info!(
                            columns = ?batch.layout().names().collect::<Vec<_>>(),
                            "Result schema changed"
                        );
                    }
                    if let Some(renderer) = &self.renderer {
                        renderer.render(&batch);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to decode result chunk");
                    self.on_submission_failed(RpcError::SchemaChange(e));
                }
            }
        }

        if header.is_last_chunk && self.signal.close(Completion::Succeeded) {
            debug!(rows = self.rows.load(Ordering::SeqCst), "Last chunk received");
        }

        chunk.release();
    }

    fn on_submission_failed(&self, cause: RpcError) {
        let message = cause.to_string();
        if self.signal.close(Completion::Failed(cause)) {
            counter!("quarry_client_queries_failed_total").increment(1);
            warn!(cause = %message, "Query failed");
        } else {
            debug!(cause = %message, "Failure reported after the result stream closed, ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use bytes::Bytes;
    use quarry_common::error::DecodeError;
    use quarry_common::types::{ChunkHeader, ColumnDef, DataType};
    use quarry_protocol::vector::{encode_payload, ColumnVector};

    use crate::loader::DecodedBatch;

    fn int_layout(name: &str) -> Layout {
        Layout::new(vec![ColumnDef::plain(name, DataType::Int)])
    }

    fn chunk(name: &str, rows: u32, last: bool) -> QueryResultBatch {
        let layout = int_layout(name);
        let values = (0..rows).map(|r| Some(i32::try_from(r).unwrap())).collect();
        let payload = encode_payload(&layout, rows as usize, &[ColumnVector::Int(values)]).unwrap();
        QueryResultBatch::new(ChunkHeader::new(rows, layout, last), Some(payload))
    }

    fn empty_last(name: &str) -> QueryResultBatch {
        QueryResultBatch::new(ChunkHeader::new(0, int_layout(name), true), None)
    }

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<DecodedBatch>>,
    }

    impl BatchRenderer for Recorder {
        fn render(&self, batch: &DecodedBatch) {
            self.batches.lock().push(batch.clone());
        }
    }

    #[test]
    fn test_rows_are_summed_until_last_chunk() {
        let listener = QueryResultsListener::new();
        listener.on_chunk(chunk("a", 10, false));
        listener.on_chunk(chunk("a", 5, true));

        assert_eq!(listener.wait(), Ok(15));
        assert_eq!(listener.state(), ListenerState::ClosedNormal);
    }

    #[test]
    fn test_failure_hides_partial_count() {
        let listener = QueryResultsListener::new();
        listener.on_chunk(chunk("a", 3, false));
        listener.on_submission_failed(RpcError::Remote("backend OOM".into()));

        let err = listener.wait().unwrap_err();
        assert_eq!(err, QueryError::Failed(RpcError::Remote("backend OOM".into())));
        assert_eq!(err.to_string(), "backend OOM");
        assert_eq!(listener.state(), ListenerState::ClosedFailed);
    }

    #[test]
    fn test_short_payload_fails_the_query() {
        let listener = QueryResultsListener::new();
        let good = chunk("a", 2, false);
        let header = ChunkHeader::new(5, int_layout("a"), true);
        let payload = Bytes::copy_from_slice(good.data().unwrap());
        listener.on_chunk(QueryResultBatch::new(header, Some(payload)));

        match listener.wait() {
            Err(QueryError::Failed(RpcError::SchemaChange(DecodeError::Truncated { .. }))) => {}
            other => panic!("expected decode failure, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_chunk_counts_nothing_and_skips_decoding() {
        let recorder = Arc::new(Recorder::default());
        let listener = QueryResultsListener::new().with_renderer(recorder.clone());
        listener.on_chunk(chunk("a", 4, false));
        listener.on_chunk(empty_last("zzz"));

        assert_eq!(listener.wait(), Ok(4));
        assert_eq!(recorder.batches.lock().len(), 1);
        assert_eq!(listener.layout(), Some(int_layout("zzz")));
    }

    #[test]
    fn test_layout_follows_empty_last_chunk() {
        let listener = QueryResultsListener::new();
        listener.on_chunk(chunk("a", 1, false));
        assert_eq!(listener.layout(), Some(int_layout("a")));

        listener.on_chunk(empty_last("zzz"));
        assert_eq!(listener.wait(), Ok(1));
        assert_eq!(listener.layout(), Some(int_layout("zzz")));
    }

    #[test]
    fn test_layout_ignores_chunks_after_close() {
        let listener = QueryResultsListener::new();
        listener.on_chunk(chunk("a", 1, true));
        listener.on_chunk(chunk("b", 1, true));

        assert_eq!(listener.wait(), Ok(1));
        assert_eq!(listener.layout(), Some(int_layout("a")));
    }

    #[test]
    fn test_schema_change_is_rendered_with_new_columns() {
        let recorder = Arc::new(Recorder::default());
        let listener = QueryResultsListener::new().with_renderer(recorder.clone());
        listener.on_chunk(chunk("a", 2, false));
        listener.on_chunk(chunk("b", 1, true));

        assert_eq!(listener.wait(), Ok(3));
        let batches = recorder.batches.lock();
        assert_eq!(batches[0].layout().names().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(batches[1].layout().names().collect::<Vec<_>>(), vec!["b"]);
        assert!(batches[1].schema_change().is_change());
        assert_eq!(listener.layout(), Some(int_layout("b")));
    }

    #[test]
    fn test_callbacks_after_close_are_ignored() {
        let recorder = Arc::new(Recorder::default());
        let listener = QueryResultsListener::new().with_renderer(recorder.clone());
        listener.on_chunk(chunk("a", 1, true));
        listener.on_chunk(chunk("a", 7, true));
        listener.on_submission_failed(RpcError::Remote("late".into()));
        listener.on_submission_failed(RpcError::Remote("later".into()));

        assert_eq!(listener.wait(), Ok(1));
        assert_eq!(recorder.batches.lock().len(), 1);
    }

    #[test]
    fn test_first_failure_is_kept() {
        let listener = QueryResultsListener::new();
        listener.on_submission_failed(RpcError::Remote("first".into()));
        listener.on_submission_failed(RpcError::Remote("second".into()));
        listener.on_chunk(chunk("a", 1, true));

        assert_eq!(
            listener.wait(),
            Err(QueryError::Failed(RpcError::Remote("first".into())))
        );
    }

    #[test]
    fn test_query_id_is_recorded_once() {
        let listener = QueryResultsListener::new();
        let first = QueryId::new();
        listener.on_query_id(first);
        listener.on_query_id(QueryId::new());
        assert_eq!(listener.query_id(), Some(first));
    }

    #[test]
    fn test_wait_timeout_abandons_open_stream() {
        let listener = QueryResultsListener::new();
        listener.on_chunk(chunk("a", 2, false));

        assert_eq!(
            listener.wait_timeout(Duration::from_millis(10)),
            Err(QueryError::Abandoned {
                waited: Duration::from_millis(10)
            })
        );
        assert_eq!(listener.state(), ListenerState::Open);
    }

    #[test]
    fn test_waiter_sees_rows_from_transport_thread() {
        let listener = Arc::new(QueryResultsListener::new());
        let transport = {
            let listener = Arc::clone(&listener);
            thread::spawn(move || {
                for i in 0..50 {
                    listener.on_chunk(chunk("a", 2, i == 49));
                }
            })
        };

        assert_eq!(listener.wait(), Ok(100));
        transport.join().unwrap();
    }
}
