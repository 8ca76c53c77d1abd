//! Chunk decoding with layout tracking

use tracing::debug;

use quarry_common::error::DecodeError;
use quarry_common::types::{ChunkHeader, Layout};
use quarry_protocol::vector::{decode_payload, ColumnVector};

/// Layout transition applied while loading a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// The chunk used the layout already in effect
    Unchanged,
    /// The chunk's layout replaced `previous` (`None` for the first chunk)
    Replaced { previous: Option<Layout> },
}

impl SchemaChange {
    pub fn is_change(&self) -> bool {
        matches!(self, SchemaChange::Replaced { .. })
    }
}

/// Columnar contents of one decoded chunk
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBatch {
    layout: Layout,
    row_count: usize,
    columns: Vec<ColumnVector>,
    schema_change: SchemaChange,
}

impl DecodedBatch {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[ColumnVector] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnVector> {
        self.layout
            .names()
            .position(|n| n == name)
            .and_then(|i| self.columns.get(i))
    }

    pub fn schema_change(&self) -> &SchemaChange {
        &self.schema_change
    }
}

/// Decodes chunk payloads against the layout each chunk declares.
///
/// The loader remembers the last layout it saw. A chunk with a structurally
/// different layout replaces it before its payload is read, so a payload is
/// always decoded with its own layout. Decoded values are copied out; the
/// payload is not kept.
#[derive(Debug, Default)]
pub struct BatchLoader {
    layout: Option<Layout>,
    schema_changes: u64,
}

impl BatchLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout in effect, `None` before the first chunk
    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Number of layout replacements so far, including the first layout
    pub fn schema_changes(&self) -> u64 {
        self.schema_changes
    }

    /// Decode `payload` as described by `header`
    pub fn load(&mut self, header: &ChunkHeader, payload: &[u8]) -> Result<DecodedBatch, DecodeError> {
        let schema_change = self.adopt(&header.layout);
        let row_count = header.row_count as usize;
        let columns = decode_payload(&header.layout, row_count, payload)?;

        Ok(DecodedBatch {
            layout: header.layout.clone(),
            row_count,
            columns,
            schema_change,
        })
    }

    fn adopt(&mut self, layout: &Layout) -> SchemaChange {
        if self.layout.as_ref() == Some(layout) {
            return SchemaChange::Unchanged;
        }

        let previous = self.layout.replace(layout.clone());
        self.schema_changes += 1;
        debug!(
            columns = ?layout.names().collect::<Vec<_>>(),
            first = previous.is_none(),
            "Result layout replaced"
        );

        SchemaChange::Replaced { previous }
    }
}
