//! Console rendering of decoded batches

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::warn;

use crate::loader::DecodedBatch;

/// Receives every successfully decoded batch
pub trait BatchRenderer: Send + Sync {
    fn render(&self, batch: &DecodedBatch);
}

/// Prints batches as text tables
pub struct TableRenderer {
    max_rows: usize,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TableRenderer {
    pub fn new(max_rows: usize, out: Box<dyn Write + Send>) -> Self {
        Self {
            max_rows,
            out: Mutex::new(out),
        }
    }

    pub fn stdout(max_rows: usize) -> Self {
        Self::new(max_rows, Box::new(io::stdout()))
    }
}

impl BatchRenderer for TableRenderer {
    fn render(&self, batch: &DecodedBatch) {
        let table = format_batch(batch, self.max_rows);
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(table.as_bytes()).and_then(|()| out.flush()) {
            warn!(error = %e, "Failed to render result batch");
        }
    }
}

/// Format at most `max_rows` rows of `batch` under its own column names
pub fn format_batch(batch: &DecodedBatch, max_rows: usize) -> String {
    let names: Vec<&str> = batch.layout().names().collect();
    let shown = batch.row_count().min(max_rows);

    let cells: Vec<Vec<String>> = (0..shown)
        .map(|row| {
            batch
                .columns()
                .iter()
                .map(|column| column.display_value(row))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    push_line(&mut output, names.iter().copied(), &widths);
    output.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    output.push('\n');
    for row in &cells {
        push_line(&mut output, row.iter().map(String::as_str), &widths);
    }
    if shown < batch.row_count() {
        output.push_str(&format!("({} of {} rows shown)\n", shown, batch.row_count()));
    }

    output
}

fn push_line<'a>(output: &mut String, values: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = values
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    output.push_str(line.trim_end());
    output.push('\n');
}
