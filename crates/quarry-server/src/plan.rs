//! Plan documents understood by the embedded backend
//!
//! Logical and physical plans are JSON:
//!
//! ```json
//! { "fragments": [
//!     { "columns": [ { "name": "id", "type": "bigint" },
//!                    { "name": "note", "type": "varchar", "encoding": "nullable" } ],
//!       "rows": [ [1, "a"], [2, null] ] }
//! ] }
//! ```
//!
//! Fragments are emitted in order; each one declares its own columns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quarry_common::error::PlanError;
use quarry_common::types::{ColumnDef, DataType, Encoding, QueryType};
use quarry_protocol::vector::ColumnVector;

/// A parsed plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub fragments: Vec<Fragment>,
}

/// Rows sharing one column layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Plan {
    /// Parse plan text of the given type
    pub fn parse(query_type: QueryType, text: &str) -> Result<Self, PlanError> {
        match query_type {
            QueryType::Sql => Err(PlanError::Unsupported(QueryType::Sql)),
            QueryType::Logical | QueryType::Physical => {
                let plan: Plan =
                    serde_json::from_str(text).map_err(|e| PlanError::ParseError(e.to_string()))?;
                plan.validate()?;
                Ok(plan)
            }
        }
    }

    fn validate(&self) -> Result<(), PlanError> {
        for (fragment, f) in self.fragments.iter().enumerate() {
            if f.columns.is_empty() {
                return Err(PlanError::EmptyLayout { fragment });
            }
            if let Some((row, values)) = f
                .rows
                .iter()
                .enumerate()
                .find(|(_, values)| values.len() != f.columns.len())
            {
                return Err(PlanError::RowWidth {
                    fragment,
                    row,
                    expected: f.columns.len(),
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }
}

impl Fragment {
    /// Build the vector for column `index` over `rows`, numbered from `first_row`
    pub fn column(&self, index: usize, rows: &[Vec<Value>], first_row: usize) -> Result<ColumnVector, PlanError> {
        let def = &self.columns[index];
        let cells: Vec<&Value> = rows.iter().map(|row| &row[index]).collect();

        let vector = match def.data_type {
            DataType::Bit => ColumnVector::Bit(values(def, &cells, first_row, Value::as_bool)?),
            DataType::Int => ColumnVector::Int(values(def, &cells, first_row, |v| {
                v.as_i64().and_then(|n| i32::try_from(n).ok())
            })?),
            DataType::BigInt => ColumnVector::BigInt(values(def, &cells, first_row, Value::as_i64)?),
            DataType::Float8 => ColumnVector::Float8(values(def, &cells, first_row, Value::as_f64)?),
            DataType::VarChar => ColumnVector::VarChar(values(def, &cells, first_row, |v| {
                v.as_str().map(String::from)
            })?),
        };

        Ok(vector)
    }
}

fn values<T>(
    def: &ColumnDef,
    cells: &[&Value],
    first_row: usize,
    extract: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>, PlanError> {
    cells
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let row = first_row + i;
            if value.is_null() {
                return match def.encoding {
                    Encoding::Nullable => Ok(None),
                    Encoding::Plain => Err(mismatch(def, row, format!("non-null {}", def.data_type))),
                };
            }
            extract(value)
                .map(Some)
                .ok_or_else(|| mismatch(def, row, def.data_type.to_string()))
        })
        .collect()
}

fn mismatch(def: &ColumnDef, row: usize, expected: String) -> PlanError {
    PlanError::TypeMismatch {
        column: def.name.clone(),
        row,
        expected,
    }
}
