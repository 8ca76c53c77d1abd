//! Column vectors and the chunk payload codec
//!
//! A payload is the concatenation of its columns in layout order. Each
//! column is written as:
//!
//! - `nullable` encoding: a validity bitmap of `ceil(rows / 8)` bytes (bit set
//!   means the value is present), then the plain encoding with null slots
//!   zero-filled (or empty for `varchar`)
//! - `bit`: a packed bitmap of `ceil(rows / 8)` bytes
//! - `int` / `bigint` / `float8`: little-endian fixed-width values
//! - `varchar`: `rows + 1` little-endian `u32` offsets starting at zero,
//!   followed by the UTF-8 bytes they index
//!
//! Bits are numbered LSB first within each byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use quarry_common::error::{DecodeError, Error, ProtocolError, Result};
use quarry_common::types::{ColumnDef, DataType, Encoding, Layout};

type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Decoded values of one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnVector {
    Bit(Vec<Option<bool>>),
    Int(Vec<Option<i32>>),
    BigInt(Vec<Option<i64>>),
    Float8(Vec<Option<f64>>),
    VarChar(Vec<Option<String>>),
}

impl ColumnVector {
    pub fn len(&self) -> usize {
        match self {
            ColumnVector::Bit(v) => v.len(),
            ColumnVector::Int(v) => v.len(),
            ColumnVector::BigInt(v) => v.len(),
            ColumnVector::Float8(v) => v.len(),
            ColumnVector::VarChar(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnVector::Bit(_) => DataType::Bit,
            ColumnVector::Int(_) => DataType::Int,
            ColumnVector::BigInt(_) => DataType::BigInt,
            ColumnVector::Float8(_) => DataType::Float8,
            ColumnVector::VarChar(_) => DataType::VarChar,
        }
    }

    /// Whether `row` holds no value. Rows past the end count as null.
    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnVector::Bit(v) => v.get(row).map_or(true, Option::is_none),
            ColumnVector::Int(v) => v.get(row).map_or(true, Option::is_none),
            ColumnVector::BigInt(v) => v.get(row).map_or(true, Option::is_none),
            ColumnVector::Float8(v) => v.get(row).map_or(true, Option::is_none),
            ColumnVector::VarChar(v) => v.get(row).map_or(true, Option::is_none),
        }
    }

    /// Printable form of the value at `row`
    pub fn display_value(&self, row: usize) -> String {
        fn show<T: ToString>(value: Option<&Option<T>>) -> String {
            match value {
                Some(Some(v)) => v.to_string(),
                _ => "null".to_string(),
            }
        }

        match self {
            ColumnVector::Bit(v) => show(v.get(row)),
            ColumnVector::Int(v) => show(v.get(row)),
            ColumnVector::BigInt(v) => show(v.get(row)),
            ColumnVector::Float8(v) => show(v.get(row)),
            ColumnVector::VarChar(v) => show(v.get(row)),
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a whole payload against `layout`.
///
/// Every column yields exactly `rows` values. Missing bytes and bytes left
/// over after the last column are both faults.
pub fn decode_payload(layout: &Layout, rows: usize, payload: &[u8]) -> DecodeResult<Vec<ColumnVector>> {
    let mut buf = payload;
    let columns = layout
        .columns()
        .iter()
        .map(|def| decode_column(def, rows, &mut buf))
        .collect::<DecodeResult<Vec<_>>>()?;

    if !buf.is_empty() {
        return Err(DecodeError::TrailingBytes(buf.len()));
    }

    Ok(columns)
}

/// Decode one column from the front of `buf`, advancing it past the column
pub fn decode_column(def: &ColumnDef, rows: usize, buf: &mut &[u8]) -> DecodeResult<ColumnVector> {
    let validity = match def.encoding {
        Encoding::Plain => None,
        Encoding::Nullable => Some(read_bitmap(take(buf, bitmap_len(rows), &def.name)?, rows)),
    };
    let present = |row: usize| validity.as_ref().map_or(true, |bits| bits[row]);

    let vector = match def.data_type {
        DataType::Bit => {
            let bits = read_bitmap(take(buf, bitmap_len(rows), &def.name)?, rows);
            ColumnVector::Bit(
                bits.into_iter()
                    .enumerate()
                    .map(|(row, bit)| present(row).then_some(bit))
                    .collect(),
            )
        }
        DataType::Int => {
            let mut raw = take_values(buf, def, rows)?;
            ColumnVector::Int(
                (0..rows)
                    .map(|row| {
                        let value = raw.get_i32_le();
                        present(row).then_some(value)
                    })
                    .collect(),
            )
        }
        DataType::BigInt => {
            let mut raw = take_values(buf, def, rows)?;
            ColumnVector::BigInt(
                (0..rows)
                    .map(|row| {
                        let value = raw.get_i64_le();
                        present(row).then_some(value)
                    })
                    .collect(),
            )
        }
        DataType::Float8 => {
            let mut raw = take_values(buf, def, rows)?;
            ColumnVector::Float8(
                (0..rows)
                    .map(|row| {
                        let value = raw.get_f64_le();
                        present(row).then_some(value)
                    })
                    .collect(),
            )
        }
        DataType::VarChar => ColumnVector::VarChar(decode_varchar(def, rows, buf, present)?),
    };

    Ok(vector)
}

fn decode_varchar(
    def: &ColumnDef,
    rows: usize,
    buf: &mut &[u8],
    present: impl Fn(usize) -> bool,
) -> DecodeResult<Vec<Option<String>>> {
    let mut raw = take(buf, (rows + 1).saturating_mul(4), &def.name)?;
    let offsets: Vec<usize> = (0..=rows).map(|_| raw.get_u32_le() as usize).collect();

    if offsets[0] != 0 {
        return Err(DecodeError::InvalidOffsets {
            column: def.name.clone(),
            reason: format!("first offset is {}", offsets[0]),
        });
    }
    if let Some(row) = offsets.windows(2).position(|w| w[1] < w[0]) {
        return Err(DecodeError::InvalidOffsets {
            column: def.name.clone(),
            reason: format!("offset {} goes backwards", row + 1),
        });
    }

    let data = take(buf, offsets[rows], &def.name)?;
    let mut values = Vec::with_capacity(rows);
    for row in 0..rows {
        if !present(row) {
            values.push(None);
            continue;
        }
        let text = std::str::from_utf8(&data[offsets[row]..offsets[row + 1]]).map_err(|_| {
            DecodeError::InvalidUtf8 {
                column: def.name.clone(),
                row,
            }
        })?;
        values.push(Some(text.to_string()));
    }

    Ok(values)
}

fn take<'a>(buf: &mut &'a [u8], needed: usize, column: &str) -> DecodeResult<&'a [u8]> {
    if buf.len() < needed {
        return Err(DecodeError::Truncated {
            column: column.to_string(),
            needed,
            remaining: buf.len(),
        });
    }
    let (head, tail) = buf.split_at(needed);
    *buf = tail;
    Ok(head)
}

/// Value bytes of a fixed-width column
fn take_values<'a>(buf: &mut &'a [u8], def: &ColumnDef, rows: usize) -> DecodeResult<&'a [u8]> {
    let width = def.data_type.fixed_width().unwrap_or_default();
    take(buf, rows.saturating_mul(width), &def.name)
}

fn bitmap_len(rows: usize) -> usize {
    rows.div_ceil(8)
}

fn read_bitmap(bytes: &[u8], rows: usize) -> Vec<bool> {
    (0..rows).map(|i| bytes[i / 8] & (1 << (i % 8)) != 0).collect()
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode `columns` (each holding `rows` values) as a payload for `layout`
pub fn encode_payload(layout: &Layout, rows: usize, columns: &[ColumnVector]) -> Result<Bytes> {
    if columns.len() != layout.len() {
        return Err(invalid(format!(
            "layout has {} columns but {} vectors were given",
            layout.len(),
            columns.len()
        )));
    }

    let mut out = BytesMut::new();
    for (def, vector) in layout.columns().iter().zip(columns) {
        if vector.len() != rows {
            return Err(invalid(format!(
                "column '{}' holds {} values, expected {}",
                def.name,
                vector.len(),
                rows
            )));
        }
        encode_column(def, vector, &mut out)?;
    }

    Ok(out.freeze())
}

/// Append one column to `out`
pub fn encode_column(def: &ColumnDef, vector: &ColumnVector, out: &mut BytesMut) -> Result<()> {
    if vector.data_type() != def.data_type {
        return Err(invalid(format!(
            "column '{}' is declared {} but holds {}",
            def.name,
            def.data_type,
            vector.data_type()
        )));
    }

    let rows = vector.len();
    match def.encoding {
        Encoding::Plain => {
            if let Some(row) = (0..rows).find(|&row| vector.is_null(row)) {
                return Err(invalid(format!(
                    "column '{}' is plain but row {} is null",
                    def.name, row
                )));
            }
        }
        Encoding::Nullable => write_bitmap(out, rows, (0..rows).map(|row| !vector.is_null(row))),
    }

    match vector {
        ColumnVector::Bit(values) => {
            write_bitmap(out, rows, values.iter().map(|v| v.unwrap_or(false)));
        }
        ColumnVector::Int(values) => values.iter().for_each(|v| out.put_i32_le(v.unwrap_or(0))),
        ColumnVector::BigInt(values) => values.iter().for_each(|v| out.put_i64_le(v.unwrap_or(0))),
        ColumnVector::Float8(values) => values.iter().for_each(|v| out.put_f64_le(v.unwrap_or(0.0))),
        ColumnVector::VarChar(values) => {
            let mut offset: u32 = 0;
            out.put_u32_le(offset);
            for value in values {
                let len = value.as_ref().map_or(0, String::len);
                offset = u32::try_from(len)
                    .ok()
                    .and_then(|len| offset.checked_add(len))
                    .ok_or_else(|| invalid(format!("column '{}' exceeds 4 GiB", def.name)))?;
                out.put_u32_le(offset);
            }
            for value in values.iter().flatten() {
                out.put_slice(value.as_bytes());
            }
        }
    }

    Ok(())
}

fn write_bitmap(out: &mut BytesMut, rows: usize, bits: impl Iterator<Item = bool>) {
    let mut bytes = vec![0u8; bitmap_len(rows)];
    for (i, bit) in bits.enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    out.put_slice(&bytes);
}

fn invalid(message: String) -> Error {
    ProtocolError::InvalidFormat(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new(vec![
            ColumnDef::plain("id", DataType::BigInt),
            ColumnDef::nullable("name", DataType::VarChar),
            ColumnDef::plain("active", DataType::Bit),
        ])
    }

    fn columns() -> Vec<ColumnVector> {
        vec![
            ColumnVector::BigInt(vec![Some(1), Some(2), Some(3)]),
            ColumnVector::VarChar(vec![Some("ann".into()), None, Some("cé".into())]),
            ColumnVector::Bit(vec![Some(true), Some(false), Some(true)]),
        ]
    }

    #[test]
    fn test_payload_survives_encode_and_decode() {
        let payload = encode_payload(&layout(), 3, &columns()).unwrap();
        let decoded = decode_payload(&layout(), 3, &payload).unwrap();
        assert_eq!(decoded, columns());
    }

    #[test]
    fn test_plain_int_wire_format() {
        let layout = Layout::new(vec![ColumnDef::plain("n", DataType::Int)]);
        let payload =
            encode_payload(&layout, 2, &[ColumnVector::Int(vec![Some(1), Some(-1)])]).unwrap();
        assert_eq!(&payload[..], &[1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_short_payload_is_truncated() {
        let payload = encode_payload(&layout(), 3, &columns()).unwrap();
        let err = decode_payload(&layout(), 5, &payload).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn test_truncation_reports_value_width() {
        let int = ColumnDef::plain("n", DataType::Int);
        let err = decode_column(&int, 3, &mut &[0u8; 11][..]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                column: "n".to_string(),
                needed: 12,
                remaining: 11,
            }
        );

        let float = ColumnDef::plain("x", DataType::Float8);
        let err = decode_column(&float, 2, &mut &[0u8; 15][..]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { needed: 16, remaining: 15, .. }));
    }

    #[test]
    fn test_leftover_bytes_are_rejected() {
        let mut payload = BytesMut::from(&encode_payload(&layout(), 3, &columns()).unwrap()[..]);
        payload.put_u8(7);
        let err = decode_payload(&layout(), 3, &payload).unwrap_err();
        assert_eq!(err, DecodeError::TrailingBytes(1));
    }

    #[test]
    fn test_backwards_offsets_are_rejected() {
        let layout = Layout::new(vec![ColumnDef::plain("s", DataType::VarChar)]);
        let mut payload = BytesMut::new();
        for offset in [0u32, 3, 1] {
            payload.put_u32_le(offset);
        }
        payload.put_slice(b"abc");
        let err = decode_payload(&layout, 2, &payload).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidOffsets { .. }));
    }

    #[test]
    fn test_zero_rows_of_varchar_still_carry_one_offset() {
        let layout = Layout::new(vec![ColumnDef::plain("s", DataType::VarChar)]);
        let payload = encode_payload(&layout, 0, &[ColumnVector::VarChar(vec![])]).unwrap();
        assert_eq!(payload.len(), 4);
        assert_eq!(
            decode_payload(&layout, 0, &payload).unwrap(),
            vec![ColumnVector::VarChar(vec![])]
        );
    }

    #[test]
    fn test_null_in_plain_column_cannot_be_encoded() {
        let layout = Layout::new(vec![ColumnDef::plain("n", DataType::Int)]);
        assert!(encode_payload(&layout, 1, &[ColumnVector::Int(vec![None])]).is_err());
    }

    #[test]
    fn test_type_mismatch_cannot_be_encoded() {
        let layout = Layout::new(vec![ColumnDef::plain("n", DataType::Int)]);
        assert!(encode_payload(&layout, 1, &[ColumnVector::BigInt(vec![Some(1)])]).is_err());
    }

    #[test]
    fn test_display_value() {
        let column = ColumnVector::Float8(vec![Some(1.5), None]);
        assert_eq!(column.display_value(0), "1.5");
        assert_eq!(column.display_value(1), "null");
        assert_eq!(column.display_value(9), "null");
    }
}
