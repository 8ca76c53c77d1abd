//! Wire frames exchanged between a client and a backend
//!
//! Each frame is a bincode body behind a 4-byte big-endian length prefix
//! (`LengthDelimitedCodec`). A client sends one `Submit`; the backend answers
//! with a `QueryId`, then `Chunk`s up to the one marked last, or a `Failed`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::codec::LengthDelimitedCodec;

use quarry_common::error::{Error, ProtocolError, Result};
use quarry_common::types::{ChunkHeader, QueryId, QueryType};

/// Largest frame accepted on either side
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientFrame {
    Submit { query_type: QueryType, plan: String },
}

/// Frames sent by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerFrame {
    QueryId(QueryId),
    Chunk { header: ChunkHeader, payload: Bytes },
    Failed { message: String },
}

impl ClientFrame {
    pub fn encode(&self) -> Result<Bytes> {
        encode(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        decode(data)
    }
}

impl ServerFrame {
    pub fn encode(&self) -> Result<Bytes> {
        encode(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        decode(data)
    }
}

/// Codec framing both directions of a connection
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

fn encode<T: Serialize>(frame: &T) -> Result<Bytes> {
    bincode::serialize(frame)
        .map(Bytes::from)
        .map_err(|e| Error::Serialization(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    bincode::deserialize(data).map_err(|e| ProtocolError::InvalidFormat(e.to_string()).into())
}
