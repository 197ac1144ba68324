// src/core/protocol.rs

//! Wire types for the duplex cluster protocol carried over `/ws`.
//!
//! Every frame is `{type: int, body: any}`. `body` is untyped JSON until the
//! dispatcher in `connection::handler` looks at `type` and re-decodes it
//! into the shape appropriate for that message, tolerating extra fields and
//! dropping (with a log line) on mismatch.

use crate::core::cluster::partition::Block;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable message-type enumeration carried in `Packet.type`. Numeric values
/// are part of the wire contract and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Handshaking = 0,
    ShardData = 1,
    Ping = 2,
    PingAck = 3,
    Eval = 4,
    BroadcastEval = 5,
    BroadcastEvalAck = 6,
    Stats = 7,
    StatsAck = 8,
    Ready = 9,
    Entity = 10,
    EntityAck = 11,
}

/// A raw frame as it appears on the wire: `{type, body}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "type")]
    pub ty: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Packet {
    pub fn new<T: Serialize>(ty: MessageType, body: T) -> serde_json::Result<Self> {
        Ok(Self {
            ty: ty as u8,
            body: Some(serde_json::to_value(body)?),
        })
    }

    pub fn empty(ty: MessageType) -> Self {
        Self {
            ty: ty as u8,
            body: None,
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.ty)
    }

    pub fn body_as<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        self.body
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}

impl MessageType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Handshaking,
            1 => Self::ShardData,
            2 => Self::Ping,
            3 => Self::PingAck,
            4 => Self::Eval,
            5 => Self::BroadcastEval,
            6 => Self::BroadcastEvalAck,
            7 => Self::Stats,
            8 => Self::StatsAck,
            9 => Self::Ready,
            10 => Self::Entity,
            11 => Self::EntityAck,
            _ => return None,
        })
    }
}

/// `ShardData` body: `server -> client`, sent once on handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardData {
    pub id: usize,
    pub block: Block,
}

/// A caller-originated (or cluster-originated `BroadcastEval`) eval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRequest {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub timeout: i64,
}

/// Implemented by reply types that carry the scatter/gather correlation ID
/// in an `id` field, so `scatter()` can scrub it before a result reaches a
/// caller — the ID is an internal per-slot request key, not part of the
/// `{res}`/`{error}` reply shape callers see.
pub trait CorrelatedReply {
    fn clear_id(&mut self);
}

/// A single slot's eval result, or a synthetic error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvalRes {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvalRes {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            res: None,
            error: Some(msg.into()),
        }
    }
}

impl CorrelatedReply for EvalRes {
    fn clear_id(&mut self) {
        self.id.clear();
    }
}

/// The aggregated reply sent back to a cluster that issued `BroadcastEval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEvalResponse {
    pub id: String,
    pub results: Vec<EvalRes>,
}

/// An external or cluster-originated entity-fetch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// A single slot's entity-fetch result, or a synthetic error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EntityResponse {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            error: Some(msg.into()),
            data: None,
        }
    }
}

impl CorrelatedReply for EntityResponse {
    fn clear_id(&mut self) {
        self.id.clear();
    }
}

/// Numeric + labelled-dictionary stats a cluster reports on `StatsAck`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterStats {
    #[serde(default)]
    pub uptime: f64,
    #[serde(default)]
    pub servers: f64,
    #[serde(default)]
    pub users: f64,
    #[serde(default)]
    pub shards: f64,
    #[serde(default, rename = "readyShards")]
    pub ready_shards: f64,
    #[serde(default, rename = "memoryUsage")]
    pub memory_usage: f64,
    #[serde(default, rename = "messagesSeen")]
    pub messages_seen: f64,
    #[serde(default, rename = "commandErrors")]
    pub command_errors: std::collections::HashMap<String, f64>,
    #[serde(default, rename = "commandUsage")]
    pub command_usage: std::collections::HashMap<String, f64>,
    #[serde(default, rename = "botEvents")]
    pub event_counts: std::collections::HashMap<String, f64>,
}

/// Uniform HTTP response envelope for `/eval`, `/entity`, `/shardCount`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiResponse<T> {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            error: false,
            message: None,
            data: Some(data),
        }
    }

    pub fn err(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            error: true,
            message: Some(message.into()),
            data: None,
        }
    }
}
