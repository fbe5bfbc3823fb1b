use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_IN_FILE_SHARER_MODE: &str = "IN_FILE_SHARER_MODE";

/// One routing-history snapshot as reported by the tracer node.
/// Replaced wholesale on every successful fetch; never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub start_up_timestamp: i64,
    pub ser_messages: BTreeMap<u64, SerMessage>,
    pub ser_super_peer_messages: BTreeMap<u64, SerSuperPeerMessage>,
    pub bootstrapping_message_count: u64,
    pub maintenance_message_count: u64,
}

/// Record of one query-response cycle. An empty `hop_counts` means the
/// query never got a response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SerMessage {
    pub query: String,
    pub messages_count: u64,
    pub hop_counts: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SerSuperPeerMessage {
    pub messages_count: u64,
    pub hop_counts: Vec<u64>,
}

/// Classification of one fetch response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// SUCCESS payload that parsed cleanly.
    Snapshot(History),
    /// The node is running in file sharer mode; the trace view does not apply.
    ModeMismatch,
    /// Anything else: unknown status, malformed payload, transport failure.
    Reset,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("SUCCESS response carried no data payload")]
    MissingData,
    #[error("invalid snapshot field: {0}")]
    Field(#[from] serde_json::Error),
    #[error("sequence number {0:?} is not an integer")]
    BadSequenceKey(String),
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    status: Option<String>,
    data: Option<serde_json::Value>,
}

// Sequence numbers arrive as JSON object property names, so the maps are
// keyed by strings on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistory {
    start_up_time_stamp: i64,
    ser_messages: BTreeMap<String, SerMessage>,
    ser_super_peer_messages: BTreeMap<String, SerSuperPeerMessage>,
    bootstrapping_message_count: u64,
    maintenance_message_count: u64,
}

/// Classify a raw response body. A malformed SUCCESS payload folds into
/// `Reset`, same as a transport failure; nothing here is fatal.
pub fn classify_response(body: &str) -> FetchOutcome {
    let raw: RawResponse = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("history response is not valid JSON: {err}");
            return FetchOutcome::Reset;
        }
    };

    match raw.status.as_deref() {
        Some(STATUS_SUCCESS) => match parse_history(raw.data) {
            Ok(history) => FetchOutcome::Snapshot(history),
            Err(err) => {
                warn!("malformed history snapshot: {err}");
                FetchOutcome::Reset
            }
        },
        Some(STATUS_IN_FILE_SHARER_MODE) => FetchOutcome::ModeMismatch,
        _ => FetchOutcome::Reset,
    }
}

fn parse_history(data: Option<serde_json::Value>) -> Result<History, SnapshotError> {
    let data = data.ok_or(SnapshotError::MissingData)?;
    let raw: RawHistory = serde_json::from_value(data)?;

    Ok(History {
        start_up_timestamp: raw.start_up_time_stamp,
        ser_messages: parse_keys(raw.ser_messages)?,
        ser_super_peer_messages: parse_keys(raw.ser_super_peer_messages)?,
        bootstrapping_message_count: raw.bootstrapping_message_count,
        maintenance_message_count: raw.maintenance_message_count,
    })
}

fn parse_keys<V>(raw: BTreeMap<String, V>) -> Result<BTreeMap<u64, V>, SnapshotError> {
    raw.into_iter()
        .map(|(key, value)| match key.parse::<u64>() {
            Ok(seq) => Ok((seq, value)),
            Err(_) => Err(SnapshotError::BadSequenceKey(key)),
        })
        .collect()
}
