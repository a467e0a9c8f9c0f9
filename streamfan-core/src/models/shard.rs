use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One partition of a stream's log and its read progress.
///
/// Identity is `id`; owners key shards by it (see [`super::Stream`]). Use
/// [`Shard::same_partition`] for identity. The derived `PartialEq` compares
/// the full progress state and is meant for snapshots and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shard {
    pub id: String,

    /// Position of the last record read; `None` until something was read
    #[serde(
        default,
        alias = "sequence_number",
        serialize_with = "none_as_empty",
        deserialize_with = "empty_as_none"
    )]
    pub sequence_number: Option<String>,

    /// Held continuation token (shard iterator)
    #[serde(
        default,
        alias = "next_shard_iterator",
        serialize_with = "none_as_empty",
        deserialize_with = "empty_as_none"
    )]
    pub cursor: Option<String>,
}

impl Shard {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence_number: None,
            cursor: None,
        }
    }

    #[must_use]
    pub fn with_sequence_number(mut self, sequence_number: impl Into<String>) -> Self {
        self.sequence_number = Some(sequence_number.into());
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Whether `other` is the same partition, regardless of read progress
    #[must_use]
    pub fn same_partition(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Where a freshly acquired cursor must start reading
    #[must_use]
    pub fn start_position(&self) -> StartPosition {
        match &self.sequence_number {
            Some(seq) => StartPosition::AfterSequenceNumber(seq.clone()),
            None => StartPosition::FromStart,
        }
    }
}

/// Cursor acquisition mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPosition {
    /// Earliest retained record (trim horizon)
    FromStart,
    /// Immediately after the given sequence number
    AfterSequenceNumber(String),
}

fn none_as_empty<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

// Older snapshots wrote `{}` for a missing iterator, so anything that is not
// a non-empty string reads as absent.
fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}
