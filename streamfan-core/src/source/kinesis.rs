//! Kinesis-compatible record source
//!
//! Speaks the JSON 1.1 protocol (`X-Amz-Target: Kinesis_20131202.*`).
//! Requests are not SigV4-signed; point `source.endpoint` at a signing
//! gateway or a local emulator, optionally with a bearer token.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Record, RecordBatch, RecordSource};
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::models::StartPosition;

const TARGET_PREFIX: &str = "Kinesis_20131202";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetShardIteratorReq<'a> {
    stream_name: &'a str,
    shard_id: &'a str,
    shard_iterator_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    starting_sequence_number: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetShardIteratorResp {
    shard_iterator: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetRecordsReq<'a> {
    shard_iterator: &'a str,
    limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRecordsResp {
    #[serde(default)]
    records: Vec<WireRecord>,
    #[serde(default)]
    next_shard_iterator: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireRecord {
    sequence_number: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl WireError {
    /// `__type` may carry a namespace prefix, e.g. `com.amazonaws...#ExpiredIteratorException`
    fn code(&self) -> &str {
        self.error_type.rsplit('#').next().unwrap_or_default()
    }

    fn classify(self) -> SourceError {
        let code = self.code().to_string();
        match code.as_str() {
            "ResourceNotFoundException" => SourceError::ShardNotFound(self.message),
            "ExpiredIteratorException" | "InvalidArgumentException" => {
                SourceError::ExpiredCursor(format!("{code}: {}", self.message))
            }
            _ => SourceError::Other(format!("{code}: {}", self.message)),
        }
    }
}

pub struct KinesisRecordSource {
    endpoint: String,
    auth_token: Option<String>,
    client: Client,
}

impl KinesisRecordSource {
    #[must_use]
    pub fn new(config: &SourceConfig, client: Client) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            client,
        }
    }

    async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp, SourceError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(format!("{}/", self.endpoint))
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(serde_json::to_vec(body).map_err(|e| SourceError::Other(e.to_string()))?);

        if let Some(token) = &self.auth_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<WireError>(&bytes) {
                Ok(wire) if !wire.error_type.is_empty() => wire.classify(),
                _ => SourceError::Other(format!(
                    "{operation} responded with {status}: {}",
                    String::from_utf8_lossy(&bytes)
                )),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Other(format!("malformed {operation} response: {e}")))
    }
}

#[async_trait]
impl RecordSource for KinesisRecordSource {
    async fn acquire_cursor(
        &self,
        stream: &str,
        shard_id: &str,
        position: StartPosition,
    ) -> Result<String, SourceError> {
        let (shard_iterator_type, starting_sequence_number) = match &position {
            StartPosition::FromStart => ("TRIM_HORIZON", None),
            StartPosition::AfterSequenceNumber(seq) => ("AFTER_SEQUENCE_NUMBER", Some(seq.as_str())),
        };

        let resp: GetShardIteratorResp = self
            .call(
                "GetShardIterator",
                &GetShardIteratorReq {
                    stream_name: stream,
                    shard_id,
                    shard_iterator_type,
                    starting_sequence_number,
                },
            )
            .await?;

        Ok(resp.shard_iterator)
    }

    async fn read_records(&self, cursor: &str, limit: u32) -> Result<RecordBatch, SourceError> {
        let resp: GetRecordsResp = self
            .call(
                "GetRecords",
                &GetRecordsReq {
                    shard_iterator: cursor,
                    limit,
                },
            )
            .await?;

        let last_sequence_number = resp.records.last().map(|r| r.sequence_number.clone());
        let records = resp
            .records
            .into_iter()
            .filter_map(|wire| match BASE64.decode(wire.data.as_bytes()) {
                Ok(data) => Some(Record::new(wire.sequence_number, data)),
                Err(e) => {
                    warn!(
                        sequence_number = %wire.sequence_number,
                        error = %e,
                        "Skipping record with undecodable data"
                    );
                    None
                }
            })
            .collect();

        Ok(RecordBatch {
            records,
            next_cursor: resp.next_shard_iterator.filter(|c| !c.is_empty()),
            last_sequence_number,
        })
    }
}
