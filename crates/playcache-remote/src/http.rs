//! HTTP gateway backed by reqwest

use async_trait::async_trait;
use playcache_api::{Payload, RecordKind, SyncRecord};
use playcache_util::{OwnerId, RecordId};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::{GatewayError, GatewayResult, RemoteGateway};

const MAX_LOG_BODY_CHARS: usize = 500;
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Body posted for every record. Local bookkeeping (sync state, attempts,
/// read flag, local-only references) never leaves the device.
#[derive(Debug, Serialize)]
pub struct PushBody<'a> {
    pub id: &'a RecordId,
    pub owner_id: &'a OwnerId,
    pub created_at: i64,
    #[serde(flatten)]
    pub payload: &'a Payload,
}

impl<'a> From<&'a SyncRecord> for PushBody<'a> {
    fn from(record: &'a SyncRecord) -> Self {
        Self {
            id: &record.id,
            owner_id: &record.owner_id,
            created_at: record.created_at,
            payload: &record.payload,
        }
    }
}

/// Gateway that POSTs records to `{base_url}/sync/{kind}`
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, kind: RecordKind) -> String {
        format!("{}/sync/{}", self.base_url, kind)
    }

    fn headers(&self) -> GatewayResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let request_id = HeaderValue::from_str(&Uuid::new_v4().to_string())
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        headers.insert(REQUEST_ID_HEADER, request_id);

        if let Some(token) = &self.token {
            let auth = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| GatewayError::Config("Invalid access token format".into()))?;
            headers.insert(AUTHORIZATION, auth);
        }

        Ok(headers)
    }
}

fn preview(body: &str) -> String {
    let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        preview.push_str("...");
    }
    preview
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn push(&self, kind: RecordKind, record: &SyncRecord) -> GatewayResult<()> {
        let body = serde_json::to_vec(&PushBody::from(record))?;
        let url = self.endpoint(kind);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(record_id = %record.id, status = %status, "Record accepted by remote");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        debug!(record_id = %record.id, status = %status, body = %preview(&text), "Remote refused record");
        Err(GatewayError::from_status(status.as_u16(), preview(&text)))
    }

    fn name(&self) -> &str {
        "http"
    }
}
