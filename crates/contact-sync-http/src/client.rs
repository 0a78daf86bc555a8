/// REST transport for hotel contact collections
///
/// `GET|POST|DELETE {base}/hotels/{hotel}/{emails|phones}` with JSON bodies keyed by
/// the contact kind (`{"email": ...}` / `{"phone": ...}`). Every request carries the
/// configured bearer token.
use contact_sync::{ContactKind, ContactTransport, ParentId, PersistedId, SnapshotEntry, TransportError};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::ApiConfig;

pub struct HttpTransport {
    base_url: Url,
    token: Option<String>,
    client: Client,
}

impl HttpTransport {
    /// Build the shared client. A bad base URL or client setup leaves the transport unusable.
    pub fn new(config: ApiConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            TransportError::Unavailable(format!("invalid base url '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Unavailable(format!(
                "base url '{}' cannot hold a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        Ok(Self {
            token: config.bearer_token().map(str::to_string),
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn collection_url(&self, parent: &ParentId, kind: ContactKind) -> Url {
        let mut url = self.base_url.clone();
        // checked in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["hotels", parent.as_str(), collection_segment(kind)]);
        }
        url
    }

    fn request(
        &self,
        method: Method,
        parent: &ParentId,
        kind: ContactKind,
    ) -> Result<RequestBuilder, TransportError> {
        let token = self.token.as_deref().ok_or_else(|| {
            TransportError::Unauthorized("no session token configured".to_string())
        })?;
        let url = self.collection_url(parent, kind);
        debug!("{} {}", method, url);

        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, TransportError> {
        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(request_error)?;

        if status.is_success() {
            return Ok(body);
        }
        Err(status_error(status, body))
    }
}

fn collection_segment(kind: ContactKind) -> &'static str {
    match kind {
        ContactKind::Email => "emails",
        ContactKind::Phone => "phones",
    }
}

fn value_body(kind: ContactKind, value: &str) -> Value {
    let mut body = Map::new();
    body.insert(kind.as_str().to_string(), Value::String(value.to_string()));
    Value::Object(body)
}

/// A refused or unreachable connection means no later call can succeed either
fn request_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() || err.is_connect() {
        TransportError::Unavailable(err.to_string())
    } else if err.is_decode() {
        TransportError::InvalidResponse(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

fn status_error(status: StatusCode, body: String) -> TransportError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TransportError::Unauthorized(format!("{}: {}", status.as_u16(), message))
        }
        _ => TransportError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

/// Ids come back as numbers or strings depending on the backend
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowId {
    Number(i64),
    Text(String),
}

impl From<RowId> for PersistedId {
    fn from(id: RowId) -> Self {
        match id {
            RowId::Number(n) => PersistedId(n.to_string()),
            RowId::Text(s) => PersistedId(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    id: RowId,
    #[serde(alias = "email", alias = "phone")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRow {
    id: RowId,
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, TransportError> {
    serde_json::from_str(body).map_err(|e| TransportError::InvalidResponse(e.to_string()))
}

#[async_trait::async_trait]
impl ContactTransport for HttpTransport {
    async fn fetch_snapshot(
        &self,
        parent: &ParentId,
        kind: ContactKind,
    ) -> Result<Vec<SnapshotEntry>, TransportError> {
        let request = self.request(Method::GET, parent, kind)?;
        let body = self.send(request).await?;
        let rows: Vec<ContactRow> = decode(&body)?;

        Ok(rows
            .into_iter()
            .map(|row| SnapshotEntry {
                id: row.id.into(),
                value: row.value,
            })
            .collect())
    }

    async fn add_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<PersistedId, TransportError> {
        let request = self
            .request(Method::POST, parent, kind)?
            .json(&value_body(kind, value));
        let body = self.send(request).await?;
        let created: CreatedRow = decode(&body)?;

        Ok(created.id.into())
    }

    async fn delete_value(
        &self,
        parent: &ParentId,
        kind: ContactKind,
        value: &str,
    ) -> Result<(), TransportError> {
        let request = self
            .request(Method::DELETE, parent, kind)?
            .json(&value_body(kind, value));
        self.send(request).await?;

        Ok(())
    }
}
