//! Request builder and response parser for the list sync API.
//!
//! # Design
//! `ApiClient` splits every operation into a `build_*` method that produces
//! an `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`;
//! both sides are deterministic and free of I/O. The async round-trip
//! methods compose the two around an [`HttpExecutor`], so the same builders
//! and parsers back both the production path and scripted transports in
//! tests.
//!
//! Every response arrives in an envelope carrying the server's list
//! revision: `{"status", "list", "revision"}` for whole-list operations and
//! `{"status", "element", "revision"}` for element operations. The parsers
//! unwrap the envelope and hand back payload plus revision.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse};
use crate::types::ItemDto;

const REVISION_HEADER: &str = "X-Last-Known-Revision";

/// Client for the list sync API.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network; the executor performs the round trip in between.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: String,
    executor: Arc<dyn HttpExecutor>,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    status: String,
    list: Vec<ItemDto>,
    revision: i64,
}

#[derive(Debug, Deserialize)]
struct ElementEnvelope {
    status: String,
    element: ItemDto,
    revision: i64,
}

#[derive(Debug, Serialize)]
struct ListUpdateBody<'a> {
    list: &'a [ItemDto],
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str, executor: Arc<dyn HttpExecutor>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            executor,
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Authorization".to_string(), format!("Bearer {}", self.token)),
        ]
    }

    pub fn build_fetch_list(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/list", self.base_url),
            headers: self.headers(),
            body: None,
        }
    }

    /// Same request as [`build_fetch_list`](Self::build_fetch_list); the
    /// parser only extracts the revision.
    pub fn build_fetch_revision(&self) -> HttpRequest {
        self.build_fetch_list()
    }

    pub fn build_update_list(
        &self,
        items: &[ItemDto],
        known_revision: i64,
    ) -> Result<HttpRequest, SyncError> {
        let body = serde_json::to_string(&ListUpdateBody { list: items })
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        let mut headers = self.headers();
        headers.push((REVISION_HEADER.to_string(), known_revision.to_string()));
        Ok(HttpRequest {
            method: HttpMethod::Patch,
            path: format!("{}/list", self.base_url),
            headers,
            body: Some(body),
        })
    }

    pub fn build_fetch_item(&self, id: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/list/{id}", self.base_url),
            headers: self.headers(),
            body: None,
        }
    }

    pub fn build_add_item(&self, item: &ItemDto) -> Result<HttpRequest, SyncError> {
        let body =
            serde_json::to_string(item).map_err(|e| SyncError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/list", self.base_url),
            headers: self.headers(),
            body: Some(body),
        })
    }

    pub fn build_update_item(&self, item: &ItemDto) -> Result<HttpRequest, SyncError> {
        let body =
            serde_json::to_string(item).map_err(|e| SyncError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Put,
            path: format!("{}/list/{}", self.base_url, item.id),
            headers: self.headers(),
            body: Some(body),
        })
    }

    pub fn build_delete_item(&self, id: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}/list/{id}", self.base_url),
            headers: self.headers(),
            body: None,
        }
    }

    pub fn parse_fetch_list(&self, response: HttpResponse) -> Result<(Vec<ItemDto>, i64), SyncError> {
        read_list_envelope(response)
    }

    pub fn parse_fetch_revision(&self, response: HttpResponse) -> Result<i64, SyncError> {
        read_list_envelope(response).map(|(_, revision)| revision)
    }

    pub fn parse_update_list(
        &self,
        response: HttpResponse,
    ) -> Result<(Vec<ItemDto>, i64), SyncError> {
        read_list_envelope(response)
    }

    pub fn parse_fetch_item(&self, response: HttpResponse) -> Result<(ItemDto, i64), SyncError> {
        read_element_envelope(response)
    }

    pub fn parse_add_item(&self, response: HttpResponse) -> Result<(ItemDto, i64), SyncError> {
        read_element_envelope(response)
    }

    pub fn parse_update_item(&self, response: HttpResponse) -> Result<(ItemDto, i64), SyncError> {
        read_element_envelope(response)
    }

    pub fn parse_delete_item(&self, response: HttpResponse) -> Result<(ItemDto, i64), SyncError> {
        read_element_envelope(response)
    }

    /// GET /list, returning the whole list and the current revision.
    pub async fn fetch_list(&self) -> Result<(Vec<ItemDto>, i64), SyncError> {
        let response = self.executor.execute(self.build_fetch_list()).await?;
        self.parse_fetch_list(response)
    }

    /// GET /list, discarding the payload and returning only the revision.
    pub async fn fetch_revision(&self) -> Result<i64, SyncError> {
        let response = self.executor.execute(self.build_fetch_revision()).await?;
        self.parse_fetch_revision(response)
    }

    /// PATCH /list: replace the server list with `items`, preconditioned on
    /// `known_revision`. A stale revision comes back as a non-2xx and
    /// surfaces as `BadResponse`.
    pub async fn update_list(
        &self,
        items: &[ItemDto],
        known_revision: i64,
    ) -> Result<(Vec<ItemDto>, i64), SyncError> {
        let request = self.build_update_list(items, known_revision)?;
        let response = self.executor.execute(request).await?;
        self.parse_update_list(response)
    }

    /// GET /list/{id}. Unknown ids surface as `NotFound` carrying the id.
    pub async fn fetch_item(&self, id: &str) -> Result<(ItemDto, i64), SyncError> {
        let response = self.executor.execute(self.build_fetch_item(id)).await?;
        self.parse_fetch_item(response).map_err(|e| item_context(e, id))
    }

    /// POST /list with a bare DTO body.
    pub async fn add_item(&self, item: &ItemDto) -> Result<(ItemDto, i64), SyncError> {
        let request = self.build_add_item(item)?;
        let response = self.executor.execute(request).await?;
        self.parse_add_item(response)
    }

    /// PUT /list/{id} with a bare DTO body.
    pub async fn update_item(&self, item: &ItemDto) -> Result<(ItemDto, i64), SyncError> {
        let request = self.build_update_item(item)?;
        let response = self.executor.execute(request).await?;
        self.parse_update_item(response)
            .map_err(|e| item_context(e, &item.id))
    }

    /// DELETE /list/{id}, returning the deleted record.
    pub async fn delete_item(&self, id: &str) -> Result<(ItemDto, i64), SyncError> {
        let response = self.executor.execute(self.build_delete_item(id)).await?;
        self.parse_delete_item(response).map_err(|e| item_context(e, id))
    }
}

/// Map non-success status codes to the appropriate `SyncError` variant.
fn check_status(response: &HttpResponse) -> Result<(), SyncError> {
    match response.status {
        200..=299 => Ok(()),
        404 => {
            let detail = response.body.trim();
            let detail = if detail.is_empty() { "resource" } else { detail };
            Err(SyncError::NotFound(detail.to_string()))
        }
        status => Err(SyncError::bad_response(format!(
            "HTTP {status}: {}",
            response.body.trim()
        ))),
    }
}

fn check_envelope(status: &str) -> Result<(), SyncError> {
    if status == "ok" {
        Ok(())
    } else {
        Err(SyncError::BadStatus(status.to_string()))
    }
}

fn read_list_envelope(response: HttpResponse) -> Result<(Vec<ItemDto>, i64), SyncError> {
    check_status(&response)?;
    let envelope: ListEnvelope = decode(&response.body)?;
    check_envelope(&envelope.status)?;
    Ok((envelope.list, envelope.revision))
}

fn read_element_envelope(response: HttpResponse) -> Result<(ItemDto, i64), SyncError> {
    check_status(&response)?;
    let envelope: ElementEnvelope = decode(&response.body)?;
    check_envelope(&envelope.status)?;
    Ok((envelope.element, envelope.revision))
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, SyncError> {
    serde_json::from_str(body)
        .map_err(|e| SyncError::bad_response(format!("undecodable body: {e}")))
}

fn item_context(err: SyncError, id: &str) -> SyncError {
    match err {
        SyncError::NotFound(_) => SyncError::NotFound(id.to_string()),
        other => other,
    }
}
