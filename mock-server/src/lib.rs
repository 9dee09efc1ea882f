use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

/// Wire representation of a list element. Defined independently from the
/// client crate so integration tests catch schema drift.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub text: String,
    pub importance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_at: Option<i64>,
    pub last_updated_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub status: String,
    pub list: Vec<Element>,
    pub revision: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ElementResponse {
    pub status: String,
    pub element: Element,
    pub revision: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListUpdate {
    pub list: Vec<Element>,
}

/// The whole server state: one list and one revision counter, bumped on
/// every successful mutation.
#[derive(Debug, Default)]
pub struct ListState {
    pub items: Vec<Element>,
    pub revision: i64,
}

pub type Db = Arc<RwLock<ListState>>;

const REVISION_HEADER: &str = "x-last-known-revision";

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(ListState::default()));
    Router::new()
        .route("/list", get(get_list).post(add_element).patch(update_list))
        .route(
            "/list/{id}",
            get(get_element).put(update_element).delete(delete_element),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Any non-empty bearer token is accepted; requests without one get 401.
fn require_bearer(headers: &HeaderMap) -> Result<(), Response> {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty());
    if authorized {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized"))
    }
}

fn known_revision(headers: &HeaderMap) -> Option<i64> {
    headers.get(REVISION_HEADER)?.to_str().ok()?.parse().ok()
}

fn error_response(code: StatusCode, status: &str) -> Response {
    (code, Json(serde_json::json!({ "status": status }))).into_response()
}

fn list_response(state: &ListState) -> Response {
    Json(ListResponse {
        status: "ok".to_string(),
        list: state.items.clone(),
        revision: state.revision,
    })
    .into_response()
}

fn element_response(element: Element, revision: i64) -> Response {
    Json(ElementResponse {
        status: "ok".to_string(),
        element,
        revision,
    })
    .into_response()
}

async fn get_list(State(db): State<Db>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_bearer(&headers) {
        return resp;
    }
    let state = db.read().await;
    list_response(&state)
}

/// Whole-list replace, preconditioned on the client's last-known revision.
async fn update_list(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ListUpdate>,
) -> Response {
    if let Err(resp) = require_bearer(&headers) {
        return resp;
    }
    let Some(known) = known_revision(&headers) else {
        return error_response(StatusCode::BAD_REQUEST, "bad request");
    };
    let mut state = db.write().await;
    if known != state.revision {
        debug!(known, current = state.revision, "rejecting stale list update");
        return error_response(StatusCode::BAD_REQUEST, "unsynchronized");
    }
    state.items = input.list;
    state.revision += 1;
    debug!(revision = state.revision, items = state.items.len(), "list replaced");
    list_response(&state)
}

async fn get_element(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = require_bearer(&headers) {
        return resp;
    }
    let state = db.read().await;
    match state.items.iter().find(|e| e.id == id) {
        Some(element) => element_response(element.clone(), state.revision),
        None => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn add_element(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(element): Json<Element>,
) -> Response {
    if let Err(resp) = require_bearer(&headers) {
        return resp;
    }
    let mut state = db.write().await;
    if state.items.iter().any(|e| e.id == element.id) {
        return error_response(StatusCode::BAD_REQUEST, "duplicate id");
    }
    state.items.push(element.clone());
    state.revision += 1;
    element_response(element, state.revision)
}

async fn update_element(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(element): Json<Element>,
) -> Response {
    if let Err(resp) = require_bearer(&headers) {
        return resp;
    }
    let mut state = db.write().await;
    let found = match state.items.iter_mut().find(|e| e.id == id) {
        Some(slot) => {
            *slot = element.clone();
            true
        }
        None => false,
    };
    if !found {
        return error_response(StatusCode::NOT_FOUND, "not found");
    }
    state.revision += 1;
    element_response(element, state.revision)
}

async fn delete_element(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = require_bearer(&headers) {
        return resp;
    }
    let mut state = db.write().await;
    match state.items.iter().position(|e| e.id == id) {
        Some(index) => {
            let element = state.items.remove(index);
            state.revision += 1;
            element_response(element, state.revision)
        }
        None => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str) -> Element {
        Element {
            id: id.to_string(),
            text: "Test".to_string(),
            importance: "normal".to_string(),
            deadline: None,
            done: false,
            color: None,
            created_at: 1_700_000_000,
            changed_at: None,
            last_updated_by: "device-1".to_string(),
        }
    }

    #[test]
    fn element_serializes_without_absent_optionals() {
        let json = serde_json::to_value(element("a1")).unwrap();
        assert_eq!(json["id"], "a1");
        assert_eq!(json["importance"], "normal");
        assert!(json.get("deadline").is_none());
        assert!(json.get("color").is_none());
        assert!(json.get("changed_at").is_none());
    }

    #[test]
    fn element_roundtrips_through_json() {
        let mut original = element("a2");
        original.deadline = Some(1_700_086_400);
        original.color = Some("#FF3B30".to_string());
        let json = serde_json::to_string(&original).unwrap();
        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, original.id);
        assert_eq!(back.deadline, original.deadline);
        assert_eq!(back.color, original.color);
    }

    #[test]
    fn element_rejects_missing_text() {
        let result: Result<Element, _> = serde_json::from_str(
            r#"{"id":"a","importance":"low","done":false,"created_at":1,"last_updated_by":"d"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn list_update_requires_list_field() {
        let result: Result<ListUpdate, _> = serde_json::from_str(r#"{}"#);
        assert!(result.is_err());
        let ok: ListUpdate = serde_json::from_str(r#"{"list":[]}"#).unwrap();
        assert!(ok.list.is_empty());
    }
}
