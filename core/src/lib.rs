//! Client-side sync engine for a revisioned to-do list service.
//!
//! # Overview
//! Reconciles a local, optimistically mutated item collection against a
//! remote authoritative list versioned by a single server-assigned
//! revision counter. Local edits land in the in-memory cache immediately;
//! a background worker pushes the whole valid item set tagged with the
//! last-known revision, merges the server's authoritative response back,
//! and adopts the new revision. Transient network failures retry with
//! capped exponential backoff; everything else surfaces once through the
//! observable sync status.
//!
//! # Design
//! - `ApiClient` splits each wire operation into `build_*` / `parse_*`
//!   halves around an [`HttpExecutor`] seam, so the protocol logic is
//!   deterministic and the transport is swappable (scripted in tests,
//!   reqwest-backed behind the `net` feature).
//! - `SyncService` serializes all cycles through one in-flight lock and
//!   tags each cycle with an epoch; stale responses can never reach the
//!   cache.
//! - UI layers observe a `watch`-based [`SyncStatus`] and change counter,
//!   never raw transport errors.
//! - Wire DTOs are defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod backoff;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod store;
pub mod sync;
pub mod types;
pub mod validation;

pub use backoff::Backoff;
pub use cache::ItemCache;
pub use client::ApiClient;
pub use config::{RetryPolicy, SyncConfig};
pub use error::SyncError;
pub use http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse};
#[cfg(feature = "net")]
pub use http::ReqwestExecutor;
pub use query::{Section, SortOption};
pub use store::{ItemStore, JsonFileStore, MemoryStore};
pub use sync::{SyncService, SyncStatus};
pub use types::{Category, Importance, Item, ItemDto};
