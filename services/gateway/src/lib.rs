//! Resource Store Gateway
//!
//! A small JSON HTTP service in front of a key-value store. It keeps two
//! independent, bounded, newest-first lists:
//!
//! - **Videos** (`/api/videos`): arbitrary client records with a server-assigned
//!   id and `addedAt`, each with an optional playback progress record stored
//!   under its own key.
//! - **Submissions** (`/api/submissions`): URLs checked for an `http(s)://`
//!   scheme, stamped with the submitting client's address and user agent.
//!
//! ## Architecture
//!
//! ```text
//!  HTTP client
//!      │
//!      ▼
//! ┌──────────────┐   CORS headers, OPTIONS preflight,
//! │ api (axum)   │   404 fallback, panic guard, tracing
//! └──────────────┘
//!      │
//!      ├──────────────────┐
//!      ▼                  ▼
//! ┌──────────────┐  ┌──────────────┐
//! │ videos       │  │ submissions  │   read → mutate → write whole list
//! └──────────────┘  └──────────────┘
//!      │                  │
//!      └────────┬─────────┘
//!               ▼
//!      ┌─────────────────┐
//!      │ KeyValueStore   │   MemoryStore | PgStore
//!      └─────────────────┘
//! ```
//!
//! Concurrent writers to the same list are not serialized; the last write wins.

pub mod api;
pub mod config;
pub mod error;
pub mod ids;
pub mod kv_store;
pub mod pg_store;
pub mod submissions;
pub mod videos;

pub use crate::api::{create_router, start_api_server, AppState};
pub use crate::config::Config;
pub use crate::error::{GatewayError, StoreError};
pub use crate::kv_store::{KeyValueStore, MemoryStore};
pub use crate::pg_store::PgStore;
pub use crate::submissions::{ClientInfo, NewSubmission, Submission};
pub use crate::videos::{Progress, ProgressUpdate, Video};
