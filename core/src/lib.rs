//! Synchronous client for an Airtable-style table API.
//!
//! # Overview
//! `TableClient` turns create, read, update and delete calls against named
//! tables into one or more HTTP requests: writes and deletes are split into
//! batches of at most ten records, listings follow `offset` tokens, and the
//! results of every call are gathered into one `Accumulated` value.
//!
//! # Design
//! - `TableConfig` is resolved once (explicit values or the environment) and
//!   passed in; the client never reads the environment itself.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   the `Transport` trait is the only network boundary. `UreqTransport`
//!   (feature `ureq`, on by default) is the stock blocking implementation.
//! - Upstream error bodies are data, not errors: an operation that meets one
//!   stops and returns `Accumulated::Partial`. `ClientError` is reserved for
//!   configuration, validation, transport and decoding failures and for
//!   incomplete deletions.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{Page, TableClient, MAX_BATCH_SIZE};
pub use config::TableConfig;
pub use error::{ClientError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{
    Accumulated, CreateRecord, DeletedRecord, Fields, ListQuery, Payload, ReadResult, Record,
    UpdateRecord,
};
