//! Request builder, response parser and batched operations for one base.
//!
//! # Design
//! `TableClient` holds the resolved `TableConfig` and a `Transport`. It keeps
//! no state between calls. Each upstream call is split into a `build_*` method
//! that produces an `HttpRequest` and a `parse_*` method that reads an
//! `HttpResponse`; the operations (`create`, `get`, `list`, `update`,
//! `delete`) loop those over batches of at most `MAX_BATCH_SIZE` entries or
//! over `offset` pages, sending through the transport one request at a time.
//!
//! Every accumulating operation stops at the first response without a
//! `records` key and returns `Accumulated::Partial` with what it gathered so
//! far. Nothing is retried.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TableConfig;
use crate::error::{ClientError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::{
    Accumulated, CreateRecord, DeletedRecord, ListQuery, Payload, ReadResult, Record,
    UpdateRecord,
};

/// Upstream limit of records per create, update or delete request.
pub const MAX_BATCH_SIZE: usize = 10;

/// Characters escaped in table names and record ids used as path segments.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One parsed response of a records endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Page<R> {
    Records {
        records: Vec<R>,
        offset: Option<String>,
    },
    /// The body had no `records` key; it is returned untouched.
    Upstream(Value),
}

/// Synchronous client for the tables of one base.
#[derive(Debug, Clone)]
pub struct TableClient<T> {
    config: TableConfig,
    base_url: String,
    transport: T,
}

#[cfg(feature = "ureq")]
impl TableClient<crate::transport::UreqTransport> {
    /// Client on a fresh blocking `ureq` transport.
    pub fn connect(config: TableConfig) -> Self {
        Self::new(config, crate::transport::UreqTransport::new())
    }
}

impl<T> TableClient<T> {
    pub fn new(config: TableConfig, transport: T) -> Self {
        let base_url = config.base_url();
        Self {
            config,
            base_url,
            transport,
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, segment(table))
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest {
            method,
            url,
            query: Vec::new(),
            headers: vec![("Authorization".to_string(), self.config.bearer())],
            body: None,
        }
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        url: String,
        body: &B,
    ) -> Result<HttpRequest> {
        let body = serde_json::to_string(body).map_err(ClientError::Serialization)?;
        let mut request = self.request(method, url);
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        request.body = Some(body);
        Ok(request)
    }

    pub fn build_create(&self, table: &str, batch: &[CreateRecord]) -> Result<HttpRequest> {
        self.json_request(
            HttpMethod::Post,
            self.table_url(table),
            &RecordsBody { records: batch },
        )
    }

    pub fn build_update(&self, table: &str, batch: &[UpdateRecord]) -> Result<HttpRequest> {
        self.json_request(
            HttpMethod::Patch,
            self.table_url(table),
            &RecordsBody { records: batch },
        )
    }

    pub fn build_get(&self, table: &str, record_id: &str) -> HttpRequest {
        let url = format!("{}/{}", self.table_url(table), segment(record_id));
        self.request(HttpMethod::Get, url)
    }

    pub fn build_list(&self, table: &str, query: &ListQuery, offset: Option<&str>) -> HttpRequest {
        let mut request = self.request(HttpMethod::Get, self.table_url(table));
        request.query = query.to_pairs();
        if let Some(offset) = offset {
            request.query.push(("offset".to_string(), offset.to_string()));
        }
        request
    }

    pub fn build_delete(&self, table: &str, ids: &[String]) -> HttpRequest {
        let mut request = self.request(HttpMethod::Delete, self.table_url(table));
        request.query = ids
            .iter()
            .map(|id| ("records[]".to_string(), id.clone()))
            .collect();
        request
    }

    /// Raw body of a single-record lookup: the record or the upstream error.
    pub fn parse_get(&self, response: HttpResponse) -> Result<Value> {
        parse_body(&response)
    }

    /// Splits a records response into its records and continuation token, or
    /// hands back the whole body when it carries no `records`.
    pub fn parse_records<R: DeserializeOwned>(&self, response: HttpResponse) -> Result<Page<R>> {
        let mut body = parse_body(&response)?;
        let records = match body.get_mut("records").map(Value::take) {
            None | Some(Value::Null) => return Ok(Page::Upstream(body)),
            Some(records) => records,
        };
        let records = serde_json::from_value(records).map_err(|e| ClientError::InvalidResponse {
            status: response.status,
            message: format!("unexpected records: {e}"),
        })?;
        let offset = body
            .get("offset")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        Ok(Page::Records { records, offset })
    }
}

impl<T: Transport> TableClient<T> {
    /// Creates records in batches of `MAX_BATCH_SIZE`, in input order.
    pub fn create<P>(&self, table: &str, payload: P) -> Result<Accumulated<Record>>
    where
        P: Into<Payload<CreateRecord>>,
    {
        require_table(table)?;
        let entries = payload.into().into_entries()?;
        self.write_batches(table, "create", &entries, |table, batch| {
            self.build_create(table, batch)
        })
    }

    /// Updates records in batches of `MAX_BATCH_SIZE`, in input order.
    pub fn update<P>(&self, table: &str, payload: P) -> Result<Accumulated<Record>>
    where
        P: Into<Payload<UpdateRecord>>,
    {
        require_table(table)?;
        let entries = payload.into().into_entries()?;
        self.write_batches(table, "update", &entries, |table, batch| {
            self.build_update(table, batch)
        })
    }

    /// Fetches one record. The body is returned as received, including
    /// upstream errors such as `{"error": "NOT_FOUND"}`.
    pub fn get(&self, table: &str, record_id: &str) -> Result<Value> {
        require_table(table)?;
        if record_id.is_empty() {
            return Err(ClientError::validation("record id is empty"));
        }
        debug!(table, record_id, "fetching record");
        let response = self.send(self.build_get(table, record_id))?;
        self.parse_get(response)
    }

    /// Lists records, following `offset` tokens until the last page.
    pub fn list(&self, table: &str, query: &ListQuery) -> Result<Accumulated<Record>> {
        require_table(table)?;
        let mut records: Vec<Record> = Vec::new();
        let mut offset: Option<String> = None;
        let mut page = 0usize;
        loop {
            debug!(table, page, offset = offset.as_deref(), "listing records");
            let response = self.send(self.build_list(table, query, offset.as_deref()))?;
            match self.parse_records::<Record>(response)? {
                Page::Records {
                    records: batch,
                    offset: next,
                } => {
                    records.extend(batch);
                    match next {
                        Some(token) => offset = Some(token),
                        None => break,
                    }
                }
                Page::Upstream(error) => {
                    warn!(table, page, accumulated = records.len(), "listing stopped on upstream error");
                    return Ok(Accumulated::Partial { records, error });
                }
            }
            page += 1;
        }
        Ok(Accumulated::Complete(records))
    }

    /// `get` when `record_id` is given, `list` otherwise.
    pub fn read(
        &self,
        table: &str,
        record_id: Option<&str>,
        query: &ListQuery,
    ) -> Result<ReadResult> {
        match record_id {
            Some(id) => self.get(table, id).map(ReadResult::Single),
            None => self.list(table, query).map(ReadResult::Listing),
        }
    }

    /// Deletes records in batches of `MAX_BATCH_SIZE`.
    ///
    /// Each batch must report every requested id as deleted, otherwise
    /// `ClientError::PartialDeletion` is returned. Earlier deletions stay
    /// applied.
    ///
    /// A response without `records` (an upstream error body) is not a count
    /// mismatch: it stops the loop and comes back as `Accumulated::Partial`
    /// holding the batches deleted so far.
    pub fn delete<P>(&self, table: &str, ids: P) -> Result<Accumulated<DeletedRecord>>
    where
        P: Into<Payload<String>>,
    {
        require_table(table)?;
        let ids = ids.into().into_entries()?;
        if let Some(position) = ids.iter().position(|id| id.is_empty()) {
            return Err(ClientError::validation(format!(
                "record id {position} is empty"
            )));
        }

        let mut removed = Vec::with_capacity(ids.len());
        for (batch_index, batch) in ids.chunks(MAX_BATCH_SIZE).enumerate() {
            debug!(table, batch = batch_index, size = batch.len(), "deleting records");
            let response = self.send(self.build_delete(table, batch))?;
            match self.parse_records::<DeletedRecord>(response)? {
                Page::Records { records, .. } => {
                    let deleted = records.len();
                    removed.extend(records);
                    if deleted != batch.len() {
                        warn!(
                            table,
                            batch = batch_index,
                            requested = batch.len(),
                            deleted,
                            "upstream deleted fewer records than requested"
                        );
                        return Err(ClientError::PartialDeletion {
                            requested: batch.len(),
                            deleted,
                            removed,
                        });
                    }
                }
                Page::Upstream(error) => {
                    warn!(table, batch = batch_index, "delete stopped on upstream error");
                    return Ok(Accumulated::Partial {
                        records: removed,
                        error,
                    });
                }
            }
        }
        Ok(Accumulated::Complete(removed))
    }

    fn write_batches<E, F>(
        &self,
        table: &str,
        action: &'static str,
        entries: &[E],
        build: F,
    ) -> Result<Accumulated<Record>>
    where
        F: Fn(&str, &[E]) -> Result<HttpRequest>,
    {
        let mut records = Vec::with_capacity(entries.len());
        for (batch_index, batch) in entries.chunks(MAX_BATCH_SIZE).enumerate() {
            debug!(table, action, batch = batch_index, size = batch.len(), "writing records");
            let response = self.send(build(table, batch)?)?;
            match self.parse_records::<Record>(response)? {
                Page::Records { records: batch, .. } => records.extend(batch),
                Page::Upstream(error) => {
                    warn!(
                        table,
                        action,
                        batch = batch_index,
                        accumulated = records.len(),
                        "write stopped on upstream error"
                    );
                    return Ok(Accumulated::Partial { records, error });
                }
            }
        }
        Ok(Accumulated::Complete(records))
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport
            .execute(request)
            .map_err(|e| ClientError::Transport(Box::new(e)))
    }
}

#[derive(Serialize)]
struct RecordsBody<'a, E> {
    records: &'a [E],
}

fn require_table(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(ClientError::validation("resource type (table name) is empty"));
    }
    Ok(())
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

fn parse_body(response: &HttpResponse) -> Result<Value> {
    serde_json::from_str(&response.body).map_err(|e| {
        let message = match response.header("content-type") {
            Some(content_type) => format!("body is not JSON ({content_type}): {e}"),
            None => format!("body is not JSON: {e}"),
        };
        ClientError::InvalidResponse {
            status: response.status,
            message,
        }
    })
}
