//! In-memory stand-in for the upstream table API.
//!
//! Serves `/v0/{base}/{table}` and `/v0/{base}/{table}/{id}` with the same
//! request and response shapes as the real service: `{"records": [...]}`
//! bodies, `offset` pagination, `records[]` delete parameters, a 10-record
//! write limit and JSON error bodies. Tables spring into existence on first
//! use. Deletes skip ids they do not know and report only what they removed.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

/// Most records accepted by one create, update or delete request.
pub const MAX_BATCH: usize = 10;
/// Default and largest `pageSize` of a listing.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct CreateEntry {
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct UpdateEntry {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct RecordsBody<T> {
    pub records: Vec<T>,
}

/// Tables keyed by `"{base}/{table}"`, records kept in creation order.
pub type Db = Arc<RwLock<HashMap<String, Vec<Record>>>>;

/// A JSON error body with its status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn typed(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({"error": {"type": kind, "message": message.into()}}),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!({"error": "NOT_FOUND"}),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::typed(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_REQUEST_UNKNOWN",
            rejection.body_text(),
        )
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

pub fn new_db() -> Db {
    Arc::new(RwLock::new(HashMap::new()))
}

pub fn app() -> Router {
    app_with_db(new_db())
}

/// Router over an existing store, so tests can seed or inspect it.
pub fn app_with_db(db: Db) -> Router {
    Router::new()
        .route(
            "/v0/{base}/{table}",
            get(list_records)
                .post(create_records)
                .patch(update_records)
                .delete(delete_records),
        )
        .route("/v0/{base}/{table}/{id}", get(get_record))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Fresh record id in the upstream format: `rec` plus 14 characters.
pub fn new_record_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("rec{}", &uuid[..14])
}

fn table_key(base: &str, table: &str) -> String {
    format!("{base}/{table}")
}

fn authorize(headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(ApiError::typed(
            StatusCode::UNAUTHORIZED,
            "AUTHENTICATION_REQUIRED",
            "Authentication required",
        ));
    }
    Ok(())
}

fn check_batch(len: usize) -> Result<(), ApiError> {
    if len == 0 || len > MAX_BATCH {
        return Err(ApiError::typed(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_RECORDS",
            format!("expected between 1 and {MAX_BATCH} records, got {len}"),
        ));
    }
    Ok(())
}

/// Equality test parsed from `{Field} = "value"`, optionally parenthesised.
fn parse_formula(formula: &str) -> Option<(String, String)> {
    let mut expr = formula.trim();
    while let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        expr = inner.trim();
    }
    let (left, right) = expr.split_once('=')?;
    let field = left.trim().strip_prefix('{')?.strip_suffix('}')?;
    let value = right.trim().strip_prefix('"')?.strip_suffix('"')?;
    Some((field.to_string(), value.to_string()))
}

fn field_matches(record: &Record, field: &str, expected: &str) -> bool {
    match record.fields.get(field) {
        None | Some(Value::Null) => expected.is_empty(),
        Some(Value::String(actual)) => actual == expected,
        Some(other) => other.to_string() == expected,
    }
}

async fn list_records(
    State(db): State<Db>,
    Path((base, table)): Path<(String, String)>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult {
    authorize(&headers)?;

    let mut offset = 0usize;
    let mut page_size = MAX_PAGE_SIZE;
    let mut projection = Vec::new();
    let mut filter = None;
    for (key, value) in params {
        match key.as_str() {
            "offset" => {
                offset = value
                    .strip_prefix("itr")
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| {
                        ApiError::typed(
                            StatusCode::UNPROCESSABLE_ENTITY,
                            "LIST_RECORDS_ITERATOR_NOT_AVAILABLE",
                            format!("unknown offset {value}"),
                        )
                    })?;
            }
            "pageSize" => {
                page_size = value
                    .parse::<usize>()
                    .ok()
                    .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
                    .ok_or_else(|| {
                        ApiError::typed(
                            StatusCode::UNPROCESSABLE_ENTITY,
                            "INVALID_PAGE_SIZE",
                            format!("pageSize must be between 1 and {MAX_PAGE_SIZE}"),
                        )
                    })?;
            }
            "fields[]" => projection.push(value),
            "filterByFormula" => {
                filter = Some(parse_formula(&value).ok_or_else(|| {
                    ApiError::typed(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "INVALID_FILTER_BY_FORMULA",
                        format!("unsupported formula {value}"),
                    )
                })?);
            }
            _ => {}
        }
    }

    let tables = db.read().await;
    let matching: Vec<&Record> = tables
        .get(&table_key(&base, &table))
        .map(|records| {
            records
                .iter()
                .filter(|record| match &filter {
                    Some((field, expected)) => field_matches(record, field, expected),
                    None => true,
                })
                .collect()
        })
        .unwrap_or_default();

    if offset > matching.len() {
        return Err(ApiError::typed(
            StatusCode::UNPROCESSABLE_ENTITY,
            "LIST_RECORDS_ITERATOR_NOT_AVAILABLE",
            format!("unknown offset itr{offset}"),
        ));
    }

    let end = (offset + page_size).min(matching.len());
    let page: Vec<Record> = matching[offset..end]
        .iter()
        .map(|record| {
            let mut record = (*record).clone();
            if !projection.is_empty() {
                record.fields.retain(|name, _| projection.contains(name));
            }
            record
        })
        .collect();

    let mut body = json!({ "records": page });
    if end < matching.len() {
        body["offset"] = json!(format!("itr{end}"));
    }
    Ok(Json(body))
}

async fn get_record(
    State(db): State<Db>,
    Path((base, table, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult {
    authorize(&headers)?;
    let tables = db.read().await;
    tables
        .get(&table_key(&base, &table))
        .and_then(|records| records.iter().find(|record| record.id == id))
        .map(|record| Json(json!(record)))
        .ok_or_else(ApiError::not_found)
}

async fn create_records(
    State(db): State<Db>,
    Path((base, table)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<RecordsBody<CreateEntry>>, JsonRejection>,
) -> ApiResult {
    authorize(&headers)?;
    let Json(body) = body?;
    check_batch(body.records.len())?;

    let created: Vec<Record> = body
        .records
        .into_iter()
        .map(|entry| Record {
            id: new_record_id(),
            fields: entry.fields,
        })
        .collect();

    let key = table_key(&base, &table);
    info!(table = %key, count = created.len(), "created records");
    db.write()
        .await
        .entry(key)
        .or_default()
        .extend(created.iter().cloned());
    Ok(Json(json!({ "records": created })))
}

async fn update_records(
    State(db): State<Db>,
    Path((base, table)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<RecordsBody<UpdateEntry>>, JsonRejection>,
) -> ApiResult {
    authorize(&headers)?;
    let Json(body) = body?;
    check_batch(body.records.len())?;

    let key = table_key(&base, &table);
    let mut tables = db.write().await;
    let records = tables.entry(key.clone()).or_default();

    if let Some(missing) = body
        .records
        .iter()
        .find(|entry| !records.iter().any(|record| record.id == entry.id))
    {
        return Err(ApiError::typed(
            StatusCode::NOT_FOUND,
            "ROW_DOES_NOT_EXIST",
            format!("Record ID {} does not exist", missing.id),
        ));
    }

    let mut updated = Vec::with_capacity(body.records.len());
    for entry in body.records {
        if let Some(record) = records.iter_mut().find(|record| record.id == entry.id) {
            record.fields.extend(entry.fields);
            updated.push(record.clone());
        }
    }
    info!(table = %key, count = updated.len(), "updated records");
    Ok(Json(json!({ "records": updated })))
}

async fn delete_records(
    State(db): State<Db>,
    Path((base, table)): Path<(String, String)>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult {
    authorize(&headers)?;
    let ids: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "records[]")
        .map(|(_, value)| value)
        .collect();
    check_batch(ids.len())?;

    let key = table_key(&base, &table);
    let mut tables = db.write().await;
    let records = tables.entry(key.clone()).or_default();

    let mut deleted = Vec::new();
    for id in ids {
        if let Some(position) = records.iter().position(|record| record.id == id) {
            records.remove(position);
            deleted.push(json!({"id": id, "deleted": true}));
        }
    }
    info!(table = %key, count = deleted.len(), "deleted records");
    Ok(Json(json!({ "records": deleted })))
}
