//! Records, payloads and accumulated results.
//!
//! # Design
//! Write payloads are typed. A create entry always has `fields`; an update
//! entry can only hold `id` and `fields`. Other keys on a create entry pass
//! through to upstream. Raw JSON is accepted through
//! `Payload::from_json`, which validates entries with serde (update entries
//! deny unknown keys) before anything is sent. `Payload` resolves the
//! "one record or many" choice once, so batching only ever sees a sequence.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Field name to value mapping of a record.
pub type Fields = Map<String, Value>;

/// A single upstream record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

/// Entry of a delete response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Create payload entry. `fields` may be empty but must be present and must
/// be an object.
///
/// Any other top-level keys (`typecast`, for example) are kept in `extra` and
/// sent upstream unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateRecord {
    pub fields: Fields,
    #[serde(flatten)]
    pub extra: Fields,
}

impl CreateRecord {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            extra: Fields::new(),
        }
    }
}

/// Update payload entry. Only `id` and `fields` are allowed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
}

impl UpdateRecord {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: Some(id.into()),
            fields: Some(fields),
        }
    }
}

/// One entry or a sequence of entries for a write or delete operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    Single(T),
    Batch(Vec<T>),
}

impl<T> Payload<T> {
    /// Flattens into a non-empty sequence, preserving order.
    pub fn into_entries(self) -> Result<Vec<T>> {
        match self {
            Payload::Single(entry) => Ok(vec![entry]),
            Payload::Batch(entries) if entries.is_empty() => {
                Err(ClientError::validation("payload is empty"))
            }
            Payload::Batch(entries) => Ok(entries),
        }
    }
}

impl<T: DeserializeOwned> Payload<T> {
    /// Validates raw JSON: an object becomes `Single`, an array of objects
    /// becomes `Batch`. Anything else is rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => parse_entry(value, 0).map(Payload::Single),
            Value::Array(items) => {
                let entries = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| parse_entry(item, index))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Payload::Batch(entries))
            }
            Value::Null => Err(ClientError::validation("payload is empty")),
            other => Err(ClientError::validation(format!(
                "payload must be an object or a list of objects, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn parse_entry<T: DeserializeOwned>(item: Value, index: usize) -> Result<T> {
    if !item.is_object() {
        return Err(ClientError::validation(format!(
            "payload entry {index} must be an object, got {}",
            json_kind(&item)
        )));
    }
    serde_json::from_value(item)
        .map_err(|e| ClientError::validation(format!("payload entry {index}: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<CreateRecord> for Payload<CreateRecord> {
    fn from(entry: CreateRecord) -> Self {
        Payload::Single(entry)
    }
}

impl From<UpdateRecord> for Payload<UpdateRecord> {
    fn from(entry: UpdateRecord) -> Self {
        Payload::Single(entry)
    }
}

impl From<String> for Payload<String> {
    fn from(id: String) -> Self {
        Payload::Single(id)
    }
}

impl<T> From<Vec<T>> for Payload<T> {
    fn from(entries: Vec<T>) -> Self {
        Payload::Batch(entries)
    }
}

impl From<&str> for Payload<String> {
    fn from(id: &str) -> Self {
        Payload::Single(id.to_string())
    }
}

impl From<&[&str]> for Payload<String> {
    fn from(ids: &[&str]) -> Self {
        Payload::Batch(ids.iter().map(|id| id.to_string()).collect())
    }
}

impl From<Vec<&str>> for Payload<String> {
    fn from(ids: Vec<&str>) -> Self {
        Payload::Batch(ids.into_iter().map(str::to_string).collect())
    }
}

/// Records gathered across one or more upstream calls.
///
/// `Partial` means a response arrived without a `records` key: `error` is that
/// raw body and `records` holds what earlier calls returned. Nothing after
/// the failing call was sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulated<T> {
    Complete(Vec<T>),
    Partial { records: Vec<T>, error: Value },
}

impl<T> Accumulated<T> {
    pub fn records(&self) -> &[T] {
        match self {
            Accumulated::Complete(records) => records,
            Accumulated::Partial { records, .. } => records,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Accumulated::Complete(_))
    }

    /// The raw upstream error body, if the operation stopped early.
    pub fn upstream_error(&self) -> Option<&Value> {
        match self {
            Accumulated::Complete(_) => None,
            Accumulated::Partial { error, .. } => Some(error),
        }
    }

    /// Complete records, or the upstream error body.
    pub fn into_complete(self) -> std::result::Result<Vec<T>, Value> {
        match self {
            Accumulated::Complete(records) => Ok(records),
            Accumulated::Partial { error, .. } => Err(error),
        }
    }
}

impl<T: Serialize> Accumulated<T> {
    /// Wire view of the result: `{"records": [...]}` when complete, otherwise
    /// the upstream error body as received.
    pub fn into_raw(self) -> Result<Value> {
        match self {
            Accumulated::Complete(records) => {
                let records = serde_json::to_value(records).map_err(ClientError::Serialization)?;
                let mut body = Map::new();
                body.insert("records".to_string(), records);
                Ok(Value::Object(body))
            }
            Accumulated::Partial { error, .. } => Ok(error),
        }
    }
}

/// Query parameters of a listing call, passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter_by_formula: Option<String>,
    pub fields: Vec<String>,
    pub view: Option<String>,
    pub page_size: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_by_formula(mut self, formula: impl Into<String>) -> Self {
        self.filter_by_formula = Some(formula.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Query pairs in a stable order; `offset` is appended by the client.
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(formula) = &self.filter_by_formula {
            pairs.push(("filterByFormula".to_string(), formula.clone()));
        }
        for field in &self.fields {
            pairs.push(("fields[]".to_string(), field.clone()));
        }
        if let Some(view) = &self.view {
            pairs.push(("view".to_string(), view.clone()));
        }
        if let Some(size) = self.page_size {
            pairs.push(("pageSize".to_string(), size.to_string()));
        }
        pairs
    }
}

/// Outcome of `TableClient::read`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    /// Raw body of a single-record lookup.
    Single(Value),
    Listing(Accumulated<Record>),
}
