//! Core data models for captured scanner exchanges.
//!
//! An [`ExchangeRecord`] is the normalized, immutable form of one captured
//! HTTP request/response pair. Records are shared behind [`Arc`] inside a
//! [`RecordSet`] so that filtered views and aggregates never copy bodies.
//!
//! Derived fields (content type, query and path parameters) are computed on
//! demand and never stored.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::params::{self, ExchangeParameter};

/// Normalized path used when the source data carries none.
pub const UNKNOWN_PATH: &str = "unknown";

/// Content type shown for exchanges without a `content-type` response header.
pub const UNKNOWN_CONTENT_TYPE: &str = "unknown";

/// Standard HTTP method tokens accepted at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 9] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
        HttpMethod::Connect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method token is not a standard HTTP method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HTTP method: {:?}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// A header name with every value recorded for it, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Header {
    /// First recorded value, if any.
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// A data type detected somewhere in the exchange by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredScalar {
    pub kind: String,
    pub name: String,
    /// Detection confidence in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// One normalized request/response exchange.
///
/// Every record that survives ingestion has a non-empty `id`, a valid
/// `method` and a `normalized_path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRecord {
    /// Session-unique identifier (the archive entry name).
    pub id: String,
    /// Template-form endpoint name, e.g. `/users/{id}`.
    pub normalized_path: String,
    pub method: HttpMethod,
    /// Full request URL including the query string.
    pub url: String,
    pub request_headers: Vec<Header>,
    pub request_body: String,
    pub response_headers: Vec<Header>,
    pub response_body: String,
    /// Status code returned by the upstream server.
    pub response_status_code: u16,
    /// Status code observed by the scanner, used for filtering and grouping.
    pub inferred_status_code: u16,
    /// Elapsed seconds.
    pub duration: f64,
    pub coverage: String,
    pub requester: String,
    pub inferred_scalars: Vec<InferredScalar>,
    pub in_schema: bool,
    pub scan_id: Option<String>,
    pub exchange_id: Option<String>,
    pub user: Option<String>,
    pub curl: Option<String>,
    /// Top-level keys the model does not know about, kept verbatim.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ExchangeRecord {
    /// Response body length in bytes.
    pub fn response_size(&self) -> usize {
        self.response_body.len()
    }

    /// Content type from the first non-empty `content-type` response header.
    pub fn content_type(&self) -> Option<String> {
        self.response_headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-type") && !h.values.is_empty())
            .and_then(Header::first_value)
            .map(normalize_content_type)
    }

    /// Like [`content_type`](Self::content_type), falling back to `"unknown"`.
    pub fn content_type_or_unknown(&self) -> String {
        self.content_type()
            .unwrap_or_else(|| UNKNOWN_CONTENT_TYPE.to_string())
    }

    /// Path component of the request URL.
    pub fn url_path(&self) -> String {
        params::url_path(&self.url)
    }

    /// Query string parameters in URL order.
    pub fn query_parameters(&self) -> Vec<(String, String)> {
        params::query_parameters(&self.url)
    }

    /// Values of `{name}` placeholders in the normalized path, matched
    /// positionally against the URL path segments.
    pub fn path_parameters(&self) -> Vec<(String, String)> {
        params::path_parameters(&self.normalized_path, &self.url_path())
    }

    /// Every request parameter: path, then query, then headers.
    pub fn request_parameters(&self) -> Vec<ExchangeParameter> {
        params::request_parameters(self)
    }
}

/// Collapse every `application/json*` variant to `application/json`.
pub fn normalize_content_type(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("application/json") {
        "application/json".to_string()
    } else {
        trimmed.to_string()
    }
}

/// An id-ordered collection of shared, immutable exchange records.
///
/// Cloning a set is cheap: only the [`Arc`] handles are copied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: BTreeMap<String, Arc<ExchangeRecord>>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the record it replaced if the id was taken.
    pub fn insert(&mut self, record: ExchangeRecord) -> Option<Arc<ExchangeRecord>> {
        self.insert_shared(Arc::new(record))
    }

    pub fn insert_shared(&mut self, record: Arc<ExchangeRecord>) -> Option<Arc<ExchangeRecord>> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ExchangeRecord>> {
        self.records.get(id)
    }

    /// Look up a record by its 1-based position in ascending id order.
    pub fn get_by_number(&self, number: usize) -> Option<&Arc<ExchangeRecord>> {
        number
            .checked_sub(1)
            .and_then(|idx| self.records.values().nth(idx))
    }

    /// 1-based position of `id` in ascending id order.
    pub fn number_of(&self, id: &str) -> Option<usize> {
        self.records.keys().position(|k| k == id).map(|p| p + 1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ExchangeRecord>> {
        self.records.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}

impl FromIterator<ExchangeRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = ExchangeRecord>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl FromIterator<Arc<ExchangeRecord>> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Arc<ExchangeRecord>>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert_shared(record);
        }
        set
    }
}
