//! Ingestion of raw archive entries into [`ExchangeRecord`]s.
//!
//! The caller owns the archive: it enumerates entries and hands their bytes
//! to an [`Ingestor`]. Each entry is parsed independently, so one malformed
//! file is recorded as an [`IngestFailure`] and the batch carries on.
//!
//! # Field mapping
//!
//! | JSON key | Record field | Missing |
//! |----------|--------------|---------|
//! | entry name | `id` | entry rejected |
//! | `name` | `normalized_path` | `"unknown"` |
//! | `method` | `method` | entry rejected |
//! | `url` | `url` | entry rejected |
//! | `responseStatusCode` | `response_status_code` | entry rejected |
//! | `inferredStatusCode` | `inferred_status_code` | entry rejected |
//! | `coverage` | `coverage` | entry rejected |
//! | `requester` | `requester` | entry rejected |
//! | `requestHeaders` / `responseHeaders` | headers | empty |
//! | `requestBody` / `responseBody` | bodies | empty |
//! | `duration` | `duration` | `0.0` |
//! | `inferredScalars` | `inferred_scalars` | empty |
//! | `inSchema` / `in_schema` | `in_schema` | `false` |
//! | anything else | `extra` | |

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::IngestError;
use crate::models::{ExchangeRecord, Header, HttpMethod, InferredScalar, RecordSet, UNKNOWN_PATH};
use crate::report::{ReportEvent, Reporter};

/// Entry name suffix selected for ingestion by default.
pub const DEFAULT_ENTRY_SUFFIX: &str = ".json";

/// Wire shape of one captured exchange. Every field is optional here so that
/// missing required fields surface as [`IngestError::MissingField`] rather
/// than an opaque deserializer message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExchange {
    #[serde(default)]
    request_headers: Option<Vec<Header>>,
    #[serde(default)]
    request_body: Option<String>,
    #[serde(default)]
    response_headers: Option<Vec<Header>>,
    #[serde(default)]
    response_body: Option<String>,
    #[serde(default)]
    response_status_code: Option<u16>,
    #[serde(default)]
    inferred_status_code: Option<u16>,
    #[serde(default)]
    scan_id: Option<String>,
    #[serde(default)]
    exchange_id: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    curl: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    coverage: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    requester: Option<String>,
    #[serde(default)]
    inferred_scalars: Option<Vec<InferredScalar>>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "in_schema")]
    in_schema: Option<bool>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, IngestError> {
    value.ok_or(IngestError::MissingField(field))
}

/// Parse one entry's bytes into a record identified by `id`.
pub fn parse_exchange(id: &str, bytes: &[u8]) -> Result<ExchangeRecord, IngestError> {
    if id.trim().is_empty() {
        return Err(IngestError::EmptyId);
    }

    let raw: RawExchange = serde_json::from_slice(bytes)?;

    let method: HttpMethod = required(raw.method, "method")?.parse()?;
    let url = required(raw.url, "url")?;
    let response_status_code = required(raw.response_status_code, "responseStatusCode")?;
    let inferred_status_code = required(raw.inferred_status_code, "inferredStatusCode")?;
    let coverage = required(raw.coverage, "coverage")?;
    let requester = required(raw.requester, "requester")?;

    let duration = raw.duration.unwrap_or(0.0);
    if !duration.is_finite() || duration < 0.0 {
        return Err(IngestError::InvalidField {
            field: "duration",
            reason: format!("expected non-negative seconds, got {}", duration),
        });
    }

    let inferred_scalars = raw.inferred_scalars.unwrap_or_default();
    if let Some(bad) = inferred_scalars
        .iter()
        .find(|s| !(0.0..=1.0).contains(&s.confidence))
    {
        return Err(IngestError::InvalidField {
            field: "inferredScalars",
            reason: format!(
                "confidence {} for '{}' is outside [0, 1]",
                bad.confidence, bad.name
            ),
        });
    }

    let normalized_path = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_PATH.to_string());

    Ok(ExchangeRecord {
        id: id.to_string(),
        normalized_path,
        method,
        url,
        request_headers: raw.request_headers.unwrap_or_default(),
        request_body: raw.request_body.unwrap_or_default(),
        response_headers: raw.response_headers.unwrap_or_default(),
        response_body: raw.response_body.unwrap_or_default(),
        response_status_code,
        inferred_status_code,
        duration,
        coverage,
        requester,
        inferred_scalars,
        in_schema: raw.in_schema.unwrap_or(false),
        scan_id: raw.scan_id,
        exchange_id: raw.exchange_id,
        user: raw.user,
        curl: raw.curl,
        extra: raw.extra,
    })
}

/// Ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Only entries whose name ends with this suffix are parsed.
    pub entry_suffix: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            entry_suffix: DEFAULT_ENTRY_SUFFIX.to_string(),
        }
    }
}

/// One entry that did not make it into the record set.
#[derive(Debug)]
pub struct IngestFailure {
    pub entry: String,
    pub error: IngestError,
}

/// Result of ingesting a whole archive.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub records: RecordSet,
    pub failures: Vec<IngestFailure>,
}

/// Accumulates records from archive entries one at a time.
///
/// Duplicate ids are last-write-wins: a later entry with the same name
/// replaces the earlier record.
pub struct Ingestor<'a> {
    options: IngestOptions,
    reporter: &'a dyn Reporter,
    records: RecordSet,
    failures: Vec<IngestFailure>,
}

impl<'a> Ingestor<'a> {
    pub fn new(options: IngestOptions, reporter: &'a dyn Reporter) -> Self {
        Self {
            options,
            reporter,
            records: RecordSet::new(),
            failures: Vec::new(),
        }
    }

    /// Whether an entry with this name would be parsed.
    pub fn accepts(&self, entry_name: &str) -> bool {
        !entry_name.ends_with('/') && entry_name.ends_with(&self.options.entry_suffix)
    }

    /// Parse and add one entry. Entries not matching the suffix are skipped.
    pub fn add_entry(&mut self, entry_name: &str, bytes: &[u8]) {
        if !self.accepts(entry_name) {
            tracing::trace!(entry = entry_name, "skipping entry without expected suffix");
            return;
        }

        match parse_exchange(entry_name, bytes) {
            Ok(record) => {
                if let Some(previous) = self.records.insert(record) {
                    tracing::debug!(
                        entry = entry_name,
                        replaced_path = %previous.normalized_path,
                        "duplicate exchange id, keeping the later entry"
                    );
                }
            }
            Err(error) => self.reject_entry(entry_name, error),
        }
    }

    /// Record an entry that the archive reader could not produce bytes for.
    pub fn reject_entry(&mut self, entry_name: &str, error: IngestError) {
        tracing::debug!(entry = entry_name, %error, "rejected exchange entry");
        self.reporter.report(ReportEvent::EntryFailed {
            entry: entry_name.to_string(),
            error: error.to_string(),
        });
        self.failures.push(IngestFailure {
            entry: entry_name.to_string(),
            error,
        });
    }

    /// Emit the summary notification and hand back the results.
    pub fn finish(self) -> IngestOutcome {
        self.reporter.report(ReportEvent::Ingested {
            parsed: self.records.len(),
            failed: self.failures.len(),
        });
        IngestOutcome {
            records: self.records,
            failures: self.failures,
        }
    }
}

/// Ingest an in-memory list of `(entry name, bytes)` pairs.
pub fn ingest_entries<I, N, B>(
    entries: I,
    options: IngestOptions,
    reporter: &dyn Reporter,
) -> IngestOutcome
where
    I: IntoIterator<Item = (N, B)>,
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let mut ingestor = Ingestor::new(options, reporter);
    for (name, bytes) in entries {
        ingestor.add_entry(name.as_ref(), bytes.as_ref());
    }
    ingestor.finish()
}
