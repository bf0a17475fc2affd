//! Query facade over one ingested session.
//!
//! A [`Session`] owns the immutable record set and answers the operations the
//! command layer needs. Every call filters, aggregates if needed, and
//! returns typed rows; nothing is cached between calls. Commands that touch
//! several selectors parse their filter once with [`Session::filter`].
//!
//! | Operation | Result |
//! |-----------|--------|
//! | [`count`](Session::count) | total and filtered totals |
//! | [`list`](Session::list) | one row per exchange, ascending id |
//! | [`summarize`](Session::summarize) | one row per endpoint aggregate |
//! | [`detail`](Session::detail) | one record plus derived fields |
//! | [`params`](Session::params) | request parameters of one record |

use std::sync::Arc;

use serde::Serialize;

use crate::aggregate::{EndpointAggregate, EndpointIndex};
use crate::error::QueryError;
use crate::filter::FilterSpec;
use crate::models::{ExchangeRecord, HttpMethod, RecordSet};
use crate::params::ExchangeParameter;
use crate::report::{ReportEvent, Reporter};

/// Totals for `count`. `filtered` is present only when filtering is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountResult {
    pub total: usize,
    pub filtered: Option<usize>,
}

/// One exchange in a `list` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListRow {
    /// 1-based position among all records, usable as an `info` selector.
    pub number: usize,
    pub id: String,
    pub normalized_path: String,
    pub method: HttpMethod,
    pub inferred_status_code: u16,
    pub coverage: String,
    pub content_type: String,
    pub response_size: usize,
    pub response_size_kb: f64,
    pub requester: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub rows: Vec<ListRow>,
    pub total: usize,
    pub filter_active: bool,
}

/// One endpoint aggregate in a `summarize` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointRow {
    /// Spreadsheet-style label: A..Z, AA, AB, ...
    pub group_id: String,
    pub normalized_path: String,
    pub method: HttpMethod,
    /// URL paths, or full URLs when requested.
    pub endpoints: Vec<String>,
    pub status_codes: Vec<u16>,
    pub inferred_status_codes: Vec<u16>,
    pub coverage: Vec<String>,
    pub content_types: Vec<String>,
    pub requesters: Vec<String>,
    pub count_exchanges: usize,
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: Vec<EndpointRow>,
    /// Aggregate count over all records; present only when filtering is active.
    pub unfiltered_endpoints: Option<usize>,
    pub show_full_urls: bool,
}

/// A full record with its derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeDetail {
    pub number: usize,
    pub record: Arc<ExchangeRecord>,
    pub content_type: Option<String>,
    pub response_size: usize,
    pub query_parameters: Vec<(String, String)>,
    pub path_parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamsView {
    pub number: usize,
    pub id: String,
    pub parameters: Vec<ExchangeParameter>,
}

/// Label for the `index`-th group: 0 → A, 25 → Z, 26 → AA.
pub fn group_id(index: usize) -> String {
    let mut label = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// An immutable snapshot of ingested exchanges plus the sink for filter
/// warnings.
pub struct Session {
    records: RecordSet,
    reporter: Box<dyn Reporter>,
}

impl Session {
    pub fn new(records: RecordSet, reporter: Box<dyn Reporter>) -> Self {
        Self { records, reporter }
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Parse `expr`, forwarding every warning to the reporter.
    pub fn filter(&self, expr: &str) -> FilterSpec {
        let parsed = FilterSpec::parse(expr);
        for warning in parsed.warnings {
            self.reporter.report(ReportEvent::FilterWarning {
                message: warning.to_string(),
            });
        }
        parsed.spec
    }

    pub fn count(&self, filter_expr: &str) -> CountResult {
        let spec = self.filter(filter_expr);
        let filtered = spec.is_active().then(|| spec.apply(&self.records).len());
        CountResult {
            total: self.records.len(),
            filtered,
        }
    }

    /// Numbers are assigned in the same pass that filters, so a listing is
    /// linear in the record count.
    pub fn list(&self, filter_expr: &str) -> Listing {
        let spec = self.filter(filter_expr);
        let rows = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| spec.matches(record))
            .map(|(i, record)| list_row(i + 1, record))
            .collect();
        Listing {
            rows,
            total: self.records.len(),
            filter_active: spec.is_active(),
        }
    }

    /// Aggregate the filtered records by endpoint. When filtering is active
    /// the unfiltered records are aggregated in a separate pass so callers
    /// can show "N of M endpoints".
    pub fn summarize(&self, filter_expr: &str, show_full_urls: bool) -> Summary {
        let spec = self.filter(filter_expr);
        let index = EndpointIndex::aggregate(&spec.apply(&self.records));

        let rows = index
            .iter()
            .enumerate()
            .map(|(i, agg)| endpoint_row(i, agg, show_full_urls))
            .collect();

        let unfiltered_endpoints = spec
            .is_active()
            .then(|| EndpointIndex::aggregate(&self.records).len());

        Summary {
            rows,
            unfiltered_endpoints,
            show_full_urls,
        }
    }

    /// Find a record by exact id, or by 1-based number.
    pub fn resolve(&self, selector: &str) -> Result<&Arc<ExchangeRecord>, QueryError> {
        if let Some(record) = self.records.get(selector) {
            return Ok(record);
        }
        selector
            .parse::<usize>()
            .ok()
            .and_then(|n| self.records.get_by_number(n))
            .ok_or_else(|| QueryError::NotFound(selector.to_string()))
    }

    fn resolve_filtered(
        &self,
        selector: &str,
        spec: &FilterSpec,
    ) -> Result<&Arc<ExchangeRecord>, QueryError> {
        let record = self.resolve(selector)?;
        if spec.matches(record) {
            Ok(record)
        } else {
            Err(QueryError::FilteredOut(record.id.clone()))
        }
    }

    pub fn detail(&self, selector: &str, filter_expr: &str) -> Result<ExchangeDetail, QueryError> {
        self.detail_matching(selector, &self.filter(filter_expr))
    }

    /// Like [`detail`](Session::detail) with an already parsed filter, so a
    /// command showing several selectors parses and reports it once.
    pub fn detail_matching(
        &self,
        selector: &str,
        spec: &FilterSpec,
    ) -> Result<ExchangeDetail, QueryError> {
        let record = self.resolve_filtered(selector, spec)?;
        Ok(ExchangeDetail {
            number: self.records.number_of(&record.id).unwrap_or_default(),
            content_type: record.content_type(),
            response_size: record.response_size(),
            query_parameters: record.query_parameters(),
            path_parameters: record.path_parameters(),
            record: Arc::clone(record),
        })
    }

    pub fn params(&self, selector: &str, filter_expr: &str) -> Result<ParamsView, QueryError> {
        let record = self.resolve_filtered(selector, &self.filter(filter_expr))?;
        Ok(ParamsView {
            number: self.records.number_of(&record.id).unwrap_or_default(),
            id: record.id.clone(),
            parameters: record.request_parameters(),
        })
    }
}

fn list_row(number: usize, record: &ExchangeRecord) -> ListRow {
    let size = record.response_size();
    ListRow {
        number,
        id: record.id.clone(),
        normalized_path: record.normalized_path.clone(),
        method: record.method,
        inferred_status_code: record.inferred_status_code,
        coverage: record.coverage.clone(),
        content_type: record.content_type_or_unknown(),
        response_size: size,
        response_size_kb: size as f64 / 1024.0,
        requester: record.requester.clone(),
    }
}

fn endpoint_row(index: usize, agg: &EndpointAggregate, show_full_urls: bool) -> EndpointRow {
    let endpoints = if show_full_urls {
        &agg.urls
    } else {
        &agg.url_paths
    };
    EndpointRow {
        group_id: group_id(index),
        normalized_path: agg.key.normalized_path.clone(),
        method: agg.key.method,
        endpoints: endpoints.iter().cloned().collect(),
        status_codes: agg.status_codes.iter().copied().collect(),
        inferred_status_codes: agg.inferred_status_codes.iter().copied().collect(),
        coverage: agg.coverage.iter().cloned().collect(),
        content_types: agg.content_types.iter().cloned().collect(),
        requesters: agg.requesters.iter().cloned().collect(),
        count_exchanges: agg.count_exchanges(),
        min_size: agg.min_size(),
        max_size: agg.max_size(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::record;
    use crate::report::NoReport;
    use std::sync::Mutex;

    fn session() -> Session {
        let a = record("a.json", "/login", HttpMethod::Post, "https://h/login");
        let mut b = record(
            "b.json",
            "/users/{id}",
            HttpMethod::Get,
            "https://h/users/42?active=true",
        );
        b.inferred_status_code = 404;
        b.response_status_code = 404;
        let records: RecordSet = vec![a, b].into_iter().collect();
        Session::new(records, Box::new(NoReport))
    }

    #[test]
    fn group_ids_roll_over_like_spreadsheet_columns() {
        assert_eq!(group_id(0), "A");
        assert_eq!(group_id(25), "Z");
        assert_eq!(group_id(26), "AA");
        assert_eq!(group_id(27), "AB");
        assert_eq!(group_id(701), "ZZ");
        assert_eq!(group_id(702), "AAA");
    }

    #[test]
    fn count_reports_filtered_only_when_active() {
        let s = session();
        assert_eq!(
            s.count(""),
            CountResult {
                total: 2,
                filtered: None
            }
        );
        assert_eq!(
            s.count("status_code=404"),
            CountResult {
                total: 2,
                filtered: Some(1)
            }
        );
    }

    #[test]
    fn list_rows_follow_id_order_and_keep_numbers() {
        let s = session();
        let all = s.list("");
        assert!(!all.filter_active);
        assert_eq!(
            all.rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a.json", "b.json"]
        );

        let gets = s.list("method=GET");
        assert!(gets.filter_active);
        assert_eq!(gets.rows.len(), 1);
        assert_eq!(gets.rows[0].number, 2);
        assert_eq!(gets.rows[0].content_type, "unknown");
    }

    #[test]
    fn summarize_uses_paths_or_full_urls() {
        let s = session();
        let short = s.summarize("", false);
        assert_eq!(short.rows.len(), 2);
        assert_eq!(short.unfiltered_endpoints, None);
        assert_eq!(short.rows[1].endpoints, vec!["/users/42"]);

        let full = s.summarize("method=GET", true);
        assert_eq!(full.rows.len(), 1);
        assert_eq!(full.rows[0].group_id, "A");
        assert_eq!(
            full.rows[0].endpoints,
            vec!["https://h/users/42?active=true"]
        );
        assert_eq!(full.unfiltered_endpoints, Some(2));
    }

    #[test]
    fn detail_resolves_ids_and_numbers() {
        let s = session();
        let by_id = s.detail("b.json", "").unwrap();
        assert_eq!(by_id.number, 2);
        assert_eq!(
            by_id.path_parameters,
            vec![("id".to_string(), "42".to_string())]
        );
        assert_eq!(
            by_id.query_parameters,
            vec![("active".to_string(), "true".to_string())]
        );

        let by_number = s.detail("1", "").unwrap();
        assert_eq!(by_number.record.id, "a.json");
    }

    #[test]
    fn detail_misses_are_typed() {
        let s = session();
        assert_eq!(
            s.detail("nope.json", "").unwrap_err(),
            QueryError::NotFound("nope.json".to_string())
        );
        assert_eq!(
            s.detail("3", "").unwrap_err(),
            QueryError::NotFound("3".to_string())
        );
        assert_eq!(
            s.detail("a.json", "method=GET").unwrap_err(),
            QueryError::FilteredOut("a.json".to_string())
        );
    }

    #[test]
    fn params_lists_path_and_query() {
        let s = session();
        let view = s.params("2", "").unwrap();
        assert_eq!(view.id, "b.json");
        let names: Vec<&str> = view.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "active"]);
    }

    struct Collect(Arc<Mutex<Vec<ReportEvent>>>);

    impl Reporter for Collect {
        fn report(&self, event: ReportEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn large_listings_number_every_row_by_position() {
        let records: RecordSet = (0..40_000)
            .map(|i| {
                let method = if i % 2 == 0 {
                    HttpMethod::Get
                } else {
                    HttpMethod::Post
                };
                record(
                    &format!("{:05}.json", i),
                    "/items",
                    method,
                    "http://h/items",
                )
            })
            .collect();
        let s = Session::new(records, Box::new(NoReport));

        let all = s.list("");
        assert_eq!(all.rows.len(), 40_000);
        assert!(all
            .rows
            .iter()
            .enumerate()
            .all(|(i, row)| row.number == i + 1));

        let posts = s.list("method=POST");
        assert_eq!(posts.rows.len(), 20_000);
        assert_eq!(posts.rows[0].number, 2);
        assert_eq!(posts.rows[19_999].number, 40_000);
        assert_eq!(posts.rows[19_999].id, "39999.json");
    }

    #[test]
    fn shared_filter_warns_once_for_many_selectors() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let records: RecordSet = vec![
            record("a.json", "/a", HttpMethod::Get, "http://h/a"),
            record("b.json", "/b", HttpMethod::Get, "http://h/b"),
        ]
        .into_iter()
        .collect();
        let s = Session::new(records, Box::new(Collect(Arc::clone(&events))));

        let spec = s.filter("bogus=1 method=GET");
        assert!(s.detail_matching("1", &spec).is_ok());
        assert!(s.detail_matching("b.json", &spec).is_ok());
        assert_eq!(
            s.detail_matching("3", &spec).unwrap_err(),
            QueryError::NotFound("3".to_string())
        );
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_filter_keys_are_reported_not_fatal() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let records: RecordSet = vec![record("a.json", "/a", HttpMethod::Get, "http://h/a")]
            .into_iter()
            .collect();
        let s = Session::new(records, Box::new(Collect(Arc::clone(&events))));

        let result = s.count("bogus=1 method=GET");
        assert_eq!(result.filtered, Some(1));

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![ReportEvent::FilterWarning {
                message: "unknown filter key 'bogus' ignored".to_string()
            }]
        );
    }
}
