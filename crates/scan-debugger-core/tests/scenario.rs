//! End-to-end behaviour of the core pipeline: ingest raw entries, then
//! query them through filters and endpoint aggregates.

use std::collections::BTreeSet;

use scan_debugger_core::aggregate::{EndpointIndex, EndpointKey};
use scan_debugger_core::filter::FilterSpec;
use scan_debugger_core::ingest::{ingest_entries, IngestOptions};
use scan_debugger_core::models::{HttpMethod, RecordSet};
use scan_debugger_core::query::Session;
use scan_debugger_core::report::NoReport;
use serde_json::{json, Value};

fn exchange(name: &str, method: &str, url: &str, status: u16, inferred: u16) -> Value {
    json!({
        "requestHeaders": [{"name": "User-Agent", "values": ["scanner/1.0"]}],
        "requestBody": "",
        "responseHeaders": [{"name": "Content-Type", "values": ["application/json; charset=utf-8"]}],
        "responseBody": "{\"status\":\"ok\"}",
        "responseStatusCode": status,
        "inferredStatusCode": inferred,
        "scanId": "scan-42",
        "method": method,
        "url": url,
        "duration": 0.12,
        "coverage": "covered",
        "user": "alice",
        "requester": "crawler",
        "inferredScalars": [],
        "name": name
    })
}

fn login_and_user() -> Vec<(String, Vec<u8>)> {
    vec![
        (
            "exchanges/0001.json".to_string(),
            serde_json::to_vec(&exchange(
                "/login",
                "POST",
                "https://api.test/login",
                200,
                200,
            ))
            .unwrap(),
        ),
        (
            "exchanges/0002.json".to_string(),
            serde_json::to_vec(&exchange(
                "/users/{id}",
                "get",
                "https://api.test/users/42?active=true",
                404,
                404,
            ))
            .unwrap(),
        ),
    ]
}

/// A varied set for property checks.
fn corpus() -> RecordSet {
    let mut entries = Vec::new();
    let methods = ["GET", "POST", "DELETE"];
    let coverages = ["covered", "uncovered", "skipped"];
    let requesters = ["crawler", "oracle-fuzzer", "replay"];
    for i in 0..18usize {
        let mut value = exchange(
            if i % 2 == 0 { "/items/{id}" } else { "/health" },
            methods[i % 3],
            &format!("https://api.test/items/{}?page={}", i, i % 4),
            200,
            [200u16, 401, 500][i % 3],
        );
        value["coverage"] = json!(coverages[(i / 3) % 3]);
        value["requester"] = json!(requesters[(i / 2) % 3]);
        value["responseBody"] = json!("x".repeat(i * 10));
        value["inSchema"] = json!(i % 4 == 0);
        if i % 5 == 0 {
            value["responseHeaders"] = json!([{"name": "content-type", "values": ["text/html"]}]);
        }
        entries.push((
            format!("{:03}.json", i),
            serde_json::to_vec(&value).unwrap(),
        ));
    }
    ingest_entries(entries, IngestOptions::default(), &NoReport).records
}

fn ids(set: &RecordSet) -> BTreeSet<String> {
    set.ids().map(str::to_string).collect()
}

#[test]
fn login_and_user_scenario() {
    let outcome = ingest_entries(login_and_user(), IngestOptions::default(), &NoReport);
    assert!(outcome.failures.is_empty());
    let session = Session::new(outcome.records, Box::new(NoReport));

    let count = session.count("");
    assert_eq!(count.total, 2);
    assert_eq!(count.filtered, None);

    let listing = session.list("method=GET");
    assert_eq!(listing.rows.len(), 1);
    assert_eq!(listing.rows[0].id, "exchanges/0002.json");
    assert_eq!(listing.rows[0].inferred_status_code, 404);

    let summary = session.summarize("", false);
    assert_eq!(summary.rows.len(), 2);
    assert!(summary.rows.iter().all(|r| r.count_exchanges == 1));

    let detail = session.detail("exchanges/0001.json", "").unwrap();
    assert_eq!(detail.record.method, HttpMethod::Post);
    assert_eq!(detail.record.normalized_path, "/login");
    assert_eq!(detail.content_type.as_deref(), Some("application/json"));
    assert_eq!(detail.record.scan_id.as_deref(), Some("scan-42"));
}

#[test]
fn path_and_query_parameters_round_trip() {
    let outcome = ingest_entries(login_and_user(), IngestOptions::default(), &NoReport);
    let record = outcome.records.get("exchanges/0002.json").unwrap();
    assert_eq!(
        record.path_parameters(),
        vec![("id".to_string(), "42".to_string())]
    );
    assert_eq!(
        record.query_parameters(),
        vec![("active".to_string(), "true".to_string())]
    );
}

#[test]
fn one_good_and_one_incomplete_entry() {
    let mut incomplete = exchange("/login", "POST", "https://api.test/login", 200, 200);
    incomplete
        .as_object_mut()
        .unwrap()
        .remove("inferredStatusCode");
    let entries = vec![
        (
            "good.json",
            serde_json::to_vec(&exchange("/a", "GET", "/a", 200, 200)).unwrap(),
        ),
        ("bad.json", serde_json::to_vec(&incomplete).unwrap()),
    ];

    let outcome = ingest_entries(entries, IngestOptions::default(), &NoReport);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].entry, "bad.json");
}

#[test]
fn empty_filter_is_identity() {
    let records = corpus();
    let spec = FilterSpec::parse("").spec;
    assert!(!spec.is_active());
    assert_eq!(spec.apply(&records), records);
}

#[test]
fn inversion_is_complement_for_every_field() {
    let records = corpus();
    let all = ids(&records);
    let exprs = [
        "method=GET",
        "url=items/1",
        "status_code=401",
        "inferred_status_code=500",
        "coverage=covered",
        "size=20-90",
        "size=oops",
        "content_type=json",
        "requester=fuzz",
        "path=/health",
        "in_schema=true",
        "in_schema=perhaps",
        "url=([bad",
    ];

    for expr in exprs {
        let (key, value) = expr.split_once('=').unwrap();
        let plain = FilterSpec::parse(expr).spec.apply(&records);
        let inverted = FilterSpec::parse(&format!("{}=!{}", key, value))
            .spec
            .apply(&records);

        let expected: BTreeSet<String> = all.difference(&ids(&plain)).cloned().collect();
        assert_eq!(ids(&inverted), expected, "inversion of {}", expr);
    }
}

#[test]
fn size_bounds_are_inclusive() {
    let records = corpus();
    // bodies are 0, 10, 20, ... 170 bytes
    let hit = FilterSpec::parse("size=30-60").spec.apply(&records);
    let sizes: BTreeSet<usize> = hit.iter().map(|r| r.response_size()).collect();
    assert_eq!(sizes, BTreeSet::from([30, 40, 50, 60]));

    let edges = FilterSpec::parse("size=31-59").spec.apply(&records);
    let sizes: BTreeSet<usize> = edges.iter().map(|r| r.response_size()).collect();
    assert_eq!(sizes, BTreeSet::from([40, 50]));
}

#[test]
fn aggregates_agree_with_path_and_method_filters() {
    let records = corpus();
    let index = EndpointIndex::aggregate(&records);
    assert!(!index.is_empty());

    for agg in index.iter() {
        let expr = format!("path={} method={}", agg.key.normalized_path, agg.key.method);
        let members = FilterSpec::parse(&expr).spec.apply(&records);

        assert_eq!(ids(&members), agg.record_ids);
        assert_eq!(members.len(), agg.count_exchanges());

        let recomputed = EndpointIndex::aggregate(&members);
        assert_eq!(recomputed.len(), 1);
        assert_eq!(recomputed.get(&agg.key), Some(agg));
    }
}

#[test]
fn filtered_and_unfiltered_summaries_are_independent_passes() {
    let session = Session::new(corpus(), Box::new(NoReport));
    let unfiltered = session.summarize("", false);
    let filtered = session.summarize("method=DELETE", false);

    assert_eq!(filtered.unfiltered_endpoints, Some(unfiltered.rows.len()));
    assert!(filtered.rows.len() < unfiltered.rows.len());
    assert!(filtered.rows.iter().all(|r| r.method == HttpMethod::Delete));

    let key = EndpointKey::new("/health", HttpMethod::Delete);
    let index = EndpointIndex::aggregate(session.records());
    let row = filtered
        .rows
        .iter()
        .find(|r| r.normalized_path == key.normalized_path)
        .unwrap();
    assert_eq!(row.count_exchanges, index.count_for(&key));
}
