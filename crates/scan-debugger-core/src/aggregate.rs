//! Per-endpoint statistics.
//!
//! Records are grouped by `(normalized path, method)`: the same path with two
//! methods yields two aggregates. An [`EndpointIndex`] is a derived view built
//! in one pass over a [`RecordSet`]; it is rebuilt whenever the displayed set
//! changes and never updated in place.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{ExchangeRecord, HttpMethod, RecordSet};

/// Identity of an endpoint aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EndpointKey {
    pub normalized_path: String,
    pub method: HttpMethod,
}

impl EndpointKey {
    pub fn new(normalized_path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            normalized_path: normalized_path.into(),
            method,
        }
    }

    pub fn of(record: &ExchangeRecord) -> Self {
        Self::new(record.normalized_path.clone(), record.method)
    }
}

/// Accumulated statistics for every exchange sharing one [`EndpointKey`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointAggregate {
    pub key: EndpointKey,
    pub status_codes: BTreeSet<u16>,
    pub inferred_status_codes: BTreeSet<u16>,
    pub coverage: BTreeSet<String>,
    /// Response body byte lengths in record order.
    pub response_sizes: Vec<usize>,
    pub content_types: BTreeSet<String>,
    pub requesters: BTreeSet<String>,
    pub record_ids: BTreeSet<String>,
    /// Concrete URL paths seen for this endpoint.
    pub url_paths: BTreeSet<String>,
    /// Full URLs seen for this endpoint.
    pub urls: BTreeSet<String>,
}

impl EndpointAggregate {
    fn new(key: EndpointKey) -> Self {
        Self {
            key,
            status_codes: BTreeSet::new(),
            inferred_status_codes: BTreeSet::new(),
            coverage: BTreeSet::new(),
            response_sizes: Vec::new(),
            content_types: BTreeSet::new(),
            requesters: BTreeSet::new(),
            record_ids: BTreeSet::new(),
            url_paths: BTreeSet::new(),
            urls: BTreeSet::new(),
        }
    }

    fn add(&mut self, record: &ExchangeRecord) {
        self.status_codes.insert(record.response_status_code);
        self.inferred_status_codes
            .insert(record.inferred_status_code);
        self.coverage.insert(record.coverage.clone());
        self.response_sizes.push(record.response_size());
        if let Some(ct) = record.content_type() {
            self.content_types.insert(ct);
        }
        self.requesters.insert(record.requester.clone());
        self.record_ids.insert(record.id.clone());
        self.url_paths.insert(record.url_path());
        self.urls.insert(record.url.clone());
    }

    /// Number of member exchanges.
    pub fn count_exchanges(&self) -> usize {
        self.record_ids.len()
    }

    pub fn min_size(&self) -> Option<usize> {
        self.response_sizes.iter().copied().min()
    }

    pub fn max_size(&self) -> Option<usize> {
        self.response_sizes.iter().copied().max()
    }

    pub fn total_size(&self) -> usize {
        self.response_sizes.iter().sum()
    }
}

/// All aggregates of one pass, in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointIndex {
    aggregates: BTreeMap<EndpointKey, EndpointAggregate>,
}

impl EndpointIndex {
    /// Build aggregates in a single pass over `records`.
    pub fn aggregate(records: &RecordSet) -> Self {
        let mut aggregates: BTreeMap<EndpointKey, EndpointAggregate> = BTreeMap::new();
        for record in records.iter() {
            let key = EndpointKey::of(record);
            aggregates
                .entry(key.clone())
                .or_insert_with(|| EndpointAggregate::new(key))
                .add(record);
        }
        Self { aggregates }
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    pub fn get(&self, key: &EndpointKey) -> Option<&EndpointAggregate> {
        self.aggregates.get(key)
    }

    /// Member count for `key`, zero when absent.
    pub fn count_for(&self, key: &EndpointKey) -> usize {
        self.get(key).map_or(0, EndpointAggregate::count_exchanges)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointAggregate> {
        self.aggregates.values()
    }
}
