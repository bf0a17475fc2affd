//! Request parameter extraction.
//!
//! URLs in captured exchanges are usually absolute, but replayed or
//! hand-written fixtures may carry only a path (`/users/42?active=true`).
//! Relative URLs are resolved against a placeholder origin so both forms
//! parse the same way.

use serde::Serialize;
use url::Url;

use crate::models::ExchangeRecord;

const RELATIVE_BASE: &str = "http://localhost/";

/// Where a request parameter was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
        }
    }
}

/// A single named request parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeParameter {
    pub name: String,
    pub value: String,
    pub location: ParamLocation,
}

fn parse_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(RELATIVE_BASE).ok()?.join(raw).ok()
        }
        Err(_) => None,
    }
}

/// Path component of `raw`, without query string or fragment.
pub fn url_path(raw: &str) -> String {
    match parse_url(raw) {
        Some(url) => url.path().to_string(),
        None => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Decoded query string pairs, in URL order. Repeated names are kept.
pub fn query_parameters(raw: &str) -> Vec<(String, String)> {
    parse_url(raw)
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

/// Align `{name}` placeholders in `template` with the segments of `path`.
///
/// Segments are matched by position after dropping empty segments, so a
/// trailing slash on either side does not shift the alignment. Placeholders
/// beyond the end of `path` yield nothing.
pub fn path_parameters(template: &str, path: &str) -> Vec<(String, String)> {
    let template_segments = template.split('/').filter(|s| !s.is_empty());
    let path_segments = path.split('/').filter(|s| !s.is_empty());

    template_segments
        .zip(path_segments)
        .filter_map(|(tpl, actual)| {
            placeholder_name(tpl).map(|name| (name.to_string(), actual.to_string()))
        })
        .collect()
}

fn placeholder_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Path parameters, then query parameters, then each request header with
/// its first value. Headers without a value are skipped.
pub fn request_parameters(record: &ExchangeRecord) -> Vec<ExchangeParameter> {
    let path = record
        .path_parameters()
        .into_iter()
        .map(|(name, value)| ExchangeParameter {
            name,
            value,
            location: ParamLocation::Path,
        });
    let query = record
        .query_parameters()
        .into_iter()
        .map(|(name, value)| ExchangeParameter {
            name,
            value,
            location: ParamLocation::Query,
        });
    let headers = record.request_headers.iter().filter_map(|h| {
        h.values.first().map(|v| ExchangeParameter {
            name: h.name.clone(),
            value: v.clone(),
            location: ParamLocation::Header,
        })
    });

    path.chain(query).chain(headers).collect()
}
