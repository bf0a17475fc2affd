//! Typed filter engine.
//!
//! A filter expression is a whitespace-separated list of `key=value` tokens.
//! Values may be quoted to include spaces, and any value may start with
//! [`NEGATION_MARKER`] to invert that one field.
//!
//! ```text
//! method=GET status_code=!200 url="api/v[12]/users" size=100-2048
//! ```
//!
//! Parsing produces a [`FilterSpec`]: one optional [`Criterion`] per known
//! field. Criteria are combined with logical AND. Filtering is best-effort:
//! an unknown key or an unparseable value becomes a [`FilterWarning`] and
//! never rejects the whole expression.
//!
//! | Key | Match rule |
//! |-----|------------|
//! | `method` | case-insensitive equality |
//! | `url` | regex found anywhere in the URL |
//! | `status_code`, `inferred_status_code` | string equality against the inferred status |
//! | `coverage` | substring |
//! | `size` | inclusive `min-max` on response body bytes |
//! | `content_type` | substring of the derived content type |
//! | `requester` | substring |
//! | `path` | equality with the normalized path |
//! | `in_schema` | boolean equality |

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::models::{ExchangeRecord, RecordSet};

/// Prefix on a value that negates its criterion.
pub const NEGATION_MARKER: char = '!';

/// The closed set of filterable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Method,
    Url,
    StatusCode,
    InferredStatusCode,
    Coverage,
    Size,
    ContentType,
    Requester,
    Path,
    InSchema,
}

impl FilterKey {
    pub const ALL: [FilterKey; 10] = [
        FilterKey::Method,
        FilterKey::Url,
        FilterKey::StatusCode,
        FilterKey::InferredStatusCode,
        FilterKey::Coverage,
        FilterKey::Size,
        FilterKey::ContentType,
        FilterKey::Requester,
        FilterKey::Path,
        FilterKey::InSchema,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Method => "method",
            FilterKey::Url => "url",
            FilterKey::StatusCode => "status_code",
            FilterKey::InferredStatusCode => "inferred_status_code",
            FilterKey::Coverage => "coverage",
            FilterKey::Size => "size",
            FilterKey::ContentType => "content_type",
            FilterKey::Requester => "requester",
            FilterKey::Path => "path",
            FilterKey::InSchema => "in_schema",
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

/// One field constraint plus its inversion flag.
#[derive(Debug, Clone)]
pub struct Criterion<T> {
    pub value: T,
    pub inverted: bool,
}

impl<T> Criterion<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            inverted: false,
        }
    }

    pub fn negated(value: T) -> Self {
        Self {
            value,
            inverted: true,
        }
    }

    fn apply(&self, matched: bool) -> bool {
        matched != self.inverted
    }
}

/// Inclusive byte range, or the raw text when it did not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeRange {
    Bounds { min: usize, max: usize },
    Malformed(String),
}

impl SizeRange {
    pub fn parse(raw: &str) -> Self {
        let parsed = raw.split_once('-').and_then(|(lo, hi)| {
            let min = lo.trim().parse::<usize>().ok()?;
            let max = hi.trim().parse::<usize>().ok()?;
            Some(SizeRange::Bounds { min, max })
        });
        parsed.unwrap_or_else(|| SizeRange::Malformed(raw.to_string()))
    }

    /// Malformed ranges never exclude.
    fn contains(&self, size: usize) -> bool {
        match self {
            SizeRange::Bounds { min, max } => *min <= size && size <= *max,
            SizeRange::Malformed(_) => true,
        }
    }
}

/// Compiled URL pattern, or the raw text when it is not a valid regex.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Regex(Regex),
    Invalid(String),
}

impl UrlPattern {
    pub fn parse(raw: &str) -> Self {
        match Regex::new(raw) {
            Ok(re) => UrlPattern::Regex(re),
            Err(_) => UrlPattern::Invalid(raw.to_string()),
        }
    }

    fn is_match(&self, url: &str) -> bool {
        match self {
            UrlPattern::Regex(re) => re.is_match(url),
            UrlPattern::Invalid(_) => true,
        }
    }
}

/// Problems found while parsing a filter expression. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterWarning {
    UnknownKey(String),
    NotKeyValue(String),
    EmptyValue(FilterKey),
    MalformedValue { key: FilterKey, value: String },
    UnterminatedQuote,
}

impl fmt::Display for FilterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterWarning::UnknownKey(key) => write!(f, "unknown filter key '{}' ignored", key),
            FilterWarning::NotKeyValue(token) => {
                write!(f, "'{}' is not a key=value filter, ignored", token)
            }
            FilterWarning::EmptyValue(key) => write!(f, "empty value for '{}' ignored", key),
            FilterWarning::MalformedValue { key, value } => write!(
                f,
                "malformed value '{}' for '{}', treated as no constraint",
                value, key
            ),
            FilterWarning::UnterminatedQuote => f.write_str("unterminated quote in filter"),
        }
    }
}

/// A parsed, immutable set of optional typed criteria.
///
/// An absent criterion places no constraint on its field.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub method: Option<Criterion<String>>,
    pub url: Option<Criterion<UrlPattern>>,
    pub status_code: Option<Criterion<String>>,
    pub inferred_status_code: Option<Criterion<String>>,
    pub coverage: Option<Criterion<String>>,
    pub size: Option<Criterion<SizeRange>>,
    pub content_type: Option<Criterion<String>>,
    pub requester: Option<Criterion<String>>,
    pub path: Option<Criterion<String>>,
    pub in_schema: Option<Criterion<Option<bool>>>,
}

/// Result of [`FilterSpec::parse`].
#[derive(Debug, Clone, Default)]
pub struct ParsedFilter {
    pub spec: FilterSpec,
    pub warnings: Vec<FilterWarning>,
}

impl FilterSpec {
    /// Parse a filter expression. Later occurrences of a key replace
    /// earlier ones.
    pub fn parse(expr: &str) -> ParsedFilter {
        let mut spec = FilterSpec::default();
        let (tokens, unterminated) = tokenize(expr);
        let mut warnings = Vec::new();

        for token in tokens {
            let Some((key, raw_value)) = token.split_once('=') else {
                warnings.push(FilterWarning::NotKeyValue(token));
                continue;
            };
            let Ok(key) = key.parse::<FilterKey>() else {
                warnings.push(FilterWarning::UnknownKey(key.to_string()));
                continue;
            };

            let (inverted, value) = match raw_value.strip_prefix(NEGATION_MARKER) {
                Some(rest) => (true, rest),
                None => (false, raw_value),
            };
            if value.is_empty() {
                warnings.push(FilterWarning::EmptyValue(key));
                continue;
            }

            if let Some(warning) = spec.set(key, value, inverted) {
                warnings.push(warning);
            }
        }

        if unterminated {
            warnings.push(FilterWarning::UnterminatedQuote);
        }

        ParsedFilter { spec, warnings }
    }

    fn set(&mut self, key: FilterKey, value: &str, inverted: bool) -> Option<FilterWarning> {
        fn criterion<T>(value: T, inverted: bool) -> Option<Criterion<T>> {
            Some(Criterion { value, inverted })
        }
        let malformed = || FilterWarning::MalformedValue {
            key,
            value: value.to_string(),
        };

        match key {
            FilterKey::Method => self.method = criterion(value.to_string(), inverted),
            FilterKey::Url => {
                let pattern = UrlPattern::parse(value);
                let warning = matches!(pattern, UrlPattern::Invalid(_)).then(malformed);
                self.url = criterion(pattern, inverted);
                return warning;
            }
            FilterKey::StatusCode => self.status_code = criterion(value.to_string(), inverted),
            FilterKey::InferredStatusCode => {
                self.inferred_status_code = criterion(value.to_string(), inverted)
            }
            FilterKey::Coverage => self.coverage = criterion(value.to_string(), inverted),
            FilterKey::Size => {
                let range = SizeRange::parse(value);
                let warning = matches!(range, SizeRange::Malformed(_)).then(malformed);
                self.size = criterion(range, inverted);
                return warning;
            }
            FilterKey::ContentType => self.content_type = criterion(value.to_string(), inverted),
            FilterKey::Requester => self.requester = criterion(value.to_string(), inverted),
            FilterKey::Path => self.path = criterion(value.to_string(), inverted),
            FilterKey::InSchema => {
                let flag = parse_bool(value);
                self.in_schema = criterion(flag, inverted);
                return flag.is_none().then(malformed);
            }
        }
        None
    }

    /// Whether any criterion is present.
    pub fn is_active(&self) -> bool {
        self.method.is_some()
            || self.url.is_some()
            || self.status_code.is_some()
            || self.inferred_status_code.is_some()
            || self.coverage.is_some()
            || self.size.is_some()
            || self.content_type.is_some()
            || self.requester.is_some()
            || self.path.is_some()
            || self.in_schema.is_some()
    }

    /// Whether `record` satisfies every present criterion.
    pub fn matches(&self, record: &ExchangeRecord) -> bool {
        fn check<T>(c: &Option<Criterion<T>>, test: impl FnOnce(&T) -> bool) -> bool {
            c.as_ref().map_or(true, |c| c.apply(test(&c.value)))
        }

        let inferred = record.inferred_status_code.to_string();

        check(&self.method, |m| {
            record.method.as_str().eq_ignore_ascii_case(m)
        }) && check(&self.url, |p| p.is_match(&record.url))
            && check(&self.status_code, |s| *s == inferred)
            && check(&self.inferred_status_code, |s| *s == inferred)
            && check(&self.coverage, |s| record.coverage.contains(s.as_str()))
            && check(&self.size, |r| r.contains(record.response_size()))
            && check(&self.content_type, |s| {
                record.content_type_or_unknown().contains(s.as_str())
            })
            && check(&self.requester, |s| record.requester.contains(s.as_str()))
            && check(&self.path, |s| record.normalized_path == *s)
            && check(&self.in_schema, |flag| {
                flag.map_or(true, |f| record.in_schema == f)
            })
    }

    /// The subset of `records` that matches. An inactive spec returns the
    /// input unchanged.
    pub fn apply(&self, records: &RecordSet) -> RecordSet {
        if !self.is_active() {
            return records.clone();
        }
        records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Split on unquoted whitespace. Quotes group characters and are removed.
/// Returns the tokens and whether a quote was left open.
fn tokenize(expr: &str) -> (Vec<String>, bool) {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in expr.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }

    (tokens, quote.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::record;
    use crate::models::{Header, HttpMethod};

    fn sized(id: &str, bytes: usize) -> ExchangeRecord {
        let mut rec = record(id, "/blob", HttpMethod::Get, "http://h/blob");
        rec.response_body = "x".repeat(bytes);
        rec
    }

    fn spec(expr: &str) -> FilterSpec {
        FilterSpec::parse(expr).spec
    }

    #[test]
    fn tokenize_respects_quotes() {
        let (tokens, open) = tokenize(r#"url="a b" requester='x y'  method=GET"#);
        assert_eq!(tokens, vec!["url=a b", "requester=x y", "method=GET"]);
        assert!(!open);

        let (tokens, open) = tokenize(r#"url="never closed"#);
        assert_eq!(tokens, vec!["url=never closed"]);
        assert!(open);
    }

    #[test]
    fn empty_expression_is_inactive() {
        let parsed = FilterSpec::parse("   ");
        assert!(!parsed.spec.is_active());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn unknown_keys_and_bare_tokens_warn() {
        let parsed = FilterSpec::parse("endpoint=/users full method=GET");
        assert!(parsed.spec.method.is_some());
        assert_eq!(
            parsed.warnings,
            vec![
                FilterWarning::UnknownKey("endpoint".to_string()),
                FilterWarning::NotKeyValue("full".to_string()),
            ]
        );
    }

    #[test]
    fn negation_marker_sets_inverted() {
        let parsed = spec("method=!get");
        let method = parsed.method.unwrap();
        assert!(method.inverted);
        assert_eq!(method.value, "get");
    }

    #[test]
    fn method_match_is_case_insensitive() {
        let rec = record("a", "/a", HttpMethod::Get, "http://h/a");
        assert!(spec("method=get").matches(&rec));
        assert!(!spec("method=POST").matches(&rec));
        assert!(spec("method=!POST").matches(&rec));
    }

    #[test]
    fn url_is_searched_not_fully_matched() {
        let rec = record(
            "a",
            "/a",
            HttpMethod::Get,
            "https://api.example.com/v2/users?id=1",
        );
        assert!(spec("url=v[12]/users").matches(&rec));
        assert!(!spec("url=^/v2").matches(&rec));
    }

    #[test]
    fn invalid_regex_degrades_to_no_constraint() {
        let parsed = FilterSpec::parse("url=([unclosed");
        assert!(matches!(
            parsed.warnings.as_slice(),
            [FilterWarning::MalformedValue {
                key: FilterKey::Url,
                ..
            }]
        ));
        let rec = record("a", "/a", HttpMethod::Get, "http://h/a");
        assert!(parsed.spec.matches(&rec));
    }

    #[test]
    fn status_keys_compare_inferred_status() {
        let mut rec = record("a", "/a", HttpMethod::Get, "http://h/a");
        rec.response_status_code = 200;
        rec.inferred_status_code = 403;
        assert!(spec("status_code=403").matches(&rec));
        assert!(!spec("status_code=200").matches(&rec));
        assert!(spec("inferred_status_code=403").matches(&rec));
        assert!(!spec("status_code=40").matches(&rec));
    }

    #[test]
    fn size_range_is_inclusive() {
        let f = spec("size=10-20");
        assert!(!f.matches(&sized("a", 9)));
        assert!(f.matches(&sized("b", 10)));
        assert!(f.matches(&sized("c", 20)));
        assert!(!f.matches(&sized("d", 21)));
    }

    #[test]
    fn malformed_size_never_excludes() {
        for raw in ["10", "a-b", "10-", "-5"] {
            let parsed = FilterSpec::parse(&format!("size={}", raw));
            assert!(parsed.spec.is_active());
            assert!(parsed.spec.matches(&sized("a", 1000)), "size={}", raw);
            assert_eq!(parsed.warnings.len(), 1);
        }
    }

    #[test]
    fn content_type_uses_derived_value() {
        let mut rec = record("a", "/a", HttpMethod::Get, "http://h/a");
        assert!(spec("content_type=unknown").matches(&rec));
        rec.response_headers = vec![Header {
            name: "Content-Type".to_string(),
            values: vec!["application/json; charset=utf-8".to_string()],
        }];
        assert!(spec("content_type=json").matches(&rec));
        assert!(!spec("content_type=charset").matches(&rec));
    }

    #[test]
    fn substring_and_equality_fields() {
        let mut rec = record("a", "/users/{id}", HttpMethod::Get, "http://h/users/1");
        rec.coverage = "uncovered".to_string();
        rec.requester = "oracle-fuzzer".to_string();

        assert!(spec("coverage=covered").matches(&rec));
        assert!(spec("requester=oracle").matches(&rec));
        assert!(spec("path=/users/{id}").matches(&rec));
        assert!(!spec("path=/users").matches(&rec));
    }

    #[test]
    fn in_schema_boolean() {
        let mut rec = record("a", "/a", HttpMethod::Get, "http://h/a");
        rec.in_schema = true;
        assert!(spec("in_schema=true").matches(&rec));
        assert!(spec("in_schema=YES").matches(&rec));
        assert!(!spec("in_schema=false").matches(&rec));
        assert!(spec("in_schema=maybe").matches(&rec));
    }

    #[test]
    fn criteria_combine_with_and() {
        let rec = record("a", "/a", HttpMethod::Get, "http://h/a");
        assert!(spec("method=GET coverage=covered").matches(&rec));
        assert!(!spec("method=GET coverage=skipped").matches(&rec));
    }

    #[test]
    fn later_key_replaces_earlier() {
        let f = spec("method=POST method=GET");
        assert_eq!(f.method.unwrap().value, "GET");
    }

    #[test]
    fn empty_value_is_ignored() {
        let parsed = FilterSpec::parse("method= requester=!");
        assert!(!parsed.spec.is_active());
        assert_eq!(
            parsed.warnings,
            vec![
                FilterWarning::EmptyValue(FilterKey::Method),
                FilterWarning::EmptyValue(FilterKey::Requester),
            ]
        );
    }
}
