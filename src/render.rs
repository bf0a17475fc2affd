//! Plain-text rendering of query results.
//!
//! Every renderer writes to any [`Write`] so the shell, the one-shot
//! commands and the tests share one code path.

use std::io::{self, Write};

use scan_debugger_core::error::QueryError;
use scan_debugger_core::models::Header;
use scan_debugger_core::query::{CountResult, ExchangeDetail, Listing, ParamsView, Summary};

use crate::config::DisplayConfig;

const STATUS_DESCRIPTIONS: &[(u16, &str)] = &[
    (100, "Continue"),
    (101, "Switching Protocols"),
    (102, "Processing"),
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (207, "Multi-Status"),
    (208, "Already Reported"),
    (226, "IM Used"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (307, "Temporary Redirect"),
    (308, "Permanent Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Payload Too Large"),
    (414, "URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (418, "I'm a Teapot"),
    (421, "Misdirected Request"),
    (422, "Unprocessable Entity"),
    (423, "Locked"),
    (424, "Failed Dependency"),
    (425, "Too Early"),
    (426, "Upgrade Required"),
    (428, "Precondition Required"),
    (429, "Too Many Requests"),
    (431, "Request Header Fields Too Large"),
    (451, "Unavailable For Legal Reasons"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
    (506, "Variant Also Negotiates"),
    (507, "Insufficient Storage"),
    (508, "Loop Detected"),
    (510, "Not Extended"),
    (511, "Network Authentication Required"),
    (520, "Web Server Returned an Unknown Error"),
    (521, "Web Server Is Down"),
    (522, "Connection Timed Out"),
    (524, "A Timeout Occurred"),
    (599, "Network Connect Timeout Error"),
];

/// Reason phrase for an HTTP status code, or "Unknown".
pub fn status_description(code: u16) -> &'static str {
    STATUS_DESCRIPTIONS
        .binary_search_by_key(&code, |(c, _)| *c)
        .map(|i| STATUS_DESCRIPTIONS[i].1)
        .unwrap_or("Unknown")
}

pub fn bytes_to_kb(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

/// Shorten a joined endpoint list that exceeds the display limit.
pub fn truncate_endpoints(joined: &str, display: &DisplayConfig) -> String {
    if joined.chars().count() <= display.max_endpoint_len {
        return joined.to_string();
    }
    let mut out: String = joined
        .chars()
        .take(display.truncated_endpoint_len)
        .collect();
    out.push_str("...");
    out
}

/// Pretty-print a body that parses as JSON; anything else is returned as is.
pub fn pretty_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}

#[derive(Clone, Copy, PartialEq)]
enum Align {
    Left,
    Right,
}

/// Column-aligned table sized to its widest cell.
struct TextTable {
    columns: Vec<(&'static str, Align)>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn new(columns: &[(&'static str, Align)]) -> Self {
        Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, (title, _))| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(title.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let headers: Vec<String> = self.columns.iter().map(|(t, _)| t.to_string()).collect();
        self.write_line(out, &headers, &widths)?;
        let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        writeln!(out, "  {}", "-".repeat(total))?;
        for row in &self.rows {
            self.write_line(out, row, &widths)?;
        }
        Ok(())
    }

    fn write_line(
        &self,
        out: &mut dyn Write,
        cells: &[String],
        widths: &[usize],
    ) -> io::Result<()> {
        let mut line = String::from(" ");
        for (i, ((_, align), width)) in self.columns.iter().zip(widths).enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            line.push(' ');
            match align {
                Align::Left => line.push_str(&format!("{:<width$}", cell, width = width)),
                Align::Right => line.push_str(&format!("{:>width$}", cell, width = width)),
            }
            line.push(' ');
        }
        writeln!(out, "{}", line.trim_end())
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn write_count(out: &mut dyn Write, count: &CountResult) -> io::Result<()> {
    writeln!(out, "Total exchanges: {}", count.total)?;
    if let Some(filtered) = count.filtered {
        writeln!(out, "Filtered exchanges: {}", filtered)?;
    }
    Ok(())
}

pub fn write_listing(out: &mut dyn Write, listing: &Listing) -> io::Result<()> {
    let mut table = TextTable::new(&[
        ("NUMBER", Align::Right),
        ("ENDPOINT", Align::Left),
        ("METHOD", Align::Left),
        ("STATUS", Align::Right),
        ("COVERAGE", Align::Left),
        ("CONTENT TYPE", Align::Left),
        ("SIZE", Align::Right),
        ("REQUESTER", Align::Left),
    ]);
    for row in &listing.rows {
        table.push(vec![
            row.number.to_string(),
            row.normalized_path.clone(),
            row.method.to_string(),
            row.inferred_status_code.to_string(),
            row.coverage.clone(),
            row.content_type.clone(),
            bytes_to_kb(row.response_size),
            row.requester.clone(),
        ]);
    }

    writeln!(out, "Request Details")?;
    writeln!(out)?;
    table.write(out)?;
    if listing.filter_active {
        writeln!(out)?;
        writeln!(
            out,
            "Showing {} of {} requests",
            listing.rows.len(),
            listing.total
        )?;
    }
    Ok(())
}

pub fn write_summary(
    out: &mut dyn Write,
    summary: &Summary,
    display: &DisplayConfig,
) -> io::Result<()> {
    let mut table = TextTable::new(&[
        ("ID", Align::Left),
        ("NAME", Align::Left),
        ("METHOD", Align::Left),
        ("ENDPOINTS", Align::Left),
        ("STATUS CODES", Align::Left),
        ("INFERRED", Align::Left),
        ("COVERAGE", Align::Left),
        ("COUNT", Align::Right),
    ]);
    for row in &summary.rows {
        let endpoints = join(&row.endpoints);
        let endpoints = if summary.show_full_urls {
            endpoints
        } else {
            truncate_endpoints(&endpoints, display)
        };
        table.push(vec![
            row.group_id.clone(),
            row.normalized_path.clone(),
            row.method.to_string(),
            endpoints,
            join(&row.status_codes),
            join(&row.inferred_status_codes),
            join(&row.coverage),
            row.count_exchanges.to_string(),
        ]);
    }

    writeln!(out, "Endpoint Summary")?;
    writeln!(out)?;
    table.write(out)?;
    writeln!(out)?;
    if !summary.show_full_urls {
        writeln!(out, "Tip: Use 'summary full' to see complete endpoint URLs")?;
    }
    if let Some(unfiltered) = summary.unfiltered_endpoints {
        writeln!(
            out,
            "Showing summary for {} of {} endpoints",
            summary.rows.len(),
            unfiltered
        )?;
    }
    Ok(())
}

fn write_headers(out: &mut dyn Write, title: &str, headers: &[Header]) -> io::Result<()> {
    let present: Vec<(&str, &str)> = headers
        .iter()
        .filter_map(|h| h.first_value().map(|v| (h.name.as_str(), v)))
        .collect();
    if present.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "  {}:", title)?;
    for (name, value) in present {
        writeln!(out, "    {}: {}", name, value)?;
    }
    Ok(())
}

fn write_pairs(out: &mut dyn Write, title: &str, pairs: &[(String, String)]) -> io::Result<()> {
    if pairs.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "  {}:", title)?;
    for (name, value) in pairs {
        writeln!(out, "    {}: {}", name, value)?;
    }
    Ok(())
}

fn write_body(out: &mut dyn Write, title: &str, body: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title)?;
    for line in pretty_body(body).lines() {
        writeln!(out, "  {}", line)?;
    }
    Ok(())
}

pub fn write_detail(
    out: &mut dyn Write,
    detail: &ExchangeDetail,
    show_bodies: bool,
) -> io::Result<()> {
    let record = &detail.record;
    writeln!(out, "# {} (File #{})", record.id, detail.number)?;
    writeln!(out)?;

    writeln!(out, "Request Details")?;
    writeln!(out, "  URL:       {}", record.url)?;
    writeln!(out, "  Method:    {}", record.method)?;
    writeln!(out, "  Endpoint:  {}", record.normalized_path)?;
    writeln!(out, "  Requester: {}", record.requester)?;
    if let Some(user) = &record.user {
        writeln!(out, "  User:      {}", user)?;
    }
    if let Some(scan_id) = &record.scan_id {
        writeln!(out, "  Scan ID:   {}", scan_id)?;
    }
    if let Some(exchange_id) = &record.exchange_id {
        writeln!(out, "  Exchange:  {}", exchange_id)?;
    }
    write_pairs(out, "Path Parameters", &detail.path_parameters)?;
    write_pairs(out, "Query Parameters", &detail.query_parameters)?;
    write_headers(out, "Request Headers", &record.request_headers)?;
    if show_bodies && !record.request_body.is_empty() {
        write_body(out, "Request Body", &record.request_body)?;
    }

    writeln!(out)?;
    writeln!(out, "Response Details")?;
    writeln!(
        out,
        "  Status Code:          {} ({})",
        record.response_status_code,
        status_description(record.response_status_code)
    )?;
    writeln!(
        out,
        "  Inferred Status Code: {} ({})",
        record.inferred_status_code,
        status_description(record.inferred_status_code)
    )?;
    writeln!(out, "  Duration:             {:.3} s", record.duration)?;
    writeln!(
        out,
        "  Size:                 {}",
        bytes_to_kb(detail.response_size)
    )?;
    writeln!(
        out,
        "  Content Type:         {}",
        detail.content_type.as_deref().unwrap_or("unknown")
    )?;
    writeln!(out, "  Coverage:             {}", record.coverage)?;
    writeln!(
        out,
        "  In Schema:            {}",
        if record.in_schema { "yes" } else { "no" }
    )?;
    write_headers(out, "Response Headers", &record.response_headers)?;
    if show_bodies && !record.response_body.is_empty() {
        write_body(out, "Response Body", &record.response_body)?;
    }

    if !record.inferred_scalars.is_empty() {
        writeln!(out)?;
        writeln!(out, "Inferred Scalars")?;
        for scalar in &record.inferred_scalars {
            writeln!(
                out,
                "  {} ({}): {:.2}",
                scalar.name, scalar.kind, scalar.confidence
            )?;
        }
    }
    if !record.extra.is_empty() {
        writeln!(out)?;
        writeln!(out, "Other Fields")?;
        for (key, value) in &record.extra {
            writeln!(out, "  {}: {}", key, value)?;
        }
    }
    if let Some(curl) = &record.curl {
        writeln!(out)?;
        writeln!(out, "Reproduce")?;
        writeln!(out, "  {}", curl)?;
    }
    writeln!(out)
}

pub fn write_params(out: &mut dyn Write, view: &ParamsView) -> io::Result<()> {
    writeln!(out, "Request Parameters - File #{}", view.number)?;
    writeln!(out)?;
    if view.parameters.is_empty() {
        return writeln!(out, "  (no parameters)");
    }
    let mut table = TextTable::new(&[
        ("PARAMETER", Align::Left),
        ("VALUE", Align::Left),
        ("LOCATION", Align::Left),
    ]);
    for param in &view.parameters {
        table.push(vec![
            param.name.clone(),
            param.value.clone(),
            param.location.as_str().to_string(),
        ]);
    }
    table.write(out)
}

pub fn write_query_error(out: &mut dyn Write, err: &QueryError) -> io::Result<()> {
    writeln!(out, "Error: {}", err)
}
