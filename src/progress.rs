//! Status reporting for ingestion and queries.
//!
//! Implements the core [`Reporter`] sink. Notifications go to **stderr** so
//! stdout stays parseable when a command runs with `--json`.

use std::io::Write;

use scan_debugger_core::report::{NoReport, ReportEvent, Reporter};

/// Human-friendly lines on stderr: "Successfully decompressed 1,234 JSON files".
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&self, event: ReportEvent) {
        let line = match &event {
            ReportEvent::Ingested { parsed, failed } => {
                let mut line = format!(
                    "Successfully decompressed {} JSON files",
                    format_number(*parsed as u64)
                );
                if *failed > 0 {
                    line.push_str(&format!(" ({} failed)", format_number(*failed as u64)));
                }
                line
            }
            other => other.to_string(),
        };
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

/// Machine-readable notifications: one JSON object per line on stderr.
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, event: ReportEvent) {
        let obj = match &event {
            ReportEvent::EntryFailed { entry, error } => serde_json::json!({
                "event": "entry_failed",
                "entry": entry,
                "error": error
            }),
            ReportEvent::Ingested { parsed, failed } => serde_json::json!({
                "event": "ingested",
                "parsed": parsed,
                "failed": failed
            }),
            ReportEvent::FilterWarning { message } => serde_json::json!({
                "event": "filter_warning",
                "message": message
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Report mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ReportMode {
    Off,
    Human,
    Json,
}

impl ReportMode {
    /// Human reports when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ReportMode::Human
        } else {
            ReportMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn Reporter> {
        match self {
            ReportMode::Off => Box::new(NoReport),
            ReportMode::Human => Box::new(StderrReporter),
            ReportMode::Json => Box::new(JsonReporter),
        }
    }
}
