//! Reporting sink for human-facing status messages.
//!
//! The core never writes to a terminal. Ingestion and query code emit
//! [`ReportEvent`]s to a [`Reporter`] supplied by the caller, which decides
//! whether they go to stderr, a JSON stream, or nowhere.

use std::fmt;

/// A single status notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// One archive entry could not be ingested.
    EntryFailed { entry: String, error: String },
    /// Ingestion finished with `parsed` records and `failed` rejected entries.
    Ingested { parsed: usize, failed: usize },
    /// A filter token was ignored or degraded to "no constraint".
    FilterWarning { message: String },
}

impl fmt::Display for ReportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportEvent::EntryFailed { entry, error } => {
                write!(f, "Error processing {}: {}", entry, error)
            }
            ReportEvent::Ingested { parsed, failed } => {
                write!(f, "Successfully decompressed {} JSON files", parsed)?;
                if *failed > 0 {
                    write!(f, " ({} failed)", failed)?;
                }
                Ok(())
            }
            ReportEvent::FilterWarning { message } => write!(f, "Filter: {}", message),
        }
    }
}

/// Receives status notifications. Fire-and-forget; order is preserved
/// within a single call into the core.
pub trait Reporter {
    fn report(&self, event: ReportEvent);
}

/// Discards every event.
pub struct NoReport;

impl Reporter for NoReport {
    fn report(&self, _event: ReportEvent) {}
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn report(&self, event: ReportEvent) {
        (**self).report(event)
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&self, event: ReportEvent) {
        (**self).report(event)
    }
}
