//! # Scan Debugger Core
//!
//! Pure logic for inspecting a bundle of captured scanner exchanges: the
//! record model, ingestion of raw JSON entries, the typed filter engine,
//! endpoint aggregation, and the query facade the command layer calls.
//!
//! This crate performs no file, archive, or terminal I/O. Callers hand it
//! entry bytes and a [`report::Reporter`], and render the typed results
//! themselves.
//!
//! ```text
//! archive entries ──▶ ingest ──▶ RecordSet ──▶ filter ──▶ aggregate
//!                                    │                       │
//!                                    └──────▶ query ◀────────┘
//! ```
//!
//! ```rust
//! use scan_debugger_core::ingest::{ingest_entries, IngestOptions};
//! use scan_debugger_core::query::Session;
//! use scan_debugger_core::report::NoReport;
//!
//! let entry = br#"{"method":"GET","url":"/ping","responseStatusCode":200,
//!     "inferredStatusCode":200,"coverage":"covered","requester":"crawler"}"#;
//! let outcome = ingest_entries([("ping.json", &entry[..])], IngestOptions::default(), &NoReport);
//! let session = Session::new(outcome.records, Box::new(NoReport));
//! assert_eq!(session.count("method=GET").filtered, Some(1));
//! ```

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod params;
pub mod query;
pub mod report;
