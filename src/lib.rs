//! # Scan Debugger
//!
//! Inspect the traffic an API security scanner recorded: load a scan export
//! (a zip of one JSON document per HTTP exchange), then count, list, group
//! and drill into exchanges with a small `key=value` filter language.
//!
//! The record model, filter engine, endpoint aggregation and query facade
//! live in [`scan_debugger_core`]. This crate adds the outer surface: archive
//! reading, configuration, logging, text rendering and the interactive shell.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │ archive  │──▶│  ingest  │──▶│ RecordSet │──▶│ Session  │
//! │ zip/dir  │   │  (core)  │   │  (core)   │   │  (core)  │
//! └──────────┘   └──────────┘   └───────────┘   └────┬─────┘
//!                                                    │
//!                                  ┌─────────────────┤
//!                                  ▼                 ▼
//!                            ┌──────────┐      ┌──────────┐
//!                            │  shell   │      │ one-shot │
//!                            │ (render) │      │  --json  │
//!                            └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scandbg analyze scan.zip                 # interactive shell
//! scandbg count scan.zip method=POST
//! scandbg summary scan.zip --full coverage=!covered
//! scandbg info scan.zip 12 --no-body
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`archive`] | Zip and directory readers feeding the ingestor |
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`progress`] | Stderr reporters for ingest and filter notifications |
//! | [`render`] | Plain-text tables and detail views |
//! | [`shell`] | Interactive command loop |

pub mod archive;
pub mod config;
pub mod logging;
pub mod progress;
pub mod render;
pub mod shell;
