//! # Scan Debugger CLI (`scandbg`)
//!
//! Load a scanner export and inspect its exchanges, either interactively or
//! with one-shot commands.
//!
//! ## Usage
//!
//! ```bash
//! scandbg [--config ./scandbg.toml] [--report human|json|off] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scandbg analyze <archive>` | Load the archive and open the interactive shell |
//! | `scandbg count <archive> [filters]` | Total and filtered exchange counts |
//! | `scandbg list <archive> [filters]` | One row per exchange |
//! | `scandbg summary <archive> [--full] [filters]` | One row per endpoint |
//! | `scandbg info <archive> <id\|number>... [--no-body] [filters]` | Full exchange details |
//! | `scandbg params <archive> <id\|number> [filters]` | Request parameters of one exchange |
//!
//! Every one-shot command accepts `--json` for machine-readable output on
//! stdout. Notifications and logs always go to stderr.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use scan_debugger::archive::load_archive;
use scan_debugger::config::{self, Config};
use scan_debugger::logging;
use scan_debugger::progress::ReportMode;
use scan_debugger::render;
use scan_debugger::shell::Shell;
use scan_debugger_core::query::Session;

const DEFAULT_CONFIG_PATH: &str = "./scandbg.toml";

/// Scan Debugger: inspect the HTTP exchanges recorded by an API scan.
#[derive(Parser)]
#[command(
    name = "scandbg",
    about = "Inspect the HTTP exchanges recorded by an API security scan",
    version,
    long_about = "Loads a scan export (a zip of one JSON document per exchange, or an \
    extracted directory) and answers count, list, summary, info and params queries, \
    narrowed by key=value filters such as `method=GET status_code=!200 size=0-1024`."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./scandbg.toml`; built-in defaults apply when that
    /// file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off). Overrides the config.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// How ingest and filter notifications are reported on stderr.
    ///
    /// Defaults to `human` when stderr is a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    report: Option<ReportMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an archive and start the interactive shell.
    Analyze {
        /// Scan export: a `.zip` file or an extracted directory.
        archive: PathBuf,
    },

    /// Count exchanges, in total and after filtering.
    Count {
        archive: PathBuf,

        /// Filter expression tokens, e.g. `method=GET coverage=!covered`.
        filter: Vec<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// List exchanges in id order.
    List {
        archive: PathBuf,

        filter: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Group exchanges by endpoint (normalized path and method).
    Summary {
        archive: PathBuf,

        filter: Vec<String>,

        /// Show complete URLs instead of (truncated) URL paths.
        #[arg(long)]
        full: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show full details of one or more exchanges.
    ///
    /// Arguments containing `=` are filter tokens; the rest select
    /// exchanges by id or 1-based number.
    Info {
        archive: PathBuf,

        #[arg(required = true)]
        targets: Vec<String>,

        /// Do not print request and response bodies.
        #[arg(long)]
        no_body: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show the request parameters (path, query, header) of one exchange.
    Params {
        archive: PathBuf,

        /// Exchange id or 1-based number.
        selector: String,

        filter: Vec<String>,

        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn archive(&self) -> &Path {
        match self {
            Commands::Analyze { archive }
            | Commands::Count { archive, .. }
            | Commands::List { archive, .. }
            | Commands::Summary { archive, .. }
            | Commands::Info { archive, .. }
            | Commands::Params { archive, .. } => archive,
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(default)
            } else {
                Ok(Config::minimal())
            }
        }
    }
}

/// Rebuild one expression from argv tokens, re-quoting values the shell
/// already unquoted.
fn filter_expr(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| match token.split_once('=') {
            Some((key, value)) if value.contains(char::is_whitespace) && !value.contains('"') => {
                format!("{}=\"{}\"", key, value)
            }
            _ => token.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = resolve_config(cli.config.as_deref())?;
    logging::init(&cfg, cli.log_level.as_deref())?;

    let mode = cli.report.unwrap_or_else(ReportMode::default_for_tty);
    let reporter = mode.reporter();
    let outcome = load_archive(cli.command.archive(), &cfg.archive, &reporter)?;
    let session = Session::new(outcome.records, reporter);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Analyze { .. } => {
            let stdin = std::io::stdin();
            Shell::new(&session, &cfg.display).run(stdin.lock(), &mut out)?;
        }
        Commands::Count { filter, json, .. } => {
            let count = session.count(&filter_expr(&filter));
            if json {
                print_json(&mut out, &count)?;
            } else {
                render::write_count(&mut out, &count)?;
            }
        }
        Commands::List { filter, json, .. } => {
            let listing = session.list(&filter_expr(&filter));
            if json {
                print_json(&mut out, &listing)?;
            } else {
                render::write_listing(&mut out, &listing)?;
            }
        }
        Commands::Summary {
            filter, full, json, ..
        } => {
            let summary = session.summarize(&filter_expr(&filter), full);
            if json {
                print_json(&mut out, &summary)?;
            } else {
                render::write_summary(&mut out, &summary, &cfg.display)?;
            }
        }
        Commands::Info {
            targets,
            no_body,
            json,
            ..
        } => {
            let (filter, selectors): (Vec<String>, Vec<String>) =
                targets.into_iter().partition(|t| t.contains('='));
            if selectors.is_empty() {
                bail!("Please specify an exchange id or number");
            }
            let spec = session.filter(&filter_expr(&filter));
            let show_bodies = cfg.display.show_bodies && !no_body;

            let mut failed = 0;
            let mut entries = Vec::new();
            for selector in &selectors {
                match session.detail_matching(selector, &spec) {
                    Ok(detail) if json => entries.push(serde_json::to_value(&detail)?),
                    Ok(detail) => render::write_detail(&mut out, &detail, show_bodies)?,
                    Err(err) => {
                        failed += 1;
                        if json {
                            entries.push(serde_json::json!({
                                "selector": selector,
                                "error": err.to_string()
                            }));
                        } else {
                            render::write_query_error(&mut out, &err)?;
                        }
                    }
                }
            }
            if json {
                print_json(&mut out, &entries)?;
            }
            if failed > 0 {
                bail!(
                    "{} of {} exchanges could not be shown",
                    failed,
                    selectors.len()
                );
            }
        }
        Commands::Params {
            selector,
            filter,
            json,
            ..
        } => {
            let view = session.params(&selector, &filter_expr(&filter))?;
            if json {
                print_json(&mut out, &view)?;
            } else {
                render::write_params(&mut out, &view)?;
            }
        }
    }

    out.flush()?;
    Ok(())
}
