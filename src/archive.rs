//! Archive readers feeding the core ingestor.
//!
//! A scan export is normally a `.zip` of one JSON document per exchange.
//! An already-extracted directory is accepted too, walked the same way the
//! archive is iterated. Entry names are the ids records are keyed by.
//!
//! Failures split in two: an archive that cannot be opened is fatal, while
//! one bad entry only becomes an ingest failure.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use walkdir::WalkDir;

use scan_debugger_core::error::IngestError;
use scan_debugger_core::ingest::{IngestOutcome, Ingestor};
use scan_debugger_core::report::Reporter;

use crate::config::ArchiveConfig;

/// Entry selection shared by the zip and directory readers.
struct EntryFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl EntryFilter {
    fn new(config: &ArchiveConfig) -> Result<Self> {
        Ok(Self {
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&config.exclude_globs)?,
        })
    }

    fn selects(&self, name: &str) -> bool {
        !self.exclude.is_match(name) && self.include.is_match(name)
    }
}

/// Load every exchange from `path`, a zip archive or a directory.
pub fn load_archive(
    path: &Path,
    config: &ArchiveConfig,
    reporter: &dyn Reporter,
) -> Result<IngestOutcome> {
    if !path.exists() {
        bail!("Archive not found: {}", path.display());
    }

    let filter = EntryFilter::new(config)?;
    let mut ingestor = Ingestor::new(config.ingest_options(), reporter);

    if path.is_dir() {
        read_directory(path, config, &filter, &mut ingestor)?;
    } else {
        read_zip(path, config, &filter, &mut ingestor)?;
    }

    let outcome = ingestor.finish();
    tracing::info!(
        archive = %path.display(),
        parsed = outcome.records.len(),
        failed = outcome.failures.len(),
        "archive loaded"
    );
    Ok(outcome)
}

fn read_zip(
    path: &Path,
    config: &ArchiveConfig,
    filter: &EntryFilter,
    ingestor: &mut Ingestor<'_>,
) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open archive: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Failed to read zip archive: {}", path.display()))?;

    tracing::debug!(entries = archive.len(), "reading zip archive");

    for i in 0..archive.len() {
        let entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                ingestor.reject_entry(
                    &format!("entry #{}", i),
                    IngestError::Unreadable(e.to_string()),
                );
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        if !filter.selects(&name) || !ingestor.accepts(&name) {
            continue;
        }

        match read_bounded(entry, &name, config.max_entry_bytes) {
            Ok(bytes) => ingestor.add_entry(&name, &bytes),
            Err(error) => ingestor.reject_entry(&name, error),
        }
    }
    Ok(())
}

fn read_directory(
    root: &Path,
    config: &ArchiveConfig,
    filter: &EntryFilter,
    ingestor: &mut Ingestor<'_>,
) -> Result<()> {
    let walker = WalkDir::new(root).sort_by_file_name();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = relative.to_string_lossy().replace('\\', "/");

        if !filter.selects(&name) || !ingestor.accepts(&name) {
            continue;
        }

        let bytes = File::open(path)
            .map_err(|e| IngestError::Unreadable(e.to_string()))
            .and_then(|file| read_bounded(file, &name, config.max_entry_bytes));
        match bytes {
            Ok(bytes) => ingestor.add_entry(&name, &bytes),
            Err(error) => ingestor.reject_entry(&name, error),
        }
    }
    Ok(())
}

/// Read at most `max_bytes`; anything larger is refused rather than truncated.
fn read_bounded<R: Read>(reader: R, name: &str, max_bytes: u64) -> Result<Vec<u8>, IngestError> {
    let mut out = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| IngestError::Unreadable(e.to_string()))?;
    if out.len() as u64 > max_bytes {
        return Err(IngestError::Unreadable(format!(
            "entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_debugger_core::report::NoReport;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn exchange_json(path: &str, method: &str) -> String {
        format!(
            r#"{{"name":"{path}","method":"{method}","url":"https://api.test{path}","responseStatusCode":200,"inferredStatusCode":200,"coverage":"covered","requester":"crawler","responseBody":"ok"}}"#
        )
    }

    fn write_zip(dir: &TempDir, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.path().join("scan.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, body) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn zip_entries_become_records() {
        let dir = TempDir::new().unwrap();
        let login = exchange_json("/login", "POST");
        let users = exchange_json("/users", "GET");
        let path = write_zip(
            &dir,
            &[
                ("exchanges/", ""),
                ("exchanges/1.json", login.as_str()),
                ("exchanges/2.json", users.as_str()),
                ("README.txt", "not an exchange"),
                ("__MACOSX/exchanges/._1.json", "junk"),
            ],
        );

        let outcome = load_archive(&path, &ArchiveConfig::default(), &NoReport).unwrap();
        assert!(outcome.failures.is_empty());
        let ids: Vec<&str> = outcome.records.ids().collect();
        assert_eq!(ids, vec!["exchanges/1.json", "exchanges/2.json"]);
    }

    #[test]
    fn bad_entries_are_failures_not_fatal() {
        let dir = TempDir::new().unwrap();
        let good = exchange_json("/a", "GET");
        let path = write_zip(
            &dir,
            &[("good.json", good.as_str()), ("bad.json", "{ not json")],
        );

        let outcome = load_archive(&path, &ArchiveConfig::default(), &NoReport).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].entry, "bad.json");
    }

    #[test]
    fn oversized_entries_are_rejected() {
        let dir = TempDir::new().unwrap();
        let small = exchange_json("/a", "GET");
        let path = write_zip(&dir, &[("small.json", small.as_str())]);
        let config = ArchiveConfig {
            max_entry_bytes: 16,
            ..ArchiveConfig::default()
        };

        let outcome = load_archive(&path, &config, &NoReport).unwrap();
        assert!(outcome.records.is_empty());
        assert!(matches!(
            outcome.failures[0].error,
            IngestError::Unreadable(ref msg) if msg.contains("exceeds size limit")
        ));
    }

    #[test]
    fn exact_limit_is_allowed() {
        let data = b"0123456789";
        assert_eq!(read_bounded(&data[..], "x", 10).unwrap().len(), 10);
        assert!(read_bounded(&data[..], "x", 9).is_err());
    }

    #[test]
    fn corrupt_archive_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"this is not a zip").unwrap();

        let err = load_archive(&path, &ArchiveConfig::default(), &NoReport).unwrap_err();
        assert!(err.to_string().contains("Failed to read zip archive"));
    }

    #[test]
    fn missing_archive_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = load_archive(
            &dir.path().join("nope.zip"),
            &ArchiveConfig::default(),
            &NoReport,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Archive not found"));
    }

    #[test]
    fn directories_are_walked_with_relative_ids() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("run/nested")).unwrap();
        std::fs::write(dir.path().join("run/a.json"), exchange_json("/a", "GET")).unwrap();
        std::fs::write(
            dir.path().join("run/nested/b.json"),
            exchange_json("/b", "PUT"),
        )
        .unwrap();
        std::fs::write(dir.path().join("run/notes.md"), "skip me").unwrap();

        let config = ArchiveConfig {
            exclude_globs: vec!["nested/**".to_string()],
            ..ArchiveConfig::default()
        };
        let outcome = load_archive(&dir.path().join("run"), &config, &NoReport).unwrap();
        let ids: Vec<&str> = outcome.records.ids().collect();
        assert_eq!(ids, vec!["a.json"]);
    }
}
