//! Local file adapter.
//!
//! Report documents live under the reports directory, one or more per agent.
//! Approvals and leads are JSON arrays that are re-read and rewritten on every
//! append.

use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::agents::{AgentDescriptor, ReportPattern};
use crate::error::{Result, TriageError};
use crate::model::CanonicalReport;
use crate::report::report_from_document;

/// Report files written by the upstream monitors.
#[derive(Debug, Clone)]
pub struct ReportFiles {
    reports_dir: PathBuf,
}

impl ReportFiles {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    #[must_use]
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// The most recently modified file matching any of the agent's patterns.
    pub async fn latest_for(&self, agent: &AgentDescriptor) -> Option<PathBuf> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for pattern in &agent.patterns {
            let (dir, prefix) = match pattern {
                ReportPattern::Prefix(prefix) => (self.reports_dir.clone(), prefix.as_str()),
                ReportPattern::Directory(sub) => match self.subdirectory(sub) {
                    Some(dir) => (dir, ""),
                    None => {
                        warn!(agent = %agent.id, pattern = %sub, "Report directory escapes the reports dir, skipping");
                        continue;
                    }
                },
            };

            for (modified, path) in json_files(&dir, prefix).await {
                if newest.as_ref().map_or(true, |(best, _)| modified > *best) {
                    newest = Some((modified, path));
                }
            }
        }

        newest.map(|(_, path)| path)
    }

    /// `reports_dir/sub`, provided `sub` is a single plain path component.
    fn subdirectory(&self, sub: &str) -> Option<PathBuf> {
        let mut components = Path::new(sub).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.reports_dir.join(sub)),
            _ => None,
        }
    }

    /// Parse the agent's latest report file.
    ///
    /// Returns `None` when no file matches or the newest one is unreadable.
    pub async fn read_report(&self, agent: &AgentDescriptor) -> Option<CanonicalReport> {
        let path = self.latest_for(agent).await?;

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(agent = %agent.id, path = %path.display(), error = %e, "Failed to read report file");
                return None;
            }
        };

        let doc: Value = match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(agent = %agent.id, path = %path.display(), error = %e, "Malformed report file");
                return None;
            }
        };

        let report = report_from_document(&agent.id, &doc);
        if report.is_none() {
            warn!(agent = %agent.id, path = %path.display(), "Report file is not a JSON object");
        }
        report
    }
}

/// `*.json` files in `dir` whose names start with `prefix`, with their
/// modification times. A missing directory yields nothing.
async fn json_files(dir: &Path, prefix: &str) -> Vec<(SystemTime, PathBuf)> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Report directory not readable");
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.')
            || !name.starts_with(prefix)
            || !name.ends_with(".json")
        {
            continue;
        }

        let Ok(meta) = entry.metadata().await else { continue };
        if !meta.is_file() {
            continue;
        }
        if let Ok(modified) = meta.modified() {
            found.push((modified, entry.path()));
        }
    }
    found
}

/// An append-only JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonLog<T> {
    path: PathBuf,
    _entry: PhantomData<T>,
}

impl<T> JsonLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _entry: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, or `None` when the file does not exist yet.
    pub async fn read(&self) -> Result<Option<Vec<T>>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| TriageError::malformed(&self.path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TriageError::malformed(&self.path, e)),
        }
    }

    /// All entries. A missing file is an empty log.
    pub async fn load(&self) -> Result<Vec<T>> {
        Ok(self.read().await?.unwrap_or_default())
    }

    /// Append one entry, creating the file and its directory as needed.
    ///
    /// An existing file that cannot be parsed is left untouched and the
    /// append fails.
    pub async fn append(&self, entry: T) -> Result<()> {
        let mut entries = match self.load().await {
            Ok(entries) => entries,
            Err(TriageError::MalformedData { path, reason }) => {
                return Err(TriageError::LocalWrite {
                    path,
                    reason: format!("refusing to overwrite unreadable log: {reason}"),
                });
            }
            Err(e) => return Err(e),
        };
        entries.push(entry);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TriageError::local_write(&self.path, e))?;
        }

        let content = serde_json::to_string_pretty(&entries)
            .map_err(|e| TriageError::local_write(&self.path, e))?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| TriageError::local_write(&self.path, e))?;

        debug!(path = %self.path.display(), entries = entries.len(), "Appended to local log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentCatalog, Domain};
    use serde::Deserialize;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_aged(path: &Path, content: &str, age_secs: u64) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_latest_picks_most_recently_modified() {
        let dir = TempDir::new().unwrap();
        write_aged(&dir.path().join("zona-2026-01-01.json"), r#"{"date": "old"}"#, 300);
        write_aged(&dir.path().join("zona-2026-01-02.json"), r#"{"date": "new"}"#, 10);
        write_aged(&dir.path().join("zona-notes.txt"), "ignored", 0);

        let files = ReportFiles::new(dir.path());
        let zona = AgentCatalog::builtin().resolve("zona").unwrap();
        let report = files.read_report(&zona).await.unwrap();
        assert_eq!(report.date, "new");
    }

    #[tokio::test]
    async fn test_default_patterns_cover_flat_files_and_subdirectory() {
        let dir = TempDir::new().unwrap();
        write_aged(&dir.path().join("stella-weekly.json"), r#"{"date": "flat"}"#, 100);
        write_aged(&dir.path().join("stella/latest.json"), r#"{"date": "nested"}"#, 5);

        let files = ReportFiles::new(dir.path());
        let stella = AgentCatalog::builtin().resolve("stella").unwrap();
        assert_eq!(files.read_report(&stella).await.unwrap().date, "nested");
    }

    #[tokio::test]
    async fn test_dedicated_pattern_ignores_other_layouts() {
        let dir = TempDir::new().unwrap();
        write_aged(&dir.path().join("spia-report.json"), r#"{"date": "flat"}"#, 0);

        let files = ReportFiles::new(dir.path());
        let spia = AgentCatalog::builtin().resolve("spia").unwrap();
        assert!(files.latest_for(&spia).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_newest_file_is_absent() {
        let dir = TempDir::new().unwrap();
        write_aged(&dir.path().join("ghost-a.json"), r#"{"date": "ok"}"#, 100);
        write_aged(&dir.path().join("ghost-b.json"), "{not json", 0);

        let files = ReportFiles::new(dir.path());
        let ghost = AgentDescriptor::new("ghost", Domain::General);
        assert!(files.read_report(&ghost).await.is_none());
    }

    #[tokio::test]
    async fn test_directory_pattern_stays_inside_reports_dir() {
        let dir = TempDir::new().unwrap();
        write_aged(&dir.path().join("private/creds.json"), r#"{"summary": "secret"}"#, 0);
        write_aged(&dir.path().join("reports/nested/deeper/r.json"), r#"{"date": "x"}"#, 0);

        let files = ReportFiles::new(dir.path().join("reports"));
        for sub in ["../private", "..", "/tmp", "nested/deeper", ""] {
            let agent = AgentDescriptor::new("ghost", Domain::General)
                .with_patterns(vec![ReportPattern::Directory(sub.to_string())]);
            assert!(files.latest_for(&agent).await.is_none(), "{sub}");
        }
    }

    #[tokio::test]
    async fn test_missing_reports_dir() {
        let files = ReportFiles::new("/nonexistent/reports");
        let ghost = AgentDescriptor::unlisted("ghost");
        assert!(files.latest_for(&ghost).await.is_none());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: u32,
    }

    #[tokio::test]
    async fn test_log_append_creates_file_and_preserves_order() {
        let dir = TempDir::new().unwrap();
        let log: JsonLog<Entry> = JsonLog::new(dir.path().join("nested/log.json"));

        assert!(log.read().await.unwrap().is_none());
        assert!(log.load().await.unwrap().is_empty());
        log.append(Entry { id: 1 }).await.unwrap();
        log.append(Entry { id: 2 }).await.unwrap();

        assert_eq!(log.load().await.unwrap(), vec![Entry { id: 1 }, Entry { id: 2 }]);
    }

    #[tokio::test]
    async fn test_log_refuses_to_overwrite_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{broken").unwrap();

        let log: JsonLog<Entry> = JsonLog::new(&path);
        assert!(matches!(log.load().await, Err(TriageError::MalformedData { .. })));
        assert!(matches!(
            log.append(Entry { id: 1 }).await,
            Err(TriageError::LocalWrite { .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{broken");
    }
}
