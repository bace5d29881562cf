//! Append-only activity journal (JSON lines, size-based rotation).

use anyhow::{Context, Result};
use chrono::Utc;
use cogito_types::{CycleKind, JournalEvent, JournalEventKind};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Append-only event journal.
pub struct Journal {
    dir: PathBuf,
    writer: Mutex<BufWriter<File>>,
    current_file: Mutex<PathBuf>,
    max_file_size: u64,
}

impl Journal {
    /// Open a fresh journal file in the given directory.
    pub fn open(dir: &Path, max_file_size: u64) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create journal dir: {}", dir.display()))?;

        let file_path = next_file_path(dir);
        let file = open_append(&file_path)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            current_file: Mutex::new(file_path),
            max_file_size,
        })
    }

    /// Emit a journal event.
    pub fn emit(
        &self,
        kind: JournalEventKind,
        job_id: Option<Uuid>,
        cycle: Option<CycleKind>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let event = JournalEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            kind,
            job_id,
            cycle,
            payload,
        };

        let line = serde_json::to_string(&event)?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")?;
        writer.flush()?;
        drop(writer);

        self.maybe_rotate()
    }

    /// Emit and log instead of propagating. Journal writes never fail a step.
    pub fn record(
        &self,
        kind: JournalEventKind,
        job_id: Option<Uuid>,
        cycle: Option<CycleKind>,
        payload: serde_json::Value,
    ) {
        if let Err(e) = self.emit(kind, job_id, cycle, payload) {
            tracing::warn!(error = %e, ?kind, "journal write failed");
        }
    }

    fn maybe_rotate(&self) -> Result<()> {
        let current = self.current_file.lock();
        let metadata = fs::metadata(&*current)?;
        if metadata.len() < self.max_file_size {
            return Ok(());
        }
        drop(current);

        let new_path = next_file_path(&self.dir);
        let new_file = open_append(&new_path)?;

        let mut writer = self.writer.lock();
        *writer = BufWriter::new(new_file);
        let mut current = self.current_file.lock();
        *current = new_path;

        tracing::info!(file = %current.display(), "journal rotated");
        Ok(())
    }

    /// Most recent events, newest first. Older files are read once the
    /// current one runs out, so a fresh rotation does not hide history.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<JournalEvent>> {
        let mut events = Vec::with_capacity(limit.min(1024));
        for path in self.files_newest_first()? {
            if events.len() >= limit {
                break;
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read journal: {}", path.display()))?;
            let remaining = limit - events.len();
            events.extend(
                content
                    .lines()
                    .rev()
                    .filter_map(|line| serde_json::from_str::<JournalEvent>(line).ok())
                    .take(remaining),
            );
        }
        Ok(events)
    }

    /// Journal files in the directory; names sort by creation time.
    fn files_newest_first(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list journal dir: {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("journal-") && n.ends_with(".jsonl"))
            })
            .collect();
        files.sort();
        files.reverse();
        Ok(files)
    }

    pub fn current_file(&self) -> PathBuf {
        self.current_file.lock().clone()
    }
}

/// The v7 suffix keeps names ordered for rotations within the same second.
fn next_file_path(dir: &Path) -> PathBuf {
    dir.join(format!(
        "journal-{}-{}.jsonl",
        Utc::now().format("%Y%m%d-%H%M%S"),
        Uuid::now_v7().simple()
    ))
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open journal file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recent_events_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path(), 1024 * 1024).unwrap();
        journal
            .emit(JournalEventKind::SystemStartup, None, None, json!({}))
            .unwrap();
        journal
            .emit(
                JournalEventKind::StepCompleted,
                Some(Uuid::now_v7()),
                Some(CycleKind::Learning),
                json!({"record": "knowledge"}),
            )
            .unwrap();

        let events = journal.recent_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, JournalEventKind::StepCompleted);
        assert_eq!(events[0].cycle, Some(CycleKind::Learning));
        assert_eq!(events[1].kind, JournalEventKind::SystemStartup);

        assert_eq!(journal.recent_events(1).unwrap().len(), 1);
    }

    #[test]
    fn rotates_past_max_size() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path(), 64).unwrap();
        let first = journal.current_file();
        journal
            .emit(
                JournalEventKind::CommandIssued,
                None,
                None,
                json!({"command": "start_thinking", "padding": "x".repeat(100)}),
            )
            .unwrap();
        assert_ne!(journal.current_file(), first);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);

        let events = journal.recent_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, JournalEventKind::CommandIssued);
    }

    #[test]
    fn recent_events_span_rotated_files() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path(), 200).unwrap();
        for step in 0..6u64 {
            journal
                .emit(
                    JournalEventKind::StepCompleted,
                    None,
                    Some(CycleKind::Thinking),
                    json!({"step": step, "padding": "x".repeat(60)}),
                )
                .unwrap();
        }
        assert!(fs::read_dir(dir.path()).unwrap().count() > 2);

        let events = journal.recent_events(4).unwrap();
        let steps: Vec<u64> = events
            .iter()
            .map(|e| e.payload["step"].as_u64().unwrap())
            .collect();
        assert_eq!(steps, vec![5, 4, 3, 2]);
        assert_eq!(journal.recent_events(100).unwrap().len(), 6);
    }
}
