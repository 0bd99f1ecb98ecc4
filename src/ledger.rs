// src/ledger.rs
//! Append-only signal ledger backed by a single JSON array file.
//!
//! Writers go through one async mutex for the whole read-modify-write span, and the
//! new array is written to a sibling temp file and renamed over the old one, so a
//! reader sees either the previous array or the new one, never a torn write.

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde_json::Value;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::types::SignalRecord;

pub struct Ledger {
    path: PathBuf,
    tmp_path: PathBuf,
    write_lock: Mutex<()>,
}

/// What is on disk, before any per-record validation.
enum Contents {
    Missing,
    Entries(Vec<Value>),
    Corrupt(serde_json::Error),
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tmp_path = path.with_extension("json.tmp");
        Self {
            path,
            tmp_path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All well-formed records in insertion order.
    ///
    /// Entries that do not parse as a signal are skipped but stay in the file. A missing,
    /// unreadable or non-array file reads as empty.
    pub async fn list_all(&self) -> Vec<SignalRecord> {
        let entries = match read_contents(&self.path).await {
            Ok(Contents::Entries(entries)) => entries,
            Ok(Contents::Missing) => return Vec::new(),
            Ok(Contents::Corrupt(e)) => {
                warn!(path = %self.path.display(), "ledger malformed, listing as empty: {e}");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "ledger unreadable, listing as empty: {e}");
                return Vec::new();
            }
        };

        let total = entries.len();
        let records: Vec<SignalRecord> = entries
            .into_iter()
            .filter_map(|v| SignalRecord::from_json(v).ok())
            .collect();
        if records.len() < total {
            warn!(skipped = total - records.len(), "ledger entries without valid coordinates");
        }
        records
    }

    /// Appends one record. Existing entries are carried over verbatim, including ones
    /// `list_all` skips. A file that is not a JSON array is moved aside, never overwritten.
    pub async fn append(&self, record: SignalRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = match read_contents(&self.path).await? {
            Contents::Missing => Vec::new(),
            Contents::Entries(entries) => entries,
            Contents::Corrupt(e) => {
                let aside = self.quarantine().await?;
                warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    "ledger malformed, starting a new one: {e}"
                );
                Vec::new()
            }
        };
        entries.push(serde_json::to_value(&record)?);

        let bytes = serde_json::to_vec(&entries)?;
        let mut file = fs::File::create(&self.tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&self.tmp_path, &self.path).await?;

        debug!(count = entries.len(), "ledger appended");
        Ok(())
    }

    async fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{stamp}"));
        let aside = PathBuf::from(name);
        fs::rename(&self.path, &aside).await?;
        Ok(aside)
    }
}

async fn read_contents(path: &Path) -> std::io::Result<Contents> {
    let bytes = match fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Contents::Missing),
        Err(e) => return Err(e),
    };
    Ok(match serde_json::from_slice::<Vec<Value>>(&bytes) {
        Ok(entries) => Contents::Entries(entries),
        Err(e) => Contents::Corrupt(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record(lat: f64, lng: f64, note: &str) -> SignalRecord {
        SignalRecord::from_json(json!({"lat": lat, "lng": lng, "message": note})).unwrap()
    }

    #[tokio::test]
    async fn empty_when_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("signals.json"));
        assert!(ledger.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn sequential_appends_keep_order_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("signals.json"));

        for i in 0..10 {
            ledger.append(record(i as f64, -(i as f64), &format!("sos {i}"))).await.unwrap();
        }

        let all = ledger.list_all().await;
        assert_eq!(all.len(), 10);
        for (i, rec) in all.iter().enumerate() {
            assert_eq!(rec.lat, i as f64);
            assert_eq!(rec.lng, -(i as f64));
            assert_eq!(rec.extra["message"], format!("sos {i}"));
        }
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::new(dir.path().join("signals.json")));

        let mut tasks = Vec::new();
        for i in 0..50 {
            let ledger = ledger.clone();
            tasks.push(tokio::spawn(async move {
                ledger.append(record(1.0, 2.0, &format!("k{i}"))).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let all = ledger.list_all().await;
        assert_eq!(all.len(), 50);
        let mut notes: Vec<String> = all
            .iter()
            .map(|r| r.extra["message"].as_str().unwrap().to_string())
            .collect();
        notes.sort();
        notes.dedup();
        assert_eq!(notes.len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reads_overlap_appends_without_going_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::new(dir.path().join("signals.json")));
        let finished = Arc::new(AtomicUsize::new(0));

        let mut writers = Vec::new();
        for i in 0..50 {
            let ledger = ledger.clone();
            let finished = finished.clone();
            writers.push(tokio::spawn(async move {
                ledger.append(record(1.0, 2.0, &format!("w{i}"))).await.unwrap();
                finished.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let reader = {
            let ledger = ledger.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                let mut last = 0;
                while last < 50 {
                    let floor = finished.load(Ordering::SeqCst);
                    let seen = ledger.list_all().await.len();
                    assert!(seen >= last, "went from {last} to {seen}");
                    assert!(seen >= floor, "saw {seen} after {floor} appends returned");
                    last = seen;
                    tokio::task::yield_now().await;
                }
            })
        };

        for w in writers {
            w.await.unwrap();
        }
        reader.await.unwrap();
        assert_eq!(ledger.list_all().await.len(), 50);
    }

    #[tokio::test]
    async fn legacy_entries_survive_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.json");
        std::fs::write(
            &path,
            r#"[{"lat":1.0,"lng":2.0,"time":"10:00"},{"lat":"3","lng":4,"time":"10:01"}]"#,
        )
        .unwrap();

        let ledger = Ledger::new(&path);
        let listed = ledger.list_all().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].extra["time"], "10:00");

        ledger.append(record(5.0, 6.0, "new")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            json!([
                {"lat": 1.0, "lng": 2.0, "time": "10:00"},
                {"lat": "3", "lng": 4, "time": "10:01"},
                {"lat": 5.0, "lng": 6.0, "message": "new"}
            ])
        );
        assert_eq!(ledger.list_all().await.len(), 2);
    }

    #[tokio::test]
    async fn malformed_file_is_moved_aside_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.json");
        let original = b"[{\"lat\": 1, \"lng\":";
        std::fs::write(&path, original).unwrap();

        let ledger = Ledger::new(&path);
        assert!(ledger.list_all().await.is_empty());

        ledger.append(record(3.0, 4.0, "after")).await.unwrap();
        assert_eq!(ledger.list_all().await.len(), 1);

        let aside: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("signals.json.corrupt-"))
            })
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(std::fs::read(&aside[0]).unwrap(), original);
    }

    #[tokio::test]
    async fn non_array_json_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.json");
        std::fs::write(&path, br#"{"lat": 1, "lng": 2}"#).unwrap();

        let ledger = Ledger::new(&path);
        assert!(ledger.list_all().await.is_empty());
        ledger.append(record(0.5, 0.5, "fresh")).await.unwrap();

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
        assert_eq!(ledger.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn file_is_plain_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.json");
        let ledger = Ledger::new(&path);
        ledger.append(record(5.0, 6.0, "hi")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, json!([{"lat": 5.0, "lng": 6.0, "message": "hi"}]));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn write_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("missing-dir").join("signals.json"));
        assert!(matches!(
            ledger.append(record(0.0, 0.0, "x")).await,
            Err(StoreError::Io(_))
        ));
    }
}
