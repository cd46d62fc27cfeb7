// Append-only JSONL journals
//
// Each collection lives in one journal file, one JSON document per line.
// Writes only ever append (updates re-append the whole record, deletes
// append a tombstone), so replay keeps the newest line per key.

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use fs2::FileExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{info, warn};

/// Append a record to a journal under an exclusive file lock.
pub fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open journal for appending")?;

    file.lock_exclusive().context("Failed to acquire journal lock")?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{}", json)?;
    file.sync_all()?;

    // Lock is released when the file handle drops
    Ok(())
}

/// Append a tombstone marking the record with `key` as deleted.
pub fn append_tombstone(path: &Path, key_field: &str, key: &str) -> Result<()> {
    let tombstone = serde_json::json!({
        key_field: key,
        "deleted": true,
        "updated_at": Utc::now(),
    });
    append(path, &tombstone)
}

/// Replay a journal, returning the newest surviving version of each record.
///
/// Records are keyed by the string field `key_field` and compared by their
/// `updated_at` timestamp; tombstoned keys are dropped from the result.
/// Unreadable or malformed lines are skipped with a warning so one bad
/// line cannot poison the whole collection.
pub fn replay_latest(path: &Path, key_field: &str) -> Result<HashMap<String, Value>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let file = File::open(path).context("Failed to open journal")?;
    let reader = BufReader::new(file);
    let mut latest: HashMap<String, Value> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(file = ?path, line = line_num + 1, error = ?e, "Failed to read line, skipping");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let record: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(file = ?path, line = line_num + 1, error = ?e, "Failed to parse JSON, skipping");
                continue;
            }
        };

        let key = match record.get(key_field).and_then(Value::as_str) {
            Some(k) => k.to_string(),
            None => {
                warn!(file = ?path, line = line_num + 1, key_field, "Record missing key field, skipping");
                continue;
            }
        };

        match latest.get(&key) {
            Some(existing) if revised_at(existing) >= revised_at(&record) => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    // Tombstones take part in latest-wins above, then drop out here
    latest.retain(|_, record| !is_tombstone(record));

    info!(file = ?path, count = latest.len(), "Replayed journal");
    Ok(latest)
}

fn is_tombstone(record: &Value) -> bool {
    record.get("deleted").and_then(Value::as_bool).unwrap_or(false)
}

fn revised_at(record: &Value) -> DateTime<Utc> {
    record
        .get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Todo;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_replay() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("todos.jsonl");

        let todo = Todo::new("First");
        append(&path, &todo).unwrap();

        let records = replay_latest(&path, "id").unwrap();
        assert_eq!(records.len(), 1);
        let stored = records.get(&todo.id).unwrap();
        assert_eq!(stored.get("title").and_then(Value::as_str), Some("First"));
    }

    #[test]
    fn test_replay_keeps_newest_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("todos.jsonl");

        let mut todo = Todo::new("Original");
        append(&path, &todo).unwrap();

        todo.title = "Revised".to_string();
        todo.updated_at = todo.updated_at + chrono::Duration::seconds(5);
        append(&path, &todo).unwrap();

        let records = replay_latest(&path, "id").unwrap();
        assert_eq!(records.len(), 1);
        let stored = records.get(&todo.id).unwrap();
        assert_eq!(stored.get("title").and_then(Value::as_str), Some("Revised"));
    }

    #[test]
    fn test_tombstone_removes_record() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("todos.jsonl");

        let todo = Todo::new("Doomed");
        append(&path, &todo).unwrap();
        append_tombstone(&path, "id", &todo.id).unwrap();

        let records = replay_latest(&path, "id").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_replay_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let records = replay_latest(&temp.path().join("absent.jsonl"), "id").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_replay_skips_malformed_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("todos.jsonl");

        let first = Todo::new("Valid");
        let second = Todo::new("Also valid");
        fs::write(
            &path,
            format!(
                "{}\n{{malformed json}}\n{{\"no_key\": true}}\n{}\n",
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap(),
            ),
        )
        .unwrap();

        let records = replay_latest(&path, "id").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.contains_key(&first.id));
        assert!(records.contains_key(&second.id));
    }
}
