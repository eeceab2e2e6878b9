//! Durable JSON storage shared by the identity stores
//!
//! Snapshots are written to a sibling temp file and renamed over the target,
//! so a reader of the path sees either the previous or the new document.
//! Append logs are JSON lines; unreadable lines are skipped on reload.

use crate::error::{Result, TrackingError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_failure(path: &Path, err: impl std::fmt::Display) -> TrackingError {
    TrackingError::persistence(format!("{}: {}", path.display(), err))
}

/// Serialize `value` and atomically replace `path` with it
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;
    }
    let tmp = temp_path(path);
    let write = || -> std::io::Result<()> {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        write_failure(path, e)
    })
}

/// Read a JSON document, `None` when the file does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(value))
}

/// Append one JSON line per record and flush to disk
pub fn append_json_lines<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;
    }
    let append = || -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        append_or_rollback(&mut file, &buf)
    };
    append().map_err(|e| write_failure(path, e))
}

/// Log file that can be cut back to a previous length
trait AppendTarget: Write {
    fn end(&self) -> std::io::Result<u64>;
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
    fn sync(&mut self) -> std::io::Result<()>;
}

impl AppendTarget for File {
    fn end(&self) -> std::io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_data()
    }
}

/// Append `buf` as a whole or not at all; a partial write is truncated away
/// so a retried batch does not duplicate records
fn append_or_rollback<W: AppendTarget>(target: &mut W, buf: &[u8]) -> std::io::Result<()> {
    let start = target.end()?;
    let written = target.write_all(buf).and_then(|_| target.sync());
    if let Err(e) = written {
        if let Err(rollback) = target.truncate(start) {
            log::warn!("Could not roll back partial append to length {}: {}", start, rollback);
        }
        return Err(e);
    }
    Ok(())
}

/// Replay a JSON-lines log, returning the records and the number of skipped lines
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    let mut skipped = 0;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!(
                    "{}:{}: skipping unreadable record: {}",
                    path.display(),
                    line_no + 1,
                    e
                );
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u32,
        value: f32,
    }

    #[test]
    fn test_atomic_snapshot_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("snapshot.json");

        assert!(read_json::<Record>(&path).unwrap().is_none());
        write_json_atomic(&path, &Record { id: 1, value: 0.5 }).unwrap();
        write_json_atomic(&path, &Record { id: 2, value: 0.25 }).unwrap();

        let loaded: Record = read_json(&path).unwrap().unwrap();
        assert_eq!(loaded, Record { id: 2, value: 0.25 });
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_json_lines_skip_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        append_json_lines(&path, &[Record { id: 1, value: 1.0 }]).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n\n")
            .unwrap();
        append_json_lines(&path, &[Record { id: 2, value: 2.0 }, Record { id: 3, value: 3.0 }])
            .unwrap();

        let (records, skipped): (Vec<Record>, usize) = read_json_lines(&path).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    /// Accepts `budget` bytes, then fails every write
    struct ShortLog {
        data: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.budget);
            self.data.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl AppendTarget for ShortLog {
        fn end(&self) -> std::io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> std::io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_append_is_rolled_back() {
        let mut log = ShortLog {
            data: b"{\"id\":1}\n".to_vec(),
            budget: 12,
        };
        let batch = b"{\"id\":2}\n{\"id\":3}\n";

        assert!(append_or_rollback(&mut log, batch).is_err());
        assert_eq!(log.data, b"{\"id\":1}\n".to_vec());

        // the retried batch lands exactly once
        log.budget = usize::MAX;
        append_or_rollback(&mut log, batch).unwrap();
        assert_eq!(log.data, b"{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n".to_vec());
    }

    #[test]
    fn test_unwritable_path_is_persistence_failure() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where a directory is expected
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("log.jsonl");

        let err = append_json_lines(&path, &[Record { id: 1, value: 1.0 }]).unwrap_err();
        assert!(matches!(err, TrackingError::PersistenceWriteFailure(_)));
        let err = write_json_atomic(&path, &Record { id: 1, value: 1.0 }).unwrap_err();
        assert!(matches!(err, TrackingError::PersistenceWriteFailure(_)));
    }
}
