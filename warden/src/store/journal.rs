//! Write-ahead journal for the in-memory store
//!
//! Every committed batch is appended as one JSON line before it is applied
//! in memory. On startup the journal is replayed to rebuild the collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::{StoreError, WriteOp};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub seq: u64,
    pub committed_at: DateTime<Utc>,
    pub ops: Vec<WriteOp>,
}

#[derive(Debug)]
struct JournalFile {
    file: File,
    /// Length of the file up to the end of the last complete entry
    len: u64,
}

#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: Mutex<JournalFile>,
}

/// What a journal file holds, and where the committed part ends
#[derive(Debug)]
struct Contents {
    entries: Vec<JournalEntry>,
    valid_len: u64,
    /// The last complete entry lost its newline
    needs_newline: bool,
}

fn journal_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Journal(e.to_string())
}

impl Journal {
    /// Open the journal at `path`, returning the entries already in it.
    ///
    /// A torn trailing entry is cut off so later appends start on a clean
    /// line.
    pub async fn open(path: &Path) -> Result<(Self, Vec<JournalEntry>), StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(journal_error)?;
            }
        }

        let (contents, file_len) = if path.exists() {
            let content = tokio::fs::read(path).await.map_err(journal_error)?;
            (parse_entries(&content)?, content.len() as u64)
        } else {
            (
                Contents {
                    entries: Vec::new(),
                    valid_len: 0,
                    needs_newline: false,
                },
                0,
            )
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(journal_error)?;

        let mut len = contents.valid_len;
        if len < file_len {
            warn!(
                "Truncating {} torn byte(s) at the end of {}",
                file_len - len,
                path.display()
            );
            file.set_len(len).await.map_err(journal_error)?;
        }
        if contents.needs_newline {
            file.write_all(b"\n").await.map_err(journal_error)?;
            len += 1;
        }
        file.sync_data().await.map_err(journal_error)?;

        info!(
            "Opened store journal {} with {} committed batches",
            path.display(),
            contents.entries.len()
        );

        Ok((
            Self {
                path: path.to_path_buf(),
                file: Mutex::new(JournalFile { file, len }),
            },
            contents.entries,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one batch and wait until it is on disk. A failed append is
    /// cut off again so it cannot end up in front of the next entry.
    pub async fn append(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(entry).map_err(journal_error)?;
        line.push('\n');

        let mut journal = self.file.lock().await;
        let written = async {
            journal.file.write_all(line.as_bytes()).await?;
            journal.file.sync_data().await
        }
        .await;

        match written {
            Ok(()) => {
                journal.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                let len = journal.len;
                if let Err(truncate) = journal.file.set_len(len).await {
                    error!(
                        "Could not cut off failed journal append in {}: {}",
                        self.path.display(),
                        truncate
                    );
                }
                Err(journal_error(e))
            }
        }
    }
}

fn parse_entries(content: &[u8]) -> Result<Contents, StoreError> {
    let lines: Vec<&[u8]> = content.split_inclusive(|b| *b == b'\n').collect();
    let mut contents = Contents {
        entries: Vec::with_capacity(lines.len()),
        valid_len: 0,
        needs_newline: false,
    };

    for (index, line) in lines.iter().enumerate() {
        let last = index + 1 == lines.len();
        if line.trim_ascii().is_empty() {
            if line.ends_with(b"\n") {
                contents.valid_len += line.len() as u64;
            }
            continue;
        }
        match serde_json::from_slice::<JournalEntry>(line.trim_ascii_end()) {
            Ok(entry) => {
                contents.entries.push(entry);
                contents.valid_len += line.len() as u64;
                contents.needs_newline = !line.ends_with(b"\n");
            }
            // A torn final line means the process died mid-append; that batch
            // was never acknowledged.
            Err(e) if last => {
                warn!("Ignoring torn trailing journal entry: {}", e);
            }
            Err(e) => {
                return Err(StoreError::Journal(format!(
                    "Corrupt journal entry at line {}: {}",
                    index + 1,
                    e
                )))
            }
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::principal::PrincipalId;

    fn entry(seq: u64) -> JournalEntry {
        JournalEntry {
            seq,
            committed_at: Utc::now(),
            ops: vec![WriteOp::DeletePermissions(PrincipalId::new())],
        }
    }

    #[tokio::test]
    async fn test_append_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store/journal.jsonl");

        {
            let (journal, existing) = Journal::open(&path).await.unwrap();
            assert!(existing.is_empty());
            journal.append(&entry(1)).await.unwrap();
            journal.append(&entry(2)).await.unwrap();
        }

        let (_, entries) = Journal::open(&path).await.unwrap();
        assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_torn_trailing_line_is_ignored() {
        let good = serde_json::to_string(&entry(1)).unwrap();
        let content = format!("{}\n{{\"seq\":2,\"comm", good);
        let contents = parse_entries(content.as_bytes()).unwrap();
        assert_eq!(contents.entries.len(), 1);
        assert_eq!(contents.valid_len, good.len() as u64 + 1);
        assert!(!contents.needs_newline);
    }

    #[tokio::test]
    async fn test_torn_tail_is_cut_before_the_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        {
            let (journal, _) = Journal::open(&path).await.unwrap();
            journal.append(&entry(1)).await.unwrap();
        }
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"seq\":2,\"comm");
        std::fs::write(&path, content).unwrap();

        {
            let (journal, existing) = Journal::open(&path).await.unwrap();
            assert_eq!(existing.len(), 1);
            journal.append(&entry(2)).await.unwrap();
            journal.append(&entry(3)).await.unwrap();
        }

        let (_, entries) = Journal::open(&path).await.unwrap();
        assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_final_newline_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        std::fs::write(&path, serde_json::to_string(&entry(1)).unwrap()).unwrap();

        {
            let (journal, existing) = Journal::open(&path).await.unwrap();
            assert_eq!(existing.len(), 1);
            journal.append(&entry(2)).await.unwrap();
        }

        let (_, entries) = Journal::open(&path).await.unwrap();
        assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_corruption_in_the_middle_is_an_error() {
        let good = serde_json::to_string(&entry(2)).unwrap();
        let content = format!("not json\n{}\n", good);
        assert!(matches!(
            parse_entries(content.as_bytes()),
            Err(StoreError::Journal(_))
        ));
    }
}
