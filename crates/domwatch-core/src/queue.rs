//! Durable hand-off between the daily check and the alert loop.
//!
//! One record per line, `domain|source|expiry`. The checker replaces the whole file each
//! cycle; the dispatcher drains it and truncates. Both go through [`FileQueue`], whose
//! async mutex keeps a write from landing in the middle of a drain.

use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{
    accounts::Accounts,
    domain::{normalize_domain, DomainRecord},
    errors::Error,
    expiry::{parse_canonical, CANONICAL_FORMAT},
    Result,
};

const FIELD_SEP: char = '|';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub domain: String,
    pub source: String,
    /// Canonical `YYYY-MM-DD`.
    pub expiry: String,
}

impl QueueEntry {
    /// Records without an expiry date have nothing to hand off.
    pub fn from_record(record: &DomainRecord) -> Option<Self> {
        let expiry = record.expiry?;
        Some(Self {
            domain: record.domain.clone(),
            source: record.source.clone(),
            expiry: expiry.format(CANONICAL_FORMAT).to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        format!("{}{FIELD_SEP}{}{FIELD_SEP}{}", self.domain, self.source, self.expiry)
    }

    /// Lines with fewer than three fields are malformed; extra fields are ignored.
    pub fn parse_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(FIELD_SEP).collect();
        if parts.len() < 3 {
            return Err(Error::Malformed(format!("queue line {line:?}")));
        }
        Ok(Self {
            domain: normalize_domain(parts[0]),
            source: parts[1].trim().to_string(),
            expiry: parts[2].trim().to_string(),
        })
    }

    /// Rebuild the record; the provider-hosted flag comes from the account labels.
    pub fn into_record(self, accounts: &Accounts) -> Result<DomainRecord> {
        let expiry = parse_canonical(&self.expiry).ok_or_else(|| {
            Error::Parse(format!("bad expiry {:?} for {}", self.expiry, self.domain))
        })?;
        let is_provider_hosted = accounts.is_label(&self.source);
        Ok(DomainRecord {
            domain: self.domain,
            source: self.source,
            expiry: Some(expiry),
            is_provider_hosted,
        })
    }
}

pub struct FileQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the queue contents (sibling temp file, then rename).
    pub async fn replace(&self, entries: &[QueueEntry]) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut body = String::new();
        for e in entries {
            body.push_str(&e.to_line());
            body.push('\n');
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, body.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("[QUEUE] wrote {} entr(ies) to {}", entries.len(), self.path.display());
        Ok(())
    }

    /// Lock the queue and read it. `None` when the file does not exist yet.
    ///
    /// The lock is held until [`Drain::finish`] (or drop), so the batch is processed
    /// without a concurrent replace.
    pub async fn begin_drain(&self) -> Result<Option<Drain<'_>>> {
        let guard = self.lock.lock().await;

        let contents = match tokio::fs::read(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (idx, raw) in contents.split(|b| *b == b'\n').enumerate() {
            let parsed = std::str::from_utf8(raw)
                .map_err(|_| Error::Malformed(format!("queue line {} is not UTF-8", idx + 1)))
                .and_then(|line| {
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() {
                        Ok(None)
                    } else {
                        QueueEntry::parse_line(line).map(Some)
                    }
                });
            match parsed {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => {
                    warn!("[QUEUE] skipping {e}");
                    skipped += 1;
                }
            }
        }

        Ok(Some(Drain {
            _guard: guard,
            path: &self.path,
            entries,
            skipped,
        }))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// A batch read from the queue, holding the queue lock.
pub struct Drain<'a> {
    _guard: MutexGuard<'a, ()>,
    path: &'a Path,
    entries: Vec<QueueEntry>,
    skipped: usize,
}

impl Drain<'_> {
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Truncate the queue file and release the lock.
    pub async fn finish(self) -> Result<()> {
        tokio::fs::write(self.path, b"").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{account, tmp_path};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn drain_skips_malformed_lines() {
        let path = tmp_path("domwatch-queue-c");
        std::fs::write(
            &path,
            "example.com|FL|2025-03-01\nbad-line\nexample.org|local.txt|2025-04-10",
        )
        .unwrap();

        let q = FileQueue::new(&path);
        let drain = q.begin_drain().await.unwrap().unwrap();
        assert_eq!(drain.skipped(), 1);
        assert_eq!(
            drain.entries().to_vec(),
            vec![
                QueueEntry {
                    domain: "example.com".to_string(),
                    source: "FL".to_string(),
                    expiry: "2025-03-01".to_string(),
                },
                QueueEntry {
                    domain: "example.org".to_string(),
                    source: "local.txt".to_string(),
                    expiry: "2025-04-10".to_string(),
                },
            ]
        );
        drain.finish().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn drain_skips_non_utf8_line_and_keeps_neighbours() {
        let path = tmp_path("domwatch-queue-utf8");
        let mut body = b"good.com|FL|2025-03-01\n".to_vec();
        body.extend_from_slice(b"bad\xff\xfe|FL|2025-03-02\r\n");
        body.extend_from_slice(b"also.org|list.txt|2025-04-10\r\n");
        std::fs::write(&path, body).unwrap();

        let q = FileQueue::new(&path);
        let drain = q.begin_drain().await.unwrap().unwrap();
        assert_eq!(drain.skipped(), 1);
        let domains: Vec<&str> = drain.entries().iter().map(|e| e.domain.as_str()).collect();
        assert_eq!(domains, vec!["good.com", "also.org"]);
        assert_eq!(drain.entries()[1].expiry, "2025-04-10");

        drain.finish().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn absent_file_is_nothing_to_drain() {
        let q = FileQueue::new(tmp_path("domwatch-queue-absent"));
        assert!(q.begin_drain().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_then_drain_preserves_triples() {
        let path = tmp_path("domwatch-queue-rt");
        let q = FileQueue::new(&path);
        let expiry = NaiveDate::from_ymd_opt(2025, 3, 1);
        let records = vec![
            DomainRecord {
                domain: "a.com".to_string(),
                source: "FL".to_string(),
                expiry,
                is_provider_hosted: true,
            },
            DomainRecord {
                domain: "b.net".to_string(),
                source: "list.txt".to_string(),
                expiry,
                is_provider_hosted: false,
            },
        ];
        let entries: Vec<QueueEntry> =
            records.iter().filter_map(QueueEntry::from_record).collect();

        q.replace(&entries).await.unwrap();
        // A second replace overwrites rather than appends.
        q.replace(&entries).await.unwrap();

        let drain = q.begin_drain().await.unwrap().unwrap();
        let accounts = Accounts::new(vec![account("FL")]).unwrap();
        let back: Vec<DomainRecord> = drain
            .entries()
            .iter()
            .cloned()
            .map(|e| e.into_record(&accounts).unwrap())
            .collect();
        assert_eq!(back, records);
        drain.finish().await.unwrap();

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn records_without_expiry_are_not_queued() {
        assert!(QueueEntry::from_record(&DomainRecord::hosted("a.com", "FL")).is_none());
    }

    #[test]
    fn bad_expiry_is_a_parse_error() {
        let e = QueueEntry::parse_line("a.com|FL|soon").unwrap();
        assert!(matches!(
            e.into_record(&Accounts::default()),
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn replace_waits_for_inflight_drain() {
        let path = tmp_path("domwatch-queue-race");
        std::fs::write(&path, "old.com|FL|2025-01-01\n").unwrap();
        let q = Arc::new(FileQueue::new(&path));

        let drain = q.begin_drain().await.unwrap().unwrap();

        let writer = {
            let q = q.clone();
            tokio::spawn(async move {
                let e = QueueEntry::parse_line("new.com|FL|2025-02-02").unwrap();
                q.replace(&[e]).await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished());

        drain.finish().await.unwrap();
        writer.await.unwrap();

        // The new batch survives the truncate of the old one.
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "new.com|FL|2025-02-02\n");

        let _ = std::fs::remove_file(&path);
    }
}
