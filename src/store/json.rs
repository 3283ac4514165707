// src/store/json.rs
// =============================================================================
// A file-backed observation store.
//
// Layout inside the data directory:
//   single-checks.json  - JSON array of observations (cap 10,000)
//   bulk-checks.json    - JSON array of batch records (cap 1,000)
//   .link-watch.lock    - advisory lock shared by every link-watch process
//
// The files are the only source of truth. Each CLI command is its own
// process and `link-watch sweep` stays up for days, so nothing is cached:
// every operation re-reads the files it needs.
//
// How writes stay safe:
// - Every mutation takes an exclusive lock on the lock file for its whole
//   read-modify-write, so two processes (or two store handles in one
//   process) cannot overwrite each other. Queries take a shared lock.
// - Inside one process an async mutex queues operations before they reach
//   the file lock.
// - A mutation writes `<file>.tmp` and renames it over the real file, so a
//   failed write leaves the previous state on disk.
// =============================================================================

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::{Mutex, MutexGuard};

use super::records::{append_capped, PruneReport, Records};
use super::ObservationStore;
use crate::config::{
    BULK_CHECKS_FILE, LOCK_FILE, MAX_BATCH_RECORDS, MAX_OBSERVATIONS, SINGLE_CHECKS_FILE,
};
use crate::error::StorageError;
use crate::model::{BatchRecord, Observation, Statistics};

pub struct JsonStore {
    single_checks_file: PathBuf,
    bulk_checks_file: PathBuf,
    lock_file: PathBuf,
    local: Mutex<()>,
}

// Held for the duration of one store operation
struct StoreGuard<'a> {
    _local: MutexGuard<'a, ()>,
    // Closing the file releases the advisory lock
    _file: File,
}

impl JsonStore {
    // Opens (or creates) a store in `data_dir`
    //
    // Missing files are created as empty arrays. A file that exists but
    // cannot be parsed is an error: treating it as empty would silently
    // drop history on the next write.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .await
            .map_err(|e| StorageError::io(data_dir, e))?;

        let store = JsonStore {
            single_checks_file: data_dir.join(SINGLE_CHECKS_FILE),
            bulk_checks_file: data_dir.join(BULK_CHECKS_FILE),
            lock_file: data_dir.join(LOCK_FILE),
            local: Mutex::new(()),
        };

        let (observations, batches) = {
            let _guard = store.lock(true).await?;
            let observations: Vec<Observation> =
                load_or_create(&store.single_checks_file).await?;
            let batches: Vec<BatchRecord> = load_or_create(&store.bulk_checks_file).await?;
            (observations.len(), batches.len())
        };

        info!(
            "Opened store at {} ({} observations, {} batch records)",
            data_dir.display(),
            observations,
            batches
        );
        Ok(store)
    }

    async fn lock(&self, exclusive: bool) -> Result<StoreGuard<'_>, StorageError> {
        let local = self.local.lock().await;

        let path = self.lock_file.clone();
        let file = tokio::task::spawn_blocking(move || lock_file(&path, exclusive))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)))
            .map_err(|e| StorageError::io(&self.lock_file, e))?;

        Ok(StoreGuard {
            _local: local,
            _file: file,
        })
    }

    async fn load_records(&self) -> Result<Records, StorageError> {
        Ok(Records::new(
            load(&self.single_checks_file).await?,
            load(&self.bulk_checks_file).await?,
        ))
    }
}

impl ObservationStore for JsonStore {
    async fn append_observation(&self, observation: Observation) -> Result<(), StorageError> {
        let _guard = self.lock(true).await?;

        let mut observations: Vec<Observation> = load(&self.single_checks_file).await?;
        append_capped(&mut observations, observation, MAX_OBSERVATIONS);
        write_json(&self.single_checks_file, &observations).await
    }

    async fn append_batch(&self, record: BatchRecord) -> Result<(), StorageError> {
        let _guard = self.lock(true).await?;

        let mut batches: Vec<BatchRecord> = load(&self.bulk_checks_file).await?;
        append_capped(&mut batches, record, MAX_BATCH_RECORDS);
        write_json(&self.bulk_checks_file, &batches).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Observation>, StorageError> {
        let _guard = self.lock(false).await?;
        let observations = load(&self.single_checks_file).await?;
        Ok(Records::new(observations, Vec::new()).recent(limit))
    }

    async fn by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>, StorageError> {
        let _guard = self.lock(false).await?;
        let observations = load(&self.single_checks_file).await?;
        Ok(Records::new(observations, Vec::new()).by_date_range(start, end))
    }

    async fn statistics(&self) -> Result<Statistics, StorageError> {
        let _guard = self.lock(false).await?;
        Ok(self.load_records().await?.statistics_at(Utc::now()))
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> Result<PruneReport, StorageError> {
        let _guard = self.lock(true).await?;

        let mut records = self.load_records().await?;
        let report = records.prune(older_than);

        // Untouched files are left alone
        if report.observations_removed > 0 {
            write_json(&self.single_checks_file, &records.observations).await?;
        }
        if report.batches_removed > 0 {
            write_json(&self.bulk_checks_file, &records.batches).await?;
        }

        Ok(report)
    }
}

// Blocks until the advisory lock is granted
fn lock_file(path: &Path, exclusive: bool) -> std::io::Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    if exclusive {
        file.lock()?;
    } else {
        file.lock_shared()?;
    }
    Ok(file)
}

// Reads a store file. A missing file holds no records.
async fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    Ok(read_json(path).await?.unwrap_or_default())
}

async fn load_or_create<T>(path: &Path) -> Result<Vec<T>, StorageError>
where
    T: DeserializeOwned + Serialize,
{
    match read_json(path).await? {
        Some(items) => Ok(items),
        None => {
            debug!("Creating {}", path.display());
            write_json::<T>(path, &[]).await?;
            Ok(Vec::new())
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Some(Vec::new())),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                path: path.to_path_buf(),
                source,
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

// Writes the whole collection through a temp file + rename
async fn write_json<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(items)?;
    let tmp = path.with_extension("json.tmp");

    let result = async {
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }
    .await;

    if let Err(e) = &result {
        error!("Failed to persist {}: {}", path.display(), e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckOutcome;
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn working(url: &str) -> Observation {
        Observation::record(CheckOutcome::working(url, 200, 10), None)
    }

    #[tokio::test]
    async fn test_open_creates_empty_files() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("nested")).await.unwrap();

        assert!(dir.path().join("nested/single-checks.json").exists());
        assert!(dir.path().join("nested/bulk-checks.json").exists());
        assert!(store.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_appends_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonStore::open(dir.path()).await.unwrap();
            store.append_observation(working("https://a.test")).await.unwrap();
            let outcomes = vec![CheckOutcome::invalid("nope")];
            store
                .append_batch(BatchRecord::new(vec!["nope".into()], &outcomes, None))
                .await
                .unwrap();
        }

        let store = JsonStore::open(dir.path()).await.unwrap();
        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].outcome.url, "https://a.test");

        // The batch adds to total checks but not to the URL tallies
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_checks, 2);
        assert_eq!(stats.total_urls, 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SINGLE_CHECKS_FILE), "{not json").unwrap();

        let result = JsonStore::open(dir.path()).await;
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).await.unwrap());

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_observation(working(&format!("https://x.test/{i}")))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reopened = JsonStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.recent(100).await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_prune_rewrites_files() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();

        let old = Observation::at(
            CheckOutcome::working("https://old.test", 200, 5),
            Utc::now() - Duration::days(40),
            None,
        );
        store.append_observation(old).await.unwrap();
        store.append_observation(working("https://new.test")).await.unwrap();

        let report = store.prune(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(report.observations_removed, 1);
        assert_eq!(report.observations_kept, 1);

        let reopened = JsonStore::open(dir.path()).await.unwrap();
        let left = reopened.recent(10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].outcome.url, "https://new.test");
    }

    #[tokio::test]
    async fn test_reads_files_in_the_legacy_shape() {
        let dir = TempDir::new().unwrap();
        let legacy = r#"[
          {
            "id": "5b1c",
            "url": "https://example.com",
            "isBroken": false,
            "statusCode": 200,
            "responseTime": 40,
            "timestamp": "2024-05-01T10:00:00.000Z",
            "metadata": { "userAgent": "curl/8.0", "ip": "127.0.0.1" }
          }
        ]"#;
        std::fs::write(dir.path().join(SINGLE_CHECKS_FILE), legacy).unwrap();

        let store = JsonStore::open(dir.path()).await.unwrap();
        let found = store.recent(1).await.unwrap();
        assert_eq!(found[0].id, "5b1c");
        assert_eq!(found[0].outcome.response_time_ms, Some(40));
        assert_eq!(
            found[0].metadata.as_ref().and_then(|m| m.ip.as_deref()),
            Some("127.0.0.1")
        );
    }

    #[tokio::test]
    async fn test_long_lived_handle_does_not_clobber_other_writers() {
        let dir = TempDir::new().unwrap();
        let old = Observation::at(
            CheckOutcome::working("https://old.test", 200, 5),
            Utc::now() - Duration::days(40),
            None,
        );
        JsonStore::open(dir.path())
            .await
            .unwrap()
            .append_observation(old)
            .await
            .unwrap();

        // One handle stays open like `link-watch sweep`; the other plays a
        // separate `link-watch check` run
        let sweeper = JsonStore::open(dir.path()).await.unwrap();
        let checker = JsonStore::open(dir.path()).await.unwrap();
        checker
            .append_observation(working("https://fresh.test"))
            .await
            .unwrap();

        // The long-lived handle sees the new write without reopening
        assert_eq!(sweeper.recent(10).await.unwrap().len(), 2);

        let report = sweeper.prune(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(report.observations_removed, 1);
        assert_eq!(report.observations_kept, 1);

        let left = JsonStore::open(dir.path())
            .await
            .unwrap()
            .recent(10)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].outcome.url, "https://fresh.test");
    }

    #[tokio::test]
    async fn test_concurrent_appends_from_two_handles_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let first = Arc::new(JsonStore::open(dir.path()).await.unwrap());
        let second = Arc::new(JsonStore::open(dir.path()).await.unwrap());

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = if i % 2 == 0 { first.clone() } else { second.clone() };
                tokio::spawn(async move {
                    store
                        .append_observation(working(&format!("https://x.test/{i}")))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(first.recent(100).await.unwrap().len(), 20);
        assert_eq!(second.statistics().await.unwrap().total_urls, 20);
    }

    #[tokio::test]
    async fn test_batch_cap_evicts_the_oldest_record() {
        let dir = TempDir::new().unwrap();
        let base = Utc::now() - Duration::days(1);
        let full: Vec<BatchRecord> = (0..MAX_BATCH_RECORDS)
            .map(|i| {
                let mut record = BatchRecord::new(vec![format!("https://x.test/{i}")], &[], None);
                record.timestamp = base + Duration::seconds(i as i64);
                record
            })
            .collect();
        std::fs::write(
            dir.path().join(BULK_CHECKS_FILE),
            serde_json::to_vec(&full).unwrap(),
        )
        .unwrap();
        let oldest_id = full[0].id.clone();

        let store = JsonStore::open(dir.path()).await.unwrap();
        let outcomes = vec![CheckOutcome::invalid("nope")];
        store
            .append_batch(BatchRecord::new(vec!["nope".into()], &outcomes, None))
            .await
            .unwrap();

        let on_disk: Vec<BatchRecord> =
            serde_json::from_slice(&std::fs::read(dir.path().join(BULK_CHECKS_FILE)).unwrap())
                .unwrap();
        assert_eq!(on_disk.len(), MAX_BATCH_RECORDS);
        assert!(on_disk.iter().all(|b| b.id != oldest_id));
        assert_eq!(on_disk.last().map(|b| b.urls.clone()), Some(vec!["nope".to_string()]));
    }

    #[tokio::test]
    async fn test_prune_removes_old_batch_records() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();

        let mut old = BatchRecord::new(vec!["https://old.test".into()], &[], None);
        old.timestamp = Utc::now() - Duration::days(45);
        store.append_batch(old).await.unwrap();
        store
            .append_batch(BatchRecord::new(vec!["https://new.test".into()], &[], None))
            .await
            .unwrap();

        let report = store.prune(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(report.batches_removed, 1);
        assert_eq!(report.batches_kept, 1);
        assert_eq!(report.observations_removed, 0);

        // Only the batch record is left, so it is the only check counted
        assert_eq!(store.statistics().await.unwrap().total_checks, 1);
    }
}
