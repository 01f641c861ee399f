//! Sync executor: mount the resolved device and mirror its tree into the
//! destination container under a timestamped prefix.
//!
//! Append-only by construction: every run writes under its own
//! `manual-backup-<timestamp>` prefix and nothing is ever pruned. A failed
//! copy leaves its partial objects in place for operator inspection; the
//! missing completion marker is what distinguishes them from good runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::traits::{Clock, Mounter, ObjectStore};
use crate::domain::types::{WorkerError, BACKUP_PREFIX, COMPLETION_MARKER};

/// Second-resolution, zero-padded: `YYYY-MM-DD-HH-MM-SS`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d-%H-%M-%S").to_string()
}

pub struct SyncExecutor<'a, M, S, C>
where
    M: Mounter + ?Sized,
    S: ObjectStore + ?Sized,
    C: Clock + ?Sized,
{
    mounter: &'a M,
    store: &'a S,
    clock: &'a C,
}

impl<'a, M, S, C> SyncExecutor<'a, M, S, C>
where
    M: Mounter + ?Sized,
    S: ObjectStore + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(mounter: &'a M, store: &'a S, clock: &'a C) -> Self {
        Self {
            mounter,
            store,
            clock,
        }
    }

    /// Mount, upload the full tree, write the completion marker, unmount.
    /// Returns the prefix the backup landed under.
    pub async fn run(&self, device: &Path, mount_point: &Path) -> Result<String, WorkerError> {
        tokio::fs::create_dir_all(mount_point)
            .await
            .map_err(|e| self.error(format!("create mount point: {e}")))?;

        self.mounter
            .mount(device, mount_point)
            .await
            .map_err(|e| self.error(format!("mount {}: {e:#}", device.display())))?;

        let timestamp = format_timestamp(self.clock.now_utc());
        let prefix = format!("{BACKUP_PREFIX}{timestamp}");
        info!(
            device = %device.display(),
            prefix = prefix,
            "Starting backup sync"
        );

        let upload = self.upload(mount_point, &prefix, &timestamp).await;

        // Unmount regardless of the upload's outcome so teardown can detach.
        if let Err(e) = self.mounter.unmount(mount_point).await {
            warn!("Unmount failed: {e:#}");
        }

        upload.map(|object_count| {
            info!(
                prefix = prefix,
                object_count = object_count,
                "Backup sync complete"
            );
            prefix
        })
    }

    async fn upload(
        &self,
        mount_point: &Path,
        prefix: &str,
        timestamp: &str,
    ) -> Result<u64, WorkerError> {
        let object_count = self
            .store
            .upload_tree(mount_point, prefix)
            .await
            .map_err(|e| self.error(format!("upload tree: {e:#}")))?;

        let marker_key = format!("{prefix}/{COMPLETION_MARKER}");
        let marker_body = format!("timestamp={timestamp}\nobjects={object_count}\n");
        self.store
            .put_object(&marker_key, marker_body.into_bytes())
            .await
            .map_err(|e| self.error(format!("write completion marker: {e:#}")))?;

        Ok(object_count)
    }

    fn error(&self, message: String) -> WorkerError {
        WorkerError::Sync { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::{MockClock, MockMounter, MockObjectStore};
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn executor_parts() -> (MockMounter, MockObjectStore, MockClock) {
        let clock = MockClock::at(Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 3).unwrap());
        (MockMounter::new(), MockObjectStore::new(), clock)
    }

    #[test]
    fn timestamp_is_second_resolution_and_zero_padded() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 3).unwrap();
        assert_eq!(format_timestamp(at), "2024-03-07-09-05-03");
    }

    #[tokio::test]
    async fn sync_uploads_under_timestamped_prefix_and_writes_marker() {
        let (mounter, store, clock) = executor_parts();
        let executor = SyncExecutor::new(&mounter, &store, &clock);
        let mount_point = tempfile::tempdir().unwrap();

        let prefix = executor
            .run(&PathBuf::from("/dev/nvme1n1"), mount_point.path())
            .await
            .unwrap();
        assert_eq!(prefix, "manual-backup-2024-03-07-09-05-03");

        let uploads = store.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, "manual-backup-2024-03-07-09-05-03");
        assert_eq!(
            store.objects(),
            vec!["manual-backup-2024-03-07-09-05-03/BACKUP-COMPLETE"]
        );

        let ops = mounter.operations();
        assert!(ops[0].starts_with("mount(/dev/nvme1n1"));
        assert!(ops[1].starts_with("unmount("));
    }

    #[tokio::test]
    async fn failed_upload_still_unmounts_and_writes_no_marker() {
        let (mounter, store, clock) = executor_parts();
        store.set_fail_upload(true);
        let executor = SyncExecutor::new(&mounter, &store, &clock);
        let mount_point = tempfile::tempdir().unwrap();

        let err = executor
            .run(&PathBuf::from("/dev/nvme1n1"), mount_point.path())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Sync { .. }));
        assert!(store.objects().is_empty());
        assert!(mounter
            .operations()
            .iter()
            .any(|op| op.starts_with("unmount(")));
    }

    #[tokio::test]
    async fn mount_failure_fails_the_stage() {
        let (mounter, store, clock) = executor_parts();
        mounter.set_fail_mount(true);
        let executor = SyncExecutor::new(&mounter, &store, &clock);
        let mount_point = tempfile::tempdir().unwrap();

        let err = executor
            .run(&PathBuf::from("/dev/nvme1n1"), mount_point.path())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Sync { .. }));
        assert!(store.uploads().is_empty());
    }
}
