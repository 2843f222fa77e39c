//! Background sweep of abandoned staging files.
//!
//! A write that dies between staging and rename leaves a `.part` file behind.
//! Stored packs are never touched.

use crate::config::CleanupConfig;
use pack_content::FsStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    store: Arc<FsStore>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let max_age = Duration::from_secs(config.staging_max_age_secs);
        tracing::info!(
            "Cleanup task started (interval: {}s, staging max age: {}s)",
            config.interval_secs,
            config.staging_max_age_secs
        );

        let mut timer = interval(Duration::from_secs(config.interval_secs.max(1)));

        loop {
            timer.tick().await;

            match store.sweep_staging(max_age).await {
                Ok(0) => tracing::debug!("Cleanup: no stale staging files"),
                Ok(removed) => tracing::info!("Cleanup: removed {} stale staging files", removed),
                Err(e) => tracing::error!("Cleanup error: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pack_content::BlobStore;
    use pack_types::ContentHash;

    fn test_cleanup_config(interval_secs: u64, staging_max_age_secs: u64) -> CleanupConfig {
        CleanupConfig {
            enabled: true,
            interval_secs,
            staging_max_age_secs,
        }
    }

    #[tokio::test]
    async fn cleanup_task_sweeps_stale_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::open(dir.path()).await.unwrap());

        let stale = dir.path().join(".staging").join("dead-writer.part");
        tokio::fs::write(&stale, b"half a pack").await.unwrap();

        let handle = spawn_cleanup_task(store, test_cleanup_config(3600, 0));

        // First tick fires immediately.
        let mut swept = false;
        for _ in 0..50 {
            if !stale.exists() {
                swept = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(swept, "stale staging file should be removed");
    }

    #[tokio::test]
    async fn cleanup_task_keeps_stored_packs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::open(dir.path()).await.unwrap());
        let hash = ContentHash::of(b"keep me");
        store.put_if_absent(&hash, b"keep me").await.unwrap();

        let handle = spawn_cleanup_task(store.clone(), test_cleanup_config(3600, 0));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(store.contains(&hash).await);
        assert!(store.artifact_path(&hash).exists());
    }

    #[tokio::test]
    async fn cleanup_task_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::open(dir.path()).await.unwrap());
        let config = CleanupConfig {
            enabled: false,
            ..test_cleanup_config(1, 0)
        };

        let handle = spawn_cleanup_task(store, config);

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }
}
