// SPDX-License-Identifier: MIT
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use loom_message::Message;

use crate::storage::StorageService;

/// A materialized attachment: a readable local path plus a time-limited
/// signed URL the model/tool can be given instead of the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub cache_path: PathBuf,
    pub signed_url: String,
}

/// Caches remote file attachments to a local directory, shared by every task
/// running against a workspace. Materialization is at-most-once per
/// `file_id`: concurrent callers for the same id converge on one download
/// and one local file.
pub struct AttachmentCache {
    cache_dir: PathBuf,
    storage: Option<Arc<dyn StorageService>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AttachmentCache {
    pub fn new(cache_dir: PathBuf, storage: Option<Arc<dyn StorageService>>) -> Self {
        Self { cache_dir, storage, locks: Mutex::new(HashMap::new()) }
    }

    /// Pure: the path a cached attachment would live at, whether or not it
    /// has been materialized yet.
    pub fn get_file_attachment_cache_path(&self, file_id: &str) -> PathBuf {
        self.cache_dir.join(file_id)
    }

    async fn lock_for(&self, file_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(file_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Materialize `file_id` to the local cache, returning its path and a
    /// signed URL. Returns `None` (logged, non-fatal) when no storage
    /// service is configured or the download/sign step fails.
    pub async fn cache_file_attachment(&self, file_id: &str) -> Option<CacheEntry> {
        let Some(storage) = &self.storage else {
            warn!(file_id, "no storage service configured; skipping attachment cache");
            return None;
        };

        let cache_path = self.get_file_attachment_cache_path(file_id);
        let per_id_lock = self.lock_for(file_id).await;
        let _guard = per_id_lock.lock().await;

        if cache_path.exists() {
            debug!(file_id, path = %cache_path.display(), "attachment cache hit");
        } else {
            let tmp_path = self.cache_dir.join(format!("{file_id}.tmp"));
            if let Some(parent) = cache_path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!(file_id, error = %e, "failed to create attachment cache directory");
                    return None;
                }
            }
            if let Err(e) = storage.download_file(file_id, &tmp_path).await {
                warn!(file_id, error = %e, "attachment download failed");
                return None;
            }
            if let Err(e) = tokio::fs::rename(&tmp_path, &cache_path).await {
                warn!(file_id, error = %e, "failed to finalize attachment cache write");
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return None;
            }
            debug!(file_id, path = %cache_path.display(), "attachment downloaded");
        }

        match storage.get_signed_url(file_id, None).await {
            Ok(signed_url) => Some(CacheEntry { cache_path, signed_url }),
            Err(e) => {
                warn!(file_id, error = %e, "failed to obtain signed url for attachment");
                None
            }
        }
    }

    /// Walk every message's content blocks, collect distinct `file_id`s, and
    /// materialize all of them. Entries that fail to materialize are simply
    /// omitted from the returned map.
    pub async fn cache_message_file_attachments(&self, messages: &[Message]) -> HashMap<String, CacheEntry> {
        let mut seen = HashSet::new();
        let mut ordered_ids = Vec::new();
        for message in messages {
            for file_id in message.file_attachment_ids() {
                if seen.insert(file_id.to_string()) {
                    ordered_ids.push(file_id.to_string());
                }
            }
        }

        let mut out = HashMap::new();
        for file_id in ordered_ids {
            if let Some(entry) = self.cache_file_attachment(&file_id).await {
                out.insert(file_id, entry);
            }
        }
        out
    }
}
