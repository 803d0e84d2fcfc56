//! Ephemeral in-memory store for finished conversions.
//!
//! Records live until one of two deadlines passes:
//!
//! - **retention**: measured from creation (10 minutes by default), applied
//!   to every record whether or not it was downloaded;
//! - **grace**: measured from the first served retrieval (60 seconds by
//!   default), so a client can retry a download that was interrupted.
//!
//! Deadlines are enforced lazily by [`ArtifactStore::get`] and eagerly by
//! [`ArtifactStore::sweep`], which runs on every [`ArtifactStore::put`] and
//! optionally from [`start_sweep_task`]. No per-record timers exist.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::ids::ArtifactId;

/// A stored conversion result.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    #[serde(skip)]
    pub content: Bytes,
    pub content_type: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

struct StoredArtifact {
    record: ArtifactRecord,
    /// Set by the first served retrieval.
    remove_at: Option<DateTime<Utc>>,
}

impl StoredArtifact {
    fn is_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        now - self.record.created_at > retention || self.remove_at.is_some_and(|t| t <= now)
    }
}

/// Thread-safe artifact store. Cloning shares the underlying map.
#[derive(Clone)]
pub struct ArtifactStore {
    entries: Arc<DashMap<ArtifactId, StoredArtifact>>,
    retention: chrono::Duration,
    grace: chrono::Duration,
}

impl ArtifactStore {
    /// Create a store with the given retention window and download grace delay.
    pub fn new(retention: Duration, grace: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            retention: to_chrono(retention),
            grace: to_chrono(grace),
        }
    }

    /// Store a record and return its freshly generated identifier.
    ///
    /// Expired records are swept first.
    pub fn put(
        &self,
        content: impl Into<Bytes>,
        content_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> ArtifactId {
        self.sweep();

        let content = content.into();
        let content_type = content_type.into();
        let display_name = display_name.into();

        loop {
            let id = ArtifactId::new();
            match self.entries.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    tracing::debug!(
                        artifact_id = %id,
                        bytes = content.len(),
                        content_type = %content_type,
                        "Stored artifact"
                    );
                    slot.insert(StoredArtifact {
                        record: ArtifactRecord {
                            id,
                            content,
                            content_type,
                            display_name,
                            created_at: Utc::now(),
                        },
                        remove_at: None,
                    });
                    return id;
                }
            }
        }
    }

    /// Retrieve a record for serving to a client.
    ///
    /// The first successful call schedules the record for removal after the
    /// grace delay; calls within the grace window keep succeeding.
    pub fn get(&self, id: &ArtifactId) -> Result<ArtifactRecord> {
        let now = Utc::now();

        if let Some(mut stored) = self.entries.get_mut(id) {
            if !stored.is_expired(now, self.retention) {
                if stored.remove_at.is_none() {
                    stored.remove_at = Some(now + self.grace);
                    tracing::debug!(
                        artifact_id = %id,
                        grace_secs = self.grace.num_seconds(),
                        "Artifact served; removal scheduled"
                    );
                }
                return Ok(stored.record.clone());
            }
        }

        let retention = self.retention;
        if self
            .entries
            .remove_if(id, |_, stored| stored.is_expired(now, retention))
            .is_some()
        {
            tracing::debug!(artifact_id = %id, "Expired artifact removed on access");
        }

        Err(Error::not_found("artifact", id))
    }

    /// Retrieve a record without scheduling its removal.
    pub fn peek(&self, id: &ArtifactId) -> Option<ArtifactRecord> {
        let now = Utc::now();
        self.entries
            .get(id)
            .filter(|stored| !stored.is_expired(now, self.retention))
            .map(|stored| stored.record.clone())
    }

    /// Remove a record immediately. Returns whether it existed.
    pub fn remove(&self, id: &ArtifactId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Remove every record past its retention window or grace deadline.
    ///
    /// Returns the number of records removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let retention = self.retention;

        let mut removed = 0;
        self.entries.retain(|id, stored| {
            if stored.is_expired(now, retention) {
                tracing::debug!(
                    artifact_id = %id,
                    age_secs = (now - stored.record.created_at).num_seconds(),
                    "Artifact expired"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            tracing::info!(removed, remaining = self.entries.len(), "Swept expired artifacts");
        }

        removed
    }

    /// Number of records currently held (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total content bytes held.
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.record.content.len()).sum()
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(600), Duration::from_secs(60))
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}

/// Start a background task that sweeps the store every `interval` until
/// `cancel` fires.
pub fn start_sweep_task(
    store: ArtifactStore,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    store.sweep();
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("Artifact sweep task stopped");
                    break;
                }
            }
        }
    })
}
