//! In-memory store of in-progress form drafts.

use dashmap::DashMap;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::Location;
use crate::wizard::FeedbackDraft;

pub type SharedDraft = Arc<Mutex<FeedbackDraft>>;

/// Drafts keyed by their id. A draft's mutex is held for the whole of a
/// submission, so a locked draft is one that is currently submitting.
/// Submitted drafts stay until they expire so a repeated post still finds them.
pub struct DraftStore {
    drafts: DashMap<Uuid, SharedDraft>,
    ttl: Duration,
}

impl DraftStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            drafts: DashMap::new(),
            ttl,
        }
    }

    /// Start a fresh step-1 draft for `location`
    pub fn create(&self, location: Location) -> SharedDraft {
        let draft = FeedbackDraft::new(location);
        let id = draft.id;
        let shared = Arc::new(Mutex::new(draft));
        self.drafts.insert(id, shared.clone());
        shared
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedDraft> {
        self.drafts.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Drop drafts idle for longer than the TTL, returning how many were removed.
    /// Drafts that are locked are in use and always kept.
    pub fn sweep_expired(&self) -> usize {
        let before = self.drafts.len();
        self.drafts.retain(|_, draft| match draft.try_lock() {
            Ok(guard) => guard.last_touched.elapsed() < self.ttl,
            Err(_) => true,
        });
        before.saturating_sub(self.drafts.len())
    }
}

/// Spawn a background task that sweeps expired drafts every `period`
pub fn spawn_draft_sweeper(store: Arc<DraftStore>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = store.sweep_expired();
            if removed > 0 {
                debug!("Swept {} expired form drafts ({} remaining)", removed, store.len());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn location() -> Location {
        Location {
            id: "toilet_2".to_string(),
            name: "Toilet 2".to_string(),
            location: "Building A - First Floor".to_string(),
            building: None,
            floor: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = DraftStore::new(Duration::from_secs(60));
        assert!(store.is_empty());
        let draft = store.create(location());
        let id = draft.lock().await.id;

        assert!(store.get(&id).is_some());
        assert!(store.get(&Uuid::new_v4()).is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_submitted_draft_is_kept_until_expiry() {
        let store = DraftStore::new(Duration::from_millis(20));
        let draft = store.create(location());
        let id = {
            let mut guard = draft.lock().await;
            guard.submitted_id = Some("feedback-1".to_string());
            guard.id
        };

        assert_eq!(store.sweep_expired(), 0);
        assert!(store.get(&id).is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.sweep_expired(), 1);
        assert!(store.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_and_locked_drafts() {
        let store = DraftStore::new(Duration::from_millis(20));
        let idle = store.create(location());
        let busy = store.create(location());
        let busy_id = busy.lock().await.id;

        let guard = busy.lock().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let fresh = store.create(location());
        let fresh_id = fresh.lock().await.id;

        assert_eq!(store.sweep_expired(), 1);
        assert!(store.get(&busy_id).is_some());
        assert!(store.get(&fresh_id).is_some());
        drop(guard);
        drop(idle);
    }
}
