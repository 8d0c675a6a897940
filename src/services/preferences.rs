use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::UserPreferences;

/// Remembers the last resolved preferences per user id
///
/// Bounded: once full, storing a new user evicts the least recently updated one.
pub struct PreferenceStore {
    inner: RwLock<HashMap<String, UserPreferences>>,
    capacity: usize,
}

impl PreferenceStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<UserPreferences> {
        self.inner.read().await.get(user_id).cloned()
    }

    /// Stores a user's preferences, replacing any previous profile
    pub async fn put(&self, user_id: &str, preferences: UserPreferences) {
        let mut inner = self.inner.write().await;

        if !inner.contains_key(user_id) && inner.len() >= self.capacity {
            let oldest = inner
                .iter()
                .min_by_key(|(_, prefs)| prefs.updated_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(user_id = %oldest, "Evicting preference profile");
                inner.remove(&oldest);
            }
        }

        inner.insert(user_id.to_string(), preferences);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnimeId;
    use chrono::{Duration, Utc};

    async fn stored(store: &PreferenceStore) -> usize {
        store.inner.read().await.len()
    }

    fn prefs_at(minutes_ago: i64) -> UserPreferences {
        UserPreferences {
            updated_at: Utc::now() - Duration::minutes(minutes_ago),
            ..UserPreferences::new()
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = PreferenceStore::new(10);
        let mut prefs = UserPreferences::new();
        prefs.add_liked(AnimeId::new("1"));

        store.put("alice", prefs.clone()).await;

        assert_eq!(store.get("alice").await, Some(prefs));
        assert_eq!(store.get("bob").await, None);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_profile() {
        let store = PreferenceStore::new(1);
        store.put("alice", prefs_at(5)).await;

        let mut updated = UserPreferences::new();
        updated.add_liked(AnimeId::new("2"));
        store.put("alice", updated.clone()).await;

        assert_eq!(stored(&store).await, 1);
        assert_eq!(store.get("alice").await, Some(updated));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = PreferenceStore::new(2);
        store.put("old", prefs_at(30)).await;
        store.put("recent", prefs_at(1)).await;
        store.put("new", prefs_at(0)).await;

        assert_eq!(stored(&store).await, 2);
        assert!(store.get("old").await.is_none());
        assert!(store.get("recent").await.is_some());
        assert!(store.get("new").await.is_some());
    }
}
