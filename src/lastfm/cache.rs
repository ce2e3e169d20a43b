// In-memory response cache with per-entry expiration
// Keys are canonical serializations of the request parameters, so two
// logically identical requests collide regardless of construction order.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

/// A mapped response plus the instant it stops being visible.
struct CachedResource {
    data: Box<dyn Any + Send>,
    expiration_date: DateTime<Utc>,
}

#[derive(Default)]
pub struct ResponseCache {
    entries: HashMap<String, CachedResource>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical cache key for a parameter set: the pairs serialized with
    /// stable key ordering, independent of insertion order.
    pub fn canonical_key(args: &[(String, String)]) -> String {
        let sorted: BTreeMap<&str, &str> = args
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        serde_json::to_string(&sorted).unwrap_or_default()
    }

    /// Look up a live entry. An expired entry is removed on the spot and
    /// reported as a miss; stale data is never returned.
    pub fn get<T: Clone + 'static>(&mut self, key: &str) -> Option<T> {
        let live = match self.entries.get(key) {
            Some(resource) => resource.expiration_date > Utc::now(),
            None => return None,
        };

        if !live {
            self.entries.remove(key);
            return None;
        }

        self.entries
            .get(key)
            .and_then(|resource| resource.data.downcast_ref::<T>().cloned())
    }

    pub fn put<T: Clone + Send + 'static>(&mut self, key: String, value: T, ttl: Duration) {
        self.insert_at(key, value, Utc::now() + ttl);
    }

    fn insert_at<T: Clone + Send + 'static>(
        &mut self,
        key: String,
        value: T,
        expiration_date: DateTime<Utc>,
    ) {
        self.entries.insert(
            key,
            CachedResource {
                data: Box::new(value),
                expiration_date,
            },
        );
    }

    #[cfg(test)]
    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
