use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Struct to store a value inside the map. It allows you to set an expiry
/// time (optional); `None` means the entry never expires.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: String,
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// The in-memory key-value store. Expiry is lazy: an entry past its
/// deadline is removed by whichever accessor notices it first, there is no
/// background sweeper. One instance is created at startup and shared across
/// connections behind a mutex; nothing here is global.
#[derive(Debug, Default)]
pub struct Store {
    entries: HashMap<String, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a key. `ttl` of `None` means never-expiring.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.entries.insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at,
            },
        );
    }

    /// Fetch a live entry. An expired entry is deleted here as a side
    /// effect and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key)
    }

    /// Remove a key, reporting whether a live entry was actually there.
    pub fn delete(&mut self, key: &str) -> bool {
        // An expired leftover does not count as a deletion.
        if self.get(key).is_none() {
            return false;
        }
        self.entries.remove(key).is_some()
    }

    /// Overwrite the expiry deadline of an existing entry, leaving its
    /// value alone. Returns false if the key is absent (or already
    /// expired), which is EXPIRE's "nothing happened" reply.
    pub fn touch_expiry(&mut self, key: &str, ttl: Duration) -> bool {
        if self.get(key).is_none() {
            return false;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
            return true;
        }
        false
    }

    /// Seconds left before `key` expires: -2 if absent, -1 if it never
    /// expires, otherwise whole seconds remaining (truncated).
    pub fn ttl(&mut self, key: &str) -> i64 {
        let now = Instant::now();
        match self.get(key) {
            None => -2,
            Some(entry) => match entry.expires_at {
                None => -1,
                Some(at) => at.saturating_duration_since(now).as_secs() as i64,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
