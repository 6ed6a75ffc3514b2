// Profile arena — a bounded, shard-local store of user profiles.
//
// Long-running deployments cannot grow the profile map without bound, so
// each shard caps its arena and evicts the least recently seen user when
// the cap is exceeded. A cap of zero disables behavioral tracking; the
// pipeline then reports behavioral state as unavailable.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use super::profile::UserProfile;

pub struct ProfileArena {
    profiles: HashMap<String, UserProfile>,
    cap: usize,
}

impl ProfileArena {
    pub fn new(cap: usize) -> Self {
        Self {
            profiles: HashMap::new(),
            cap,
        }
    }

    /// Whether behavioral tracking is enabled at all.
    pub fn enabled(&self) -> bool {
        self.cap > 0
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Fetch the user's profile, creating it lazily. Evicts the least
    /// recently seen profile first when the arena is full.
    pub fn entry(&mut self, user_id: &str, now: DateTime<Utc>) -> &mut UserProfile {
        if !self.profiles.contains_key(user_id) && self.profiles.len() >= self.cap {
            self.evict_oldest();
        }
        self.profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(now))
    }

    pub fn get(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    /// Linear scan over the arena; eviction only happens once the cap is
    /// reached, and per-shard caps keep the scan bounded.
    fn evict_oldest(&mut self) {
        let oldest = self
            .profiles
            .iter()
            .min_by_key(|(_, p)| p.last_seen)
            .map(|(user, _)| user.clone());
        if let Some(user) = oldest {
            debug!(user, "Evicting least recently seen profile");
            self.profiles.remove(&user);
        }
    }
}
