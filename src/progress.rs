use std::collections::HashMap;

use crate::words::WordBank;

pub const LEVEL_KEY: &str = "level";
pub const CORRECT_COUNT_KEY: &str = "correctCount";
pub const AUDIO_UNLOCKED_KEY: &str = "audioUnlocked";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

// Private browsing may deny localStorage; the game then runs without persistence.
pub struct LocalStore {
    storage: Option<web_sys::Storage>,
}

impl LocalStore {
    pub fn open() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            log::warn!("localStorage unavailable; progress will not be saved");
        }
        Self { storage }
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(err) = storage.set_item(key, value) {
            log::warn!("failed to persist {}: {:?}", key, err);
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub level: u32,
    pub correct_count: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            level: 1,
            correct_count: 0,
        }
    }
}

pub struct ProgressStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self, words: &WordBank) -> Progress {
        let defaults = Progress::default();
        let level = self
            .read_u32(LEVEL_KEY)
            .map(|level| words.clamp_level(level))
            .unwrap_or(defaults.level);
        let correct_count = self
            .read_u32(CORRECT_COUNT_KEY)
            .unwrap_or(defaults.correct_count);

        Progress {
            level,
            correct_count,
        }
    }

    pub fn save_level(&mut self, level: u32) {
        self.store.set(LEVEL_KEY, &level.to_string());
    }

    pub fn save_correct_count(&mut self, count: u32) {
        self.store.set(CORRECT_COUNT_KEY, &count.to_string());
    }

    pub fn unlock_remembered(&self) -> bool {
        self.store.get(AUDIO_UNLOCKED_KEY).as_deref() == Some("true")
    }

    pub fn remember_unlock(&mut self) {
        self.store.set(AUDIO_UNLOCKED_KEY, "true");
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    fn read_u32(&self, key: &str) -> Option<u32> {
        self.store.get(key)?.trim().parse().ok()
    }
}
