//! Result cache for interpreted executions
//!
//! Optional, disabled unless a TTL is configured. Keys are the SHA-256 of
//! the full (language, source, stdin) tuple; a hit returns the stored result
//! without touching a sandbox. Only the orchestrator consults it, and only
//! for interpreted-immediate languages, where a run has no compiled artifact
//! or other externally observable side effect to invalidate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::languages::Language;
use crate::outcome::ExecutionResult;

type Key = [u8; 32];

struct Entry {
    stored_at: Instant,
    result: ExecutionResult,
}

#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Inner>,
}

struct Inner {
    ttl: Duration,
    entries: Mutex<HashMap<Key, Entry>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn get(&self, language: Language, source: &str, stdin: &str) -> Option<ExecutionResult> {
        let key = cache_key(language, source, stdin);
        let mut entries = self.inner.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.inner.ttl => {
                Some(entry.result.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, language: Language, source: &str, stdin: &str, result: &ExecutionResult) {
        let key = cache_key(language, source, stdin);
        self.inner.entries.lock().insert(
            key,
            Entry {
                stored_at: Instant::now(),
                result: result.clone(),
            },
        );
    }
}

fn cache_key(language: Language, source: &str, stdin: &str) -> Key {
    let mut hasher = Sha256::new();
    hasher.update(language.to_string().as_bytes());
    hasher.update([0]);
    // Length prefix keeps (source, stdin) splits unambiguous.
    hasher.update((source.len() as u64).to_le_bytes());
    hasher.update(source.as_bytes());
    hasher.update(stdin.as_bytes());
    hasher.finalize().into()
}
