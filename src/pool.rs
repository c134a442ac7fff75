//! Container pool manager
//!
//! Owns per-language pools of pre-warmed sandboxes. Acquire never waits for
//! another caller's release: an exhausted pool provisions one overflow
//! sandbox on demand, which bounds tail latency but not resource usage
//! (an optional per-language `max_total` ceiling turns sustained overload
//! into rejection). Locks are only held to move handles between the Free
//! deque and the leased count, never across provisioning.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, PoolSettings};
use crate::languages::Language;
use crate::runtime::SandboxRuntime;

/// Handle to one provisioned sandbox.
///
/// Exclusively owned by the pool; a driver borrows it for the duration of a
/// single execution and must hand it back through [`ContainerPool::release`]
/// or [`ContainerPool::discard`] exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxHandle {
    pub id: String,
    pub language: Language,
}

/// Why an acquire failed.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no pool configured for language: {0}")]
    Unconfigured(Language),
    #[error("pool for {language} is at capacity ({max_total} sandboxes in flight)")]
    AtCapacity { language: Language, max_total: usize },
    #[error("failed to provision sandbox for {language}: {cause}")]
    Provision {
        language: Language,
        cause: anyhow::Error,
    },
}

/// Eventually-consistent snapshot of one language pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub available: usize,
    pub leased: usize,
}

struct LanguagePool {
    settings: PoolSettings,
    free: Mutex<VecDeque<String>>,
    leased: AtomicUsize,
}

/// Per-language pools of sandboxes, safe for concurrent acquire/release.
pub struct ContainerPool {
    runtime: Arc<dyn SandboxRuntime>,
    pools: HashMap<Language, LanguagePool>,
    /// Every live sandbox id, Free or Leased; drained at shutdown
    known: Mutex<HashSet<String>>,
}

impl ContainerPool {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, config: &EngineConfig) -> Self {
        let pools = config
            .pools()
            .map(|(language, settings)| {
                let pool = LanguagePool {
                    settings: settings.clone(),
                    free: Mutex::new(VecDeque::new()),
                    leased: AtomicUsize::new(0),
                };
                (language, pool)
            })
            .collect();

        Self {
            runtime,
            pools,
            known: Mutex::new(HashSet::new()),
        }
    }

    pub fn runtime(&self) -> Arc<dyn SandboxRuntime> {
        self.runtime.clone()
    }

    /// Provision every configured pool up to its size, all in parallel.
    /// Individual provisioning failures reduce capacity and are logged,
    /// never fatal. Must complete before execution requests are accepted.
    pub async fn warm_up(&self) {
        let mut set = JoinSet::new();
        for (language, pool) in &self.pools {
            for _ in 0..pool.settings.pool_size {
                let runtime = self.runtime.clone();
                let image = pool.settings.image.clone();
                let language = *language;
                set.spawn(async move { (language, runtime.create(&image).await) });
            }
        }

        let mut warmed: HashMap<Language, usize> = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((language, Ok(id))) => {
                    self.known.lock().insert(id.clone());
                    if let Some(pool) = self.pools.get(&language) {
                        pool.free.lock().push_back(id);
                    }
                    *warmed.entry(language).or_default() += 1;
                }
                Ok((language, Err(e))) => {
                    warn!(%language, error = %e, "warm-up provisioning failed, pool will run smaller");
                }
                Err(e) => {
                    warn!(error = %e, "warm-up task failed");
                }
            }
        }

        for (language, pool) in &self.pools {
            info!(
                %language,
                warmed = warmed.get(language).copied().unwrap_or(0),
                requested = pool.settings.pool_size,
                "pool warmed"
            );
        }
    }

    /// Lease a sandbox for `language`.
    ///
    /// O(1) when a pre-warmed sandbox is Free. On exhaustion, provisions one
    /// overflow sandbox on demand; that call blocks for the duration of
    /// sandbox startup but holds no pool lock while doing so. Concurrent
    /// callers never receive the same handle.
    pub async fn acquire(&self, language: Language) -> Result<SandboxHandle, PoolError> {
        let pool = self
            .pools
            .get(&language)
            .ok_or(PoolError::Unconfigured(language))?;

        // Pop-or-reserve is one critical section: the ceiling check and the
        // lease increment must not be separable, or two callers racing past
        // an empty Free deque both provision and overshoot `max_total`.
        {
            let mut free = pool.free.lock();
            if let Some(id) = free.pop_front() {
                pool.leased.fetch_add(1, Ordering::SeqCst);
                drop(free);
                debug!(%language, sandbox = %id, "leased warm sandbox");
                return Ok(SandboxHandle { id, language });
            }
            if let Some(max_total) = pool.settings.max_total {
                // Free is empty here, so leased alone counts the in-flight set.
                if pool.leased.load(Ordering::SeqCst) >= max_total {
                    return Err(PoolError::AtCapacity {
                        language,
                        max_total,
                    });
                }
            }
            // Reserve the overflow slot before provisioning so concurrent
            // callers see it.
            pool.leased.fetch_add(1, Ordering::SeqCst);
        }

        match self.runtime.create(&pool.settings.image).await {
            Ok(id) => {
                self.known.lock().insert(id.clone());
                info!(%language, sandbox = %id, "pool exhausted, provisioned overflow sandbox");
                Ok(SandboxHandle { id, language })
            }
            Err(cause) => {
                release_lease(&pool.leased);
                Err(PoolError::Provision { language, cause })
            }
        }
    }

    /// Return a leased handle to the Free set.
    ///
    /// Fire-and-forget: the hand-back runs on a background task and is not
    /// guaranteed complete when this returns. The handle is trusted to still
    /// be healthy; callers holding a sandbox in an unknown state use
    /// [`ContainerPool::discard`] instead.
    pub fn release(self: &Arc<Self>, handle: SandboxHandle) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let Some(lang_pool) = pool.pools.get(&handle.language) else {
                return;
            };
            // A hand-back landing after shutdown refers to a sandbox that no
            // longer exists; dropping it beats re-enqueueing a dead id.
            if !pool.known.lock().contains(&handle.id) {
                debug!(sandbox = %handle.id, "dropping release of unknown sandbox");
                return;
            }
            debug!(language = %handle.language, sandbox = %handle.id, "released sandbox");
            lang_pool.free.lock().push_back(handle.id);
            release_lease(&lang_pool.leased);
        });
    }

    /// Destroy a leased handle instead of returning it.
    ///
    /// Fire-and-forget, used for sandboxes judged unhealthy (a timeout may
    /// have left a runaway process behind; an exec failure may mean the
    /// container is gone). Capacity is restored lazily by overflow
    /// provisioning on a later acquire.
    pub fn discard(self: &Arc<Self>, handle: SandboxHandle) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(lang_pool) = pool.pools.get(&handle.language) {
                release_lease(&lang_pool.leased);
            }
            pool.known.lock().remove(&handle.id);
            debug!(language = %handle.language, sandbox = %handle.id, "discarding sandbox");
            if let Err(e) = pool.runtime.destroy(&handle.id).await {
                warn!(sandbox = %handle.id, error = %e, "failed to destroy discarded sandbox");
            }
        });
    }

    /// Snapshot of every pool; tolerates concurrent mutation.
    pub fn stats(&self) -> HashMap<Language, PoolStats> {
        self.pools
            .iter()
            .map(|(language, pool)| {
                let stats = PoolStats {
                    available: pool.free.lock().len(),
                    leased: pool.leased.load(Ordering::SeqCst),
                };
                (*language, stats)
            })
            .collect()
    }

    /// Best-effort teardown of every known sandbox, Free and Leased.
    /// Used only at process exit.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.known.lock().drain().collect();
        for pool in self.pools.values() {
            pool.free.lock().clear();
            pool.leased.store(0, Ordering::SeqCst);
        }

        info!(sandboxes = ids.len(), "shutting down pool");
        let mut set = JoinSet::new();
        for id in ids {
            let runtime = self.runtime.clone();
            set.spawn(async move { (id.clone(), runtime.destroy(&id).await) });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, Err(e))) => warn!(sandbox = %id, error = %e, "shutdown destroy failed"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "shutdown task failed"),
            }
        }
    }
}

/// Lease counts are zeroed at shutdown; a decrement landing after that must
/// not wrap.
fn release_lease(leased: &AtomicUsize) {
    let _ = leased.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
}
