// Time-bounded result cache
// One in-flight computation per key; entries expire after a fixed TTL.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// A `capacity` of 0 behaves as 1
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            capacity: 128,
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub coalesced_count: AtomicUsize,
    pub expired_count: AtomicUsize,
    pub eviction_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub coalesced_count: usize,
    pub expired_count: usize,
    pub eviction_count: usize,
}

struct Stamped<V> {
    value: V,
    stored_at: Instant,
    // false: handed to the callers of this computation only
    retained: bool,
}

type Slot<V> = Arc<OnceCell<Stamped<V>>>;

enum Lookup<V> {
    Live(Slot<V>),
    Pending(Slot<V>),
    Expired,
    Discarded,
}

pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Slot<V>>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config: CacheConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            clock,
            stats: CacheStats::default(),
        }
    }

    pub async fn get_or_insert_with<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.get_or_insert_if(key, compute, |_| true).await
    }

    // Returns the live value for `key`, joins the computation already running
    // for it, or runs `compute`. Every caller of one computation receives its
    // value; the value outlives that computation only when `retain` accepts it.
    pub async fn get_or_insert_if<F, Fut, R>(&self, key: K, compute: F, retain: R) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
        R: FnOnce(&V) -> bool,
    {
        let slot = self.slot_for(key.clone());
        let stamped = slot
            .get_or_init(|| async move {
                let value = compute().await;
                Stamped {
                    retained: retain(&value),
                    value,
                    stored_at: self.clock.now(),
                }
            })
            .await;

        if !stamped.retained {
            self.discard(&key, &slot);
        }
        stamped.value.clone()
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            items_count: self.len(),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            coalesced_count: self.stats.coalesced_count.load(Ordering::SeqCst),
            expired_count: self.stats.expired_count.load(Ordering::SeqCst),
            eviction_count: self.stats.eviction_count.load(Ordering::SeqCst),
        }
    }

    fn is_expired(&self, stamped: &Stamped<V>, now: Instant) -> bool {
        now.saturating_duration_since(stamped.stored_at) >= self.config.ttl
    }

    // Only the map still holds an empty slot whose caller was dropped
    fn is_abandoned(slot: &Slot<V>) -> bool {
        !slot.initialized() && Arc::strong_count(slot) == 1
    }

    // Expiry check and slot hand-out happen under one lock, so two callers
    // missing on the same key end up sharing one slot.
    fn slot_for(&self, key: K) -> Slot<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let lookup = entries.get(&key).map(|slot| match slot.get() {
            Some(stamped) if !stamped.retained => Lookup::Discarded,
            Some(stamped) if self.is_expired(stamped, now) => Lookup::Expired,
            Some(_) => Lookup::Live(slot.clone()),
            None if Self::is_abandoned(slot) => Lookup::Discarded,
            None => Lookup::Pending(slot.clone()),
        });
        match lookup {
            Some(Lookup::Live(slot)) => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                return slot;
            }
            Some(Lookup::Pending(slot)) => {
                self.stats.coalesced_count.fetch_add(1, Ordering::SeqCst);
                return slot;
            }
            Some(Lookup::Expired) => {
                self.stats.expired_count.fetch_add(1, Ordering::SeqCst);
                entries.remove(&key);
            }
            Some(Lookup::Discarded) => {
                entries.remove(&key);
            }
            None => {}
        }

        self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
        if entries.len() >= self.config.capacity {
            self.make_room(&mut entries, now);
        }

        let slot: Slot<V> = Arc::new(OnceCell::new());
        entries.insert(key, slot.clone());
        slot
    }

    // Drops `slot` unless the key has since moved on to a newer computation
    fn discard(&self, key: &K, slot: &Slot<V>) {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            entries.remove(key);
        }
    }

    // Drops expired, discarded and abandoned entries, then the oldest finished
    // one if still full. Computations still running are never evicted.
    fn make_room(&self, entries: &mut HashMap<K, Slot<V>>, now: Instant) {
        let mut expired = 0;
        entries.retain(|_, slot| match slot.get() {
            Some(stamped) if self.is_expired(stamped, now) => {
                expired += 1;
                false
            }
            Some(stamped) => stamped.retained,
            None => !Self::is_abandoned(slot),
        });
        self.stats.expired_count.fetch_add(expired, Ordering::SeqCst);

        if entries.len() < self.config.capacity {
            return;
        }

        let oldest_key = entries
            .iter()
            .filter_map(|(key, slot)| slot.get().map(|stamped| (key, stamped.stored_at)))
            .min_by_key(|(_, stored_at)| *stored_at)
            .map(|(key, _)| key.clone());

        if let Some(oldest_key) = oldest_key {
            entries.remove(&oldest_key);
            self.stats.eviction_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
