//! Cache store behavior on a simulated clock: TTL boundaries, policy
//! eviction, sweeping, and bookkeeping consistency.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use calcengine::cache::{CacheConfig, CacheStore, Clock, EvictionPolicy, SweepHandle};

/// Simulated clock: a fixed base instant plus an adjustable offset.
#[derive(Clone)]
struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    fn advance(&self, by: Duration) {
        *self.offset.lock().expect("clock offset lock") += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().expect("clock offset lock")
    }
}

fn store(config: CacheConfig) -> (CacheStore<u32>, ManualClock) {
    let clock = ManualClock::new();
    (CacheStore::with_clock(config, clock.clone()), clock)
}

#[test]
fn entry_is_present_just_before_ttl_and_absent_just_after() {
    let (store, clock) = store(CacheConfig::default());
    let ttl = Duration::from_millis(1000);
    store.insert("k".to_string(), 1, Some(ttl));

    clock.advance(Duration::from_millis(999));
    assert_eq!(store.get("k"), Some(1));

    clock.advance(Duration::from_millis(2));
    assert_eq!(store.get("k"), None);
}

#[test]
fn default_ttl_applies_when_unspecified() {
    let config = CacheConfig {
        default_ttl_ms: 50,
        ..Default::default()
    };
    let (store, clock) = store(config);
    store.insert("k".to_string(), 1, None);

    clock.advance(Duration::from_millis(30));
    assert_eq!(store.get("k"), Some(1));

    clock.advance(Duration::from_millis(30));
    assert_eq!(store.get("k"), None);
}

#[test]
fn at_capacity_exactly_one_entry_is_removed_per_insert() {
    let config = CacheConfig {
        max_entries: 3,
        ..Default::default()
    };
    let (store, clock) = store(config);

    for (index, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        store.insert((*key).to_string(), index as u32, None);
        clock.advance(Duration::from_millis(1));
        assert!(store.len() <= 3);
    }
    assert_eq!(store.len(), 3);
}

#[test]
fn lru_victim_is_the_least_recently_accessed() {
    let config = CacheConfig {
        max_entries: 2,
        eviction_policy: EvictionPolicy::Lru,
        ..Default::default()
    };
    let (store, clock) = store(config);

    store.insert("old".to_string(), 1, None);
    clock.advance(Duration::from_millis(1));
    store.insert("fresh".to_string(), 2, None);
    clock.advance(Duration::from_millis(1));
    assert_eq!(store.get("old"), Some(1));
    clock.advance(Duration::from_millis(1));

    store.insert("new".to_string(), 3, None);

    assert_eq!(store.get("old"), Some(1));
    assert_eq!(store.get("fresh"), None);
    assert_eq!(store.get("new"), Some(3));
}

#[test]
fn lfu_victim_is_the_least_frequently_accessed() {
    let config = CacheConfig {
        max_entries: 2,
        eviction_policy: EvictionPolicy::Lfu,
        ..Default::default()
    };
    let (store, clock) = store(config);

    store.insert("popular".to_string(), 1, None);
    clock.advance(Duration::from_millis(1));
    store.insert("ignored".to_string(), 2, None);
    clock.advance(Duration::from_millis(1));

    for _ in 0..3 {
        assert_eq!(store.get("popular"), Some(1));
        clock.advance(Duration::from_millis(1));
    }

    store.insert("new".to_string(), 3, None);

    assert_eq!(store.get("popular"), Some(1));
    assert_eq!(store.get("ignored"), None);
    assert_eq!(store.get("new"), Some(3));
}

#[test]
fn fifo_victim_is_the_earliest_inserted() {
    let config = CacheConfig {
        max_entries: 2,
        eviction_policy: EvictionPolicy::Fifo,
        ..Default::default()
    };
    let (store, clock) = store(config);

    store.insert("first".to_string(), 1, None);
    clock.advance(Duration::from_millis(1));
    store.insert("second".to_string(), 2, None);
    clock.advance(Duration::from_millis(1));

    // heavy access must not save the earliest insert under FIFO
    for _ in 0..5 {
        assert_eq!(store.get("first"), Some(1));
        clock.advance(Duration::from_millis(1));
    }

    store.insert("third".to_string(), 3, None);

    assert_eq!(store.get("first"), None);
    assert_eq!(store.get("second"), Some(2));
    assert_eq!(store.get("third"), Some(3));
}

#[test]
fn overwriting_at_capacity_keeps_every_key() {
    let config = CacheConfig {
        max_entries: 2,
        ..Default::default()
    };
    let (store, clock) = store(config);

    store.insert("a".to_string(), 1, None);
    clock.advance(Duration::from_millis(1));
    store.insert("b".to_string(), 2, None);
    clock.advance(Duration::from_millis(1));

    store.insert("a".to_string(), 10, None);

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a"), Some(10));
    assert_eq!(store.get("b"), Some(2));
}

#[test]
fn sweep_drops_every_expired_entry_and_nothing_else() {
    let (store, clock) = store(CacheConfig::default());

    store.insert("gone-1".to_string(), 1, Some(Duration::from_millis(10)));
    store.insert("gone-2".to_string(), 2, Some(Duration::from_millis(20)));
    store.insert("kept".to_string(), 3, Some(Duration::from_secs(60)));

    clock.advance(Duration::from_millis(50));
    assert_eq!(store.sweep_expired(), 2);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("kept"), Some(3));
}

#[test]
fn background_sweeper_bounds_memory_without_reads() {
    // real clock here: the sweeper thread sleeps in real time
    let store = Arc::new(CacheStore::new(CacheConfig::default()));
    for index in 0..10 {
        store.insert(
            format!("never-read-again-{index}"),
            index,
            Some(Duration::from_millis(5)),
        );
    }

    let mut sweeper = SweepHandle::spawn(Arc::clone(&store), Duration::from_millis(10));
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(store.len(), 0);
    sweeper.stop();
}

#[test]
fn stats_track_size_hits_and_misses() {
    let (store, _clock) = store(CacheConfig::default());
    store.insert("a".to_string(), 1, None);
    store.insert("b".to_string(), 2, None);

    assert!(store.get("a").is_some());
    assert!(store.get("a").is_some());
    assert!(store.get("nope").is_none());
    assert!(store.get("nada").is_none());

    let stats = store.stats();
    assert_eq!(stats.size, 2);
    assert_eq!(stats.hit_rate, 0.5);
    assert!(stats.approx_memory_bytes > 0);
}

#[test]
fn clear_and_clear_prefix() {
    let (store, _clock) = store(CacheConfig::default());
    store.insert("calc:v1:a:1".to_string(), 1, None);
    store.insert("calc:v1:a:2".to_string(), 2, None);
    store.insert("calc:v1:b:1".to_string(), 3, None);

    assert_eq!(store.clear_prefix("calc:v1:a:"), 2);
    assert_eq!(store.len(), 1);

    store.clear();
    assert!(store.is_empty());
}
