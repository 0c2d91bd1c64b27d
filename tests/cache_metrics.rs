//! Asserts that cache and engine paths emit the expected metric keys, and
//! that the telemetry bootstrap installs exactly once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, mpsc};
use std::thread;
use std::time::Duration;

use calcengine::{
    CacheConfig, CalculationEngine, CalculationResult, CalculatorDescriptor, EngineConfig,
    InputMap, InputSpec,
};
use calcengine::cache::CacheStore;
use calcengine::config::LoggingSettings;
use calcengine::infra::telemetry;
use metrics_util::debugging::{DebuggingRecorder, Snapshotter};
use serde_json::json;
use serial_test::serial;

static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();

fn snapshotter() -> &'static Snapshotter {
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        snapshotter
    })
}

fn recorded_names() -> HashSet<String> {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect()
}

#[test]
#[serial]
fn store_paths_emit_expected_metric_keys() {
    // Ensure the recording recorder is installed before any metrics are
    // emitted; otherwise the emissions go to the noop global and are lost.
    snapshotter();

    let store = CacheStore::new(CacheConfig {
        max_entries: 1,
        sweep_interval_ms: 0,
        ..Default::default()
    });

    // miss, hit, capacity eviction
    assert!(store.get("absent").is_none());
    store.insert("a".to_string(), 1u32, None);
    assert!(store.get("a").is_some());
    store.insert("b".to_string(), 2u32, None);

    // TTL expiry via lazy removal
    store.insert("c".to_string(), 3u32, Some(Duration::from_millis(1)));
    thread::sleep(Duration::from_millis(10));
    assert!(store.get("c").is_none());

    let names = recorded_names();
    for metric in [
        "calcengine_cache_hit_total",
        "calcengine_cache_miss_total",
        "calcengine_cache_evict_total",
        "calcengine_cache_expired_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}

#[test]
#[serial]
fn engine_paths_emit_expected_metric_keys() {
    // Ensure the recording recorder is installed before any metrics are
    // emitted; otherwise the emissions go to the noop global and are lost.
    snapshotter();

    let engine = Arc::new(CalculationEngine::new(EngineConfig {
        cache: CacheConfig {
            sweep_interval_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    }));

    // compute histogram
    engine.register_calculator(CalculatorDescriptor::new("emit"));
    engine.register_algorithm("emit", |_inputs: &InputMap| {
        Ok(CalculationResult::new(1.0, "", "One"))
    });
    engine
        .calculate("emit", &InputMap::new(), None)
        .expect("computes");

    // validation rejection
    engine.register_calculator(
        CalculatorDescriptor::new("strict").with_input(InputSpec::number("a").required()),
    );
    let mut bad = InputMap::new();
    bad.insert("a".to_string(), json!("text"));
    assert!(engine.calculate("strict", &bad, None).is_err());

    // coalesced in-flight call
    engine.register_calculator(CalculatorDescriptor::new("slow"));
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    engine.register_algorithm("slow", move |_inputs: &InputMap| {
        started_tx.send(()).ok();
        release_rx
            .lock()
            .expect("release receiver lock")
            .recv_timeout(Duration::from_secs(5))
            .ok();
        Ok(CalculationResult::new(2.0, "", "Slow"))
    });

    let leader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.calculate("slow", &InputMap::new(), None))
    };
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("leader started computing");
    let follower = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.calculate("slow", &InputMap::new(), None))
    };
    thread::sleep(Duration::from_millis(50));
    release_tx.send(()).expect("leader released");
    leader
        .join()
        .expect("leader thread joins")
        .expect("leader computes");
    follower
        .join()
        .expect("follower thread joins")
        .expect("follower coalesces");

    let names = recorded_names();
    for metric in [
        "calcengine_compute_ms",
        "calcengine_validation_reject_total",
        "calcengine_flight_coalesced_total",
        "calcengine_cache_miss_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}

#[test]
#[serial]
fn telemetry_installs_exactly_once() {
    telemetry::init(&LoggingSettings::default()).expect("first install succeeds");
    assert!(telemetry::init(&LoggingSettings::default()).is_err());
}
