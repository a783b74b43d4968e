//! Concurrent ingest stress tests.
//!
//! Many threads record readings at once; the forecast table must still
//! hold exactly one row per container, and that row must reflect every
//! stored reading.

use std::sync::Arc;
use std::thread;

use chrono::DateTime;
use tankwatch_core::{EngineConfig, FixedClock, Prediction, PredictionStatus, Timestamp};
use tankwatch_predict::{IngestCoordinator, PredictionEngine};
use tankwatch_state::{ForecastStore, ReadingStore, StateStore, UpsertOutcome};

const THREADS: usize = 8;
const PER_THREAD: usize = 25;

fn t0() -> Timestamp {
    DateTime::parse_from_rfc3339("2024-05-01T08:00:00+07:00").unwrap()
}

fn coordinator(store: StateStore) -> Arc<IngestCoordinator<StateStore>> {
    let engine = PredictionEngine::new(EngineConfig::default()).unwrap();
    let clock = Arc::new(FixedClock::new(t0()));
    Arc::new(IngestCoordinator::new(store, engine, clock))
}

#[test]
fn same_container_ingests_leave_one_forecast_row() {
    let store = StateStore::open_in_memory().unwrap();
    let coord = coordinator(store.clone());

    thread::scope(|s| {
        for _ in 0..THREADS {
            let coord = coord.clone();
            s.spawn(move || {
                for _ in 0..PER_THREAD {
                    coord.record("tank-1", 0.05).unwrap();
                }
            });
        }
    });

    let readings = store.list_ascending_by_time("tank-1").unwrap();
    assert_eq!(readings.len(), THREADS * PER_THREAD);

    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 1);

    let forecast = &all[0];
    assert_eq!(forecast.status, PredictionStatus::Success);
    let expected: f64 = readings.iter().map(|r| r.value).sum();
    assert!((forecast.cumulative_consumption - expected).abs() < 1e-9);
}

#[test]
fn different_containers_proceed_independently() {
    let store = StateStore::open_in_memory().unwrap();
    let coord = coordinator(store.clone());

    thread::scope(|s| {
        for t in 0..THREADS {
            let coord = coord.clone();
            s.spawn(move || {
                let id = format!("tank-{}", t % 4);
                for _ in 0..PER_THREAD {
                    coord.record(&id, 0.02).unwrap();
                }
            });
        }
    });

    let mut ids: Vec<String> = store
        .list_all()
        .unwrap()
        .into_iter()
        .map(|p| p.container_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["tank-0", "tank-1", "tank-2", "tank-3"]);

    for id in &ids {
        let readings = store.list_ascending_by_time(id).unwrap();
        assert_eq!(readings.len(), 2 * PER_THREAD);
    }
}

#[test]
fn racing_raw_upserts_never_duplicate() {
    let store = StateStore::open_in_memory().unwrap();
    let engine = PredictionEngine::new(EngineConfig::default()).unwrap();
    let readings = vec![tankwatch_core::Reading::new("tank-9", 4.0, t0())];
    let prediction: Prediction = engine.predict("tank-9", &readings, t0());

    let outcomes: Vec<UpsertOutcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = store.clone();
                let prediction = prediction.clone();
                s.spawn(move || store.upsert(&prediction).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let inserted = outcomes
        .iter()
        .filter(|o| **o == UpsertOutcome::Inserted)
        .count();
    assert_eq!(inserted, 1);
    assert_eq!(store.list_all().unwrap(), vec![prediction]);
}
