//! StateStore — redb-backed reading and forecast persistence.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing). Every operation runs in its own transaction; an error on any
//! path drops the transaction, which rolls it back.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::de::DeserializeOwned;
use tracing::debug;

use tankwatch_core::{Prediction, Reading};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::traits::{ForecastStore, ReadingStore, UpsertOutcome};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Decode a stored row, naming the key if it is corrupt.
fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StateError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(READINGS).map_err(map_err!(Table))?;
        txn.open_table(FORECASTS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

// ── Readings ───────────────────────────────────────────────────────

impl ReadingStore for StateStore {
    fn append(&self, reading: &Reading) -> StateResult<()> {
        let value = serde_json::to_vec(reading).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let key;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let sequence = meta
                .get(READING_SEQUENCE)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0)
                + 1;
            meta.insert(READING_SEQUENCE, sequence)
                .map_err(map_err!(Write))?;

            key = reading_key(&reading.container_id, sequence);
            let mut table = txn.open_table(READINGS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, value = reading.value, "reading stored");
        Ok(())
    }

    fn list_ascending_by_time(&self, container_id: &str) -> StateResult<Vec<Reading>> {
        let prefix = format!("{container_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(READINGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let reading: Reading = decode(key.value(), value.value())?;
                // Ids that themselves contain ':' can share a prefix.
                if reading.container_id == container_id {
                    results.push(reading);
                }
            }
        }
        // Keys are in append order, and the sort is stable.
        results.sort_by_key(|r| r.timestamp);
        Ok(results)
    }

    fn list_container_ids(&self) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(READINGS).map_err(map_err!(Table))?;
        let mut ids = BTreeSet::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let reading: Reading = decode(key.value(), value.value())?;
            ids.insert(reading.container_id);
        }
        Ok(ids.into_iter().collect())
    }
}

// ── Forecasts ──────────────────────────────────────────────────────

impl ForecastStore for StateStore {
    fn exists(&self, container_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FORECASTS).map_err(map_err!(Table))?;
        Ok(table.get(container_id).map_err(map_err!(Read))?.is_some())
    }

    fn get_prediction(&self, container_id: &str) -> StateResult<Option<Prediction>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FORECASTS).map_err(map_err!(Table))?;
        match table.get(container_id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(container_id, guard.value())?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, prediction: &Prediction) -> StateResult<UpsertOutcome> {
        let key = prediction.container_id.as_str();
        let value = serde_json::to_vec(prediction).map_err(map_err!(Encode))?;
        // redb admits a single write transaction at a time, so the existence
        // check and the write cannot interleave with another upsert.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome;
        {
            let mut table = txn.open_table(FORECASTS).map_err(map_err!(Table))?;
            let previous = table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
            outcome = match previous {
                Some(_) => UpsertOutcome::Updated,
                None => UpsertOutcome::Inserted,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, ?outcome, "forecast upserted");
        Ok(outcome)
    }

    fn list_all(&self) -> StateResult<Vec<Prediction>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FORECASTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let prediction: Prediction = decode(key.value(), value.value())?;
            results.push(prediction);
        }
        results.sort_by(|a, b| b.computed_at.cmp(&a.computed_at));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};
    use tankwatch_core::{PredictionStatus, Timestamp};

    fn t0() -> Timestamp {
        DateTime::parse_from_rfc3339("2024-05-01T08:00:00+07:00").unwrap()
    }

    fn test_prediction(container_id: &str, computed_at: Timestamp) -> Prediction {
        Prediction {
            container_id: container_id.to_string(),
            capacity: 19.0,
            cumulative_consumption: 8.0,
            consumption_rate_per_hour: 8.0,
            remaining_volume: 11.0,
            hours_to_empty: 1.375,
            predicted_empty_instant: Some(computed_at + TimeDelta::minutes(82)),
            last_reading_instant: Some(computed_at - TimeDelta::hours(1)),
            computed_at,
            status: PredictionStatus::Success,
        }
    }

    // ── Readings ───────────────────────────────────────────────────

    #[test]
    fn readings_append_and_list() {
        let store = StateStore::open_in_memory().unwrap();
        store.append(&Reading::new("A", 5.0, t0())).unwrap();
        store
            .append(&Reading::new("A", 3.0, t0() + TimeDelta::hours(1)))
            .unwrap();
        store.append(&Reading::new("B", 1.0, t0())).unwrap();

        let a = store.list_ascending_by_time("A").unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].value, 5.0);
        assert_eq!(a[1].value, 3.0);

        assert_eq!(store.list_ascending_by_time("B").unwrap().len(), 1);
    }

    #[test]
    fn readings_sorted_by_timestamp_not_arrival() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .append(&Reading::new("A", 2.0, t0() + TimeDelta::hours(2)))
            .unwrap();
        store.append(&Reading::new("A", 1.0, t0())).unwrap();
        store
            .append(&Reading::new("A", 3.0, t0() + TimeDelta::hours(2)))
            .unwrap();

        let values: Vec<f64> = store
            .list_ascending_by_time("A")
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();
        // Equal timestamps keep append order.
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn readings_do_not_leak_across_prefixed_ids() {
        let store = StateStore::open_in_memory().unwrap();
        store.append(&Reading::new("A", 1.0, t0())).unwrap();
        store.append(&Reading::new("A:2", 4.0, t0())).unwrap();

        let a = store.list_ascending_by_time("A").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].value, 1.0);
    }

    #[test]
    fn non_positive_readings_are_still_stored() {
        let store = StateStore::open_in_memory().unwrap();
        store.append(&Reading::new("A", -1.0, t0())).unwrap();
        store.append(&Reading::new("A", 0.0, t0())).unwrap();
        assert_eq!(store.list_ascending_by_time("A").unwrap().len(), 2);
    }

    #[test]
    fn container_ids_are_distinct() {
        let store = StateStore::open_in_memory().unwrap();
        for id in ["B", "A", "B", "C"] {
            store.append(&Reading::new(id, 1.0, t0())).unwrap();
        }
        assert_eq!(store.list_container_ids().unwrap(), vec!["A", "B", "C"]);
    }

    // ── Forecasts ──────────────────────────────────────────────────

    #[test]
    fn forecast_insert_then_update() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(!store.exists("A").unwrap());

        let first = test_prediction("A", t0());
        assert_eq!(store.upsert(&first).unwrap(), UpsertOutcome::Inserted);
        assert!(store.exists("A").unwrap());

        let mut second = test_prediction("A", t0() + TimeDelta::hours(1));
        second.remaining_volume = 2.0;
        assert_eq!(store.upsert(&second).unwrap(), UpsertOutcome::Updated);

        assert_eq!(store.get_prediction("A").unwrap(), Some(second));
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn forecast_upsert_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        let p = test_prediction("A", t0());

        store.upsert(&p).unwrap();
        assert_eq!(store.upsert(&p).unwrap(), UpsertOutcome::Updated);

        let all = store.list_all().unwrap();
        assert_eq!(all, vec![p]);
    }

    #[test]
    fn last_upsert_wins_even_with_earlier_computed_at() {
        let store = StateStore::open_in_memory().unwrap();
        let first = test_prediction("A", t0() + TimeDelta::hours(1));
        let mut second = test_prediction("A", t0());
        second.cumulative_consumption = 12.0;
        second.remaining_volume = 7.0;

        store.upsert(&first).unwrap();
        assert_eq!(store.upsert(&second).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.get_prediction("A").unwrap(), Some(second));
    }

    #[test]
    fn corrupt_forecast_row_names_its_key() {
        let store = StateStore::open_in_memory().unwrap();
        {
            let txn = store.db.begin_write().unwrap();
            {
                let mut table = txn.open_table(FORECASTS).unwrap();
                table.insert("A", b"not json".as_slice()).unwrap();
            }
            txn.commit().unwrap();
        }

        let err = store.get_prediction("A").unwrap_err();
        assert!(matches!(err, StateError::Corrupt { ref key, .. } if key == "A"));
        assert!(matches!(store.list_all(), Err(StateError::Corrupt { .. })));

        // A fresh upsert replaces the unreadable row.
        let p = test_prediction("A", t0());
        assert_eq!(store.upsert(&p).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.get_prediction("A").unwrap(), Some(p));
    }

    #[test]
    fn forecasts_listed_newest_first() {
        let store = StateStore::open_in_memory().unwrap();
        store.upsert(&test_prediction("A", t0())).unwrap();
        store
            .upsert(&test_prediction("B", t0() + TimeDelta::hours(2)))
            .unwrap();
        store
            .upsert(&test_prediction("C", t0() + TimeDelta::hours(1)))
            .unwrap();

        let ids: Vec<String> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|p| p.container_id)
            .collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.append(&Reading::new("A", 5.0, t0())).unwrap();
            store.upsert(&test_prediction("A", t0())).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let readings = store.list_ascending_by_time("A").unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].timestamp.to_rfc3339(), "2024-05-01T08:00:00+07:00");
        assert!(store.exists("A").unwrap());

        // The sequence counter continues where it left off.
        store.append(&Reading::new("A", 1.0, t0())).unwrap();
        assert_eq!(store.list_ascending_by_time("A").unwrap().len(), 2);
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.list_ascending_by_time("any").unwrap().is_empty());
        assert!(store.list_container_ids().unwrap().is_empty());
        assert!(store.list_all().unwrap().is_empty());
        assert!(store.get_prediction("any").unwrap().is_none());
        assert!(!store.exists("any").unwrap());
    }
}
