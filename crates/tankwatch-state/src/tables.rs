//! redb table definitions for the tankwatch state store.
//!
//! Reading and forecast values are JSON-serialized domain types.

use redb::TableDefinition;

/// Raw readings keyed by `{container_id}:{sequence:020}`.
pub const READINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("readings");

/// Current forecast keyed by `{container_id}`.
pub const FORECASTS: TableDefinition<&str, &[u8]> = TableDefinition::new("forecasts");

/// Store-wide counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] holding the last reading sequence number.
pub const READING_SEQUENCE: &str = "reading_sequence";

/// Build the readings-table key for one reading.
pub fn reading_key(container_id: &str, sequence: u64) -> String {
    format!("{container_id}:{sequence:020}")
}
