//! Versioned persistence for learned tables and station markets
//!
//! Writers always emit the current envelope `{version, ...}`. Readers accept
//! the current version, older envelopes, and bare legacy payloads (treated as
//! version 1 and migrated). Anything newer than we understand, or anything
//! that does not parse, is `SimError::BadPersistence`.

pub mod markets;
pub mod migration;

pub use markets::{apply_markets, load_markets, market_table, save_markets, MarketLine, MarketTable, MARKET_VERSION};
pub use migration::{check_dims, migrate_key, migrate_table, TableSchema};

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::ai::qlearning::{QTable, StateKey};
use crate::core::error::{Result, SimError};

/// Current Q-table envelope version
pub const QTABLE_VERSION: u32 = 2;

#[derive(Serialize)]
struct QTableEnvelope<'a> {
    version: u32,
    q_table: &'a QTable,
}

/// Split a document into (version, payload). Bare objects are version 1.
pub(crate) fn open_envelope(doc: Value, payload_keys: &[&str], current: u32) -> Result<(u32, Value)> {
    let Value::Object(mut obj) = doc else {
        return Err(SimError::BadPersistence("expected a JSON object".into()));
    };
    let Some(version) = obj.remove("version") else {
        return Ok((1, Value::Object(obj)));
    };
    let version = version
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v >= 1)
        .ok_or_else(|| SimError::BadPersistence(format!("invalid version field: {}", version)))?;
    if version > current {
        return Err(SimError::BadPersistence(format!(
            "version {} is newer than supported version {}",
            version, current
        )));
    }
    let payload = payload_keys
        .iter()
        .find_map(|k| obj.remove(*k))
        .ok_or_else(|| SimError::BadPersistence(format!("envelope has none of {:?}", payload_keys)))?;
    Ok((version, payload))
}

fn parse_q_payload(payload: Value) -> Result<BTreeMap<StateKey, BTreeMap<String, f64>>> {
    let Value::Object(states) = payload else {
        return Err(SimError::BadPersistence("q_table must be an object".into()));
    };
    let mut table = BTreeMap::new();
    for (raw_key, actions) in states {
        let key: StateKey = raw_key.parse().map_err(SimError::BadPersistence)?;
        let Value::Object(actions) = actions else {
            return Err(SimError::BadPersistence(format!("actions for {} must be an object", key)));
        };
        let mut values = BTreeMap::new();
        for (action, value) in actions {
            let q = value
                .as_f64()
                .ok_or_else(|| SimError::BadPersistence(format!("Q({}, {}) is not a number", key, action)))?;
            values.insert(action, q);
        }
        table.insert(key, values);
    }
    Ok(table)
}

fn into_table(parsed: BTreeMap<StateKey, BTreeMap<String, f64>>) -> QTable {
    let mut table = QTable::new();
    for (key, actions) in parsed {
        table.insert_state(key, actions);
    }
    table
}

/// Serialize a Q-table in the current envelope
pub fn save_q_table(table: &QTable) -> Result<String> {
    let envelope = QTableEnvelope { version: QTABLE_VERSION, q_table: table };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Parse a Q-table, migrating legacy payloads to the schema's current shape
pub fn load_q_table(json: &str, schema: TableSchema) -> Result<QTable> {
    let doc: Value =
        serde_json::from_str(json).map_err(|e| SimError::BadPersistence(format!("corrupt q-table: {}", e)))?;
    let (version, payload) = open_envelope(doc, &["q_table", "payload"], QTABLE_VERSION)?;
    let parsed = parse_q_payload(payload)?;
    if version < QTABLE_VERSION {
        return migrate_table(parsed, schema);
    }
    check_dims(&parsed, schema)?;
    Ok(into_table(parsed))
}

pub fn save_q_table_file(path: &Path, table: &QTable) -> Result<()> {
    std::fs::write(path, save_q_table(table)?)?;
    Ok(())
}

pub fn load_q_table_file(path: &Path, schema: TableSchema) -> Result<QTable> {
    let content = std::fs::read_to_string(path)?;
    load_q_table(&content, schema)
}

/// Load a table, falling back to an empty one if the file is missing or bad
pub fn load_q_table_or_empty(path: &Path, schema: TableSchema) -> QTable {
    match load_q_table_file(path, schema) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "starting with an empty q-table");
            QTable::new()
        }
    }
}

/// Wrap an arbitrary serializable payload in a `{version, payload}` envelope
pub(crate) fn envelope_with<T: Serialize>(version: u32, payload: &T) -> Result<String> {
    let mut obj = Map::new();
    obj.insert("version".into(), Value::from(version));
    obj.insert("payload".into(), serde_json::to_value(payload)?);
    Ok(serde_json::to_string_pretty(&Value::Object(obj))?)
}
