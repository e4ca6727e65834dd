//! Station market persistence
//!
//! Current form: `{"version": 2, "payload": {"<station id>": {"<item>": {"stock": n, "price": p}}}}`.
//! A bare station map is version 1. Whatever the version, an item line may be
//! written as `{stock, price}`, `[stock, price]`, or just a price.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::EntityId;
use crate::economy::MarketRecord;
use crate::persistence::{envelope_with, open_envelope};
use crate::world::galaxy::Galaxy;

pub const MARKET_VERSION: u32 = 2;

/// One loaded item line. A bare-price legacy line carries no stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketLine {
    pub stock: Option<u32>,
    pub price: u32,
}

/// station → item → line
pub type MarketTable = BTreeMap<EntityId, BTreeMap<String, MarketLine>>;

/// Snapshot every station's market as persisted records
pub fn market_table(galaxy: &Galaxy) -> BTreeMap<EntityId, BTreeMap<String, MarketRecord>> {
    galaxy.stations().map(|s| (s.id, s.market.records())).collect()
}

pub fn save_markets(galaxy: &Galaxy) -> Result<String> {
    let payload: BTreeMap<String, BTreeMap<String, MarketRecord>> = market_table(galaxy)
        .into_iter()
        .map(|(id, records)| (id.0.to_string(), records))
        .collect();
    envelope_with(MARKET_VERSION, &payload)
}

fn parse_station_id(raw: &str) -> Result<EntityId> {
    raw.trim()
        .trim_start_matches('#')
        .parse::<u32>()
        .map(EntityId)
        .map_err(|_| SimError::BadPersistence(format!("bad station id '{}'", raw)))
}

fn as_count(value: &Value, what: &str) -> Result<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| value.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u32))
        .ok_or_else(|| SimError::BadPersistence(format!("{} must be a non-negative number, got {}", what, value)))
}

fn parse_line(item: &str, value: &Value) -> Result<MarketLine> {
    match value {
        Value::Object(obj) => {
            let price = obj
                .get("price")
                .ok_or_else(|| SimError::BadPersistence(format!("'{}' has no price", item)))?;
            let stock = obj.get("stock").map(|s| as_count(s, "stock")).transpose()?;
            Ok(MarketLine { stock, price: as_count(price, "price")? })
        }
        Value::Array(pair) if pair.len() == 2 => Ok(MarketLine {
            stock: Some(as_count(&pair[0], "stock")?),
            price: as_count(&pair[1], "price")?,
        }),
        Value::Number(_) => Ok(MarketLine { stock: None, price: as_count(value, "price")? }),
        other => Err(SimError::BadPersistence(format!("unreadable market line for '{}': {}", item, other))),
    }
}

pub fn load_markets(json: &str) -> Result<MarketTable> {
    let doc: Value =
        serde_json::from_str(json).map_err(|e| SimError::BadPersistence(format!("corrupt market table: {}", e)))?;
    let (version, payload) = open_envelope(doc, &["payload", "markets"], MARKET_VERSION)?;
    let Value::Object(stations) = payload else {
        return Err(SimError::BadPersistence("market payload must be an object".into()));
    };

    let mut table = MarketTable::new();
    for (raw_id, items) in &stations {
        let id = parse_station_id(raw_id)?;
        let Value::Object(items) = items else {
            return Err(SimError::BadPersistence(format!("station {} must map items", raw_id)));
        };
        let mut lines = BTreeMap::new();
        for (item, value) in items {
            lines.insert(item.clone(), parse_line(item, value)?);
        }
        table.insert(id, lines);
    }
    if version < MARKET_VERSION {
        tracing::info!(version, stations = table.len(), "read legacy market table");
    }
    Ok(table)
}

/// Write loaded lines into the galaxy's markets. Unknown stations and items
/// are skipped; a line without stock keeps the station's current stock.
pub fn apply_markets(galaxy: &mut Galaxy, table: &MarketTable, config: &SimulationConfig) -> usize {
    let mut applied = 0;
    for (id, lines) in table {
        let Some(station) = galaxy.station_mut(*id) else {
            tracing::debug!(station = %id, "skipping market for unknown station");
            continue;
        };
        let records: BTreeMap<String, MarketRecord> = lines
            .iter()
            .map(|(item, line)| {
                let stock = line.stock.unwrap_or_else(|| station.market.stock(item));
                (item.clone(), MarketRecord { stock, price: line.price })
            })
            .collect();
        station.market.apply_records(&records, config);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IdAllocator, Vec2};
    use crate::economy::{Market, MarketEntry};
    use crate::world::galaxy::{Station, StarSystem};

    fn galaxy_with_station(config: &SimulationConfig) -> Galaxy {
        let mut galaxy = Galaxy::empty(config);
        let mut ids = IdAllocator::new();
        let mut system = StarSystem::new(ids.next_id(), "Test", Vec2::new(1000.0, 1000.0), 80.0, 300.0);
        let mut market = Market::new();
        market.insert("ore", MarketEntry { stock: 20, price: 10, base_price: 10, base_stock: 40 });
        market.insert("fuel", MarketEntry { stock: 5, price: 30, base_price: 30, base_stock: 10 });
        system.stations.push(Station {
            id: EntityId(7),
            name: "Dock".into(),
            pos: Vec2::new(1500.0, 1000.0),
            radius: 40.0,
            market,
        });
        galaxy.add_system(system);
        galaxy
    }

    #[test]
    fn test_save_then_load_keeps_records() {
        let config = SimulationConfig::default();
        let galaxy = galaxy_with_station(&config);
        let json = save_markets(&galaxy).unwrap();
        let table = load_markets(&json).unwrap();
        let lines = &table[&EntityId(7)];
        assert_eq!(lines["ore"], MarketLine { stock: Some(20), price: 10 });
        assert_eq!(lines["fuel"], MarketLine { stock: Some(5), price: 30 });
    }

    #[test]
    fn test_legacy_forms_in_one_reader() {
        let config = SimulationConfig::default();
        let mut galaxy = galaxy_with_station(&config);
        let json = r##"{"#7": {"ore": [3, 11], "fuel": 29}}"##;
        let table = load_markets(json).unwrap();
        assert_eq!(table[&EntityId(7)]["ore"], MarketLine { stock: Some(3), price: 11 });
        assert_eq!(table[&EntityId(7)]["fuel"], MarketLine { stock: None, price: 29 });

        assert_eq!(apply_markets(&mut galaxy, &table, &config), 1);
        let market = &galaxy.station(EntityId(7)).unwrap().market;
        assert_eq!(market.stock("ore"), 3);
        assert_eq!(market.price("ore"), Some(11));
        // Bare price keeps the stock the station already had
        assert_eq!(market.stock("fuel"), 5);
        assert_eq!(market.price("fuel"), Some(29));
    }

    #[test]
    fn test_loaded_prices_are_reclamped() {
        let config = SimulationConfig::default();
        let mut galaxy = galaxy_with_station(&config);
        let table = load_markets(r#"{"version": 2, "payload": {"7": {"ore": {"stock": 1, "price": 100000}}}}"#).unwrap();
        apply_markets(&mut galaxy, &table, &config);
        let price = galaxy.station(EntityId(7)).unwrap().market.price("ore").unwrap();
        assert!(price as f32 <= 10.0 * config.station_max_price_mult);
    }

    #[test]
    fn test_rejects_bad_market_documents() {
        for bad in [
            r#"{"version": 9, "payload": {}}"#,
            r#"{"station": {"ore": 1}}"#,
            r#"{"7": {"ore": "cheap"}}"#,
            r#"{"7": {"ore": [1, 2, 3]}}"#,
            r#"{"7": {"ore": {"stock": 4}}}"#,
            r#"{"7": [1, 2]}"#,
        ] {
            assert!(matches!(load_markets(bad), Err(SimError::BadPersistence(_))), "accepted {}", bad);
        }
    }
}
