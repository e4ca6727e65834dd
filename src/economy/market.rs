//! Station market - per-station stock and fluctuating prices

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::config::SimulationConfig;
use crate::economy::catalog::ItemCatalog;

/// One tradeable line in a station market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub stock: u32,
    pub price: u32,
    pub base_price: u32,
    pub base_stock: u32,
}

/// Persisted form of a market line: `{stock, price}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub stock: u32,
    pub price: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("item '{0}' is not traded here")]
    UnknownItem(String),
    #[error("only {available} in stock")]
    OutOfStock { available: u32 },
    #[error("need {needed} credits, have {available}")]
    InsufficientCredits { needed: u32, available: u32 },
}

/// What happened during a market tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketTick {
    pub prices_updated: bool,
    pub restocked: bool,
}

/// A station's market: item -> (stock, price)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    entries: BTreeMap<String, MarketEntry>,
    price_timer: f32,
    restock_timer: f32,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stock a market from the catalog with a little per-station variance
    pub fn from_catalog<R: Rng>(catalog: &ItemCatalog, config: &SimulationConfig, rng: &mut R) -> Self {
        let mut market = Self::new();
        for item in &catalog.items {
            let variance = rng.gen_range(0.75..=1.25f32);
            let stock = (item.base_stock as f32 * variance).round() as u32;
            let (lo, hi) = price_bounds(item.base_price, config);
            let price = ((item.base_price as f32) * variance).round() as u32;
            market.entries.insert(
                item.name.clone(),
                MarketEntry {
                    stock,
                    price: price.clamp(lo, hi),
                    base_price: item.base_price,
                    base_stock: item.base_stock,
                },
            );
        }
        market
    }

    /// Add or replace an item line
    pub fn insert(&mut self, item: &str, entry: MarketEntry) {
        self.entries.insert(item.to_string(), entry);
    }

    pub fn entry(&self, item: &str) -> Option<&MarketEntry> {
        self.entries.get(item)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &MarketEntry)> {
        self.entries.iter()
    }

    pub fn price(&self, item: &str) -> Option<u32> {
        self.entries.get(item).map(|e| e.price)
    }

    pub fn stock(&self, item: &str) -> u32 {
        self.entries.get(item).map(|e| e.stock).unwrap_or(0)
    }

    /// Advance timers; walk prices each update period and restock on schedule
    pub fn tick<R: Rng>(&mut self, dt: f32, config: &SimulationConfig, rng: &mut R) -> MarketTick {
        let mut result = MarketTick::default();

        self.price_timer += dt;
        if self.price_timer >= config.station_price_update_period {
            self.price_timer -= config.station_price_update_period;
            // A long dt never queues a burst of walks
            self.price_timer = self.price_timer.min(config.station_price_update_period);
            let fluct = config.station_price_fluct;
            for entry in self.entries.values_mut() {
                let fraction = if fluct > 0.0 { rng.gen_range(-fluct..=fluct) } else { 0.0 };
                let walked = (entry.price as f32 * (1.0 + fraction)).round().max(0.0) as u32;
                let (lo, hi) = price_bounds(entry.base_price, config);
                entry.price = walked.clamp(lo, hi);
            }
            result.prices_updated = true;
        }

        self.restock_timer += dt;
        if self.restock_timer >= config.station_restock_time {
            self.restock_timer = 0.0;
            for entry in self.entries.values_mut() {
                if entry.stock < entry.base_stock {
                    entry.stock = entry.base_stock;
                    result.restocked = true;
                }
            }
        }

        result
    }

    /// Buy `qty` units; returns the total cost charged
    pub fn buy(&mut self, item: &str, qty: u32, credits: u32) -> Result<u32, TradeError> {
        let entry = self
            .entries
            .get_mut(item)
            .ok_or_else(|| TradeError::UnknownItem(item.to_string()))?;
        if entry.stock < qty {
            return Err(TradeError::OutOfStock { available: entry.stock });
        }
        let cost = entry.price.saturating_mul(qty);
        if cost > credits {
            return Err(TradeError::InsufficientCredits { needed: cost, available: credits });
        }
        entry.stock -= qty;
        Ok(cost)
    }

    /// Sell `qty` units; returns the credits paid out
    pub fn sell(&mut self, item: &str, qty: u32) -> Result<u32, TradeError> {
        let entry = self
            .entries
            .get_mut(item)
            .ok_or_else(|| TradeError::UnknownItem(item.to_string()))?;
        entry.stock = entry.stock.saturating_add(qty);
        Ok(entry.price.saturating_mul(qty))
    }

    /// Persisted view of every line
    pub fn records(&self) -> BTreeMap<String, MarketRecord> {
        self.entries
            .iter()
            .map(|(name, e)| (name.clone(), MarketRecord { stock: e.stock, price: e.price }))
            .collect()
    }

    /// Apply persisted records; unknown items are ignored, prices re-clamped
    pub fn apply_records(&mut self, records: &BTreeMap<String, MarketRecord>, config: &SimulationConfig) {
        for (name, record) in records {
            if let Some(entry) = self.entries.get_mut(name) {
                let (lo, hi) = price_bounds(entry.base_price, config);
                entry.stock = record.stock;
                entry.price = record.price.clamp(lo, hi);
            }
        }
    }
}

/// Integer price bounds `[ceil(base·min), floor(base·max)]`
///
/// Config validation guarantees `min ≤ 1 ≤ max`, so `base` itself is always
/// inside the bounds.
pub fn price_bounds(base_price: u32, config: &SimulationConfig) -> (u32, u32) {
    let lo = (base_price as f32 * config.station_min_price_mult).ceil() as u32;
    let hi = (base_price as f32 * config.station_max_price_mult).floor() as u32;
    (lo, hi.max(lo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_market() -> Market {
        let mut market = Market::new();
        market.insert("ore", MarketEntry { stock: 10, price: 12, base_price: 12, base_stock: 40 });
        market
    }

    #[test]
    fn test_buy_and_sell() {
        let mut market = test_market();
        assert_eq!(market.buy("ore", 2, 100), Ok(24));
        assert_eq!(market.stock("ore"), 8);
        assert_eq!(market.sell("ore", 3), Ok(36));
        assert_eq!(market.stock("ore"), 11);
    }

    #[test]
    fn test_trade_errors() {
        let mut market = test_market();
        assert_eq!(market.buy("gold", 1, 100), Err(TradeError::UnknownItem("gold".into())));
        assert_eq!(market.buy("ore", 50, 10_000), Err(TradeError::OutOfStock { available: 10 }));
        assert_eq!(
            market.buy("ore", 5, 10),
            Err(TradeError::InsufficientCredits { needed: 60, available: 10 })
        );
        // Failed trades leave stock alone
        assert_eq!(market.stock("ore"), 10);
    }

    #[test]
    fn test_prices_stay_clamped() {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut market = test_market();
        let (lo, hi) = price_bounds(12, &config);
        for _ in 0..2000 {
            market.tick(0.5, &config, &mut rng);
            let price = market.price("ore").unwrap();
            assert!(price >= lo && price <= hi);
            assert!(price as f32 >= 12.0 * config.station_min_price_mult);
            assert!(price as f32 <= 12.0 * config.station_max_price_mult);
        }
    }

    #[test]
    fn test_price_walk_waits_for_period() {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut market = test_market();
        let tick = market.tick(config.station_price_update_period * 0.5, &config, &mut rng);
        assert!(!tick.prices_updated);
        let tick = market.tick(config.station_price_update_period * 0.6, &config, &mut rng);
        assert!(tick.prices_updated);
    }

    #[test]
    fn test_restock_replenishes_depleted_entries() {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut market = test_market();
        let tick = market.tick(config.station_restock_time, &config, &mut rng);
        assert!(tick.restocked);
        assert_eq!(market.stock("ore"), 40);
    }

    #[test]
    fn test_records_round_trip() {
        let config = SimulationConfig::default();
        let mut market = test_market();
        let mut records = market.records();
        records.get_mut("ore").unwrap().stock = 3;
        market.apply_records(&records, &config);
        assert_eq!(market.stock("ore"), 3);
        assert_eq!(market.records(), records);
    }
}
