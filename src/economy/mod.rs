//! Station economy: item catalog and per-station markets

pub mod catalog;
pub mod market;

pub use catalog::{ItemCatalog, ItemDef, RecipeDef, TechNode};
pub use market::{price_bounds, Market, MarketEntry, MarketRecord, MarketTick, TradeError};
