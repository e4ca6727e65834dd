//! Item catalog - tradeable goods, recipes and the tech tree
//!
//! The catalog is load-time data. Validation rejects recipes that name unknown
//! items and tech trees with dangling or cyclic prerequisites, so a bad data file
//! stops the simulation before the first tick.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::core::error::{Result, SimError};

/// A tradeable good
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    pub base_price: u32,
    /// Stock a station restocks to
    #[serde(default = "default_stock")]
    pub base_stock: u32,
}

fn default_stock() -> u32 {
    40
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDef {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<(String, u32)>,
    #[serde(default)]
    pub outputs: Vec<(String, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechNode {
    pub name: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

/// Catalog of everything stations can trade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemCatalog {
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub recipes: Vec<RecipeDef>,
    #[serde(default)]
    pub tech: Vec<TechNode>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in goods used when no catalog file is supplied
    pub fn with_defaults() -> Self {
        let item = |name: &str, base_price: u32, base_stock: u32| ItemDef {
            name: name.into(),
            base_price,
            base_stock,
        };
        Self {
            items: vec![
                item("ore", 12, 60),
                item("crystal", 45, 20),
                item("fuel", 20, 50),
                item("alloy", 60, 25),
                item("food", 8, 80),
                item("medicine", 35, 30),
                item("electronics", 90, 15),
                item("rare_metals", 140, 10),
            ],
            recipes: vec![
                RecipeDef {
                    name: "refine_alloy".into(),
                    inputs: vec![("ore".into(), 3), ("fuel".into(), 1)],
                    outputs: vec![("alloy".into(), 1)],
                },
                RecipeDef {
                    name: "grow_crystal".into(),
                    inputs: vec![("rare_metals".into(), 1)],
                    outputs: vec![("crystal".into(), 2)],
                },
            ],
            tech: vec![
                TechNode { name: "basic_refining".into(), requires: vec![] },
                TechNode { name: "alloy_plating".into(), requires: vec!["basic_refining".into()] },
                TechNode { name: "star_channeling".into(), requires: vec!["alloy_plating".into()] },
            ],
        }
    }

    /// Parse and validate a TOML catalog
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: ItemCatalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn item(&self, name: &str) -> Option<&ItemDef> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Validate names, recipe references and the tech graph
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for item in &self.items {
            if !names.insert(item.name.as_str()) {
                return Err(SimError::InvalidConfig(format!("duplicate item '{}'", item.name)));
            }
            if item.base_price == 0 {
                return Err(SimError::InvalidConfig(format!("item '{}' has zero base price", item.name)));
            }
        }

        for recipe in &self.recipes {
            for (item, _) in recipe.inputs.iter().chain(recipe.outputs.iter()) {
                if !names.contains(item.as_str()) {
                    return Err(SimError::InvalidConfig(format!(
                        "recipe '{}' references unknown item '{}'",
                        recipe.name, item
                    )));
                }
            }
        }

        self.validate_tech_tree()
    }

    fn validate_tech_tree(&self) -> Result<()> {
        let graph: BTreeMap<&str, &[String]> =
            self.tech.iter().map(|t| (t.name.as_str(), t.requires.as_slice())).collect();

        for node in &self.tech {
            for req in &node.requires {
                if !graph.contains_key(req.as_str()) {
                    return Err(SimError::InvalidConfig(format!(
                        "tech '{}' requires unknown tech '{}'",
                        node.name, req
                    )));
                }
            }
        }

        // Three-colour DFS: 1 = on stack, 2 = finished
        let mut state: BTreeMap<&str, u8> = BTreeMap::new();
        for &start in graph.keys() {
            if state.get(start).copied().unwrap_or(0) != 0 {
                continue;
            }
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            state.insert(start, 1);
            while let Some((node, next)) = stack.pop() {
                let reqs: &[String] = graph.get(node).copied().unwrap_or_default();
                if next < reqs.len() {
                    stack.push((node, next + 1));
                    let child = reqs[next].as_str();
                    match state.get(child).copied().unwrap_or(0) {
                        0 => {
                            state.insert(child, 1);
                            stack.push((child, 0));
                        }
                        1 => {
                            return Err(SimError::InvalidConfig(format!(
                                "tech prerequisite cycle through '{}'",
                                child
                            )));
                        }
                        _ => {}
                    }
                } else {
                    state.insert(node, 2);
                }
            }
        }

        Ok(())
    }
}
