//! Shared data contracts for the construction lifecycle crates.
//!
//! Nothing in here depends on the ECS runtime; `construction_core` and the
//! tooling both build on these plain serde types.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

mod catalog;

pub use catalog::{CatalogError, UnitCatalog, BUILTIN_UNIT_CATALOG};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Terran,
    Protoss,
    Zerg,
}

impl Faction {
    pub const ALL: [Faction; 3] = [Faction::Terran, Faction::Protoss, Faction::Zerg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Faction::Terran => "terran",
            Faction::Protoss => "protoss",
            Faction::Zerg => "zerg",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a unit or building type, e.g. `terran_barracks`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitTypeId(pub String);

impl UnitTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitTypeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Worker,
    Structure,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTypeDefinition {
    pub id: UnitTypeId,
    pub faction: Faction,
    pub category: UnitCategory,
    #[serde(default)]
    pub mineral_cost: u32,
    #[serde(default)]
    pub gas_cost: u32,
    /// Structures produced by morphing an existing completed unit rather
    /// than by a worker on an empty site.
    #[serde(default)]
    pub morphs_from: Option<UnitTypeId>,
}

impl UnitTypeDefinition {
    pub fn is_structure(&self) -> bool {
        self.category == UnitCategory::Structure
    }

    pub fn is_worker(&self) -> bool {
        self.category == UnitCategory::Worker
    }

    pub fn cost(&self) -> ResourceCost {
        ResourceCost::new(self.mineral_cost, self.gas_cost)
    }
}

/// Build-tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceCost {
    pub minerals: u32,
    pub gas: u32,
}

impl ResourceCost {
    pub const ZERO: ResourceCost = ResourceCost {
        minerals: 0,
        gas: 0,
    };

    pub const fn new(minerals: u32, gas: u32) -> Self {
        Self { minerals, gas }
    }
}

impl Add for ResourceCost {
    type Output = ResourceCost;

    fn add(self, rhs: ResourceCost) -> ResourceCost {
        ResourceCost {
            minerals: self.minerals.saturating_add(rhs.minerals),
            gas: self.gas.saturating_add(rhs.gas),
        }
    }
}

impl AddAssign for ResourceCost {
    fn add_assign(&mut self, rhs: ResourceCost) {
        *self = *self + rhs;
    }
}

impl Sum for ResourceCost {
    fn sum<I: Iterator<Item = ResourceCost>>(iter: I) -> Self {
        iter.fold(ResourceCost::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_costs_sum_per_component() {
        let total: ResourceCost = [ResourceCost::new(100, 0), ResourceCost::new(150, 100)]
            .into_iter()
            .sum();
        assert_eq!(total, ResourceCost::new(250, 100));
    }

    #[test]
    fn position_distance_is_euclidean() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.distance_to(Position::new(3, 4)), 5.0);
        assert_eq!(origin.offset(2, -1), Position::new(2, -1));
    }

    #[test]
    fn faction_serializes_snake_case() {
        let json = serde_json::to_string(&Faction::Protoss).unwrap();
        assert_eq!(json, "\"protoss\"");
        let parsed: Faction = serde_json::from_str("\"zerg\"").unwrap();
        assert_eq!(parsed, Faction::Zerg);
    }
}
