use std::fmt;

use construction_schema::{Faction, Position, UnitTypeId};
use serde::{Deserialize, Serialize};

/// Identifier of a live game entity (worker, building, egg, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read access to the live game, plus the one command the construction layer issues.
///
/// Every method must answer immediately from already-known state. Units may
/// die, change type or vanish between two calls; callers treat each answer as
/// valid for the current tick only.
pub trait GameState: Send + Sync {
    fn faction(&self) -> Faction;

    fn supply_used(&self) -> u32;

    fn exists(&self, unit: UnitId) -> bool;

    fn unit_type(&self, unit: UnitId) -> Option<UnitTypeId>;

    fn position(&self, unit: UnitId) -> Option<Position>;

    fn is_moving(&self, unit: UnitId) -> bool;

    fn is_completed(&self, unit: UnitId) -> bool;

    /// Worker currently performing a build action.
    fn is_constructing(&self, unit: UnitId) -> bool;

    /// Type the unit is currently building; `None` when it builds nothing.
    fn build_type(&self, unit: UnitId) -> Option<UnitTypeId>;

    /// Building entity the unit is currently working on.
    fn build_unit(&self, unit: UnitId) -> Option<UnitId>;

    /// Our workers that are idle or gathering and could be sent to build.
    fn free_workers(&self) -> Vec<UnitId>;

    fn incomplete_units_of_type(&self, unit_type: &UnitTypeId) -> Vec<UnitId>;

    fn completed_units_of_type(&self, unit_type: &UnitTypeId) -> Vec<UnitId>;

    /// Asks `unit` to morph into `into`. Returns whether the game accepted it.
    fn request_morph(&self, unit: UnitId, into: &UnitTypeId) -> bool;
}
