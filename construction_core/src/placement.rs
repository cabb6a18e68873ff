use construction_schema::{Position, UnitTypeId};
use thiserror::Error;

use crate::game::UnitId;
use crate::orders::SearchRadius;

/// Why the placement search gave up. `reason` names the condition that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no valid position: {reason}")]
pub struct PlacementFailure {
    pub reason: String,
}

impl PlacementFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Build-location search. Treated as a black box by the manager.
pub trait PlacementFinder: Send + Sync {
    fn find_position(
        &self,
        builder: UnitId,
        building: &UnitTypeId,
        near: Option<Position>,
        radius: SearchRadius,
    ) -> Result<Position, PlacementFailure>;
}
