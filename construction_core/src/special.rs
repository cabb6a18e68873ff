use construction_schema::UnitTypeDefinition;
use tracing::{debug, info};

use crate::game::GameState;
use crate::orders::PlanHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialHandling {
    /// Not a special building; build it through a regular order.
    Declined,
    /// Fully handled; no order is created.
    Claimed,
    /// Special building, but nothing can produce it right now.
    Unavailable,
}

/// Hook consulted before a regular construction order is created.
pub trait SpecialConstructionHandler: Send + Sync {
    fn handle(
        &self,
        game: &dyn GameState,
        building: &UnitTypeDefinition,
        plan: Option<PlanHandle>,
    ) -> SpecialHandling;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpecialHandling;

impl SpecialConstructionHandler for NoSpecialHandling {
    fn handle(
        &self,
        _game: &dyn GameState,
        _building: &UnitTypeDefinition,
        _plan: Option<PlanHandle>,
    ) -> SpecialHandling {
        SpecialHandling::Declined
    }
}

/// Builds structures that morph out of an existing completed unit
/// (`morphs_from` in the catalog) by asking one such unit to morph.
#[derive(Debug, Clone, Copy, Default)]
pub struct MorphHandler;

impl SpecialConstructionHandler for MorphHandler {
    fn handle(
        &self,
        game: &dyn GameState,
        building: &UnitTypeDefinition,
        plan: Option<PlanHandle>,
    ) -> SpecialHandling {
        let Some(source) = building.morphs_from.as_ref() else {
            return SpecialHandling::Declined;
        };

        let candidates = game.completed_units_of_type(source);
        for unit in candidates {
            if game.build_type(unit).is_some() {
                continue;
            }
            if game.request_morph(unit, &building.id) {
                info!(
                    target: "construction::special",
                    building = %building.id,
                    source = %source,
                    unit = %unit,
                    plan = ?plan,
                    "construction.morph.requested"
                );
                return SpecialHandling::Claimed;
            }
        }

        debug!(
            target: "construction::special",
            building = %building.id,
            source = %source,
            "construction.morph.no_source"
        );
        SpecialHandling::Unavailable
    }
}
