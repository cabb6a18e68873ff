//! Construction-order lifecycle for a real-time strategy bot.
//!
//! Turns "build a structure of type T" into a tracked [`ConstructionOrder`],
//! binds a worker and a site to it and follows it through
//! not-started → in-progress → finished on every [`ConstructionManager::update`],
//! recovering when its worker dies, changes type or merges into the building.

mod config;
mod doctrine;
mod game;
mod manager;
mod orders;
mod placement;
mod planner;
mod queries;
pub mod sandbox;
mod special;
mod store;
pub mod systems;
mod telemetry;

use bevy::prelude::*;

pub use config::{
    load_construction_config_from_env, ConstructionConfig, ConstructionConfigError,
    BUILTIN_CONSTRUCTION_CONFIG, CONSTRUCTION_CONFIG_ENV,
};
pub use construction_schema::{
    Faction, Position, ResourceCost, UnitCatalog, UnitCategory, UnitTypeDefinition, UnitTypeId,
};
pub use doctrine::DoctrineFlags;
pub use game::{GameState, UnitId};
pub use manager::{ConstructionError, ConstructionManager, RequestOutcome};
pub use orders::{ConstructionOrder, ConstructionOrderStatus, OrderId, PlanHandle, SearchRadius};
pub use placement::{PlacementFailure, PlacementFinder};
pub use planner::{ChannelPlanner, NullPlanner, PlannerNotice, ProductionPlanner};
pub use queries::ConstructionQueries;
pub use special::{MorphHandler, NoSpecialHandling, SpecialConstructionHandler, SpecialHandling};
pub use store::ConstructionOrderStore;
pub use telemetry::{CancelReason, ConstructionTelemetry, TickReport};

/// Construct a Bevy [`App`] that reconciles `manager` once per update.
pub fn build_headless_app(manager: ConstructionManager) -> App {
    let mut app = App::new();

    app.insert_resource(manager)
        .insert_resource(ConstructionTelemetry::default())
        .add_plugins(MinimalPlugins)
        .add_systems(Update, systems::reconcile_constructions);

    app
}

/// Execute a single construction tick.
pub fn run_tick(app: &mut App) {
    app.update();
}
