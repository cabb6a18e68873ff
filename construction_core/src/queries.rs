use std::collections::HashSet;
use std::sync::Arc;

use construction_schema::{ResourceCost, UnitCatalog, UnitTypeId};

use crate::config::ConstructionConfig;
use crate::doctrine::DoctrineFlags;
use crate::game::{GameState, UnitId};
use crate::orders::{ConstructionOrder, ConstructionOrderStatus};
use crate::store::ConstructionOrderStore;

/// Read-only view over the construction orders for planners.
///
/// Cheap to clone and safe to use from any thread. Every method works on a
/// single snapshot of the store, so a concurrent reconciliation pass is seen
/// either entirely or not at all.
#[derive(Clone)]
pub struct ConstructionQueries {
    store: ConstructionOrderStore,
    game: Arc<dyn GameState>,
    catalog: Arc<UnitCatalog>,
    config: Arc<ConstructionConfig>,
}

impl ConstructionQueries {
    pub fn new(
        store: ConstructionOrderStore,
        game: Arc<dyn GameState>,
        catalog: Arc<UnitCatalog>,
        config: Arc<ConstructionConfig>,
    ) -> Self {
        Self {
            store,
            game,
            catalog,
            config,
        }
    }

    fn doctrine(&self) -> DoctrineFlags {
        DoctrineFlags::for_faction(self.game.faction())
    }

    /// Whether `worker` is busy building or held by an order.
    ///
    /// Under a builder-releasing doctrine the worker of a started building
    /// no longer counts.
    pub fn is_builder(&self, worker: UnitId) -> bool {
        if self.game.is_constructing(worker) {
            return true;
        }
        let doctrine = self.doctrine();
        self.store
            .snapshot()
            .iter()
            .filter(|order| order.builder() == Some(worker))
            .any(|order| doctrine.holds_builder(order.status()))
    }

    /// Order `worker` builds for, preferring one that still holds it.
    pub fn order_for_builder(&self, worker: UnitId) -> Option<ConstructionOrder> {
        let doctrine = self.doctrine();
        let mut candidates: Vec<ConstructionOrder> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|order| order.builder() == Some(worker))
            .collect();
        let held = candidates
            .iter()
            .position(|order| doctrine.holds_builder(order.status()))
            .unwrap_or(0);
        (!candidates.is_empty()).then(|| candidates.swap_remove(held))
    }

    /// Requested but not yet visibly started orders of `unit_type`.
    pub fn count_not_started(&self, unit_type: &UnitTypeId) -> usize {
        let orders = self.store.snapshot();
        count_with_status(&orders, unit_type, ConstructionOrderStatus::NotStarted)
    }

    /// Started but unfinished orders of `unit_type`, plus in-flight entities
    /// of configured types that no order tracks.
    pub fn count_in_progress(&self, unit_type: &UnitTypeId) -> usize {
        let orders = self.store.snapshot();
        count_with_status(&orders, unit_type, ConstructionOrderStatus::InProgress)
            + self.in_flight_correction(&orders, unit_type)
    }

    /// Every unfinished instance of `unit_type`: incomplete entities in the
    /// game plus orders not yet represented by one of those entities.
    pub fn count_not_finished(&self, unit_type: &UnitTypeId) -> usize {
        let orders = self.store.snapshot();
        let incomplete: HashSet<UnitId> = self
            .game
            .incomplete_units_of_type(unit_type)
            .into_iter()
            .collect();
        let unmatched_orders = orders
            .iter()
            .filter(|order| order.building_type() == unit_type)
            .filter(|order| order.status() != ConstructionOrderStatus::Finished)
            .filter(|order| {
                order
                    .construction()
                    .map_or(true, |construction| !incomplete.contains(&construction))
            })
            .count();
        incomplete.len() + unmatched_orders
    }

    /// Not-started orders, optionally restricted to one type.
    pub fn not_started_orders(&self, unit_type: Option<&UnitTypeId>) -> Vec<ConstructionOrder> {
        self.store
            .snapshot()
            .into_iter()
            .filter(|order| order.status() == ConstructionOrderStatus::NotStarted)
            .filter(|order| unit_type.map_or(true, |ty| order.building_type() == ty))
            .collect()
    }

    pub fn all_orders(&self) -> Vec<ConstructionOrder> {
        self.store.snapshot()
    }

    /// Minerals and gas still to be spent on not-started orders.
    pub fn resources_needed(&self) -> ResourceCost {
        self.not_started_orders(None)
            .iter()
            .filter_map(|order| self.catalog.get(order.building_type()))
            .map(|definition| definition.cost())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// In-flight entities of a configured type that no order has bound.
    fn in_flight_correction(&self, orders: &[ConstructionOrder], unit_type: &UnitTypeId) -> usize {
        if !self.config.tracks_untracked_pending(unit_type) {
            return 0;
        }
        let bound: HashSet<UnitId> = orders
            .iter()
            .filter_map(ConstructionOrder::construction)
            .collect();
        let extra = self
            .game
            .incomplete_units_of_type(unit_type)
            .into_iter()
            .filter(|unit| !bound.contains(unit))
            .count();
        if extra > 0 {
            tracing::trace!(
                target: "construction::queries",
                unit_type = %unit_type,
                extra,
                "construction.count.in_flight_correction"
            );
        }
        extra
    }
}

fn count_with_status(
    orders: &[ConstructionOrder],
    unit_type: &UnitTypeId,
    status: ConstructionOrderStatus,
) -> usize {
    orders
        .iter()
        .filter(|order| order.status() == status && order.building_type() == unit_type)
        .count()
}
