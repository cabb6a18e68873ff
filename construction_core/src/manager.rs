use std::collections::HashSet;
use std::sync::Arc;

use bevy::prelude::Resource;
use construction_schema::{Position, UnitCatalog, UnitTypeId};
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ConstructionConfig;
use crate::doctrine::DoctrineFlags;
use crate::game::{GameState, UnitId};
use crate::orders::{ConstructionOrder, ConstructionOrderStatus, OrderId, PlanHandle};
use crate::placement::PlacementFinder;
use crate::planner::{NullPlanner, ProductionPlanner};
use crate::queries::ConstructionQueries;
use crate::special::{NoSpecialHandling, SpecialConstructionHandler, SpecialHandling};
use crate::store::ConstructionOrderStore;
use crate::telemetry::{CancelReason, TickReport};

/// Why a construction request did not produce an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("cannot construct `{building}`: {reason}")]
    InvalidRequest { building: UnitTypeId, reason: String },
    #[error("no worker available to build `{building}`")]
    NoBuilderAvailable { building: UnitTypeId },
    #[error("no position found for `{building}`: {reason}")]
    PlacementNotFound { building: UnitTypeId, reason: String },
}

impl ConstructionError {
    /// Whether asking again on a later tick can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ConstructionError::InvalidRequest { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Enqueued(OrderId),
    /// A special-case handler built it without an order.
    HandledSpecially,
}

enum OrderFate {
    Keep,
    Finished,
    Cancelled(CancelReason),
}

/// Per-pass facts shared by every order.
struct PassContext {
    doctrine: DoctrineFlags,
    worker_type: Option<UnitTypeId>,
    booked: HashSet<UnitId>,
}

/// Turns construction requests into tracked orders and drives them to completion.
///
/// The manager is the only writer of its [`ConstructionOrderStore`]; planners
/// read through [`ConstructionQueries`]. Requests and ticks both take
/// `&mut self`, so an order added between two ticks is always visited by the
/// next pass. Readers on other threads holding a cloned query handle may see
/// a new order before or after any given pass; nothing should rely on which.
#[derive(Resource)]
pub struct ConstructionManager {
    game: Arc<dyn GameState>,
    finder: Arc<dyn PlacementFinder>,
    planner: Arc<dyn ProductionPlanner>,
    special: Box<dyn SpecialConstructionHandler>,
    catalog: Arc<UnitCatalog>,
    config: Arc<ConstructionConfig>,
    store: ConstructionOrderStore,
    queries: ConstructionQueries,
    next_order_id: u64,
    tick: u64,
    rng: SmallRng,
    /// Cancelled through [`ConstructionManager::cancel`] since the last pass.
    pending_cancels: Vec<(OrderId, CancelReason)>,
}

impl ConstructionManager {
    pub fn new(
        game: Arc<dyn GameState>,
        finder: Arc<dyn PlacementFinder>,
        catalog: Arc<UnitCatalog>,
        config: Arc<ConstructionConfig>,
    ) -> Self {
        let store = ConstructionOrderStore::new();
        let queries = ConstructionQueries::new(
            store.clone(),
            Arc::clone(&game),
            Arc::clone(&catalog),
            Arc::clone(&config),
        );
        let rng = SmallRng::seed_from_u64(config.builder_pick_seed);
        Self {
            game,
            finder,
            planner: Arc::new(NullPlanner),
            special: Box::new(NoSpecialHandling),
            catalog,
            config,
            store,
            queries,
            next_order_id: 1,
            tick: 0,
            rng,
            pending_cancels: Vec::new(),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn ProductionPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_special_handler(mut self, handler: Box<dyn SpecialConstructionHandler>) -> Self {
        self.special = handler;
        self
    }

    pub fn queries(&self) -> &ConstructionQueries {
        &self.queries
    }

    pub fn store(&self) -> &ConstructionOrderStore {
        &self.store
    }

    pub fn config(&self) -> &Arc<ConstructionConfig> {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Requests one building of `building`, picking a builder and a site for it.
    pub fn request_construction(
        &mut self,
        building: &UnitTypeId,
        plan: Option<PlanHandle>,
        near: Option<Position>,
    ) -> Result<RequestOutcome, ConstructionError> {
        let definition = self.catalog.get(building).cloned().ok_or_else(|| {
            ConstructionError::InvalidRequest {
                building: building.clone(),
                reason: "unknown unit type".to_string(),
            }
        })?;
        if !definition.is_structure() {
            return Err(ConstructionError::InvalidRequest {
                building: building.clone(),
                reason: format!("{:?} is not a structure", definition.category),
            });
        }

        match self.special.handle(self.game.as_ref(), &definition, plan) {
            SpecialHandling::Claimed => return Ok(RequestOutcome::HandledSpecially),
            SpecialHandling::Unavailable => {
                return Err(ConstructionError::NoBuilderAvailable {
                    building: building.clone(),
                })
            }
            SpecialHandling::Declined => {}
        }

        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        let mut order = ConstructionOrder::new(id, building.clone());
        order.set_linked_plan(plan);
        order.set_near_to(near);
        order.set_max_distance(self.config.search_radius());

        let doctrine = DoctrineFlags::for_faction(self.game.faction());
        let booked = booked_builders(&self.store.snapshot(), doctrine);

        let Some(provisional) = self.pick_any_builder(&booked) else {
            let supply = self.game.supply_used();
            if supply >= self.config.builder_warning_supply {
                warn!(
                    target: "construction::manager",
                    building = %building,
                    supply,
                    "construction.request.no_builder"
                );
            } else {
                debug!(
                    target: "construction::manager",
                    building = %building,
                    supply,
                    "construction.request.no_builder"
                );
            }
            return Err(ConstructionError::NoBuilderAvailable {
                building: building.clone(),
            });
        };
        order.assign_builder(provisional);

        let position = self
            .finder
            .find_position(provisional, building, near, order.max_distance())
            .map_err(|failure| {
                warn!(
                    target: "construction::manager",
                    building = %building,
                    reason = %failure.reason,
                    "construction.request.placement_failed"
                );
                ConstructionError::PlacementNotFound {
                    building: building.clone(),
                    reason: failure.reason,
                }
            })?;
        order.set_position_to_build(Some(position));

        let builder = self
            .pick_optimal_builder(Some(position), &booked)
            .unwrap_or(provisional);
        order.assign_builder(builder);

        info!(
            target: "construction::manager",
            order = %id,
            building = %building,
            builder = %builder,
            x = position.x,
            y = position.y,
            "construction.request.enqueued"
        );
        self.store.add(order.clone());
        self.planner.pending_queue_changed(&order);
        Ok(RequestOutcome::Enqueued(id))
    }

    /// Drops an order. Returns `false` when it was not in the store.
    ///
    /// The cancellation shows up in the next pass's [`TickReport`].
    pub fn cancel(&mut self, id: OrderId) -> bool {
        match self.store.remove(id) {
            Some(order) => {
                info!(
                    target: "construction::manager",
                    order = %id,
                    building = %order.building_type(),
                    status = order.status().as_str(),
                    reason = ?CancelReason::Requested,
                    "construction.order.cancelled"
                );
                self.pending_cancels.push((id, CancelReason::Requested));
                true
            }
            None => false,
        }
    }

    /// Forgets the site of an order that has not started yet, e.g. because
    /// the ground turned out to be blocked. The next pass in which its
    /// builder stands still asks the placement finder again.
    pub fn invalidate_site(&mut self, id: OrderId) -> bool {
        let mut invalidated = false;
        self.store.modify(id, |order| {
            if order.construction().is_none() {
                order.set_position_to_build(None);
                invalidated = true;
            }
        });
        if invalidated {
            debug!(
                target: "construction::manager",
                order = %id,
                "construction.order.site_invalidated"
            );
        }
        invalidated
    }

    /// One reconciliation pass over every order.
    ///
    /// A second pass without any change in the game reports nothing and
    /// leaves the orders as they were, with one exception: an order waiting
    /// for a dedicated builder counts the pass towards
    /// `max_builderless_ticks` and is cancelled once that runs out.
    pub fn update(&mut self) -> TickReport {
        self.tick = self.tick.wrapping_add(1);
        let mut report = TickReport::new(self.tick);
        report.cancelled.append(&mut self.pending_cancels);

        let faction = self.game.faction();
        let doctrine = DoctrineFlags::for_faction(faction);
        let working = self.store.snapshot();
        let mut ctx = PassContext {
            doctrine,
            worker_type: self.catalog.worker_for(faction).cloned(),
            booked: booked_builders(&working, doctrine),
        };

        let mut retained = Vec::with_capacity(working.len());
        for mut order in working {
            match self.reconcile_order(&mut order, &mut ctx, &mut report) {
                OrderFate::Keep => retained.push(order),
                OrderFate::Finished => {
                    info!(
                        target: "construction::manager",
                        order = %order.id(),
                        building = %order.building_type(),
                        "construction.order.finished"
                    );
                    release_booking(&mut ctx, &order);
                    report.finished.push(order.id());
                }
                OrderFate::Cancelled(reason) => {
                    info!(
                        target: "construction::manager",
                        order = %order.id(),
                        building = %order.building_type(),
                        status = order.status().as_str(),
                        reason = ?reason,
                        "construction.order.cancelled"
                    );
                    release_booking(&mut ctx, &order);
                    report.cancelled.push((order.id(), reason));
                }
            }
        }

        self.store.publish(retained);
        report
    }

    fn reconcile_order(
        &self,
        order: &mut ConstructionOrder,
        ctx: &mut PassContext,
        report: &mut TickReport,
    ) -> OrderFate {
        self.revalidate_references(order, ctx);

        // Builder health.
        if order.builder().is_none() && ctx.doctrine.contains(DoctrineFlags::DEDICATED_BUILDER) {
            if let Some(builder) = self.pick_optimal_builder(order.anchor(), &ctx.booked) {
                order.assign_builder(builder);
                ctx.booked.insert(builder);
                report.reassigned.push((order.id(), builder));
                info!(
                    target: "construction::manager",
                    order = %order.id(),
                    builder = %builder,
                    "construction.builder.reassigned"
                );
            }
        }

        if order.construction().is_none() {
            self.bind_construction(order, ctx);
        }

        if ctx.doctrine.contains(DoctrineFlags::METAMORPHOSIS)
            && order.status() == ConstructionOrderStatus::NotStarted
        {
            let became_building = order
                .builder()
                .and_then(|builder| self.game.unit_type(builder))
                .is_some_and(|unit_type| &unit_type == order.building_type());
            if became_building && order.advance_status(ConstructionOrderStatus::InProgress) {
                report.started.push(order.id());
            }
        }

        if let Some(construction) = order.construction() {
            if self.game.is_completed(construction) {
                order.advance_status(ConstructionOrderStatus::Finished);
                return OrderFate::Finished;
            }
            if order.advance_status(ConstructionOrderStatus::InProgress) {
                report.started.push(order.id());
            }
        } else if let Some(builder) = order.builder() {
            if !self.game.is_moving(builder) && order.position_to_build().is_none() {
                self.reposition(order, builder, report);
            }
        }

        if order.is_orphaned() {
            let awaiting_builder = ctx.doctrine.contains(DoctrineFlags::DEDICATED_BUILDER)
                && order.position_to_build().is_some()
                && order.builderless_passes() < self.config.max_builderless_ticks;
            if awaiting_builder {
                let passes = order.note_builderless_pass();
                debug!(
                    target: "construction::manager",
                    order = %order.id(),
                    passes,
                    "construction.builder.awaiting"
                );
                return OrderFate::Keep;
            }
            return OrderFate::Cancelled(CancelReason::Orphaned);
        }

        order.reset_builderless_passes();
        OrderFate::Keep
    }

    /// Forgets references to entities that no longer exist.
    fn revalidate_references(&self, order: &mut ConstructionOrder, ctx: &mut PassContext) {
        if let Some(builder) = order.builder() {
            if !self.game.exists(builder) {
                order.clear_builder();
                ctx.booked.remove(&builder);
                debug!(
                    target: "construction::manager",
                    order = %order.id(),
                    builder = %builder,
                    "construction.builder.lost"
                );
            }
        }
        if let Some(construction) = order.construction() {
            if !self.game.exists(construction) {
                order.clear_construction();
                debug!(
                    target: "construction::manager",
                    order = %order.id(),
                    construction = %construction,
                    "construction.building.lost"
                );
            }
        }
    }

    /// Looks at the builder to find the building entity this order produced.
    fn bind_construction(&self, order: &mut ConstructionOrder, ctx: &PassContext) {
        let Some(builder) = order.builder() else {
            return;
        };
        let Some(builder_type) = self.game.unit_type(builder) else {
            return;
        };

        let is_worker = ctx.worker_type.as_ref() == Some(&builder_type);
        let bound = if !is_worker {
            // The builder itself became the building.
            self.game.build_type(builder).is_none().then_some(builder)
        } else {
            self.game.build_unit(builder)
        };

        if let Some(construction) = bound {
            order.bind_construction(construction);
            debug!(
                target: "construction::manager",
                order = %order.id(),
                construction = %construction,
                metamorphosis = construction == builder,
                "construction.building.bound"
            );
        }
    }

    fn reposition(&self, order: &mut ConstructionOrder, builder: UnitId, report: &mut TickReport) {
        match self.finder.find_position(
            builder,
            order.building_type(),
            order.near_to(),
            order.max_distance(),
        ) {
            Ok(position) => {
                order.set_position_to_build(Some(position));
                report.repositioned.push(order.id());
                debug!(
                    target: "construction::manager",
                    order = %order.id(),
                    x = position.x,
                    y = position.y,
                    "construction.order.repositioned"
                );
            }
            Err(failure) => {
                debug!(
                    target: "construction::manager",
                    order = %order.id(),
                    reason = %failure.reason,
                    "construction.order.reposition_failed"
                );
            }
        }
    }

    fn pick_any_builder(&mut self, booked: &HashSet<UnitId>) -> Option<UnitId> {
        let candidates: Vec<UnitId> = self
            .game
            .free_workers()
            .into_iter()
            .filter(|worker| !booked.contains(worker))
            .collect();
        candidates.choose(&mut self.rng).copied()
    }

    /// Closest free, unbooked worker to `anchor`; the first one without an anchor.
    fn pick_optimal_builder(
        &self,
        anchor: Option<Position>,
        booked: &HashSet<UnitId>,
    ) -> Option<UnitId> {
        let candidates = self
            .game
            .free_workers()
            .into_iter()
            .filter(|worker| !booked.contains(worker));
        let Some(anchor) = anchor else {
            return candidates.min();
        };
        candidates
            .filter_map(|worker| {
                self.game
                    .position(worker)
                    .map(|position| (worker, position.distance_to(anchor)))
            })
            .min_by(|(a_id, a), (b_id, b)| a.total_cmp(b).then(a_id.cmp(b_id)))
            .map(|(worker, _)| worker)
    }
}

fn booked_builders(orders: &[ConstructionOrder], doctrine: DoctrineFlags) -> HashSet<UnitId> {
    orders
        .iter()
        .filter(|order| doctrine.holds_builder(order.status()))
        .filter_map(ConstructionOrder::builder)
        .collect()
}

fn release_booking(ctx: &mut PassContext, order: &ConstructionOrder) {
    if let Some(builder) = order.builder() {
        ctx.booked.remove(&builder);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use construction_schema::Faction;

    use super::*;
    use crate::planner::{ChannelPlanner, PlannerNotice};
    use crate::sandbox::{SandboxGame, SandboxPlacementFinder};
    use crate::special::MorphHandler;
    use crate::telemetry::ConstructionTelemetry;

    struct Fixture {
        game: Arc<SandboxGame>,
        finder: Arc<SandboxPlacementFinder>,
        manager: ConstructionManager,
    }

    fn fixture(faction: Faction) -> Fixture {
        let game = Arc::new(SandboxGame::new(faction));
        let finder = Arc::new(SandboxPlacementFinder::new(Arc::clone(&game)));
        let manager = ConstructionManager::new(
            game.clone(),
            finder.clone(),
            UnitCatalog::builtin(),
            Arc::new(ConstructionConfig::default()),
        );
        Fixture {
            game,
            finder,
            manager,
        }
    }

    fn ty(id: &str) -> UnitTypeId {
        UnitTypeId::from(id)
    }

    fn enqueue(fx: &mut Fixture, building: &str, near: Option<Position>) -> ConstructionOrder {
        let outcome = fx
            .manager
            .request_construction(&ty(building), None, near)
            .expect("request should succeed");
        let RequestOutcome::Enqueued(id) = outcome else {
            panic!("expected an order, got {outcome:?}");
        };
        fx.manager.store().get(id).expect("order stored")
    }

    #[test]
    fn non_structures_are_invalid_requests() {
        let mut fx = fixture(Faction::Terran);
        fx.game.spawn_worker(Position::new(0, 0));
        let err = fx
            .manager
            .request_construction(&ty("terran_marine"), None, None)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidRequest { .. }));
        assert!(!err.is_recoverable());

        let err = fx
            .manager
            .request_construction(&ty("terran_death_star"), None, None)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidRequest { .. }));
        assert!(fx.manager.store().is_empty());
    }

    #[test]
    fn request_without_workers_is_dropped() {
        let mut fx = fixture(Faction::Terran);
        fx.game.set_supply_used(12);
        let err = fx
            .manager
            .request_construction(&ty("terran_barracks"), None, None)
            .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::NoBuilderAvailable {
                building: ty("terran_barracks")
            }
        );
        assert!(err.is_recoverable());
        assert!(fx.manager.store().is_empty());
    }

    #[test]
    fn placement_failure_surfaces_reason() {
        let mut fx = fixture(Faction::Protoss);
        fx.game.spawn_worker(Position::new(0, 0));
        fx.finder.reject_all(Some("not powered by a pylon"));
        let err = fx
            .manager
            .request_construction(&ty("protoss_gateway"), None, None)
            .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::PlacementNotFound {
                building: ty("protoss_gateway"),
                reason: "not powered by a pylon".to_string(),
            }
        );
        assert!(fx.manager.store().is_empty());
    }

    #[test]
    fn final_builder_is_closest_to_site() {
        let mut fx = fixture(Faction::Terran);
        fx.game.spawn_worker(Position::new(0, 0));
        fx.game.spawn_worker(Position::new(2, 1));
        let far_side = fx.game.spawn_worker(Position::new(40, 40));
        let order = enqueue(&mut fx, "terran_bunker", Some(Position::new(38, 38)));
        assert_eq!(order.builder(), Some(far_side));
        assert_eq!(order.near_to(), Some(Position::new(38, 38)));
        assert_eq!(order.status(), ConstructionOrderStatus::NotStarted);
    }

    #[test]
    fn workers_are_never_double_booked() {
        let mut fx = fixture(Faction::Terran);
        fx.game.spawn_worker(Position::new(0, 0));
        fx.game.spawn_worker(Position::new(1, 0));
        let first = enqueue(&mut fx, "terran_supply_depot", None);
        let second = enqueue(&mut fx, "terran_supply_depot", None);
        assert_ne!(first.builder(), second.builder());
        assert!(fx.manager.queries().is_builder(first.builder().unwrap()));
        assert!(fx.manager.queries().is_builder(second.builder().unwrap()));

        let err = fx
            .manager
            .request_construction(&ty("terran_supply_depot"), None, None)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::NoBuilderAvailable { .. }));
    }

    #[test]
    fn planner_hears_only_about_enqueued_orders() {
        let (planner, notices) = ChannelPlanner::channel();
        let mut fx = fixture(Faction::Terran);
        fx.manager = fx.manager.with_planner(Arc::new(planner));

        let _ = fx
            .manager
            .request_construction(&ty("terran_barracks"), Some(PlanHandle(9)), None);
        assert!(notices.try_recv().is_err());

        fx.game.spawn_worker(Position::new(0, 0));
        let outcome = fx
            .manager
            .request_construction(&ty("terran_barracks"), Some(PlanHandle(9)), None)
            .unwrap();
        let RequestOutcome::Enqueued(id) = outcome else {
            panic!("expected an order");
        };
        assert_eq!(
            notices.try_recv().unwrap(),
            PlannerNotice::QueueChanged {
                order: id,
                building: ty("terran_barracks"),
                plan: Some(PlanHandle(9)),
            }
        );
    }

    #[test]
    fn cancel_removes_once() {
        let mut fx = fixture(Faction::Zerg);
        fx.game.spawn_worker(Position::new(0, 0));
        let order = enqueue(&mut fx, "zerg_spawning_pool", None);
        assert!(fx.manager.cancel(order.id()));
        assert!(!fx.manager.cancel(order.id()));
        assert!(fx.manager.store().is_empty());
        assert!(!fx.manager.queries().is_builder(order.builder().unwrap()));
    }

    #[test]
    fn requested_cancels_reach_next_report_once() {
        let mut fx = fixture(Faction::Terran);
        fx.game.spawn_worker(Position::new(0, 0));
        fx.game.spawn_worker(Position::new(4, 0));
        let depot = enqueue(&mut fx, "terran_supply_depot", None);
        let bunker = enqueue(&mut fx, "terran_bunker", None);
        assert!(fx.manager.cancel(bunker.id()));
        assert!(!fx.manager.cancel(bunker.id()));

        let mut telemetry = ConstructionTelemetry::default();
        let report = fx.manager.update();
        assert_eq!(report.cancelled, vec![(bunker.id(), CancelReason::Requested)]);
        telemetry.record(report);
        assert!(fx.manager.store().contains(depot.id()));

        telemetry.record(fx.manager.update());
        assert_eq!(telemetry.cancelled_total, 1);
        assert!(telemetry.last_report.as_ref().is_some_and(TickReport::is_quiet));
    }

    #[test]
    fn invalidated_site_is_searched_again_once_builder_stops() {
        let mut fx = fixture(Faction::Terran);
        let scv = fx.game.spawn_worker(Position::new(0, 0));
        let order = enqueue(&mut fx, "terran_barracks", None);
        fx.game.send_to(scv, order.position_to_build());

        assert!(fx.manager.invalidate_site(order.id()));
        let report = fx.manager.update();
        assert!(report.repositioned.is_empty(), "builder still walking");
        assert_eq!(fx.manager.store().get(order.id()).unwrap().position_to_build(), None);

        fx.game.send_to(scv, None);
        let report = fx.manager.update();
        assert_eq!(report.repositioned, vec![order.id()]);
        let site = fx.manager.store().get(order.id()).unwrap().position_to_build();
        assert!(site.is_some());
        assert_ne!(site, order.position_to_build());
    }

    #[test]
    fn dedicated_builder_is_replaced_when_killed() {
        let mut fx = fixture(Faction::Terran);
        let scv = fx.game.spawn_worker(Position::new(0, 0));
        let order = enqueue(&mut fx, "terran_barracks", None);
        let spare = fx.game.spawn_worker(Position::new(30, 30));
        fx.game.kill(scv);

        let report = fx.manager.update();
        assert_eq!(report.reassigned, vec![(order.id(), spare)]);
        assert_eq!(fx.manager.store().get(order.id()).unwrap().builder(), Some(spare));
    }

    #[test]
    fn dedicated_order_waits_for_builder_then_gives_up() {
        let game = Arc::new(SandboxGame::new(Faction::Terran));
        let finder = Arc::new(SandboxPlacementFinder::new(Arc::clone(&game)));
        let config = ConstructionConfig {
            max_builderless_ticks: 2,
            ..Default::default()
        };
        let mut manager =
            ConstructionManager::new(game.clone(), finder, UnitCatalog::builtin(), Arc::new(config));
        let scv = game.spawn_worker(Position::new(0, 0));
        manager
            .request_construction(&ty("terran_barracks"), None, None)
            .unwrap();
        game.kill(scv);

        // Waiting passes report nothing even though the game is unchanged.
        assert!(manager.update().is_quiet());
        let waiting = manager.queries().all_orders();
        assert!(manager.update().is_quiet());
        assert_eq!(waiting.len(), 1);
        assert_eq!(manager.queries().all_orders().len(), 1);
        let report = manager.update();
        assert_eq!(report.cancelled.len(), 1);
        assert_eq!(report.cancelled[0].1, CancelReason::Orphaned);
        assert!(manager.store().is_empty());
    }

    #[test]
    fn releasing_doctrine_cancels_orphans_immediately() {
        let mut fx = fixture(Faction::Protoss);
        let probe = fx.game.spawn_worker(Position::new(0, 0));
        let order = enqueue(&mut fx, "protoss_pylon", None);
        fx.game.kill(probe);
        let report = fx.manager.update();
        assert_eq!(report.cancelled, vec![(order.id(), CancelReason::Orphaned)]);
        assert!(report.reassigned.is_empty());
    }

    #[test]
    fn protoss_builder_is_released_once_warp_starts() {
        let mut fx = fixture(Faction::Protoss);
        let probe = fx.game.spawn_worker(Position::new(0, 0));
        let order = enqueue(&mut fx, "protoss_pylon", None);
        let site = order.position_to_build().unwrap();
        fx.game.begin_construction(probe, "protoss_pylon", site);

        let report = fx.manager.update();
        assert_eq!(report.started, vec![order.id()]);
        fx.game.release_worker(probe);
        assert!(!fx.manager.queries().is_builder(probe));

        // The freed probe can take the next order.
        let next = enqueue(&mut fx, "protoss_gateway", None);
        assert_eq!(next.builder(), Some(probe));
        assert_eq!(
            fx.manager.queries().order_for_builder(probe).map(|o| o.id()),
            Some(next.id())
        );
    }

    #[test]
    fn zerg_builder_promoted_when_its_type_matches_building() {
        let mut fx = fixture(Faction::Zerg);
        let drone = fx.game.spawn_worker(Position::new(0, 0));
        let order = enqueue(&mut fx, "zerg_hydralisk_den", None);
        fx.game.morph_worker(drone, "zerg_hydralisk_den");
        // The game still reports a build type while the morph settles.
        fx.game.set_build_type(drone, Some(ty("zerg_hydralisk_den")));

        let report = fx.manager.update();
        assert_eq!(report.started, vec![order.id()]);
        let stored = fx.manager.store().get(order.id()).unwrap();
        assert_eq!(stored.status(), ConstructionOrderStatus::InProgress);
        assert_eq!(stored.construction(), None);

        fx.game.set_build_type(drone, None);
        let report = fx.manager.update();
        assert!(report.started.is_empty());
        assert_eq!(
            fx.manager.store().get(order.id()).unwrap().construction(),
            Some(drone)
        );
    }

    #[test]
    fn morph_handler_claims_morph_structures() {
        let mut fx = fixture(Faction::Zerg);
        fx.manager = fx.manager.with_special_handler(Box::new(MorphHandler));
        fx.game.spawn_worker(Position::new(0, 0));

        let err = fx
            .manager
            .request_construction(&ty("zerg_lair"), None, None)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::NoBuilderAvailable { .. }));

        let hatchery = fx.game.spawn("zerg_hatchery", Position::new(5, 5));
        let outcome = fx
            .manager
            .request_construction(&ty("zerg_lair"), None, None)
            .unwrap();
        assert_eq!(outcome, RequestOutcome::HandledSpecially);
        assert_eq!(fx.game.morph_requests(), vec![(hatchery, ty("zerg_lair"))]);
        assert!(fx.manager.store().is_empty());

        // Regular structures still go through an order.
        enqueue(&mut fx, "zerg_spawning_pool", None);
        assert_eq!(fx.manager.store().len(), 1);
    }

    #[test]
    fn readers_see_whole_passes_while_manager_ticks() {
        let mut fx = fixture(Faction::Terran);
        fx.game.set_build_ticks(1_000);
        for index in 0..8 {
            fx.game.spawn_worker(Position::new(index * 3, 0));
        }
        for index in 0..8 {
            enqueue(&mut fx, "terran_supply_depot", Some(Position::new(index * 3, 5)));
        }
        for _ in 0..10 {
            fx.game.advance(&fx.manager.queries().all_orders());
            fx.manager.update();
        }
        let started = fx.manager.queries().all_orders();
        assert_eq!(started.len(), 8);
        assert!(started
            .iter()
            .all(|order| order.status() == ConstructionOrderStatus::InProgress));

        let reader = fx.manager.queries().clone();
        let handle = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while Instant::now() < deadline {
                let orders = reader.all_orders();
                match orders.len() {
                    0 => return true,
                    8 => assert!(orders
                        .iter()
                        .all(|order| order.status() == ConstructionOrderStatus::InProgress)),
                    torn => panic!("reader observed {torn} orders"),
                }
                assert_eq!(reader.count_in_progress(&ty("terran_supply_depot")) % 8, 0);
            }
            false
        });

        for _ in 0..500 {
            assert!(fx.manager.update().is_quiet());
        }
        for order in &started {
            fx.game.complete(order.construction().unwrap());
        }
        assert_eq!(fx.manager.update().finished.len(), 8);
        assert!(handle.join().unwrap(), "reader never saw the finished pass");
    }

    #[test]
    fn ticks_are_counted() {
        let mut fx = fixture(Faction::Terran);
        assert_eq!(fx.manager.tick(), 0);
        assert_eq!(fx.manager.update().tick, 1);
        assert_eq!(fx.manager.update().tick, 2);
        assert_eq!(fx.manager.tick(), 2);
    }
}
