#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use construction_core::sandbox::{SandboxGame, SandboxPlacementFinder};
use construction_core::{
    load_construction_config_from_env, ConstructionError, ConstructionManager,
    ConstructionOrder, ConstructionOrderStatus, DoctrineFlags, Faction, GameState, OrderId,
    Position, RequestOutcome, TickReport, UnitCatalog, UnitId, UnitTypeId,
    CONSTRUCTION_CONFIG_ENV,
};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_construction_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test construction config at {}",
            config_path.display()
        );

        std::env::set_var(CONSTRUCTION_CONFIG_ENV, &config_path);
    });
}

/// Sandbox game, placement finder and manager wired together.
pub struct Scenario {
    pub game: Arc<SandboxGame>,
    pub finder: Arc<SandboxPlacementFinder>,
    pub manager: ConstructionManager,
}

impl Scenario {
    pub fn new(faction: Faction) -> Self {
        ensure_test_config();
        let game = Arc::new(SandboxGame::new(faction));
        let finder = Arc::new(SandboxPlacementFinder::new(Arc::clone(&game)));
        let manager = ConstructionManager::new(
            game.clone(),
            finder.clone(),
            UnitCatalog::builtin(),
            load_construction_config_from_env(),
        );
        Self {
            game,
            finder,
            manager,
        }
    }

    pub fn with_workers(faction: Faction, positions: &[(i32, i32)]) -> Self {
        let scenario = Self::new(faction);
        for &(x, y) in positions {
            scenario.game.spawn_worker(Position::new(x, y));
        }
        scenario
    }

    pub fn request(
        &mut self,
        building: &str,
        near: Option<(i32, i32)>,
    ) -> Result<RequestOutcome, ConstructionError> {
        self.manager.request_construction(
            &UnitTypeId::from(building),
            None,
            near.map(|(x, y)| Position::new(x, y)),
        )
    }

    pub fn enqueue(&mut self, building: &str, near: Option<(i32, i32)>) -> OrderId {
        match self.request(building, near) {
            Ok(RequestOutcome::Enqueued(id)) => id,
            other => panic!("expected {building} to be enqueued, got {other:?}"),
        }
    }

    pub fn order(&self, id: OrderId) -> Option<ConstructionOrder> {
        self.manager.store().get(id)
    }

    /// Game time moves first, then the construction layer reconciles.
    pub fn step(&mut self) -> TickReport {
        let orders = self.manager.queries().all_orders();
        self.game.advance(&orders);
        self.manager.update()
    }

    /// Steps until `done` holds or `max_ticks` passes elapse.
    pub fn run_until<F>(&mut self, max_ticks: usize, mut done: F) -> Vec<TickReport>
    where
        F: FnMut(&Scenario) -> bool,
    {
        let mut reports = Vec::new();
        for _ in 0..max_ticks {
            if done(self) {
                break;
            }
            reports.push(self.step());
        }
        reports
    }

    pub fn doctrine(&self) -> DoctrineFlags {
        DoctrineFlags::for_faction(self.game.faction())
    }
}

/// Asserts that no worker is the active builder of two stored orders.
pub fn assert_unique_active_builders(scenario: &Scenario) {
    let doctrine = scenario.doctrine();
    let mut seen: Vec<UnitId> = Vec::new();
    for order in scenario.manager.queries().all_orders() {
        if !doctrine.holds_builder(order.status()) {
            continue;
        }
        if let Some(builder) = order.builder() {
            assert!(
                !seen.contains(&builder),
                "worker {builder} is active builder of more than one order"
            );
            seen.push(builder);
        }
    }
}

pub fn status_of(scenario: &Scenario, id: OrderId) -> Option<ConstructionOrderStatus> {
    scenario.order(id).map(|order| order.status())
}
