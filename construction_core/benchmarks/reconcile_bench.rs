use std::sync::Arc;

use construction_core::sandbox::{SandboxGame, SandboxPlacementFinder};
use construction_core::{
    ConstructionConfig, ConstructionManager, Faction, Position, UnitCatalog, UnitTypeId,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn populated_manager(faction: Faction, building: &str, orders: u32) -> ConstructionManager {
    let game = Arc::new(SandboxGame::new(faction));
    for index in 0..orders {
        game.spawn_worker(Position::new((index % 32) as i32 * 3, (index / 32) as i32 * 3));
    }
    let finder = Arc::new(SandboxPlacementFinder::new(Arc::clone(&game)));
    let mut manager = ConstructionManager::new(
        game,
        finder,
        UnitCatalog::builtin(),
        Arc::new(ConstructionConfig::default()),
    );
    let building = UnitTypeId::from(building);
    for _ in 0..orders {
        let _ = manager.request_construction(&building, None, None);
    }
    manager
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for (faction, building) in [
        (Faction::Terran, "terran_supply_depot"),
        (Faction::Protoss, "protoss_pylon"),
        (Faction::Zerg, "zerg_evolution_chamber"),
    ] {
        for orders in [8u32, 32, 128] {
            group.bench_with_input(
                BenchmarkId::new(faction.as_str(), orders),
                &orders,
                |b, &orders| {
                    b.iter_batched(
                        || populated_manager(faction, building, orders),
                        |mut manager| manager.update(),
                        BatchSize::SmallInput,
                    )
                },
            );
        }
    }

    group.finish();
}

criterion_group!(reconcile_benches, bench_reconcile);
criterion_main!(reconcile_benches);
