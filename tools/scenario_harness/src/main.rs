mod scenario;

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use construction_core::sandbox::{SandboxGame, SandboxPlacementFinder};
use construction_core::{
    load_construction_config_from_env, ConstructionConfig, ConstructionManager,
    ConstructionTelemetry, GameState, MorphHandler, RequestOutcome, UnitCatalog,
};
use serde_json::{json, Value as JsonValue};

use crate::scenario::{ScenarioAction, ScenarioFile};

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs construction scenarios against the sandbox game", long_about = None)]
struct Args {
    /// Path to scenario JSON file
    #[arg(long)]
    scenario: PathBuf,

    /// Construction config override (defaults to CONSTRUCTION_CONFIG_PATH or the builtin)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Unit catalog override (defaults to the builtin catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Number of ticks to run; defaults to a few ticks past the last event
    #[arg(long)]
    ticks: Option<u64>,

    /// Print quiet ticks too
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let scenario_json = fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read scenario at {}", args.scenario.display()))?;
    let scenario = ScenarioFile::parse_str(&scenario_json).with_context(|| {
        format!(
            "Failed to parse scenario JSON at {}",
            args.scenario.display()
        )
    })?;

    let config = match &args.config {
        Some(path) => Arc::new(
            ConstructionConfig::from_file(path)
                .with_context(|| format!("Failed to load config at {}", path.display()))?,
        ),
        None => load_construction_config_from_env(),
    };
    let catalog = match &args.catalog {
        Some(path) => Arc::new(
            UnitCatalog::from_file(path)
                .with_context(|| format!("Failed to load catalog at {}", path.display()))?,
        ),
        None => UnitCatalog::builtin(),
    };
    if catalog.worker_for(scenario.faction).is_none() {
        anyhow::bail!("Catalog has no worker type for {}", scenario.faction);
    }

    let game = Arc::new(SandboxGame::with_catalog(
        scenario.faction,
        Arc::clone(&catalog),
    ));
    game.set_supply_used(scenario.supply_used);
    if let Some(build_ticks) = scenario.build_ticks {
        game.set_build_ticks(build_ticks);
    }
    for &position in &scenario.workers {
        game.spawn_worker(position);
    }
    for unit in &scenario.units {
        if unit.completed {
            game.spawn(unit.unit_type.clone(), unit.position);
        } else {
            game.spawn_incomplete(unit.unit_type.clone(), unit.position);
        }
    }

    let finder = Arc::new(SandboxPlacementFinder::new(Arc::clone(&game)));
    let mut manager = ConstructionManager::new(game.clone(), finder, catalog, config)
        .with_special_handler(Box::new(MorphHandler));
    let mut telemetry = ConstructionTelemetry::default();

    let ticks = args
        .ticks
        .unwrap_or_else(|| scenario.last_event_tick() + 12);
    for tick in 0..ticks {
        let actions: Vec<JsonValue> = scenario
            .events_at(tick)
            .map(|action| apply_action(&mut manager, &game, action))
            .collect();

        game.advance(&manager.queries().all_orders());
        let report = manager.update();
        let quiet = report.is_quiet() && actions.is_empty();
        if !quiet || args.verbose {
            let line = json!({
                "tick": tick,
                "actions": actions,
                "report": report,
            });
            println!("{}", serde_json::to_string(&line)?);
        }
        telemetry.record(report);
    }

    let summary = json!({
        "ticks": telemetry.ticks,
        "started": telemetry.started_total,
        "finished": telemetry.finished_total,
        "cancelled": telemetry.cancelled_total,
        "reassigned": telemetry.reassigned_total,
        "pending_resources": manager.queries().resources_needed(),
        "orders": manager.queries().all_orders(),
    });
    println!("=== summary ===");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn apply_action(
    manager: &mut ConstructionManager,
    game: &SandboxGame,
    action: &ScenarioAction,
) -> JsonValue {
    match action {
        ScenarioAction::Request { building, near, .. } => {
            match manager.request_construction(building, action.plan_handle(), *near) {
                Ok(RequestOutcome::Enqueued(id)) => {
                    json!({ "request": building, "order": id })
                }
                Ok(RequestOutcome::HandledSpecially) => {
                    json!({ "request": building, "handled_specially": true })
                }
                Err(err) => json!({
                    "request": building,
                    "error": err.to_string(),
                    "recoverable": err.is_recoverable(),
                }),
            }
        }
        ScenarioAction::SpawnWorker { position } => {
            let unit = game.spawn_worker(*position);
            json!({ "spawned_worker": unit })
        }
        ScenarioAction::KillBuilder { .. } => {
            let Some(id) = action.order_id() else {
                return JsonValue::Null;
            };
            let builder = manager.store().get(id).and_then(|order| order.builder());
            match builder {
                Some(builder) if game.exists(builder) => {
                    game.kill(builder);
                    json!({ "killed_builder": builder, "order": id })
                }
                _ => json!({ "killed_builder": null, "order": id }),
            }
        }
        ScenarioAction::InvalidateSite { .. } => {
            let Some(id) = action.order_id() else {
                return JsonValue::Null;
            };
            json!({ "invalidated": manager.invalidate_site(id), "order": id })
        }
        ScenarioAction::Cancel { .. } => {
            let Some(id) = action.order_id() else {
                return JsonValue::Null;
            };
            json!({ "cancelled": manager.cancel(id), "order": id })
        }
    }
}
