use bevy::prelude::*;

use crate::manager::ConstructionManager;
use crate::telemetry::ConstructionTelemetry;

/// Runs one reconciliation pass and records what it changed.
pub fn reconcile_constructions(
    mut manager: ResMut<ConstructionManager>,
    mut telemetry: ResMut<ConstructionTelemetry>,
) {
    let report = manager.update();
    if !report.is_quiet() {
        tracing::debug!(
            target: "construction::systems",
            tick = report.tick,
            started = report.started.len(),
            finished = report.finished.len(),
            cancelled = report.cancelled.len(),
            reassigned = report.reassigned.len(),
            "construction.tick.summary"
        );
    }
    telemetry.record(report);
}
