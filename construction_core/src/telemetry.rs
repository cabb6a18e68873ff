use bevy::prelude::Resource;
use serde::Serialize;

use crate::game::UnitId;
use crate::orders::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Builder and construction both gone.
    Orphaned,
    /// Cancelled through `ConstructionManager::cancel`.
    Requested,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub started: Vec<OrderId>,
    pub finished: Vec<OrderId>,
    pub cancelled: Vec<(OrderId, CancelReason)>,
    pub reassigned: Vec<(OrderId, UnitId)>,
    pub repositioned: Vec<OrderId>,
}

impl TickReport {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// True when the pass changed nothing observable.
    pub fn is_quiet(&self) -> bool {
        self.started.is_empty()
            && self.finished.is_empty()
            && self.cancelled.is_empty()
            && self.reassigned.is_empty()
            && self.repositioned.is_empty()
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct ConstructionTelemetry {
    pub last_report: Option<TickReport>,
    pub ticks: u64,
    pub started_total: u64,
    pub finished_total: u64,
    pub cancelled_total: u64,
    pub reassigned_total: u64,
}

impl ConstructionTelemetry {
    pub fn record(&mut self, report: TickReport) {
        self.ticks += 1;
        self.started_total += report.started.len() as u64;
        self.finished_total += report.finished.len() as u64;
        self.cancelled_total += report.cancelled.len() as u64;
        self.reassigned_total += report.reassigned.len() as u64;
        self.last_report = Some(report);
    }
}
