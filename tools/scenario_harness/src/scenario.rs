use construction_core::{Faction, OrderId, PlanHandle, Position, UnitTypeId};
use serde::Deserialize;

/// A scripted sandbox game: starting units plus actions keyed by tick.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    pub faction: Faction,
    #[serde(default)]
    pub supply_used: u32,
    #[serde(default)]
    pub build_ticks: Option<u32>,
    #[serde(default)]
    pub workers: Vec<Position>,
    #[serde(default)]
    pub units: Vec<StartingUnit>,
    #[serde(default)]
    pub events: Vec<ScheduledEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartingUnit {
    #[serde(rename = "type")]
    pub unit_type: UnitTypeId,
    pub position: Position,
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledEvent {
    pub tick: u64,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioAction {
    Request {
        building: UnitTypeId,
        #[serde(default)]
        near: Option<Position>,
        #[serde(default)]
        plan: Option<u64>,
    },
    SpawnWorker {
        position: Position,
    },
    KillBuilder {
        order: u64,
    },
    InvalidateSite {
        order: u64,
    },
    Cancel {
        order: u64,
    },
}

impl ScenarioAction {
    pub fn plan_handle(&self) -> Option<PlanHandle> {
        match self {
            ScenarioAction::Request { plan, .. } => plan.map(PlanHandle),
            _ => None,
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            ScenarioAction::KillBuilder { order }
            | ScenarioAction::InvalidateSite { order }
            | ScenarioAction::Cancel { order } => Some(OrderId(*order)),
            _ => None,
        }
    }
}

impl ScenarioFile {
    pub fn parse_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Events due at `tick`, in file order.
    pub fn events_at(&self, tick: u64) -> impl Iterator<Item = &ScenarioAction> {
        self.events
            .iter()
            .filter(move |event| event.tick == tick)
            .map(|event| &event.action)
    }

    pub fn last_event_tick(&self) -> u64 {
        self.events.iter().map(|event| event.tick).max().unwrap_or(0)
    }
}
