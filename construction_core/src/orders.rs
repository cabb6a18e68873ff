use std::fmt;

use construction_schema::{Position, UnitTypeId};
use serde::{Deserialize, Serialize};

use crate::game::UnitId;

/// Identifier for a construction order, unique per manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle back to the production plan that asked for a building.
/// Never dereferenced here, only handed back to the planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionOrderStatus {
    NotStarted,
    InProgress,
    Finished,
}

impl ConstructionOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructionOrderStatus::NotStarted => "not_started",
            ConstructionOrderStatus::InProgress => "in_progress",
            ConstructionOrderStatus::Finished => "finished",
        }
    }
}

/// How far from the reference point the placement search may wander.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchRadius {
    #[default]
    Unbounded,
    Tiles(u32),
}

impl SearchRadius {
    pub fn from_config(value: Option<u32>) -> Self {
        value.map(SearchRadius::Tiles).unwrap_or_default()
    }

    pub fn allows(&self, distance: f32) -> bool {
        match self {
            SearchRadius::Unbounded => true,
            SearchRadius::Tiles(max) => distance <= *max as f32,
        }
    }
}

/// One pending or active build task.
///
/// `builder` and `construction` are associations with live game entities,
/// not ownership. The manager re-validates both every tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstructionOrder {
    id: OrderId,
    building_type: UnitTypeId,
    builder: Option<UnitId>,
    construction: Option<UnitId>,
    position_to_build: Option<Position>,
    near_to: Option<Position>,
    max_distance: SearchRadius,
    status: ConstructionOrderStatus,
    linked_plan: Option<PlanHandle>,
    #[serde(default, skip_serializing_if = "is_zero")]
    builderless_passes: u32,
}

impl ConstructionOrder {
    pub fn new(id: OrderId, building_type: UnitTypeId) -> Self {
        Self {
            id,
            building_type,
            builder: None,
            construction: None,
            position_to_build: None,
            near_to: None,
            max_distance: SearchRadius::Unbounded,
            status: ConstructionOrderStatus::NotStarted,
            linked_plan: None,
            builderless_passes: 0,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn building_type(&self) -> &UnitTypeId {
        &self.building_type
    }

    pub fn builder(&self) -> Option<UnitId> {
        self.builder
    }

    pub fn construction(&self) -> Option<UnitId> {
        self.construction
    }

    pub fn position_to_build(&self) -> Option<Position> {
        self.position_to_build
    }

    pub fn near_to(&self) -> Option<Position> {
        self.near_to
    }

    pub fn max_distance(&self) -> SearchRadius {
        self.max_distance
    }

    pub fn status(&self) -> ConstructionOrderStatus {
        self.status
    }

    pub fn linked_plan(&self) -> Option<PlanHandle> {
        self.linked_plan
    }

    /// Point used to rank candidate builders: the site once known, the hint before that.
    pub fn anchor(&self) -> Option<Position> {
        self.position_to_build.or(self.near_to)
    }

    pub fn is_orphaned(&self) -> bool {
        self.builder.is_none() && self.construction.is_none()
    }

    pub(crate) fn builderless_passes(&self) -> u32 {
        self.builderless_passes
    }

    pub(crate) fn set_linked_plan(&mut self, plan: Option<PlanHandle>) {
        self.linked_plan = plan;
    }

    pub(crate) fn set_near_to(&mut self, near: Option<Position>) {
        self.near_to = near;
    }

    pub(crate) fn set_max_distance(&mut self, radius: SearchRadius) {
        self.max_distance = radius;
    }

    pub(crate) fn set_position_to_build(&mut self, position: Option<Position>) {
        self.position_to_build = position;
    }

    pub(crate) fn assign_builder(&mut self, builder: UnitId) {
        self.builder = Some(builder);
        self.builderless_passes = 0;
    }

    pub(crate) fn clear_builder(&mut self) -> Option<UnitId> {
        self.builder.take()
    }

    pub(crate) fn bind_construction(&mut self, construction: UnitId) {
        self.construction = Some(construction);
    }

    pub(crate) fn clear_construction(&mut self) -> Option<UnitId> {
        self.construction.take()
    }

    pub(crate) fn note_builderless_pass(&mut self) -> u32 {
        self.builderless_passes = self.builderless_passes.saturating_add(1);
        self.builderless_passes
    }

    pub(crate) fn reset_builderless_passes(&mut self) {
        self.builderless_passes = 0;
    }

    /// Moves the status forward. Returns `false` (and changes nothing) for
    /// any transition that would not advance it.
    pub(crate) fn advance_status(&mut self, next: ConstructionOrderStatus) -> bool {
        if next > self.status {
            self.status = next;
            true
        } else {
            false
        }
    }
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}
