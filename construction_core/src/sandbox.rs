//! In-memory game used by the scenario harness, benchmarks and tests.
//!
//! [`SandboxGame`] answers the [`GameState`] queries from a plain unit table
//! and exposes scripting helpers to mutate it between ticks. [`SandboxGame::advance`]
//! plays the part of the real game: builders walk to their sites, start the
//! building the way their faction does and buildings complete after
//! `build_ticks` steps.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use construction_schema::{Faction, Position, UnitCatalog, UnitTypeId};
use parking_lot::Mutex;

use crate::doctrine::DoctrineFlags;
use crate::game::{GameState, UnitId};
use crate::orders::{ConstructionOrder, SearchRadius};
use crate::placement::{PlacementFailure, PlacementFinder};

pub const DEFAULT_BUILD_TICKS: u32 = 3;

/// Ring limit used when the search radius is unbounded.
const UNBOUNDED_SEARCH_TILES: u32 = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxUnit {
    pub unit_type: UnitTypeId,
    pub position: Position,
    pub destination: Option<Position>,
    pub completed: bool,
    pub build_type: Option<UnitTypeId>,
    pub build_unit: Option<UnitId>,
    pub progress: u32,
}

impl SandboxUnit {
    fn new(unit_type: UnitTypeId, position: Position, completed: bool) -> Self {
        Self {
            unit_type,
            position,
            destination: None,
            completed,
            build_type: None,
            build_unit: None,
            progress: 0,
        }
    }
}

#[derive(Debug)]
struct SandboxState {
    faction: Faction,
    supply_used: u32,
    build_ticks: u32,
    next_id: u32,
    units: BTreeMap<UnitId, SandboxUnit>,
    morph_requests: Vec<(UnitId, UnitTypeId)>,
}

#[derive(Debug)]
pub struct SandboxGame {
    catalog: Arc<UnitCatalog>,
    worker_type: UnitTypeId,
    state: Mutex<SandboxState>,
}

impl SandboxGame {
    pub fn new(faction: Faction) -> Self {
        Self::with_catalog(faction, UnitCatalog::builtin())
    }

    /// # Panics
    /// When the catalog has no worker type for `faction`.
    pub fn with_catalog(faction: Faction, catalog: Arc<UnitCatalog>) -> Self {
        let worker_type = catalog
            .worker_for(faction)
            .cloned()
            .unwrap_or_else(|| panic!("catalog has no worker for {faction}"));
        Self {
            catalog,
            worker_type,
            state: Mutex::new(SandboxState {
                faction,
                supply_used: 0,
                build_ticks: DEFAULT_BUILD_TICKS,
                next_id: 1,
                units: BTreeMap::new(),
                morph_requests: Vec::new(),
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<UnitCatalog> {
        &self.catalog
    }

    pub fn set_supply_used(&self, supply: u32) {
        self.state.lock().supply_used = supply;
    }

    pub fn set_build_ticks(&self, ticks: u32) {
        self.state.lock().build_ticks = ticks.max(1);
    }

    pub fn spawn(&self, unit_type: impl Into<UnitTypeId>, position: Position) -> UnitId {
        self.insert(SandboxUnit::new(unit_type.into(), position, true))
    }

    pub fn spawn_incomplete(&self, unit_type: impl Into<UnitTypeId>, position: Position) -> UnitId {
        self.insert(SandboxUnit::new(unit_type.into(), position, false))
    }

    pub fn spawn_worker(&self, position: Position) -> UnitId {
        self.spawn(self.worker_type.clone(), position)
    }

    fn insert(&self, unit: SandboxUnit) -> UnitId {
        let mut state = self.state.lock();
        let id = UnitId(state.next_id);
        state.next_id += 1;
        state.units.insert(id, unit);
        id
    }

    pub fn unit(&self, id: UnitId) -> Option<SandboxUnit> {
        self.state.lock().units.get(&id).cloned()
    }

    pub fn kill(&self, id: UnitId) {
        let mut state = self.state.lock();
        state.units.remove(&id);
        for unit in state.units.values_mut() {
            if unit.build_unit == Some(id) {
                unit.build_unit = None;
                unit.build_type = None;
            }
        }
    }

    pub fn send_to(&self, id: UnitId, destination: Option<Position>) {
        if let Some(unit) = self.state.lock().units.get_mut(&id) {
            unit.destination = destination;
        }
    }

    pub fn set_build_type(&self, id: UnitId, build_type: Option<UnitTypeId>) {
        if let Some(unit) = self.state.lock().units.get_mut(&id) {
            unit.build_type = build_type;
        }
    }

    /// Worker places a separate building entity at `site` and starts working on it.
    pub fn begin_construction(
        &self,
        worker: UnitId,
        building: impl Into<UnitTypeId>,
        site: Position,
    ) -> Option<UnitId> {
        let building = building.into();
        let mut state = self.state.lock();
        if !state.units.contains_key(&worker) {
            return None;
        }
        let id = UnitId(state.next_id);
        state.next_id += 1;
        state
            .units
            .insert(id, SandboxUnit::new(building.clone(), site, false));
        if let Some(unit) = state.units.get_mut(&worker) {
            unit.position = site;
            unit.destination = None;
            unit.build_type = Some(building);
            unit.build_unit = Some(id);
        }
        Some(id)
    }

    /// Worker turns into the (incomplete) building itself.
    pub fn morph_worker(&self, worker: UnitId, into: impl Into<UnitTypeId>) {
        if let Some(unit) = self.state.lock().units.get_mut(&worker) {
            unit.unit_type = into.into();
            unit.completed = false;
            unit.destination = None;
            unit.build_type = None;
            unit.build_unit = None;
            unit.progress = 0;
        }
    }

    /// Frees a worker from the building it started, leaving the building in place.
    pub fn release_worker(&self, worker: UnitId) {
        if let Some(unit) = self.state.lock().units.get_mut(&worker) {
            unit.build_type = None;
            unit.build_unit = None;
        }
    }

    pub fn complete(&self, id: UnitId) {
        let mut state = self.state.lock();
        Self::complete_locked(&mut state, id);
    }

    fn complete_locked(state: &mut SandboxState, id: UnitId) {
        if let Some(unit) = state.units.get_mut(&id) {
            unit.completed = true;
        }
        for unit in state.units.values_mut() {
            if unit.build_unit == Some(id) {
                unit.build_unit = None;
                unit.build_type = None;
            }
        }
    }

    pub fn morph_requests(&self) -> Vec<(UnitId, UnitTypeId)> {
        self.state.lock().morph_requests.clone()
    }

    pub fn unit_count(&self) -> usize {
        self.state.lock().units.len()
    }

    /// One step of simulated game time for the given orders.
    pub fn advance(&self, orders: &[ConstructionOrder]) {
        let mut state = self.state.lock();
        let build_ticks = state.build_ticks;
        let doctrine = DoctrineFlags::for_faction(state.faction);

        if doctrine.contains(DoctrineFlags::RELEASES_BUILDER) {
            for unit in state.units.values_mut() {
                if unit.unit_type == self.worker_type {
                    unit.build_unit = None;
                }
            }
        }

        let mut finished = Vec::new();
        for (id, unit) in state.units.iter_mut() {
            let morphing = unit.completed && unit.build_type.is_some() && unit.build_unit.is_none();
            if morphing && unit.unit_type != self.worker_type {
                unit.progress += 1;
                if unit.progress >= build_ticks {
                    if let Some(into) = unit.build_type.take() {
                        unit.unit_type = into;
                    }
                    unit.progress = 0;
                }
            } else if !unit.completed {
                unit.progress += 1;
                if unit.progress >= build_ticks {
                    finished.push(*id);
                }
            }
        }
        for id in finished {
            Self::complete_locked(&mut state, id);
        }

        for order in orders {
            let (Some(builder), Some(site)) = (order.builder(), order.position_to_build()) else {
                continue;
            };
            if order.construction().is_some() {
                continue;
            }
            let Some(unit) = state.units.get_mut(&builder) else {
                continue;
            };
            if unit.unit_type != self.worker_type || unit.build_type.is_some() {
                continue;
            }
            if unit.position != site {
                if unit.destination == Some(site) {
                    unit.position = site;
                    unit.destination = None;
                } else {
                    unit.destination = Some(site);
                }
                continue;
            }

            let building = order.building_type().clone();
            if doctrine.contains(DoctrineFlags::METAMORPHOSIS) {
                unit.unit_type = building;
                unit.completed = false;
                unit.progress = 0;
            } else {
                let id = UnitId(state.next_id);
                state.next_id += 1;
                state
                    .units
                    .insert(id, SandboxUnit::new(building.clone(), site, false));
                if let Some(unit) = state.units.get_mut(&builder) {
                    if !doctrine.contains(DoctrineFlags::RELEASES_BUILDER) {
                        unit.build_type = Some(building);
                    }
                    unit.build_unit = Some(id);
                }
            }
        }
    }
}

impl GameState for SandboxGame {
    fn faction(&self) -> Faction {
        self.state.lock().faction
    }

    fn supply_used(&self) -> u32 {
        self.state.lock().supply_used
    }

    fn exists(&self, unit: UnitId) -> bool {
        self.state.lock().units.contains_key(&unit)
    }

    fn unit_type(&self, unit: UnitId) -> Option<UnitTypeId> {
        self.state
            .lock()
            .units
            .get(&unit)
            .map(|u| u.unit_type.clone())
    }

    fn position(&self, unit: UnitId) -> Option<Position> {
        self.state.lock().units.get(&unit).map(|u| u.position)
    }

    fn is_moving(&self, unit: UnitId) -> bool {
        self.state
            .lock()
            .units
            .get(&unit)
            .map_or(false, |u| u.destination.is_some())
    }

    fn is_completed(&self, unit: UnitId) -> bool {
        self.state
            .lock()
            .units
            .get(&unit)
            .map_or(false, |u| u.completed)
    }

    fn is_constructing(&self, unit: UnitId) -> bool {
        self.state.lock().units.get(&unit).map_or(false, |u| {
            u.unit_type == self.worker_type && (u.build_unit.is_some() || u.build_type.is_some())
        })
    }

    fn build_type(&self, unit: UnitId) -> Option<UnitTypeId> {
        self.state
            .lock()
            .units
            .get(&unit)
            .and_then(|u| u.build_type.clone())
    }

    fn build_unit(&self, unit: UnitId) -> Option<UnitId> {
        self.state.lock().units.get(&unit).and_then(|u| u.build_unit)
    }

    fn free_workers(&self) -> Vec<UnitId> {
        self.state
            .lock()
            .units
            .iter()
            .filter(|(_, u)| {
                u.unit_type == self.worker_type
                    && u.completed
                    && u.build_type.is_none()
                    && u.build_unit.is_none()
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn incomplete_units_of_type(&self, unit_type: &UnitTypeId) -> Vec<UnitId> {
        self.state
            .lock()
            .units
            .iter()
            .filter(|(_, u)| !u.completed && &u.unit_type == unit_type)
            .map(|(id, _)| *id)
            .collect()
    }

    fn completed_units_of_type(&self, unit_type: &UnitTypeId) -> Vec<UnitId> {
        self.state
            .lock()
            .units
            .iter()
            .filter(|(_, u)| u.completed && &u.unit_type == unit_type)
            .map(|(id, _)| *id)
            .collect()
    }

    fn request_morph(&self, unit: UnitId, into: &UnitTypeId) -> bool {
        let mut state = self.state.lock();
        let accepted = match state.units.get_mut(&unit) {
            Some(u) if u.completed && u.build_type.is_none() => {
                u.build_type = Some(into.clone());
                u.progress = 0;
                true
            }
            _ => false,
        };
        if accepted {
            state.morph_requests.push((unit, into.clone()));
        }
        accepted
    }
}

/// Ring search for the closest tile not occupied by a unit or an earlier answer.
#[derive(Debug)]
pub struct SandboxPlacementFinder {
    game: Arc<SandboxGame>,
    reserved: Mutex<HashSet<Position>>,
    rejection: Mutex<Option<String>>,
}

impl SandboxPlacementFinder {
    pub fn new(game: Arc<SandboxGame>) -> Self {
        Self {
            game,
            reserved: Mutex::new(HashSet::new()),
            rejection: Mutex::new(None),
        }
    }

    /// Makes every search fail with `reason` until cleared with `None`.
    pub fn reject_all(&self, reason: Option<&str>) {
        *self.rejection.lock() = reason.map(str::to_string);
    }

    pub fn reserved(&self) -> Vec<Position> {
        self.reserved.lock().iter().copied().collect()
    }

    fn is_free(&self, position: Position, reserved: &HashSet<Position>) -> bool {
        if reserved.contains(&position) {
            return false;
        }
        let state = self.game.state.lock();
        !state
            .units
            .values()
            .any(|unit| unit.position == position && unit.unit_type != self.game.worker_type)
    }
}

impl PlacementFinder for SandboxPlacementFinder {
    fn find_position(
        &self,
        builder: UnitId,
        building: &UnitTypeId,
        near: Option<Position>,
        radius: SearchRadius,
    ) -> Result<Position, PlacementFailure> {
        if let Some(reason) = self.rejection.lock().clone() {
            return Err(PlacementFailure::new(reason));
        }
        let origin = match near.or_else(|| self.game.position(builder)) {
            Some(origin) => origin,
            None => {
                return Err(PlacementFailure::new(format!(
                    "builder {builder} has no known position"
                )))
            }
        };
        let limit = match radius {
            SearchRadius::Unbounded => UNBOUNDED_SEARCH_TILES,
            SearchRadius::Tiles(tiles) => tiles,
        } as i32;

        let mut reserved = self.reserved.lock();
        for ring in 0..=limit {
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let candidate = origin.offset(dx, dy);
                    if !radius.allows(origin.distance_to(candidate)) {
                        continue;
                    }
                    if self.is_free(candidate, &reserved) {
                        reserved.insert(candidate);
                        return Ok(candidate);
                    }
                }
            }
        }
        Err(PlacementFailure::new(format!(
            "no free tile for {building} within {limit} tiles of {origin}"
        )))
    }
}
