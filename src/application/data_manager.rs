//! In-memory model of the road network and live simulation state.
//!
//! Intersections live in a generational arena so roads can refer to their
//! destination by [`IntersectionHandle`]; traffic lights and vehicles are keyed
//! by id.

use std::collections::{BTreeMap, BTreeSet};

use generational_arena::Arena;
use tracing::{debug, instrument, warn};

use crate::application::ApplicationResult;
use crate::domain::{
    DomainError, Entity, Intersection, IntersectionHandle, Position, RoadConnection, TrafficLight,
    TrafficLightState, Vehicle, VehicleRole, VehicleType,
};
use crate::infrastructure::traits::SimulationBackend;

/// What changed during a synchronisation with the simulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added_vehicles: Vec<String>,
    pub removed_vehicles: Vec<String>,
    pub added_traffic_lights: Vec<String>,
    pub removed_traffic_lights: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.added_vehicles.is_empty()
            && self.removed_vehicles.is_empty()
            && self.added_traffic_lights.is_empty()
            && self.removed_traffic_lights.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DataManager {
    arena: Arena<Intersection>,
    index: BTreeMap<String, IntersectionHandle>,
    traffic_lights: BTreeMap<String, TrafficLight>,
    /// Ids of the traffic lights last reported by the simulator
    simulated_lights: BTreeSet<String>,
    vehicles: BTreeMap<String, Vehicle>,
}

impl DataManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- intersections ----

    /// Insert an intersection. An existing one with the same id is replaced
    /// in place, so roads pointing at it stay valid.
    pub fn add_intersection(&mut self, intersection: Intersection) -> IntersectionHandle {
        if let Some(&handle) = self.index.get(intersection.id()) {
            if let Some(slot) = self.arena.get_mut(handle.0) {
                debug!("replacing intersection {}", intersection.id());
                *slot = intersection;
                return handle;
            }
        }
        let id = intersection.id().to_string();
        let handle = IntersectionHandle(self.arena.insert(intersection));
        self.index.insert(id, handle);
        handle
    }

    pub fn handle_of(&self, id: &str) -> Option<IntersectionHandle> {
        self.index.get(id).copied()
    }

    pub fn intersection(&self, id: &str) -> Option<&Intersection> {
        self.handle_of(id).and_then(|h| self.arena.get(h.0))
    }

    pub fn intersection_mut(&mut self, id: &str) -> Option<&mut Intersection> {
        let handle = self.handle_of(id)?;
        self.arena.get_mut(handle.0)
    }

    pub fn intersection_by_handle(&self, handle: IntersectionHandle) -> Option<&Intersection> {
        self.arena.get(handle.0)
    }

    /// All intersections, sorted by id.
    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.index.values().filter_map(|h| self.arena.get(h.0))
    }

    pub fn intersection_count(&self) -> usize {
        self.index.len()
    }

    /// Add a directed road `from -> to`, controlled by `traffic_light_id`.
    pub fn connect(
        &mut self,
        from: &str,
        road_id: u32,
        to: &str,
        traffic_light_id: &str,
        distance: f64,
    ) -> Result<(), DomainError> {
        let to_handle = self
            .handle_of(to)
            .ok_or_else(|| DomainError::UnknownIntersection(to.to_string()))?;
        if !self.traffic_lights.contains_key(traffic_light_id) {
            return Err(DomainError::UnknownTrafficLight(
                traffic_light_id.to_string(),
            ));
        }
        let source = self
            .intersection_mut(from)
            .ok_or_else(|| DomainError::UnknownIntersection(from.to_string()))?;
        source.add_road_connection(
            road_id,
            RoadConnection::new(to_handle, traffic_light_id, distance),
        )
    }

    /// Outgoing neighbours of `id` in road-id order; empty for unknown ids.
    pub fn neighbors(&self, id: &str) -> Vec<(&Intersection, &RoadConnection)> {
        let Some(source) = self.intersection(id) else {
            return vec![];
        };
        source
            .connected_roads()
            .values()
            .filter_map(|road| {
                self.intersection_by_handle(road.connected_intersection())
                    .map(|target| (target, road))
            })
            .collect()
    }

    /// First road (lowest road id) leading from `from` to `to`.
    pub fn road_between(&self, from: &str, to: &str) -> Option<&RoadConnection> {
        let target = self.handle_of(to)?;
        self.intersection(from)?
            .connected_roads()
            .values()
            .find(|road| road.connected_intersection() == target)
    }

    pub fn road_count(&self) -> usize {
        self.arena
            .iter()
            .map(|(_, i)| i.connected_roads().len())
            .sum()
    }

    // ---- traffic lights ----

    pub fn add_traffic_light(&mut self, light: TrafficLight) {
        self.traffic_lights.insert(light.id().to_string(), light);
    }

    pub fn traffic_light(&self, id: &str) -> Option<&TrafficLight> {
        self.traffic_lights.get(id)
    }

    pub fn traffic_light_mut(&mut self, id: &str) -> Option<&mut TrafficLight> {
        self.traffic_lights.get_mut(id)
    }

    pub fn traffic_lights(&self) -> impl Iterator<Item = &TrafficLight> {
        self.traffic_lights.values()
    }

    pub fn remove_traffic_light(&mut self, id: &str) -> Option<TrafficLight> {
        self.simulated_lights.remove(id);
        self.traffic_lights.remove(id)
    }

    /// Whether the simulator reported this light at the last sync.
    pub fn is_simulated_light(&self, id: &str) -> bool {
        self.simulated_lights.contains(id)
    }

    // ---- vehicles ----

    pub fn add_vehicle(&mut self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id().to_string(), vehicle);
    }

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn vehicle_mut(&mut self, id: &str) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn remove_vehicle(&mut self, id: &str) -> Option<Vehicle> {
        self.vehicles.remove(id)
    }

    pub fn clear_all(&mut self) {
        self.arena.clear();
        self.index.clear();
        self.traffic_lights.clear();
        self.simulated_lights.clear();
        self.vehicles.clear();
    }

    // ---- simulator synchronisation ----

    /// Initial import of the simulator's traffic lights and vehicles.
    ///
    /// Every traffic light also gets an intersection with the same id at the
    /// origin unless one exists already (e.g. from a loaded network).
    #[instrument(level = "debug", skip_all)]
    pub fn sync_from_sumo(
        &mut self,
        backend: &mut dyn SimulationBackend,
    ) -> ApplicationResult<SyncReport> {
        let report = self.refresh(backend)?;
        let missing: Vec<String> = self
            .simulated_lights
            .iter()
            .filter(|id| self.handle_of(id).is_none())
            .cloned()
            .collect();
        for id in missing {
            self.add_intersection(Intersection::new(id, Position::default()));
        }
        debug!(
            "synced {} traffic lights, {} vehicles",
            self.traffic_lights.len(),
            self.vehicles.len()
        );
        Ok(report)
    }

    /// Per-step refresh: new lights and vehicles are added, vanished ones
    /// removed, positions and states updated. Intersections are kept, as are
    /// traffic lights the simulator never reported (e.g. from a loaded network).
    pub fn update_from_sumo(
        &mut self,
        backend: &mut dyn SimulationBackend,
    ) -> ApplicationResult<SyncReport> {
        self.refresh(backend)
    }

    fn refresh(&mut self, backend: &mut dyn SimulationBackend) -> ApplicationResult<SyncReport> {
        let mut report = SyncReport::default();

        let light_ids: BTreeSet<String> = backend.traffic_light_ids()?.into_iter().collect();
        for id in &light_ids {
            let state = TrafficLightState::from_sumo_state(&backend.traffic_light_state(id)?);
            match self.traffic_lights.get_mut(id) {
                Some(light) => light.set_state(state),
                None => {
                    let mut light = TrafficLight::new(id.as_str());
                    light.set_state(state);
                    self.traffic_lights.insert(id.clone(), light);
                    report.added_traffic_lights.push(id.clone());
                }
            }
        }
        report.removed_traffic_lights = self
            .simulated_lights
            .difference(&light_ids)
            .cloned()
            .collect();
        for id in &report.removed_traffic_lights {
            self.traffic_lights.remove(id);
        }
        self.simulated_lights = light_ids;

        let vehicle_ids: BTreeSet<String> = backend.vehicle_ids()?.into_iter().collect();
        for id in &vehicle_ids {
            let position = backend.vehicle_position(id)?;
            match self.vehicles.get_mut(id) {
                Some(vehicle) => vehicle.update_position(position),
                None => {
                    let (vehicle_type, role) = match backend.vehicle_type(id) {
                        Ok(sumo_type) => (
                            VehicleType::from_sumo_type(&sumo_type),
                            VehicleRole::from_sumo_type(&sumo_type),
                        ),
                        Err(e) => {
                            warn!("vehicle {}: {}; assuming passenger car", id, e);
                            (VehicleType::Car, VehicleRole::Normal)
                        }
                    };
                    self.vehicles.insert(
                        id.clone(),
                        Vehicle::new(id.as_str(), vehicle_type, role, position),
                    );
                    report.added_vehicles.push(id.clone());
                }
            }
        }
        report.removed_vehicles = retain_known(&mut self.vehicles, &vehicle_ids);

        Ok(report)
    }
}

/// Drop entries whose key is not in `known`, returning the dropped keys.
fn retain_known<V>(map: &mut BTreeMap<String, V>, known: &BTreeSet<String>) -> Vec<String> {
    let stale: Vec<String> = map
        .keys()
        .filter(|id| !known.contains(*id))
        .cloned()
        .collect();
    for id in &stale {
        map.remove(id);
    }
    stale
}
