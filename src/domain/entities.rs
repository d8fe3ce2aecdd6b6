//! Domain entities: intersections, traffic lights, vehicles and the roads between them

use std::collections::BTreeMap;

use generational_arena::Index;

use crate::domain::statistics::IntersectionStatistics;
use crate::domain::types::{
    EntityType, Position, TrafficLightDurations, TrafficLightState, VehicleRole, VehicleType,
};
use crate::domain::DomainError;

/// Anything the simulation tracks by a string id.
pub trait Entity {
    fn id(&self) -> &str;
    fn entity_type(&self) -> EntityType;
}

/// Stable reference to an intersection stored in the data manager's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntersectionHandle(pub(crate) Index);

/// Directed road from the owning intersection to `to`.
///
/// The traffic light named here controls traffic entering `to` over this road.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadConnection {
    to: IntersectionHandle,
    traffic_light_id: String,
    /// Length in meters
    distance: f64,
}

impl RoadConnection {
    pub fn new(to: IntersectionHandle, traffic_light_id: impl Into<String>, distance: f64) -> Self {
        Self {
            to,
            traffic_light_id: traffic_light_id.into(),
            distance,
        }
    }

    pub fn connected_intersection(&self) -> IntersectionHandle {
        self.to
    }

    pub fn traffic_light_id(&self) -> &str {
        &self.traffic_light_id
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn set_traffic_light(&mut self, traffic_light_id: impl Into<String>) {
        self.traffic_light_id = traffic_light_id.into();
    }

    pub fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }
}

#[derive(Debug, Clone)]
pub struct Intersection {
    id: String,
    position: Position,
    connected_roads: BTreeMap<u32, RoadConnection>,
    statistics: IntersectionStatistics,
}

impl Intersection {
    pub fn new(id: impl Into<String>, position: Position) -> Self {
        let id = id.into();
        Self {
            statistics: IntersectionStatistics::new(id.clone()),
            id,
            position,
            connected_roads: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Attach an outgoing road. Road ids are unique per intersection.
    pub fn add_road_connection(
        &mut self,
        road_id: u32,
        connection: RoadConnection,
    ) -> Result<(), DomainError> {
        if self.connected_roads.contains_key(&road_id) {
            return Err(DomainError::DuplicateRoad {
                intersection: self.id.clone(),
                road_id,
            });
        }
        self.connected_roads.insert(road_id, connection);
        Ok(())
    }

    /// Outgoing roads in road-id order.
    pub fn connected_roads(&self) -> &BTreeMap<u32, RoadConnection> {
        &self.connected_roads
    }

    pub fn connected_roads_mut(&mut self) -> &mut BTreeMap<u32, RoadConnection> {
        &mut self.connected_roads
    }

    pub fn statistics(&self) -> &IntersectionStatistics {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut IntersectionStatistics {
        &mut self.statistics
    }
}

impl Entity for Intersection {
    fn id(&self) -> &str {
        &self.id
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Intersection
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficLight {
    id: String,
    state: TrafficLightState,
    durations: TrafficLightDurations,
}

impl TrafficLight {
    /// New light, initially red, with default phase durations.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_durations(id, TrafficLightDurations::default())
    }

    pub fn with_durations(id: impl Into<String>, durations: TrafficLightDurations) -> Self {
        Self {
            id: id.into(),
            state: TrafficLightState::Red,
            durations,
        }
    }

    pub fn state(&self) -> TrafficLightState {
        self.state
    }

    pub fn set_state(&mut self, state: TrafficLightState) {
        self.state = state;
    }

    pub fn durations(&self) -> TrafficLightDurations {
        self.durations
    }

    pub fn set_durations(&mut self, durations: TrafficLightDurations) {
        self.durations = durations;
    }
}

impl Entity for TrafficLight {
    fn id(&self) -> &str {
        &self.id
    }

    fn entity_type(&self) -> EntityType {
        EntityType::TrafficLight
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    id: String,
    vehicle_type: VehicleType,
    role: VehicleRole,
    position: Position,
}

impl Vehicle {
    pub fn new(
        id: impl Into<String>,
        vehicle_type: VehicleType,
        role: VehicleRole,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            vehicle_type,
            role,
            position,
        }
    }

    pub fn vehicle_type(&self) -> VehicleType {
        self.vehicle_type
    }

    pub fn role(&self) -> VehicleRole {
        self.role
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn update_position(&mut self, position: Position) {
        self.position = position;
    }
}

impl Entity for Vehicle {
    fn id(&self) -> &str {
        &self.id
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Vehicle
    }
}

/// One of the concrete entity kinds, as produced by [`EntityFactory`].
#[derive(Debug, Clone)]
pub enum AnyEntity {
    Intersection(Intersection),
    TrafficLight(TrafficLight),
    Vehicle(Vehicle),
}

impl AnyEntity {
    pub fn as_intersection(&self) -> Option<&Intersection> {
        match self {
            AnyEntity::Intersection(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_traffic_light(&self) -> Option<&TrafficLight> {
        match self {
            AnyEntity::TrafficLight(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_vehicle(&self) -> Option<&Vehicle> {
        match self {
            AnyEntity::Vehicle(v) => Some(v),
            _ => None,
        }
    }
}

impl Entity for AnyEntity {
    fn id(&self) -> &str {
        match self {
            AnyEntity::Intersection(i) => i.id(),
            AnyEntity::TrafficLight(t) => t.id(),
            AnyEntity::Vehicle(v) => v.id(),
        }
    }

    fn entity_type(&self) -> EntityType {
        match self {
            AnyEntity::Intersection(_) => EntityType::Intersection,
            AnyEntity::TrafficLight(_) => EntityType::TrafficLight,
            AnyEntity::Vehicle(_) => EntityType::Vehicle,
        }
    }
}

/// Builds entities from a type tag; fields irrelevant to a type are ignored.
pub struct EntityFactory;

impl EntityFactory {
    pub fn create(
        entity_type: EntityType,
        id: &str,
        position: Position,
        vehicle_type: VehicleType,
        vehicle_role: VehicleRole,
    ) -> AnyEntity {
        match entity_type {
            EntityType::Intersection => AnyEntity::Intersection(Intersection::new(id, position)),
            EntityType::TrafficLight => AnyEntity::TrafficLight(TrafficLight::new(id)),
            EntityType::Vehicle => {
                AnyEntity::Vehicle(Vehicle::new(id, vehicle_type, vehicle_role, position))
            }
        }
    }

    /// Like [`EntityFactory::create`] but with the type given by name.
    pub fn create_named(type_name: &str, id: &str, position: Position) -> Result<AnyEntity, DomainError> {
        let entity_type = type_name.parse::<EntityType>()?;
        Ok(Self::create(
            entity_type,
            id,
            position,
            VehicleType::default(),
            VehicleRole::default(),
        ))
    }
}
