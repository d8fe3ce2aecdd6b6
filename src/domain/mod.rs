//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod hierarchy;
pub mod statistics;
pub mod types;

pub use entities::{
    AnyEntity, Entity, EntityFactory, Intersection, IntersectionHandle, RoadConnection,
    TrafficLight, Vehicle,
};
pub use error::DomainError;
pub use hierarchy::{HierarchyDiff, HierarchyIssue, HierarchyNode};
pub use statistics::IntersectionStatistics;
pub use types::{
    AverageWaitingTimes, EntityType, GreenWaveCorridor, Position, TrafficLightDurations,
    TrafficLightState, VehicleRole, VehicleType,
};
