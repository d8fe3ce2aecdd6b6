//! Value types shared by entities, the loader and the green-wave algorithm.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Planar position in SUMO network coordinates (meters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Signal shown by a traffic light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficLightState {
    #[default]
    Red,
    Yellow,
    Green,
    /// Flashing yellow, signals a malfunction.
    Unknown,
    Walk,
    DontWalk,
}

impl TrafficLightState {
    /// Collapse a SUMO red/yellow/green link string into a single state.
    ///
    /// Any green link wins over yellow, any yellow over red.
    pub fn from_sumo_state(state: &str) -> Self {
        if state.chars().any(|c| c == 'G' || c == 'g') {
            TrafficLightState::Green
        } else if state.chars().any(|c| c == 'y' || c == 'Y') {
            TrafficLightState::Yellow
        } else if state.chars().any(|c| c == 'r' || c == 'R') {
            TrafficLightState::Red
        } else {
            TrafficLightState::Unknown
        }
    }

    /// Uniform SUMO link string of `links` characters for this state.
    pub fn to_sumo_state(&self, links: usize) -> String {
        let c = match self {
            TrafficLightState::Green | TrafficLightState::Walk => 'G',
            TrafficLightState::Yellow => 'y',
            TrafficLightState::Red | TrafficLightState::DontWalk => 'r',
            TrafficLightState::Unknown => 'o',
        };
        std::iter::repeat(c).take(links).collect()
    }
}

impl fmt::Display for TrafficLightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrafficLightState::Red => "RED",
            TrafficLightState::Yellow => "YELLOW",
            TrafficLightState::Green => "GREEN",
            TrafficLightState::Unknown => "UNKNOWN",
            TrafficLightState::Walk => "WALK",
            TrafficLightState::DontWalk => "DONT_WALK",
        };
        f.write_str(s)
    }
}

/// Phase durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficLightDurations {
    pub red: f64,
    pub yellow: f64,
    pub green: f64,
    pub walk: f64,
    pub dont_walk: f64,
}

impl Default for TrafficLightDurations {
    fn default() -> Self {
        Self {
            red: 30.0,
            yellow: 5.0,
            green: 30.0,
            walk: 15.0,
            dont_walk: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    #[default]
    Car,
    Bus,
    Motorcycle,
    Truck,
    Tram,
    EScooter,
    Bicycle,
    Pedestrian,
    Emergency,
}

impl VehicleType {
    /// Map a SUMO vehicle type id onto a vehicle type. Unknown ids count as cars.
    pub fn from_sumo_type(sumo_type: &str) -> Self {
        match sumo_type {
            "passenger" => VehicleType::Car,
            "truck" | "trailer" => VehicleType::Truck,
            "emergency" => VehicleType::Emergency,
            _ => VehicleType::Car,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleRole {
    #[default]
    Normal,
    Emergency,
}

impl VehicleRole {
    pub fn from_sumo_type(sumo_type: &str) -> Self {
        match sumo_type {
            "police" | "fire" | "ambulance" => VehicleRole::Emergency,
            _ => VehicleRole::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Intersection,
    TrafficLight,
    Vehicle,
}

impl FromStr for EntityType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intersection" => Ok(EntityType::Intersection),
            "traffic_light" | "traffic-light" => Ok(EntityType::TrafficLight),
            "vehicle" => Ok(EntityType::Vehicle),
            _ => Err(DomainError::UnknownEntityType(s.to_string())),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Intersection => "intersection",
            EntityType::TrafficLight => "traffic_light",
            EntityType::Vehicle => "vehicle",
        };
        f.write_str(s)
    }
}

/// Ordered chain of intersections along which lights are offset to form a green wave.
#[derive(Debug, Clone, PartialEq)]
pub struct GreenWaveCorridor {
    pub intersection_ids: Vec<String>,
    /// Speed the wave is timed for (m/s)
    pub target_speed_m_s: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AverageWaitingTimes {
    pub pedestrians: f64,
    pub vehicles: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rGrG", TrafficLightState::Green)]
    #[case("rrgg", TrafficLightState::Green)]
    #[case("ryry", TrafficLightState::Yellow)]
    #[case("rrrr", TrafficLightState::Red)]
    #[case("oooo", TrafficLightState::Unknown)]
    #[case("", TrafficLightState::Unknown)]
    fn test_from_sumo_state(#[case] input: &str, #[case] expected: TrafficLightState) {
        assert_eq!(TrafficLightState::from_sumo_state(input), expected);
    }

    #[test]
    fn test_to_sumo_state_is_uniform() {
        assert_eq!(TrafficLightState::Green.to_sumo_state(4), "GGGG");
        assert_eq!(TrafficLightState::Red.to_sumo_state(2), "rr");
        assert_eq!(TrafficLightState::Yellow.to_sumo_state(0), "");
    }

    #[rstest]
    #[case("passenger", VehicleType::Car)]
    #[case("truck", VehicleType::Truck)]
    #[case("trailer", VehicleType::Truck)]
    #[case("emergency", VehicleType::Emergency)]
    #[case("bus", VehicleType::Car)]
    fn test_vehicle_type_from_sumo(#[case] input: &str, #[case] expected: VehicleType) {
        assert_eq!(VehicleType::from_sumo_type(input), expected);
    }

    #[rstest]
    #[case("police", VehicleRole::Emergency)]
    #[case("fire", VehicleRole::Emergency)]
    #[case("ambulance", VehicleRole::Emergency)]
    #[case("passenger", VehicleRole::Normal)]
    fn test_vehicle_role_from_sumo(#[case] input: &str, #[case] expected: VehicleRole) {
        assert_eq!(VehicleRole::from_sumo_type(input), expected);
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!("Intersection".parse::<EntityType>().unwrap(), EntityType::Intersection);
        assert_eq!("traffic-light".parse::<EntityType>().unwrap(), EntityType::TrafficLight);
        assert!(matches!(
            "tram".parse::<EntityType>(),
            Err(DomainError::UnknownEntityType(name)) if name == "tram"
        ));
    }

    #[test]
    fn test_default_durations() {
        let d = TrafficLightDurations::default();
        assert_eq!(d.red, 30.0);
        assert_eq!(d.yellow, 5.0);
        assert_eq!(d.green, 30.0);
        assert_eq!(d.walk, 15.0);
        assert_eq!(d.dont_walk, 5.0);
    }
}
