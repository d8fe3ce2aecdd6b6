//! Integration tests for synchronising the data manager with a simulation backend.

use trafficpulse::application::{ApplicationError, DataManager};
use trafficpulse::domain::{
    Entity, Intersection, Position, TrafficLight, TrafficLightState, VehicleRole, VehicleType,
};
use trafficpulse::infrastructure::{ErrorCode, SimulationBackend};
use trafficpulse::util::testing::{init_test_setup, MockBackend, MockEvent};

fn started(mock: MockBackend) -> MockBackend {
    init_test_setup();
    let mut backend = mock.clone();
    backend.start().unwrap();
    mock
}

#[test]
fn given_simulated_lights_when_syncing_then_intersections_created_at_origin() {
    let mut backend = started(
        MockBackend::new()
            .with_light("J1", "GGrr")
            .with_light("J2", "yyyy"),
    );
    let mut dm = DataManager::new();

    let report = dm.sync_from_sumo(&mut backend).unwrap();

    assert_eq!(report.added_traffic_lights, vec!["J1", "J2"]);
    assert_eq!(
        dm.traffic_light("J1").unwrap().state(),
        TrafficLightState::Green
    );
    assert_eq!(
        dm.traffic_light("J2").unwrap().state(),
        TrafficLightState::Yellow
    );
    assert_eq!(dm.intersection_count(), 2);
    assert_eq!(
        dm.intersection("J2").unwrap().position(),
        Position::default()
    );
}

#[test]
fn given_loaded_intersection_when_syncing_then_position_is_kept() {
    let mut backend = started(MockBackend::new().with_light("J1", "rr"));
    let mut dm = DataManager::new();
    dm.add_intersection(Intersection::new("J1", Position::new(12.0, 34.0)));

    dm.sync_from_sumo(&mut backend).unwrap();

    assert_eq!(dm.intersection_count(), 1);
    assert_eq!(
        dm.intersection("J1").unwrap().position(),
        Position::new(12.0, 34.0)
    );
}

#[test]
fn given_vehicles_when_syncing_then_types_and_roles_mapped() {
    let mut backend = started(
        MockBackend::new()
            .with_vehicle("truck_1", Position::new(1.0, 2.0), Some("truck"))
            .with_vehicle("amb", Position::new(3.0, 4.0), Some("ambulance"))
            .with_vehicle("mystery", Position::new(5.0, 6.0), None),
    );
    let mut dm = DataManager::new();

    let report = dm.sync_from_sumo(&mut backend).unwrap();

    assert_eq!(report.added_vehicles, vec!["amb", "mystery", "truck_1"]);
    let truck = dm.vehicle("truck_1").unwrap();
    assert_eq!(truck.vehicle_type(), VehicleType::Truck);
    assert_eq!(truck.role(), VehicleRole::Normal);
    assert_eq!(truck.position(), Position::new(1.0, 2.0));
    assert_eq!(dm.vehicle("amb").unwrap().role(), VehicleRole::Emergency);

    // a failing type query falls back to an ordinary car
    let mystery = dm.vehicle("mystery").unwrap();
    assert_eq!(mystery.vehicle_type(), VehicleType::Car);
    assert_eq!(mystery.role(), VehicleRole::Normal);
}

#[test]
fn given_vehicle_arrives_and_departs_when_updating_then_report_tracks_both() {
    let mut backend = started(
        MockBackend::new()
            .with_vehicle("v0", Position::new(0.0, 0.0), Some("passenger"))
            .on_step(
                1,
                MockEvent::Arrive {
                    id: "v1".into(),
                    position: Position::new(10.0, 0.0),
                    sumo_type: "truck".into(),
                },
            )
            .on_step(2, MockEvent::Depart { id: "v0".into() }),
    );
    let mut dm = DataManager::new();
    dm.sync_from_sumo(&mut backend).unwrap();

    backend.step().unwrap();
    let first = dm.update_from_sumo(&mut backend).unwrap();
    assert_eq!(first.added_vehicles, vec!["v1"]);
    assert!(first.removed_vehicles.is_empty());

    backend.step().unwrap();
    let second = dm.update_from_sumo(&mut backend).unwrap();
    assert!(second.added_vehicles.is_empty());
    assert_eq!(second.removed_vehicles, vec!["v0"]);
    assert!(dm.vehicle("v0").is_none());
    assert_eq!(dm.vehicles().map(|v| v.id()).collect::<Vec<_>>(), vec!["v1"]);

    backend.step().unwrap();
    assert!(dm.update_from_sumo(&mut backend).unwrap().is_empty());
}

#[test]
fn given_moving_vehicle_when_updating_then_position_refreshed() {
    let mut backend = started(MockBackend::new().with_vehicle(
        "v",
        Position::new(0.0, 0.0),
        Some("passenger"),
    ));
    let mut dm = DataManager::new();
    dm.sync_from_sumo(&mut backend).unwrap();

    backend.state().vehicles.get_mut("v").unwrap().position = Position::new(7.0, 8.0);
    dm.update_from_sumo(&mut backend).unwrap();

    assert_eq!(dm.vehicle("v").unwrap().position(), Position::new(7.0, 8.0));
}

#[test]
fn given_light_vanishes_when_updating_then_only_simulated_lights_removed() {
    let mut backend = started(
        MockBackend::new()
            .with_light("S1", "GG")
            .with_light("S2", "rr"),
    );
    let mut dm = DataManager::new();
    dm.add_traffic_light(TrafficLight::new("local"));
    dm.sync_from_sumo(&mut backend).unwrap();
    assert!(dm.is_simulated_light("S2"));
    assert!(!dm.is_simulated_light("local"));

    backend.state().lights.remove("S2");
    let report = dm.update_from_sumo(&mut backend).unwrap();

    assert_eq!(report.removed_traffic_lights, vec!["S2"]);
    assert!(dm.traffic_light("S2").is_none());
    assert!(dm.traffic_light("local").is_some());
    // intersections survive light removal
    assert!(dm.intersection("S2").is_some());
}

#[test]
fn given_stopped_backend_when_syncing_then_not_running_error() {
    init_test_setup();
    let mut backend = MockBackend::new().with_light("J1", "G");
    let mut dm = DataManager::new();

    let err = dm.sync_from_sumo(&mut backend).unwrap_err();

    match err {
        ApplicationError::Simulation(e) => assert_eq!(e.code(), ErrorCode::NotRunning),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(dm.intersection_count(), 0);
}
