//! Integration tests for SUMO config resolution and the stopped-simulation contract.

use std::fs;
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use trafficpulse::config::SumoSettings;
use trafficpulse::infrastructure::sumo::SumoIntegration;
use trafficpulse::infrastructure::{ErrorCode, SimulationBackend};
use trafficpulse::util::testing::init_test_setup;

fn settings_in(dir: &TempDir) -> SumoSettings {
    SumoSettings {
        config_dir: dir.path().join("sumo"),
        ..SumoSettings::default()
    }
}

#[test]
fn given_missing_config_dir_when_creating_then_invalid_file_path() {
    init_test_setup();
    let temp = TempDir::new().unwrap();

    let err = SumoIntegration::new(&settings_in(&temp)).unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidFilePath);
    assert!(err
        .message()
        .starts_with("SUMO config directory not found. Expected at:"));
}

#[test]
fn given_missing_config_file_when_creating_then_invalid_file_path() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("sumo")).unwrap();

    let err = SumoIntegration::new(&settings_in(&temp)).unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidFilePath);
    assert!(err.message().contains("simulation.sumocfg"));
}

#[test]
fn given_existing_config_when_creating_then_path_resolved_in_dir() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("sumo")).unwrap();
    fs::write(temp.path().join("sumo/simulation.sumocfg"), "<configuration/>").unwrap();

    let sumo = SumoIntegration::new(&settings_in(&temp)).unwrap();

    assert_eq!(
        sumo.config_path(),
        temp.path().join("sumo/simulation.sumocfg")
    );
    assert!(!sumo.is_running());
}

#[test]
fn given_stopped_simulation_when_querying_then_not_running() {
    let temp = TempDir::new().unwrap();
    let settings = SumoSettings {
        config_file: temp.path().join("any.sumocfg").display().to_string(),
        bypass_config_check: true,
        ..SumoSettings::default()
    };
    let mut sumo = SumoIntegration::new(&settings).unwrap();

    assert_eq!(sumo.step().unwrap_err().code(), ErrorCode::NotRunning);
    assert_eq!(sumo.stop().unwrap_err().code(), ErrorCode::NotRunning);
    assert_eq!(
        sumo.simulation_time().unwrap_err().code(),
        ErrorCode::NotRunning
    );
    assert_eq!(
        sumo.set_traffic_light_state("J1", "GGrr").unwrap_err().code(),
        ErrorCode::NotRunning
    );
}

#[test]
fn given_missing_binary_when_starting_then_error_and_still_stopped() {
    let temp = TempDir::new().unwrap();
    let settings = SumoSettings {
        binary: temp.path().join("no-such-sumo").display().to_string(),
        config_file: "unused.sumocfg".into(),
        bypass_config_check: true,
        ..SumoSettings::default()
    };
    let mut sumo = SumoIntegration::new(&settings).unwrap();

    let err = sumo.start().unwrap_err();

    assert!(err.message().contains("Failed to start SUMO binary"));
    assert!(!sumo.is_running());
}

// ============================================================
// stop() against a broken TraCI connection
// ============================================================

#[cfg(unix)]
#[test]
fn given_dropped_connection_when_stopping_then_process_killed_and_stop_returns() {
    init_test_setup();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        drop(stream);
    });
    // `sh -c "sleep 20" --remote-port <port>` outlives the connection
    let settings = SumoSettings {
        binary: "sh".into(),
        config_file: "sleep 20".into(),
        bypass_config_check: true,
        host: "127.0.0.1".into(),
        port,
        connect_retries: 2,
        retry_delay_ms: 10,
        ..SumoSettings::default()
    };
    let mut sumo = SumoIntegration::new(&settings).unwrap();
    sumo.start().unwrap();
    server.join().unwrap();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = sumo.stop();
        let running = sumo.is_running();
        tx.send((result, running)).unwrap();
    });

    let (result, running) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("stop() did not return");
    assert!(result.is_err());
    assert!(!running);
}
