//! Test support: tracing setup and an in-memory simulation backend.

use std::collections::BTreeMap;
use std::env;
use std::sync::{Arc, Mutex, MutexGuard, Once};

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::Position;
use crate::infrastructure::error::{ErrorCode, SimResult, SimulationError};
use crate::infrastructure::traits::SimulationBackend;

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");

    // roxmltree and friends stay quiet
    let noisy_modules = ["roxmltree"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockVehicle {
    pub position: Position,
    /// SUMO type id; `None` makes the type query fail
    pub sumo_type: Option<String>,
}

/// A scripted change applied right after the given step completes.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Arrive {
        id: String,
        position: Position,
        sumo_type: String,
    },
    Depart {
        id: String,
    },
}

/// Observable state of a [`MockBackend`].
#[derive(Debug, Clone)]
pub struct MockState {
    pub running: bool,
    pub time: f64,
    pub step_length: f64,
    pub steps: u64,
    pub start_calls: u32,
    pub stop_calls: u32,
    pub vehicles: BTreeMap<String, MockVehicle>,
    /// Traffic light id -> SUMO link state string
    pub lights: BTreeMap<String, String>,
    /// Every `set_traffic_light_state` call in order
    pub set_calls: Vec<(String, String)>,
    pub script: BTreeMap<u64, Vec<MockEvent>>,
    /// Fail the step with this number (1-based)
    pub fail_step: Option<u64>,
    /// Fail every state query for this traffic light
    pub fail_light_state: Option<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            running: false,
            time: 0.0,
            step_length: 1.0,
            steps: 0,
            start_calls: 0,
            stop_calls: 0,
            vehicles: BTreeMap::new(),
            lights: BTreeMap::new(),
            set_calls: vec![],
            script: BTreeMap::new(),
            fail_step: None,
            fail_light_state: None,
        }
    }
}

/// In-memory [`SimulationBackend`]; clones share state so a test can inspect
/// a backend that was moved into a `TrafficSystem`.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_light(self, id: &str, sumo_state: &str) -> Self {
        self.state().lights.insert(id.into(), sumo_state.into());
        self
    }

    pub fn with_vehicle(self, id: &str, position: Position, sumo_type: Option<&str>) -> Self {
        self.state().vehicles.insert(
            id.into(),
            MockVehicle {
                position,
                sumo_type: sumo_type.map(String::from),
            },
        );
        self
    }

    pub fn on_step(self, step: u64, event: MockEvent) -> Self {
        self.state().script.entry(step).or_default().push(event);
        self
    }

    fn running(&self, action: &str) -> SimResult<MutexGuard<'_, MockState>> {
        let state = self.state();
        if state.running {
            Ok(state)
        } else {
            Err(SimulationError::not_running(action))
        }
    }
}

impl SimulationBackend for MockBackend {
    fn start(&mut self) -> SimResult<()> {
        let mut state = self.state();
        if state.running {
            return Err(SimulationError::new(
                ErrorCode::AlreadyRunning,
                "SUMO simulation already running.",
            ));
        }
        state.running = true;
        state.start_calls += 1;
        Ok(())
    }

    fn step(&mut self) -> SimResult<()> {
        let mut state = self.running("step simulation")?;
        let step = state.steps + 1;
        if state.fail_step == Some(step) {
            return Err(SimulationError::new(ErrorCode::Unknown, "scripted step failure"));
        }
        state.steps = step;
        state.time += state.step_length;

        for event in state.script.remove(&step).unwrap_or_default() {
            match event {
                MockEvent::Arrive {
                    id,
                    position,
                    sumo_type,
                } => {
                    state.vehicles.insert(
                        id,
                        MockVehicle {
                            position,
                            sumo_type: Some(sumo_type),
                        },
                    );
                }
                MockEvent::Depart { id } => {
                    state.vehicles.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> SimResult<()> {
        let mut state = self.running("stop simulation")?;
        state.running = false;
        state.stop_calls += 1;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn simulation_time(&mut self) -> SimResult<f64> {
        Ok(self.running("get simulation time")?.time)
    }

    fn vehicle_ids(&mut self) -> SimResult<Vec<String>> {
        Ok(self.running("get vehicle IDs")?.vehicles.keys().cloned().collect())
    }

    fn vehicle_position(&mut self, vehicle_id: &str) -> SimResult<Position> {
        self.running("get vehicle position")?
            .vehicles
            .get(vehicle_id)
            .map(|v| v.position)
            .ok_or_else(|| {
                SimulationError::new(ErrorCode::Unknown, format!("unknown vehicle {vehicle_id}"))
            })
    }

    fn vehicle_type(&mut self, vehicle_id: &str) -> SimResult<String> {
        self.running("get vehicle type")?
            .vehicles
            .get(vehicle_id)
            .and_then(|v| v.sumo_type.clone())
            .ok_or_else(|| {
                SimulationError::new(
                    ErrorCode::ParsingError,
                    format!("Failed to get vehicle type for {vehicle_id}"),
                )
            })
    }

    fn traffic_light_ids(&mut self) -> SimResult<Vec<String>> {
        Ok(self
            .running("get traffic light IDs")?
            .lights
            .keys()
            .cloned()
            .collect())
    }

    fn traffic_light_state(&mut self, traffic_light_id: &str) -> SimResult<String> {
        let guard = self.running("get traffic light state")?;
        if guard.fail_light_state.as_deref() == Some(traffic_light_id) {
            return Err(SimulationError::new(
                ErrorCode::Unknown,
                format!("Failed to get traffic light state for {traffic_light_id}"),
            ));
        }
        guard
            .lights
            .get(traffic_light_id)
            .cloned()
            .ok_or_else(|| {
                SimulationError::new(
                    ErrorCode::Unknown,
                    format!("unknown traffic light {traffic_light_id}"),
                )
            })
    }

    fn set_traffic_light_state(&mut self, traffic_light_id: &str, state: &str) -> SimResult<()> {
        let mut guard = self.running("set traffic light state")?;
        if !guard.lights.contains_key(traffic_light_id) {
            return Err(SimulationError::new(
                ErrorCode::Unknown,
                format!("unknown traffic light {traffic_light_id}"),
            ));
        }
        guard
            .lights
            .insert(traffic_light_id.to_string(), state.to_string());
        guard
            .set_calls
            .push((traffic_light_id.to_string(), state.to_string()));
        Ok(())
    }
}
