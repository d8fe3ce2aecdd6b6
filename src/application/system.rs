//! Simulation loop: load, start, step, coordinate, stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::application::events::{Event, EventData, EventKind, Observer, ObserverList, Subject};
use crate::application::loader::{LoadSummary, NetworkLoader};
use crate::application::traffic_algo::{GreenWave, LightChange};
use crate::application::{ApplicationError, ApplicationResult, DataManager, SyncReport};
use crate::config::Settings;
use crate::infrastructure::traits::SimulationBackend;

/// Thread-safe request to end [`TrafficSystem::run`] after the current step.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct TrafficSystem {
    settings: Settings,
    backend: Box<dyn SimulationBackend>,
    data: DataManager,
    green_wave: GreenWave,
    observers: ObserverList,
    stop: StopHandle,
    max_steps: Option<u64>,
    steps: u64,
    /// Set once `initialize` has started the backend
    started: bool,
}

impl std::fmt::Debug for TrafficSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficSystem")
            .field("steps", &self.steps)
            .field("max_steps", &self.max_steps)
            .field("observers", &self.observers)
            .finish()
    }
}

impl TrafficSystem {
    pub fn new(settings: Settings, backend: Box<dyn SimulationBackend>) -> Self {
        Self {
            green_wave: GreenWave::new(settings.algo),
            settings,
            backend,
            data: DataManager::new(),
            observers: ObserverList::new(),
            stop: StopHandle::default(),
            max_steps: None,
            steps: 0,
            started: false,
        }
    }

    /// Stop after `max_steps` simulation steps.
    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.data
    }

    pub fn green_wave(&self) -> &GreenWave {
        &self.green_wave
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Load `system.net_file` (if any) into the data manager.
    ///
    /// `LoadingStart` and `LoadingComplete` are sent even without a network.
    pub fn load_network(&mut self) -> ApplicationResult<Option<LoadSummary>> {
        self.notify(&Event::new(EventKind::LoadingStart, "Loading started"));

        let summary = match self.settings.system.net_file.clone() {
            Some(path) => {
                let loader = NetworkLoader::new(path);
                let observers = &self.observers;
                let summary = loader.load(&mut self.data, |p| {
                    observers.notify(&Event::with_data(
                        EventKind::LoadingProgress,
                        format!("Loaded {}", p.stage),
                        EventData::Progress(p.fraction),
                    ));
                })?;
                Some(summary)
            }
            None => {
                debug!("no network file configured");
                None
            }
        };

        self.notify(&Event::new(EventKind::LoadingComplete, "Loading complete"));
        Ok(summary)
    }

    /// Start the backend, import its state and compute the green wave.
    #[instrument(level = "debug", skip(self))]
    pub fn initialize(&mut self) -> ApplicationResult<SyncReport> {
        self.backend.start()?;
        self.started = true;
        let report = self.data.sync_from_sumo(self.backend.as_mut())?;
        self.green_wave.initialize(&self.data);
        info!(
            "simulation started: {} intersections, {} scheduled",
            self.data.intersection_count(),
            self.green_wave.offsets().len()
        );
        self.notify(&Event::new(EventKind::SimulationStart, "Simulation started"));
        Ok(report)
    }

    /// Advance one step, refresh the model and apply the green wave.
    /// Returns the simulation time after the step.
    pub fn step_simulation(&mut self) -> ApplicationResult<f64> {
        self.backend.step()?;
        self.steps += 1;

        let report = self.data.update_from_sumo(self.backend.as_mut())?;
        self.notify_vehicles(&report);

        let sim_time = self.backend.simulation_time()?;
        for change in self.green_wave.run_once(&mut self.data, sim_time) {
            self.push_light(&change)?;
            self.notify(&Event::with_data(
                EventKind::TrafficLightChange,
                format!(
                    "Traffic Light {} change state to {}",
                    change.traffic_light_id, change.state
                ),
                EventData::TrafficLight {
                    id: change.traffic_light_id.clone(),
                    state: change.state,
                },
            ));
        }

        self.notify(&Event::with_data(
            EventKind::SimulationStep,
            format!("Step {} at t={:.1}s", self.steps, sim_time),
            EventData::Time(sim_time),
        ));
        Ok(sim_time)
    }

    /// Stop the backend (if this system started it) and send `SimulationEnd`.
    pub fn shutdown(&mut self) -> ApplicationResult<()> {
        if std::mem::take(&mut self.started) && self.backend.is_running() {
            self.backend.stop()?;
        }
        self.notify(&Event::new(EventKind::SimulationEnd, "Simulation ended"));
        Ok(())
    }

    /// Run until a stop is requested or `max_steps` is reached.
    ///
    /// Once the backend has been started, any failure still stops it and
    /// sends `SimulationEnd` before the error is returned.
    #[instrument(level = "debug", skip(self))]
    pub fn run(&mut self) -> ApplicationResult<()> {
        self.load_network()?;

        let result = match self.initialize() {
            Ok(_) => self.step_loop(),
            Err(e) if self.started => Err(e),
            Err(e) => return Err(e),
        };
        if let Err(e) = &result {
            warn!("simulation failed: {}", e);
        }
        let stopped = self.shutdown();
        result.and(stopped)
    }

    fn step_loop(&mut self) -> ApplicationResult<()> {
        let frequency = self.settings.system.update_frequency;
        let pause = Duration::try_from_secs_f64(1.0 / frequency).map_err(|e| {
            ApplicationError::Config {
                message: format!("system.update_frequency {frequency}: {e}"),
            }
        })?;
        while !self.stop.is_stop_requested() {
            if self.max_steps.is_some_and(|max| self.steps >= max) {
                debug!("reached {} steps", self.steps);
                break;
            }
            self.step_simulation()?;
            thread::sleep(pause);
        }
        Ok(())
    }

    /// Mirror a local light change into the simulator, sized to the light's
    /// current link string. Lights the simulator does not know stay local.
    fn push_light(&mut self, change: &LightChange) -> ApplicationResult<()> {
        let id = &change.traffic_light_id;
        if !self.data.is_simulated_light(id) {
            return Ok(());
        }
        let links = self.backend.traffic_light_state(id)?.chars().count();
        let state = change.state.to_sumo_state(links);
        self.backend.set_traffic_light_state(id, &state)?;
        Ok(())
    }

    fn notify_vehicles(&self, report: &SyncReport) {
        for id in &report.added_vehicles {
            self.notify(&Event::with_data(
                EventKind::VehicleStatusChange,
                format!("Vehicle {} entered", id),
                EventData::Vehicle {
                    id: id.clone(),
                    present: true,
                },
            ));
        }
        for id in &report.removed_vehicles {
            self.notify(&Event::with_data(
                EventKind::VehicleStatusChange,
                format!("Vehicle {} left", id),
                EventData::Vehicle {
                    id: id.clone(),
                    present: false,
                },
            ));
        }
    }
}

impl Subject for TrafficSystem {
    fn attach(&mut self, observer: Arc<dyn Observer>) {
        self.observers.attach(observer);
    }

    fn detach(&mut self, observer: &Arc<dyn Observer>) {
        self.observers.detach(observer);
    }

    fn notify(&self, event: &Event) {
        self.observers.notify(event);
    }
}
