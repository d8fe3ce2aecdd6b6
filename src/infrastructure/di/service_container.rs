//! Service container for dependency injection
//!
//! Wires the simulation backend, event logger and traffic system together.

use std::sync::Arc;

use crate::application::{EventLogger, Subject, TrafficSystem};
use crate::config::Settings;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::sumo::SumoIntegration;
use crate::infrastructure::traits::SimulationBackend;

/// Factory for simulation backends, replaceable in tests.
pub type BackendFactory =
    Box<dyn Fn(&Settings) -> InfraResult<Box<dyn SimulationBackend>> + Send + Sync>;

/// Container holding the settings and how to build services from them.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    backend_factory: BackendFactory,
}

impl ServiceContainer {
    /// Create a container that launches SUMO.
    pub fn new(settings: Settings) -> Self {
        Self::with_backend_factory(
            settings,
            Box::new(|settings: &Settings| {
                let sumo = SumoIntegration::new(&settings.sumo)?;
                Ok(Box::new(sumo) as Box<dyn SimulationBackend>)
            }),
        )
    }

    /// Create a container with a custom backend factory (for testing).
    pub fn with_backend_factory(settings: Settings, backend_factory: BackendFactory) -> Self {
        Self {
            settings: Arc::new(settings),
            backend_factory,
        }
    }

    pub fn backend(&self) -> InfraResult<Box<dyn SimulationBackend>> {
        (self.backend_factory)(&self.settings)
    }

    /// Event logger writing to `system.log_file` when configured.
    pub fn event_logger(&self) -> Arc<EventLogger> {
        Arc::new(match &self.settings.system.log_file {
            Some(path) => EventLogger::with_file(path),
            None => EventLogger::new(),
        })
    }

    /// Traffic system with the event logger attached.
    pub fn traffic_system(&self) -> InfraResult<TrafficSystem> {
        let mut system = TrafficSystem::new((*self.settings).clone(), self.backend()?);
        system.attach(self.event_logger());
        Ok(system)
    }
}
