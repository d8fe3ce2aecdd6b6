//! I/O boundary traits for testability
//!
//! The simulation backend abstracts the external traffic simulator, allowing
//! services to be tested with mock implementations.

use crate::domain::Position;
use crate::infrastructure::error::SimResult;

/// A running (or startable) microscopic traffic simulation.
///
/// Every query fails with `ErrorCode::NotRunning` while the simulation is stopped.
pub trait SimulationBackend: Send {
    /// Launch the simulation. Fails with `ErrorCode::AlreadyRunning` if already started.
    fn start(&mut self) -> SimResult<()>;

    /// Advance the simulation by one step.
    fn step(&mut self) -> SimResult<()>;

    fn stop(&mut self) -> SimResult<()>;

    fn is_running(&self) -> bool;

    /// Current simulation time in seconds.
    fn simulation_time(&mut self) -> SimResult<f64>;

    fn vehicle_ids(&mut self) -> SimResult<Vec<String>>;

    fn vehicle_position(&mut self, vehicle_id: &str) -> SimResult<Position>;

    /// Simulator type id of a vehicle, e.g. "passenger" or "truck".
    fn vehicle_type(&mut self, vehicle_id: &str) -> SimResult<String>;

    fn traffic_light_ids(&mut self) -> SimResult<Vec<String>>;

    /// Red/yellow/green link string, one character per controlled link.
    fn traffic_light_state(&mut self, traffic_light_id: &str) -> SimResult<String>;

    fn set_traffic_light_state(&mut self, traffic_light_id: &str, state: &str) -> SimResult<()>;
}
