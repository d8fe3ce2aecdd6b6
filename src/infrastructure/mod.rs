//! Infrastructure layer: simulator integration and DI container
//!
//! This layer implements the I/O boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod sumo;
pub mod traits;

pub use error::{ErrorCode, InfraError, InfraResult, SimResult, SimulationError};
pub use traits::SimulationBackend;
