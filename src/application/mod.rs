//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod bfs;
pub mod data_manager;
pub mod error;
pub mod error_ext;
pub mod events;
pub mod loader;
pub mod logger;
pub mod system;
pub mod traffic_algo;

pub use data_manager::{DataManager, SyncReport};
pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use events::{Event, EventData, EventKind, Observer, ObserverList, Subject};
pub use loader::{LoadProgress, LoadStage, LoadSummary, NetworkLoader};
pub use logger::EventLogger;
pub use system::{StopHandle, TrafficSystem};
pub use traffic_algo::{GreenWave, LightChange};
