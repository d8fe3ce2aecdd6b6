//! SUMO co-simulation over TraCI.

pub mod client;
pub mod integration;
pub mod traci;

pub use client::TraciConnection;
pub use integration::SumoIntegration;
pub use traci::TraciError;
