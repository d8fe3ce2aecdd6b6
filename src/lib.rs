//! trafficpulse: SUMO co-simulation with green wave traffic light coordination.
//!
//! Layers, leaves first:
//! - [`domain`]: entities, value types, documentation hierarchy listings (no I/O)
//! - [`application`]: data manager, network loader, green wave, simulation loop, events
//! - [`infrastructure`]: TraCI client, SUMO process, service container
//! - [`cli`]: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
