//! Event logger observer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::application::events::{Event, EventKind, Observer};
use crate::domain::TrafficLightState;

/// Logs every event through tracing and optionally appends it to a file.
#[derive(Debug, Default)]
pub struct EventLogger {
    file: Option<Mutex<File>>,
}

impl EventLogger {
    /// Logger writing to tracing only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger also appending to `path`. If the file cannot be opened the
    /// logger falls back to tracing only.
    pub fn with_file(path: &Path) -> Self {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                debug!("event log file {}", path.display());
                Self {
                    file: Some(Mutex::new(file)),
                }
            }
            Err(e) => {
                warn!("failed to open log file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn log(&self, message: &str) {
        info!(target: "trafficpulse::events", "{}", message);
        self.append(message);
    }

    pub fn log_traffic_light(&self, id: &str, state: TrafficLightState) {
        self.log(&format!("Traffic Light {} change state to {}", id, state));
    }

    pub fn log_intersection_stats(&self, id: &str, vehicle_count: usize) {
        self.log(&format!("Intersection {} has {} vehicles.", id, vehicle_count));
    }

    fn append(&self, message: &str) {
        let Some(file) = &self.file else {
            return;
        };
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        match file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}: {}", timestamp, message) {
                    warn!("failed to write event log: {}", e);
                }
            }
            Err(_) => warn!("event log file lock poisoned"),
        }
    }
}

impl Observer for EventLogger {
    fn update(&self, event: &Event) {
        match event.kind {
            // per-step events only go to tracing at debug level
            EventKind::SimulationStep => {
                debug!(target: "trafficpulse::events", "{}", event.message)
            }
            _ => self.log(&event.message),
        }
    }
}
