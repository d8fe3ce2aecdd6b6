//! Green wave coordination.
//!
//! A corridor is the BFS order of intersections from the lexicographically
//! smallest id. Each intersection gets a green offset equal to the travel time
//! (at the target speed) accumulated along the corridor, modulo the cycle.

use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::{debug, instrument, trace};

use crate::application::bfs::run_bfs;
use crate::application::DataManager;
use crate::config::AlgoSettings;
use crate::domain::{Entity, GreenWaveCorridor, TrafficLightState};

/// A traffic light whose state was changed by [`GreenWave::run_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightChange {
    pub traffic_light_id: String,
    pub previous: TrafficLightState,
    pub state: TrafficLightState,
}

#[derive(Debug, Clone)]
pub struct GreenWave {
    settings: AlgoSettings,
    offsets: BTreeMap<String, f64>,
}

impl GreenWave {
    pub fn new(settings: AlgoSettings) -> Self {
        Self {
            settings,
            offsets: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &AlgoSettings {
        &self.settings
    }

    /// Green offset per intersection id, in seconds.
    pub fn offsets(&self) -> &BTreeMap<String, f64> {
        &self.offsets
    }

    pub fn find_main_corridors(&self, dm: &DataManager) -> Vec<GreenWaveCorridor> {
        // intersections() iterates in id order
        let Some(root) = dm.intersections().next() else {
            return vec![];
        };

        let order = run_bfs(root.id(), |id| {
            dm.neighbors(id)
                .into_iter()
                .map(|(next, _)| next.id().to_string())
                .collect::<Vec<_>>()
        });
        if order.is_empty() {
            return vec![];
        }

        vec![GreenWaveCorridor {
            intersection_ids: order,
            target_speed_m_s: self.settings.target_speed_m_s,
        }]
    }

    pub fn calculate_schedules(&mut self, dm: &DataManager, corridors: &[GreenWaveCorridor]) {
        let cycle = self.settings.cycle_length;
        self.offsets.clear();

        for corridor in corridors {
            let mut accumulated = 0.0;
            for (i, id) in corridor.intersection_ids.iter().enumerate() {
                self.offsets.insert(id.clone(), accumulated % cycle);

                let Some(next) = corridor.intersection_ids.get(i + 1) else {
                    continue;
                };
                if let Some(road) = dm.road_between(id, next) {
                    accumulated += road.distance() / corridor.target_speed_m_s;
                }
            }
        }
        debug!(
            "green wave offsets: {}",
            self.offsets
                .iter()
                .map(|(id, offset)| format!("{id}={offset:.2}"))
                .join(", ")
        );
    }

    #[instrument(level = "debug", skip_all)]
    pub fn initialize(&mut self, dm: &DataManager) {
        let corridors = self.find_main_corridors(dm);
        self.calculate_schedules(dm, &corridors);
    }

    /// Whether an intersection with `offset` is green at `sim_time`.
    pub fn is_green(&self, offset: f64, sim_time: f64) -> bool {
        let cycle = self.settings.cycle_length;
        let local = (sim_time - offset + cycle).rem_euclid(cycle);
        local < self.settings.green_duration
    }

    /// Set the local traffic lights for `sim_time` and return those that changed.
    ///
    /// The light controlling an intersection is the one sharing its id.
    pub fn run_once(&self, dm: &mut DataManager, sim_time: f64) -> Vec<LightChange> {
        let mut changes = vec![];
        for (id, &offset) in &self.offsets {
            let state = if self.is_green(offset, sim_time) {
                TrafficLightState::Green
            } else {
                TrafficLightState::Red
            };
            trace!("intersection {} at t={:.1}: {}", id, sim_time, state);

            let Some(light) = dm.traffic_light_mut(id) else {
                continue;
            };
            let previous = light.state();
            if previous != state {
                light.set_state(state);
                changes.push(LightChange {
                    traffic_light_id: id.clone(),
                    previous,
                    state,
                });
            }
        }
        changes
    }
}
