//! Per-intersection throughput and waiting-time counters.

use crate::domain::types::AverageWaitingTimes;

#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionStatistics {
    intersection_id: String,
    vehicles_passed: usize,
    vehicle_waiting: f64,
    pedestrians_passed: usize,
    pedestrian_waiting: f64,
}

impl IntersectionStatistics {
    pub fn new(intersection_id: impl Into<String>) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            vehicles_passed: 0,
            vehicle_waiting: 0.0,
            pedestrians_passed: 0,
            pedestrian_waiting: 0.0,
        }
    }

    pub fn intersection_id(&self) -> &str {
        &self.intersection_id
    }

    /// Record a vehicle that passed after waiting `waiting_time` seconds.
    pub fn add_vehicle_pass(&mut self, waiting_time: f64) {
        self.vehicles_passed += 1;
        self.vehicle_waiting += waiting_time;
    }

    pub fn total_vehicles_passed(&self) -> usize {
        self.vehicles_passed
    }

    pub fn total_vehicle_waiting_time(&self) -> f64 {
        self.vehicle_waiting
    }

    /// 0.0 when no vehicle has passed yet.
    pub fn average_vehicle_waiting_time(&self) -> f64 {
        average(self.vehicle_waiting, self.vehicles_passed)
    }

    pub fn add_pedestrian_pass(&mut self, waiting_time: f64) {
        self.pedestrians_passed += 1;
        self.pedestrian_waiting += waiting_time;
    }

    pub fn total_pedestrians_passed(&self) -> usize {
        self.pedestrians_passed
    }

    pub fn total_pedestrian_waiting_time(&self) -> f64 {
        self.pedestrian_waiting
    }

    pub fn average_pedestrian_waiting_time(&self) -> f64 {
        average(self.pedestrian_waiting, self.pedestrians_passed)
    }

    pub fn average_waiting_times(&self) -> AverageWaitingTimes {
        AverageWaitingTimes {
            pedestrians: self.average_pedestrian_waiting_time(),
            vehicles: self.average_vehicle_waiting_time(),
        }
    }
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_statistics_are_zero() {
        let stats = IntersectionStatistics::new("42");

        assert_eq!(stats.intersection_id(), "42");
        assert_eq!(stats.total_vehicles_passed(), 0);
        assert_eq!(stats.total_vehicle_waiting_time(), 0.0);
        assert_eq!(stats.average_vehicle_waiting_time(), 0.0);
        assert_eq!(stats.total_pedestrians_passed(), 0);
        assert_eq!(stats.total_pedestrian_waiting_time(), 0.0);
        assert_eq!(stats.average_pedestrian_waiting_time(), 0.0);
    }

    #[test]
    fn test_vehicle_passes_accumulate() {
        let mut stats = IntersectionStatistics::new("1");
        stats.add_vehicle_pass(10.0);
        stats.add_vehicle_pass(6.0);

        assert_eq!(stats.total_vehicles_passed(), 2);
        assert_eq!(stats.total_vehicle_waiting_time(), 16.0);
        assert_eq!(stats.average_vehicle_waiting_time(), 8.0);

        stats.add_vehicle_pass(4.0);
        assert_eq!(stats.total_vehicles_passed(), 3);
        assert_eq!(stats.total_vehicle_waiting_time(), 20.0);
        assert!((stats.average_vehicle_waiting_time() - 20.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_pedestrian_passes_accumulate() {
        let mut stats = IntersectionStatistics::new("2");
        stats.add_pedestrian_pass(2.5);
        stats.add_pedestrian_pass(3.5);

        assert_eq!(stats.total_pedestrians_passed(), 2);
        assert_eq!(stats.total_pedestrian_waiting_time(), 6.0);
        assert_eq!(stats.average_pedestrian_waiting_time(), 3.0);

        let averages = stats.average_waiting_times();
        assert_eq!(averages.pedestrians, 3.0);
        assert_eq!(averages.vehicles, 0.0);
    }
}
