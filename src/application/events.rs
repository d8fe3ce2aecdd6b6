//! Simulation events and the observer pattern.
//!
//! A [`Subject`] publishes [`Event`]s to attached [`Observer`]s in attach order.

use std::fmt;
use std::sync::Arc;

use crate::domain::TrafficLightState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SimulationStart,
    SimulationStep,
    SimulationEnd,
    VehicleStatusChange,
    PedestrianStatusChange,
    TrafficLightChange,
    LoadingStart,
    LoadingProgress,
    LoadingComplete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::SimulationStart => "simulation-start",
            EventKind::SimulationStep => "simulation-step",
            EventKind::SimulationEnd => "simulation-end",
            EventKind::VehicleStatusChange => "vehicle-status",
            EventKind::PedestrianStatusChange => "pedestrian-status",
            EventKind::TrafficLightChange => "traffic-light",
            EventKind::LoadingStart => "loading-start",
            EventKind::LoadingProgress => "loading-progress",
            EventKind::LoadingComplete => "loading-complete",
        };
        f.write_str(name)
    }
}

/// Payload attached to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    /// Loading progress in `[0, 1]`
    Progress(f32),
    /// Simulation time in seconds
    Time(f64),
    TrafficLight {
        id: String,
        state: TrafficLightState,
    },
    /// `present == false` means the vehicle left the simulation
    Vehicle { id: String, present: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub message: String,
    pub data: Option<EventData>,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(kind: EventKind, message: impl Into<String>, data: EventData) -> Self {
        Self {
            kind,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn progress(&self) -> Option<f32> {
        match self.data {
            Some(EventData::Progress(p)) => Some(p),
            _ => None,
        }
    }

    pub fn time(&self) -> Option<f64> {
        match self.data {
            Some(EventData::Time(t)) => Some(t),
            _ => None,
        }
    }
}

pub trait Observer: Send + Sync {
    fn update(&self, event: &Event);
}

pub trait Subject {
    fn attach(&mut self, observer: Arc<dyn Observer>);

    /// Remove a previously attached observer (matched by identity).
    fn detach(&mut self, observer: &Arc<dyn Observer>);

    fn notify(&self, event: &Event);
}

/// Observer bookkeeping shared by subjects.
#[derive(Default, Clone)]
pub struct ObserverList {
    observers: Vec<Arc<dyn Observer>>,
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Subject for ObserverList {
    fn attach(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    fn detach(&mut self, observer: &Arc<dyn Observer>) {
        // compare data pointers only; vtable pointers may differ across codegen units
        let target = Arc::as_ptr(observer) as *const ();
        self.observers
            .retain(|o| Arc::as_ptr(o) as *const () != target);
    }

    fn notify(&self, event: &Event) {
        for observer in &self.observers {
            observer.update(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        tag: &'static str,
    }

    impl Observer for Recorder {
        fn update(&self, event: &Event) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.tag, event.message));
        }
    }

    #[test]
    fn test_notify_in_attach_order_and_detach_by_identity() {
        let a = Arc::new(Recorder {
            tag: "a",
            ..Default::default()
        });
        let b = Arc::new(Recorder {
            tag: "b",
            ..Default::default()
        });
        let a_dyn: Arc<dyn Observer> = a.clone();
        let b_dyn: Arc<dyn Observer> = b.clone();

        let mut list = ObserverList::new();
        list.attach(a_dyn.clone());
        list.attach(b_dyn.clone());
        list.notify(&Event::new(EventKind::SimulationStart, "start"));

        list.detach(&a_dyn);
        assert_eq!(list.len(), 1);
        list.notify(&Event::new(EventKind::SimulationEnd, "end"));

        assert_eq!(*a.seen.lock().unwrap(), vec!["a:start"]);
        assert_eq!(*b.seen.lock().unwrap(), vec!["b:start", "b:end"]);
    }

    #[test]
    fn test_event_accessors() {
        let e = Event::with_data(EventKind::LoadingProgress, "x", EventData::Progress(0.5));
        assert_eq!(e.progress(), Some(0.5));
        assert_eq!(e.time(), None);

        let e = Event::with_data(EventKind::SimulationStep, "t", EventData::Time(3.0));
        assert_eq!(e.time(), Some(3.0));
    }
}
