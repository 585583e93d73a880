//! Crash and exit notifications
//!
//! Observers receive owned copies of car state, so they can't reach back into
//! the road while it is advancing.

use super::types::CarId;

/// What happened to a car
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarEventKind {
    Crash,
    Exit,
}

/// State of a car at the moment of a crash or exit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarEvent {
    pub kind: CarEventKind,
    pub tick: u64,
    pub id: CarId,
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    /// Ticks on the road divided by precision
    pub trip_time: f64,
    pub front: Option<CarId>,
    pub back: Option<CarId>,
    /// Mean velocity over the whole trip
    pub avg_velocity: f64,
    /// Mean acceleration over the whole trip
    pub avg_acceleration: f64,
}

impl CarEvent {
    pub fn front_id(&self) -> i64 {
        CarId::or_sentinel(self.front)
    }

    pub fn back_id(&self) -> i64 {
        CarId::or_sentinel(self.back)
    }
}

/// Synchronous hooks fired from inside `SimRoad::advance`.
///
/// Both methods default to doing nothing.
pub trait RoadObserver {
    fn on_crash(&mut self, _event: &CarEvent) {}

    fn on_exit(&mut self, _event: &CarEvent) {}
}

/// Ignores every event
impl RoadObserver for () {}

/// Observer that keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub crashes: Vec<CarEvent>,
    pub exits: Vec<CarEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crashes_of(&self, id: CarId) -> usize {
        self.crashes.iter().filter(|e| e.id == id).count()
    }

    pub fn exits_of(&self, id: CarId) -> usize {
        self.exits.iter().filter(|e| e.id == id).count()
    }
}

impl RoadObserver for EventLog {
    fn on_crash(&mut self, event: &CarEvent) {
        self.crashes.push(*event);
    }

    fn on_exit(&mut self, event: &CarEvent) {
        self.exits.push(*event);
    }
}
