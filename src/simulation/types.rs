//! Core types for the highway simulation
//!
//! Plain value types shared by cars, the road and external observers.

use std::fmt;

/// Conversion factor between km/h and m/s
pub const KMH_PER_MS: f64 = 3.6;

/// Sentinel written in place of a missing neighbor id by persistence layers
pub const NO_NEIGHBOR: i64 = -1;

/// Convert a velocity given in km/h to m/s
pub fn kmh_to_ms(kmh: f64) -> f64 {
    kmh / KMH_PER_MS
}

/// Convert a velocity given in m/s to km/h
pub fn ms_to_kmh(ms: f64) -> f64 {
    ms * KMH_PER_MS
}

/// A unique identifier for a car. Never reused while the road lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(pub u64);

impl CarId {
    /// Encode an optional neighbor id the way row-based logs expect it
    pub fn or_sentinel(id: Option<CarId>) -> i64 {
        id.map(|id| id.0 as i64).unwrap_or(NO_NEIGHBOR)
    }
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Driver alertness, modulating the effective reaction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attention {
    #[default]
    Normal,
    /// Hazard spotted ahead, reacts faster
    Increased,
    /// Monotony, reacts slower
    Decreased,
}

/// An elementary driving action. Actions only touch acceleration and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accelerate,
    Decelerate,
    Stop,
    KeepVelocity,
}

/// A decided action waiting for its commit tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedAction {
    pub action: Action,
    pub commit_tick: u64,
}

impl QueuedAction {
    pub fn new(action: Action, commit_tick: u64) -> Self {
        Self {
            action,
            commit_tick,
        }
    }
}

/// Where a car enters the road
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Position 0, behind every other car
    AtBack,
    /// An explicit position in meters
    At(f64),
}

/// Outcome of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted(CarId),
    /// The requested position lies beyond the end of the road
    Rejected,
}

impl Admission {
    pub fn id(&self) -> Option<CarId> {
        match self {
            Admission::Admitted(id) => Some(*id),
            Admission::Rejected => None,
        }
    }
}

/// Status returned by [`SimRoad::advance`](super::SimRoad::advance)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadStatus {
    Active,
    Empty,
}

/// Order in which cars observe each other during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Back-to-front over live state: a car sees its front neighbor as of the
    /// previous tick and its back neighbor as already updated this tick.
    #[default]
    Sequential,
    /// Every car sees its neighbors as they were at the start of the tick.
    Snapshot,
}
