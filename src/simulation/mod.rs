//! Single-lane highway traffic simulation
//!
//! This module contains the simulation engine: the car model and the road
//! that orders cars, keeps their neighbor links and handles crashes, tows and
//! exits. It has no I/O of its own; loggers and renderers observe it through
//! snapshots and [`RoadObserver`] callbacks.

mod car;
mod config;
mod error;
mod events;
mod road;
mod spawner;
mod stats;
mod types;

pub use car::{
    CarParams, CarSnapshot, CarUpdateResult, NeighborView, SimCar, StepContext, Surroundings,
};
pub use config::{
    BehaviorConfig, RoadConfig, DEFAULT_PRECISION, DEFAULT_ROAD_LENGTH, DEFAULT_TOW_DELAY,
};
pub use error::{RoadError, RoadResult};
pub use events::{CarEvent, CarEventKind, EventLog, RoadObserver};
pub use road::SimRoad;
pub use spawner::{Spawner, TrafficProfile, ENTRY_CLEARANCE, ERRATIC_SHARE, INSTANT_REACTION_SHARE};
pub use stats::{RoadSnapshot, RoadStats, RunningStat};
pub use types::{
    kmh_to_ms, ms_to_kmh, Action, Admission, Attention, CarId, Placement, QueuedAction,
    RoadStatus, UpdatePolicy, KMH_PER_MS, NO_NEIGHBOR,
};
