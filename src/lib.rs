//! Highway Traffic Simulation Library
//!
//! A discrete-time, single-lane highway simulation with stochastic drivers,
//! collisions and towing. The engine runs headless; CSV recording is an
//! optional observer.

pub mod recorder;
pub mod simulation;
