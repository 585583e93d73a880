//! Invariant violations raised by the road container.
//!
//! Crashes and rejected admissions are simulated events and never show up
//! here. Everything in [`RoadError`] means the caller or the container is
//! broken and the run should stop.

use thiserror::Error;

use super::types::CarId;

#[derive(Debug, Error, PartialEq)]
pub enum RoadError {
    #[error("road length must be positive, got {0}")]
    InvalidLength(f64),

    #[error("precision must be at least one sub-step per tick")]
    InvalidPrecision,

    #[error("car {0} was already admitted to this road")]
    DuplicateId(CarId),

    #[error("car {0} is not on the road")]
    UnknownCar(CarId),

    #[error("car {back} at {back_position:.3} m is ahead of car {front} at {front_position:.3} m")]
    OutOfOrder {
        back: CarId,
        back_position: f64,
        front: CarId,
        front_position: f64,
    },

    #[error("car {0} has stale neighbor links")]
    BrokenLink(CarId),

    #[error("car {id} velocity {velocity:.3} m/s outside [0, {max:.3}]")]
    VelocityOutOfBounds { id: CarId, velocity: f64, max: f64 },
}

pub type RoadResult<T> = Result<T, RoadError>;
