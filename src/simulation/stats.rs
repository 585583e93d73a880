//! Running statistics accumulated while the road advances
//!
//! Nothing here rescans history: every figure is folded in as samples arrive.

/// Count, mean, min and max of a stream of samples
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl RunningStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: f64) {
        self.count += 1;
        self.sum += sample;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = Some(self.max.map_or(sample, |m| m.max(sample)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of all samples, 0 when nothing was recorded
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

/// Aggregate figures for a road over its whole lifetime
#[derive(Debug, Clone, Default)]
pub struct RoadStats {
    /// Velocity of every car on every tick
    pub velocity: RunningStat,
    /// Acceleration of every car on every tick
    pub acceleration: RunningStat,
    /// Trip duration (seconds) of every car that left the road
    pub trip_duration: RunningStat,
    /// Every crash registered so far, including towed cars
    pub historic_crashes: u64,
    pub total_exits: u64,
    pub total_tows: u64,
}

/// One row of per-frame road figures, as written by logging collaborators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSnapshot {
    pub frame: u64,
    pub current_car_count: usize,
    pub historic_car_count: usize,
    pub current_crash_count: usize,
    pub historic_crash_count: u64,
    pub avg_v: f64,
    pub avg_a: f64,
    pub avg_trip_duration: f64,
}
