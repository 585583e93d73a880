//! Traffic generator feeding new cars onto the back of the road
//!
//! Driver and vehicle parameters are sampled per car from distributions
//! fitted to measured reaction times and typical highway behavior.

use anyhow::{Context, Result};
use log::debug;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Normal, Poisson};

use super::car::CarParams;
use super::road::SimRoad;
use super::types::{Admission, CarId, Placement};

/// Back car must have cleared this many meters before the next one enters
pub const ENTRY_CLEARANCE: f64 = 80.0;

/// Share of drivers that act erratically
pub const ERRATIC_SHARE: f64 = 0.6;

/// Chance that a driver has no reaction delay at all
pub const INSTANT_REACTION_SHARE: f64 = 0.001;

/// Distributions every new car is drawn from
#[derive(Debug, Clone)]
pub struct TrafficProfile {
    pub velocity_kmh: Uniform<f64>,
    pub max_velocity_kmh: Normal<f64>,
    pub desired_velocity_kmh: Normal<f64>,
    pub acceleration: Normal<f64>,
    pub max_acceleration: Uniform<f64>,
    pub max_brake: Normal<f64>,
    pub throttle_delta: Normal<f64>,
    pub stopping_delta: Normal<f64>,
    pub length: Normal<f64>,
    pub reaction_time: Normal<f64>,
}

impl TrafficProfile {
    /// Default profile with the desired velocity centered on `speed_limit_kmh`
    pub fn new(speed_limit_kmh: f64) -> Result<Self> {
        Ok(Self {
            velocity_kmh: Uniform::new(50.0, 80.0).context("velocity range")?,
            max_velocity_kmh: Normal::new(120.0, 10.0).context("max velocity")?,
            desired_velocity_kmh: Normal::new(speed_limit_kmh, 5.0).context("desired velocity")?,
            acceleration: Normal::new(2.0, 1.0).context("acceleration")?,
            max_acceleration: Uniform::new(1.5, 3.0).context("max acceleration range")?,
            max_brake: Normal::new(3.5, 0.5).context("max brake")?,
            throttle_delta: Normal::new(0.1, 0.01).context("throttle delta")?,
            stopping_delta: Normal::new(0.4, 0.001).context("stopping delta")?,
            length: Normal::new(4.5, 0.5).context("car length")?,
            reaction_time: Normal::new(0.732, 0.163).context("reaction time")?,
        })
    }

    /// Draw one car. Values are clamped into physically meaningful ranges.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> CarParams {
        let max_velocity_kmh = self.max_velocity_kmh.sample(rng).max(10.0);
        let desired_velocity_kmh = self
            .desired_velocity_kmh
            .sample(rng)
            .clamp(0.0, max_velocity_kmh);
        let reaction_time = if rng.random::<f64>() < INSTANT_REACTION_SHARE {
            0.0
        } else {
            self.reaction_time.sample(rng).max(0.0)
        };

        CarParams {
            id: None,
            velocity_kmh: self.velocity_kmh.sample(rng).min(max_velocity_kmh).trunc(),
            max_velocity_kmh: max_velocity_kmh.trunc(),
            desired_velocity_kmh: desired_velocity_kmh.trunc(),
            acceleration: self.acceleration.sample(rng).trunc().max(0.0),
            max_acceleration: self.max_acceleration.sample(rng),
            max_brake: self.max_brake.sample(rng).max(0.5),
            throttle_delta: self.throttle_delta.sample(rng).max(0.0),
            stopping_delta: self.stopping_delta.sample(rng).max(0.0),
            length: self.length.sample(rng).max(2.0),
            reaction_time,
            erratic: rng.random::<f64>() < ERRATIC_SHARE,
        }
    }
}

/// Decides once per frame whether a new car enters the road
pub struct Spawner {
    profile: TrafficProfile,
    blocked_entry: Poisson<f64>,
    rng: StdRng,
}

impl Spawner {
    pub fn new(profile: TrafficProfile, seed: u64) -> Result<Self> {
        Ok(Self {
            profile,
            blocked_entry: Poisson::new(1.0).context("entry poisson")?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Whether the entry is clear: the road is empty, or the back car is far
    /// enough in and (usually) not stuck behind a wreck
    pub fn entry_clear(&mut self, road: &SimRoad) -> Result<bool> {
        let Some(back) = road.back_car() else {
            return Ok(true);
        };
        if back.position() <= ENTRY_CLEARANCE {
            return Ok(false);
        }
        if !road.crashes_upfront(back.id())? {
            return Ok(true);
        }
        // Traffic still trickles in behind a crash now and then
        Ok(self.blocked_entry.sample(&mut self.rng) == 1.0)
    }

    /// Admit a freshly sampled car at the back if the entry is clear
    pub fn try_spawn(&mut self, road: &mut SimRoad) -> Result<Option<CarId>> {
        if !self.entry_clear(road)? {
            return Ok(None);
        }
        let params = self.profile.sample(&mut self.rng);
        let admission = road
            .add(&params, Placement::AtBack)
            .context("Failed to admit spawned car")?;

        if let Admission::Admitted(id) = admission {
            debug!(
                "Spawned car {} (vd={:.0} km/h, tr={:.2}s, erratic={})",
                id, params.desired_velocity_kmh, params.reaction_time, params.erratic
            );
        }
        Ok(admission.id())
    }
}
