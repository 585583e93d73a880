//! Car kinematics and driver behavior for the highway simulation
//!
//! A car only ever sees its neighbors through [`Surroundings`], a copy of their
//! observable state built by the road before each update.

use std::collections::VecDeque;

use rand::Rng;

use super::config::BehaviorConfig;
use super::events::{CarEvent, CarEventKind};
use super::stats::RunningStat;
use super::types::{kmh_to_ms, Action, Attention, CarId, QueuedAction};

/// Result of a car update indicating what the road should do with the car
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarUpdateResult {
    Continue, // Car keeps driving (or keeps standing, if crashed earlier)
    Crashed,  // Car collided during this update
}

/// Construction parameters for a car.
///
/// Velocities are given in km/h and converted to m/s when the car is admitted
/// to a road; everything else is SI already.
#[derive(Debug, Clone, PartialEq)]
pub struct CarParams {
    /// Requested id, or `None` to let the road assign one
    pub id: Option<CarId>,
    pub velocity_kmh: f64,
    pub max_velocity_kmh: f64,
    pub desired_velocity_kmh: f64,
    /// Initial acceleration in m/s²
    pub acceleration: f64,
    pub max_acceleration: f64,
    /// Maximum braking deceleration, as a positive number
    pub max_brake: f64,
    /// Acceleration gained by one accelerate action
    pub throttle_delta: f64,
    /// Deceleration scale of one decelerate action
    pub stopping_delta: f64,
    pub length: f64,
    /// Seconds between deciding an action and committing it
    pub reaction_time: f64,
    /// Erratic drivers occasionally act at random
    pub erratic: bool,
}

impl Default for CarParams {
    fn default() -> Self {
        Self {
            id: None,
            velocity_kmh: 0.0,
            max_velocity_kmh: 120.0,
            desired_velocity_kmh: 100.0,
            acceleration: 0.0,
            max_acceleration: 3.0,
            max_brake: 3.5,
            throttle_delta: 0.1,
            stopping_delta: 0.4,
            length: 4.5,
            reaction_time: 0.7,
            erratic: false,
        }
    }
}

impl CarParams {
    pub fn with_id(mut self, id: CarId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_velocity_kmh(mut self, velocity_kmh: f64) -> Self {
        self.velocity_kmh = velocity_kmh;
        self
    }

    pub fn with_velocity_ms(self, velocity: f64) -> Self {
        self.with_velocity_kmh(super::types::ms_to_kmh(velocity))
    }

    pub fn with_desired_velocity_kmh(mut self, desired_velocity_kmh: f64) -> Self {
        self.desired_velocity_kmh = desired_velocity_kmh;
        self
    }

    pub fn with_max_velocity_kmh(mut self, max_velocity_kmh: f64) -> Self {
        self.max_velocity_kmh = max_velocity_kmh;
        self
    }

    pub fn with_reaction_time(mut self, reaction_time: f64) -> Self {
        self.reaction_time = reaction_time;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_erratic(mut self, erratic: bool) -> Self {
        self.erratic = erratic;
        self
    }
}

/// What a car can observe about one of its neighbors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborView {
    pub id: CarId,
    pub position: f64,
    pub velocity: f64,
    pub length: f64,
    pub crashed: bool,
    pub stopping: bool,
}

/// Everything a car observes about the road around it in one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Surroundings {
    pub front: Option<NeighborView>,
    pub back: Option<NeighborView>,
    /// Some car further ahead has crashed
    pub hazard_ahead: bool,
}

/// Per-tick values shared by every car update
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub tick: u64,
    pub precision: u32,
    pub behavior: &'a BehaviorConfig,
}

/// Read-only copy of a car, for renderers and loggers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarSnapshot {
    pub id: CarId,
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub trip_time: f64,
    pub crashed: bool,
    pub stopping: bool,
    pub attention: Attention,
    pub front: Option<CarId>,
    pub back: Option<CarId>,
}

/// A car on the highway
#[derive(Debug, Clone)]
pub struct SimCar {
    id: CarId,

    position: f64,
    velocity: f64,
    acceleration: f64,
    length: f64,

    max_velocity: f64,
    max_acceleration: f64,
    max_brake: f64,
    desired_velocity: f64,

    throttle_delta: f64,
    stopping_delta: f64,
    reaction_time: f64,
    erratic: bool,

    attention: Attention,
    /// Attention requested this tick, applied on the next one
    pending_attention: Option<Attention>,

    crashed: bool,
    stopping: bool,

    queue: Vec<QueuedAction>,

    // Maintained by the road; never used to reach the neighbor directly
    pub(crate) front: Option<CarId>,
    pub(crate) back: Option<CarId>,

    /// Last few (velocity, acceleration) samples
    recent: VecDeque<(f64, f64)>,
    trip_velocity: RunningStat,
    trip_acceleration: RunningStat,
    ticks_on_road: u64,
}

impl SimCar {
    /// Build a car from km/h parameters. This is the only unit conversion.
    pub fn new(id: CarId, params: &CarParams, position: f64) -> Self {
        let max_velocity = kmh_to_ms(params.max_velocity_kmh).max(0.0);
        Self {
            id,
            position: position.max(0.0),
            velocity: kmh_to_ms(params.velocity_kmh).clamp(0.0, max_velocity),
            acceleration: params.acceleration,
            length: params.length,
            max_velocity,
            max_acceleration: params.max_acceleration.max(0.0),
            max_brake: params.max_brake.abs(),
            desired_velocity: kmh_to_ms(params.desired_velocity_kmh).clamp(0.0, max_velocity),
            throttle_delta: params.throttle_delta,
            stopping_delta: params.stopping_delta,
            reaction_time: params.reaction_time.max(0.0),
            erratic: params.erratic,
            attention: Attention::Normal,
            pending_attention: None,
            crashed: false,
            stopping: false,
            queue: Vec::new(),
            front: None,
            back: None,
            recent: VecDeque::new(),
            trip_velocity: RunningStat::new(),
            trip_acceleration: RunningStat::new(),
            ticks_on_road: 0,
        }
    }

    pub fn id(&self) -> CarId {
        self.id
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    pub fn desired_velocity(&self) -> f64 {
        self.desired_velocity
    }

    pub fn reaction_time(&self) -> f64 {
        self.reaction_time
    }

    pub fn attention(&self) -> Attention {
        self.attention
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn is_erratic(&self) -> bool {
        self.erratic
    }

    pub fn front(&self) -> Option<CarId> {
        self.front
    }

    pub fn back(&self) -> Option<CarId> {
        self.back
    }

    /// Decided actions that have not been resolved yet
    pub fn queued_actions(&self) -> &[QueuedAction] {
        &self.queue
    }

    pub fn ticks_on_road(&self) -> u64 {
        self.ticks_on_road
    }

    /// Trip time in seconds
    pub fn trip_time(&self, precision: u32) -> f64 {
        self.ticks_on_road as f64 / precision as f64
    }

    /// Mark the car as crashed. Used for injected incidents; collisions found
    /// during [`update`](Self::update) set the flag themselves.
    pub fn crash(&mut self) {
        self.crashed = true;
    }

    pub fn view(&self) -> NeighborView {
        NeighborView {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            length: self.length,
            crashed: self.crashed,
            stopping: self.stopping,
        }
    }

    pub fn snapshot(&self, precision: u32) -> CarSnapshot {
        CarSnapshot {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            acceleration: self.acceleration,
            trip_time: self.trip_time(precision),
            crashed: self.crashed,
            stopping: self.stopping,
            attention: self.attention,
            front: self.front,
            back: self.back,
        }
    }

    pub(crate) fn event(&self, kind: CarEventKind, tick: u64, precision: u32) -> CarEvent {
        CarEvent {
            kind,
            tick,
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            acceleration: self.acceleration,
            trip_time: self.trip_time(precision),
            front: self.front,
            back: self.back,
            avg_velocity: self.trip_velocity.mean(),
            avg_acceleration: self.trip_acceleration.mean(),
        }
    }

    /// Distance from this car's front bumper to the rear bumper of `front`
    pub fn gap_to(&self, front: &NeighborView) -> f64 {
        front.position - front.length - self.position
    }

    /// Distance from `back`'s front bumper to this car's rear bumper
    pub fn gap_from(&self, back: &NeighborView) -> f64 {
        self.position - self.length - back.position
    }

    /// Advance the car by one tick
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        ctx: &StepContext<'_>,
        around: &Surroundings,
        rng: &mut R,
    ) -> CarUpdateResult {
        self.integrate(ctx.precision, around.front.as_ref());
        self.ticks_on_road += 1;

        let mut result = CarUpdateResult::Continue;
        if !self.crashed && self.collides(around) {
            self.crashed = true;
            result = CarUpdateResult::Crashed;
        }

        if self.crashed {
            self.respond_to_crash(ctx.tick);
        } else {
            self.record_sample(ctx.behavior.monotony_window);
            self.update_attention(around.hazard_ahead, ctx.behavior, rng);
            self.decide(ctx, around, rng);
        }

        self.resolve_actions(ctx.tick, ctx.behavior, rng);

        if self.crashed && self.velocity <= 0.0 {
            // Dead stop: a wreck does not roll again
            self.velocity = 0.0;
            self.acceleration = 0.0;
        }

        result
    }

    fn integrate(&mut self, precision: u32, front: Option<&NeighborView>) {
        let precision = precision as f64;

        let mut position = self.position + self.velocity / precision;
        if let Some(front) = front {
            // Never drive through the car ahead
            position = position.min(front.position.max(self.position));
        }
        self.position = position;

        let acceleration = if self.stopping {
            self.acceleration.min(0.0) - self.max_brake
        } else {
            self.acceleration
        };
        let mut velocity = self.velocity + acceleration / precision;
        if acceleration > 0.0 {
            // Throttle alone never carries the car past its desired velocity
            velocity = velocity.min(self.velocity.max(self.desired_velocity));
        }
        self.velocity = velocity.clamp(0.0, self.max_velocity);

        if self.stopping && self.velocity <= 0.0 {
            // Brought to a halt; the foot is off the throttle
            self.stopping = false;
            self.acceleration = self.acceleration.min(0.0);
        }
    }

    fn collides(&self, around: &Surroundings) -> bool {
        let front_hit = around.front.is_some_and(|front| self.gap_to(&front) <= 0.0);
        let back_hit = around.back.is_some_and(|back| self.gap_from(&back) <= 0.0);
        front_hit || back_hit
    }

    /// Crashes skip the reaction delay: throttle is cut and braking is queued
    /// for the current tick. Only pending stops survive.
    fn respond_to_crash(&mut self, tick: u64) {
        self.acceleration = self.acceleration.min(0.0);
        self.queue.retain(|queued| queued.action == Action::Stop);
        self.queue.push(QueuedAction::new(Action::Decelerate, tick));
    }

    fn record_sample(&mut self, window: usize) {
        self.trip_velocity.push(self.velocity);
        self.trip_acceleration.push(self.acceleration);

        self.recent.push_back((self.velocity, self.acceleration));
        while self.recent.len() > window.max(1) {
            self.recent.pop_front();
        }
    }

    fn is_monotonous(&self, behavior: &BehaviorConfig) -> bool {
        if behavior.monotony_window == 0 || self.recent.len() < behavior.monotony_window {
            return false;
        }
        let velocities = self.recent.iter().map(|(v, _)| *v);
        let accelerations = self.recent.iter().map(|(_, a)| *a);
        variance(velocities) < behavior.monotony_variance
            && variance(accelerations) < behavior.monotony_variance
    }

    fn update_attention<R: Rng + ?Sized>(
        &mut self,
        hazard_ahead: bool,
        behavior: &BehaviorConfig,
        rng: &mut R,
    ) {
        if let Some(attention) = self.pending_attention.take() {
            self.attention = attention;
        }

        let mut next = if hazard_ahead {
            Attention::Increased
        } else if self.attention == Attention::Decreased {
            Attention::Decreased
        } else {
            Attention::Normal
        };

        if next != Attention::Increased {
            if self.is_monotonous(behavior) {
                if next == Attention::Normal
                    && rng.random::<f64>() < behavior.inattention_onset_probability
                {
                    next = Attention::Decreased;
                }
            } else if next == Attention::Decreased
                && rng.random::<f64>() < behavior.inattention_recovery_probability
            {
                next = Attention::Normal;
            }
        }

        if next != self.attention {
            self.pending_attention = Some(next);
        }
    }

    /// Reaction time in ticks under the current attention
    pub fn reaction_ticks(&self, precision: u32, behavior: &BehaviorConfig) -> u64 {
        let factor = match self.attention {
            Attention::Normal => 1.0,
            Attention::Increased => behavior.increased_attention_factor,
            Attention::Decreased => behavior.decreased_attention_factor,
        };
        (self.reaction_time * factor * precision as f64).ceil().max(0.0) as u64
    }

    fn decide<R: Rng + ?Sized>(
        &mut self,
        ctx: &StepContext<'_>,
        around: &Surroundings,
        rng: &mut R,
    ) {
        let behavior = ctx.behavior;
        let commit_tick = ctx
            .tick
            .saturating_add(self.reaction_ticks(ctx.precision, behavior));

        let action = match &around.front {
            Some(front) => self.follow(front, behavior, rng),
            None => self.cruise(),
        };
        self.queue.push(QueuedAction::new(action, commit_tick));

        if self.erratic && rng.random::<f64>() < behavior.erratic_action_probability {
            let spurious = if rng.random_bool(0.5) {
                Action::Accelerate
            } else {
                Action::Decelerate
            };
            self.queue.push(QueuedAction::new(spurious, commit_tick));
        }
    }

    /// Headway rules against the car ahead
    fn follow<R: Rng + ?Sized>(
        &self,
        front: &NeighborView,
        behavior: &BehaviorConfig,
        rng: &mut R,
    ) -> Action {
        let gap = self.gap_to(front);
        let v = self.velocity;

        if (front.crashed || front.stopping)
            && gap <= behavior.standstill_gap + behavior.stop_headway * v
        {
            return Action::Stop;
        }
        if gap <= behavior.standstill_gap + behavior.brake_headway * v {
            return Action::Decelerate;
        }

        // The driver misjudges the front car's speed by up to this much
        let margin = rng.random::<f64>() * behavior.velocity_estimate_error;
        if v < front.velocity - margin && v < self.desired_velocity {
            return Action::Accelerate;
        }

        self.cruise()
    }

    /// Steer toward the desired velocity
    fn cruise(&self) -> Action {
        if self.velocity < self.desired_velocity {
            Action::Accelerate
        } else if self.velocity > self.desired_velocity {
            Action::Decelerate
        } else {
            Action::KeepVelocity
        }
    }

    /// Execute every due action with human-like unreliability and drop it.
    /// Actions due later stay queued.
    fn resolve_actions<R: Rng + ?Sized>(
        &mut self,
        tick: u64,
        behavior: &BehaviorConfig,
        rng: &mut R,
    ) {
        let (due, pending): (Vec<QueuedAction>, Vec<QueuedAction>) = self
            .queue
            .drain(..)
            .partition(|queued| queued.commit_tick <= tick);
        self.queue = pending;

        for queued in due {
            if rng.random::<f64>() < behavior.strong_reaction_probability {
                for _ in 0..behavior.strong_reaction_repeats {
                    self.apply(queued.action, behavior);
                }
            }
            if rng.random::<f64>() < behavior.single_reaction_probability {
                self.apply(queued.action, behavior);
            }
        }
    }

    /// Apply one elementary action. Only acceleration and flags change.
    pub fn apply(&mut self, action: Action, behavior: &BehaviorConfig) {
        match action {
            Action::Accelerate => {
                self.acceleration = (self.acceleration.max(0.0) + self.throttle_delta)
                    .clamp(0.0, self.max_acceleration);
            }
            Action::Decelerate => {
                self.acceleration = (self.acceleration
                    - behavior.brake_fraction * self.stopping_delta)
                    .max(-self.max_brake);
            }
            Action::Stop => self.stopping = true,
            Action::KeepVelocity => {}
        }
    }
}

fn variance(samples: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = samples.clone().count();
    if count == 0 {
        return 0.0;
    }
    let mean = samples.clone().sum::<f64>() / count as f64;
    samples.map(|s| (s - mean) * (s - mean)).sum::<f64>() / count as f64
}
