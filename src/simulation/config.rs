//! Tunable parameters of the road and of driver behavior.

use super::types::UpdatePolicy;

/// Default road length in meters
pub const DEFAULT_ROAD_LENGTH: f64 = 14_000.0;

/// Default physics sub-steps per external tick
pub const DEFAULT_PRECISION: u32 = 100;

/// Default ticks between a crash and the tow
pub const DEFAULT_TOW_DELAY: u64 = 5_000;

/// Road-level configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RoadConfig {
    /// Length of the road in meters
    pub length: f64,
    /// Physics sub-steps per externally visible tick
    pub precision: u32,
    /// Ticks a crashed car stays on the road before it is towed
    pub tow_delay: u64,
    pub update_policy: UpdatePolicy,
    pub behavior: BehaviorConfig,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_ROAD_LENGTH,
            precision: DEFAULT_PRECISION,
            tow_delay: DEFAULT_TOW_DELAY,
            update_policy: UpdatePolicy::default(),
            behavior: BehaviorConfig::default(),
        }
    }
}

impl RoadConfig {
    pub fn new(length: f64, precision: u32, tow_delay: u64) -> Self {
        Self {
            length,
            precision,
            tow_delay,
            ..Self::default()
        }
    }

    pub fn with_update_policy(mut self, update_policy: UpdatePolicy) -> Self {
        self.update_policy = update_policy;
        self
    }

    pub fn with_behavior(mut self, behavior: BehaviorConfig) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Driver behavior constants.
///
/// Probabilities apply per resolved action or per decision. Override them per
/// road for experiments.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorConfig {
    /// Chance that a due action is applied `strong_reaction_repeats` times
    pub strong_reaction_probability: f64,
    pub strong_reaction_repeats: u32,
    /// Independent chance that a due action is applied once
    pub single_reaction_probability: f64,

    /// Stop when the car ahead is crashed or stopping and the gap is within
    /// this many seconds of travel
    pub stop_headway: f64,
    /// Brake when the gap is within this many seconds of travel
    pub brake_headway: f64,
    /// Gap in meters kept at standstill, added to both headway checks.
    /// Zero leaves the pure time headways.
    pub standstill_gap: f64,
    /// Upper bound (m/s) of the error when judging the front car's velocity
    pub velocity_estimate_error: f64,
    /// Share of the stopping delta removed by one decelerate action
    pub brake_fraction: f64,

    pub increased_attention_factor: f64,
    pub decreased_attention_factor: f64,
    /// Number of recent samples inspected for monotony
    pub monotony_window: usize,
    /// Variance below which recent driving counts as monotonous
    pub monotony_variance: f64,
    pub inattention_onset_probability: f64,
    pub inattention_recovery_probability: f64,

    /// Per-decision chance that an erratic driver does something random
    pub erratic_action_probability: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            strong_reaction_probability: 0.10,
            strong_reaction_repeats: 100,
            single_reaction_probability: 0.07,
            stop_headway: 8.0,
            brake_headway: 2.0,
            standstill_gap: 0.0,
            velocity_estimate_error: 0.6,
            brake_fraction: 0.5,
            increased_attention_factor: 0.5,
            decreased_attention_factor: 1.8,
            monotony_window: 10,
            monotony_variance: 1e-4,
            inattention_onset_probability: 0.01,
            inattention_recovery_probability: 0.2,
            erratic_action_probability: 0.001,
        }
    }
}
