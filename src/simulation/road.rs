//! The highway: an ordered, single-lane container of cars
//!
//! Cars are kept sorted back to front by position. That order is also the
//! adjacency: the car at index `i` has `i + 1` in front and `i - 1` behind.
//! Neighbor ids stored on each car are patched locally on every insert and
//! removal, and an id -> index map resolves them.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::car::{
    CarParams, CarSnapshot, CarUpdateResult, NeighborView, SimCar, StepContext, Surroundings,
};
use super::config::RoadConfig;
use super::error::{RoadError, RoadResult};
use super::events::{CarEventKind, RoadObserver};
use super::stats::{RoadSnapshot, RoadStats};
use super::types::{Admission, CarId, Placement, RoadStatus, UpdatePolicy};

/// A single-lane road segment and every car currently on it
pub struct SimRoad {
    config: RoadConfig,

    /// Active cars, back to front
    cars: Vec<SimCar>,

    /// Maps car ids to their index in `cars`
    index: HashMap<CarId, usize>,

    /// Crashed cars waiting for the tow, with the tick they were registered
    collisions: Vec<(CarId, u64)>,

    /// Every id ever admitted
    historic_ids: HashSet<CarId>,

    next_id: u64,

    /// Number of completed `advance` calls
    time: u64,

    stats: RoadStats,

    rng: StdRng,
}

impl SimRoad {
    pub fn new(config: RoadConfig, rng: StdRng) -> RoadResult<Self> {
        if !(config.length.is_finite() && config.length > 0.0) {
            return Err(RoadError::InvalidLength(config.length));
        }
        if config.precision == 0 {
            return Err(RoadError::InvalidPrecision);
        }

        Ok(Self {
            config,
            cars: Vec::new(),
            index: HashMap::new(),
            collisions: Vec::new(),
            historic_ids: HashSet::new(),
            next_id: 0,
            time: 0,
            stats: RoadStats::default(),
            rng,
        })
    }

    /// Create a road with a seeded RNG for reproducible runs
    pub fn with_seed(config: RoadConfig, seed: u64) -> RoadResult<Self> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

    pub fn config(&self) -> &RoadConfig {
        &self.config
    }

    pub fn length(&self) -> f64 {
        self.config.length
    }

    pub fn precision(&self) -> u32 {
        self.config.precision
    }

    pub fn tow_delay(&self) -> u64 {
        self.config.tow_delay
    }

    /// Number of completed ticks
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn cars(&self) -> &[SimCar] {
        &self.cars
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    pub fn get_car(&self, id: CarId) -> Option<&SimCar> {
        self.index.get(&id).map(|&i| &self.cars[i])
    }

    pub fn contains(&self, id: CarId) -> bool {
        self.index.contains_key(&id)
    }

    /// The car closest to the start of the road
    pub fn back_car(&self) -> Option<&SimCar> {
        self.cars.first()
    }

    /// The car closest to the end of the road
    pub fn front_car(&self) -> Option<&SimCar> {
        self.cars.last()
    }

    pub fn snapshots(&self) -> Vec<CarSnapshot> {
        let precision = self.config.precision;
        self.cars.iter().map(|car| car.snapshot(precision)).collect()
    }

    /// Admit a car.
    ///
    /// Positions past the end of the road are turned away with
    /// [`Admission::Rejected`]; the caller may try again later.
    pub fn add(&mut self, params: &CarParams, placement: Placement) -> RoadResult<Admission> {
        let position = match placement {
            Placement::AtBack => 0.0,
            Placement::At(x) if x > self.config.length => {
                warn!(
                    "Rejected car at {:.1} m: road is only {:.1} m long",
                    x, self.config.length
                );
                return Ok(Admission::Rejected);
            }
            Placement::At(x) => x.max(0.0),
        };

        let id = match params.id {
            Some(id) if self.historic_ids.contains(&id) => return Err(RoadError::DuplicateId(id)),
            Some(id) => id,
            None => self.fresh_id(),
        };

        let slot = match placement {
            Placement::AtBack => 0,
            Placement::At(_) => self.cars.partition_point(|car| car.position() <= position),
        };

        let car = SimCar::new(id, params, position);
        self.cars.insert(slot, car);
        self.historic_ids.insert(id);
        self.patch_links(slot);
        self.reindex_from(slot);

        debug!("Admitted car {} at {:.1} m (slot {})", id, position, slot);
        Ok(Admission::Admitted(id))
    }

    /// Take a car off the road immediately
    pub fn remove(&mut self, id: CarId) -> RoadResult<SimCar> {
        let slot = *self.index.get(&id).ok_or(RoadError::UnknownCar(id))?;
        Ok(self.detach(slot))
    }

    /// Flag a car as crashed from outside the simulation (e.g. a breakdown).
    /// It is registered for towing on the next `advance`.
    pub fn inject_crash(&mut self, id: CarId) -> RoadResult<()> {
        let slot = *self.index.get(&id).ok_or(RoadError::UnknownCar(id))?;
        self.cars[slot].crash();
        Ok(())
    }

    /// Whether any car ahead of `id` has crashed
    pub fn crashes_upfront(&self, id: CarId) -> RoadResult<bool> {
        let slot = *self.index.get(&id).ok_or(RoadError::UnknownCar(id))?;
        Ok(self.cars[slot + 1..].iter().any(SimCar::is_crashed))
    }

    /// Advance one tick without observers
    pub fn advance(&mut self, tick: u64) -> RoadResult<RoadStatus> {
        self.advance_observed(tick, &mut ())
    }

    /// Advance one tick, reporting crashes and exits to `observer`
    pub fn advance_observed(
        &mut self,
        tick: u64,
        observer: &mut dyn RoadObserver,
    ) -> RoadResult<RoadStatus> {
        self.update_cars(tick, observer);
        self.tow_cars(tick);
        self.release_exits(tick, observer);

        if let Some(front) = self.cars.last_mut() {
            front.front = None;
        }
        if let Some(back) = self.cars.first_mut() {
            back.back = None;
        }

        self.check_invariants()?;
        self.time += 1;

        Ok(if self.cars.is_empty() {
            RoadStatus::Empty
        } else {
            RoadStatus::Active
        })
    }

    fn update_cars(&mut self, tick: u64, observer: &mut dyn RoadObserver) {
        let Self {
            config,
            cars,
            collisions,
            stats,
            rng,
            ..
        } = self;
        let precision = config.precision;
        let ctx = StepContext {
            tick,
            precision,
            behavior: &config.behavior,
        };

        // Cars ahead of the one being updated have not moved yet this tick,
        // so the start-of-tick picture is exact for both policies.
        let mut hazard_ahead = vec![false; cars.len()];
        for i in (0..cars.len().saturating_sub(1)).rev() {
            hazard_ahead[i] = hazard_ahead[i + 1] || cars[i + 1].is_crashed();
        }

        let frozen: Option<Vec<NeighborView>> = match config.update_policy {
            UpdatePolicy::Snapshot => Some(cars.iter().map(SimCar::view).collect()),
            UpdatePolicy::Sequential => None,
        };

        for i in 0..cars.len() {
            let view = |j: usize| match &frozen {
                Some(views) => views.get(j).copied(),
                None => cars.get(j).map(SimCar::view),
            };
            let around = Surroundings {
                front: view(i + 1),
                back: i.checked_sub(1).and_then(view),
                hazard_ahead: hazard_ahead[i],
            };

            let car = &mut cars[i];
            let result = car.update(&ctx, &around, &mut *rng);

            stats.velocity.push(car.velocity());
            stats.acceleration.push(car.acceleration());

            if result == CarUpdateResult::Crashed {
                debug!("Car {} collided at {:.1} m", car.id(), car.position());
            }

            // Injected crashes are picked up here as well
            let registered = collisions.iter().any(|(id, _)| *id == car.id());
            if car.is_crashed() && !registered {
                collisions.push((car.id(), tick));
                stats.historic_crashes += 1;
                info!(
                    "Crash: car {} at {:.1} m, v={:.2} m/s, tick {}",
                    car.id(),
                    car.position(),
                    car.velocity(),
                    tick
                );
                observer.on_crash(&car.event(CarEventKind::Crash, tick, precision));
            }
        }
    }

    fn tow_cars(&mut self, tick: u64) {
        if self.collisions.is_empty() {
            return;
        }

        let tow_delay = self.config.tow_delay;
        let due: Vec<CarId> = self
            .collisions
            .iter()
            .filter(|(_, crash_tick)| crash_tick.saturating_add(tow_delay) <= tick)
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            if let Some(&slot) = self.index.get(&id) {
                self.detach(slot);
                self.stats.total_tows += 1;
                info!("Towed car {} at tick {}", id, tick);
            }
        }
    }

    fn release_exits(&mut self, tick: u64, observer: &mut dyn RoadObserver) {
        let precision = self.config.precision;
        let length = self.config.length;

        // Only a suffix of the sorted sequence can be past the end
        while let Some(front) = self.cars.last() {
            if front.position() <= length {
                break;
            }
            let event = front.event(CarEventKind::Exit, tick, precision);
            observer.on_exit(&event);

            self.stats.trip_duration.push(event.trip_time);
            self.stats.total_exits += 1;
            debug!(
                "Car {} left the road after {:.1}s (avg v={:.2} m/s)",
                event.id, event.trip_time, event.avg_velocity
            );

            self.detach(self.cars.len() - 1);
        }
    }

    /// Remove the car at `slot`, patching neighbor ids around the gap
    fn detach(&mut self, slot: usize) -> SimCar {
        let car = self.cars.remove(slot);
        self.index.remove(&car.id());
        self.collisions.retain(|(id, _)| *id != car.id());

        if slot > 0 {
            self.patch_links(slot - 1);
        } else {
            self.patch_links(0);
        }
        self.reindex_from(slot);
        car
    }

    fn fresh_id(&mut self) -> CarId {
        loop {
            let id = CarId(self.next_id);
            self.next_id += 1;
            if !self.historic_ids.contains(&id) {
                return id;
            }
        }
    }

    /// Recompute neighbor ids for `slot` and the cars right next to it
    fn patch_links(&mut self, slot: usize) {
        let lo = slot.saturating_sub(1);
        let hi = (slot + 2).min(self.cars.len());
        for i in lo..hi {
            let back = i.checked_sub(1).map(|j| self.cars[j].id());
            let front = self.cars.get(i + 1).map(SimCar::id);
            let car = &mut self.cars[i];
            car.back = back;
            car.front = front;
        }
    }

    fn reindex_from(&mut self, slot: usize) {
        for (i, car) in self.cars.iter().enumerate().skip(slot) {
            self.index.insert(car.id(), i);
        }
    }

    /// Verify ordering, links, velocity bounds and registry uniqueness
    pub fn check_invariants(&self) -> RoadResult<()> {
        let mut ids = HashSet::new();
        for car in &self.cars {
            if !ids.insert(car.id()) {
                return Err(RoadError::DuplicateId(car.id()));
            }
        }

        for (i, car) in self.cars.iter().enumerate() {
            if self.index.get(&car.id()) != Some(&i) {
                return Err(RoadError::BrokenLink(car.id()));
            }

            let expected_back = i.checked_sub(1).map(|j| self.cars[j].id());
            let expected_front = self.cars.get(i + 1).map(SimCar::id);
            if car.back() != expected_back || car.front() != expected_front {
                return Err(RoadError::BrokenLink(car.id()));
            }

            if let Some(front) = self.cars.get(i + 1) {
                if front.position() < car.position() {
                    return Err(RoadError::OutOfOrder {
                        back: car.id(),
                        back_position: car.position(),
                        front: front.id(),
                        front_position: front.position(),
                    });
                }
            }

            let v = car.velocity();
            if !(0.0..=car.max_velocity()).contains(&v) {
                return Err(RoadError::VelocityOutOfBounds {
                    id: car.id(),
                    velocity: v,
                    max: car.max_velocity(),
                });
            }
        }

        let mut registered = HashSet::new();
        for (id, _) in &self.collisions {
            if !registered.insert(*id) {
                return Err(RoadError::DuplicateId(*id));
            }
        }

        Ok(())
    }

    /// Crashed cars still waiting for the tow, with their crash tick
    pub fn collisions(&self) -> &[(CarId, u64)] {
        &self.collisions
    }

    pub fn historic_car_count(&self) -> usize {
        self.historic_ids.len()
    }

    pub fn current_crash_count(&self) -> usize {
        self.collisions.len()
    }

    pub fn historic_crash_count(&self) -> u64 {
        self.stats.historic_crashes
    }

    pub fn stats(&self) -> &RoadStats {
        &self.stats
    }

    /// Mean velocity over every car and tick so far
    pub fn avg_velocity(&self) -> f64 {
        self.stats.velocity.mean()
    }

    pub fn avg_acceleration(&self) -> f64 {
        self.stats.acceleration.mean()
    }

    pub fn avg_trip_duration(&self) -> f64 {
        self.stats.trip_duration.mean()
    }

    /// Aggregate row for one external frame
    pub fn frame_snapshot(&self, frame: u64) -> RoadSnapshot {
        RoadSnapshot {
            frame,
            current_car_count: self.cars.len(),
            historic_car_count: self.historic_car_count(),
            current_crash_count: self.current_crash_count(),
            historic_crash_count: self.historic_crash_count(),
            avg_v: self.avg_velocity(),
            avg_a: self.avg_acceleration(),
            avg_trip_duration: self.avg_trip_duration(),
        }
    }
}
