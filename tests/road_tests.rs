use std::collections::HashMap;

use highway_sim::simulation::{
    Admission, CarId, CarParams, EventLog, Placement, RoadConfig, RoadError, RoadStatus,
    SimRoad, Spawner, TrafficProfile, UpdatePolicy,
};

fn road(length: f64, precision: u32, tow_delay: u64) -> SimRoad {
    SimRoad::with_seed(RoadConfig::new(length, precision, tow_delay), 1)
        .expect("valid road config")
}

fn admit(road: &mut SimRoad, params: &CarParams, placement: Placement) -> CarId {
    road.add(params, placement)
        .expect("add should not fail")
        .id()
        .expect("car should be admitted")
}

#[test]
fn test_rejects_invalid_config() {
    assert!(matches!(
        SimRoad::with_seed(RoadConfig::new(-5.0, 10, 10), 0),
        Err(RoadError::InvalidLength(_))
    ));
    assert!(matches!(
        SimRoad::with_seed(RoadConfig::new(f64::NAN, 10, 10), 0),
        Err(RoadError::InvalidLength(_))
    ));
    assert!(matches!(
        SimRoad::with_seed(RoadConfig::new(1000.0, 0, 10), 0),
        Err(RoadError::InvalidPrecision)
    ));
}

#[test]
fn test_add_at_back_of_empty_road() {
    let mut road = road(1000.0, 10, 100);
    let admission = road.add(&CarParams::default(), Placement::AtBack).unwrap();

    assert_eq!(admission, Admission::Admitted(CarId(0)));
    assert_eq!(road.len(), 1);
    let car = road.back_car().unwrap();
    assert_eq!(car.position(), 0.0);
    assert_eq!(car.front(), None);
    assert_eq!(car.back(), None);
}

#[test]
fn test_add_keeps_order_and_links() {
    let mut road = road(1000.0, 10, 100);
    let params = CarParams::default();

    let far = admit(&mut road, &params, Placement::At(500.0));
    let back = admit(&mut road, &params, Placement::AtBack);
    let middle = admit(&mut road, &params, Placement::At(300.0));

    let order: Vec<CarId> = road.cars().iter().map(|car| car.id()).collect();
    assert_eq!(order, vec![back, middle, far]);

    let middle_car = road.get_car(middle).unwrap();
    assert_eq!(middle_car.back(), Some(back));
    assert_eq!(middle_car.front(), Some(far));
    assert_eq!(road.get_car(back).unwrap().front(), Some(middle));
    assert_eq!(road.get_car(far).unwrap().back(), Some(middle));

    road.check_invariants().unwrap();
}

#[test]
fn test_add_past_end_is_rejected() {
    let mut road = road(1000.0, 10, 100);
    let admission = road
        .add(&CarParams::default(), Placement::At(1500.0))
        .unwrap();

    assert_eq!(admission, Admission::Rejected);
    assert!(road.is_empty());
    assert_eq!(road.historic_car_count(), 0);
}

#[test]
fn test_duplicate_id_is_an_error() {
    let mut road = road(1000.0, 10, 100);
    let params = CarParams::default().with_id(CarId(7));

    road.add(&params, Placement::AtBack).unwrap();
    assert_eq!(
        road.add(&params, Placement::At(200.0)),
        Err(RoadError::DuplicateId(CarId(7)))
    );

    // Ids stay taken after the car is gone
    road.remove(CarId(7)).unwrap();
    assert_eq!(
        road.add(&params, Placement::AtBack),
        Err(RoadError::DuplicateId(CarId(7)))
    );
}

#[test]
fn test_fresh_ids_skip_requested_ones() {
    let mut road = road(1000.0, 10, 100);
    road.add(&CarParams::default().with_id(CarId(0)), Placement::At(100.0))
        .unwrap();
    let fresh = admit(&mut road, &CarParams::default(), Placement::AtBack);
    assert_eq!(fresh, CarId(1));
}

#[test]
fn test_remove_unknown_car() {
    let mut road = road(1000.0, 10, 100);
    assert_eq!(
        road.remove(CarId(42)).err(),
        Some(RoadError::UnknownCar(CarId(42)))
    );
    assert_eq!(
        road.inject_crash(CarId(42)),
        Err(RoadError::UnknownCar(CarId(42)))
    );
}

#[test]
fn test_remove_patches_neighbors() {
    let mut road = road(1000.0, 10, 100);
    let params = CarParams::default();
    let a = admit(&mut road, &params, Placement::At(0.0));
    let b = admit(&mut road, &params, Placement::At(100.0));
    let c = admit(&mut road, &params, Placement::At(200.0));

    let removed = road.remove(b).unwrap();
    assert_eq!(removed.id(), b);
    assert!(!road.contains(b));

    assert_eq!(road.get_car(a).unwrap().front(), Some(c));
    assert_eq!(road.get_car(c).unwrap().back(), Some(a));
    road.check_invariants().unwrap();
}

#[test]
fn test_crashes_upfront() {
    let mut road = road(1000.0, 10, 100);
    let params = CarParams::default();
    let back = admit(&mut road, &params, Placement::At(0.0));
    let middle = admit(&mut road, &params, Placement::At(100.0));
    let front = admit(&mut road, &params, Placement::At(200.0));

    assert!(!road.crashes_upfront(back).unwrap());

    road.inject_crash(front).unwrap();
    assert!(road.crashes_upfront(back).unwrap());
    assert!(road.crashes_upfront(middle).unwrap());
    assert!(!road.crashes_upfront(front).unwrap());
    assert!(road.crashes_upfront(CarId(99)).is_err());
}

#[test]
fn test_overlapping_cars_crash_once_each() {
    let mut road = road(1000.0, 10, 100);
    let params = CarParams::default();
    let back = admit(&mut road, &params, Placement::At(0.0));
    let front = admit(&mut road, &params, Placement::At(3.0));

    let mut log = EventLog::new();
    for tick in 0..20 {
        road.advance_observed(tick, &mut log).unwrap();
    }

    assert_eq!(log.crashes_of(back), 1);
    assert_eq!(log.crashes_of(front), 1);
    assert!(log.crashes.iter().all(|event| event.tick == 0));
    assert_eq!(road.historic_crash_count(), 2);
    assert_eq!(road.current_crash_count(), 2);
    assert_eq!(road.collisions(), &[(back, 0), (front, 0)]);
}

#[test]
fn test_exit_is_reported_once() {
    let mut road = road(1000.0, 10, 100);
    let id = admit(
        &mut road,
        &CarParams::default().with_velocity_ms(10.0),
        Placement::At(998.5),
    );

    let mut log = EventLog::new();
    assert_eq!(road.advance_observed(0, &mut log).unwrap(), RoadStatus::Active);
    assert_eq!(road.advance_observed(1, &mut log).unwrap(), RoadStatus::Empty);
    assert_eq!(road.advance_observed(2, &mut log).unwrap(), RoadStatus::Empty);

    assert_eq!(log.exits_of(id), 1);
    let exit = log.exits[0];
    assert_eq!(exit.tick, 1);
    assert!((exit.trip_time - 0.2).abs() < 1e-9);
    assert_eq!(exit.front_id(), -1);
    assert_eq!(exit.back_id(), -1);

    assert!(!road.contains(id));
    assert_eq!(road.stats().total_exits, 1);
    assert!((road.avg_trip_duration() - 0.2).abs() < 1e-9);
    assert_eq!(road.historic_car_count(), 1);
}

#[test]
fn test_frame_snapshot_aggregates() {
    let mut road = road(1000.0, 10, 100);
    let params = CarParams::default().with_velocity_kmh(36.0);
    admit(&mut road, &params, Placement::At(0.0));
    admit(&mut road, &params, Placement::At(500.0));

    for tick in 0..5 {
        road.advance(tick).unwrap();
    }

    let snapshot = road.frame_snapshot(3);
    assert_eq!(snapshot.frame, 3);
    assert_eq!(snapshot.current_car_count, 2);
    assert_eq!(snapshot.historic_car_count, 2);
    assert_eq!(snapshot.current_crash_count, 0);
    assert!((snapshot.avg_v - 10.0).abs() < 0.5);
    assert_eq!(road.stats().velocity.count(), 10);
    assert_eq!(road.time(), 5);
    assert_eq!(road.snapshots().len(), 2);
}

/// Drive a busy road and check the structural guarantees after every tick
fn run_busy_road(policy: UpdatePolicy, seed: u64) -> SimRoad {
    let config = RoadConfig::new(3000.0, 10, 300).with_update_policy(policy);
    let mut road = SimRoad::with_seed(config, seed).unwrap();
    let mut spawner = Spawner::new(TrafficProfile::new(100.0).unwrap(), seed + 1).unwrap();

    // Last seen (velocity, position) of every crashed car
    let mut wrecks: HashMap<CarId, (f64, f64)> = HashMap::new();
    let mut log = EventLog::new();

    let precision = road.precision() as u64;
    for frame in 0..300 {
        for sub_step in 0..precision {
            road.advance_observed(frame * precision + sub_step, &mut log)
                .expect("road invariants should hold");

            let cars = road.cars();
            for pair in cars.windows(2) {
                assert!(pair[0].position() <= pair[1].position());
                assert_eq!(pair[0].front(), Some(pair[1].id()));
                assert_eq!(pair[1].back(), Some(pair[0].id()));
            }

            for car in cars {
                assert!(car.velocity() >= 0.0 && car.velocity() <= car.max_velocity());

                if let Some(&(velocity, position)) = wrecks.get(&car.id()) {
                    assert!(car.is_crashed(), "crashed car {} recovered", car.id());
                    assert!(car.velocity() <= velocity);
                    if velocity == 0.0 {
                        assert_eq!(car.position(), position);
                    }
                }
                if car.is_crashed() {
                    wrecks.insert(car.id(), (car.velocity(), car.position()));
                }
            }
        }
        spawner.try_spawn(&mut road).unwrap();
    }

    for id in wrecks.keys() {
        assert_eq!(log.crashes_of(*id), 1);
    }
    assert_eq!(road.historic_crash_count() as usize, log.crashes.len());
    road
}

#[test]
fn test_busy_road_keeps_invariants() {
    let road = run_busy_road(UpdatePolicy::Sequential, 11);
    assert!(road.historic_car_count() > 1);
}

#[test]
fn test_busy_road_keeps_invariants_with_snapshot_updates() {
    let road = run_busy_road(UpdatePolicy::Snapshot, 11);
    assert!(road.historic_car_count() > 1);
}

#[test]
fn test_endless_tow_delay_keeps_wreck() {
    let mut road = road(1000.0, 10, u64::MAX);
    let id = admit(&mut road, &CarParams::default(), Placement::At(0.0));
    for tick in 0..5 {
        road.advance(tick).unwrap();
    }
    road.inject_crash(id).unwrap();

    for tick in 5..100 {
        road.advance(tick).unwrap();
    }
    assert!(road.contains(id));
    assert_eq!(road.current_crash_count(), 1);
    assert_eq!(road.stats().total_tows, 0);
}
