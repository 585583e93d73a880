//! End-to-end driving scenarios on small roads

use highway_sim::simulation::{
    Action, BehaviorConfig, CarId, CarParams, EventLog, Placement, RoadConfig, SimRoad,
    UpdatePolicy,
};

fn admit(road: &mut SimRoad, params: &CarParams, placement: Placement) -> CarId {
    road.add(params, placement).unwrap().id().unwrap()
}

/// A lone car accelerates up to its desired velocity and holds it
#[test]
fn test_free_flow_converges_to_desired_velocity() {
    for seed in 0..10 {
        let mut road = SimRoad::with_seed(RoadConfig::new(1000.0, 100, 5000), seed).unwrap();
        let id = admit(&mut road, &CarParams::default(), Placement::At(0.0));

        let mut last_position = 0.0;
        for tick in 0..3000 {
            road.advance(tick).unwrap();
            let car = road.get_car(id).expect("car should still be on the road");

            assert!(car.velocity() <= car.max_velocity());
            assert!(
                car.velocity() <= car.desired_velocity() + 1e-6,
                "seed {}: {} above desired at tick {}",
                seed,
                car.velocity(),
                tick
            );
            assert!(car.position() >= last_position);
            assert!(!car.is_crashed());
            last_position = car.position();
        }

        let car = road.get_car(id).unwrap();
        assert!(
            (car.desired_velocity() - car.velocity()).abs() < 1e-6,
            "seed {}: velocity {} did not settle at {}",
            seed,
            car.velocity(),
            car.desired_velocity()
        );
        assert!(car.position() < 1000.0);
    }
}

/// A follower closing in on a wreck stops short of its rear bumper
#[test]
fn test_follower_stops_behind_crashed_leader() {
    let mut road = SimRoad::with_seed(RoadConfig::new(1000.0, 100, 5000), 5).unwrap();
    let leader = admit(&mut road, &CarParams::default(), Placement::At(100.0));
    let follower = admit(
        &mut road,
        &CarParams::default().with_velocity_ms(20.0),
        Placement::At(0.0),
    );
    road.inject_crash(leader).unwrap();

    let mut log = EventLog::new();
    let mut first_braking = None;
    let mut reached_standstill = false;

    for tick in 0..1000 {
        road.advance_observed(tick, &mut log).unwrap();

        let wreck = road.get_car(leader).unwrap();
        let car = road.get_car(follower).unwrap();

        assert_eq!(wreck.position(), 100.0);
        assert!(!car.is_crashed(), "follower crashed at tick {}", tick);
        assert!(wreck.position() - wreck.length() - car.position() > 0.0);

        if tick == 0 {
            assert!(car
                .queued_actions()
                .iter()
                .any(|queued| queued.action == Action::Stop));
        }
        if first_braking.is_none() && (car.is_stopping() || car.acceleration() < 0.0) {
            first_braking = Some(tick);
        }
        reached_standstill |= car.velocity() == 0.0;
    }

    // Reaction time is 70 ticks at normal attention
    let first_braking = first_braking.expect("follower never braked");
    assert!(first_braking <= 100, "first braking at tick {}", first_braking);
    assert!(reached_standstill);

    assert_eq!(log.crashes_of(leader), 1);
    assert_eq!(log.crashes_of(follower), 0);
}

/// With a standstill gap the follower ends up parked a few meters short of the
/// wreck, however long it waits for the tow
#[test]
fn test_follower_keeps_standstill_gap_behind_wreck() {
    let behavior = BehaviorConfig {
        standstill_gap: 5.0,
        ..BehaviorConfig::default()
    };
    let config = RoadConfig::new(1000.0, 100, 5000).with_behavior(behavior);
    let mut road = SimRoad::with_seed(config, 6).unwrap();
    let leader = admit(&mut road, &CarParams::default(), Placement::At(100.0));
    let follower = admit(
        &mut road,
        &CarParams::default().with_velocity_ms(20.0),
        Placement::At(0.0),
    );
    road.inject_crash(leader).unwrap();

    let gap = |road: &SimRoad| {
        let wreck = road.get_car(leader).unwrap();
        wreck.position() - wreck.length() - road.get_car(follower).unwrap().position()
    };

    for tick in 0..4000 {
        road.advance(tick).unwrap();
        assert!(!road.get_car(follower).unwrap().is_crashed());
        assert!(gap(&road) > 0.0, "follower touched the wreck at tick {}", tick);
    }
    assert!(gap(&road) > 2.5, "parked {} m behind the wreck", gap(&road));
}

/// A wreck stays for exactly the tow delay
#[test]
fn test_crashed_car_is_towed_after_delay() {
    let mut road = SimRoad::with_seed(RoadConfig::new(5000.0, 1, 50), 9).unwrap();
    let id = admit(&mut road, &CarParams::default(), Placement::At(0.0));

    for tick in 0..10 {
        road.advance(tick).unwrap();
    }
    road.inject_crash(id).unwrap();
    road.advance(10).unwrap();
    assert_eq!(road.collisions(), &[(id, 10)]);

    for tick in 11..60 {
        road.advance(tick).unwrap();
    }
    assert!(road.contains(id), "towed too early");

    road.advance(60).unwrap();
    assert!(!road.contains(id), "not towed at tick 60");
    assert!(road.collisions().is_empty());
    assert_eq!(road.stats().total_tows, 1);
    assert_eq!(road.historic_crash_count(), 1);
    assert_eq!(road.current_crash_count(), 0);
}

/// Under sequential updates the front car sees where the back car ended up
/// this tick; under snapshot updates it sees where it started.
#[test]
fn test_update_policy_changes_what_front_car_sees() {
    fn crash_ticks(policy: UpdatePolicy) -> (u64, u64) {
        let config = RoadConfig::new(1000.0, 1, 1000).with_update_policy(policy);
        let mut road = SimRoad::with_seed(config, 4).unwrap();
        let back = admit(
            &mut road,
            &CarParams::default().with_velocity_ms(20.0),
            Placement::At(0.0),
        );
        let front = admit(&mut road, &CarParams::default(), Placement::At(15.0));

        let mut log = EventLog::new();
        for tick in 0..3 {
            road.advance_observed(tick, &mut log).unwrap();
        }
        let tick_of = |id: CarId| {
            log.crashes
                .iter()
                .find(|event| event.id == id)
                .map(|event| event.tick)
                .expect("car should have crashed")
        };
        (tick_of(back), tick_of(front))
    }

    assert_eq!(crash_ticks(UpdatePolicy::Sequential), (0, 0));
    assert_eq!(crash_ticks(UpdatePolicy::Snapshot), (0, 1));
}
