use ai_core::Vec3;
use ai_nav::{NavPath, PathFollower, PathFollowerParams, PredictionRequest, StraightPathFollower};

fn straight(points: &[(f32, f32)]) -> NavPath {
    NavPath::new(points.iter().map(|&(x, y)| Vec3::new(x, y, 0.0)).collect())
}

#[test]
fn passes_waypoints_within_radius() {
    let mut follower = StraightPathFollower::new(PathFollowerParams::default());
    follower.attach(&straight(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)]));

    let r = follower.advance(Vec3::new(4.8, 0.0, 0.0), 0.1, None).unwrap();

    assert_eq!(r.next_target, Vec3::new(5.0, 5.0, 0.0));
    assert_eq!(follower.next_index(), 2);
    assert!(!r.reached_end);
    assert!((r.distance_to_end - (0.2f32.hypot(5.0))).abs() < 1e-3);
}

#[test]
fn reports_end_within_accuracy() {
    let mut follower = StraightPathFollower::new(PathFollowerParams::default());
    follower.attach(&straight(&[(0.0, 0.0), (3.0, 0.0)]));

    let r = follower.advance(Vec3::new(2.9, 0.0, 0.0), 0.1, None).unwrap();

    assert!(r.reached_end);
    assert_eq!(r.velocity, Vec3::ZERO);
}

#[test]
fn slows_down_towards_the_end() {
    let mut follower = StraightPathFollower::new(PathFollowerParams::default());
    follower.attach(&straight(&[(0.0, 0.0), (10.0, 0.0)]));

    let far = follower.advance(Vec3::new(1.0, 0.0, 0.0), 0.1, None).unwrap();
    let near = follower.advance(Vec3::new(9.0, 0.0, 0.0), 0.1, None).unwrap();

    assert!((far.velocity.length() - 5.0).abs() < 1e-4);
    assert!(near.velocity.length() < far.velocity.length());
    assert!(near.velocity.length() >= 0.5 - 1e-4);
}

#[test]
fn prediction_samples_the_horizon() {
    let mut follower = StraightPathFollower::new(PathFollowerParams::default());
    follower.attach(&straight(&[(0.0, 0.0), (100.0, 0.0)]));

    let request = PredictionRequest {
        horizon_seconds: 1.0,
        step_seconds: 0.1,
    };
    let r = follower.advance(Vec3::ZERO, 0.1, Some(request)).unwrap();

    assert_eq!(r.predicted.len(), 10);
    assert!((r.predicted[9].time - 1.0).abs() < 1e-4);
    assert!((r.predicted[9].position.x - 5.0).abs() < 1e-3);
    assert!(r.predicted.windows(2).all(|w| w[0].position.x < w[1].position.x));
}

#[test]
fn without_a_path_there_is_no_target() {
    let mut follower = StraightPathFollower::default();

    assert!(follower.advance(Vec3::ZERO, 0.1, None).is_none());

    follower.attach(&straight(&[(0.0, 0.0), (1.0, 0.0)]));
    follower.reset();
    assert!(follower.advance(Vec3::ZERO, 0.1, None).is_none());
}
