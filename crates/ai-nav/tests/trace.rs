use std::collections::VecDeque;

use ai_core::{GoalStatus, NavConfig, ObjectHandle, ObjectState, TickContext, Vec3, WorldView};
use ai_nav::{
    ActorTarget, ActorTargetPhase, BodyInfo, ManeuverDir, MovementRequest, NavContext, NavEvent,
    NavPath, NavWorldMut, NavWorldView, NavigationService, PathDecision, PathFollowResult,
    PathFollower, PathFollowerParams, PathPoll, PathRequest, PathRequestId, PathState,
    PredictionRequest, Stance, TraceDimension, TraceOp, TraceParams, TracePhase,
};

const DT: f32 = 0.1;

#[derive(Default)]
struct ScriptedNav {
    next_id: u32,
    requests: Vec<PathRequest>,
    answers: VecDeque<PathPoll>,
    cancelled: Vec<PathRequestId>,
}

impl NavigationService for ScriptedNav {
    fn request_path(&mut self, request: PathRequest) -> PathRequestId {
        self.next_id += 1;
        self.requests.push(request);
        PathRequestId(self.next_id)
    }

    fn poll_path(&mut self, _id: PathRequestId) -> PathPoll {
        self.answers.pop_front().unwrap_or(PathPoll::StillFinding)
    }

    fn cancel_path(&mut self, id: PathRequestId) {
        self.cancelled.push(id);
    }
}

struct TestWorld {
    pos: Vec3,
    vel: Vec3,
    facing: Vec3,
    grounded: bool,
    driver_fallen: bool,
    nav: ScriptedNav,
}

impl TestWorld {
    fn at(pos: Vec3) -> Self {
        Self {
            pos,
            vel: Vec3::ZERO,
            facing: Vec3::UNIT_X,
            grounded: true,
            driver_fallen: false,
            nav: ScriptedNav::default(),
        }
    }

    fn integrate(&mut self, movement: &MovementRequest) {
        self.vel = movement.move_dir * movement.desired_speed;
        self.pos += self.vel * DT;
    }
}

impl WorldView for TestWorld {
    type Agent = u64;

    fn object(&self, _handle: ObjectHandle) -> Option<ObjectState> {
        None
    }
}

impl NavWorldView for TestWorld {
    fn position(&self, _agent: u64) -> Option<Vec3> {
        Some(self.pos)
    }

    fn velocity(&self, _agent: u64) -> Vec3 {
        self.vel
    }

    fn query_body_info(&self, _agent: u64, stance: Option<Stance>) -> Option<BodyInfo> {
        Some(BodyInfo {
            eye_pos: self.pos + Vec3::UNIT_Z * 1.7,
            eye_dir: self.facing,
            body_dir: self.facing,
            move_dir: self.vel.normalize_or_zero(),
            stance: stance.unwrap_or_default(),
        })
    }

    fn is_vehicle_driver_fallen(&self, _agent: u64) -> bool {
        self.driver_fallen
    }

    fn is_grounded(&self, _agent: u64) -> bool {
        self.grounded
    }
}

impl NavWorldMut for TestWorld {
    fn navigation(&mut self) -> &mut dyn NavigationService {
        &mut self.nav
    }
}

struct Harness {
    world: TestWorld,
    path: PathState,
    events: Vec<NavEvent>,
    config: NavConfig,
    tick: u64,
}

impl Harness {
    fn new(start: Vec3) -> Self {
        Self {
            world: TestWorld::at(start),
            path: PathState::default(),
            events: Vec::new(),
            config: NavConfig::default(),
            tick: 0,
        }
    }

    fn with_path(start: Vec3, points: &[Vec3]) -> Self {
        let mut h = Self::new(start);
        h.path.set_path(NavPath::new(points.to_vec()));
        h
    }

    fn ctx(&self) -> TickContext {
        TickContext::new(self.tick, DT, self.tick as f64 * f64::from(DT), 7)
    }

    fn execute(&mut self, op: &mut TraceOp) -> GoalStatus {
        let tick = self.ctx();
        let mut cx = NavContext {
            tick: &tick,
            config: &self.config,
            agent: 1,
            world: &mut self.world,
            path: &mut self.path,
            events: &mut self.events,
        };
        let status = op.execute(&mut cx);
        self.tick += 1;
        status
    }

    fn dry(&mut self, op: &mut TraceOp) {
        let tick = self.ctx().dry();
        let mut cx = NavContext {
            tick: &tick,
            config: &self.config,
            agent: 1,
            world: &mut self.world,
            path: &mut self.path,
            events: &mut self.events,
        };
        op.execute_dry(&mut cx);
        self.tick += 1;
    }

    fn step(&mut self, op: &mut TraceOp) -> GoalStatus {
        let status = self.execute(op);
        self.world.integrate(&self.path.movement);
        status
    }

    fn run(&mut self, op: &mut TraceOp, max_ticks: usize) -> GoalStatus {
        for _ in 0..max_ticks {
            let status = self.step(op);
            if status != GoalStatus::InProgress {
                return status;
            }
        }
        GoalStatus::InProgress
    }
}

fn line(to_x: f32) -> [Vec3; 2] {
    [Vec3::ZERO, Vec3::new(to_x, 0.0, 0.0)]
}

#[test]
fn follows_path_to_the_end() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    let mut op = TraceOp::new(TraceParams::default());

    let status = h.run(&mut op, 300);

    assert_eq!(status, GoalStatus::Succeeded);
    assert_eq!(op.phase(), TracePhase::Succeeded);
    assert!(h.world.pos.x > 9.7, "ended at {:?}", h.world.pos);
    assert!(op.travelled() > 9.0);
    assert!(h.path.movement.is_stopped());
}

#[test]
fn tracing_requests_predictions_when_enabled() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(20.0));
    let mut op = TraceOp::new(TraceParams::default());

    assert_eq!(h.step(&mut op), GoalStatus::InProgress);
    assert_eq!(op.phase(), TracePhase::Tracing(TraceDimension::TwoD));
    assert_eq!(h.path.movement.predicted.len(), 10);

    h.config.predictive_following = false;
    h.step(&mut op);
    assert!(h.path.movement.predicted.is_empty());
}

#[test]
fn no_path_fails_immediately() {
    let mut h = Harness::new(Vec3::ZERO);
    h.world.nav.answers.push_back(PathPoll::NoPath);
    h.path
        .request_path(&mut h.world.nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_X));
    h.path.poll(&mut h.world.nav);
    assert_eq!(h.path.decision(), PathDecision::NoPath);

    let mut op = TraceOp::new(TraceParams::default());
    assert_eq!(h.execute(&mut op), GoalStatus::Failed);
    assert_eq!(op.phase(), TracePhase::Failed);
}

#[test]
fn waits_while_path_is_still_being_found() {
    let mut h = Harness::new(Vec3::ZERO);
    h.path
        .request_path(&mut h.world.nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_X));
    h.path.poll(&mut h.world.nav);

    let mut op = TraceOp::new(TraceParams::default());
    assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
    assert_eq!(op.phase(), TracePhase::NotStarted);
    assert!(h.path.movement.is_stopped());
}

#[test]
fn fallen_driver_fails_the_trace() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    let mut op = TraceOp::new(TraceParams::default());
    h.step(&mut op);

    h.world.driver_fallen = true;
    assert_eq!(h.execute(&mut op), GoalStatus::Failed);
    assert!(h.path.movement.is_stopped());
}

#[test]
fn empty_path_succeeds_without_moving() {
    let mut h = Harness::new(Vec3::ZERO);
    let mut op = TraceOp::new(TraceParams::default());

    assert_eq!(h.execute(&mut op), GoalStatus::Succeeded);
    assert_eq!(op.start_position(), Some(Vec3::ZERO));
}

#[test]
fn stuck_agent_raises_an_event_but_keeps_tracing() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(100.0));
    let mut op = TraceOp::new(TraceParams::default());

    for _ in 0..25 {
        assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
    }

    let stuck = h
        .events
        .iter()
        .filter(|e| matches!(e, NavEvent::Stuck { .. }))
        .count();
    assert_eq!(stuck, 1);
}

#[test]
fn exact_positioning_holds_the_trace_until_finished() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    h.path.set_actor_target(Some(ActorTarget {
        position: Vec3::new(10.0, 0.0, 0.0),
        direction: Vec3::UNIT_Y,
        phase: ActorTargetPhase::Pending,
    }));
    let mut op = TraceOp::new(TraceParams::default());

    for _ in 0..100 {
        h.step(&mut op);
        if op.phase() == TracePhase::ExactPositioning {
            break;
        }
    }
    assert_eq!(op.phase(), TracePhase::ExactPositioning);
    assert!(h.events.contains(&NavEvent::ExactPositioningStarted));
    assert!(h.world.pos.x >= 7.5 - 0.6);
    assert_eq!(
        h.path.actor_target().map(|t| t.phase),
        Some(ActorTargetPhase::Triggered)
    );

    h.path.set_actor_target_phase(ActorTargetPhase::Playing);
    for _ in 0..5 {
        assert_eq!(h.step(&mut op), GoalStatus::InProgress);
    }

    h.path.set_actor_target_phase(ActorTargetPhase::Finished);
    assert_eq!(h.execute(&mut op), GoalStatus::Succeeded);
    assert_eq!(h.path.actor_target(), None);
}

#[test]
fn exact_positioning_error_fails_the_trace() {
    let mut h = Harness::with_path(Vec3::new(9.0, 0.0, 0.0), &line(10.0));
    h.path.set_actor_target(Some(ActorTarget {
        position: Vec3::new(10.0, 0.0, 0.0),
        direction: Vec3::UNIT_X,
        phase: ActorTargetPhase::Pending,
    }));
    let mut op = TraceOp::new(TraceParams::default());

    assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
    assert_eq!(op.phase(), TracePhase::ExactPositioning);

    h.path.set_actor_target_phase(ActorTargetPhase::Error);
    assert_eq!(h.execute(&mut op), GoalStatus::Failed);
}

#[test]
fn facing_away_from_the_path_starts_and_ends_a_maneuver() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    h.world.facing = -Vec3::UNIT_X;
    let mut op = TraceOp::new(TraceParams::default());

    assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
    assert_eq!(op.phase(), TracePhase::Maneuvering(ManeuverDir::Back));
    assert!(h.path.movement.desired_speed < 0.0);
    assert_eq!(h.path.movement.body_target_dir, Some(Vec3::UNIT_X));
    assert_eq!(h.events, vec![NavEvent::ManeuverStarted(ManeuverDir::Back)]);

    h.world.facing = Vec3::UNIT_X;
    for _ in 0..6 {
        h.execute(&mut op);
    }

    assert_eq!(op.phase(), TracePhase::Tracing(TraceDimension::TwoD));
    assert!(h.events.contains(&NavEvent::ManeuverEnded));
    assert!(h.path.movement.desired_speed > 0.0);
}

#[test]
fn maneuver_is_bounded_in_time() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    h.world.facing = -Vec3::UNIT_X;
    let mut op = TraceOp::new(TraceParams::default());

    for _ in 0..60 {
        h.execute(&mut op);
    }

    assert!(h.events.contains(&NavEvent::ManeuverEnded));
}

#[test]
fn maneuvers_can_be_disabled() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    h.world.facing = -Vec3::UNIT_X;
    let mut op = TraceOp::new(TraceParams {
        allow_maneuver: false,
        ..TraceParams::default()
    });

    h.execute(&mut op);

    assert_eq!(op.phase(), TracePhase::Tracing(TraceDimension::TwoD));
    assert!(h.events.is_empty());
}

#[test]
fn preamble_turns_the_body_before_moving() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    h.world.facing = Vec3::UNIT_Y;
    let mut op = TraceOp::new(TraceParams {
        align_before_move: true,
        ..TraceParams::default()
    });

    assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
    assert_eq!(op.phase(), TracePhase::PreambleAlignment);
    assert!(h.path.movement.is_stopped());
    assert_eq!(h.path.movement.body_target_dir, Some(Vec3::UNIT_X));

    h.world.facing = Vec3::UNIT_X;
    h.execute(&mut op);
    assert_eq!(op.phase(), TracePhase::Tracing(TraceDimension::TwoD));
    assert!(h.path.movement.desired_speed > 0.0);
}

#[test]
fn landing_completes_only_once_grounded() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    h.world.grounded = false;
    h.path.follower_mut().set_params(PathFollowerParams {
        use_2d: false,
        ..PathFollowerParams::default()
    });
    let mut op = TraceOp::new(TraceParams {
        dimension: TraceDimension::ThreeD,
        land_height: 2.0,
        ..TraceParams::default()
    });

    h.step(&mut op);
    assert_eq!(h.path.landing_offset, 2.0);

    let mut saw_ramp = false;
    for _ in 0..400 {
        assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
        if h.path.movement.move_dir == -Vec3::UNIT_Z {
            break;
        }
        if op.phase() == TracePhase::Landing && h.path.landing_offset < 2.0 {
            saw_ramp = true;
        }
        h.world.integrate(&h.path.movement);
    }
    assert!(saw_ramp);
    assert_eq!(op.phase(), TracePhase::Landing);
    assert_eq!(h.path.movement.move_dir, -Vec3::UNIT_Z);

    h.world.grounded = true;
    assert_eq!(h.execute(&mut op), GoalStatus::Succeeded);
    assert!(h.events.contains(&NavEvent::Landed));
    assert_eq!(h.path.landing_offset, 0.0);
}

#[test]
fn dry_update_defers_completion_to_next_full_update() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    let mut op = TraceOp::new(TraceParams::default());
    h.step(&mut op);

    h.world.pos = Vec3::new(10.0, 0.0, 0.0);
    h.world.vel = Vec3::ZERO;
    h.dry(&mut op);

    assert!(h.path.movement.is_stopped());
    assert_eq!(op.phase(), TracePhase::Tracing(TraceDimension::TwoD));
    assert_eq!(h.execute(&mut op), GoalStatus::Succeeded);
}

#[derive(Default)]
struct LostFollower {
    params: PathFollowerParams,
}

impl PathFollower for LostFollower {
    fn params(&self) -> &PathFollowerParams {
        &self.params
    }

    fn set_params(&mut self, params: PathFollowerParams) {
        self.params = params;
    }

    fn attach(&mut self, _path: &NavPath) {}

    fn reset(&mut self) {}

    fn advance(
        &mut self,
        _position: Vec3,
        _dt_seconds: f32,
        _prediction: Option<PredictionRequest>,
    ) -> Option<PathFollowResult> {
        None
    }

    fn distance_to_end(&self, _position: Vec3) -> f32 {
        f32::INFINITY
    }
}

#[test]
fn follower_failure_regenerates_after_delay() {
    let mut h = Harness::new(Vec3::ZERO);
    h.path = PathState::new(Box::new(LostFollower::default()));
    h.world
        .nav
        .answers
        .push_back(PathPoll::Found(NavPath::new(line(10.0).to_vec())));
    h.path
        .request_path(&mut h.world.nav, PathRequest::new(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)));
    h.path.poll(&mut h.world.nav);
    assert_eq!(h.path.decision(), PathDecision::PathFound);

    let mut op = TraceOp::new(TraceParams::default());
    for _ in 0..4 {
        assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
    }
    assert_eq!(h.world.nav.requests.len(), 1);

    for _ in 0..3 {
        assert_eq!(h.execute(&mut op), GoalStatus::InProgress);
    }
    assert_eq!(h.world.nav.requests.len(), 2);
    assert!(h.events.contains(&NavEvent::RegenerationRequested));
    assert_eq!(h.path.decision(), PathDecision::StillFinding);
}

#[test]
fn reset_is_idempotent() {
    let mut h = Harness::with_path(Vec3::ZERO, &line(10.0));
    let mut op = TraceOp::new(TraceParams::default());
    for _ in 0..5 {
        h.step(&mut op);
    }

    op.reset(&mut h.path);
    let once = op.clone();
    op.reset(&mut h.path);

    assert_eq!(op, once);
    assert_eq!(op, TraceOp::new(TraceParams::default()));
    assert!(h.path.movement.is_stopped());
}
