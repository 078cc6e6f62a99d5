use ai_core::{ObjectHandle, ObjectState, PipeConfig, Vec3, WorldView};
use ai_cover::{
    CoverId, CoverSurface, CoverWorldMut, QueuedRayId, RayPriority, RayQueryService, RayReply,
    RayRequest,
};
use ai_nav::{
    BodyInfo, NavWorldMut, NavWorldView, NavigationService, PathPoll, PathRequest, PathRequestId,
    Stance,
};
use ai_pipe::{
    BranchCondition, BranchKind, GoalOp, GoalPipe, InstructionKind, PipeBuilder, PipeError,
    PipeLibrary, PopResult, WaitMode,
};

/// Never asked for anything: these tests only walk pipe structure.
struct Offline;

impl NavigationService for Offline {
    fn request_path(&mut self, _request: PathRequest) -> PathRequestId {
        unreachable!("no navigation in pipe structure tests")
    }

    fn poll_path(&mut self, _id: PathRequestId) -> PathPoll {
        PathPoll::NoPath
    }

    fn cancel_path(&mut self, _id: PathRequestId) {}
}

impl RayQueryService for Offline {
    fn queue(&mut self, _priority: RayPriority, _request: RayRequest, _reply: RayReply) -> QueuedRayId {
        unreachable!("no rays in pipe structure tests")
    }

    fn cancel(&mut self, _id: QueuedRayId) {}
}

struct EmptyWorld {
    offline: Offline,
}

impl WorldView for EmptyWorld {
    type Agent = u32;

    fn object(&self, _handle: ObjectHandle) -> Option<ObjectState> {
        None
    }
}

impl NavWorldView for EmptyWorld {
    fn position(&self, _agent: u32) -> Option<Vec3> {
        Some(Vec3::ZERO)
    }

    fn query_body_info(&self, _agent: u32, _stance: Option<Stance>) -> Option<BodyInfo> {
        None
    }
}

impl NavWorldMut for EmptyWorld {
    fn navigation(&mut self) -> &mut dyn NavigationService {
        &mut self.offline
    }
}

impl CoverWorldMut for EmptyWorld {
    fn rays(&mut self) -> &mut dyn RayQueryService {
        &mut self.offline
    }

    fn cover_surface(&self, _id: CoverId) -> Option<CoverSurface> {
        None
    }
}

type Builder = PipeBuilder<EmptyWorld>;

fn three_timeouts() -> GoalPipe<EmptyWorld> {
    Builder::new("idle")
        .goal(GoalOp::timeout(1.0, 1.0))
        .goal(GoalOp::timeout(2.0, 2.0))
        .goal(GoalOp::timeout(3.0, 3.0))
        .build()
        .unwrap()
        .instantiate()
}

#[test]
fn pop_visits_each_instruction_once_then_reports_the_end() {
    let mut pipe = three_timeouts();
    assert_eq!(pipe.pop(), PopResult::Succeed(0));
    assert_eq!(pipe.pop(), PopResult::Succeed(1));
    assert_eq!(pipe.pop(), PopResult::Succeed(2));
    assert_eq!(pipe.pop(), PopResult::AtEnd);
    assert_eq!(pipe.pop(), PopResult::AtEnd);
    assert!(pipe.is_at_end());

    pipe.request_break();
    assert_eq!(pipe.pop(), PopResult::BreakLoop);
}

#[test]
fn reset_is_idempotent() {
    let mut pipe = three_timeouts();
    pipe.pop();
    pipe.pop();
    pipe.set_target_snapshot(Some(Vec3::UNIT_X));
    pipe.request_break();

    pipe.reset();
    assert_eq!(pipe.cursor(), 0);
    assert_eq!(pipe.target_snapshot(), None);
    pipe.reset();
    assert_eq!(pipe.cursor(), 0);
    assert_eq!(pipe.last_result(), None);

    for _ in 0..3 {
        pipe.pop();
    }
    assert_eq!(pipe.pop(), PopResult::AtEnd);
}

#[test]
fn jumps_report_backward_moves_and_ignore_out_of_range_targets() {
    let mut pipe = three_timeouts();
    assert!(!pipe.jump(0, 2));
    assert_eq!(pipe.cursor(), 2);

    assert!(pipe.jump(2, -2));
    assert_eq!(pipe.cursor(), 0);

    // Landing exactly on the end is allowed.
    assert!(!pipe.jump(0, 3));
    assert!(pipe.is_at_end());

    pipe.rewind_to(1);
    assert!(!pipe.jump(1, 10));
    assert!(!pipe.jump(1, -5));
    assert_eq!(pipe.cursor(), 1);
}

#[test]
fn labels_resolve_to_relative_offsets() {
    let template = Builder::new("fight")
        .label("top")
        .goal(GoalOp::timeout(0.5, 0.5))
        .branch(BranchKind::NoTarget, "done")
        .branch(BranchKind::Always, "top")
        .label("done")
        .goal(GoalOp::signal("OnDone", 0.0))
        .build()
        .unwrap();

    let offsets: Vec<i32> = template
        .instructions()
        .iter()
        .filter_map(|ins| match ins.kind {
            InstructionKind::Branch { offset, .. } => Some(offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![2, -2]);

    let mut pipe = template.instantiate();
    pipe.rewind_to(1);
    pipe.pop();
    assert!(!pipe.jump(1, offsets[0]));
    assert_eq!(pipe.pop(), PopResult::Succeed(3));
}

#[test]
fn builder_flags_goal_placement() {
    let template = Builder::new("volley")
        .goal_grouped(GoalOp::timeout(1.0, 1.0))
        .goal_grouped(GoalOp::timeout(1.0, 2.0))
        .wait(WaitMode::Any2)
        .goal_concurrent(GoalOp::signal("OnVolley", 0.0))
        .clear(false)
        .build()
        .unwrap();
    let ins = template.instructions();
    assert!(ins[0].grouped && !ins[0].blocking);
    assert!(ins[2].blocking);
    assert!(matches!(ins[2].kind, InstructionKind::Wait(WaitMode::Any2)));
    assert!(!ins[3].grouped && !ins[3].blocking);
    assert!(matches!(ins[4].kind, InstructionKind::Clear { clear_target: false }));
}

#[test]
fn builder_errors_surface_at_build() {
    let missing = Builder::new("lost").branch(BranchKind::Always, "nowhere").build();
    assert_eq!(
        missing.err(),
        Some(PipeError::UnknownLabel {
            pipe: "lost".to_string(),
            label: "nowhere".to_string(),
        })
    );

    let twice = Builder::new("twice")
        .label("a")
        .goal(GoalOp::SetCompromised)
        .label("a")
        .build();
    assert!(matches!(twice.err(), Some(PipeError::DuplicateLabel { .. })));

    assert_eq!(Builder::new("").build().err(), Some(PipeError::EmptyName));

    let named = Builder::new("named").branch_named("IF_WHATEVER", 0.0, 1).build();
    assert_eq!(
        named.err(),
        Some(PipeError::UnknownBranch("IF_WHATEVER".to_string()))
    );
}

#[test]
fn unknown_branch_codes_need_the_legacy_fallback() {
    let strict = Builder::new("codes").branch_code(99, 0.0, false, 1).build();
    assert_eq!(strict.err(), Some(PipeError::UnknownBranchCode(99)));

    let unimplemented = Builder::new("codes").branch_code(4, 0.0, false, 1).build();
    assert_eq!(unimplemented.err(), Some(PipeError::UnknownBranchCode(4)));

    let lenient = Builder::new("codes")
        .legacy_branch_fallback(true)
        .branch_code(99, 0.0, true, 1)
        .build()
        .unwrap();
    match &lenient.instructions()[0].kind {
        InstructionKind::Branch { condition, offset } => {
            assert_eq!(*condition, BranchCondition::not(BranchKind::LegacyActiveGoals));
            assert_eq!(*offset, 1);
        }
        other => panic!("expected a branch, got {other:?}"),
    }
}

#[test]
fn config_switches_the_legacy_fallback_on() {
    let strict = Builder::with_config("codes", &PipeConfig::default())
        .branch_code(99, 0.0, false, 1)
        .build();
    assert_eq!(strict.err(), Some(PipeError::UnknownBranchCode(99)));

    let config = PipeConfig {
        legacy_branch_fallback: true,
        ..PipeConfig::default()
    };
    let lenient = Builder::with_config("codes", &config)
        .branch_code(99, 0.0, false, 1)
        .build()
        .unwrap();
    assert!(matches!(
        &lenient.instructions()[0].kind,
        InstructionKind::Branch { condition, .. } if condition.kind == BranchKind::LegacyActiveGoals
    ));
}

#[test]
fn library_rejects_duplicates_and_unknown_names() {
    let mut library = PipeLibrary::<EmptyWorld>::new();
    library
        .register(Builder::new("idle").goal(GoalOp::timeout(1.0, 1.0)).build().unwrap())
        .unwrap();
    let again = library.register(Builder::new("idle").build().unwrap());
    assert_eq!(again, Err(PipeError::DuplicatePipe("idle".to_string())));
    assert_eq!(library.len(), 1);

    assert!(matches!(
        library.instantiate("missing"),
        Err(PipeError::UnknownPipe(name)) if name == "missing"
    ));

    let a = library.instantiate("idle").unwrap();
    let b = library.instantiate("idle").unwrap();
    assert_eq!(a.name(), "idle");
    assert_eq!(a.len(), b.len());
    assert!(!a.is_looping());
}
