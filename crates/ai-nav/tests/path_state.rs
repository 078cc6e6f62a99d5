use std::collections::VecDeque;

use ai_core::Vec3;
use ai_nav::{
    NavPath, NavigationService, PathDecision, PathPoll, PathRequest, PathRequestId, PathState,
};

#[derive(Default)]
struct QueueNav {
    next_id: u32,
    answers: VecDeque<PathPoll>,
    cancelled: Vec<PathRequestId>,
    requests: Vec<PathRequest>,
}

impl NavigationService for QueueNav {
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

fn path() -> NavPath {
    NavPath::new(vec![Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0)])
}

#[test]
fn decision_follows_the_request_lifecycle() {
    let mut nav = QueueNav::default();
    let mut state = PathState::default();
    assert_eq!(state.decision(), PathDecision::Idle);

    state.request_path(&mut nav, PathRequest::new(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0)));
    assert_eq!(state.decision(), PathDecision::StillFinding);

    state.poll(&mut nav);
    assert_eq!(state.decision(), PathDecision::StillFinding);

    nav.answers.push_back(PathPoll::Found(path()));
    state.poll(&mut nav);
    assert_eq!(state.decision(), PathDecision::PathFound);
    assert_eq!(state.path_length(), 5.0);
    assert_eq!(state.pending_request(), None);
}

#[test]
fn new_request_cancels_the_pending_one() {
    let mut nav = QueueNav::default();
    let mut state = PathState::default();

    state.request_path(&mut nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_X));
    state.request_path(&mut nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_Y));

    assert_eq!(nav.cancelled, vec![PathRequestId(1)]);
    assert_eq!(state.pending_request(), Some(PathRequestId(2)));
}

#[test]
fn clear_cancels_and_forgets() {
    let mut nav = QueueNav::default();
    let mut state = PathState::default();
    state.request_path(&mut nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_X));

    state.clear(&mut nav);

    assert_eq!(nav.cancelled, vec![PathRequestId(1)]);
    assert_eq!(state.decision(), PathDecision::Idle);
    assert!(state.path().is_none());
    assert!(!state.request_regeneration(&mut nav, Vec3::ZERO));
}

#[test]
fn regeneration_reuses_last_request_from_new_start() {
    let mut nav = QueueNav::default();
    let mut state = PathState::default();
    state.request_path(&mut nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_X).partial());
    nav.answers.push_back(PathPoll::Found(path()));
    state.poll(&mut nav);

    assert!(state.request_regeneration(&mut nav, Vec3::new(1.0, 1.0, 0.0)));

    let last = nav.requests.last().unwrap();
    assert_eq!(last.start, Vec3::new(1.0, 1.0, 0.0));
    assert!(last.accepts_partial());
}

#[test]
fn inhibited_regeneration_sends_nothing() {
    let mut nav = QueueNav::default();
    let mut state = PathState::default();
    state.request_path(&mut nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_X));
    nav.answers.push_back(PathPoll::NoPath);
    state.poll(&mut nav);
    assert_eq!(state.decision(), PathDecision::NoPath);

    state.inhibit_regeneration();
    assert!(!state.request_regeneration(&mut nav, Vec3::ZERO));
    assert_eq!(nav.requests.len(), 1);
}

#[test]
fn cancelling_a_request_goes_idle_without_touching_a_found_path() {
    let mut nav = QueueNav::default();
    let mut state = PathState::default();

    state.request_path(&mut nav, PathRequest::new(Vec3::ZERO, Vec3::UNIT_X));
    assert!(state.cancel_request(&mut nav));
    assert_eq!(state.decision(), PathDecision::Idle);
    assert_eq!(nav.cancelled, vec![PathRequestId(1)]);
    assert!(!state.cancel_request(&mut nav));

    state.set_path(path());
    assert!(!state.cancel_request(&mut nav));
    assert_eq!(state.decision(), PathDecision::PathFound);
}
