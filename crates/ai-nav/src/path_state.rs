use ai_core::Vec3;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    NavPath, NavigationService, PathDecision, PathFollower, PathPoll, PathRequest, PathRequestId,
    PredictedState, StraightPathFollower,
};

/// Movement intent consumed by the locomotion layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MovementRequest {
    /// Negative speeds move backwards along `move_dir`.
    pub desired_speed: f32,
    pub move_dir: Vec3,
    pub move_target: Option<Vec3>,
    pub body_target_dir: Option<Vec3>,
    pub distance_to_path_end: f32,
    pub predicted: Vec<PredictedState>,
}

impl MovementRequest {
    pub fn is_stopped(&self) -> bool {
        self.desired_speed == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ActorTargetPhase {
    /// Requested by game logic; waiting for the trace to get close enough.
    Pending,
    /// The trace handed control to the animation layer.
    Triggered,
    Playing,
    Finished,
    Error,
}

/// Exact-positioning request, e.g. aligning to a linked action at the end of
/// a path.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActorTarget {
    pub position: Vec3,
    pub direction: Vec3,
    pub phase: ActorTargetPhase,
}

/// Per-agent navigation state: current path, pending request, follower and
/// the movement intent produced from them.
pub struct PathState {
    decision: PathDecision,
    path: Option<NavPath>,
    pending: Option<PathRequestId>,
    last_request: Option<PathRequest>,
    inhibit_regeneration: bool,
    follower: Box<dyn PathFollower>,
    actor_target: Option<ActorTarget>,
    pub movement: MovementRequest,
    /// Height above ground the agent is currently steered to while landing.
    pub landing_offset: f32,
}

impl core::fmt::Debug for PathState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PathState")
            .field("decision", &self.decision)
            .field("path", &self.path)
            .field("pending", &self.pending)
            .field("actor_target", &self.actor_target)
            .field("movement", &self.movement)
            .finish_non_exhaustive()
    }
}

impl Default for PathState {
    fn default() -> Self {
        Self::new(Box::new(StraightPathFollower::default()))
    }
}

impl PathState {
    pub fn new(follower: Box<dyn PathFollower>) -> Self {
        Self {
            decision: PathDecision::Idle,
            path: None,
            pending: None,
            last_request: None,
            inhibit_regeneration: false,
            follower,
            actor_target: None,
            movement: MovementRequest::default(),
            landing_offset: 0.0,
        }
    }

    pub fn decision(&self) -> PathDecision {
        self.decision
    }

    pub fn path(&self) -> Option<&NavPath> {
        self.path.as_ref()
    }

    pub fn pending_request(&self) -> Option<PathRequestId> {
        self.pending
    }

    /// Length of the current path, zero without one.
    pub fn path_length(&self) -> f32 {
        self.path.as_ref().map_or(0.0, NavPath::length)
    }

    pub fn follower(&self) -> &dyn PathFollower {
        self.follower.as_ref()
    }

    pub fn follower_mut(&mut self) -> &mut dyn PathFollower {
        self.follower.as_mut()
    }

    /// Replace any pending request with a new one.
    pub fn request_path(&mut self, nav: &mut dyn NavigationService, request: PathRequest) {
        if let Some(id) = self.pending.take() {
            nav.cancel_path(id);
        }
        let id = nav.request_path(request.clone());
        debug!(request = id.0, "path requested");
        self.pending = Some(id);
        self.last_request = Some(request);
        self.decision = PathDecision::StillFinding;
        self.inhibit_regeneration = false;
        self.path = None;
        self.follower.reset();
    }

    /// Cancel the pending request, keeping any path already found.
    pub fn cancel_request(&mut self, nav: &mut dyn NavigationService) -> bool {
        let Some(id) = self.pending.take() else {
            return false;
        };
        nav.cancel_path(id);
        if self.decision == PathDecision::StillFinding {
            self.decision = PathDecision::Idle;
        }
        true
    }

    /// Pick up the result of the pending request, if it resolved.
    pub fn poll(&mut self, nav: &mut dyn NavigationService) {
        let Some(id) = self.pending else {
            return;
        };
        match nav.poll_path(id) {
            PathPoll::StillFinding => {}
            PathPoll::Found(path) => {
                self.pending = None;
                self.set_path(path);
            }
            PathPoll::NoPath => {
                self.pending = None;
                self.path = None;
                self.follower.reset();
                self.decision = PathDecision::NoPath;
            }
        }
    }

    /// Install a path directly, bypassing the navigation service.
    pub fn set_path(&mut self, path: NavPath) {
        self.follower.attach(&path);
        self.path = Some(path);
        self.decision = PathDecision::PathFound;
    }

    /// Re-issue the last request from `from`. Returns whether a request was
    /// sent.
    pub fn request_regeneration(&mut self, nav: &mut dyn NavigationService, from: Vec3) -> bool {
        if self.inhibit_regeneration || self.pending.is_some() {
            return false;
        }
        let Some(mut request) = self.last_request.clone() else {
            return false;
        };
        request.start = from;
        self.request_path(nav, request);
        true
    }

    pub fn inhibit_regeneration(&mut self) {
        self.inhibit_regeneration = true;
    }

    pub fn stop(&mut self) {
        self.movement.desired_speed = 0.0;
        self.movement.move_dir = Vec3::ZERO;
        self.movement.move_target = None;
        self.movement.predicted.clear();
    }

    pub fn actor_target(&self) -> Option<ActorTarget> {
        self.actor_target
    }

    pub fn set_actor_target(&mut self, target: Option<ActorTarget>) {
        self.actor_target = target;
    }

    pub fn set_actor_target_phase(&mut self, phase: ActorTargetPhase) {
        if let Some(target) = self.actor_target.as_mut() {
            target.phase = phase;
        }
    }

    /// Cancel any request and forget the path.
    pub fn clear(&mut self, nav: &mut dyn NavigationService) {
        if let Some(id) = self.pending.take() {
            nav.cancel_path(id);
        }
        self.path = None;
        self.last_request = None;
        self.decision = PathDecision::Idle;
        self.follower.reset();
        self.actor_target = None;
        self.landing_offset = 0.0;
        self.movement = MovementRequest::default();
    }
}
