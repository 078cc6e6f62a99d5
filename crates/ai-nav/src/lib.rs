//! Path requests, path following, stuck detection and the trace state machine.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod follower;
pub mod navigator;
pub mod path_state;
pub mod stuck;
pub mod trace;
pub mod world;

pub use follower::{
    PathFollowResult, PathFollower, PathFollowerParams, PredictedState, PredictionRequest,
    StraightPathFollower,
};
pub use navigator::{
    NavPath, NavigationService, PathDecision, PathPoll, PathRequest, PathRequestId,
};
pub use path_state::{ActorTarget, ActorTargetPhase, MovementRequest, PathState};
pub use stuck::{Progress, StuckDetector};
pub use trace::{
    ManeuverDir, NavContext, NavEvent, TraceDimension, TraceOp, TraceParams, TracePhase,
};
pub use world::{BodyInfo, NavWorldMut, NavWorldView, Stance};
