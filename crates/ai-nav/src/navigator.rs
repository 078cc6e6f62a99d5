use ai_core::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavPath {
    pub points: Vec<Vec3>,
    /// The path stops short of the requested destination.
    pub partial: bool,
}

impl NavPath {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self {
            points,
            partial: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn end(&self) -> Option<Vec3> {
        self.points.last().copied()
    }

    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// Issued by the navigation service for every accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathRequestId(pub u32);

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathRequest {
    pub start: Vec3,
    pub end: Vec3,
    /// How far from `end` the path may finish. Infinite for partial requests.
    pub end_tolerance: f32,
    /// Stop this far before `end`.
    pub end_distance: f32,
}

impl PathRequest {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self {
            start,
            end,
            end_tolerance: 0.0,
            end_distance: 0.0,
        }
    }

    /// Accept any end point the navigation service can reach.
    pub fn partial(mut self) -> Self {
        self.end_tolerance = f32::INFINITY;
        self
    }

    pub fn with_end_distance(mut self, end_distance: f32) -> Self {
        self.end_distance = end_distance.max(0.0);
        self
    }

    pub fn accepts_partial(&self) -> bool {
        self.end_tolerance.is_infinite()
    }
}

/// Agent-side view of the latest path request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathDecision {
    /// No request issued, or the last one was cancelled.
    #[default]
    Idle,
    StillFinding,
    PathFound,
    NoPath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathPoll {
    StillFinding,
    Found(NavPath),
    NoPath,
}

/// Asynchronous path planner.
///
/// Requests resolve over later ticks; the agent polls its pending request at
/// the start of every update.
pub trait NavigationService {
    fn request_path(&mut self, request: PathRequest) -> PathRequestId;

    /// Resolved results are handed out once; later polls of the same id may
    /// report `NoPath`.
    fn poll_path(&mut self, id: PathRequestId) -> PathPoll;

    fn cancel_path(&mut self, id: PathRequestId);
}
