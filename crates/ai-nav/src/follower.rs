use ai_core::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::NavPath;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathFollowerParams {
    pub normal_speed: f32,
    pub min_speed: f32,
    /// Waypoints closer than this count as passed.
    pub pass_radius: f32,
    pub end_accuracy: f32,
    /// Stop this far before the last point.
    pub end_distance: f32,
    /// Distance from the end over which speed ramps down.
    pub slow_down_distance: f32,
    pub stop_at_end: bool,
    /// Measure distances on the ground plane only.
    pub use_2d: bool,
}

impl Default for PathFollowerParams {
    fn default() -> Self {
        Self {
            normal_speed: 5.0,
            min_speed: 0.5,
            pass_radius: 0.5,
            end_accuracy: 0.2,
            end_distance: 0.0,
            slow_down_distance: 2.0,
            stop_at_end: true,
            use_2d: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredictedState {
    /// Seconds ahead of now.
    pub time: f32,
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRequest {
    pub horizon_seconds: f32,
    pub step_seconds: f32,
}

impl PredictionRequest {
    pub fn steps(&self) -> usize {
        if self.step_seconds <= 0.0 || self.horizon_seconds <= 0.0 {
            return 0;
        }
        (self.horizon_seconds / self.step_seconds).round() as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathFollowResult {
    pub next_target: Vec3,
    /// Desired velocity towards `next_target`.
    pub velocity: Vec3,
    pub distance_to_end: f32,
    pub reached_end: bool,
    pub predicted: Vec<PredictedState>,
}

/// Steering collaborator that turns a path into per-tick targets.
pub trait PathFollower {
    fn params(&self) -> &PathFollowerParams;

    fn set_params(&mut self, params: PathFollowerParams);

    fn attach(&mut self, path: &NavPath);

    fn reset(&mut self);

    /// `None` when no target can be produced from `position`.
    fn advance(
        &mut self,
        position: Vec3,
        dt_seconds: f32,
        prediction: Option<PredictionRequest>,
    ) -> Option<PathFollowResult>;

    fn distance_to_end(&self, position: Vec3) -> f32;
}

/// Follows a polyline point by point.
#[derive(Debug, Clone, Default)]
pub struct StraightPathFollower {
    params: PathFollowerParams,
    points: Vec<Vec3>,
    next: usize,
}

impl StraightPathFollower {
    pub fn new(params: PathFollowerParams) -> Self {
        Self {
            params,
            points: Vec::new(),
            next: 0,
        }
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    fn measure(&self, a: Vec3, b: Vec3) -> f32 {
        if self.params.use_2d {
            a.distance_2d(b)
        } else {
            a.distance(b)
        }
    }

    fn remaining_from(&self, position: Vec3, next: usize) -> f32 {
        let Some(first) = self.points.get(next) else {
            return 0.0;
        };
        let tail: f32 = self.points[next..]
            .windows(2)
            .map(|w| self.measure(w[0], w[1]))
            .sum();
        self.measure(position, *first) + tail
    }

    /// Within the pass radius of point `index`, or already beyond it along
    /// the following segment.
    fn passed(&self, position: Vec3, index: usize) -> bool {
        let p = self.points[index];
        if self.measure(position, p) <= self.params.pass_radius {
            return true;
        }
        let Some(&q) = self.points.get(index + 1) else {
            return false;
        };
        let (to_agent, segment) = if self.params.use_2d {
            ((position - p).flat(), (q - p).flat())
        } else {
            (position - p, q - p)
        };
        to_agent.dot(segment) > 0.0
    }

    fn speed_for(&self, distance_to_end: f32) -> f32 {
        let p = &self.params;
        if !p.stop_at_end || p.slow_down_distance <= 0.0 {
            return p.normal_speed;
        }
        let ramp = ((distance_to_end - p.end_distance) / p.slow_down_distance).clamp(0.0, 1.0);
        (p.normal_speed * ramp).max(p.min_speed.min(p.normal_speed))
    }

    fn direction(&self, from: Vec3, to: Vec3) -> Vec3 {
        let d = to - from;
        if self.params.use_2d {
            d.flat().normalize_or_zero()
        } else {
            d.normalize_or_zero()
        }
    }

    fn predict(&self, position: Vec3, request: PredictionRequest) -> Vec<PredictedState> {
        let mut out = Vec::with_capacity(request.steps());
        let mut pos = position;
        let mut next = self.next;
        for step in 1..=request.steps() {
            let remaining = self.remaining_from(pos, next);
            let speed = self.speed_for(remaining);
            let mut budget = speed * request.step_seconds;
            let mut velocity = Vec3::ZERO;
            while budget > 0.0 {
                let Some(&target) = self.points.get(next) else {
                    break;
                };
                let dist = self.measure(pos, target);
                velocity = self.direction(pos, target) * speed;
                if dist <= budget {
                    pos = target;
                    budget -= dist;
                    if next + 1 >= self.points.len() {
                        break;
                    }
                    next += 1;
                } else {
                    pos += self.direction(pos, target) * budget;
                    budget = 0.0;
                }
            }
            out.push(PredictedState {
                time: step as f32 * request.step_seconds,
                position: pos,
                velocity,
            });
        }
        out
    }
}

impl PathFollower for StraightPathFollower {
    fn params(&self) -> &PathFollowerParams {
        &self.params
    }

    fn set_params(&mut self, params: PathFollowerParams) {
        self.params = params;
    }

    fn attach(&mut self, path: &NavPath) {
        self.points = path.points.clone();
        self.next = 0;
    }

    fn reset(&mut self) {
        self.points.clear();
        self.next = 0;
    }

    fn advance(
        &mut self,
        position: Vec3,
        _dt_seconds: f32,
        prediction: Option<PredictionRequest>,
    ) -> Option<PathFollowResult> {
        let last = self.points.len().checked_sub(1)?;
        while self.next < last && self.passed(position, self.next) {
            self.next += 1;
        }

        let distance_to_end = self.remaining_from(position, self.next);
        let reached_end = self.next == last
            && distance_to_end <= self.params.end_distance + self.params.end_accuracy;
        let next_target = self.points[self.next];

        let velocity = if reached_end {
            Vec3::ZERO
        } else {
            self.direction(position, next_target) * self.speed_for(distance_to_end)
        };

        let predicted = match prediction {
            Some(request) if !reached_end => self.predict(position, request),
            _ => Vec::new(),
        };

        Some(PathFollowResult {
            next_target,
            velocity,
            distance_to_end,
            reached_end,
            predicted,
        })
    }

    fn distance_to_end(&self, position: Vec3) -> f32 {
        self.remaining_from(position, self.next)
    }
}
