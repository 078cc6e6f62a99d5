//! Path-follow goal: preamble, 2D/3D tracing, maneuvers, landing and the
//! exact-positioning postamble.

use ai_core::{GoalStatus, NavConfig, TickContext, Vec3};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    ActorTargetPhase, NavPath, NavWorldMut, PathDecision, PathFollowResult, PathState,
    PredictionRequest, Progress, Stance, StuckDetector,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TraceDimension {
    /// Ground movement; maneuvers allowed.
    #[default]
    TwoD,
    /// Flying/swimming movement; landing allowed.
    ThreeD,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ManeuverDir {
    Back,
    Forward,
}

impl ManeuverDir {
    fn flipped(self) -> Self {
        match self {
            ManeuverDir::Back => ManeuverDir::Forward,
            ManeuverDir::Forward => ManeuverDir::Back,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TracePhase {
    #[default]
    NotStarted,
    PreambleAlignment,
    Tracing(TraceDimension),
    Maneuvering(ManeuverDir),
    Landing,
    ExactPositioning,
    /// Path end reached; waiting for the agent to stop.
    Postamble,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceParams {
    pub dimension: TraceDimension,
    /// Turn the body towards the path before moving.
    pub align_before_move: bool,
    pub allow_maneuver: bool,
    /// Cruise height carried until the path end; `0` disables landing.
    pub land_height: f32,
    pub stance: Option<Stance>,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            dimension: TraceDimension::TwoD,
            align_before_move: false,
            allow_maneuver: true,
            land_height: 0.0,
            stance: None,
        }
    }
}

/// Side-channel notifications; none of them fail the trace.
#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    Stuck { distance_to_end: f32 },
    RegenerationRequested,
    ManeuverStarted(ManeuverDir),
    ManeuverEnded,
    ExactPositioningStarted,
    Landed,
}

/// Everything a trace needs for one tick.
pub struct NavContext<'a, W: NavWorldMut> {
    pub tick: &'a TickContext,
    pub config: &'a NavConfig,
    pub agent: W::Agent,
    pub world: &'a mut W,
    pub path: &'a mut PathState,
    pub events: &'a mut Vec<NavEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Maneuver {
    dir: ManeuverDir,
    elapsed: f32,
    leg_start: Vec3,
    leg_distance: f32,
    travelled: f32,
    last_pos: Vec3,
}

impl Maneuver {
    fn start(pos: Vec3, leg_distance: f32) -> Self {
        Self {
            dir: ManeuverDir::Back,
            elapsed: 0.0,
            leg_start: pos,
            leg_distance,
            travelled: 0.0,
            last_pos: pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceOp {
    params: TraceParams,
    phase: TracePhase,
    maneuver: Option<Maneuver>,
    alignment_elapsed: f32,
    failure_seconds: f32,
    stuck: Option<StuckDetector>,
    start_pos: Option<Vec3>,
    last_pos: Option<Vec3>,
    travelled: f32,
    last_move_dir: Vec3,
    finish_on_full_update: bool,
}

impl TraceOp {
    pub fn new(params: TraceParams) -> Self {
        Self {
            params,
            phase: TracePhase::NotStarted,
            maneuver: None,
            alignment_elapsed: 0.0,
            failure_seconds: 0.0,
            stuck: None,
            start_pos: None,
            last_pos: None,
            travelled: 0.0,
            last_move_dir: Vec3::ZERO,
            finish_on_full_update: false,
        }
    }

    pub fn params(&self) -> &TraceParams {
        &self.params
    }

    pub fn phase(&self) -> TracePhase {
        self.phase
    }

    pub fn start_position(&self) -> Option<Vec3> {
        self.start_pos
    }

    /// Distance travelled since the trace started.
    pub fn travelled(&self) -> f32 {
        self.travelled
    }

    pub fn execute<W: NavWorldMut>(&mut self, cx: &mut NavContext<'_, W>) -> GoalStatus {
        if self.finish_on_full_update {
            self.finish_on_full_update = false;
            return self.finish(cx.path, GoalStatus::Succeeded);
        }
        match self.phase {
            TracePhase::Succeeded => return GoalStatus::Succeeded,
            TracePhase::Failed => return GoalStatus::Failed,
            _ => {}
        }

        if cx.world.is_vehicle_driver_fallen(cx.agent) {
            debug!(agent = ?cx.agent, "vehicle driver fell; trace aborted");
            return self.finish(cx.path, GoalStatus::Failed);
        }

        match cx.path.decision() {
            PathDecision::NoPath => return self.finish(cx.path, GoalStatus::Failed),
            PathDecision::StillFinding => {
                cx.path.stop();
                return GoalStatus::InProgress;
            }
            PathDecision::Idle | PathDecision::PathFound => {}
        }

        let Some(pos) = cx.world.position(cx.agent) else {
            return self.finish(cx.path, GoalStatus::Failed);
        };

        if self.phase == TracePhase::NotStarted {
            if let Some(status) = self.preamble(cx, pos) {
                return status;
            }
        }
        if let Some(last) = self.last_pos.replace(pos) {
            self.travelled += last.distance(pos);
        }

        match self.phase {
            TracePhase::PreambleAlignment => {
                if let Some(status) = self.align(cx, pos) {
                    return status;
                }
            }
            TracePhase::ExactPositioning => return self.exact_positioning(cx),
            _ => {}
        }

        let prediction = cx.config.predictive_following.then_some(PredictionRequest {
            horizon_seconds: cx.config.prediction_horizon_seconds,
            step_seconds: cx.config.prediction_step_seconds,
        });
        let Some(result) = cx
            .path
            .follower_mut()
            .advance(pos, cx.tick.dt_seconds, prediction)
        else {
            return self.on_follow_failure(cx, pos);
        };
        self.failure_seconds = 0.0;

        let stuck = self
            .stuck
            .get_or_insert_with(|| StuckDetector::from_config(cx.config));
        if stuck.update(result.distance_to_end, cx.tick.time_seconds) == Progress::Stuck {
            debug!(agent = ?cx.agent, distance_to_end = result.distance_to_end, "no progress along path");
            cx.events.push(NavEvent::Stuck {
                distance_to_end: result.distance_to_end,
            });
        }

        if self.try_start_exact_positioning(cx, result.distance_to_end) {
            return GoalStatus::InProgress;
        }

        if self.phase == TracePhase::Postamble {
            return self.postamble(cx);
        }

        if self.params.dimension == TraceDimension::ThreeD && self.params.land_height > 0.0 {
            if let Some(status) = self.land(cx, &result) {
                return status;
            }
        }

        if self.params.dimension == TraceDimension::TwoD && self.params.allow_maneuver {
            if let Some(status) = self.maneuver(cx, pos, &result) {
                return status;
            }
        }

        if result.reached_end {
            return self.postamble(cx);
        }

        self.phase = TracePhase::Tracing(self.params.dimension);
        self.steer(cx.path, result);
        GoalStatus::InProgress
    }

    /// Cheap in-between update: keep steering, never change phase except to
    /// flag completion for the next full update.
    pub fn execute_dry<W: NavWorldMut>(&mut self, cx: &mut NavContext<'_, W>) {
        if !matches!(self.phase, TracePhase::Tracing(_) | TracePhase::Landing) {
            return;
        }
        let Some(pos) = cx.world.position(cx.agent) else {
            return;
        };
        let Some(result) = cx.path.follower_mut().advance(pos, cx.tick.dt_seconds, None) else {
            cx.path.stop();
            return;
        };
        if result.reached_end {
            cx.path.stop();
            if self.phase != TracePhase::Landing && cx.path.actor_target().is_none() {
                self.finish_on_full_update = true;
            }
            return;
        }
        self.steer(cx.path, result);
    }

    pub fn reset(&mut self, path: &mut PathState) {
        if self.phase != TracePhase::NotStarted {
            path.stop();
            path.movement.body_target_dir = None;
            if let Some(target) = path.actor_target() {
                if matches!(
                    target.phase,
                    ActorTargetPhase::Triggered | ActorTargetPhase::Playing
                ) {
                    path.set_actor_target(None);
                }
            }
        }
        *self = Self::new(self.params.clone());
    }

    fn preamble<W: NavWorldMut>(
        &mut self,
        cx: &mut NavContext<'_, W>,
        pos: Vec3,
    ) -> Option<GoalStatus> {
        self.start_pos = Some(pos);
        if cx.path.path().map_or(true, NavPath::is_empty) {
            cx.path.inhibit_regeneration();
            return Some(self.finish(cx.path, GoalStatus::Succeeded));
        }
        self.stuck = Some(StuckDetector::from_config(cx.config));
        self.phase = if self.params.align_before_move {
            TracePhase::PreambleAlignment
        } else {
            TracePhase::Tracing(self.params.dimension)
        };
        None
    }

    fn align<W: NavWorldMut>(&mut self, cx: &mut NavContext<'_, W>, pos: Vec3) -> Option<GoalStatus> {
        let pass_radius = cx.path.follower().params().pass_radius;
        let dir = cx
            .path
            .path()
            .and_then(|p| p.points.iter().find(|pt| pt.distance_2d(pos) > pass_radius))
            .map(|pt| (*pt - pos).flat().normalize_or_zero())
            .unwrap_or(Vec3::ZERO);

        let aligned = dir.is_near_zero(1e-3)
            || cx
                .world
                .query_body_info(cx.agent, self.params.stance)
                .map_or(true, |body| {
                    body.body_dir.flat().normalize_or_zero().dot(dir) >= cx.config.alignment_cos
                });

        self.alignment_elapsed += cx.tick.dt_seconds;
        if aligned || self.alignment_elapsed >= cx.config.alignment_timeout_seconds {
            cx.path.movement.body_target_dir = None;
            self.phase = TracePhase::Tracing(self.params.dimension);
            return None;
        }

        cx.path.stop();
        cx.path.movement.body_target_dir = Some(dir);
        Some(GoalStatus::InProgress)
    }

    fn on_follow_failure<W: NavWorldMut>(&mut self, cx: &mut NavContext<'_, W>, pos: Vec3) -> GoalStatus {
        self.failure_seconds += cx.tick.dt_seconds;
        cx.path.stop();
        if self.failure_seconds > cx.config.regenerate_after_seconds {
            self.failure_seconds = 0.0;
            if cx.path.request_regeneration(cx.world.navigation(), pos) {
                debug!(agent = ?cx.agent, "path follower lost the path; regenerating");
                cx.events.push(NavEvent::RegenerationRequested);
            }
        }
        GoalStatus::InProgress
    }

    fn try_start_exact_positioning<W: NavWorldMut>(
        &mut self,
        cx: &mut NavContext<'_, W>,
        distance_to_end: f32,
    ) -> bool {
        let Some(target) = cx.path.actor_target() else {
            return false;
        };
        if target.phase != ActorTargetPhase::Pending
            || distance_to_end > cx.config.exact_positioning_distance
        {
            return false;
        }

        cx.path.set_actor_target_phase(ActorTargetPhase::Triggered);
        cx.path.stop();
        cx.path.movement.move_target = Some(target.position);
        cx.path.movement.body_target_dir = Some(target.direction);
        self.maneuver = None;
        self.phase = TracePhase::ExactPositioning;
        debug!(agent = ?cx.agent, distance_to_end, "exact positioning started");
        cx.events.push(NavEvent::ExactPositioningStarted);
        true
    }

    fn exact_positioning<W: NavWorldMut>(&mut self, cx: &mut NavContext<'_, W>) -> GoalStatus {
        match cx.path.actor_target().map(|t| t.phase) {
            None | Some(ActorTargetPhase::Finished) => {
                cx.path.set_actor_target(None);
                self.finish(cx.path, GoalStatus::Succeeded)
            }
            Some(ActorTargetPhase::Error) => {
                cx.path.set_actor_target(None);
                self.finish(cx.path, GoalStatus::Failed)
            }
            Some(_) => GoalStatus::InProgress,
        }
    }

    fn land<W: NavWorldMut>(
        &mut self,
        cx: &mut NavContext<'_, W>,
        result: &PathFollowResult,
    ) -> Option<GoalStatus> {
        let land_height = self.params.land_height;
        let ramp_distance = 2.0 * land_height;

        if self.phase != TracePhase::Landing {
            if result.distance_to_end >= ramp_distance {
                cx.path.landing_offset = land_height;
                return None;
            }
            debug!(agent = ?cx.agent, distance_to_end = result.distance_to_end, "landing");
            self.phase = TracePhase::Landing;
        }

        let ramp = (result.distance_to_end / ramp_distance).clamp(0.0, 1.0);
        cx.path.landing_offset = land_height * ramp;

        if result.reached_end {
            if cx.world.is_grounded(cx.agent) {
                cx.path.landing_offset = 0.0;
                cx.events.push(NavEvent::Landed);
                return Some(self.finish(cx.path, GoalStatus::Succeeded));
            }
            let descend_speed = cx.path.follower().params().min_speed;
            cx.path.movement.desired_speed = descend_speed;
            cx.path.movement.move_dir = -Vec3::UNIT_Z;
            cx.path.movement.move_target = Some(result.next_target);
            cx.path.movement.distance_to_path_end = result.distance_to_end;
            return Some(GoalStatus::InProgress);
        }

        let offset = cx.path.landing_offset;
        self.steer(cx.path, result.clone());
        cx.path.movement.move_target = Some(result.next_target + Vec3::UNIT_Z * offset);
        Some(GoalStatus::InProgress)
    }

    fn maneuver<W: NavWorldMut>(
        &mut self,
        cx: &mut NavContext<'_, W>,
        pos: Vec3,
        result: &PathFollowResult,
    ) -> Option<GoalStatus> {
        let path_dir = (result.next_target - pos).flat().normalize_or_zero();
        if path_dir.is_near_zero(1e-3) || result.reached_end {
            return self.end_maneuver(cx);
        }
        let facing = cx
            .world
            .query_body_info(cx.agent, self.params.stance)
            .map(|b| b.body_dir.flat().normalize_or_zero())
            .filter(|d| !d.is_near_zero(1e-3))?;
        let cos = facing.dot(path_dir);
        let config = cx.config;

        match self.maneuver.as_mut() {
            None => {
                if cos >= config.maneuver_trigger_cos {
                    return None;
                }
                self.maneuver = Some(Maneuver::start(pos, config.maneuver_back_distance));
                self.phase = TracePhase::Maneuvering(ManeuverDir::Back);
                debug!(agent = ?cx.agent, cos, "maneuver started");
                cx.events.push(NavEvent::ManeuverStarted(ManeuverDir::Back));
            }
            Some(m) => {
                m.elapsed += cx.tick.dt_seconds;
                m.travelled += pos.distance_2d(m.last_pos);
                m.last_pos = pos;

                let realigned = m.elapsed >= config.maneuver_min_seconds && cos > config.maneuver_exit_cos;
                if realigned
                    || m.elapsed >= config.maneuver_max_seconds
                    || m.travelled >= config.maneuver_max_distance
                {
                    return self.end_maneuver(cx);
                }

                if m.elapsed >= config.maneuver_min_seconds
                    && pos.distance_2d(m.leg_start) >= m.leg_distance
                {
                    m.dir = m.dir.flipped();
                    m.leg_start = pos;
                    self.phase = TracePhase::Maneuvering(m.dir);
                }
            }
        }

        let forward_speed = cx.path.follower().params().normal_speed * 0.5;
        let (speed, dir) = match self.maneuver.map_or(ManeuverDir::Back, |m| m.dir) {
            ManeuverDir::Back => (-config.maneuver_back_speed, facing),
            ManeuverDir::Forward => (forward_speed, path_dir),
        };
        let movement = &mut cx.path.movement;
        movement.desired_speed = speed;
        movement.move_dir = dir;
        movement.body_target_dir = Some(path_dir);
        movement.move_target = Some(result.next_target);
        movement.distance_to_path_end = result.distance_to_end;
        movement.predicted.clear();
        Some(GoalStatus::InProgress)
    }

    fn end_maneuver<W: NavWorldMut>(&mut self, cx: &mut NavContext<'_, W>) -> Option<GoalStatus> {
        if self.maneuver.take().is_some() {
            debug!(agent = ?cx.agent, "maneuver finished");
            cx.events.push(NavEvent::ManeuverEnded);
            cx.path.movement.body_target_dir = None;
            self.phase = TracePhase::Tracing(self.params.dimension);
        }
        None
    }

    fn postamble<W: NavWorldMut>(&mut self, cx: &mut NavContext<'_, W>) -> GoalStatus {
        self.phase = TracePhase::Postamble;
        cx.path.stop();
        cx.path.movement.distance_to_path_end = 0.0;

        let velocity = cx.world.velocity(cx.agent);
        let speed_along = if self.last_move_dir.is_near_zero(1e-3) {
            velocity.length()
        } else {
            velocity.dot(self.last_move_dir)
        };
        if speed_along > cx.config.stopped_speed {
            return GoalStatus::InProgress;
        }
        self.finish(cx.path, GoalStatus::Succeeded)
    }

    fn steer(&mut self, path: &mut PathState, result: PathFollowResult) {
        let planar = self.params.dimension == TraceDimension::TwoD;
        let dir = if planar {
            result.velocity.flat().normalize_or_zero()
        } else {
            result.velocity.normalize_or_zero()
        };
        if !dir.is_near_zero(1e-3) {
            self.last_move_dir = dir;
        }

        let movement = &mut path.movement;
        movement.desired_speed = result.velocity.length();
        movement.move_dir = dir;
        movement.move_target = Some(result.next_target);
        movement.body_target_dir = None;
        movement.distance_to_path_end = result.distance_to_end;
        movement.predicted = result.predicted;
    }

    fn finish(&mut self, path: &mut PathState, status: GoalStatus) -> GoalStatus {
        self.phase = match status {
            GoalStatus::Failed => TracePhase::Failed,
            _ => TracePhase::Succeeded,
        };
        self.maneuver = None;
        path.stop();
        status
    }
}
