//! Goal ops: the work an instruction does each tick.
//!
//! Built-in kinds form the closed [`GoalOp`] enum. Game-specific kinds plug in
//! through [`CustomGoal`].

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use ai_core::{AiConfig, DeterministicRng, GoalStatus, SplitMix64, TickContext, Vec3};
use ai_cover::{AsyncState, CoverUsagePoll, CoverWorldMut};
use ai_nav::{
    NavContext, NavWorldMut, NavWorldView, PathDecision, PathRequest, TraceOp, TraceParams,
    TracePhase,
};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{AgentState, PipeWorld};

/// What a goal op may touch during one tick.
pub struct GoalContext<'a, W: PipeWorld> {
    pub tick: &'a TickContext,
    pub config: &'a AiConfig,
    pub agent: W::Agent,
    pub world: &'a mut W,
    pub state: &'a mut AgentState,
    pub rng: &'a mut SplitMix64,
}

impl<W: PipeWorld> GoalContext<'_, W> {
    pub fn nav(&mut self) -> NavContext<'_, W> {
        NavContext {
            tick: self.tick,
            config: &self.config.nav,
            agent: self.agent,
            world: &mut *self.world,
            path: &mut self.state.path,
            events: &mut self.state.nav_events,
        }
    }

    pub fn reset_context(&mut self) -> ResetContext<'_, W> {
        ResetContext {
            agent: self.agent,
            world: &mut *self.world,
            state: &mut *self.state,
        }
    }
}

/// What a goal op may touch while being reset.
pub struct ResetContext<'a, W: PipeWorld> {
    pub agent: W::Agent,
    pub world: &'a mut W,
    pub state: &'a mut AgentState,
}

/// Extension point for goal kinds the runtime does not ship.
pub trait CustomGoal<W: PipeWorld> {
    fn name(&self) -> &str;

    fn execute(&mut self, cx: &mut GoalContext<'_, W>) -> GoalStatus;

    fn execute_dry(&mut self, _cx: &mut GoalContext<'_, W>) {}

    /// Must be idempotent.
    fn reset(&mut self, _cx: &mut ResetContext<'_, W>) {}

    fn snapshot(&self) -> GoalOpSnapshot {
        GoalOpSnapshot::Custom {
            name: self.name().to_string(),
        }
    }
}

pub type CustomGoalFactory<W> = Rc<dyn Fn() -> Box<dyn CustomGoal<W>>>;

/// Serializable view of a goal op's progress.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GoalOpSnapshot {
    Timeout { remaining: Option<f32> },
    Signal { name: String, sent: bool },
    PathFind { requested: bool },
    Trace { phase: TracePhase, travelled: f32 },
    CoverUsage { started: bool },
    SetCompromised,
    Custom { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutOp {
    pub min_seconds: f32,
    pub max_seconds: f32,
    remaining: Option<f32>,
}

impl TimeoutOp {
    pub fn new(min_seconds: f32, max_seconds: f32) -> Self {
        Self {
            min_seconds,
            max_seconds,
            remaining: None,
        }
    }

    fn execute<W: PipeWorld>(&mut self, cx: &mut GoalContext<'_, W>) -> GoalStatus {
        let remaining = match self.remaining {
            None => cx.rng.next_f32_range(self.min_seconds, self.max_seconds),
            Some(left) => left - cx.tick.dt_seconds,
        };
        self.remaining = Some(remaining);
        if remaining <= 0.0 {
            GoalStatus::Done
        } else {
            GoalStatus::InProgress
        }
    }
}

/// Emits its signal on the first tick, finishes on the next.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalOp {
    pub name: Cow<'static, str>,
    pub data: f32,
    sent: bool,
}

impl SignalOp {
    pub fn new(name: impl Into<Cow<'static, str>>, data: f32) -> Self {
        Self {
            name: name.into(),
            data,
            sent: false,
        }
    }

    fn execute<W: PipeWorld>(&mut self, cx: &mut GoalContext<'_, W>) -> GoalStatus {
        if self.sent {
            return GoalStatus::Done;
        }
        cx.state.send_signal(self.name.clone(), self.data);
        self.sent = true;
        GoalStatus::InProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathTarget {
    AttentionTarget,
    LastOp,
    Position(Vec3),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathFindOp {
    pub target: PathTarget,
    /// Accept a path that ends anywhere short of the target.
    pub partial: bool,
    pub end_distance: f32,
    requested: bool,
}

impl PathFindOp {
    pub fn new(target: PathTarget) -> Self {
        Self {
            target,
            partial: false,
            end_distance: 0.0,
            requested: false,
        }
    }

    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn with_end_distance(mut self, end_distance: f32) -> Self {
        self.end_distance = end_distance;
        self
    }

    fn execute<W: PipeWorld>(&mut self, cx: &mut GoalContext<'_, W>) -> GoalStatus {
        if self.requested {
            return match cx.state.path.decision() {
                PathDecision::StillFinding => GoalStatus::InProgress,
                PathDecision::PathFound => GoalStatus::Succeeded,
                PathDecision::NoPath | PathDecision::Idle => GoalStatus::Failed,
            };
        }

        let end = match self.target {
            PathTarget::AttentionTarget => cx.state.attention_position(&*cx.world),
            PathTarget::LastOp => cx.state.last_op_position(&*cx.world),
            PathTarget::Position(pos) => Some(pos),
        };
        let (Some(start), Some(end)) = (cx.world.position(cx.agent), end) else {
            debug!(path_target = ?self.target, "path target unavailable");
            return GoalStatus::Failed;
        };

        let mut request = PathRequest::new(start, end).with_end_distance(self.end_distance);
        if self.partial {
            request = request.partial();
        }
        cx.state.path.request_path(cx.world.navigation(), request);
        self.requested = true;
        GoalStatus::InProgress
    }

    fn reset<W: PipeWorld>(&mut self, cx: &mut ResetContext<'_, W>) {
        if self.requested {
            cx.state.path.cancel_request(cx.world.navigation());
            self.requested = false;
        }
    }
}

/// Polls the cover usage query until it completes. Succeeds when any probe
/// position still hides the agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverUsageOp {
    started: bool,
}

impl CoverUsageOp {
    fn execute<W: PipeWorld>(&mut self, cx: &mut GoalContext<'_, W>) -> GoalStatus {
        self.started = true;
        let target = cx.state.attention_position(&*cx.world);
        let surface = cx
            .state
            .cover
            .cover_id()
            .and_then(|id| cx.world.cover_surface(id));
        let pass_radius = cx.state.path.follower().params().pass_radius;
        let state = &mut *cx.state;
        let poll = state.cover.cover_usage_info(
            target,
            surface.as_ref(),
            pass_radius,
            cx.world.rays(),
            &state.ray_reply,
            cx.tick.time_seconds,
            &cx.config.cover,
        );
        match poll {
            CoverUsagePoll::InProgress => GoalStatus::InProgress,
            CoverUsagePoll::Complete(info) => {
                state.last_cover_usage = Some(info);
                if info.any_usable() {
                    GoalStatus::Succeeded
                } else {
                    GoalStatus::Failed
                }
            }
        }
    }

    fn reset<W: PipeWorld>(&mut self, cx: &mut ResetContext<'_, W>) {
        if self.started && cx.state.cover.usage_state() != AsyncState::Ready {
            cx.state.cover.cancel_queries(cx.world.rays());
        }
        self.started = false;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GoalOp {
    Timeout(TimeoutOp),
    Signal(SignalOp),
    PathFind(PathFindOp),
    Trace(TraceOp),
    CoverUsage(CoverUsageOp),
    /// Blacklist and leave the current cover.
    SetCompromised,
}

impl GoalOp {
    pub fn timeout(min_seconds: f32, max_seconds: f32) -> Self {
        GoalOp::Timeout(TimeoutOp::new(min_seconds, max_seconds))
    }

    pub fn signal(name: impl Into<Cow<'static, str>>, data: f32) -> Self {
        GoalOp::Signal(SignalOp::new(name, data))
    }

    pub fn path_find(target: PathTarget) -> Self {
        GoalOp::PathFind(PathFindOp::new(target))
    }

    pub fn trace(params: TraceParams) -> Self {
        GoalOp::Trace(TraceOp::new(params))
    }

    pub fn cover_usage() -> Self {
        GoalOp::CoverUsage(CoverUsageOp::default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            GoalOp::Timeout(_) => "timeout",
            GoalOp::Signal(_) => "signal",
            GoalOp::PathFind(_) => "pathfind",
            GoalOp::Trace(_) => "trace",
            GoalOp::CoverUsage(_) => "cover_usage",
            GoalOp::SetCompromised => "set_compromised",
        }
    }

    pub fn execute<W: PipeWorld>(&mut self, cx: &mut GoalContext<'_, W>) -> GoalStatus {
        match self {
            GoalOp::Timeout(op) => op.execute(cx),
            GoalOp::Signal(op) => op.execute(cx),
            GoalOp::PathFind(op) => op.execute(cx),
            GoalOp::Trace(op) => op.execute(&mut cx.nav()),
            GoalOp::CoverUsage(op) => op.execute(cx),
            GoalOp::SetCompromised => {
                cx.state.cover.set_compromised(&cx.config.cover);
                GoalStatus::Done
            }
        }
    }

    /// Cheap update between full ticks. Only tracing does anything.
    pub fn execute_dry<W: PipeWorld>(&mut self, cx: &mut GoalContext<'_, W>) {
        if let GoalOp::Trace(op) = self {
            op.execute_dry(&mut cx.nav());
        }
    }

    pub fn reset<W: PipeWorld>(&mut self, cx: &mut ResetContext<'_, W>) {
        match self {
            GoalOp::Timeout(op) => op.remaining = None,
            GoalOp::Signal(op) => op.sent = false,
            GoalOp::PathFind(op) => op.reset(cx),
            GoalOp::Trace(op) => op.reset(&mut cx.state.path),
            GoalOp::CoverUsage(op) => op.reset(cx),
            GoalOp::SetCompromised => {}
        }
    }

    pub fn snapshot(&self) -> GoalOpSnapshot {
        match self {
            GoalOp::Timeout(op) => GoalOpSnapshot::Timeout {
                remaining: op.remaining,
            },
            GoalOp::Signal(op) => GoalOpSnapshot::Signal {
                name: op.name.to_string(),
                sent: op.sent,
            },
            GoalOp::PathFind(op) => GoalOpSnapshot::PathFind {
                requested: op.requested,
            },
            GoalOp::Trace(op) => GoalOpSnapshot::Trace {
                phase: op.phase(),
                travelled: op.travelled(),
            },
            GoalOp::CoverUsage(op) => GoalOpSnapshot::CoverUsage {
                started: op.started,
            },
            GoalOp::SetCompromised => GoalOpSnapshot::SetCompromised,
        }
    }
}

impl From<TraceOp> for GoalOp {
    fn from(op: TraceOp) -> Self {
        GoalOp::Trace(op)
    }
}

/// A live goal inside a running pipe.
pub enum GoalInstance<W: PipeWorld> {
    Op(GoalOp),
    Custom(Box<dyn CustomGoal<W>>),
}

impl<W: PipeWorld> fmt::Debug for GoalInstance<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalInstance::Op(op) => f.debug_tuple("Op").field(op).finish(),
            GoalInstance::Custom(goal) => f.debug_tuple("Custom").field(&goal.name()).finish(),
        }
    }
}

impl<W: PipeWorld> GoalInstance<W> {
    pub fn name(&self) -> &str {
        match self {
            GoalInstance::Op(op) => op.name(),
            GoalInstance::Custom(goal) => goal.name(),
        }
    }

    pub fn execute(&mut self, cx: &mut GoalContext<'_, W>) -> GoalStatus {
        match self {
            GoalInstance::Op(op) => op.execute(cx),
            GoalInstance::Custom(goal) => goal.execute(cx),
        }
    }

    pub fn execute_dry(&mut self, cx: &mut GoalContext<'_, W>) {
        match self {
            GoalInstance::Op(op) => op.execute_dry(cx),
            GoalInstance::Custom(goal) => goal.execute_dry(cx),
        }
    }

    pub fn reset(&mut self, cx: &mut ResetContext<'_, W>) {
        match self {
            GoalInstance::Op(op) => op.reset(cx),
            GoalInstance::Custom(goal) => goal.reset(cx),
        }
    }

    pub fn snapshot(&self) -> GoalOpSnapshot {
        match self {
            GoalInstance::Op(op) => op.snapshot(),
            GoalInstance::Custom(goal) => goal.snapshot(),
        }
    }
}

/// Template form of a goal; instantiated once per pipe selection.
pub enum GoalSpec<W: PipeWorld> {
    Op(GoalOp),
    Custom(CustomGoalFactory<W>),
}

impl<W: PipeWorld> GoalSpec<W> {
    pub fn custom<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn CustomGoal<W>> + 'static,
    {
        GoalSpec::Custom(Rc::new(factory))
    }

    pub fn instantiate(&self) -> GoalInstance<W> {
        match self {
            GoalSpec::Op(op) => GoalInstance::Op(op.clone()),
            GoalSpec::Custom(factory) => GoalInstance::Custom(factory()),
        }
    }
}

impl<W: PipeWorld> Clone for GoalSpec<W> {
    fn clone(&self) -> Self {
        match self {
            GoalSpec::Op(op) => GoalSpec::Op(op.clone()),
            GoalSpec::Custom(factory) => GoalSpec::Custom(Rc::clone(factory)),
        }
    }
}

impl<W: PipeWorld> fmt::Debug for GoalSpec<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalSpec::Op(op) => f.debug_tuple("Op").field(op).finish(),
            GoalSpec::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<W: PipeWorld> From<GoalOp> for GoalSpec<W> {
    fn from(op: GoalOp) -> Self {
        GoalSpec::Op(op)
    }
}
