//! Conditions for `Branch` instructions.
//!
//! Evaluation is a pure function of [`BranchEnv`], a snapshot of values the
//! agent already has cached. Nothing here issues a query.

use ai_core::{GoalOutcome, Vec3};
use ai_nav::{NavWorldView, PathDecision, Stance};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PipeError, Result};
use crate::{AgentState, PipeWorld};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BranchKind {
    Always,
    /// Taken with probability `p` in `[0, 1]`.
    Random(f32),
    NoPath,
    PathStillFinding,
    PathLonger(f32),
    PathShorter(f32),
    /// Path is more than `k` times the straight-line distance to its end.
    PathLongerRelative(f32),
    TargetDistLess(f32),
    TargetDistGreater(f32),
    TargetInRange,
    TargetOutOfRange,
    /// Target moved more than `d` since the pipe snapshot; refreshes the
    /// snapshot when taken.
    TargetMoved(f32),
    TargetMovedSinceStart(f32),
    NoTarget,
    NoLastOp,
    LastOpDistLess(f32),
    LastOpFailed,
    LastOpSucceeded,
    StanceIs(Stance),
    CoverCompromised,
    CoverNotCompromised,
    InCover,
    MovingToCover,
    ActiveGoals,
    ActiveGoalsOrNoCover,
    SeesTarget,
    /// Stand-in for a numeric code nobody recognises. Evaluates like
    /// [`BranchKind::ActiveGoals`].
    LegacyActiveGoals,
}

/// Numeric branch codes, by position.
const CODE_NAMES: [&str; 26] = [
    "IF_ACTIVE_GOALS",
    "IF_ACTIVE_GOALS_HIDE",
    "IF_NO_PATH",
    "IF_PATH_STILL_FINDING",
    "IF_IS_HIDDEN",
    "IF_CAN_HIDE",
    "IF_CANNOT_HIDE",
    "IF_STANCE_IS",
    "IF_FIRE_IS",
    "IF_HAS_FIRED",
    "IF_NO_LASTOP",
    "IF_SEES_LASTOP",
    "IF_SEES_TARGET",
    "IF_EXPOSED_TO_TARGET",
    "IF_TARGET_DIST_LESS",
    "IF_TARGET_DIST_GREATER",
    "IF_TARGET_IN_RANGE",
    "IF_TARGET_OUT_OF_RANGE",
    "IF_TARGET_MOVED_SINCE_START",
    "IF_TARGET_MOVED",
    "IF_LASTOP_DIST_LESS",
    "IF_LASTOP_FAILED",
    "IF_LASTOP_SUCCEED",
    "IF_COVER_COMPROMISED",
    "IF_COVER_NOT_COMPROMISED",
    "IF_RANDOM",
];

impl BranchKind {
    /// Parse a named kind. `value` is the numeric parameter, `text` the
    /// string parameter (only used by `IF_STANCE_IS`).
    pub fn parse(name: &str, value: f32, text: Option<&str>) -> Result<Self> {
        let kind = match name {
            "BRANCH_ALWAYS" | "ALWAYS" => BranchKind::Always,
            "IF_RANDOM" => BranchKind::Random(value),
            "IF_NO_PATH" => BranchKind::NoPath,
            "IF_PATH_STILL_FINDING" => BranchKind::PathStillFinding,
            "IF_PATH_LONGER" => BranchKind::PathLonger(value),
            "IF_PATH_SHORTER" => BranchKind::PathShorter(value),
            "IF_PATH_LONGER_RELATIVE" => BranchKind::PathLongerRelative(value),
            "IF_TARGET_DIST_LESS" => BranchKind::TargetDistLess(value),
            "IF_TARGET_DIST_GREATER" => BranchKind::TargetDistGreater(value),
            "IF_TARGET_IN_RANGE" => BranchKind::TargetInRange,
            "IF_TARGET_OUT_OF_RANGE" => BranchKind::TargetOutOfRange,
            "IF_TARGET_MOVED" => BranchKind::TargetMoved(value),
            "IF_TARGET_MOVED_SINCE_START" => BranchKind::TargetMovedSinceStart(value),
            "IF_NO_TARGET" => BranchKind::NoTarget,
            "IF_NO_LASTOP" => BranchKind::NoLastOp,
            "IF_LASTOP_DIST_LESS" => BranchKind::LastOpDistLess(value),
            "IF_LASTOP_FAILED" => BranchKind::LastOpFailed,
            "IF_LASTOP_SUCCEED" => BranchKind::LastOpSucceeded,
            "IF_STANCE_IS" => BranchKind::StanceIs(stance_param(value, text)?),
            "IF_COVER_COMPROMISED" => BranchKind::CoverCompromised,
            "IF_COVER_NOT_COMPROMISED" => BranchKind::CoverNotCompromised,
            "IF_IN_COVER" => BranchKind::InCover,
            "IF_MOVING_TO_COVER" => BranchKind::MovingToCover,
            "IF_ACTIVE_GOALS" => BranchKind::ActiveGoals,
            "IF_ACTIVE_GOALS_HIDE" => BranchKind::ActiveGoalsOrNoCover,
            "IF_SEES_TARGET" => BranchKind::SeesTarget,
            _ => return Err(PipeError::UnknownBranch(name.to_string())),
        };
        Ok(kind)
    }

    /// Resolve a numeric code. Codes without an implementation are rejected,
    /// unless `legacy_fallback` is set, in which case they degrade to
    /// [`BranchKind::LegacyActiveGoals`] with a warning.
    pub fn from_code(code: u32, value: f32, legacy_fallback: bool) -> Result<Self> {
        let parsed = CODE_NAMES
            .get(code as usize)
            .ok_or(PipeError::UnknownBranchCode(code))
            .and_then(|name| {
                Self::parse(name, value, None).map_err(|_| PipeError::UnknownBranchCode(code))
            });
        match parsed {
            Ok(kind) => Ok(kind),
            Err(_) if legacy_fallback => {
                warn!(code, "unknown branch code, evaluating active goals instead");
                Ok(BranchKind::LegacyActiveGoals)
            }
            Err(err) => Err(err),
        }
    }
}

fn stance_param(value: f32, text: Option<&str>) -> Result<Stance> {
    let bad = PipeError::BadBranchParam {
        kind: "IF_STANCE_IS",
        expected: "stance",
    };
    if let Some(text) = text {
        return Stance::from_name(text).ok_or(bad);
    }
    const BY_INDEX: [Stance; 5] = [
        Stance::Stand,
        Stance::Crouch,
        Stance::Prone,
        Stance::Relaxed,
        Stance::Stealth,
    ];
    if value < 0.0 {
        return Err(bad);
    }
    BY_INDEX.get(value as usize).copied().ok_or(bad)
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BranchCondition {
    pub kind: BranchKind,
    pub negate: bool,
}

impl BranchCondition {
    pub fn new(kind: BranchKind) -> Self {
        Self {
            kind,
            negate: false,
        }
    }

    pub fn not(kind: BranchKind) -> Self {
        Self { kind, negate: true }
    }

    /// Like [`BranchKind::parse`]; a leading `!` negates.
    pub fn parse(name: &str, value: f32, text: Option<&str>) -> Result<Self> {
        match name.strip_prefix('!') {
            Some(rest) => Ok(Self::not(BranchKind::parse(rest, value, text)?)),
            None => Ok(Self::new(BranchKind::parse(name, value, text)?)),
        }
    }
}

impl From<BranchKind> for BranchCondition {
    fn from(kind: BranchKind) -> Self {
        Self::new(kind)
    }
}

/// Cached agent state a condition may look at.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BranchEnv {
    /// Uniform draw in `[0, 1)` for random branches.
    pub random_draw: f32,
    pub path_decision: PathDecision,
    pub path_length: f32,
    pub path_end: Option<Vec3>,
    pub agent_pos: Option<Vec3>,
    pub target_pos: Option<Vec3>,
    /// Target position snapshot taken when the pipe started or last looped.
    pub target_snapshot: Option<Vec3>,
    pub last_op_pos: Option<Vec3>,
    pub last_result: Option<GoalOutcome>,
    pub stance: Option<Stance>,
    pub has_cover: bool,
    pub in_cover: bool,
    pub moving_to_cover: bool,
    pub cover_compromised: bool,
    pub active_goals: usize,
    pub sees_target: bool,
    pub attack_range: f32,
}

impl BranchEnv {
    pub fn gather<W: PipeWorld>(
        world: &W,
        agent: W::Agent,
        state: &AgentState,
        active_goals: usize,
        last_result: Option<GoalOutcome>,
        target_snapshot: Option<Vec3>,
        random_draw: f32,
    ) -> Self {
        Self {
            random_draw,
            path_decision: state.path.decision(),
            path_length: state.path.path_length(),
            path_end: state.path.path().and_then(|p| p.end()),
            agent_pos: world.position(agent),
            target_pos: state.attention_position(world),
            target_snapshot,
            last_op_pos: state.last_op_position(world),
            last_result,
            stance: world.query_body_info(agent, None).map(|b| b.stance),
            has_cover: state.cover.cover_id().is_some(),
            in_cover: state.cover.is_in_cover(),
            moving_to_cover: state.cover.is_moving_to_cover(),
            cover_compromised: state.cover.is_compromised(),
            active_goals,
            sees_target: state.sees_target,
            attack_range: state.attack_range,
        }
    }

    fn target_distance(&self) -> Option<f32> {
        Some(self.agent_pos?.distance(self.target_pos?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchOutcome {
    pub taken: bool,
    /// New value for the pipe's target snapshot.
    pub retarget: Option<Vec3>,
}

pub fn evaluate(condition: &BranchCondition, env: &BranchEnv) -> BranchOutcome {
    let mut retarget = None;
    let taken = match condition.kind {
        BranchKind::Always => true,
        BranchKind::Random(p) => env.random_draw < p,
        BranchKind::NoPath => env.path_decision == PathDecision::NoPath,
        BranchKind::PathStillFinding => env.path_decision == PathDecision::StillFinding,
        BranchKind::PathLonger(d) => {
            env.path_decision == PathDecision::PathFound && env.path_length > d
        }
        BranchKind::PathShorter(d) => {
            env.path_decision == PathDecision::PathFound && env.path_length < d
        }
        BranchKind::PathLongerRelative(k) => match (env.agent_pos, env.path_end) {
            (Some(pos), Some(end)) if env.path_decision == PathDecision::PathFound => {
                env.path_length > k * pos.distance(end)
            }
            _ => false,
        },
        BranchKind::TargetDistLess(d) => env.target_distance().is_some_and(|t| t < d),
        BranchKind::TargetDistGreater(d) => env.target_distance().is_some_and(|t| t > d),
        BranchKind::TargetInRange => env
            .target_distance()
            .is_some_and(|t| t <= env.attack_range),
        BranchKind::TargetOutOfRange => env
            .target_distance()
            .is_some_and(|t| t > env.attack_range),
        BranchKind::TargetMoved(d) => match env.target_pos {
            Some(now) => {
                retarget = Some(now);
                env.target_snapshot.is_some_and(|then| now.distance(then) > d)
            }
            None => false,
        },
        BranchKind::TargetMovedSinceStart(d) => match (env.target_pos, env.target_snapshot) {
            (Some(now), Some(then)) => now.distance(then) > d,
            _ => false,
        },
        BranchKind::NoTarget => env.target_pos.is_none(),
        BranchKind::NoLastOp => env.last_op_pos.is_none(),
        BranchKind::LastOpDistLess(d) => match (env.agent_pos, env.last_op_pos) {
            (Some(pos), Some(op)) => pos.distance(op) < d,
            _ => false,
        },
        BranchKind::LastOpFailed => env.last_result == Some(GoalOutcome::Failed),
        BranchKind::LastOpSucceeded => env.last_result == Some(GoalOutcome::Succeeded),
        BranchKind::StanceIs(stance) => env.stance == Some(stance),
        BranchKind::CoverCompromised => env.cover_compromised,
        BranchKind::CoverNotCompromised => !env.cover_compromised,
        BranchKind::InCover => env.in_cover,
        BranchKind::MovingToCover => env.moving_to_cover,
        BranchKind::ActiveGoals | BranchKind::LegacyActiveGoals => env.active_goals > 0,
        BranchKind::ActiveGoalsOrNoCover => env.active_goals > 0 || !env.has_cover,
        BranchKind::SeesTarget => env.sees_target,
    };
    BranchOutcome {
        taken: taken != condition.negate,
        retarget,
    }
}
