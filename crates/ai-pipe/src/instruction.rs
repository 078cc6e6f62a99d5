#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::BranchCondition;

/// Completion rule for a `Wait` over the preceding grouped goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WaitMode {
    #[default]
    All,
    Any,
    /// Any two of the group (or all of it, if smaller).
    Any2,
}

/// One pipe slot. `G` is the goal payload: a spec in templates, a live op in
/// running pipes.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind<G> {
    /// Jump by `offset` (relative to this instruction) when the condition
    /// holds.
    Branch {
        condition: BranchCondition,
        offset: i32,
    },
    /// Jump by `offset` when `chance` exceeds a uniform draw in `[0, 100)`.
    RandomJump { chance: f32, offset: i32 },
    /// Drop every active goal, optionally forgetting the attention target.
    Clear { clear_target: bool },
    Wait(WaitMode),
    Goal(G),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<G> {
    pub kind: InstructionKind<G>,
    /// Pipe advancement waits for this instruction.
    pub blocking: bool,
    /// Non-blocking goal watched by the next `Wait`.
    pub grouped: bool,
}

impl<G> Instruction<G> {
    pub fn new(kind: InstructionKind<G>, blocking: bool) -> Self {
        Self {
            kind,
            blocking,
            grouped: false,
        }
    }

    pub fn is_goal(&self) -> bool {
        matches!(self.kind, InstructionKind::Goal(_))
    }

    pub fn goal(&self) -> Option<&G> {
        match &self.kind {
            InstructionKind::Goal(g) => Some(g),
            _ => None,
        }
    }

    pub fn goal_mut(&mut self) -> Option<&mut G> {
        match &mut self.kind {
            InstructionKind::Goal(g) => Some(g),
            _ => None,
        }
    }

    pub(crate) fn map<H>(&self, f: impl FnOnce(&G) -> H) -> Instruction<H> {
        let kind = match &self.kind {
            InstructionKind::Branch { condition, offset } => InstructionKind::Branch {
                condition: *condition,
                offset: *offset,
            },
            InstructionKind::RandomJump { chance, offset } => InstructionKind::RandomJump {
                chance: *chance,
                offset: *offset,
            },
            InstructionKind::Clear { clear_target } => InstructionKind::Clear {
                clear_target: *clear_target,
            },
            InstructionKind::Wait(mode) => InstructionKind::Wait(*mode),
            InstructionKind::Goal(g) => InstructionKind::Goal(f(g)),
        };
        Instruction {
            kind,
            blocking: self.blocking,
            grouped: self.grouped,
        }
    }
}
