use ai_core::{GoalOutcome, ObjectHandle, Vec3};
use tracing::warn;

use crate::{GoalInstance, Instruction, PipeId, PipeWorld, ResetContext};

/// Result of [`GoalPipe::pop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopResult {
    /// Index of the instruction to run next.
    Succeed(usize),
    AtEnd,
    /// At the end with a loop break requested.
    BreakLoop,
}

/// A running instance of a pipe template.
#[derive(Debug)]
pub struct GoalPipe<W: PipeWorld> {
    name: String,
    id: Option<PipeId>,
    instructions: Vec<Instruction<GoalInstance<W>>>,
    cursor: usize,
    looping: bool,
    last_result: Option<GoalOutcome>,
    target_snapshot: Option<Vec3>,
    argument: Option<ObjectHandle>,
    pub(crate) exit_notified: bool,
    break_requested: bool,
}

impl<W: PipeWorld> GoalPipe<W> {
    pub fn new(name: impl Into<String>, instructions: Vec<Instruction<GoalInstance<W>>>) -> Self {
        Self {
            name: name.into(),
            id: None,
            instructions,
            cursor: 0,
            looping: false,
            last_result: None,
            target_snapshot: None,
            argument: None,
            exit_notified: false,
            break_requested: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<PipeId> {
        self.id
    }

    pub fn set_id(&mut self, id: Option<PipeId>) {
        self.id = id;
    }

    pub fn argument(&self) -> Option<ObjectHandle> {
        self.argument
    }

    pub fn set_argument(&mut self, argument: Option<ObjectHandle>) {
        self.argument = argument;
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index of the next instruction to pop.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.instructions.len()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn last_result(&self) -> Option<GoalOutcome> {
        self.last_result
    }

    pub fn set_last_result(&mut self, result: Option<GoalOutcome>) {
        self.last_result = result;
    }

    pub fn target_snapshot(&self) -> Option<Vec3> {
        self.target_snapshot
    }

    pub fn set_target_snapshot(&mut self, pos: Option<Vec3>) {
        self.target_snapshot = pos;
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction<GoalInstance<W>>> {
        self.instructions.get(index)
    }

    pub fn instruction_mut(&mut self, index: usize) -> Option<&mut Instruction<GoalInstance<W>>> {
        self.instructions.get_mut(index)
    }

    pub fn pop(&mut self) -> PopResult {
        if self.cursor >= self.instructions.len() {
            return if self.break_requested {
                PopResult::BreakLoop
            } else {
                PopResult::AtEnd
            };
        }
        let index = self.cursor;
        self.cursor += 1;
        PopResult::Succeed(index)
    }

    /// Move the cursor to `from + offset`. Returns whether the jump blocks
    /// further advancement this tick, which is the case for any jump that
    /// does not move forward. Out-of-range targets are ignored.
    pub fn jump(&mut self, from: usize, offset: i32) -> bool {
        let target = from as i64 + i64::from(offset);
        if target < 0 || target > self.instructions.len() as i64 {
            warn!(pipe = %self.name, from, offset, "jump target out of range, ignored");
            return false;
        }
        self.cursor = target as usize;
        offset <= 0
    }

    /// Put the cursor back so `index` is popped again.
    pub fn rewind_to(&mut self, index: usize) {
        self.cursor = index.min(self.instructions.len());
    }

    /// Stop looping at the next pass over the end.
    pub fn request_break(&mut self) {
        self.break_requested = true;
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.last_result = None;
        self.target_snapshot = None;
        self.exit_notified = false;
        self.break_requested = false;
    }

    /// Reset every goal op in the pipe.
    pub fn reset_goals(&mut self, cx: &mut ResetContext<'_, W>) {
        for goal in self.instructions.iter_mut().filter_map(Instruction::goal_mut) {
            goal.reset(cx);
        }
    }
}
