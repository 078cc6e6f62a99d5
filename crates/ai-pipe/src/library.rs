//! Pipe authoring: a builder that resolves labels, immutable templates, and
//! the named library agents select from.

use std::collections::BTreeMap;
use std::fmt;

use ai_core::PipeConfig;

use crate::error::{PipeError, Result};
use crate::{
    BranchCondition, BranchKind, GoalPipe, GoalSpec, Instruction, InstructionKind, PipeWorld,
    WaitMode,
};

/// Where a jump lands: a relative offset or a label in the same pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    Offset(i32),
    Label(String),
}

impl From<i32> for JumpTarget {
    fn from(offset: i32) -> Self {
        JumpTarget::Offset(offset)
    }
}

impl From<&str> for JumpTarget {
    fn from(label: &str) -> Self {
        JumpTarget::Label(label.to_string())
    }
}

impl From<String> for JumpTarget {
    fn from(label: String) -> Self {
        JumpTarget::Label(label)
    }
}

pub struct PipeTemplate<W: PipeWorld> {
    name: String,
    instructions: Vec<Instruction<GoalSpec<W>>>,
}

impl<W: PipeWorld> Clone for PipeTemplate<W> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            instructions: self.instructions.clone(),
        }
    }
}

impl<W: PipeWorld> fmt::Debug for PipeTemplate<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeTemplate")
            .field("name", &self.name)
            .field("instructions", &self.instructions)
            .finish()
    }
}

impl<W: PipeWorld> PipeTemplate<W> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Instruction<GoalSpec<W>>] {
        &self.instructions
    }

    /// Fresh pipe with its own goal op instances.
    pub fn instantiate(&self) -> GoalPipe<W> {
        let instructions = self
            .instructions
            .iter()
            .map(|ins| ins.map(GoalSpec::instantiate))
            .collect();
        GoalPipe::new(self.name.clone(), instructions)
    }
}

pub struct PipeBuilder<W: PipeWorld> {
    name: String,
    instructions: Vec<Instruction<GoalSpec<W>>>,
    labels: BTreeMap<String, usize>,
    pending: Vec<(usize, String)>,
    legacy_branch_fallback: bool,
    error: Option<PipeError>,
}

impl<W: PipeWorld> PipeBuilder<W> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            labels: BTreeMap::new(),
            pending: Vec::new(),
            legacy_branch_fallback: false,
            error: None,
        }
    }

    /// Builder honouring the authoring switches in `config`.
    pub fn with_config(name: impl Into<String>, config: &PipeConfig) -> Self {
        Self::new(name).legacy_branch_fallback(config.legacy_branch_fallback)
    }

    /// Accept unknown numeric branch codes in [`PipeBuilder::branch_code`].
    pub fn legacy_branch_fallback(mut self, enabled: bool) -> Self {
        self.legacy_branch_fallback = enabled;
        self
    }

    /// Name the next instruction.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if self.labels.contains_key(&label) {
            self.fail(PipeError::DuplicateLabel {
                pipe: self.name.clone(),
                label,
            });
        } else {
            self.labels.insert(label, self.instructions.len());
        }
        self
    }

    pub fn branch(self, condition: impl Into<BranchCondition>, target: impl Into<JumpTarget>) -> Self {
        self.push_branch(condition.into(), target.into(), false)
    }

    /// Branch that ends advancement for this tick, taken or not.
    pub fn branch_blocking(
        self,
        condition: impl Into<BranchCondition>,
        target: impl Into<JumpTarget>,
    ) -> Self {
        self.push_branch(condition.into(), target.into(), true)
    }

    /// Branch on a named condition such as `IF_TARGET_DIST_LESS`; a leading
    /// `!` negates it.
    pub fn branch_named(self, name: &str, value: f32, target: impl Into<JumpTarget>) -> Self {
        match BranchCondition::parse(name, value, None) {
            Ok(condition) => self.push_branch(condition, target.into(), false),
            Err(err) => self.failed(err),
        }
    }

    pub fn branch_code(
        self,
        code: u32,
        value: f32,
        negate: bool,
        target: impl Into<JumpTarget>,
    ) -> Self {
        match BranchKind::from_code(code, value, self.legacy_branch_fallback) {
            Ok(kind) => self.push_branch(BranchCondition { kind, negate }, target.into(), false),
            Err(err) => self.failed(err),
        }
    }

    /// Jump when `chance` (percent) beats a draw in `0..100`. Ends the tick
    /// either way.
    pub fn random_jump(mut self, chance: f32, target: impl Into<JumpTarget>) -> Self {
        let offset = self.offset_for(target.into());
        self.instructions.push(Instruction::new(
            InstructionKind::RandomJump { chance, offset },
            false,
        ));
        self
    }

    pub fn clear(mut self, clear_target: bool) -> Self {
        self.instructions.push(Instruction::new(
            InstructionKind::Clear { clear_target },
            false,
        ));
        self
    }

    pub fn wait(mut self, mode: WaitMode) -> Self {
        self.instructions
            .push(Instruction::new(InstructionKind::Wait(mode), true));
        self
    }

    pub fn goal(self, goal: impl Into<GoalSpec<W>>) -> Self {
        self.push_goal(goal.into(), true, false)
    }

    /// Non-blocking goal that keeps running alongside the pipe.
    pub fn goal_concurrent(self, goal: impl Into<GoalSpec<W>>) -> Self {
        self.push_goal(goal.into(), false, false)
    }

    /// Non-blocking goal watched by the next [`PipeBuilder::wait`].
    pub fn goal_grouped(self, goal: impl Into<GoalSpec<W>>) -> Self {
        self.push_goal(goal.into(), false, true)
    }

    pub fn build(mut self) -> Result<PipeTemplate<W>> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if self.name.is_empty() {
            return Err(PipeError::EmptyName);
        }
        for (index, label) in std::mem::take(&mut self.pending) {
            let Some(&to) = self.labels.get(&label) else {
                return Err(PipeError::UnknownLabel {
                    pipe: self.name,
                    label,
                });
            };
            let offset = to as i32 - index as i32;
            match &mut self.instructions[index].kind {
                InstructionKind::Branch { offset: o, .. }
                | InstructionKind::RandomJump { offset: o, .. } => *o = offset,
                _ => {}
            }
        }
        Ok(PipeTemplate {
            name: self.name,
            instructions: self.instructions,
        })
    }

    fn push_branch(mut self, condition: BranchCondition, target: JumpTarget, blocking: bool) -> Self {
        let offset = self.offset_for(target);
        self.instructions.push(Instruction::new(
            InstructionKind::Branch { condition, offset },
            blocking,
        ));
        self
    }

    fn push_goal(mut self, goal: GoalSpec<W>, blocking: bool, grouped: bool) -> Self {
        let mut ins = Instruction::new(InstructionKind::Goal(goal), blocking);
        ins.grouped = grouped;
        self.instructions.push(ins);
        self
    }

    /// Offsets are used as given; labels are resolved in `build`.
    fn offset_for(&mut self, target: JumpTarget) -> i32 {
        match target {
            JumpTarget::Offset(offset) => offset,
            JumpTarget::Label(label) => {
                self.pending.push((self.instructions.len(), label));
                0
            }
        }
    }

    fn fail(&mut self, err: PipeError) {
        self.error.get_or_insert(err);
    }

    fn failed(mut self, err: PipeError) -> Self {
        self.fail(err);
        self
    }
}

/// Named templates shared by every agent of a population.
pub struct PipeLibrary<W: PipeWorld> {
    pipes: BTreeMap<String, PipeTemplate<W>>,
}

impl<W: PipeWorld> Default for PipeLibrary<W> {
    fn default() -> Self {
        Self {
            pipes: BTreeMap::new(),
        }
    }
}

impl<W: PipeWorld> fmt::Debug for PipeLibrary<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.pipes.keys()).finish()
    }
}

impl<W: PipeWorld> PipeLibrary<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, template: PipeTemplate<W>) -> Result<()> {
        if self.pipes.contains_key(template.name()) {
            return Err(PipeError::DuplicatePipe(template.name.clone()));
        }
        self.pipes.insert(template.name.clone(), template);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PipeTemplate<W>> {
        self.pipes.get(name)
    }

    pub fn instantiate(&self, name: &str) -> Result<GoalPipe<W>> {
        self.get(name)
            .map(PipeTemplate::instantiate)
            .ok_or_else(|| PipeError::UnknownPipe(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }
}
