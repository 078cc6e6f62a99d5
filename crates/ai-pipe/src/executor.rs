//! Per-agent pipe scheduling.
//!
//! Each full update resumes whatever blocked the innermost pipe, pops and runs
//! instructions until something stops advancement, then gives every
//! already-active non-blocking goal one tick.

use std::mem;

use ai_core::{AgentId, DeterministicRng, GoalStatus, PipeConfig, Vec3};
use tracing::{debug, error, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::branch::{self, BranchEnv};
use crate::error::{PipeError, Result};
use crate::{
    GoalContext, GoalInstance, GoalOpSnapshot, GoalPipe, InstructionKind, PipeArena, PipeId,
    PipeKey, PipeLibrary, PipeSelection, PipeWorld, PopResult, ResetContext, SelectMode,
    WaitMode,
};

/// A goal instruction identified by its pipe and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveGoal {
    pub pipe: PipeKey,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WaitState {
    at: ActiveGoal,
    mode: WaitMode,
    group: Vec<ActiveGoal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Blocking {
    #[default]
    None,
    Goal(ActiveGoal),
    Wait(WaitState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PipeEventKind {
    Selected,
    Inserted,
    /// A non-looping root pipe ran out of instructions.
    Exiting,
    /// An inserted subpipe ran out of instructions and was popped.
    Finished,
    Removed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipeEvent {
    pub kind: PipeEventKind,
    pub name: String,
    pub id: Option<PipeId>,
}

/// Serializable view of one running pipe.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipeSnapshot {
    pub name: String,
    pub id: Option<PipeId>,
    pub cursor: usize,
    pub looping: bool,
    pub goals: Vec<(usize, GoalOpSnapshot)>,
    /// Indices of goals currently in the active list.
    pub active: Vec<usize>,
}

enum Flow {
    Continue,
    Stop,
}

enum EndFlow {
    Continue,
    Looped,
    Stop,
}

enum Step {
    Branch(crate::BranchCondition, i32),
    RandomJump(f32, i32),
    Clear(bool),
    Wait(WaitMode),
    Goal,
}

pub struct PipelineExecutor<W: PipeWorld> {
    arena: PipeArena<W>,
    active: Vec<ActiveGoal>,
    deferred: Vec<ActiveGoal>,
    /// Grouped goals not yet claimed by a `Wait`.
    group: Vec<ActiveGoal>,
    blocking: Blocking,
    paused: u32,
    events: Vec<PipeEvent>,
    goal_warned: bool,
    depth_warned: bool,
}

impl<W: PipeWorld> Default for PipelineExecutor<W> {
    fn default() -> Self {
        Self {
            arena: PipeArena::new(),
            active: Vec::new(),
            deferred: Vec::new(),
            group: Vec::new(),
            blocking: Blocking::None,
            paused: 0,
            events: Vec::new(),
            goal_warned: false,
            depth_warned: false,
        }
    }
}

impl<W: PipeWorld> PipelineExecutor<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arena(&self) -> &PipeArena<W> {
        &self.arena
    }

    /// Innermost running pipe.
    pub fn current_pipe(&self) -> Option<&GoalPipe<W>> {
        self.arena.innermost().and_then(|k| self.arena.get(k))
    }

    pub fn root_pipe(&self) -> Option<&GoalPipe<W>> {
        self.arena.root().and_then(|k| self.arena.get(k))
    }

    /// Re-snapshot the target position on the innermost pipe.
    pub fn retarget(&mut self, position: Vec3) {
        if let Some(pipe) = self.arena.innermost().and_then(|k| self.arena.get_mut(k)) {
            pipe.set_target_snapshot(Some(position));
        }
    }

    pub fn active_goals(&self) -> &[ActiveGoal] {
        &self.active
    }

    pub fn active_goal_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocking != Blocking::None
    }

    pub fn is_using_pipe(&self, name: &str) -> bool {
        self.arena.find_name(name).is_some()
    }

    pub fn is_using_pipe_id(&self, id: PipeId) -> bool {
        self.arena.find_id(id).is_some()
    }

    /// Nested pause; every `pause(true)` needs a matching `pause(false)`.
    pub fn pause(&mut self, paused: bool) {
        if paused {
            self.paused += 1;
        } else {
            self.paused = self.paused.saturating_sub(1);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused > 0
    }

    pub fn drain_events(&mut self) -> Vec<PipeEvent> {
        mem::take(&mut self.events)
    }

    pub fn update(&mut self, cx: &mut GoalContext<'_, W>) {
        if self.is_paused() {
            return;
        }
        self.deferred.clear();
        self.check_depth(&cx.config.pipe, cx.agent);

        if self.resume_blocked(cx) {
            self.advance(cx);
        }
        self.run_active(cx);

        let deferred = mem::take(&mut self.deferred);
        self.active.extend(deferred);
        self.check_goal_count(&cx.config.pipe, cx.agent);
    }

    /// Steering-only update: no advancement, only `execute_dry` on running
    /// goals.
    pub fn update_dry(&mut self, cx: &mut GoalContext<'_, W>) {
        if self.is_paused() {
            return;
        }
        let mut goals = self.active.clone();
        if let Blocking::Goal(goal) = self.blocking {
            goals.push(goal);
        }
        for goal in goals {
            if let Some(op) = self.goal_mut(goal) {
                op.execute_dry(cx);
            }
        }
    }

    /// Returns `Ok(false)` when the request was a no-op because the pipe is
    /// already running.
    pub fn select_pipe(
        &mut self,
        library: &PipeLibrary<W>,
        selection: PipeSelection,
        cx: &mut ResetContext<'_, W>,
    ) -> Result<bool> {
        if !library.contains(&selection.name) {
            return Err(PipeError::UnknownPipe(selection.name));
        }

        if selection.mode == SelectMode::Replace && !selection.reset_always {
            let root = self.arena.root().and_then(|k| self.arena.get_mut(k));
            if let Some(root) = root.filter(|r| r.name() == selection.name) {
                root.set_id(selection.id);
                root.set_argument(selection.argument);
                return Ok(false);
            }
        }
        if selection.mode == SelectMode::Insert && self.arena.is_empty() {
            return Err(PipeError::NoCurrentPipe);
        }

        let mut pipe = library.instantiate(&selection.name)?;
        pipe.set_looping(selection.looping);
        pipe.set_id(selection.id);
        pipe.set_argument(selection.argument);
        pipe.set_target_snapshot(cx.state.attention_position(&*cx.world));

        let kind = match selection.mode {
            SelectMode::Replace => {
                self.clear_all(cx);
                PipeEventKind::Selected
            }
            SelectMode::Insert => {
                self.suspend_innermost(cx);
                PipeEventKind::Inserted
            }
        };
        debug!(
            agent = cx.agent.stable_id(),
            pipe = %selection.name,
            ?kind,
            "goal pipe selected"
        );
        self.events.push(PipeEvent {
            kind,
            name: selection.name,
            id: selection.id,
        });
        self.arena.push(pipe);
        Ok(true)
    }

    /// Cancel the subpipe with `id` together with everything inserted above
    /// it. The root pipe cannot be cancelled.
    pub fn cancel_subpipe(&mut self, id: PipeId, cx: &mut ResetContext<'_, W>) -> bool {
        self.remove_by_id(id, false, PipeEventKind::Cancelled, cx)
    }

    /// Remove the subpipe with `id`. With `keep_inserted` the pipes inserted
    /// above it stay.
    pub fn remove_subpipe(
        &mut self,
        id: PipeId,
        keep_inserted: bool,
        cx: &mut ResetContext<'_, W>,
    ) -> bool {
        self.remove_by_id(id, keep_inserted, PipeEventKind::Removed, cx)
    }

    /// Reset and drop every active goal.
    pub fn clear_active_goals(&mut self, cx: &mut ResetContext<'_, W>) {
        let goals: Vec<ActiveGoal> = self.active.drain(..).chain(self.deferred.drain(..)).collect();
        self.group.clear();
        for goal in goals {
            self.reset_goal(goal, cx);
        }
    }

    /// Drop every pipe and goal.
    pub fn reset(&mut self, cx: &mut ResetContext<'_, W>) {
        self.clear_all(cx);
        self.paused = 0;
        self.goal_warned = false;
        self.depth_warned = false;
    }

    pub fn snapshot(&self) -> Vec<PipeSnapshot> {
        self.arena
            .keys()
            .filter_map(|key| {
                let pipe = self.arena.get(key)?;
                let goals = (0..pipe.len())
                    .filter_map(|i| {
                        let op = pipe.instruction(i)?.goal()?;
                        Some((i, op.snapshot()))
                    })
                    .collect();
                let active = self
                    .active
                    .iter()
                    .filter(|g| g.pipe == key)
                    .map(|g| g.index)
                    .collect();
                Some(PipeSnapshot {
                    name: pipe.name().to_string(),
                    id: pipe.id(),
                    cursor: pipe.cursor(),
                    looping: pipe.is_looping(),
                    goals,
                    active,
                })
            })
            .collect()
    }

    /// Returns whether the pipe may advance this tick.
    fn resume_blocked(&mut self, cx: &mut GoalContext<'_, W>) -> bool {
        match mem::take(&mut self.blocking) {
            Blocking::None => true,
            Blocking::Goal(goal) => match self.execute_goal(goal, cx) {
                None => true,
                Some(GoalStatus::InProgress) => {
                    self.blocking = Blocking::Goal(goal);
                    false
                }
                Some(status) => {
                    self.finish_goal(goal, status, &mut cx.reset_context());
                    true
                }
            },
            Blocking::Wait(wait) => {
                if !self.arena.contains(wait.at.pipe) || self.wait_satisfied(&wait) {
                    return true;
                }
                self.blocking = Blocking::Wait(wait);
                false
            }
        }
    }

    fn advance(&mut self, cx: &mut GoalContext<'_, W>) {
        let mut popped = false;
        let mut looped = false;
        loop {
            let Some(key) = self.arena.innermost() else {
                return;
            };
            let Some(pipe) = self.arena.get_mut(key) else {
                return;
            };
            match pipe.pop() {
                PopResult::Succeed(index) => {
                    popped = true;
                    if let Flow::Stop = self.step(key, index, cx) {
                        return;
                    }
                }
                end => {
                    // Reaching the end mid-tick is handled on the next update.
                    if popped {
                        return;
                    }
                    match self.pipe_ended(key, end == PopResult::BreakLoop, looped, cx) {
                        EndFlow::Continue => {}
                        EndFlow::Looped => looped = true,
                        EndFlow::Stop => return,
                    }
                }
            }
        }
    }

    fn step(&mut self, key: PipeKey, index: usize, cx: &mut GoalContext<'_, W>) -> Flow {
        let Some(ins) = self.arena.get(key).and_then(|p| p.instruction(index)) else {
            return Flow::Stop;
        };
        let (blocking, grouped) = (ins.blocking, ins.grouped);
        let step = match &ins.kind {
            InstructionKind::Branch { condition, offset } => Step::Branch(*condition, *offset),
            InstructionKind::RandomJump { chance, offset } => Step::RandomJump(*chance, *offset),
            InstructionKind::Clear { clear_target } => Step::Clear(*clear_target),
            InstructionKind::Wait(mode) => Step::Wait(*mode),
            InstructionKind::Goal(_) => Step::Goal,
        };

        match step {
            Step::Branch(condition, offset) => {
                let active_goals = self.active.len() + self.deferred.len();
                let draw = cx.rng.next_f32_unit();
                let Some(pipe) = self.arena.get_mut(key) else {
                    return Flow::Stop;
                };
                let env = BranchEnv::gather(
                    &*cx.world,
                    cx.agent,
                    &*cx.state,
                    active_goals,
                    pipe.last_result(),
                    pipe.target_snapshot(),
                    draw,
                );
                let outcome = branch::evaluate(&condition, &env);
                if let Some(pos) = outcome.retarget {
                    pipe.set_target_snapshot(Some(pos));
                }
                let backward = outcome.taken && pipe.jump(index, offset);
                if backward || blocking {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }
            Step::RandomJump(chance, offset) => {
                // Always ends the tick, taken or not.
                let draw = cx.rng.next_below(100) as f32;
                if chance > draw {
                    if let Some(pipe) = self.arena.get_mut(key) {
                        pipe.jump(index, offset);
                    }
                }
                Flow::Stop
            }
            Step::Clear(clear_target) => {
                self.clear_active_goals(&mut cx.reset_context());
                if clear_target {
                    cx.state.attention_target = None;
                }
                Flow::Stop
            }
            Step::Wait(mode) => {
                let (group, rest): (Vec<_>, Vec<_>) =
                    mem::take(&mut self.group).into_iter().partition(|g| g.pipe == key);
                self.group = rest;
                let wait = WaitState {
                    at: ActiveGoal { pipe: key, index },
                    mode,
                    group,
                };
                if self.wait_satisfied(&wait) {
                    return Flow::Continue;
                }
                self.blocking = Blocking::Wait(wait);
                Flow::Stop
            }
            Step::Goal => self.step_goal(ActiveGoal { pipe: key, index }, blocking, grouped, cx),
        }
    }

    fn step_goal(
        &mut self,
        goal: ActiveGoal,
        blocking: bool,
        grouped: bool,
        cx: &mut GoalContext<'_, W>,
    ) -> Flow {
        // Popping a goal that is still active restarts it.
        if let Some(pos) = self.active.iter().position(|g| *g == goal) {
            self.active.remove(pos);
            self.reset_goal(goal, &mut cx.reset_context());
        }
        let Some(status) = self.execute_goal(goal, cx) else {
            return Flow::Continue;
        };
        match status {
            GoalStatus::InProgress if blocking => {
                self.blocking = Blocking::Goal(goal);
                Flow::Stop
            }
            GoalStatus::InProgress => {
                self.deferred.push(goal);
                if grouped {
                    self.group.push(goal);
                }
                Flow::Continue
            }
            GoalStatus::Done => {
                self.reset_goal(goal, &mut cx.reset_context());
                Flow::Continue
            }
            GoalStatus::Succeeded | GoalStatus::Failed => {
                self.finish_goal(goal, status, &mut cx.reset_context());
                Flow::Stop
            }
        }
    }

    fn pipe_ended(
        &mut self,
        key: PipeKey,
        broke: bool,
        looped: bool,
        cx: &mut GoalContext<'_, W>,
    ) -> EndFlow {
        let is_root = self.arena.root() == Some(key);
        let target = cx.state.attention_position(&*cx.world);
        let Some(pipe) = self.arena.get_mut(key) else {
            return EndFlow::Stop;
        };

        if pipe.is_looping() && !broke {
            if looped {
                return EndFlow::Stop;
            }
            pipe.reset();
            pipe.set_target_snapshot(target);
            debug!(agent = cx.agent.stable_id(), pipe = %pipe.name(), "goal pipe looped");
            self.clear_active_goals(&mut cx.reset_context());
            return EndFlow::Looped;
        }

        if is_root {
            if !pipe.exit_notified {
                pipe.exit_notified = true;
                debug!(agent = cx.agent.stable_id(), pipe = %pipe.name(), "goal pipe exiting");
                self.events.push(PipeEvent {
                    kind: PipeEventKind::Exiting,
                    name: pipe.name().to_string(),
                    id: pipe.id(),
                });
            }
            return EndFlow::Stop;
        }

        let Some((key, pipe)) = self.arena.pop_innermost() else {
            return EndFlow::Stop;
        };
        if let Some(result) = pipe.last_result() {
            if let Some(parent) = self.arena.innermost().and_then(|k| self.arena.get_mut(k)) {
                parent.set_last_result(Some(result));
            }
        }
        self.forget(key, pipe, PipeEventKind::Finished, &mut cx.reset_context());
        EndFlow::Continue
    }

    fn run_active(&mut self, cx: &mut GoalContext<'_, W>) {
        let current = mem::take(&mut self.active);
        let mut kept = Vec::with_capacity(current.len());
        for goal in current {
            match self.execute_goal(goal, cx) {
                Some(GoalStatus::InProgress) => kept.push(goal),
                Some(_) => self.reset_goal(goal, &mut cx.reset_context()),
                None => {}
            }
        }
        self.active = kept;
    }

    fn wait_satisfied(&self, wait: &WaitState) -> bool {
        let total = wait.group.len();
        let finished = wait
            .group
            .iter()
            .filter(|g| !self.active.contains(g) && !self.deferred.contains(g))
            .count();
        match wait.mode {
            WaitMode::All => finished == total,
            WaitMode::Any => total == 0 || finished >= 1,
            WaitMode::Any2 => finished >= total.min(2),
        }
    }

    /// Put whatever blocks the innermost pipe back so it runs again once an
    /// inserted subpipe is done.
    fn suspend_innermost(&mut self, cx: &mut ResetContext<'_, W>) {
        match mem::take(&mut self.blocking) {
            Blocking::None => {}
            Blocking::Goal(goal) => {
                self.reset_goal(goal, cx);
                if let Some(pipe) = self.arena.get_mut(goal.pipe) {
                    pipe.rewind_to(goal.index);
                }
            }
            Blocking::Wait(wait) => {
                if let Some(pipe) = self.arena.get_mut(wait.at.pipe) {
                    pipe.rewind_to(wait.at.index);
                }
                self.group.extend(wait.group);
            }
        }
    }

    fn remove_by_id(
        &mut self,
        id: PipeId,
        keep_nested: bool,
        kind: PipeEventKind,
        cx: &mut ResetContext<'_, W>,
    ) -> bool {
        let Some(key) = self.arena.find_id(id) else {
            return false;
        };
        if self.arena.root() == Some(key) {
            warn!(pipe = id.0, "refusing to remove the root pipe");
            return false;
        }
        for (key, pipe) in self.arena.remove(key, keep_nested) {
            self.forget(key, pipe, kind, cx);
        }
        true
    }

    fn clear_all(&mut self, cx: &mut ResetContext<'_, W>) {
        self.clear_active_goals(cx);
        for (key, pipe) in self.arena.drain() {
            self.forget(key, pipe, PipeEventKind::Removed, cx);
        }
        self.blocking = Blocking::None;
    }

    fn forget(
        &mut self,
        key: PipeKey,
        mut pipe: GoalPipe<W>,
        kind: PipeEventKind,
        cx: &mut ResetContext<'_, W>,
    ) {
        self.active.retain(|g| g.pipe != key);
        self.deferred.retain(|g| g.pipe != key);
        self.group.retain(|g| g.pipe != key);
        let blocked_here = match &self.blocking {
            Blocking::Goal(goal) => goal.pipe == key,
            Blocking::Wait(wait) => wait.at.pipe == key,
            Blocking::None => false,
        };
        if blocked_here {
            self.blocking = Blocking::None;
        }
        pipe.reset_goals(cx);
        self.events.push(PipeEvent {
            kind,
            name: pipe.name().to_string(),
            id: pipe.id(),
        });
    }

    fn goal_mut(&mut self, goal: ActiveGoal) -> Option<&mut GoalInstance<W>> {
        self.arena
            .get_mut(goal.pipe)?
            .instruction_mut(goal.index)?
            .goal_mut()
    }

    fn execute_goal(&mut self, goal: ActiveGoal, cx: &mut GoalContext<'_, W>) -> Option<GoalStatus> {
        Some(self.goal_mut(goal)?.execute(cx))
    }

    fn reset_goal(&mut self, goal: ActiveGoal, cx: &mut ResetContext<'_, W>) {
        if let Some(op) = self.goal_mut(goal) {
            op.reset(cx);
        }
    }

    fn finish_goal(&mut self, goal: ActiveGoal, status: GoalStatus, cx: &mut ResetContext<'_, W>) {
        if let Some(outcome) = status.outcome() {
            if let Some(pipe) = self.arena.get_mut(goal.pipe) {
                pipe.set_last_result(Some(outcome));
            }
        }
        self.reset_goal(goal, cx);
    }

    fn check_depth(&mut self, config: &PipeConfig, agent: W::Agent) {
        let depth = self.arena.depth();
        if depth >= config.subpipe_warn_depth {
            if !self.depth_warned {
                warn!(agent = agent.stable_id(), depth, "subpipe nesting is suspiciously deep");
                self.depth_warned = true;
            }
        } else {
            self.depth_warned = false;
        }
    }

    fn check_goal_count(&mut self, config: &PipeConfig, agent: W::Agent) {
        let count = self.active.len();
        if count >= config.active_goal_cap {
            error!(
                agent = agent.stable_id(),
                count, "active goal list overflow, a non-blocking goal never finishes"
            );
            debug_assert!(
                count < config.active_goal_cap,
                "active goal list overflow ({count})"
            );
        } else if count >= config.active_goal_warn {
            if !self.goal_warned {
                warn!(agent = agent.stable_id(), count, "many active goals");
                self.goal_warned = true;
            }
        } else {
            self.goal_warned = false;
        }
    }
}
