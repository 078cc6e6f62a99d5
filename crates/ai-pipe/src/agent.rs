use std::rc::Rc;

use ai_core::{AgentId, AiConfig, CoverConfig, ObjectHandle, TickContext, UpdateKind};
use ai_cover::{gather_eyes, CoverUsagePoll, CoverUser, CoverWorldMut, RayInbox};
use ai_nav::{MovementRequest, NavEvent, NavWorldMut, NavWorldView};
use tracing::warn;

use crate::error::Result;
use crate::{
    AgentState, GoalContext, PipeEvent, PipeId, PipeLibrary, PipeSelection, PipeWorld,
    PipelineExecutor, ResetContext, Signal,
};

const PIPE_RNG_STREAM: u64 = 0x7069_7065;

/// A pipe-driven agent: executor, path state and cover state behind one
/// update call.
pub struct Agent<W: PipeWorld> {
    id: W::Agent,
    library: Rc<PipeLibrary<W>>,
    executor: PipelineExecutor<W>,
    state: AgentState,
    inbox: RayInbox,
}

impl<W: PipeWorld> Agent<W> {
    pub fn new(id: W::Agent, library: Rc<PipeLibrary<W>>) -> Self {
        let inbox = RayInbox::new();
        Self {
            id,
            library,
            executor: PipelineExecutor::new(),
            state: AgentState::new(inbox.reply()),
            inbox,
        }
    }

    pub fn id(&self) -> W::Agent {
        self.id
    }

    pub fn library(&self) -> &Rc<PipeLibrary<W>> {
        &self.library
    }

    pub fn executor(&self) -> &PipelineExecutor<W> {
        &self.executor
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    pub fn movement(&self) -> &MovementRequest {
        &self.state.path.movement
    }

    /// Run one tick. Ray completions that arrived since the last call are
    /// applied first; pipe changes requested by goals are applied last.
    pub fn update(&mut self, tick: &TickContext, config: &AiConfig, world: &mut W) {
        for completion in self.inbox.drain() {
            self.state.cover.on_ray_completion(&completion);
        }
        self.state.path.poll(world.navigation());

        if tick.is_full() {
            self.state.cover.update(tick.dt_seconds);
            self.check_cover(world, &config.cover);
        }

        let mut rng = tick.rng_for_agent(self.id, PIPE_RNG_STREAM);
        let mut cx = GoalContext {
            tick,
            config,
            agent: self.id,
            world: &mut *world,
            state: &mut self.state,
            rng: &mut rng,
        };
        match tick.kind {
            UpdateKind::Full => self.executor.update(&mut cx),
            UpdateKind::Dry => self.executor.update_dry(&mut cx),
        }

        for signal in self.state.cover.drain_signals() {
            self.state.send_signal(signal.name(), 0.0);
        }

        if let Some(selection) = self.state.pipe_request.take() {
            let name = selection.name.clone();
            if let Err(err) = self.select_pipe(world, selection) {
                warn!(
                    agent = self.id.stable_id(),
                    pipe = %name,
                    %err,
                    "delayed pipe selection failed"
                );
            }
        }
    }

    pub fn select_pipe(&mut self, world: &mut W, selection: PipeSelection) -> Result<bool> {
        let mut cx = ResetContext {
            agent: self.id,
            world,
            state: &mut self.state,
        };
        self.executor.select_pipe(&self.library, selection, &mut cx)
    }

    pub fn cancel_subpipe(&mut self, world: &mut W, id: PipeId) -> bool {
        let mut cx = ResetContext {
            agent: self.id,
            world,
            state: &mut self.state,
        };
        self.executor.cancel_subpipe(id, &mut cx)
    }

    pub fn remove_subpipe(&mut self, world: &mut W, id: PipeId, keep_inserted: bool) -> bool {
        let mut cx = ResetContext {
            agent: self.id,
            world,
            state: &mut self.state,
        };
        self.executor.remove_subpipe(id, keep_inserted, &mut cx)
    }

    pub fn clear_active_goals(&mut self, world: &mut W) {
        let mut cx = ResetContext {
            agent: self.id,
            world,
            state: &mut self.state,
        };
        self.executor.clear_active_goals(&mut cx);
    }

    pub fn is_using_pipe(&self, name: &str) -> bool {
        self.executor.is_using_pipe(name)
    }

    pub fn pause(&mut self, paused: bool) {
        self.executor.pause(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.executor.is_paused()
    }

    pub fn attention_target(&self) -> Option<ObjectHandle> {
        self.state.attention_target
    }

    /// Switching to a different object restarts the innermost pipe's
    /// target-moved tracking from the new target's position.
    pub fn set_attention_target(&mut self, world: &W, target: Option<ObjectHandle>) {
        if target.is_some() && target != self.state.attention_target {
            if let Some(pos) = target.and_then(|h| world.object(h)).map(|o| o.position) {
                self.executor.retarget(pos);
            }
        }
        self.state.attention_target = target;
    }

    /// Poll, or start, the cover usage query against the attention target.
    pub fn get_cover_usage_info(
        &mut self,
        world: &mut W,
        config: &AiConfig,
        now_seconds: f64,
    ) -> CoverUsagePoll {
        let target = self.state.attention_position(&*world);
        let surface = self
            .state
            .cover
            .cover_id()
            .and_then(|id| world.cover_surface(id));
        let pass_radius = self.state.path.follower().params().pass_radius;
        self.state.cover.cover_usage_info(
            target,
            surface.as_ref(),
            pass_radius,
            world.rays(),
            &self.state.ray_reply,
            now_seconds,
            &config.cover,
        )
    }

    pub fn cover(&self) -> &CoverUser {
        &self.state.cover
    }

    pub fn cover_mut(&mut self) -> &mut CoverUser {
        &mut self.state.cover
    }

    pub fn is_in_cover(&self) -> bool {
        self.state.cover.is_in_cover()
    }

    pub fn is_moving_to_cover(&self) -> bool {
        self.state.cover.is_moving_to_cover()
    }

    pub fn drain_events(&mut self) -> Vec<PipeEvent> {
        self.executor.drain_events()
    }

    pub fn drain_signals(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.state.signals)
    }

    pub fn drain_nav_events(&mut self) -> Vec<NavEvent> {
        std::mem::take(&mut self.state.nav_events)
    }

    /// Back to a freshly spawned state. Outstanding path and ray requests are
    /// cancelled with their services.
    pub fn reset(&mut self, world: &mut W) {
        let mut cx = ResetContext {
            agent: self.id,
            world: &mut *world,
            state: &mut self.state,
        };
        self.executor.reset(&mut cx);
        self.state.path.clear(world.navigation());
        self.state.cover.reset(world.rays());
        self.state.attention_target = None;
        self.state.last_op = None;
        self.state.last_cover_usage = None;
        self.state.signals.clear();
        self.state.nav_events.clear();
        self.state.pipe_request = None;
        self.inbox.drain();
    }

    /// Tear down, cancelling everything still in flight.
    pub fn despawn(mut self, world: &mut W) {
        self.reset(world);
    }

    fn check_cover(&mut self, world: &W, config: &CoverConfig) {
        let Some(surface) = self
            .state
            .cover
            .cover_id()
            .and_then(|id| world.cover_surface(id))
        else {
            return;
        };
        let Some(pos) = world.position(self.id) else {
            return;
        };
        let threat = self.state.attention_target.and_then(|h| world.object(h));
        let eyes = gather_eyes(threat, config);
        self.state.cover.check_compromised(pos, &eyes, &surface, config);
    }
}
