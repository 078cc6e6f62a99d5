use std::borrow::Cow;

use ai_core::{ObjectHandle, Vec3, WorldView};
use ai_cover::{CoverUser, CoverUsageInfo, CoverWorldMut, RayReply};
use ai_nav::{NavEvent, NavWorldMut, PathState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything the executor needs from the host world.
pub trait PipeWorld: NavWorldMut + CoverWorldMut {}

impl<T: NavWorldMut + CoverWorldMut> PipeWorld for T {}

/// Notification emitted by a goal, drained by the owner after each update.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    pub name: Cow<'static, str>,
    pub data: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SelectMode {
    /// Drop every running pipe and start this one.
    #[default]
    Replace,
    /// Push as a subpipe of the innermost running pipe.
    Insert,
}

/// Caller-assigned pipe id, used to cancel or query inserted subpipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipeId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct PipeSelection {
    pub name: String,
    pub mode: SelectMode,
    pub looping: bool,
    pub argument: Option<ObjectHandle>,
    pub id: Option<PipeId>,
    /// Restart even if a pipe of the same name is already running.
    pub reset_always: bool,
}

impl PipeSelection {
    /// Looping replacement of the whole pipe chain.
    pub fn replace(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: SelectMode::Replace,
            looping: true,
            argument: None,
            id: None,
            reset_always: false,
        }
    }

    /// One-shot subpipe pushed on top of the current one.
    pub fn insert(name: impl Into<String>) -> Self {
        Self {
            mode: SelectMode::Insert,
            looping: false,
            ..Self::replace(name)
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_id(mut self, id: PipeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_argument(mut self, argument: ObjectHandle) -> Self {
        self.argument = Some(argument);
        self
    }

    pub fn reset_always(mut self) -> Self {
        self.reset_always = true;
        self
    }
}

/// Per-agent state shared by every goal op.
#[derive(Debug)]
pub struct AgentState {
    pub attention_target: Option<ObjectHandle>,
    /// Object produced by the last goal that located something.
    pub last_op: Option<ObjectHandle>,
    pub path: PathState,
    pub cover: CoverUser,
    pub last_cover_usage: Option<CoverUsageInfo>,
    /// Maintained by the host's perception.
    pub sees_target: bool,
    pub attack_range: f32,
    pub(crate) signals: Vec<Signal>,
    pub(crate) nav_events: Vec<NavEvent>,
    pub(crate) ray_reply: RayReply,
    pub(crate) pipe_request: Option<PipeSelection>,
}

impl AgentState {
    pub fn new(ray_reply: RayReply) -> Self {
        Self {
            attention_target: None,
            last_op: None,
            path: PathState::default(),
            cover: CoverUser::new(),
            last_cover_usage: None,
            sees_target: false,
            attack_range: 10.0,
            signals: Vec::new(),
            nav_events: Vec::new(),
            ray_reply,
            pipe_request: None,
        }
    }

    pub fn attention_position<W: WorldView + ?Sized>(&self, world: &W) -> Option<Vec3> {
        self.attention_target
            .and_then(|h| world.object(h))
            .map(|o| o.position)
    }

    pub fn last_op_position<W: WorldView + ?Sized>(&self, world: &W) -> Option<Vec3> {
        self.last_op.and_then(|h| world.object(h)).map(|o| o.position)
    }

    pub fn ray_reply(&self) -> &RayReply {
        &self.ray_reply
    }

    pub fn send_signal(&mut self, name: impl Into<Cow<'static, str>>, data: f32) {
        self.signals.push(Signal {
            name: name.into(),
            data,
        });
    }

    /// Ask for a pipe change once the current update finishes. The last
    /// request of an update wins.
    pub fn request_pipe(&mut self, selection: PipeSelection) {
        self.pipe_request = Some(selection);
    }

    pub fn pending_pipe_request(&self) -> Option<&PipeSelection> {
        self.pipe_request.as_ref()
    }
}
