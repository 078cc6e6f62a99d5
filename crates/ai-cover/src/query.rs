//! Ray world-query protocol.
//!
//! Completions may be produced on any thread. They are posted to the owning
//! agent's [`RayInbox`] and only read back on the simulation thread.

use ai_core::{ObjectHandle, Vec3};
use tokio::sync::mpsc;
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Issued by the query service; unique for the service's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueuedRayId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RayPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RayRequest {
    pub origin: Vec3,
    /// Direction scaled to the ray length.
    pub direction: Vec3,
    pub type_mask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RayHit {
    pub hit_count: u32,
    pub hit_distance: f32,
    pub collider: Option<ObjectHandle>,
}

impl RayHit {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn is_hit(&self) -> bool {
        self.hit_count != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCompletion {
    pub id: QueuedRayId,
    pub hit: RayHit,
}

/// Sending half handed to the query service with every queued ray.
#[derive(Debug, Clone)]
pub struct RayReply {
    tx: mpsc::UnboundedSender<RayCompletion>,
}

impl RayReply {
    /// Post a completion. Returns `false` when the owning agent is gone.
    pub fn complete(&self, id: QueuedRayId, hit: RayHit) -> bool {
        self.tx.send(RayCompletion { id, hit }).is_ok()
    }
}

/// Per-agent completion inbox, drained at the start of each update.
#[derive(Debug)]
pub struct RayInbox {
    tx: mpsc::UnboundedSender<RayCompletion>,
    rx: mpsc::UnboundedReceiver<RayCompletion>,
}

impl Default for RayInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl RayInbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn reply(&self) -> RayReply {
        RayReply {
            tx: self.tx.clone(),
        }
    }

    pub fn drain(&mut self) -> Vec<RayCompletion> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(completion) => out.push(completion),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    warn!("ray inbox disconnected");
                    break;
                }
            }
        }
        out
    }
}

/// Asynchronous ray caster provided by the world.
pub trait RayQueryService {
    fn queue(&mut self, priority: RayPriority, request: RayRequest, reply: RayReply) -> QueuedRayId;

    /// After cancellation the service must not complete `id`; a completion
    /// that races the cancel is ignored by the ticket.
    fn cancel(&mut self, id: QueuedRayId);
}
