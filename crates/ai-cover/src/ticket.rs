use std::mem;

use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{QueuedRayId, RayCompletion, RayHit, RayPriority, RayQueryService, RayReply, RayRequest};

/// Lifecycle of an asynchronous query batch.
///
/// `Ready -> InProgress -> Complete -> Ready`. The result of a complete
/// batch is handed out exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AsyncState {
    #[default]
    Ready,
    InProgress,
    Complete,
}

/// One batch of rays, one logical slot per ray.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncQueryTicket {
    state: AsyncState,
    slots: Vec<Option<QueuedRayId>>,
    results: Vec<Option<RayHit>>,
    pending: usize,
    started_at: f64,
}

impl AsyncQueryTicket {
    pub fn new(slot_count: usize) -> Self {
        Self {
            state: AsyncState::Ready,
            slots: vec![None; slot_count],
            results: vec![None; slot_count],
            pending: 0,
            started_at: 0.0,
        }
    }

    pub fn state(&self) -> AsyncState {
        self.state
    }

    /// Rays queued and not yet answered.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_outstanding(&self, id: QueuedRayId) -> bool {
        self.slots.contains(&Some(id))
    }

    /// Start a batch. Only valid from `Ready`.
    pub fn begin(&mut self, now_seconds: f64) -> bool {
        if self.state != AsyncState::Ready {
            return false;
        }
        self.slots.iter_mut().for_each(|s| *s = None);
        self.results.iter_mut().for_each(|r| *r = None);
        self.pending = 0;
        self.started_at = now_seconds;
        self.state = AsyncState::InProgress;
        true
    }

    pub fn queue(
        &mut self,
        slot: usize,
        rays: &mut dyn RayQueryService,
        priority: RayPriority,
        request: RayRequest,
        reply: RayReply,
    ) -> Option<QueuedRayId> {
        if self.state != AsyncState::InProgress || slot >= self.slots.len() || self.slots[slot].is_some()
        {
            return None;
        }
        let id = rays.queue(priority, request, reply);
        self.slots[slot] = Some(id);
        self.pending += 1;
        Some(id)
    }

    /// Close the batch for queueing. A batch with nothing queued completes
    /// immediately.
    pub fn seal(&mut self) {
        if self.state == AsyncState::InProgress && self.pending == 0 {
            self.state = AsyncState::Complete;
        }
    }

    /// Record a completion. Unknown or stale ids are ignored.
    pub fn complete(&mut self, completion: &RayCompletion) -> bool {
        if self.state != AsyncState::InProgress {
            return false;
        }
        let Some(slot) = self.slots.iter().position(|s| *s == Some(completion.id)) else {
            return false;
        };
        self.slots[slot] = None;
        self.results[slot] = Some(completion.hit);
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.state = AsyncState::Complete;
        }
        true
    }

    /// Hand out the result of a complete batch and return to `Ready`.
    /// Slots that never answered are `None`.
    pub fn take(&mut self) -> Option<Vec<Option<RayHit>>> {
        if self.state != AsyncState::Complete {
            return None;
        }
        self.state = AsyncState::Ready;
        let len = self.results.len();
        Some(mem::replace(&mut self.results, vec![None; len]))
    }

    /// Abandon a batch that has been in flight for `timeout_seconds` or
    /// longer. Unanswered slots stay `None`.
    pub fn expire(
        &mut self,
        now_seconds: f64,
        timeout_seconds: f32,
        rays: &mut dyn RayQueryService,
    ) -> bool {
        if self.state != AsyncState::InProgress
            || now_seconds - self.started_at < f64::from(timeout_seconds)
        {
            return false;
        }
        warn!(
            pending = self.pending,
            waited = now_seconds - self.started_at,
            "ray batch timed out"
        );
        self.cancel_outstanding(rays);
        self.state = AsyncState::Complete;
        true
    }

    /// Cancel everything in flight and drop any unread result.
    pub fn cancel(&mut self, rays: &mut dyn RayQueryService) {
        self.cancel_outstanding(rays);
        self.results.iter_mut().for_each(|r| *r = None);
        self.state = AsyncState::Ready;
    }

    fn cancel_outstanding(&mut self, rays: &mut dyn RayQueryService) {
        for id in self.slots.iter_mut().filter_map(Option::take) {
            rays.cancel(id);
        }
        self.pending = 0;
    }
}
