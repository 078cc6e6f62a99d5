use std::borrow::Cow;

use ai_core::{CoverConfig, Vec3};
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    AsyncQueryTicket, AsyncState, CoverBlacklist, CoverSurface, CoverUsageInfo, ProbeSlot,
    RayCompletion, RayPriority, RayQueryService, RayReply, RayRequest,
};

/// Object types cover probes collide with.
pub const COVER_RAY_TYPES: u32 = 0b0110;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoverSignal {
    EnterCover,
    LeaveCover,
    MovingToCover,
    CoverCompromised,
}

impl CoverSignal {
    pub fn name(self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            CoverSignal::EnterCover => "OnEnterCover",
            CoverSignal::LeaveCover => "OnLeaveCover",
            CoverSignal::MovingToCover => "OnMovingToCover",
            CoverSignal::CoverCompromised => "OnCoverCompromised",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverUsagePoll {
    InProgress,
    Complete(CoverUsageInfo),
}

impl CoverUsagePoll {
    pub fn state(&self) -> AsyncState {
        match self {
            CoverUsagePoll::InProgress => AsyncState::InProgress,
            CoverUsagePoll::Complete(_) => AsyncState::Complete,
        }
    }
}

/// Per-agent cover bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverUser {
    cover_id: Option<CoverId>,
    in_cover: bool,
    moving_to_cover: bool,
    moving_in_cover: bool,
    compromised: bool,
    blacklist: CoverBlacklist,
    usage: AsyncQueryTicket,
    partial: CoverUsageInfo,
    signals: Vec<CoverSignal>,
}

impl Default for CoverUser {
    fn default() -> Self {
        Self {
            cover_id: None,
            in_cover: false,
            moving_to_cover: false,
            moving_in_cover: false,
            compromised: false,
            blacklist: CoverBlacklist::new(),
            usage: AsyncQueryTicket::new(ProbeSlot::ALL.len()),
            partial: CoverUsageInfo::no_cover(),
            signals: Vec::new(),
        }
    }
}

impl CoverUser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cover_id(&self) -> Option<CoverId> {
        self.cover_id
    }

    /// Switching to a different cover clears the compromised flag.
    pub fn set_cover_id(&mut self, id: Option<CoverId>) {
        if self.cover_id != id {
            self.compromised = false;
        }
        self.cover_id = id;
    }

    pub fn is_in_cover(&self) -> bool {
        self.in_cover
    }

    pub fn set_in_cover(&mut self, in_cover: bool) {
        if self.in_cover == in_cover {
            return;
        }
        self.in_cover = in_cover;
        if in_cover {
            self.moving_to_cover = false;
            self.signals.push(CoverSignal::EnterCover);
        } else {
            self.moving_in_cover = false;
            self.signals.push(CoverSignal::LeaveCover);
        }
    }

    pub fn is_moving_to_cover(&self) -> bool {
        self.moving_to_cover
    }

    pub fn set_moving_to_cover(&mut self, moving: bool) {
        if moving && !self.moving_to_cover {
            self.signals.push(CoverSignal::MovingToCover);
        }
        self.moving_to_cover = moving;
    }

    pub fn is_moving_in_cover(&self) -> bool {
        self.moving_in_cover
    }

    pub fn set_moving_in_cover(&mut self, moving: bool) {
        self.moving_in_cover = moving;
    }

    pub fn is_compromised(&self) -> bool {
        self.compromised
    }

    /// In cover, or moving to cover and within `threshold` of it.
    pub fn is_taking_cover(&self, distance_to_cover: f32, threshold: f32) -> bool {
        self.in_cover || (self.moving_to_cover && distance_to_cover <= threshold)
    }

    /// Blacklist the current cover, leave it and forget it.
    pub fn set_compromised(&mut self, config: &CoverConfig) {
        if let Some(id) = self.cover_id {
            debug!(cover = id.0, "cover compromised");
            self.blacklist.set(id, true, config.blacklist_seconds);
        }
        self.compromised = true;
        self.set_in_cover(false);
        self.moving_to_cover = false;
        self.signals.push(CoverSignal::CoverCompromised);
        self.cover_id = None;
    }

    /// Mark the current cover compromised if any eye can see the protected
    /// side, or if the agent drifted away from it while in cover.
    pub fn check_compromised(
        &mut self,
        agent_pos: Vec3,
        eyes: &[Vec3],
        surface: &CoverSurface,
        config: &CoverConfig,
    ) -> bool {
        if self.compromised || !(self.in_cover || self.moving_to_cover) {
            return false;
        }
        let exposed = eyes
            .iter()
            .any(|eye| (*eye - surface.location).flat().dot(surface.normal.flat()) >= 0.0);
        let drifted = self.in_cover
            && agent_pos.distance_2d(surface.location) > config.in_cover_radius;
        if exposed || drifted {
            self.set_compromised(config);
            return true;
        }
        false
    }

    pub fn blacklist(&self) -> &CoverBlacklist {
        &self.blacklist
    }

    pub fn is_blacklisted(&self, id: CoverId) -> bool {
        self.blacklist.contains(id)
    }

    pub fn set_blacklisted(&mut self, id: CoverId, blacklist: bool, seconds: f32) {
        self.blacklist.set(id, blacklist, seconds);
    }

    pub fn reset_blacklist(&mut self) {
        self.blacklist.clear();
    }

    /// Per-tick timer maintenance.
    pub fn update(&mut self, dt_seconds: f32) {
        self.blacklist.update(dt_seconds);
    }

    pub fn usage_state(&self) -> AsyncState {
        self.usage.state()
    }

    /// Poll, or start, the cover usage query against `target`.
    ///
    /// A complete result is returned once and the query goes back to ready.
    /// Without a target or a cover surface the answer is immediate and no ray
    /// is queued.
    #[allow(clippy::too_many_arguments)]
    pub fn cover_usage_info(
        &mut self,
        target: Option<Vec3>,
        surface: Option<&CoverSurface>,
        pass_radius: f32,
        rays: &mut dyn RayQueryService,
        reply: &RayReply,
        now_seconds: f64,
        config: &CoverConfig,
    ) -> CoverUsagePoll {
        match self.usage.state() {
            AsyncState::Complete => return CoverUsagePoll::Complete(self.take_usage()),
            AsyncState::InProgress => {
                if let Some(timeout) = config.ray_timeout_seconds {
                    if self.usage.expire(now_seconds, timeout, rays) {
                        return CoverUsagePoll::Complete(self.take_usage());
                    }
                }
                return CoverUsagePoll::InProgress;
            }
            AsyncState::Ready => {}
        }

        let (Some(target), Some(surface)) = (target, surface) else {
            return CoverUsagePoll::Complete(CoverUsageInfo::no_cover());
        };

        self.partial = CoverUsageInfo {
            low_compromised: surface.low.map_or(true, |s| s.compromised),
            high_compromised: surface.high.map_or(true, |s| s.compromised),
            ..CoverUsageInfo::no_cover()
        };

        self.usage.begin(now_seconds);
        for probe in surface.probes(pass_radius, config) {
            let mut direction = target - probe.origin;
            if direction.length_2d() > config.probe_length {
                direction = direction.normalize_or_zero() * config.probe_length;
            }
            let request = RayRequest {
                origin: probe.origin,
                direction,
                type_mask: COVER_RAY_TYPES,
            };
            self.usage.queue(
                probe.slot.index(),
                rays,
                RayPriority::High,
                request,
                reply.clone(),
            );
        }
        self.usage.seal();

        if self.usage.state() == AsyncState::Complete {
            return CoverUsagePoll::Complete(self.take_usage());
        }
        CoverUsagePoll::InProgress
    }

    /// Feed a drained ray completion. Returns whether it belonged to the
    /// current batch.
    pub fn on_ray_completion(&mut self, completion: &RayCompletion) -> bool {
        let accepted = self.usage.complete(completion);
        if !accepted {
            warn!(ray = completion.id.0, "ignoring stale ray completion");
        }
        accepted
    }

    pub fn cancel_queries(&mut self, rays: &mut dyn RayQueryService) {
        self.usage.cancel(rays);
    }

    pub fn drain_signals(&mut self) -> Vec<CoverSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Forget everything, cancelling outstanding rays.
    pub fn reset(&mut self, rays: &mut dyn RayQueryService) {
        self.cancel_queries(rays);
        *self = Self::default();
    }

    fn take_usage(&mut self) -> CoverUsageInfo {
        let mut info = self.partial;
        if let Some(results) = self.usage.take() {
            for slot in ProbeSlot::ALL {
                let hit = results
                    .get(slot.index())
                    .copied()
                    .flatten()
                    .is_some_and(|h| h.is_hit());
                info.set(slot, hit);
            }
        }
        self.partial = CoverUsageInfo::no_cover();
        info
    }
}
