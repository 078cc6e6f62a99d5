//! Cover bookkeeping, blacklisting and asynchronous ray-query tickets.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod blacklist;
pub mod eyes;
pub mod query;
pub mod ticket;
pub mod usage;
pub mod user;
pub mod world;

pub use blacklist::CoverBlacklist;
pub use eyes::gather_eyes;
pub use query::{
    QueuedRayId, RayCompletion, RayHit, RayInbox, RayPriority, RayQueryService, RayReply,
    RayRequest,
};
pub use ticket::{AsyncQueryTicket, AsyncState};
pub use usage::{CoverProbe, CoverSpan, CoverSurface, CoverUsageInfo, ProbeSlot};
pub use user::{CoverId, CoverSignal, CoverUsagePoll, CoverUser};
pub use world::CoverWorldMut;
