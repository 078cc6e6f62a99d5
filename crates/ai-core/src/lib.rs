//! Deterministic, engine-agnostic kernel primitives for pipe-driven agents.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod config;
pub mod error;
pub mod handle;
pub mod math;
pub mod rng;
pub mod status;
pub mod tick;
pub mod world;

pub use agent::AgentId;
pub use config::{AiConfig, CoverConfig, NavConfig, PipeConfig};
pub use error::AiError;
pub use handle::{ObjectHandle, ObjectState, ObjectTable};
pub use math::Vec3;
pub use rng::{DeterministicRng, SplitMix64};
pub use status::{GoalOutcome, GoalStatus};
pub use tick::{TickContext, UpdateKind};
pub use world::WorldView;
