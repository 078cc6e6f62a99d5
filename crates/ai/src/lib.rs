//! Umbrella crate that re-exports the `ai-*` building blocks.
//!
//! This crate is intended as a convenient entrypoint for users and as a home for docs.rs guides.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "core")]
#[cfg_attr(docsrs, doc(cfg(feature = "core")))]
pub use ai_core as core;

#[cfg(feature = "nav")]
#[cfg_attr(docsrs, doc(cfg(feature = "nav")))]
pub use ai_nav as nav;

#[cfg(feature = "cover")]
#[cfg_attr(docsrs, doc(cfg(feature = "cover")))]
pub use ai_cover as cover;

#[cfg(feature = "pipe")]
#[cfg_attr(docsrs, doc(cfg(feature = "pipe")))]
pub use ai_pipe as pipe;

#[cfg(doc)]
pub mod guides {
    #![allow(clippy::all)]

    #[doc = include_str!("../../../docs/guides/goal-pipes.md")]
    pub mod goal_pipes {}

    #[doc = include_str!("../../../docs/guides/ai-tracing.md")]
    pub mod tracing {}
}
