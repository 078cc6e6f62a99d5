use core::fmt::Debug;

/// Stable identifier for an agent driven by a pipe executor.
///
/// The id seeds per-agent random streams (random jumps, timeouts) and tags log
/// records, so it must not change over the agent's lifetime.
pub trait AgentId: Copy + Ord + Eq + Debug {
    fn stable_id(self) -> u64;
}

impl AgentId for u64 {
    fn stable_id(self) -> u64 {
        self
    }
}

impl AgentId for u32 {
    fn stable_id(self) -> u64 {
        u64::from(self)
    }
}
