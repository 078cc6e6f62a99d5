use crate::{rng, AgentId, SplitMix64};

/// Which flavour of update an agent receives this tick.
///
/// `Full` advances the pipe and runs every active goal. `Dry` is the cheap
/// in-between update: no pipe advancement, only steering-style maintenance on
/// goals that need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateKind {
    #[default]
    Full,
    Dry,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
    /// Simulation clock at the start of this tick.
    pub time_seconds: f64,
    pub seed: u64,
    pub kind: UpdateKind,
}

impl TickContext {
    pub fn new(tick: u64, dt_seconds: f32, time_seconds: f64, seed: u64) -> Self {
        Self {
            tick,
            dt_seconds,
            time_seconds,
            seed,
            kind: UpdateKind::Full,
        }
    }

    pub fn dry(mut self) -> Self {
        self.kind = UpdateKind::Dry;
        self
    }

    pub fn is_full(&self) -> bool {
        self.kind == UpdateKind::Full
    }

    /// A random stream unique to `(seed, agent, stream, tick)`.
    pub fn rng_for_agent<A: AgentId>(&self, agent: A, stream: u64) -> SplitMix64 {
        let seed = rng::derive_seed(self.seed ^ rng::mix64(self.tick), agent.stable_id(), stream);
        SplitMix64::new(seed)
    }
}
