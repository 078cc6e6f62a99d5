//! Goal-pipe interpreter: instructions, branches, the per-agent pipeline
//! executor and the agent that ties it to navigation and cover state.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod arena;
pub mod branch;
pub mod error;
pub mod executor;
pub mod goal_pipe;
pub mod instruction;
pub mod library;
pub mod ops;
pub mod state;

pub use agent::Agent;
pub use arena::{PipeArena, PipeKey};
pub use branch::{evaluate, BranchCondition, BranchEnv, BranchKind, BranchOutcome};
pub use error::PipeError;
pub use executor::{ActiveGoal, PipeEvent, PipeEventKind, PipeSnapshot, PipelineExecutor};
pub use goal_pipe::{GoalPipe, PopResult};
pub use instruction::{Instruction, InstructionKind, WaitMode};
pub use library::{JumpTarget, PipeBuilder, PipeLibrary, PipeTemplate};
pub use ops::{
    CoverUsageOp, CustomGoal, CustomGoalFactory, GoalContext, GoalInstance, GoalOp,
    GoalOpSnapshot, GoalSpec, PathFindOp, PathTarget, ResetContext, SignalOp, TimeoutOp,
};
pub use state::{AgentState, PipeId, PipeSelection, PipeWorld, SelectMode, Signal};
