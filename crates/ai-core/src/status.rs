/// Result of executing a goal op for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GoalStatus {
    InProgress,
    /// Finished without a verdict; the op is reset and the pipe moves on.
    Done,
    Succeeded,
    Failed,
}

/// Verdict stored in a pipe's last-result slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GoalOutcome {
    Succeeded,
    Failed,
}

impl From<GoalOutcome> for GoalStatus {
    fn from(value: GoalOutcome) -> Self {
        match value {
            GoalOutcome::Succeeded => GoalStatus::Succeeded,
            GoalOutcome::Failed => GoalStatus::Failed,
        }
    }
}

impl GoalStatus {
    pub fn outcome(self) -> Option<GoalOutcome> {
        match self {
            GoalStatus::Succeeded => Some(GoalOutcome::Succeeded),
            GoalStatus::Failed => Some(GoalOutcome::Failed),
            GoalStatus::InProgress | GoalStatus::Done => None,
        }
    }

    pub fn is_in_progress(self) -> bool {
        self == GoalStatus::InProgress
    }
}
