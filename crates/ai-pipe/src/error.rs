use thiserror::Error;

/// Authoring-time errors: building templates, registering them and
/// selecting pipes by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipeError {
    #[error("unknown goal pipe `{0}`")]
    UnknownPipe(String),
    #[error("goal pipe `{0}` is already registered")]
    DuplicatePipe(String),
    #[error("goal pipe name must not be empty")]
    EmptyName,
    #[error("pipe `{pipe}`: jump to unknown label `{label}`")]
    UnknownLabel { pipe: String, label: String },
    #[error("pipe `{pipe}`: label `{label}` defined twice")]
    DuplicateLabel { pipe: String, label: String },
    #[error("unknown branch kind `{0}`")]
    UnknownBranch(String),
    #[error("unknown branch code {0}")]
    UnknownBranchCode(u32),
    #[error("branch `{kind}` needs a {expected} parameter")]
    BadBranchParam {
        kind: &'static str,
        expected: &'static str,
    },
    #[error("no goal pipe is running")]
    NoCurrentPipe,
}

pub type Result<T> = std::result::Result<T, PipeError>;
