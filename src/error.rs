use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Repository not found: {}", .0.display())]
    RepositoryNotFound(PathBuf),

    #[error("Branch '{branch}' does not exist in the repository {}", .repo.display())]
    BranchNotFound { branch: String, repo: PathBuf },

    #[error("Git command failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Malformed git output: {0}")]
    MalformedOutput(String),
}

impl Error {
    /// Stable external code for this error kind.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidQuery(_) => ErrorCode::InvalidQuery,
            Self::RepositoryNotFound(_) => ErrorCode::RepositoryNotFound,
            Self::BranchNotFound { .. } => ErrorCode::BranchNotFound,
            Self::ToolExecutionFailed(_) => ErrorCode::ToolExecutionFailed,
            Self::MalformedOutput(_) => ErrorCode::MalformedOutput,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidQuery,
    RepositoryNotFound,
    BranchNotFound,
    ToolExecutionFailed,
    MalformedOutput,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidQuery => "invalid_query",
            Self::RepositoryNotFound => "repository_not_found",
            Self::BranchNotFound => "branch_not_found",
            Self::ToolExecutionFailed => "tool_execution_failed",
            Self::MalformedOutput => "malformed_output",
        }
    }

    /// HTTP-style status a transport should answer with.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::InvalidQuery => 400,
            Self::RepositoryNotFound | Self::BranchNotFound => 404,
            Self::ToolExecutionFailed | Self::MalformedOutput => 500,
        }
    }

    /// Whether the caller, not the server, is at fault.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        self.status_code() < 500
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
