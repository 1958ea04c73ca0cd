//! Response payloads handed to the transport.
//!
//! This is the only place where [`Error`] is translated into the external
//! contract: a stable [`ErrorCode`], a message and a status code.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::{error, warn};

use crate::error::{Error, ErrorCode, Result};
use crate::types::{
    AuthorCount, BranchList, CommitCount, CurrentBranch, QuerySpec, StatisticsResult, TopAuthors,
};

/// Either a success payload or an error body; serializes as the bare inner
/// object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response<T> {
    Success(T),
    Failure(ErrorBody),
}

impl<T> Response<T> {
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Failure(body) => body.error.code.status_code(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsPayload {
    pub commit_statistics: CommitStatistics,
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitStatistics {
    pub files: u64,
    pub insertions: u64,
    pub deletions: u64,
    pub commits: u64,
    pub author: Option<String>,
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitCountPayload {
    pub commit_count: u64,
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopAuthorsPayload {
    pub top_authors: Vec<AuthorCount>,
    pub total_authors: usize,
    pub limit: usize,
    pub repo: String,
    pub branch: String,
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchesPayload {
    pub branches: Vec<String>,
    pub branch: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentBranchPayload {
    pub branch: String,
    pub repo: String,
}

/// Builds the error response for `err`.
#[must_use]
pub fn failure<T>(err: &Error) -> Response<T> {
    let code = err.code();
    match err {
        Error::MalformedOutput(_) => {
            error!(code = %code, error = %err, "Git output did not match the expected format");
        }
        Error::ToolExecutionFailed(_) => warn!(code = %code, error = %err, "Git execution failed"),
        _ => tracing::debug!(code = %code, error = %err, "Request rejected"),
    }
    Response::Failure(ErrorBody {
        error: ErrorDetail {
            code,
            message: err.to_string(),
        },
    })
}

fn assemble<R, T>(result: Result<R>, payload: impl FnOnce(R) -> T) -> Response<T> {
    match result {
        Ok(value) => Response::Success(payload(value)),
        Err(err) => failure(&err),
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[must_use]
pub fn statistics(
    spec: &QuerySpec,
    result: Result<StatisticsResult>,
) -> Response<StatisticsPayload> {
    assemble(result, |stats| StatisticsPayload {
        commit_statistics: CommitStatistics {
            files: stats.files_changed,
            insertions: stats.insertions,
            deletions: stats.deletions,
            commits: stats.commit_count,
            author: spec.author.clone(),
            after: spec.after,
            before: spec.before,
        },
        repo: display(&stats.repo_path),
        branch: stats.resolved_branch,
    })
}

#[must_use]
pub fn commit_count(result: Result<CommitCount>) -> Response<CommitCountPayload> {
    assemble(result, |count| CommitCountPayload {
        commit_count: count.commit_count,
        repo: display(&count.repo_path),
        branch: count.resolved_branch,
    })
}

#[must_use]
pub fn top_authors(
    spec: &QuerySpec,
    limit: usize,
    result: Result<TopAuthors>,
) -> Response<TopAuthorsPayload> {
    assemble(result, |top| TopAuthorsPayload {
        top_authors: top.authors,
        total_authors: top.total_authors,
        limit,
        repo: display(&top.repo_path),
        branch: top.resolved_branch,
        after: spec.after,
        before: spec.before,
    })
}

#[must_use]
pub fn branches(result: Result<BranchList>) -> Response<BranchesPayload> {
    assemble(result, |list| BranchesPayload {
        branches: list.branches,
        branch: list.current,
        repo: display(&list.repo_path),
    })
}

#[must_use]
pub fn current_branch(result: Result<CurrentBranch>) -> Response<CurrentBranchPayload> {
    assemble(result, |current| CurrentBranchPayload {
        branch: current.branch,
        repo: display(&current.repo_path),
    })
}
