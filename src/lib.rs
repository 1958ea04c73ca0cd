pub use engine::StatsEngine;
pub use error::{Error, ErrorCode, Result};
pub use git::{EngineConfig, Git, GitCli, ResolvedRef};
pub use query::{Clock, FixedClock, RawQuery, SystemClock};
pub use response::Response;
pub use types::{
    AuthorCount, BranchList, CommitCount, CommitRecord, CurrentBranch, DiffStat, ParsedCommit,
    QuerySpec, StatisticsResult, TopAuthors,
};

use std::path::Path;

pub mod aggregate;
mod engine;
mod error;
pub mod git;
pub mod parser;
pub mod query;
pub mod response;
mod types;

/// Creates a `StatsEngine` that shells out to the git CLI.
#[must_use]
pub const fn new(config: EngineConfig) -> StatsEngine {
    StatsEngine::new(config)
}

/// Validates `raw`, computes its statistics and assembles the response.
///
/// Validation happens before any git process is started, and every failure
/// comes back as an error response rather than a Rust error.
pub fn handle_statistics<G: Git + Clone>(
    engine: &StatsEngine<G>,
    raw: &RawQuery,
    clock: &impl Clock,
) -> Response<response::StatisticsPayload> {
    match raw.build(clock) {
        Ok(spec) => response::statistics(&spec, engine.compute_statistics(&spec)),
        Err(err) => response::failure(&err),
    }
}

/// Ranks the authors matching `raw`, keeping at most `limit` (default 10).
pub fn handle_top_authors<G: Git + Clone>(
    engine: &StatsEngine<G>,
    raw: &RawQuery,
    limit: Option<usize>,
    clock: &impl Clock,
) -> Response<response::TopAuthorsPayload> {
    let validated = raw
        .build(clock)
        .and_then(|spec| query::validate_author_limit(limit).map(|limit| (spec, limit)));
    match validated {
        Ok((spec, limit)) => {
            response::top_authors(&spec, limit, engine.top_authors(&spec, limit))
        }
        Err(err) => response::failure(&err),
    }
}

/// Counts the commits reachable from `branch`, or from HEAD.
pub fn handle_commit_count<G: Git + Clone>(
    engine: &StatsEngine<G>,
    repo: &Path,
    branch: Option<&str>,
) -> Response<response::CommitCountPayload> {
    let branch = branch.map(str::trim).filter(|b| !b.is_empty());
    response::commit_count(engine.commit_count(&query::expand_home(repo), branch))
}

/// Lists the local branches of `repo`.
pub fn handle_branches<G: Git + Clone>(
    engine: &StatsEngine<G>,
    repo: &Path,
) -> Response<response::BranchesPayload> {
    response::branches(engine.branches(&query::expand_home(repo)))
}

/// Reports the checked-out branch of `repo`.
pub fn handle_current_branch<G: Git + Clone>(
    engine: &StatsEngine<G>,
    repo: &Path,
) -> Response<response::CurrentBranchPayload> {
    response::current_branch(engine.current_branch(&query::expand_home(repo)))
}
