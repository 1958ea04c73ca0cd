use std::path::Path;
use tracing::{debug, instrument};

use crate::aggregate::{aggregate, Totals};
use crate::error::Result;
use crate::git::{
    branch_list_args, log_args, rev_list_count_args, shortlog_args, EngineConfig, Git, GitCli,
};
use crate::parser::{parse_branch_list, parse_count, parse_log, parse_shortlog};
use crate::types::{
    BranchList, CommitCount, CurrentBranch, QuerySpec, StatisticsResult, TopAuthors,
};

/// Runs statistics queries against local repositories. Holds no per-request
/// state, so one engine can serve concurrent requests. Every git process of
/// one operation shares a single deadline.
#[derive(Debug, Clone, Default)]
pub struct StatsEngine<G = GitCli> {
    git: G,
}

impl StatsEngine<GitCli> {
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            git: GitCli::new(config),
        }
    }
}

impl<G: Git + Clone> StatsEngine<G> {
    /// Creates an engine over any [`Git`] implementation.
    pub const fn with_git(git: G) -> Self {
        Self { git }
    }

    pub const fn git(&self) -> &G {
        &self.git
    }

    /// Computes commit, file, insertion and deletion totals for `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RepositoryNotFound`] or
    /// [`crate::Error::BranchNotFound`] for missing resources,
    /// [`crate::Error::ToolExecutionFailed`] if git fails and
    /// [`crate::Error::MalformedOutput`] if its output cannot be parsed.
    #[instrument(skip(self), fields(repo = %spec.repo_path.display(), branch = ?spec.branch))]
    pub fn compute_statistics(&self, spec: &QuerySpec) -> Result<StatisticsResult> {
        let git = self.git.begin_request();
        let repo = git.ensure_repository_root(&spec.repo_path)?;
        let resolved = git.resolve_branch(&repo, spec.branch.as_deref())?;

        let totals = match &resolved.revision {
            Some(revision) => {
                let output = run(&*git, &repo, &log_args(spec, revision))?;
                aggregate(parse_log(&output))?
            }
            None => {
                debug!("HEAD is unborn, nothing to aggregate");
                Totals::default()
            }
        };

        debug!(
            commits = totals.commit_count,
            files = totals.diff.files_changed,
            insertions = totals.diff.insertions,
            deletions = totals.diff.deletions,
            "Statistics computed"
        );

        Ok(StatisticsResult {
            commit_count: totals.commit_count,
            files_changed: totals.diff.files_changed,
            insertions: totals.diff.insertions,
            deletions: totals.diff.deletions,
            repo_path: repo,
            resolved_branch: resolved.name,
        })
    }

    /// Counts the commits reachable from `branch`, or from HEAD.
    ///
    /// # Errors
    ///
    /// Same kinds as [`Self::compute_statistics`].
    #[instrument(skip(self), fields(repo = %repo.display()))]
    pub fn commit_count(&self, repo: &Path, branch: Option<&str>) -> Result<CommitCount> {
        let git = self.git.begin_request();
        let repo = git.ensure_repository_root(repo)?;
        let resolved = git.resolve_branch(&repo, branch)?;

        let commit_count = match &resolved.revision {
            Some(revision) => {
                parse_count(&run(&*git, &repo, &rev_list_count_args(revision))?)?
            }
            None => 0,
        };

        Ok(CommitCount {
            commit_count,
            repo_path: repo,
            resolved_branch: resolved.name,
        })
    }

    /// Ranks authors by commit count within the filters of `spec`, keeping at
    /// most `limit`.
    ///
    /// # Errors
    ///
    /// Same kinds as [`Self::compute_statistics`].
    #[instrument(skip(self), fields(repo = %spec.repo_path.display(), branch = ?spec.branch))]
    pub fn top_authors(&self, spec: &QuerySpec, limit: usize) -> Result<TopAuthors> {
        let git = self.git.begin_request();
        let repo = git.ensure_repository_root(&spec.repo_path)?;
        let resolved = git.resolve_branch(&repo, spec.branch.as_deref())?;

        let mut authors = match &resolved.revision {
            Some(revision) => {
                parse_shortlog(&run(&*git, &repo, &shortlog_args(spec, revision))?)?
            }
            None => Vec::new(),
        };
        let total_authors = authors.len();
        authors.truncate(limit);

        debug!(total_authors, returned = authors.len(), "Top authors computed");

        Ok(TopAuthors {
            authors,
            total_authors,
            repo_path: repo,
            resolved_branch: resolved.name,
        })
    }

    /// Lists local branches along with the checked-out one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RepositoryNotFound`] or
    /// [`crate::Error::ToolExecutionFailed`].
    #[instrument(skip(self), fields(repo = %repo.display()))]
    pub fn branches(&self, repo: &Path) -> Result<BranchList> {
        let git = self.git.begin_request();
        let repo = git.ensure_repository_root(repo)?;
        let current = git.resolve_branch(&repo, None)?;
        let branches = parse_branch_list(&run(&*git, &repo, &branch_list_args())?);

        Ok(BranchList {
            branches,
            current: current.name,
            repo_path: repo,
        })
    }

    /// Reports the checked-out branch, `HEAD` when detached.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RepositoryNotFound`] or
    /// [`crate::Error::ToolExecutionFailed`].
    #[instrument(skip(self), fields(repo = %repo.display()))]
    pub fn current_branch(&self, repo: &Path) -> Result<CurrentBranch> {
        let git = self.git.begin_request();
        let repo = git.ensure_repository_root(repo)?;
        let current = git.resolve_branch(&repo, None)?;

        Ok(CurrentBranch {
            branch: current.name,
            repo_path: repo,
        })
    }
}

fn run(git: &impl Git, repo: &Path, args: &[String]) -> Result<String> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    git.run_git_command(repo, &args)
}
