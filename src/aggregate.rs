use crate::error::Result;
use crate::types::{DiffStat, ParsedCommit};

/// Numeric totals across a set of commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub commit_count: u64,
    pub diff: DiffStat,
}

impl Totals {
    fn add(mut self, commit: &ParsedCommit) -> Self {
        self.commit_count = self.commit_count.saturating_add(1);
        self.diff.files_changed = self
            .diff
            .files_changed
            .saturating_add(commit.stat.files_changed);
        self.diff.insertions = self.diff.insertions.saturating_add(commit.stat.insertions);
        self.diff.deletions = self.diff.deletions.saturating_add(commit.stat.deletions);
        self
    }
}

/// Sums parsed commits, saturating at `u64::MAX`. A path touched by several
/// commits is counted once per commit. The first parse error aborts the whole reduction.
///
/// # Errors
///
/// Returns the first error yielded by `commits`.
pub fn aggregate<I>(commits: I) -> Result<Totals>
where
    I: IntoIterator<Item = Result<ParsedCommit>>,
{
    commits
        .into_iter()
        .try_fold(Totals::default(), |totals, commit| Ok(totals.add(&commit?)))
}
