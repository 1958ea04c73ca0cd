use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

/// Validated filter describing which commits to include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub repo_path: PathBuf,
    pub branch: Option<String>,
    pub author: Option<String>,
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
}

impl DiffStat {
    /// Adds one numstat line. `None` counts mark a binary file.
    pub fn add_file(&mut self, insertions: Option<u64>, deletions: Option<u64>) {
        self.files_changed = self.files_changed.saturating_add(1);
        self.insertions = self.insertions.saturating_add(insertions.unwrap_or(0));
        self.deletions = self.deletions.saturating_add(deletions.unwrap_or(0));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommit {
    pub record: CommitRecord,
    pub stat: DiffStat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsResult {
    pub commit_count: u64,
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
    pub repo_path: PathBuf,
    pub resolved_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCount {
    pub name: String,
    pub commit_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCount {
    pub commit_count: u64,
    pub repo_path: PathBuf,
    pub resolved_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopAuthors {
    /// Authors kept after applying the limit.
    pub authors: Vec<AuthorCount>,
    /// Distinct authors before the limit.
    pub total_authors: usize,
    pub repo_path: PathBuf,
    pub resolved_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchList {
    pub branches: Vec<String>,
    pub current: String,
    pub repo_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentBranch {
    pub branch: String,
    pub repo_path: PathBuf,
}
