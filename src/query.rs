use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::QuerySpec;

/// Keyword accepted in place of a calendar date.
pub const TODAY: &str = "today";

pub const DEFAULT_AUTHOR_LIMIT: usize = 10;
pub const MAX_AUTHOR_LIMIT: usize = 100;

/// Source of the current calendar date.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Reads the local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Unvalidated filter parameters as they arrive from a transport.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pub repo: PathBuf,
    pub branch: Option<String>,
    pub author: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl RawQuery {
    #[must_use]
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    pub fn after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }

    #[must_use]
    pub fn before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }

    /// Validates the parameters into a [`QuerySpec`], resolving `today`
    /// against `clock` exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] when a date does not parse or when
    /// `after` is later than `before`.
    #[instrument(skip(clock))]
    pub fn build(&self, clock: &impl Clock) -> Result<QuerySpec> {
        let today = clock.today();
        let after = parse_date(self.after.as_deref(), today, "after")?;
        let before = parse_date(self.before.as_deref(), today, "before")?;

        if let (Some(after), Some(before)) = (after, before) {
            if after > before {
                return Err(Error::InvalidQuery(format!(
                    "'after' ({after}) is later than 'before' ({before})"
                )));
            }
        }

        let spec = QuerySpec {
            repo_path: expand_home(&self.repo),
            branch: non_empty(self.branch.as_deref()),
            author: non_empty(self.author.as_deref()),
            after,
            before,
        };
        debug!(spec = ?spec, "Query validated");
        Ok(spec)
    }
}

/// Checks the requested number of top authors.
///
/// # Errors
///
/// Returns [`Error::InvalidQuery`] when the limit is outside `1..=100`.
pub fn validate_author_limit(limit: Option<usize>) -> Result<usize> {
    let limit = limit.unwrap_or(DEFAULT_AUTHOR_LIMIT);
    if (1..=MAX_AUTHOR_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(Error::InvalidQuery(format!(
            "limit must be between 1 and {MAX_AUTHOR_LIMIT}, got {limit}"
        )))
    }
}

fn parse_date(value: Option<&str>, today: NaiveDate, field: &str) -> Result<Option<NaiveDate>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.eq_ignore_ascii_case(TODAY) {
        return Ok(Some(today));
    }
    let invalid = || {
        Error::InvalidQuery(format!(
            "'{field}' must be an ISO date (YYYY-MM-DD) or '{TODAY}', got '{value}'"
        ))
    };
    // chrono alone also takes unpadded fields such as 2025-1-1
    if !is_iso_date_shape(value) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| invalid())
}

fn is_iso_date_shape(value: &str) -> bool {
    value.len() == 10
        && value.bytes().enumerate().all(|(index, byte)| match index {
            4 | 7 => byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Resolves a leading `~` against `HOME`.
pub(crate) fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => std::env::var_os("HOME").map_or_else(
            || path.to_path_buf(),
            |home| PathBuf::from(home).join(rest),
        ),
        Err(_) => path.to_path_buf(),
    }
}
