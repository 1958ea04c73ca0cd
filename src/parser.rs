//! Parsers for the line-oriented output of the git queries issued by
//! [`crate::git`].
//!
//! The log parser is a single-pass iterator over captured text. It yields one
//! [`ParsedCommit`] per header line and stops for good after the first error,
//! so callers folding it with `?` never see a partial sequence succeed.

use chrono::NaiveDate;
use std::iter::Peekable;
use std::str::Lines;

use crate::error::{Error, Result};
use crate::git::{FIELD_SEPARATOR, RECORD_SEPARATOR};
use crate::types::{AuthorCount, CommitRecord, DiffStat, ParsedCommit};

/// Lazily parses `log --numstat` output produced with the header format of
/// [`crate::git::log_args`].
pub struct NumstatParser<'a> {
    lines: Peekable<Lines<'a>>,
    line_number: usize,
    failed: bool,
}

#[must_use]
pub fn parse_log(output: &str) -> NumstatParser<'_> {
    NumstatParser {
        lines: output.lines().peekable(),
        line_number: 0,
        failed: false,
    }
}

impl<'a> NumstatParser<'a> {
    fn next_line(&mut self) -> Option<&'a str> {
        self.line_number += 1;
        self.lines.next()
    }

    fn parse_commit(&mut self, header: &'a str) -> Result<ParsedCommit> {
        let record = parse_header(header, self.line_number)?;
        let mut stat = DiffStat::default();

        while let Some(line) = self.lines.peek() {
            if line.starts_with(RECORD_SEPARATOR) {
                break;
            }
            let Some(line) = self.next_line() else { break };
            if line.trim().is_empty() {
                continue;
            }
            let (insertions, deletions) = parse_numstat_line(line, self.line_number)?;
            stat.add_file(insertions, deletions);
        }

        Ok(ParsedCommit { record, stat })
    }
}

impl Iterator for NumstatParser<'_> {
    type Item = Result<ParsedCommit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let header = loop {
            let line = self.next_line()?;
            if !line.trim().is_empty() {
                break line;
            }
        };
        let parsed = self.parse_commit(header);
        self.failed = parsed.is_err();
        Some(parsed)
    }
}

fn parse_header(line: &str, line_number: usize) -> Result<CommitRecord> {
    let malformed = |reason: &str| {
        Error::MalformedOutput(format!("line {line_number}: {reason}: {line:?}"))
    };

    let body = line
        .strip_prefix(RECORD_SEPARATOR)
        .ok_or_else(|| malformed("expected a commit header"))?;
    let fields: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
    let [hash, author, date] = fields.as_slice() else {
        return Err(malformed("commit header must have hash, author and date"));
    };

    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed("invalid commit hash"));
    }
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| malformed("invalid commit date"))?;

    Ok(CommitRecord {
        hash: (*hash).to_string(),
        author: (*author).to_string(),
        date,
    })
}

/// Parses `<insertions>\t<deletions>\t<path>`. A `-` count marks a binary
/// file and comes back as `None`.
fn parse_numstat_line(line: &str, line_number: usize) -> Result<(Option<u64>, Option<u64>)> {
    let malformed = |reason: &str| {
        Error::MalformedOutput(format!("line {line_number}: {reason}: {line:?}"))
    };

    let mut parts = line.splitn(3, '\t');
    let (Some(insertions), Some(deletions), Some(path)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("numstat line must have insertions, deletions and path"));
    };
    if path.is_empty() {
        return Err(malformed("numstat line has an empty path"));
    }

    let count = |field: &str| -> Result<Option<u64>> {
        if field == "-" {
            return Ok(None);
        }
        field
            .parse::<u64>()
            .map(Some)
            .map_err(|_| malformed("numstat count is not a number"))
    };
    let insertions = count(insertions)?;
    let deletions = count(deletions)?;

    if insertions.is_none() || deletions.is_none() {
        Ok((None, None))
    } else {
        Ok((insertions, deletions))
    }
}

/// Parses `shortlog -sn` output into authors ordered by commit count, then
/// name.
///
/// # Errors
///
/// Returns [`Error::MalformedOutput`] for a line that is not `<count>\t<name>`.
pub fn parse_shortlog(output: &str) -> Result<Vec<AuthorCount>> {
    let mut authors = output
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let malformed = || {
                Error::MalformedOutput(format!(
                    "line {}: expected '<count>\\t<author>': {line:?}",
                    index + 1
                ))
            };
            let (count, name) = line.trim_start().split_once('\t').ok_or_else(malformed)?;
            let commit_count = count.trim().parse::<u64>().map_err(|_| malformed())?;
            let name = name.trim();
            if name.is_empty() {
                return Err(malformed());
            }
            Ok(AuthorCount {
                name: name.to_string(),
                commit_count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    authors.sort_by(|a, b| {
        b.commit_count
            .cmp(&a.commit_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(authors)
}

/// Parses the single number printed by `rev-list --count`.
///
/// # Errors
///
/// Returns [`Error::MalformedOutput`] if the output is not a number.
pub fn parse_count(output: &str) -> Result<u64> {
    let trimmed = output.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| Error::MalformedOutput(format!("expected a commit count, got {trimmed:?}")))
}

/// One branch name per non-empty line, sorted.
#[must_use]
pub fn parse_branch_list(output: &str) -> Vec<String> {
    let mut branches: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect();
    branches.sort();
    branches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_requires_three_fields() {
        let err = parse_header("\x1eabc123\x1farobel", 1).unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
    }

    #[test]
    fn header_rejects_non_hex_hash() {
        let err = parse_header("\x1enothex\x1farobel\x1f2025-01-01", 1).unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
    }

    #[test]
    fn numstat_dash_in_either_field_is_binary() {
        assert_eq!(parse_numstat_line("-\t-\tlogo.png", 1).unwrap(), (None, None));
        assert_eq!(parse_numstat_line("4\t-\tlogo.png", 1).unwrap(), (None, None));
    }

    #[test]
    fn numstat_keeps_tabs_in_path() {
        assert_eq!(
            parse_numstat_line("1\t2\tdir/a\tb.txt", 1).unwrap(),
            (Some(1), Some(2))
        );
    }

    #[test]
    fn shortlog_orders_by_count_then_name() {
        let authors = parse_shortlog("     2\tzed\n     5\tamy\n     2\tbob\n").unwrap();
        let names: Vec<&str> = authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["amy", "bob", "zed"]);
    }
}
