use chrono::NaiveDate;
use git_stats::aggregate::aggregate;
use git_stats::parser::parse_log;
use git_stats::{
    self, CommitRecord, DiffStat, Error, FixedClock, Git, ParsedCommit, RawQuery, Result,
    StatsEngine,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// In-memory git that answers the engine's ref and root checks and returns
/// canned command output, recording every invocation.
#[derive(Clone)]
struct FakeGit {
    output: String,
    refs: Vec<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl FakeGit {
    fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            refs: vec!["HEAD", "refs/heads/main"],
            calls: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Git for FakeGit {
    fn run_git_command(&self, _repo: &Path, args: &[&str]) -> Result<String> {
        self.calls.borrow_mut().push(args.join(" "));
        Ok(self.output.clone())
    }

    fn probe_git_command(&self, repo: &Path, args: &[&str]) -> Result<Option<String>> {
        self.calls.borrow_mut().push(args.join(" "));
        match args {
            ["rev-parse", "--show-toplevel"] => Ok(Some(format!("{}\n", repo.display()))),
            ["symbolic-ref", ..] => Ok(Some("main\n".to_string())),
            ["show-ref", "--verify", "--quiet", reference] => Ok(self
                .refs
                .iter()
                .any(|known| known == reference)
                .then(String::new)),
            ["rev-parse", "--verify", "--quiet", spec] => {
                let reference = spec.trim_end_matches("^{commit}");
                Ok(self
                    .refs
                    .iter()
                    .any(|known| *known == reference)
                    .then(|| "abc\n".to_string()))
            }
            _ => Ok(None),
        }
    }
}

fn repo_dir() -> PathBuf {
    std::env::temp_dir()
        .canonicalize()
        .expect("temp dir should canonicalize")
}

fn clock() -> FixedClock {
    FixedClock(NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date"))
}

fn header(index: usize, author: &str, date: &str) -> String {
    format!("\x1e{:040x}\x1f{author}\x1f{date}\n", index + 1)
}

/// Three commits whose numstat lines add up to 116 files, 2166 insertions and
/// 658 deletions.
fn three_commit_output() -> String {
    let mut output = String::new();
    let mut file = 0;
    for (index, files) in [40, 40, 36].into_iter().enumerate() {
        output.push_str(&header(index, "arobel", &format!("2025-0{}-15", index + 2)));
        output.push('\n');
        for _ in 0..files {
            let (insertions, deletions) = if file < 78 { (19, 6) } else { (18, 5) };
            output.push_str(&format!("{insertions}\t{deletions}\tsrc/file{file}.rs\n"));
            file += 1;
        }
    }
    output
}

#[test]
fn test_scenario_three_commits_by_author() {
    let engine = StatsEngine::with_git(FakeGit::new(three_commit_output()));
    let query = RawQuery::new(repo_dir())
        .branch("main")
        .author("arobel")
        .after("2025-01-01")
        .before("today");

    let spec = query.build(&clock()).expect("query should validate");
    let result = engine
        .compute_statistics(&spec)
        .expect("statistics should compute");

    assert_eq!(result.commit_count, 3);
    assert_eq!(result.files_changed, 116);
    assert_eq!(result.insertions, 2166);
    assert_eq!(result.deletions, 658);
    assert_eq!(result.resolved_branch, "main");
    assert_eq!(result.repo_path, repo_dir());

    let log_call = engine
        .git()
        .calls()
        .into_iter()
        .find(|call| call.starts_with("log "))
        .expect("log should run");
    assert!(log_call.contains("--author=arobel"));
    assert!(log_call.contains("--since=2025-01-01 00:00:00"));
    assert!(log_call.contains("--until=2025-06-30 23:59:59"));
    assert!(log_call.ends_with("refs/heads/main --"));
}

#[test]
fn test_scenario_payload_shape() {
    let engine = StatsEngine::with_git(FakeGit::new(three_commit_output()));
    let query = RawQuery::new(repo_dir())
        .branch("main")
        .author("arobel")
        .after("2025-01-01")
        .before("today");

    let response = git_stats::handle_statistics(&engine, &query, &clock());
    assert_eq!(response.status_code(), 200);

    let json = serde_json::to_value(&response).expect("response should serialize");
    assert_eq!(json["commit_statistics"]["files"], 116);
    assert_eq!(json["commit_statistics"]["insertions"], 2166);
    assert_eq!(json["commit_statistics"]["deletions"], 658);
    assert_eq!(json["commit_statistics"]["commits"], 3);
    assert_eq!(json["commit_statistics"]["author"], "arobel");
    assert_eq!(json["commit_statistics"]["before"], "2025-06-30");
    assert_eq!(json["branch"], "main");
    assert_eq!(json["repo"], repo_dir().display().to_string());
}

#[test]
fn test_invalid_range_never_invokes_git() {
    let engine = StatsEngine::with_git(FakeGit::new(three_commit_output()));
    let query = RawQuery::new(repo_dir())
        .after("2025-07-01")
        .before("2025-01-01");

    let response = git_stats::handle_statistics(&engine, &query, &clock());

    assert_eq!(response.status_code(), 400);
    let json = serde_json::to_value(&response).expect("response should serialize");
    assert_eq!(json["error"]["code"], "invalid_query");
    assert!(engine.git().calls().is_empty());
}

#[test]
fn test_unparseable_date_never_invokes_git() {
    let engine = StatsEngine::with_git(FakeGit::new(""));
    let query = RawQuery::new(repo_dir()).after("1 week ago");

    let response = git_stats::handle_statistics(&engine, &query, &clock());

    assert_eq!(response.status_code(), 400);
    assert!(engine.git().calls().is_empty());
}

#[test]
fn test_missing_branch_fails_before_log() {
    let engine = StatsEngine::with_git(FakeGit::new(three_commit_output()));
    let spec = RawQuery::new(repo_dir())
        .branch("release")
        .build(&clock())
        .expect("query should validate");

    let err = engine.compute_statistics(&spec).unwrap_err();

    assert!(matches!(err, Error::BranchNotFound { ref branch, .. } if branch == "release"));
    assert!(!engine.git().calls().iter().any(|call| call.starts_with("log ")));
}

#[test]
fn test_revision_expressions_are_not_branches() {
    for branch in ["main~1", "main^", "main@{0}"] {
        let engine = StatsEngine::with_git(FakeGit::new(three_commit_output()));
        let spec = RawQuery::new(repo_dir())
            .branch(branch)
            .build(&clock())
            .expect("query should validate");

        let err = engine.compute_statistics(&spec).unwrap_err();

        assert!(
            matches!(err, Error::BranchNotFound { branch: ref name, .. } if name == branch),
            "{branch}: {err:?}"
        );
        assert!(!engine.git().calls().iter().any(|call| call.starts_with("log ")));
    }
}

#[test]
fn test_unpadded_dates_are_rejected() {
    for (after, before) in [
        ("2025-1-1", "2025-06-30"),
        ("2025-01-01", "2025-6-30"),
        ("20250101", "2025-06-30"),
        ("+2025-01-01", "2025-06-30"),
    ] {
        let engine = StatsEngine::with_git(FakeGit::new(three_commit_output()));
        let query = RawQuery::new(repo_dir()).after(after).before(before);

        let response = git_stats::handle_statistics(&engine, &query, &clock());

        assert_eq!(response.status_code(), 400, "{after}..{before}");
        assert!(engine.git().calls().is_empty());
    }
}

#[test]
fn test_no_matching_commits_is_all_zero() {
    let engine = StatsEngine::with_git(FakeGit::new(""));
    let spec = RawQuery::new(repo_dir())
        .build(&clock())
        .expect("query should validate");

    let result = engine
        .compute_statistics(&spec)
        .expect("empty output is not an error");

    assert_eq!(result.commit_count, 0);
    assert_eq!(result.files_changed, 0);
    assert_eq!(result.insertions, 0);
    assert_eq!(result.deletions, 0);
    assert_eq!(result.resolved_branch, "main");
}

#[test]
fn test_unborn_head_skips_log() {
    let mut git = FakeGit::new("garbage that would not parse");
    git.refs = Vec::new();
    let engine = StatsEngine::with_git(git);
    let spec = RawQuery::new(repo_dir())
        .build(&clock())
        .expect("query should validate");

    let result = engine
        .compute_statistics(&spec)
        .expect("unborn HEAD is not an error");

    assert_eq!(result.commit_count, 0);
    assert!(!engine.git().calls().iter().any(|call| call.starts_with("log ")));
}

#[test]
fn test_malformed_numstat_fails_whole_request() {
    let output = format!(
        "{}\n3\t1\tsrc/lib.rs\n{}\n5\tsrc/main.rs\n",
        header(0, "arobel", "2025-02-01"),
        header(1, "arobel", "2025-02-02")
    );
    let engine = StatsEngine::with_git(FakeGit::new(output));
    let query = RawQuery::new(repo_dir());

    let response = git_stats::handle_statistics(&engine, &query, &clock());

    assert_eq!(response.status_code(), 500);
    assert!(!response.is_success());
    let json = serde_json::to_value(&response).expect("response should serialize");
    assert_eq!(json["error"]["code"], "malformed_output");
    assert!(json.get("commit_statistics").is_none());
}

#[test]
fn test_parser_stops_after_first_error() {
    let output = format!(
        "not a header\n{}\n1\t1\ta.rs\n",
        header(0, "arobel", "2025-02-01")
    );
    let mut parser = parse_log(&output);

    assert!(matches!(parser.next(), Some(Err(Error::MalformedOutput(_)))));
    assert!(parser.next().is_none());
}

#[test]
fn test_binary_lines_count_files_only() {
    let output = format!(
        "{}\n-\t-\tassets/logo.png\n3\t1\tsrc/lib.rs\n",
        header(0, "arobel", "2025-02-01")
    );

    let totals = aggregate(parse_log(&output)).expect("output should parse");

    assert_eq!(totals.commit_count, 1);
    assert_eq!(totals.diff.files_changed, 2);
    assert_eq!(totals.diff.insertions, 3);
    assert_eq!(totals.diff.deletions, 1);
}

#[test]
fn test_parser_reproduces_constructed_totals() {
    let output = three_commit_output();

    let commits: Vec<_> = parse_log(&output)
        .collect::<Result<Vec<_>>>()
        .expect("output should parse");

    assert_eq!(commits.len(), 3);
    assert_eq!(commits[0].record.author, "arobel");
    assert_eq!(
        commits[1].record.date,
        NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date")
    );
    assert_eq!(commits[2].stat.files_changed, 36);
}

#[test]
fn test_merge_commits_without_stats_still_count() {
    let output = format!(
        "{}{}\n2\t0\tREADME.md\n",
        header(0, "arobel", "2025-02-02"),
        header(1, "arobel", "2025-02-01")
    );

    let totals = aggregate(parse_log(&output)).expect("output should parse");

    assert_eq!(totals.commit_count, 2);
    assert_eq!(totals.diff.files_changed, 1);
}

#[test]
fn test_aggregation_ignores_commit_order() {
    let output = three_commit_output();
    let commits: Vec<_> = parse_log(&output)
        .collect::<Result<Vec<_>>>()
        .expect("output should parse");

    let forward = aggregate(commits.clone().into_iter().map(Ok)).expect("aggregate");
    let reversed = aggregate(commits.iter().rev().cloned().map(Ok)).expect("aggregate");
    let mut rotated = commits;
    rotated.rotate_left(1);
    let rotated = aggregate(rotated.into_iter().map(Ok)).expect("aggregate");

    assert_eq!(forward, reversed);
    assert_eq!(forward, rotated);
}

#[test]
fn test_aggregation_saturates_instead_of_overflowing() {
    let commit = |insertions| ParsedCommit {
        record: CommitRecord {
            hash: "a".repeat(40),
            author: "arobel".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 2, 1).expect("valid date"),
        },
        stat: DiffStat {
            files_changed: 1,
            insertions,
            deletions: 0,
        },
    };

    let totals = aggregate([Ok(commit(u64::MAX)), Ok(commit(7))]).expect("aggregate");

    assert_eq!(totals.commit_count, 2);
    assert_eq!(totals.diff.files_changed, 2);
    assert_eq!(totals.diff.insertions, u64::MAX);

    let mut stat = DiffStat {
        insertions: u64::MAX - 1,
        ..DiffStat::default()
    };
    stat.add_file(Some(5), None);
    assert_eq!(stat.insertions, u64::MAX);
    assert_eq!(stat.files_changed, 1);
}

#[test]
fn test_today_resolves_from_injected_clock() {
    let spec = RawQuery::new(repo_dir())
        .after("today")
        .before("TODAY")
        .build(&clock())
        .expect("query should validate");

    assert_eq!(spec.after, Some(clock().0));
    assert_eq!(spec.before, Some(clock().0));
}

#[test]
fn test_blank_filters_are_absent() {
    let spec = RawQuery::new(repo_dir())
        .branch("  ")
        .author("")
        .after("")
        .build(&clock())
        .expect("query should validate");

    assert_eq!(spec.branch, None);
    assert_eq!(spec.author, None);
    assert_eq!(spec.after, None);
}

#[test]
fn test_top_authors_limit_is_validated() {
    let engine = StatsEngine::with_git(FakeGit::new("     3\tarobel\n"));
    let query = RawQuery::new(repo_dir());

    let response = git_stats::handle_top_authors(&engine, &query, Some(0), &clock());
    assert_eq!(response.status_code(), 400);
    let response = git_stats::handle_top_authors(&engine, &query, Some(101), &clock());
    assert_eq!(response.status_code(), 400);
    assert!(engine.git().calls().is_empty());

    let response = git_stats::handle_top_authors(&engine, &query, None, &clock());
    let json = serde_json::to_value(&response).expect("response should serialize");
    assert_eq!(json["limit"], 10);
    assert_eq!(json["top_authors"][0]["name"], "arobel");
    assert_eq!(json["top_authors"][0]["commit_count"], 3);
}

#[test]
fn test_error_codes_and_statuses() {
    let cases = [
        (Error::InvalidQuery("bad".into()), "invalid_query", 400),
        (
            Error::RepositoryNotFound(PathBuf::from("/missing")),
            "repository_not_found",
            404,
        ),
        (
            Error::BranchNotFound {
                branch: "x".into(),
                repo: PathBuf::from("/repo"),
            },
            "branch_not_found",
            404,
        ),
        (
            Error::ToolExecutionFailed("boom".into()),
            "tool_execution_failed",
            500,
        ),
        (Error::MalformedOutput("junk".into()), "malformed_output", 500),
    ];

    for (err, code, status) in cases {
        let response: git_stats::Response<()> = git_stats::response::failure(&err);
        assert_eq!(response.status_code(), status, "{code}");
        assert_eq!(err.code().is_client_error(), status < 500, "{code}");

        let json = serde_json::to_value(&response).expect("response should serialize");
        assert_eq!(json["error"]["code"], code);
        assert_eq!(json["error"]["message"], err.to_string());
    }
}
