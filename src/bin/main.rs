use clap::{Args, Parser, Subcommand};
use git_stats::{self, EngineConfig, RawQuery, Response, SystemClock};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the root of a local Git repository
    #[arg(short, long, global = true, env = "GITSTATS_REPO_PATH", default_value = ".")]
    repo: PathBuf,

    /// Git executable to run
    #[arg(long, global = true, env = "GITSTATS_GIT_BINARY", default_value = "git")]
    git_binary: PathBuf,

    /// Seconds a single git invocation may run before it is killed
    #[arg(long, global = true, env = "GITSTATS_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Print compact instead of pretty JSON
    #[arg(long, global = true)]
    compact: bool,

    /// Log level
    #[arg(global = true, short, long, value_enum, default_value = "error")]
    log: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Files changed, insertions and deletions across matching commits
    Stats {
        #[command(flatten)]
        filter: Filter,

        /// Only count commits whose author matches this pattern
        #[arg(short, long)]
        author: Option<String>,
    },
    /// Authors ranked by number of commits
    TopAuthors {
        #[command(flatten)]
        filter: Filter,

        /// Number of authors to return (1-100)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Number of commits reachable from a branch
    CommitCount {
        /// Branch to count (defaults to the checked-out branch)
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// Local branches
    Branches,
    /// The checked-out branch
    CurrentBranch,
}

#[derive(Args)]
struct Filter {
    /// Branch to query (defaults to the checked-out branch)
    #[arg(short, long)]
    branch: Option<String>,

    /// Only commits on or after this date (YYYY-MM-DD or "today")
    #[arg(long)]
    after: Option<String>,

    /// Only commits on or before this date (YYYY-MM-DD or "today")
    #[arg(long)]
    before: Option<String>,
}

impl Filter {
    fn into_query(self, repo: PathBuf) -> RawQuery {
        RawQuery {
            repo,
            branch: self.branch,
            author: None,
            after: self.after,
            before: self.before,
        }
    }
}

fn render<T: Serialize>(response: &Response<T>, compact: bool) -> ExitCode {
    let rendered = if compact {
        serde_json::to_string(response)
    } else {
        serde_json::to_string_pretty(response)
    };

    match rendered {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("failed to render response: {e}");
            return ExitCode::FAILURE;
        }
    }

    debug!(status = response.status_code(), "Request finished");
    if response.is_success() {
        ExitCode::SUCCESS
    } else if response.status_code() < 500 {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive(cli.log.into());

    fmt()
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .pretty()
        .init();

    let config = EngineConfig::default()
        .with_git_binary(cli.git_binary)
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let engine = git_stats::new(config);
    let repo = cli.repo;
    let compact = cli.compact;

    debug!(repo = %repo.display(), "Handling request");

    // git runs as a blocking subprocess
    let outcome = tokio::task::spawn_blocking(move || match cli.command {
        Command::Stats { filter, author } => {
            let mut query = filter.into_query(repo);
            query.author = author;
            render(
                &git_stats::handle_statistics(&engine, &query, &SystemClock),
                compact,
            )
        }
        Command::TopAuthors { filter, limit } => render(
            &git_stats::handle_top_authors(
                &engine,
                &filter.into_query(repo),
                limit,
                &SystemClock,
            ),
            compact,
        ),
        Command::CommitCount { branch } => render(
            &git_stats::handle_commit_count(&engine, &repo, branch.as_deref()),
            compact,
        ),
        Command::Branches => render(&git_stats::handle_branches(&engine, &repo), compact),
        Command::CurrentBranch => {
            render(&git_stats::handle_current_branch(&engine, &repo), compact)
        }
    })
    .await;

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("request task failed: {e}");
            ExitCode::FAILURE
        }
    }
}
