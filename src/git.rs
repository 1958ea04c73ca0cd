use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::types::QuerySpec;

/// Separates commits in the log output.
pub const RECORD_SEPARATOR: char = '\x1e';
/// Separates fields inside a commit header.
pub const FIELD_SEPARATOR: char = '\x1f';

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ad";

/// Invoker settings shared by every request.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub git_binary: PathBuf,
    /// Ceiling for a whole request, shared by every git process it starts.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            git_binary: PathBuf::from("git"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_git_binary(mut self, git_binary: impl Into<PathBuf>) -> Self {
        self.git_binary = git_binary.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A ref the query runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    /// Name reported back to the caller.
    pub name: String,
    /// Revision handed to git, `None` when HEAD is unborn.
    pub revision: Option<String>,
}

/// Trait defining Git operations required by the library
pub trait Git {
    /// Run a Git command inside `repo` and return its raw standard output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolExecutionFailed`] if the command cannot be spawned,
    /// exits non-zero or exceeds the timeout.
    fn run_git_command(&self, repo: &Path, args: &[&str]) -> Result<String>;

    /// Run a Git command whose non-zero exit is an answer rather than a
    /// failure. Returns `None` in that case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolExecutionFailed`] if the command cannot be spawned
    /// or exceeds the timeout.
    fn probe_git_command(&self, repo: &Path, args: &[&str]) -> Result<Option<String>>;

    /// Returns the invoker one request should use. Implementations with a
    /// timeout start the request's single deadline here.
    fn begin_request(&self) -> Cow<'_, Self>
    where
        Self: Clone,
    {
        Cow::Borrowed(self)
    }

    /// Checks that `path` is the root of a working tree and returns it
    /// canonicalized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryNotFound`] if it is not.
    #[instrument(skip(self), fields(path = %path.display()))]
    fn ensure_repository_root(&self, path: &Path) -> Result<PathBuf> {
        let not_found = || Error::RepositoryNotFound(path.to_path_buf());
        if !path.is_dir() {
            debug!("Repository path is not a directory");
            return Err(not_found());
        }
        let root = path.canonicalize().map_err(|_| not_found())?;

        let toplevel = self
            .probe_git_command(&root, &["rev-parse", "--show-toplevel"])?
            .ok_or_else(not_found)?;
        let toplevel = Path::new(toplevel.trim())
            .canonicalize()
            .map_err(|_| not_found())?;

        if toplevel != root {
            debug!(toplevel = %toplevel.display(), "Path is inside a repository but not its root");
            return Err(not_found());
        }
        Ok(root)
    }

    /// Resolves the requested branch, or the checked-out one when `branch`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BranchNotFound`] if a named branch does not exist.
    #[instrument(skip(self), fields(repo = %repo.display()))]
    fn resolve_branch(&self, repo: &Path, branch: Option<&str>) -> Result<ResolvedRef> {
        let Some(branch) = branch else {
            let name = self
                .probe_git_command(repo, &["symbolic-ref", "--quiet", "--short", "HEAD"])?
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "HEAD".to_string());
            let born = self.ref_exists(repo, "HEAD")?;
            debug!(branch = %name, born, "Resolved current branch");
            return Ok(ResolvedRef {
                name,
                revision: born.then(|| "HEAD".to_string()),
            });
        };

        for namespace in ["refs/heads/", "refs/remotes/"] {
            let full = format!("{namespace}{branch}");
            if self.branch_exists(repo, &full)? {
                debug!(revision = %full, "Resolved branch");
                return Ok(ResolvedRef {
                    name: branch.to_string(),
                    revision: Some(full),
                });
            }
        }
        Err(Error::BranchNotFound {
            branch: branch.to_string(),
            repo: repo.to_path_buf(),
        })
    }

    /// Whether `full_name` is exactly an existing ref. Revision expressions
    /// such as `main~1` or `main@{0}` are not refs and never match.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    fn branch_exists(&self, repo: &Path, full_name: &str) -> Result<bool> {
        Ok(self
            .probe_git_command(repo, &["show-ref", "--verify", "--quiet", full_name])?
            .is_some())
    }

    /// Whether `reference` names a commit.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    fn ref_exists(&self, repo: &Path, reference: &str) -> Result<bool> {
        let spec = format!("{reference}^{{commit}}");
        Ok(self
            .probe_git_command(repo, &["rev-parse", "--verify", "--quiet", &spec])?
            .is_some())
    }
}

/// Implementation of Git operations using the local Git CLI
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    config: EngineConfig,
    deadline: Option<Instant>,
}

struct Execution {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: String,
}

impl GitCli {
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn execute(&self, repo: &Path, args: &[&str]) -> Result<Execution> {
        let deadline = self
            .deadline
            .unwrap_or_else(|| Instant::now() + self.config.timeout);
        if Instant::now() >= deadline {
            return Err(self.timed_out(args));
        }

        let mut child = Command::new(&self.config.git_binary)
            .arg("--no-pager")
            .args(args)
            .current_dir(repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::ToolExecutionFailed(format!(
                    "could not run {}: {e}",
                    self.config.git_binary.display()
                ))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_deadline(&mut child, args, deadline)?;
        let stdout = collect(stdout)?;
        let stderr = String::from_utf8_lossy(&collect(stderr)?).trim().to_string();

        Ok(Execution {
            status,
            stdout,
            stderr,
        })
    }

    fn timed_out(&self, args: &[&str]) -> Error {
        warn!(
            args = ?args,
            timeout_secs = self.config.timeout.as_secs_f64(),
            "Git request timed out"
        );
        Error::ToolExecutionFailed(format!(
            "git {} timed out, request exceeded {:?}",
            args.first().unwrap_or(&""),
            self.config.timeout
        ))
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        args: &[&str],
        deadline: Instant,
    ) -> Result<ExitStatus> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    reap(child);
                    return Err(self.timed_out(args));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    reap(child);
                    return Err(Error::ToolExecutionFailed(format!(
                        "failed waiting for git: {e}"
                    )));
                }
            }
        }
    }
}

impl Git for GitCli {
    fn begin_request(&self) -> Cow<'_, Self> {
        Cow::Owned(Self {
            config: self.config.clone(),
            deadline: Some(Instant::now() + self.config.timeout),
        })
    }

    #[instrument(skip(self), fields(args = ?args, repo_path = %repo.display()))]
    fn run_git_command(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let execution = self.execute(repo, args)?;

        if !execution.status.success() {
            debug!(status = %execution.status, error = %execution.stderr, "Git command failed");
            return Err(Error::ToolExecutionFailed(if execution.stderr.is_empty() {
                format!("git {} exited with {}", args.first().unwrap_or(&""), execution.status)
            } else {
                execution.stderr
            }));
        }

        let result = String::from_utf8(execution.stdout)
            .map_err(|e| Error::MalformedOutput(format!("git output is not UTF-8: {e}")))?;

        debug!(
            output_length = result.len(),
            "Git command completed successfully"
        );
        Ok(result)
    }

    #[instrument(skip(self), fields(args = ?args, repo_path = %repo.display()))]
    fn probe_git_command(&self, repo: &Path, args: &[&str]) -> Result<Option<String>> {
        let execution = self.execute(repo, args)?;

        if !execution.status.success() {
            debug!(status = %execution.status, "Probe answered negatively");
            return Ok(None);
        }

        Ok(Some(String::from_utf8_lossy(&execution.stdout).into_owned()))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn collect(reader: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| Error::ToolExecutionFailed("git output reader panicked".to_string()))?
        .map_err(|e| Error::ToolExecutionFailed(format!("failed reading git output: {e}")))
}

fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "Kill failed, process already exited");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "Could not reap git process");
    }
}

fn filter_args(spec: &QuerySpec, args: &mut Vec<String>) {
    if let Some(author) = &spec.author {
        args.push(format!("--author={author}"));
    }
    if let Some(after) = spec.after {
        args.push(format!("--since={after} 00:00:00"));
    }
    if let Some(before) = spec.before {
        args.push(format!("--until={before} 23:59:59"));
    }
}

/// Arguments of the log query whose output the parser understands.
#[must_use]
pub fn log_args(spec: &QuerySpec, revision: &str) -> Vec<String> {
    let mut args = vec![
        "log".to_string(),
        "--no-color".to_string(),
        "--no-show-signature".to_string(),
        "--numstat".to_string(),
        "--date=short".to_string(),
        LOG_FORMAT.to_string(),
    ];
    filter_args(spec, &mut args);
    args.push(revision.to_string());
    args.push("--".to_string());
    args
}

/// Arguments of the per-author commit summary.
#[must_use]
pub fn shortlog_args(spec: &QuerySpec, revision: &str) -> Vec<String> {
    let mut args = vec!["shortlog".to_string(), "-sn".to_string()];
    filter_args(spec, &mut args);
    args.push(revision.to_string());
    args.push("--".to_string());
    args
}

/// Arguments counting the commits reachable from `revision`.
#[must_use]
pub fn rev_list_count_args(revision: &str) -> Vec<String> {
    vec![
        "rev-list".to_string(),
        "--count".to_string(),
        revision.to_string(),
        "--".to_string(),
    ]
}

/// Arguments listing local branch names.
#[must_use]
pub fn branch_list_args() -> Vec<String> {
    vec![
        "for-each-ref".to_string(),
        "--format=%(refname:short)".to_string(),
        "refs/heads/".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn spec() -> QuerySpec {
        QuerySpec {
            repo_path: PathBuf::from("/repo"),
            branch: Some("main".to_string()),
            author: Some("arobel".to_string()),
            after: NaiveDate::from_ymd_opt(2025, 1, 1),
            before: NaiveDate::from_ymd_opt(2025, 6, 30),
        }
    }

    #[test]
    fn log_args_bound_window_inclusively() {
        let args = log_args(&spec(), "refs/heads/main");

        assert!(args.contains(&"--author=arobel".to_string()));
        assert!(args.contains(&"--since=2025-01-01 00:00:00".to_string()));
        assert!(args.contains(&"--until=2025-06-30 23:59:59".to_string()));
        assert_eq!(args[args.len() - 2], "refs/heads/main");
        assert_eq!(args[args.len() - 1], "--");
    }

    #[test]
    fn log_args_omit_absent_filters() {
        let spec = QuerySpec {
            author: None,
            after: None,
            before: None,
            ..spec()
        };
        let args = log_args(&spec, "HEAD");

        assert!(!args.iter().any(|a| a.starts_with("--author")
            || a.starts_with("--since")
            || a.starts_with("--until")));
    }
}
