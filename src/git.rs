// SPDX-FileCopyrightText: 2026 buildver contributors
//
// SPDX-License-Identifier: MIT

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror;

/// Release tags must carry a version triple, optionally prefixed with 'v'.
/// Anything after the triple (pre-release markers and the like) is ignored.
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)").expect("tag regex compile should succeed"));

/// Version triple carried by a release tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReleaseTag {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Snapshot of repository metadata. Each field is independently optional,
/// absence means the corresponding query could not be completed.
#[derive(Debug, Default, PartialEq)]
pub struct RepositoryState {
    pub tag: Option<ReleaseTag>,
    pub commit: Option<String>,
    pub pristine: Option<bool>,
}

/// Wraps git command runner errors.
#[derive(thiserror::Error, Debug)]
pub enum GitRunnerError {
    #[error("cannot start git: {0}")]
    Start(io::Error),
    #[error("git exited with status {exit_code}, stderr:\n{stderr}")]
    Execution { stderr: String, exit_code: i32 },
    #[error("git did not finish within {0:?}")]
    Timeout(Duration),
}

/// Wraps repository resolution errors. Each of these degrades a single
/// field of the resolved state to absent, none aborts the resolution.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("not a git repository: {0}")]
    RepositoryUnavailable(String),
    #[error("no release tag found: {0}")]
    NoTagFound(String),
    #[error("cannot determine current commit: {0}")]
    CommitUnavailable(String),
}

pub struct GitCommand(Command);

/// Builds git command line.
struct GitCommandBuilder<'a> {
    repo: Option<&'a Path>,
    args: Vec<&'a str>,
}

impl<'a> GitCommandBuilder<'a> {
    fn new() -> Self {
        Self {
            repo: None,
            args: Vec::new(),
        }
    }

    fn in_repo(mut self, repo: &'a Path) -> Self {
        self.repo = Some(repo);
        self
    }

    fn args(mut self, args: &'a [&str]) -> Self {
        self.args = args.to_vec();
        self
    }

    fn build(self) -> GitCommand {
        let mut cmd = Command::new("git");
        if let Some(repo) = &self.repo {
            cmd.arg("-C");
            cmd.arg(repo);
        }

        cmd.args(self.args);
        GitCommand(cmd)
    }
}

/// Trait representing a way to run a git query.
pub trait GitRunner {
    fn run(&mut self, cmd: GitCommand) -> Result<Vec<u8>, GitRunnerError>;
}

/// Runs git as a subprocess. Queries are plain blocking reads of repository
/// metadata, but a deadline is enforced so that a wedged metadata backend
/// cannot hang the build.
pub struct GitCommandRunner {
    timeout: Duration,
}

impl GitCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GitRunner for GitCommandRunner {
    /// Runs a command returning its output (stdout). The command is killed
    /// once the deadline passes.
    fn run(&mut self, gitcmd: GitCommand) -> Result<Vec<u8>, GitRunnerError> {
        let GitCommand(mut cmd) = gitcmd;

        log::trace!(
            "running git with: {:?}",
            cmd.get_args()
                .by_ref()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
        );

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(GitRunnerError::Start)?;

        // Both pipes must be drained while polling for the exit, otherwise a
        // command with more output than the OS pipe buffer blocks on a full
        // pipe and never exits.
        let out_reader = drain(child.stdout.take().expect("stdout is piped"));
        let err_reader = drain(child.stderr.take().expect("stderr is piped"));

        let now = Instant::now();

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if now.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(GitRunnerError::Timeout(self.timeout));
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(err) => return Err(GitRunnerError::Start(err)),
            }
        };

        let stdout = out_reader.join().unwrap_or_default();
        let stderr = err_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(GitRunnerError::Execution {
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
                exit_code: status.code().unwrap_or(255),
            });
        }
        Ok(stdout)
    }
}

/// Collects everything the child writes to the given pipe on a separate
/// thread. The reader exits on its own once the pipe closes, whether the
/// child finished or was killed.
fn drain<R>(pipe: R) -> thread::JoinHandle<Vec<u8>>
where
    R: io::Read + Send + 'static,
{
    thread::spawn(move || {
        let mut pipe = pipe;
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Resolves repository state from a git checkout.
pub struct GitResolver<R>
where
    R: GitRunner,
{
    runner: R,
}

impl<R> GitResolver<R>
where
    R: GitRunner,
{
    pub fn new(r: R) -> Self {
        Self { runner: r }
    }

    // Consume self and return the underlying runner. Only useful for tests to
    // avoid going silly with Rc<RefCell<mock-runner>>.
    #[cfg(test)]
    fn test_into_runner(self) -> R {
        self.runner
    }

    fn run_in(&mut self, repo: &Path, args: &[&str]) -> Result<String, GitRunnerError> {
        self.runner
            .run(GitCommandBuilder::new().in_repo(repo).args(args).build())
            .map(|out| String::from_utf8_lossy(&out).trim().to_string())
    }

    fn check_repository(&mut self, repo: &Path) -> Result<(), ResolveError> {
        self.run_in(repo, &["rev-parse", "--git-dir"])
            .map(|_| ())
            .map_err(|e| ResolveError::RepositoryUnavailable(e.to_string()))
    }

    fn latest_tag(&mut self, repo: &Path) -> Result<ReleaseTag, ResolveError> {
        let tag = self
            .run_in(repo, &["describe", "--tags", "--abbrev=0"])
            .map_err(|e| ResolveError::NoTagFound(e.to_string()))?;

        let caps = TAG_RE.captures(&tag).ok_or_else(|| {
            ResolveError::NoTagFound(format!("tag {:?} does not carry a version triple", tag))
        })?;

        Ok(ReleaseTag {
            major: tag_component(&tag, &caps[1])?,
            minor: tag_component(&tag, &caps[2])?,
            patch: tag_component(&tag, &caps[3])?,
        })
    }

    fn current_commit(&mut self, repo: &Path) -> Result<String, ResolveError> {
        let commit = self
            .run_in(repo, &["rev-parse", "HEAD"])
            .map_err(|e| ResolveError::CommitUnavailable(e.to_string()))?;

        if commit.is_empty() {
            return Err(ResolveError::CommitUnavailable(
                "empty rev-parse output".to_string(),
            ));
        }
        Ok(commit)
    }

    fn is_pristine(&mut self, repo: &Path) -> Result<bool, GitRunnerError> {
        self.run_in(repo, &["status", "--porcelain"])
            .map(|out| out.is_empty())
    }

    /// Resolve the repository state at the given path. Read-only. Each query
    /// is best effort, a failed query leaves its own field absent and never
    /// affects the others.
    pub fn resolve(&mut self, repo: &Path) -> RepositoryState {
        if let Err(err) = self.check_repository(repo) {
            debug!("{}", err);
            return RepositoryState::default();
        }

        let tag = match self.latest_tag(repo) {
            Ok(tag) => Some(tag),
            Err(err) => {
                debug!("{}", err);
                None
            }
        };

        let commit = match self.current_commit(repo) {
            Ok(commit) => Some(commit),
            Err(err) => {
                debug!("{}", err);
                None
            }
        };

        let pristine = match self.is_pristine(repo) {
            Ok(pristine) => Some(pristine),
            Err(err) => {
                debug!("cannot determine working tree state: {}", err);
                None
            }
        };

        RepositoryState {
            tag,
            commit,
            pristine,
        }
    }
}

fn tag_component(tag: &str, cap: &str) -> Result<u64, ResolveError> {
    cap.parse().map_err(|_| {
        ResolveError::NoTagFound(format!("component {:?} out of range in tag {:?}", cap, tag))
    })
}

/// Returns a resolver running git with the given per-query timeout.
pub fn resolver_with_timeout(timeout: Duration) -> GitResolver<GitCommandRunner> {
    GitResolver::new(GitCommandRunner::new(timeout))
}
