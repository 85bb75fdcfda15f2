use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt as _;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::data::{
    IssueCommentItem, PullRequestItem, RepoId, RepoInfo, ReviewCommentItem, ReviewItem,
};
use crate::error::GhError;

/// Only the start of stderr is kept for error messages
const STDERR_LIMIT: u64 = 64 * 1024;

/// Which pull requests `gh pr list` should return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    #[default]
    Open,
    Closed,
    Merged,
    All,
}

impl PrState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
            Self::All => "all",
        }
    }
}

/// Bounds applied to every `gh` invocation
#[derive(Debug, Clone, Copy)]
pub struct GhLimits {
    pub timeout: Duration,
    pub max_output_bytes: u64,
}

impl Default for GhLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_output_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Read access to the GitHub data a refresh needs
#[async_trait]
pub trait GitHubSource: Send + Sync {
    async fn repo_info(&self, repo: &RepoId) -> Result<RepoInfo, GhError>;

    /// Pull requests in `state` created at or after `since`
    async fn pull_requests(
        &self,
        repo: &RepoId,
        state: PrState,
        since: Timestamp,
    ) -> Result<Vec<PullRequestItem>, GhError>;

    async fn review_comments(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<ReviewCommentItem>, GhError>;

    async fn issue_comments(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<IssueCommentItem>, GhError>;

    async fn reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<ReviewItem>, GhError>;
}

/// [`GitHubSource`] backed by the `gh` command-line tool
#[derive(Debug, Clone)]
pub struct GhCli {
    program: PathBuf,
    limits: GhLimits,
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new(GhLimits::default())
    }
}

impl GhCli {
    pub fn new(limits: GhLimits) -> Self {
        Self {
            program: PathBuf::from("gh"),
            limits,
        }
    }

    /// Run a different executable in place of `gh`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Execute a GitHub CLI command and return its standard output.
    ///
    /// Fails as soon as stdout passes the output limit or the timeout elapses;
    /// the child is killed in both cases. Stderr is drained to the end but only
    /// its first [`STDERR_LIMIT`] bytes are kept.
    pub async fn run_gh_command(&self, args: &[&str]) -> Result<String, GhError> {
        let command = render_command(args);
        debug!(%command, "running gh");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    GhError::NotInstalled {
                        command: command.clone(),
                    }
                } else {
                    GhError::Io {
                        command: command.clone(),
                        source: err,
                    }
                }
            })?;

        let io_error = |source| GhError::Io {
            command: command.clone(),
            source,
        };
        let missing_pipe = || io_error(std::io::Error::other("child pipe was not captured"));
        let mut stdout = child.stdout.take().ok_or_else(missing_pipe)?;
        let mut stderr = child.stderr.take().ok_or_else(missing_pipe)?;
        let limit = self.limits.max_output_bytes;

        let run = async {
            let read_stdout = async {
                let mut buf = Vec::new();
                (&mut stdout)
                    .take(limit + 1)
                    .read_to_end(&mut buf)
                    .await
                    .map_err(io_error)?;
                if buf.len() as u64 > limit {
                    return Err(GhError::OutputTooLarge {
                        command: command.clone(),
                        limit,
                    });
                }
                Ok(buf)
            };
            let read_stderr = async {
                let mut buf = Vec::new();
                (&mut stderr)
                    .take(STDERR_LIMIT)
                    .read_to_end(&mut buf)
                    .await
                    .map_err(io_error)?;
                tokio::io::copy(&mut stderr, &mut tokio::io::sink())
                    .await
                    .map_err(io_error)?;
                Ok::<_, GhError>(buf)
            };

            let (stdout_buf, stderr_buf) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await.map_err(io_error)?;
            Ok::<_, GhError>((status, stdout_buf, stderr_buf))
        };

        let waited = tokio::time::timeout(self.limits.timeout, run).await;
        let (status, stdout, stderr) = match waited {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                kill(&mut child, &command);
                return Err(err);
            }
            Err(_) => {
                kill(&mut child, &command);
                return Err(GhError::Timeout {
                    command,
                    timeout: self.limits.timeout,
                });
            }
        };

        if !status.success() {
            return Err(GhError::Failed {
                command,
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn run_gh_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, GhError> {
        let output = self.run_gh_command(args).await?;
        serde_json::from_str(&output).map_err(|source| GhError::Json {
            command: render_command(args),
            source,
        })
    }

    async fn run_gh_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, GhError> {
        let args = ["api", "--paginate", path];
        let output = self.run_gh_command(&args).await?;
        parse_pages(&output).map_err(|source| GhError::Json {
            command: render_command(&args),
            source,
        })
    }

    /// Raw unified diff of a pull request
    pub async fn pull_request_diff(&self, repo: &RepoId, number: u64) -> Result<String, GhError> {
        self.run_gh_command(&[
            "pr",
            "diff",
            &number.to_string(),
            "--repo",
            &repo.to_string(),
        ])
        .await
    }
}

#[async_trait]
impl GitHubSource for GhCli {
    async fn repo_info(&self, repo: &RepoId) -> Result<RepoInfo, GhError> {
        self.run_gh_json(&["repo", "view", &repo.to_string(), "--json", "url,pushedAt"])
            .await
    }

    async fn pull_requests(
        &self,
        repo: &RepoId,
        state: PrState,
        since: Timestamp,
    ) -> Result<Vec<PullRequestItem>, GhError> {
        let search = format!("created:>={}", since.strftime("%Y-%m-%d"));
        let items: Vec<PullRequestItem> = self
            .run_gh_json(&[
                "pr",
                "list",
                "--repo",
                &repo.to_string(),
                "--state",
                state.as_str(),
                "--search",
                &search,
                "--json",
                "number,title,author,createdAt,url",
                "--limit",
                "1000",
            ])
            .await?;

        // The search qualifier is day-granular
        Ok(items.into_iter().filter(|pr| pr.created_at >= since).collect())
    }

    async fn review_comments(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<ReviewCommentItem>, GhError> {
        self.run_gh_paginated(&format!("repos/{repo}/pulls/{number}/comments?per_page=100"))
            .await
    }

    async fn issue_comments(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<IssueCommentItem>, GhError> {
        self.run_gh_paginated(&format!("repos/{repo}/issues/{number}/comments?per_page=100"))
            .await
    }

    async fn reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<ReviewItem>, GhError> {
        self.run_gh_paginated(&format!("repos/{repo}/pulls/{number}/reviews?per_page=100"))
            .await
    }
}

fn kill(child: &mut Child, command: &str) {
    if let Err(err) = child.start_kill() {
        debug!(%command, error = %err, "failed to kill gh");
    }
}

/// `gh api --paginate` prints one JSON array per page, back to back
fn parse_pages<T: DeserializeOwned>(output: &str) -> Result<Vec<T>, serde_json::Error> {
    let mut items = Vec::new();
    for page in serde_json::Deserializer::from_str(output).into_iter::<Vec<T>>() {
        items.extend(page?);
    }
    Ok(items)
}

/// Shell-like rendering of a `gh` invocation, for logs and errors
fn render_command(args: &[&str]) -> String {
    std::iter::once("gh")
        .chain(args.iter().copied())
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("'{arg}'")
            } else {
                arg.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pages_concatenated_arrays() {
        let output = "[1,2]\n[3][]\n[4]";
        let items: Vec<u32> = parse_pages(output).unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_pages_empty_output() {
        let items: Vec<u32> = parse_pages("").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_pages_rejects_garbage() {
        assert!(parse_pages::<u32>("[1, 2").is_err());
        assert!(parse_pages::<u32>("not json").is_err());
    }

    #[test]
    fn test_render_command_quotes_spaces() {
        assert_eq!(
            render_command(&["pr", "list", "--search", "created:>=2026-10-01 is:pr"]),
            "gh pr list --search 'created:>=2026-10-01 is:pr'"
        );
    }

    #[test]
    fn test_pr_state_names() {
        assert_eq!(PrState::default(), PrState::Open);
        assert_eq!(PrState::Merged.as_str(), "merged");
    }

    #[test]
    fn test_gh_error_names_command() {
        let err = GhError::Failed {
            command: render_command(&["repo", "view", "o/r"]),
            status: "exit status: 1".to_owned(),
            stderr: "not found".to_owned(),
        };
        let message = err.to_string();
        assert!(message.contains("gh repo view o/r"));
        assert!(message.contains("not found"));
    }

    #[cfg(unix)]
    mod subprocess {
        use std::os::unix::fs::PermissionsExt as _;
        use std::path::Path;
        use std::time::Instant;

        use tempfile::{TempDir, tempdir};
        use tokio::sync::Mutex;

        use super::*;

        // Writing and executing scripts from parallel tests can hit ETXTBSY.
        static SCRIPTS: Mutex<()> = Mutex::const_new(());

        fn fake_gh(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("gh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn cli(program: &Path, timeout: Duration, max_output_bytes: u64) -> GhCli {
            GhCli::new(GhLimits {
                timeout,
                max_output_bytes,
            })
            .with_program(program)
        }

        #[tokio::test]
        async fn test_slow_command_times_out() {
            let _lock = SCRIPTS.lock().await;
            let dir = tempdir().unwrap();
            let gh = cli(&fake_gh(&dir, "sleep 10"), Duration::from_secs(1), 1024);

            let started = Instant::now();
            let err = gh.run_gh_command(&["repo", "view", "o/r"]).await.unwrap_err();
            assert!(started.elapsed() < Duration::from_secs(5));
            assert!(matches!(err, GhError::Timeout { .. }), "{err:?}");
            assert!(err.to_string().contains("gh repo view o/r"));
        }

        #[tokio::test]
        async fn test_endless_stdout_fails_fast() {
            let _lock = SCRIPTS.lock().await;
            let dir = tempdir().unwrap();
            let gh = cli(
                &fake_gh(&dir, "exec yes aaaaaaaa"),
                Duration::from_secs(30),
                1024,
            );

            let started = Instant::now();
            let err = gh.run_gh_command(&["api", "x"]).await.unwrap_err();
            assert!(started.elapsed() < Duration::from_secs(10));
            match err {
                GhError::OutputTooLarge { command, limit } => {
                    assert_eq!(command, "gh api x");
                    assert_eq!(limit, 1024);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_chatty_stderr_does_not_block_success() {
            let _lock = SCRIPTS.lock().await;
            let dir = tempdir().unwrap();
            let gh = cli(
                &fake_gh(&dir, "head -c 200000 /dev/zero >&2\nprintf '[]'"),
                Duration::from_secs(30),
                1024,
            );

            let output = gh.run_gh_command(&["api", "x"]).await.unwrap();
            assert_eq!(output, "[]");
        }

        #[tokio::test]
        async fn test_nonzero_exit_reports_stderr() {
            let _lock = SCRIPTS.lock().await;
            let dir = tempdir().unwrap();
            let gh = cli(
                &fake_gh(&dir, "echo 'HTTP 404: Not Found' >&2\nexit 1"),
                Duration::from_secs(30),
                1024,
            );

            let err = gh.run_gh_command(&["repo", "view", "o/r"]).await.unwrap_err();
            assert!(matches!(err, GhError::Failed { .. }), "{err:?}");
            let message = err.to_string();
            assert!(message.contains("gh repo view o/r"));
            assert!(message.contains("HTTP 404"));
        }

        #[tokio::test]
        async fn test_missing_program_is_not_installed() {
            let dir = tempdir().unwrap();
            let gh = cli(&dir.path().join("missing-gh"), Duration::from_secs(30), 1024);

            let err = gh.run_gh_command(&["auth", "status"]).await.unwrap_err();
            match err {
                GhError::NotInstalled { command } => assert_eq!(command, "gh auth status"),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
