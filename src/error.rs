use std::time::Duration;

use thiserror::Error;

/// Failure of a single `gh` invocation. Always names the command that failed.
#[derive(Debug, Error)]
pub enum GhError {
    #[error(
        "GitHub CLI (gh) not found while running `{command}`. Please install it from https://cli.github.com/ and make sure it's in your PATH."
    )]
    NotInstalled { command: String },

    #[error("failed to execute `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` produced more than {limit} bytes of output")]
    OutputTooLarge { command: String, limit: u64 },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to parse JSON from `{command}`: {source}")]
    Json {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("a refresh is already in progress")]
    InProgress,

    #[error("failed to write cache file {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
