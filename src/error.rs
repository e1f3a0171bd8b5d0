//! Error types for download jobs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ytgrab operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Broad failure group, so the window can react per group if it wants to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any worker was started
    Validation,
    /// yt-dlp could not be run or failed to fetch the media
    Fetch,
    /// Post-processing (ffmpeg) failed
    Conversion,
    /// Creating directories or touching files failed
    Filesystem,
}

/// An external program the worker depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
}

impl Tool {
    /// Executable name looked up on PATH
    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
        }
    }

    /// Environment variable that overrides discovery
    pub fn env_var(self) -> &'static str {
        match self {
            Tool::YtDlp => "YTGRAB_YTDLP",
            Tool::Ffmpeg => "YTGRAB_FFMPEG",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Everything that can stop a download job.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL field was empty after trimming
    #[error("please enter a URL")]
    EmptyUrl,

    /// A job is already running; requests are not queued
    #[error("a download is already in progress")]
    JobActive,

    /// Required executable could not be located
    #[error("{tool} not found: install it or set {}", tool.env_var())]
    ToolNotFound { tool: Tool },

    /// yt-dlp failed or could not be spawned
    #[error("{message}")]
    Fetch { message: String },

    /// ffmpeg failed or produced nothing
    #[error("{message}")]
    Conversion { message: String },

    /// Directory creation or file cleanup failed
    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FetchError::EmptyUrl | FetchError::JobActive => ErrorCategory::Validation,
            FetchError::ToolNotFound { tool: Tool::YtDlp } | FetchError::Fetch { .. } => {
                ErrorCategory::Fetch
            }
            FetchError::ToolNotFound { tool: Tool::Ffmpeg } | FetchError::Conversion { .. } => {
                ErrorCategory::Conversion
            }
            FetchError::Filesystem { .. } => ErrorCategory::Filesystem,
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Filesystem {
            path: path.into(),
            source,
        }
    }
}
