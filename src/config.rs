//! Start-up settings resolved from the environment.
//!
//! Tool locations come from `YTGRAB_YTDLP` / `YTGRAB_FFMPEG` when set and
//! otherwise from a PATH lookup. Nothing is persisted between runs.

use std::path::PathBuf;

use crate::downloader::{JobOptions, Toolchain};
use crate::error::{FetchError, Tool};
use crate::logging::LogDestination;

pub const OUTPUT_DIR_VAR: &str = "YTGRAB_OUTPUT_DIR";
pub const KEEP_VIDEO_VAR: &str = "YTGRAB_KEEP_VIDEO";
pub const LOG_VAR: &str = "YTGRAB_LOG";

/// Folder used when the user has not picked one
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ytdlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub default_output_dir: PathBuf,
    pub keep_intermediate_video: bool,
    pub log_destination: LogDestination,
}

impl Settings {
    /// Reads the process environment and searches PATH for missing tools.
    pub fn from_env() -> Self {
        Self::resolve_with(
            |key| std::env::var(key).ok(),
            |name| which::which(name).ok(),
        )
    }

    /// Resolves settings from an arbitrary variable source and tool finder.
    pub fn resolve_with<V, W>(var: V, find: W) -> Self
    where
        V: Fn(&str) -> Option<String>,
        W: Fn(&str) -> Option<PathBuf>,
    {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let locate = |tool: Tool| {
            non_empty(tool.env_var())
                .map(PathBuf::from)
                .or_else(|| find(tool.binary_name()))
        };

        Self {
            ytdlp: locate(Tool::YtDlp),
            ffmpeg: locate(Tool::Ffmpeg),
            default_output_dir: non_empty(OUTPUT_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            keep_intermediate_video: non_empty(KEEP_VIDEO_VAR)
                .is_some_and(|v| parse_flag(&v)),
            log_destination: non_empty(LOG_VAR)
                .and_then(|v| LogDestination::parse(&v))
                .unwrap_or(LogDestination::Terminal),
        }
    }

    /// Tools for one job; fails when yt-dlp itself is unknown.
    pub fn toolchain(&self) -> Result<Toolchain, FetchError> {
        let ytdlp = self
            .ytdlp
            .clone()
            .ok_or(FetchError::ToolNotFound { tool: Tool::YtDlp })?;
        Ok(Toolchain {
            ytdlp,
            ffmpeg: self.ffmpeg.clone(),
        })
    }

    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            keep_intermediate_video: self.keep_intermediate_video,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
