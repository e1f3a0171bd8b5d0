//! ytgrab: paste a video URL, get an mp4, an mp3 or a folder of frames.
//!
//! Fetching is done by the external `yt-dlp` executable and frame extraction
//! by `ffmpeg`; this crate holds the worker that drives them, the window
//! state, and start-up configuration.

pub mod config;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod model;
pub mod progress;
pub mod shell;

pub use config::Settings;
pub use downloader::{JobOptions, Toolchain, run_job};
pub use error::{ErrorCategory, FetchError, Result, Tool};
pub use model::{DownloadRequest, JobId, JobReport, OutputKind, WorkerEvent};
pub use shell::{ErrorNotice, JobState, Shell};
