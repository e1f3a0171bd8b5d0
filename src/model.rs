use std::path::PathBuf;

use crate::error::FetchError;

/// Identifies one submitted job; events from older jobs are ignored.
pub type JobId = u64;

/// What the user wants out of the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// Best video + best audio muxed into mp4
    #[default]
    Video,
    /// Best audio transcoded to mp3
    Audio,
    /// Video-only stream split into one jpg per frame
    ImageSequence,
}

impl OutputKind {
    pub const ALL: [OutputKind; 3] = [
        OutputKind::Video,
        OutputKind::Audio,
        OutputKind::ImageSequence,
    ];

    /// Short label used in the completion status
    pub fn label(self) -> &'static str {
        match self {
            OutputKind::Video => "MP4",
            OutputKind::Audio => "MP3",
            OutputKind::ImageSequence => "JPG",
        }
    }

    /// Radio button caption
    pub fn description(self) -> &'static str {
        match self {
            OutputKind::Video => "MP4  (video)",
            OutputKind::Audio => "MP3  (audio)",
            OutputKind::ImageSequence => "JPG  (frames)",
        }
    }

    /// Share of the overall progress bar spent inside yt-dlp
    pub(crate) fn fetch_share(self) -> u8 {
        match self {
            OutputKind::Video | OutputKind::Audio => 95,
            OutputKind::ImageSequence => 80,
        }
    }
}

/// A single download, frozen at submit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub kind: OutputKind,
}

/// Success marker for a finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Final status line shown to the user
    pub status: String,
    /// File written by yt-dlp, `None` when it was removed after frame extraction
    pub media_file: Option<PathBuf>,
    /// Frames directory and number of images written into it
    pub frames: Option<(PathBuf, usize)>,
}

/// Messages sent from the worker task to the window
#[derive(Debug)]
pub enum WorkerEvent {
    Progress { job_id: JobId, percent: u8 },
    Status { job_id: JobId, message: String },
    Finished { job_id: JobId, report: JobReport },
    Failed { job_id: JobId, error: FetchError },
}

impl WorkerEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            WorkerEvent::Progress { job_id, .. }
            | WorkerEvent::Status { job_id, .. }
            | WorkerEvent::Finished { job_id, .. }
            | WorkerEvent::Failed { job_id, .. } => *job_id,
        }
    }
}
