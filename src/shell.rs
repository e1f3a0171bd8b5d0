//! Window state, kept free of egui so it can be driven from tests.
//!
//! `submit` turns the current fields into a [`DownloadRequest`] and claims the
//! single job slot; `apply` folds worker events back into what the window shows.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{ErrorCategory, FetchError};
use crate::model::{DownloadRequest, JobId, OutputKind, WorkerEvent};

pub const STATUS_IDLE: &str = "Ready.";
pub const STATUS_WAITING: &str = "Waiting for a URL...";
pub const STATUS_STARTING: &str = "Starting download...";
pub const STATUS_FAILED: &str = "Download failed...";

/// Error shown in the modal dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub category: ErrorCategory,
    pub message: String,
}

impl ErrorNotice {
    fn from_error(error: &FetchError) -> Self {
        let message = match error.category() {
            ErrorCategory::Validation => error.to_string(),
            _ => format!("Download failed: {error}"),
        };
        Self {
            category: error.category(),
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running(JobId),
    Done(JobId),
    Failed(JobId),
}

#[derive(Debug)]
pub struct Shell {
    /// URL text field
    pub url_input: String,
    /// Output folder text field
    pub output_dir: String,
    /// Selected radio button
    pub kind: OutputKind,
    job: JobState,
    next_job_id: JobId,
    progress: u8,
    status: String,
    error: Option<ErrorNotice>,
}

impl Shell {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            url_input: String::new(),
            output_dir: output_dir.as_ref().display().to_string(),
            kind: OutputKind::default(),
            job: JobState::Idle,
            next_job_id: 1,
            progress: 0,
            status: STATUS_IDLE.to_string(),
            error: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.job, JobState::Running(_))
    }

    pub fn job(&self) -> JobState {
        self.job
    }

    /// 0..=100
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> Option<&ErrorNotice> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn set_output_dir(&mut self, dir: impl AsRef<Path>) {
        self.output_dir = dir.as_ref().display().to_string();
    }

    /// Folder a finished job wrote into, for the "Open folder" button
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.output_dir.trim())
    }

    /// Validates the fields and claims the job slot.
    pub fn submit(&mut self) -> Result<(JobId, DownloadRequest), FetchError> {
        if self.is_busy() {
            debug!("submit ignored: job already running");
            return Err(FetchError::JobActive);
        }

        let url = self.url_input.trim();
        if url.is_empty() {
            self.status = STATUS_WAITING.to_string();
            self.error = Some(ErrorNotice::from_error(&FetchError::EmptyUrl));
            return Err(FetchError::EmptyUrl);
        }

        let output_dir = match self.output_dir.trim() {
            "" => PathBuf::from(crate::config::DEFAULT_OUTPUT_DIR),
            dir => PathBuf::from(dir),
        };
        let request = DownloadRequest {
            url: url.to_string(),
            output_dir,
            kind: self.kind,
        };

        let job_id = self.next_job_id;
        self.next_job_id += 1;
        self.job = JobState::Running(job_id);
        self.progress = 0;
        self.status = STATUS_STARTING.to_string();
        self.error = None;
        info!("job {job_id} submitted");
        Ok((job_id, request))
    }

    /// Fails the running job before any worker was spawned for it.
    pub fn fail_current(&mut self, error: FetchError) {
        if let JobState::Running(job_id) = self.job {
            self.apply(WorkerEvent::Failed { job_id, error });
        }
    }

    /// Applies one worker event; events for other jobs are dropped.
    pub fn apply(&mut self, event: WorkerEvent) {
        let JobState::Running(current) = self.job else {
            debug!("dropping event for job {} while idle", event.job_id());
            return;
        };
        if event.job_id() != current {
            debug!("dropping stale event for job {}", event.job_id());
            return;
        }

        match event {
            WorkerEvent::Progress { percent, .. } => {
                let percent = percent.min(100);
                if percent > self.progress {
                    self.progress = percent;
                }
            }
            WorkerEvent::Status { message, .. } => self.status = message,
            WorkerEvent::Finished { report, .. } => {
                self.progress = 100;
                self.status = report.status;
                self.job = JobState::Done(current);
            }
            WorkerEvent::Failed { error, .. } => {
                self.error = Some(ErrorNotice::from_error(&error));
                self.status = STATUS_FAILED.to_string();
                self.job = JobState::Failed(current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobReport;

    fn shell_with_url(url: &str) -> Shell {
        let mut shell = Shell::new("downloads");
        shell.url_input = url.to_string();
        shell
    }

    fn finished(job_id: JobId) -> WorkerEvent {
        WorkerEvent::Finished {
            job_id,
            report: JobReport {
                status: "MP4 download complete!".into(),
                media_file: None,
                frames: None,
            },
        }
    }

    #[test]
    fn empty_url_is_rejected_without_claiming_slot() {
        let mut shell = shell_with_url("   ");
        let err = shell.submit().unwrap_err();
        assert!(matches!(err, FetchError::EmptyUrl));
        assert!(!shell.is_busy());
        assert_eq!(shell.job(), JobState::Idle);
        assert_eq!(shell.status(), STATUS_WAITING);
        let notice = shell.error().unwrap();
        assert_eq!(notice.category, ErrorCategory::Validation);
        assert_eq!(notice.message, "please enter a URL");
    }

    #[test]
    fn submit_builds_trimmed_request() {
        let mut shell = shell_with_url("  https://example.com/v  ");
        shell.kind = OutputKind::Audio;
        shell.set_output_dir("/music");
        let (job_id, request) = shell.submit().unwrap();
        assert_eq!(job_id, 1);
        assert_eq!(request.url, "https://example.com/v");
        assert_eq!(request.output_dir, PathBuf::from("/music"));
        assert_eq!(request.kind, OutputKind::Audio);
        assert!(shell.is_busy());
        assert_eq!(shell.status(), STATUS_STARTING);
    }

    #[test]
    fn blank_output_dir_falls_back_to_default() {
        let mut shell = shell_with_url("https://example.com/v");
        shell.output_dir = " ".into();
        let (_, request) = shell.submit().unwrap();
        assert_eq!(request.output_dir, PathBuf::from("downloads"));
    }

    #[test]
    fn second_submit_while_running_is_rejected() {
        let mut shell = shell_with_url("https://example.com/v");
        let (first, _) = shell.submit().unwrap();
        shell.url_input = "https://example.com/other".into();
        assert!(matches!(shell.submit(), Err(FetchError::JobActive)));
        assert_eq!(shell.job(), JobState::Running(first));

        shell.apply(finished(first));
        let (second, request) = shell.submit().unwrap();
        assert_eq!(second, first + 1);
        assert_eq!(request.url, "https://example.com/other");
    }

    #[test]
    fn progress_only_moves_forward_and_finishes_at_100() {
        let mut shell = shell_with_url("https://example.com/v");
        let (id, _) = shell.submit().unwrap();
        shell.apply(WorkerEvent::Progress { job_id: id, percent: 40 });
        shell.apply(WorkerEvent::Progress { job_id: id, percent: 10 });
        assert_eq!(shell.progress(), 40);
        shell.apply(WorkerEvent::Progress { job_id: id, percent: 250 });
        assert_eq!(shell.progress(), 100);

        shell.apply(finished(id));
        assert_eq!(shell.progress(), 100);
        assert_eq!(shell.status(), "MP4 download complete!");
        assert_eq!(shell.job(), JobState::Done(id));
        assert!(!shell.is_busy());
    }

    #[test]
    fn failure_shows_error_and_no_success_afterwards() {
        let mut shell = shell_with_url("https://example.com/v");
        let (id, _) = shell.submit().unwrap();
        shell.apply(WorkerEvent::Status {
            job_id: id,
            message: "Downloading...".into(),
        });
        shell.apply(WorkerEvent::Failed {
            job_id: id,
            error: FetchError::Fetch {
                message: "ERROR: Unsupported URL".into(),
            },
        });
        assert_eq!(shell.status(), STATUS_FAILED);
        let notice = shell.error().cloned().unwrap();
        assert_eq!(notice.category, ErrorCategory::Fetch);
        assert_eq!(notice.message, "Download failed: ERROR: Unsupported URL");

        // a late success for the same job must not overwrite the failure
        shell.apply(finished(id));
        assert_eq!(shell.status(), STATUS_FAILED);
        assert_eq!(shell.job(), JobState::Failed(id));

        shell.dismiss_error();
        assert!(shell.error().is_none());
    }

    #[test]
    fn events_from_other_jobs_are_ignored() {
        let mut shell = shell_with_url("https://example.com/v");
        let (id, _) = shell.submit().unwrap();
        shell.apply(WorkerEvent::Progress { job_id: id + 7, percent: 90 });
        shell.apply(finished(id + 7));
        assert_eq!(shell.progress(), 0);
        assert!(shell.is_busy());
    }

    #[test]
    fn failing_before_spawn_frees_the_slot() {
        let mut shell = shell_with_url("https://example.com/v");
        let (id, _) = shell.submit().unwrap();
        shell.fail_current(FetchError::Fetch {
            message: "no async runtime".into(),
        });
        assert!(!shell.is_busy());
        assert_eq!(shell.job(), JobState::Failed(id));
        assert_eq!(shell.status(), STATUS_FAILED);
        assert_eq!(shell.error().unwrap().message, "Download failed: no async runtime");

        // nothing running: no-op
        shell.dismiss_error();
        shell.fail_current(FetchError::JobActive);
        assert!(shell.error().is_none());
        assert!(shell.submit().is_ok());
    }

    #[test]
    fn new_submit_clears_previous_error() {
        let mut shell = shell_with_url("");
        let _ = shell.submit();
        assert!(shell.error().is_some());
        shell.url_input = "https://example.com/v".into();
        shell.submit().unwrap();
        assert!(shell.error().is_none());
        assert_eq!(shell.progress(), 0);
    }
}
