//! The fetch worker: runs yt-dlp, then ffmpeg for frame extraction.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
};

use crate::error::{FetchError, Result, Tool};
use crate::model::{DownloadRequest, JobId, JobReport, OutputKind, WorkerEvent};
use crate::progress::{PROGRESS_PREFIX, SAVED_PREFIX, ToolLine, parse_tool_line, scale_percent};

/// Sub-folder that receives extracted frames
pub const FRAMES_DIR: &str = "frames";
/// ffmpeg output pattern inside the frames folder
pub const FRAME_PATTERN: &str = "frame%03d.jpg";

const AUDIO_FORMAT: &str = "mp3";
const AUDIO_QUALITY: &str = "192K";
const VIDEO_CONTAINER: &str = "mp4";

/// Resolved external executables for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub ytdlp: PathBuf,
    pub ffmpeg: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Keep the downloaded video after its frames were extracted
    pub keep_intermediate_video: bool,
}

/// Sends events for one job; a closed receiver is not an error.
struct Reporter {
    job_id: JobId,
    tx: UnboundedSender<WorkerEvent>,
}

impl Reporter {
    fn progress(&self, percent: u8) {
        let _ = self.tx.send(WorkerEvent::Progress {
            job_id: self.job_id,
            percent: percent.min(100),
        });
    }

    fn status(&self, message: impl Into<String>) {
        let _ = self.tx.send(WorkerEvent::Status {
            job_id: self.job_id,
            message: message.into(),
        });
    }
}

/// Runs one request to completion and emits exactly one outcome event.
pub async fn run_job(
    job_id: JobId,
    request: DownloadRequest,
    tools: Toolchain,
    options: JobOptions,
    tx: UnboundedSender<WorkerEvent>,
) {
    info!("job {job_id}: {:?} from {}", request.kind, request.url);
    let reporter = Reporter {
        job_id,
        tx: tx.clone(),
    };

    let event = match fetch(&request, &tools, options, &reporter).await {
        Ok(report) => {
            info!("job {job_id}: {}", report.status);
            reporter.progress(100);
            WorkerEvent::Finished { job_id, report }
        }
        Err(error) => {
            warn!("job {job_id} failed ({:?}): {error}", error.category());
            WorkerEvent::Failed { job_id, error }
        }
    };
    let _ = tx.send(event);
}

async fn fetch(
    request: &DownloadRequest,
    tools: &Toolchain,
    options: JobOptions,
    reporter: &Reporter,
) -> Result<JobReport> {
    tokio::fs::create_dir_all(&request.output_dir)
        .await
        .map_err(|e| FetchError::filesystem(&request.output_dir, e))?;

    // merging, mp3 extraction and frame splitting all go through ffmpeg
    let ffmpeg = tools
        .ffmpeg
        .as_deref()
        .ok_or(FetchError::ToolNotFound { tool: Tool::Ffmpeg })?;

    reporter.status("Downloading...");
    let args = ytdlp_args(request, ffmpeg);
    let media_file = run_ytdlp(&tools.ytdlp, args, request.kind.fetch_share(), reporter).await?;

    let status = format!("{} download complete!", request.kind.label());
    match request.kind {
        OutputKind::ImageSequence => {
            let frames_dir = request.output_dir.join(FRAMES_DIR);
            tokio::fs::create_dir_all(&frames_dir)
                .await
                .map_err(|e| FetchError::filesystem(&frames_dir, e))?;
            clear_frames(&frames_dir).await?;

            reporter.status("Extracting frames...");
            extract_frames(ffmpeg, &media_file, &frames_dir).await?;
            let count = count_frames(&frames_dir).await?;
            if count == 0 {
                return Err(FetchError::Conversion {
                    message: format!("ffmpeg wrote no frames to {}", frames_dir.display()),
                });
            }
            reporter.progress(99);

            let media_file = if options.keep_intermediate_video {
                Some(media_file)
            } else {
                tokio::fs::remove_file(&media_file)
                    .await
                    .map_err(|e| FetchError::filesystem(&media_file, e))?;
                None
            };
            Ok(JobReport {
                status,
                media_file,
                frames: Some((frames_dir, count)),
            })
        }
        OutputKind::Video | OutputKind::Audio => Ok(JobReport {
            status,
            media_file: Some(media_file),
            frames: None,
        }),
    }
}

/// yt-dlp arguments for a request, URL last.
pub fn ytdlp_args(request: &DownloadRequest, ffmpeg: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let mut push = |s: &str| args.push(OsString::from(s));

    match request.kind {
        OutputKind::Video => {
            push("-f");
            push("bestvideo+bestaudio/best");
            push("--merge-output-format");
            push(VIDEO_CONTAINER);
        }
        OutputKind::Audio => {
            push("-f");
            push("bestaudio/best");
            push("-x");
            push("--audio-format");
            push(AUDIO_FORMAT);
            push("--audio-quality");
            push(AUDIO_QUALITY);
        }
        OutputKind::ImageSequence => {
            push("-f");
            push("bestvideo/best");
        }
    }

    push("--no-playlist");
    push("--newline");
    push("--progress");
    push("--progress-template");
    push(&format!("download:{PROGRESS_PREFIX}%(progress._percent_str)s"));
    push("--print");
    push(&format!("after_move:{SAVED_PREFIX}%(filepath)s"));

    args.push("-o".into());
    args.push(request.output_dir.join("%(title)s.%(ext)s").into_os_string());
    args.push("--ffmpeg-location".into());
    args.push(ffmpeg.as_os_str().to_owned());
    args.push("--".into());
    args.push(request.url.clone().into());
    args
}

async fn run_ytdlp(
    bin: &Path,
    args: Vec<OsString>,
    share: u8,
    reporter: &Reporter,
) -> Result<PathBuf> {
    debug!("running {} {:?}", bin.display(), args);
    let mut child = Command::new(bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| FetchError::Fetch {
            message: format!("failed to start {}: {e}", bin.display()),
        })?;

    let stderr = child.stderr.take().map(collect_lines);
    let mut saved: Option<PathBuf> = None;
    let mut last_pct = 0u8;

    if let Some(out) = child.stdout.take() {
        let mut lines = BufReader::new(out).lines();
        while let Some(line) = lines.next_line().await.map_err(|e| FetchError::Fetch {
            message: format!("reading yt-dlp output: {e}"),
        })? {
            match parse_tool_line(&line) {
                ToolLine::Percent(pct) => {
                    // separate video and audio streams each count 0..100
                    let scaled = scale_percent(pct, share);
                    if scaled > last_pct {
                        last_pct = scaled;
                        reporter.progress(scaled);
                    }
                }
                ToolLine::Saved(path) => saved = Some(PathBuf::from(path)),
                ToolLine::Other => debug!("yt-dlp> {line}"),
            }
        }
    }

    let status = child.wait().await.map_err(|e| FetchError::Fetch {
        message: format!("waiting for yt-dlp: {e}"),
    })?;
    let stderr = join_lines(stderr).await;
    info!("yt-dlp exited with {status}");

    if !status.success() {
        return Err(FetchError::Fetch {
            message: failure_message(&stderr)
                .unwrap_or_else(|| format!("yt-dlp exited with {status}")),
        });
    }
    saved.ok_or_else(|| FetchError::Fetch {
        message: "yt-dlp did not report a downloaded file".into(),
    })
}

/// `ffmpeg -i <video> <frames>/frame%03d.jpg`
pub fn ffmpeg_frame_args(video: &Path, frames_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(video.as_os_str().to_owned());
    args.push(frames_dir.join(FRAME_PATTERN).into_os_string());
    args
}

async fn extract_frames(ffmpeg: &Path, video: &Path, frames_dir: &Path) -> Result<()> {
    let args = ffmpeg_frame_args(video, frames_dir);
    debug!("running {} {:?}", ffmpeg.display(), args);
    let output = Command::new(ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| FetchError::Conversion {
            message: format!("failed to start {}: {e}", ffmpeg.display()),
        })?;
    info!("ffmpeg exited with {}", output.status);

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<String> = stderr.lines().map(str::to_owned).collect();
        return Err(FetchError::Conversion {
            message: failure_message(&lines)
                .unwrap_or_else(|| format!("ffmpeg exited with {}", output.status)),
        });
    }
    Ok(())
}

/// `frameNNN.jpg`, the names ffmpeg writes for [`FRAME_PATTERN`]
fn is_frame_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.strip_prefix("frame")
        .and_then(|rest| rest.strip_suffix(".jpg"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

async fn frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FetchError::filesystem(dir, e))?;
    let mut frames = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FetchError::filesystem(dir, e))?
    {
        let path = entry.path();
        if is_frame_file(&path) {
            frames.push(path);
        }
    }
    Ok(frames)
}

/// Removes frames left by an earlier job so they are not counted or mixed in.
async fn clear_frames(dir: &Path) -> Result<()> {
    let stale = frame_files(dir).await?;
    if !stale.is_empty() {
        info!("removing {} old frames from {}", stale.len(), dir.display());
    }
    for path in stale {
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| FetchError::filesystem(&path, e))?;
    }
    Ok(())
}

async fn count_frames(dir: &Path) -> Result<usize> {
    Ok(frame_files(dir).await?.len())
}

fn collect_lines<R>(reader: R) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = Vec::new();
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("stderr> {line}");
            collected.push(line);
        }
        collected
    })
}

async fn join_lines(handle: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Last `ERROR:` line, else the last non-empty line.
fn failure_message(lines: &[String]) -> Option<String> {
    let mut non_empty = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
    let last = non_empty.clone().last();
    non_empty
        .rfind(|l| l.starts_with("ERROR:"))
        .or(last)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: OutputKind) -> DownloadRequest {
        DownloadRequest {
            url: "https://example.com/watch?v=abc".into(),
            output_dir: PathBuf::from("/tmp/out"),
            kind,
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let idx = args.iter().position(|a| a == flag)?;
        args.get(idx + 1).map(String::as_str)
    }

    #[test]
    fn video_merges_into_mp4() {
        let args = strings(&ytdlp_args(&request(OutputKind::Video), Path::new("/opt/ffmpeg")));
        assert_eq!(value_after(&args, "-f"), Some("bestvideo+bestaudio/best"));
        assert_eq!(value_after(&args, "--merge-output-format"), Some("mp4"));
        assert_eq!(value_after(&args, "--ffmpeg-location"), Some("/opt/ffmpeg"));
        assert!(!args.iter().any(|a| a == "-x"));
    }

    #[test]
    fn audio_extracts_mp3_at_fixed_quality() {
        let ffmpeg = PathBuf::from("/opt/ffmpeg");
        let args = strings(&ytdlp_args(&request(OutputKind::Audio), &ffmpeg));
        assert_eq!(value_after(&args, "-f"), Some("bestaudio/best"));
        assert!(args.iter().any(|a| a == "-x"));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("192K"));
        assert_eq!(value_after(&args, "--ffmpeg-location"), Some("/opt/ffmpeg"));
    }

    #[test]
    fn frames_fetch_video_only_stream() {
        let args = strings(&ytdlp_args(&request(OutputKind::ImageSequence), Path::new("ffmpeg")));
        assert_eq!(value_after(&args, "-f"), Some("bestvideo/best"));
        assert!(!args.iter().any(|a| a == "--merge-output-format"));
    }

    #[test]
    fn url_follows_option_terminator() {
        let mut req = request(OutputKind::Video);
        req.url = "-not-a-flag".into();
        let args = strings(&ytdlp_args(&req, Path::new("ffmpeg")));
        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "-not-a-flag");
        assert_eq!(
            value_after(&args, "-o"),
            Some("/tmp/out/%(title)s.%(ext)s")
        );
        assert_eq!(
            value_after(&args, "--print"),
            Some("after_move:saved-file:%(filepath)s")
        );
    }

    #[test]
    fn frame_args_target_frames_folder() {
        let args = strings(&ffmpeg_frame_args(
            Path::new("/tmp/out/clip.webm"),
            Path::new("/tmp/out/frames"),
        ));
        assert_eq!(value_after(&args, "-i"), Some("/tmp/out/clip.webm"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out/frames/frame%03d.jpg"));
    }

    #[test]
    fn only_numbered_jpgs_count_as_frames() {
        assert!(is_frame_file(Path::new("/out/frames/frame001.jpg")));
        assert!(is_frame_file(Path::new("frame1234.jpg")));
        assert!(!is_frame_file(Path::new("frame.jpg")));
        assert!(!is_frame_file(Path::new("cover.jpg")));
        assert!(!is_frame_file(Path::new("frame001.png")));
        assert!(!is_frame_file(Path::new("frame01a.jpg")));
    }

    #[test]
    fn failure_message_prefers_error_line() {
        let lines: Vec<String> = vec![
            "WARNING: something".into(),
            "ERROR: [generic] Unsupported URL: https://x".into(),
            "  ".into(),
            "trailing note".into(),
        ];
        assert_eq!(
            failure_message(&lines).as_deref(),
            Some("ERROR: [generic] Unsupported URL: https://x")
        );
        assert_eq!(
            failure_message(&["a".into(), "b".into(), "".into()]).as_deref(),
            Some("b")
        );
        assert_eq!(failure_message(&[]), None);
    }
}
