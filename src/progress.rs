//! Parsing of the lines yt-dlp prints on stdout.

/// Prefix of the `--progress-template` lines
pub const PROGRESS_PREFIX: &str = "fetch-progress:";
/// Prefix of the `--print after_move:` line carrying the final path
pub const SAVED_PREFIX: &str = "saved-file:";

/// One recognised stdout line
#[derive(Debug, Clone, PartialEq)]
pub enum ToolLine {
    /// Percent of the current stream, 0.0 to 100.0
    Percent(f32),
    /// Path of the file after all post-processing
    Saved(String),
    /// Anything else
    Other,
}

pub fn parse_tool_line(line: &str) -> ToolLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(pct) = parse_progress_from_line(line) {
        return ToolLine::Percent(pct);
    }
    if let Some(path) = line.strip_prefix(SAVED_PREFIX) {
        let path = path.trim();
        if !path.is_empty() {
            return ToolLine::Saved(path.to_string());
        }
    }
    ToolLine::Other
}

pub fn parse_progress_from_line(line: &str) -> Option<f32> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let number = rest.trim().strip_suffix('%')?;
    let v = number.trim().parse::<f32>().ok()?;
    v.is_finite().then(|| v.clamp(0.0, 100.0))
}

/// Maps a per-stream percentage into `0..=share` of the whole job.
pub fn scale_percent(stream_pct: f32, share: u8) -> u8 {
    let share = share.min(100);
    let scaled = (stream_pct.clamp(0.0, 100.0) / 100.0) * f32::from(share);
    (scaled.floor() as u8).min(share)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_percent() {
        assert_eq!(parse_progress_from_line("fetch-progress:  42.5%"), Some(42.5));
        assert_eq!(parse_progress_from_line("fetch-progress:100.0%"), Some(100.0));
        assert_eq!(parse_progress_from_line("fetch-progress: N/A"), None);
        assert_eq!(parse_progress_from_line("[download]  42.5%"), None);
    }

    #[test]
    fn recognises_saved_path() {
        assert_eq!(
            parse_tool_line("saved-file:/tmp/out/My Clip.mp4\n"),
            ToolLine::Saved("/tmp/out/My Clip.mp4".into())
        );
        assert_eq!(parse_tool_line("saved-file:   "), ToolLine::Other);
        assert_eq!(parse_tool_line("[Merger] Merging formats"), ToolLine::Other);
    }

    #[test]
    fn scaling_stays_inside_share() {
        assert_eq!(scale_percent(0.0, 80), 0);
        assert_eq!(scale_percent(50.0, 80), 40);
        assert_eq!(scale_percent(100.0, 95), 95);
        assert_eq!(scale_percent(250.0, 95), 95);
    }
}
