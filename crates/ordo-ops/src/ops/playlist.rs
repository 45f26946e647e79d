//! Playlist download through `yt-dlp`.

use std::ffi::OsString;

use crate::error::OpsResult;
use crate::fsutil::require_dir;
use crate::log::OperationLog;
use crate::model::{Invocation, Manifest, Operation, params};
use crate::tool::ExternalTool;

const DEFAULT_RESOLUTION: &str = "1080p";
const DEFAULT_HEIGHT: u32 = 1080;

/// Height cap extracted from a label such as `720p`.
fn target_height(resolution: &str) -> u32 {
    let digits: String = resolution.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(DEFAULT_HEIGHT)
}

fn format_selector(height: u32) -> String {
    format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
}

/// Downloads a playlist into `<target>/<playlist title>/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadPlaylist;

impl DownloadPlaylist {
    fn arguments(url: &str, output_template: String, height: u32, dry_run: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            format_selector(height).into(),
            "-o".into(),
            output_template.into(),
            "--merge-output-format".into(),
            "mp4".into(),
            "--ignore-errors".into(),
            "--no-warnings".into(),
            "--no-check-certificates".into(),
        ];
        if dry_run {
            args.extend(["--simulate".into(), "--print".into(), "%(title)s".into()]);
        } else {
            args.extend([
                "--no-simulate".into(),
                "--print".into(),
                "after_move:filepath".into(),
            ]);
        }
        args.push(url.into());
        args
    }
}

impl Operation for DownloadPlaylist {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        let Some(url) = invocation.params.get(params::PLAYLIST_URL) else {
            return log.soft_failure("Please enter a playlist URL.");
        };
        let resolution = invocation
            .params
            .get(params::PLAYLIST_RESOLUTION)
            .unwrap_or(DEFAULT_RESOLUTION);
        let height = target_height(resolution);
        log.line(format!("Starting playlist download: {url}"))?;
        log.line(format!("Target Resolution: {resolution} (approx height: {height})"))?;

        let Some(yt_dlp) = ExternalTool::YT_DLP.resolve() else {
            return log.soft_failure(ExternalTool::YT_DLP.missing_message());
        };
        let template = format!("{}/%(playlist_title)s/%(title)s.%(ext)s", target.display());
        let output = yt_dlp.output(Self::arguments(url, template, height, invocation.dry_run))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut downloaded = 0_u64;
        for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if invocation.dry_run {
                log.line(format!("[Dry Run] Would download: {line}"))?;
            } else {
                log.line(format!("Downloaded: {line}"))?;
            }
            downloaded += 1;
        }
        let mut failed = 0_u64;
        for line in stderr.lines().map(str::trim).filter(|line| line.starts_with("ERROR")) {
            log.line(format!("[ERROR] {line}"))?;
            failed += 1;
        }
        if !output.status.success() && downloaded == 0 && failed == 0 {
            return log.soft_failure(format!("yt-dlp exited with {}", output.status));
        }

        log.line("Playlist processing completed.")?;
        log.finish()?;
        Ok(Manifest::counts(downloaded, failed))
    }
}
