//! Video inspection and sorting backed by `ffprobe` and `ffmpeg`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OpsError, OpsResult};
use crate::fsutil::{
    file_name_string, has_extension, move_path, require_dir, top_level_files, unique_destination,
    walk_files,
};
use crate::log::{OperationLog, action};
use crate::model::{Invocation, Manifest, Operation};
use crate::tool::{ExternalTool, ResolvedTool};

const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "avi", "mov", "flv", "wmv"];
const LONG_VIDEO_SECS: f64 = 480.0;
const LONG_VIDEOS_DIR: &str = "Long_Videos";
const FAULTY_VIDEOS_DIR: &str = "faulty_videos";
const UNKNOWN_RESOLUTION: &str = "Unknown_Resolution";
const CORRUPT_DIR: &str = "Corrupt";
const COMPRESSED_DIR: &str = "Compressed";

fn first_line(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Seconds from `ffprobe -show_entries format=duration -of csv=p=0`.
fn parse_duration(stdout: &[u8]) -> Option<f64> {
    first_line(stdout)?
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// `WxH` from `ffprobe -show_entries stream=width,height -of csv=s=x:p=0`.
fn parse_dimensions(stdout: &[u8]) -> Option<String> {
    let line = first_line(stdout)?;
    let mut parts = line.split('x').filter(|part| !part.is_empty());
    let width = parts.next()?.parse::<u32>().ok()?;
    let height = parts.next()?.parse::<u32>().ok()?;
    Some(format!("{width}x{height}"))
}

/// `<height>p` from `ffprobe -show_entries stream=height -of csv=p=0`.
fn parse_height(stdout: &[u8]) -> Option<String> {
    let line = first_line(stdout)?;
    let height = line.trim_end_matches(',').parse::<u32>().ok()?;
    Some(format!("{height}p"))
}

struct Probe(ResolvedTool);

impl Probe {
    fn query(&self, path: &Path, entries: &str, format: &str) -> Option<Vec<u8>> {
        self.0
            .output([
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-select_streams"),
                OsStr::new("v:0"),
                OsStr::new("-show_entries"),
                OsStr::new(entries),
                OsStr::new("-of"),
                OsStr::new(format),
                path.as_os_str(),
            ])
            .ok()
            .filter(|output| output.status.success())
            .map(|output| output.stdout)
    }

    fn duration(&self, path: &Path) -> Option<f64> {
        parse_duration(&self.query(path, "format=duration", "csv=p=0")?)
    }

    fn dimensions(&self, path: &Path) -> Option<String> {
        parse_dimensions(&self.query(path, "stream=width,height", "csv=s=x:p=0")?)
    }

    fn height(&self, path: &Path) -> Option<String> {
        parse_height(&self.query(path, "stream=height", "csv=p=0")?)
    }
}

/// Running totals shared by the sorting operations.
#[derive(Default)]
struct Tally {
    moved: u64,
    skipped: u64,
}

impl Tally {
    /// Move `file` into `folder`, honouring dry run and skipping files already there.
    fn move_into(
        &mut self,
        log: &mut OperationLog,
        dry_run: bool,
        file: &Path,
        folder: &Path,
    ) -> OpsResult<()> {
        if file.parent() == Some(folder) {
            log.line(format!("[Skipped] Already in correct folder: {}", file.display()))?;
            self.skipped += 1;
            return Ok(());
        }
        let destination = unique_destination(folder, file.file_name().unwrap_or_default());
        if !dry_run {
            if let Err(err) = move_path(file, &destination) {
                log.line(format!("Error moving {}: {}", file.display(), err.detail()))?;
                self.skipped += 1;
                return Ok(());
            }
        }
        log.line(format!(
            "{}: {} -> {}",
            action(dry_run, "Moved", "[Dry Run] Would move"),
            file.display(),
            destination.display()
        ))?;
        self.moved += 1;
        Ok(())
    }

    fn finish(self, mut log: OperationLog) -> OpsResult<Manifest> {
        log.line(format!("Moved: {}, Skipped: {}", self.moved, self.skipped))?;
        log.finish()?;
        Ok(Manifest::counts(self.moved, self.skipped))
    }
}

fn top_level_videos(target: &Path) -> OpsResult<Vec<PathBuf>> {
    Ok(top_level_files(target)?
        .into_iter()
        .filter(|path| has_extension(path, &VIDEO_EXTENSIONS))
        .collect())
}

/// Moves `.mp4` files longer than eight minutes into `Long_Videos/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveLongVideos;

impl Operation for MoveLongVideos {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        let Some(ffprobe) = ExternalTool::FFPROBE.resolve() else {
            return log.soft_failure(ExternalTool::FFPROBE.missing_message());
        };
        let probe = Probe(ffprobe);
        let long_dir = target.join(LONG_VIDEOS_DIR);
        let faulty_dir = target.join(FAULTY_VIDEOS_DIR);

        let videos = walk_files(target, |dir| dir == long_dir.as_path() || dir == faulty_dir.as_path())?;
        let mut tally = Tally::default();
        for video in videos.iter().filter(|path| has_extension(path, &["mp4"])) {
            match probe.duration(video) {
                None => {
                    log.line(format!("Unreadable duration: {}", video.display()))?;
                    tally.move_into(&mut log, invocation.dry_run, video, &faulty_dir)?;
                }
                Some(secs) if secs > LONG_VIDEO_SECS => {
                    tally.move_into(&mut log, invocation.dry_run, video, &long_dir)?;
                }
                Some(_) => tally.skipped += 1,
            }
        }
        tally.finish(log)
    }
}

/// Moves top-level videos into `<width>x<height>/` folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegregateByResolution;

impl Operation for SegregateByResolution {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        sort_by_probe(invocation, Probe::dimensions)
    }
}

/// Moves top-level videos into `<height>p/` folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegregateByHeight;

impl Operation for SegregateByHeight {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        sort_by_probe(invocation, Probe::height)
    }
}

fn sort_by_probe(
    invocation: &Invocation<'_>,
    classify: fn(&Probe, &Path) -> Option<String>,
) -> OpsResult<Manifest> {
    let target = invocation.target;
    require_dir(target)?;
    let mut log = OperationLog::open(invocation.log_path)?;
    let Some(ffprobe) = ExternalTool::FFPROBE.resolve() else {
        return log.soft_failure(ExternalTool::FFPROBE.missing_message());
    };
    let probe = Probe(ffprobe);
    log.line(format!("Dry Run: {}", invocation.dry_run))?;

    let mut tally = Tally::default();
    for video in top_level_videos(target)? {
        let folder = classify(&probe, &video).unwrap_or_else(|| UNKNOWN_RESOLUTION.to_string());
        tally.move_into(&mut log, invocation.dry_run, &video, &target.join(folder))?;
    }
    tally.finish(log)
}

/// Moves top-level videos that fail a full decode into `Corrupt/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectCorruptVideos;

impl DetectCorruptVideos {
    fn is_corrupt(ffmpeg: &ResolvedTool, video: &Path) -> bool {
        let output = ffmpeg.output([
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-f"),
            OsStr::new("null"),
            OsStr::new("-"),
        ]);
        output.map_or(true, |output| {
            !String::from_utf8_lossy(&output.stderr).trim().is_empty()
        })
    }
}

impl Operation for DetectCorruptVideos {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        let Some(ffmpeg) = ExternalTool::FFMPEG.resolve() else {
            return log.soft_failure(ExternalTool::FFMPEG.missing_message());
        };
        let corrupt_dir = target.join(CORRUPT_DIR);

        let mut tally = Tally::default();
        for video in top_level_videos(target)? {
            if Self::is_corrupt(&ffmpeg, &video) {
                log.line(format!("Corrupt: {}", file_name_string(&video)))?;
                tally.move_into(&mut log, invocation.dry_run, &video, &corrupt_dir)?;
            } else {
                log.line(format!("OK: {}", file_name_string(&video)))?;
                tally.skipped += 1;
            }
        }
        tally.finish(log)
    }
}

/// Re-encodes top-level videos with HEVC into `Compressed/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressVideos;

impl CompressVideos {
    fn encode(ffmpeg: &ResolvedTool, input: &Path, output: &Path) -> Result<(), String> {
        let result = ffmpeg.output([
            OsStr::new("-n"),
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-c:v"),
            OsStr::new("libx265"),
            OsStr::new("-crf"),
            OsStr::new("28"),
            OsStr::new("-preset"),
            OsStr::new("medium"),
            OsStr::new("-c:a"),
            OsStr::new("aac"),
            OsStr::new("-b:a"),
            OsStr::new("128k"),
            output.as_os_str(),
        ]);
        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(String::from_utf8_lossy(&out.stderr).trim().to_string()),
            Err(err) => Err(err.detail()),
        }
    }
}

impl Operation for CompressVideos {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        let output_dir = target.join(COMPRESSED_DIR);
        let videos = top_level_videos(target)?;
        if videos.is_empty() {
            log.line("No video files found.")?;
            log.finish()?;
            return Ok(Manifest::counts(0, 0));
        }

        let ffmpeg = if invocation.dry_run {
            None
        } else {
            match ExternalTool::FFMPEG.resolve() {
                Some(ffmpeg) => Some(ffmpeg),
                None => return log.soft_failure(ExternalTool::FFMPEG.missing_message()),
            }
        };

        let (mut compressed, mut skipped) = (0_u64, 0_u64);
        for video in &videos {
            let output = output_dir.join(video.file_name().unwrap_or_default());
            if output.exists() {
                log.line(format!("[Skipped] Already compressed: {}", output.display()))?;
                skipped += 1;
                continue;
            }
            let Some(ffmpeg) = &ffmpeg else {
                log.line(format!(
                    "[Dry Run] Would compress: {} -> {}",
                    video.display(),
                    output.display()
                ))?;
                compressed += 1;
                continue;
            };
            fs::create_dir_all(&output_dir)
                .map_err(|source| OpsError::io("compress_videos.create_dir", &output_dir, source))?;
            match Self::encode(ffmpeg, video, &output) {
                Ok(()) => {
                    log.line(format!("Compressed: {}", file_name_string(video)))?;
                    compressed += 1;
                }
                Err(reason) => {
                    log.line(format!("Error compressing {}: {reason}", video.display()))?;
                    skipped += 1;
                }
            }
        }

        log.line(format!("Compressed: {compressed}, Skipped: {skipped}"))?;
        log.finish()?;
        Ok(Manifest::counts(compressed, skipped))
    }
}
