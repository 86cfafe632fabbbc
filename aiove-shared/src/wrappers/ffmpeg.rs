use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{arg, frames_bar, run_capture, run_streaming};
use crate::error::{AioError, Result};

/// Zero padding of the numbered frame files, `00000001.png` and onwards.
pub const FRAME_DIGITS: usize = 8;

/// Average frame rate exactly as FFprobe reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u64,
    pub den: u64,
}

impl FrameRate {
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn multiplied(&self, factor: u32) -> FrameRate {
        FrameRate {
            num: self.num * u64::from(factor),
            den: self.den,
        }
    }
}

impl FromStr for FrameRate {
    type Err = AioError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let (num, den) = match raw.split_once('/') {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (raw, "1"),
        };

        let num: u64 = num.parse().map_err(|_| AioError::parse("frame rate", raw))?;
        let den: u64 = den.parse().map_err(|_| AioError::parse("frame rate", raw))?;
        if num == 0 || den == 0 {
            return Err(AioError::parse("frame rate", raw));
        }
        Ok(FrameRate { num, den })
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub frame_count: u64,
    /// Seconds.
    pub duration: f64,
    pub fps: FrameRate,
    pub width: u32,
    pub height: u32,
}

/// Encoder settings for rebuilding a video from frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    pub codec: String,
    pub crf: u8,
    pub pixel_format: String,
    /// Keyframe interval, encoder default when unset.
    pub gop: Option<u32>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            crf: 17,
            pixel_format: "yuv420p".to_string(),
            gop: None,
        }
    }
}

pub struct FFmpegWrapper {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FFmpegWrapper {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        info!(
            "FFmpeg / FFprobe binaries: [{}], [{}]",
            ffmpeg.display(),
            ffprobe.display()
        );
        Self { ffmpeg, ffprobe }
    }

    /// Splits `input` into numbered images inside `target_dir`.
    pub fn video_to_frames(
        &self,
        input: &Path,
        target_dir: &Path,
        extension: &str,
        expected_frames: Option<u64>,
    ) -> Result<()> {
        let args = video_to_frames_args(input, target_dir, extension);
        let bar = frames_bar(expected_frames, "extract");
        let frame_re = frame_regex()?;

        run_streaming("ffmpeg", &self.ffmpeg, &args, |line| {
            if let Some(frame) = last_frame(&frame_re, line) {
                bar.set_position(frame);
            }
        })?;
        bar.finish_and_clear();
        Ok(())
    }

    /// Encodes the numbered images of `frames_dir`, taking audio from
    /// `audio_source` when it has any.
    #[allow(clippy::too_many_arguments)]
    pub fn frames_to_video(
        &self,
        frames_dir: &Path,
        extension: &str,
        audio_source: &Path,
        output: &Path,
        fps: FrameRate,
        width: u32,
        height: u32,
        encode: &EncodeOptions,
    ) -> Result<()> {
        let args = frames_to_video_args(
            frames_dir,
            extension,
            audio_source,
            output,
            fps,
            (width, height),
            encode,
        );
        let bar = frames_bar(None, "encode");
        let frame_re = frame_regex()?;

        run_streaming("ffmpeg", &self.ffmpeg, &args, |line| {
            if let Some(frame) = last_frame(&frame_re, line) {
                bar.set_message(format!("{} frames encoded", frame));
                bar.tick();
            }
        })?;
        bar.finish_and_clear();
        Ok(())
    }

    /// `[width, height]` of the first video stream.
    pub fn get_video_resolution(&self, input: &Path) -> Result<[u32; 2]> {
        let output = run_capture("ffprobe", &self.ffprobe, &resolution_args(input))?;
        parse_resolution(&output.stdout)
    }

    /// Frame count and duration from a no-op transcode of the video stream.
    pub fn get_video_frame_count_and_duration(&self, input: &Path) -> Result<(u64, f64)> {
        let output = run_capture("ffmpeg", &self.ffmpeg, &frame_count_args(input))?;
        parse_frame_count_and_duration(&output.stderr)
    }

    pub fn get_video_fps(&self, input: &Path) -> Result<FrameRate> {
        let output = run_capture("ffprobe", &self.ffprobe, &fps_args(input))?;
        let first = output.stdout.lines().next().unwrap_or_default();
        first.parse()
    }

    pub fn get_video_info(&self, input: &Path) -> Result<VideoInfo> {
        info!("Getting video info of [{}]", input.display());

        let [width, height] = self.get_video_resolution(input)?;
        let (frame_count, duration) = self.get_video_frame_count_and_duration(input)?;
        let fps = self.get_video_fps(input)?;

        if frame_count == 0 {
            warn!("FFmpeg reported zero frames for [{}]", input.display());
        }

        let info = VideoInfo {
            frame_count,
            duration,
            fps,
            width,
            height,
        };
        info!("Video info: {:?}", info);
        Ok(info)
    }
}

/// `<dir>/%08d.<ext>`
pub fn frame_pattern(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!("%0{}d.{}", FRAME_DIGITS, extension))
}

pub fn video_to_frames_args(input: &Path, target_dir: &Path, extension: &str) -> Vec<OsString> {
    vec![
        arg("-hide_banner"),
        arg("-y"),
        arg("-i"),
        arg(input),
        arg("-q:v"),
        arg("1"),
        arg("-vsync"),
        arg("0"),
        arg(frame_pattern(target_dir, extension)),
    ]
}

pub fn frames_to_video_args(
    frames_dir: &Path,
    extension: &str,
    audio_source: &Path,
    output: &Path,
    fps: FrameRate,
    (width, height): (u32, u32),
    encode: &EncodeOptions,
) -> Vec<OsString> {
    let mut args = vec![
        arg("-hide_banner"),
        arg("-y"),
        arg("-framerate"),
        arg(fps.to_string()),
        arg("-i"),
        arg(frame_pattern(frames_dir, extension)),
        arg("-i"),
        arg(audio_source),
        arg("-map"),
        arg("0:v"),
        arg("-map"),
        arg("1:a?"),
        arg("-c:v"),
        arg(&encode.codec),
        arg("-crf"),
        arg(encode.crf.to_string()),
    ];
    if let Some(gop) = encode.gop {
        args.push(arg("-g"));
        args.push(arg(gop.to_string()));
    }
    args.extend([
        arg("-pix_fmt"),
        arg(&encode.pixel_format),
        arg("-vf"),
        arg(format!("fps={},scale={}x{}", fps, width, height)),
        arg(output),
    ]);
    args
}

pub fn resolution_args(input: &Path) -> Vec<OsString> {
    vec![
        arg("-v"),
        arg("error"),
        arg("-select_streams"),
        arg("v:0"),
        arg("-show_entries"),
        arg("stream=width,height"),
        arg("-of"),
        arg("csv=s=x:p=0"),
        arg(input),
    ]
}

pub fn frame_count_args(input: &Path) -> Vec<OsString> {
    vec![
        arg("-hide_banner"),
        arg("-i"),
        arg(input),
        arg("-map"),
        arg("0:v:0"),
        arg("-c"),
        arg("copy"),
        arg("-f"),
        arg("null"),
        arg("-"),
    ]
}

pub fn fps_args(input: &Path) -> Vec<OsString> {
    vec![
        arg("-v"),
        arg("error"),
        arg("-select_streams"),
        arg("v:0"),
        arg("-show_entries"),
        arg("stream=avg_frame_rate"),
        arg("-of"),
        arg("default=noprint_wrappers=1:nokey=1"),
        arg(input),
    ]
}

/// Parses FFprobe's `WxH` csv line.
pub fn parse_resolution(stdout: &str) -> Result<[u32; 2]> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| AioError::parse("resolution", stdout))?;

    let (width, height) = line
        .split_once('x')
        .ok_or_else(|| AioError::parse("resolution", stdout))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| AioError::parse("resolution", stdout))?;
    // Some containers append a trailing separator, "1920x1080x"
    let height: u32 = height
        .trim_end_matches('x')
        .trim()
        .parse()
        .map_err(|_| AioError::parse("resolution", stdout))?;
    Ok([width, height])
}

/// Last `frame=` and `time=` of an FFmpeg run, as (frames, seconds).
pub fn parse_frame_count_and_duration(stderr: &str) -> Result<(u64, f64)> {
    let frame_re = frame_regex()?;
    let time_re = Regex::new(r"time=\s*(\d+):(\d+):(\d+(?:\.\d+)?)")?;

    let frame_count =
        last_frame(&frame_re, stderr).ok_or_else(|| AioError::parse("frame count", tail(stderr)))?;

    let caps = time_re
        .captures_iter(stderr)
        .last()
        .ok_or_else(|| AioError::parse("duration", tail(stderr)))?;
    let hours: f64 = caps[1].parse().map_err(|_| AioError::parse("duration", &caps[0]))?;
    let minutes: f64 = caps[2].parse().map_err(|_| AioError::parse("duration", &caps[0]))?;
    let seconds: f64 = caps[3].parse().map_err(|_| AioError::parse("duration", &caps[0]))?;

    Ok((frame_count, hours * 3600.0 + minutes * 60.0 + seconds))
}

fn frame_regex() -> Result<Regex> {
    Ok(Regex::new(r"frame=\s*(\d+)")?)
}

fn last_frame(frame_re: &Regex, text: &str) -> Option<u64> {
    frame_re
        .captures_iter(text)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(5)..].join("\n")
}
