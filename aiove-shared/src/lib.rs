pub mod context;
pub mod database;
pub mod error;
pub mod greeter;
pub mod locator;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod platform;
pub mod prelude;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod wrappers;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

pub use context::Context;
pub use error::{AioError, Result};
pub use pipeline::{Job, Pipeline, PipelineReport};
pub use profile::Profile;
pub use session::{Session, SessionManager, Stage};
pub use wrappers::ffmpeg::{FFmpegWrapper, FrameRate, VideoInfo};

pub const DEFAULT_SESSION: &str = "default";

#[derive(Parser, Debug)]
#[clap(name = "aiove",
version,
about = "All in One Video Enhancer: frame interpolation and upscaling through ffmpeg, rife-ncnn-vulkan and waifu2x-ncnn-vulkan",
long_about = None)]
pub struct Args {
    /// install root holding configuration, externals and sessions
    #[clap(long, global = true, value_parser = root_validation)]
    pub root: Option<PathBuf>,

    /// don't clear the screen and print the greeter
    #[clap(long, global = true)]
    pub no_banner: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// enhance a video (defaults come from the last run)
    Run {
        /// input video path (mp4/mkv/...)
        #[clap(short = 'i', long, value_parser = input_validation)]
        input: Option<String>,

        /// output video path (mp4/mkv/...)
        #[clap(short = 'o', long, value_parser = output_validation)]
        output: Option<String>,

        /// profile name under data/profiles
        #[clap(short = 'p', long)]
        profile: Option<String>,

        /// session name, its directory is recreated on every run
        #[clap(short = 's', long, default_value = DEFAULT_SESSION)]
        session: String,

        /// skip frame interpolation
        #[clap(long)]
        no_interpolate: bool,

        /// skip upscaling
        #[clap(long)]
        no_upscale: bool,
    },

    /// print frame count, duration, fps and resolution of a video
    Probe {
        #[clap(short = 'i', long, value_parser = input_validation)]
        input: String,
    },

    /// recreate an empty session and print its directories, or list sessions
    Session { name: Option<String> },

    /// locate every external binary
    Check,

    /// list available profiles
    Profiles,
}

pub fn input_validation(s: &str) -> std::result::Result<String, String> {
    let p = Path::new(s);

    if !p.exists() {
        return Err(String::from("input path not found"));
    }
    if p.is_dir() {
        return Err(String::from("input must be a video file, not a directory"));
    }
    Ok(s.to_string())
}

pub fn output_validation(s: &str) -> std::result::Result<String, String> {
    let p = Path::new(s);

    if p.is_dir() {
        return Err(String::from("output must be a file path, not a directory"));
    }
    match p.extension().and_then(|e| e.to_str()) {
        Some("mp4" | "mkv" | "avi" | "mov" | "webm") => Ok(s.to_string()),
        _ => Err(String::from("valid output formats: mp4/mkv/avi/mov/webm")),
    }
}

fn root_validation(s: &str) -> std::result::Result<PathBuf, String> {
    let p = Path::new(s);

    if p.exists() && !p.is_dir() {
        return Err(String::from("root must be a directory"));
    }
    Ok(p.to_path_buf())
}
