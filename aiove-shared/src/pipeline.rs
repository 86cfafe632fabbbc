//! Sequences one enhancement run: probe, extract, interpolate, upscale, encode.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::context::Context;
use crate::error::{AioError, Result};
use crate::paths::absolute_path;
use crate::profile::Profile;
use crate::session::Stage;
use crate::wrappers::ffmpeg::{FrameRate, VideoInfo};

/// One enhancement request.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub session: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub session: String,
    pub output: PathBuf,
    pub stages: Vec<Stage>,
    pub output_fps: FrameRate,
    pub output_size: [u32; 2],
    pub elapsed: Duration,
}

pub struct Pipeline<'a> {
    context: &'a Context,
}

impl<'a> Pipeline<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Checks everything that can be checked without running a tool.
    pub fn validate(&self, job: &Job) -> Result<()> {
        if !job.profile.interpolation.enabled && !job.profile.upscale.enabled {
            return Err(AioError::Config(
                "both interpolation and upscale are disabled, nothing to do".to_string(),
            ));
        }
        if !job.input.is_file() {
            return Err(AioError::Config(format!(
                "input video [{}] does not exist",
                job.input.display()
            )));
        }
        if absolute_path(&job.input)? == absolute_path(&job.output)? {
            return Err(AioError::Config(format!(
                "output [{}] would overwrite the input video",
                job.output.display()
            )));
        }
        job.profile.validate()
    }

    pub fn run(&self, job: &Job) -> Result<PipelineReport> {
        self.validate(job)?;
        let start = Instant::now();
        let profile = &job.profile;
        let ext = profile.image_format.as_str();
        let database = &self.context.database;

        // Locate every tool this run needs before touching the session.
        let ffmpeg = self.context.ffmpeg_wrapper()?;
        let rife = match profile.interpolation.enabled {
            true => Some(self.context.rife_wrapper()?),
            false => None,
        };
        let waifu2x = match profile.upscale.enabled {
            true => Some(self.context.waifu2x_wrapper()?),
            false => None,
        };

        let info = ffmpeg.get_video_info(&job.input)?;
        database.record_video_info(&job.session, &info)?;

        let session = self.context.sessions.setup(&job.session)?;
        database.record_stage(&job.session, Stage::Uninitialized)?;
        let mut stages = Vec::new();

        info!("Extracting frames of [{}]", job.input.display());
        ffmpeg.video_to_frames(
            &job.input,
            &session.input_original_frames,
            ext,
            Some(info.frame_count),
        )?;
        let extracted = count_frames(&session.input_original_frames, ext);
        if extracted as u64 != info.frame_count {
            warn!(
                "Extracted [{}] frames but FFmpeg reported [{}]",
                extracted, info.frame_count
            );
        }
        self.advance(&job.session, Stage::FramesExtracted, &mut stages)?;

        let (output_fps, output_size) = output_geometry(&info, profile);
        let mut latest: &Path = &session.input_original_frames;

        if let Some(rife) = &rife {
            info!("Interpolating frames with RIFE");
            rife.execute(
                latest,
                &session.output_interpolated_frames,
                ext,
                &profile.interpolation.rife,
            )?;
            latest = &session.output_interpolated_frames;
            debug!("RIFE wrote [{}] frames", count_frames(latest, ext));
            self.advance(&job.session, Stage::Interpolated, &mut stages)?;
        }

        if let Some(waifu2x) = &waifu2x {
            info!("Upscaling frames with Waifu2x");
            waifu2x.execute(
                latest,
                &session.output_upscaled_frames,
                ext,
                &profile.upscale.waifu2x,
            )?;
            latest = &session.output_upscaled_frames;
            self.advance(&job.session, Stage::Upscaled, &mut stages)?;
        }

        if let Some(parent) = job.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        info!(
            "Encoding [{}] at [{}] fps, [{}x{}]",
            job.output.display(),
            output_fps,
            output_size[0],
            output_size[1]
        );
        ffmpeg.frames_to_video(
            latest,
            ext,
            &job.input,
            &job.output,
            output_fps,
            output_size[0],
            output_size[1],
            &profile.encode,
        )?;
        self.advance(&job.session, Stage::Encoded, &mut stages)?;
        database.increment_runs_completed()?;

        Ok(PipelineReport {
            session: job.session.clone(),
            output: job.output.clone(),
            stages,
            output_fps,
            output_size,
            elapsed: start.elapsed(),
        })
    }

    fn advance(&self, session: &str, stage: Stage, stages: &mut Vec<Stage>) -> Result<()> {
        stages.push(stage);
        self.context.database.record_stage(session, stage)
    }
}

/// Frame rate and `[width, height]` of the encoded video. RIFE doubles the
/// frame count, Waifu2x multiplies both dimensions by its scale.
pub fn output_geometry(info: &VideoInfo, profile: &Profile) -> (FrameRate, [u32; 2]) {
    let fps = if profile.interpolation.enabled {
        info.fps.multiplied(2)
    } else {
        info.fps
    };
    let size = if profile.upscale.enabled {
        let scale = profile.upscale.waifu2x.scale;
        [info.width * scale, info.height * scale]
    } else {
        [info.width, info.height]
    };
    (fps, size)
}

/// Number of `*.<ext>` files directly inside `dir`.
pub fn count_frames(dir: &Path, ext: &str) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(ext))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::Directories;
    use crate::prelude::PreludeData;

    fn context(root: &Path) -> Context {
        Context::initialize(Directories::load(root).unwrap(), PreludeData::default()).unwrap()
    }

    fn job(input: PathBuf, output: PathBuf) -> Job {
        Job {
            input,
            output,
            session: "test".to_string(),
            profile: Profile::default(),
        }
    }

    #[cfg(unix)]
    mod fake_tools {
        use super::*;
        use crate::database::Database;
        use crate::locator::{BinaryLocator, FFMPEG, FFPROBE, RIFE, WAIFU2X};
        use crate::session::{IN_ORIGINAL_FRAMES, OUT_INTERPOLATED_FRAMES, OUT_UPSCALED_FRAMES};
        use std::os::unix::fs::PermissionsExt;

        const FFPROBE_SCRIPT: &str = r#"
case "$*" in
  *stream=width,height*) echo "4x2" ;;
  *avg_frame_rate*) echo "10/1" ;;
esac
"#;

        const FFMPEG_SCRIPT: &str = r#"
for last; do :; done
case "$*" in
  *"-f null"*) echo "frame=    3 fps=0.0 q=-1.0 size=N/A time=00:00:00.30 bitrate=N/A" >&2 ;;
  *-framerate*) : > "$last" ;;
  *) dir=$(dirname "$last"); for i in 1 2 3; do : > "$dir/0000000$i.png"; done ;;
esac
"#;

        const RIFE_SCRIPT: &str = r#"
for i in 1 2 3 4 5 6; do : > "$4/0000000$i.png"; done
"#;

        const RIFE_FAILING_SCRIPT: &str = r#"
echo "vkCreateInstance failed" >&2
exit 1
"#;

        const WAIFU2X_SCRIPT: &str = r#"
cp "$2"/*.png "$4"/
"#;

        /// Every invocation is appended to `<root>/calls.log`.
        fn install(dir: &Path, log: &Path, name: &str, body: &str) {
            let script = format!(
                "#!/bin/sh\necho \"{} $*\" >> \"{}\"\n{}",
                name,
                log.display(),
                body
            );
            let path = dir.join(name);
            fs::write(&path, script).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        struct Fixture {
            context: Context,
            log: PathBuf,
            input: PathBuf,
            output: PathBuf,
            _temp: tempfile::TempDir,
        }

        impl Fixture {
            fn new(rife_fails: bool) -> Fixture {
                let temp = tempfile::tempdir().unwrap();
                let dirs = Directories::load(temp.path()).unwrap();
                let tools = dirs.platform_externals.clone();
                fs::create_dir_all(tools.join("rife-anime")).unwrap();
                fs::create_dir_all(tools.join("models-upconv_7_anime_style_art_rgb")).unwrap();

                let log = dirs.root.join("calls.log");
                let rife = if rife_fails { RIFE_FAILING_SCRIPT } else { RIFE_SCRIPT };
                install(&tools, &log, FFPROBE, FFPROBE_SCRIPT);
                install(&tools, &log, FFMPEG, FFMPEG_SCRIPT);
                install(&tools, &log, RIFE, rife);
                install(&tools, &log, WAIFU2X, WAIFU2X_SCRIPT);

                let input = dirs.root.join("in.mkv");
                fs::write(&input, b"").unwrap();
                let output = dirs.root.join("out").join("enhanced.mp4");

                let mut context = Context::initialize(dirs, PreludeData::default()).unwrap();
                context.locator =
                    BinaryLocator::new(&context.dirs.externals_search_path()).externals_only();

                Fixture {
                    context,
                    log,
                    input,
                    output,
                    _temp: temp,
                }
            }

            fn job(&self) -> Job {
                job(self.input.clone(), self.output.clone())
            }

            fn calls(&self, tool: &str) -> Vec<String> {
                fs::read_to_string(&self.log)
                    .unwrap_or_default()
                    .lines()
                    .filter(|line| line.starts_with(&format!("{} ", tool)))
                    .map(str::to_string)
                    .collect()
            }

            fn session_dir(&self, name: &str) -> String {
                self.context
                    .dirs
                    .sessions
                    .join("test")
                    .join(name)
                    .display()
                    .to_string()
            }

            fn database(&self) -> &Database {
                &self.context.database
            }
        }

        #[test]
        fn full_run_walks_every_stage() {
            let fixture = Fixture::new(false);

            let report = Pipeline::new(&fixture.context).run(&fixture.job()).unwrap();

            assert_eq!(
                report.stages,
                vec![
                    Stage::FramesExtracted,
                    Stage::Interpolated,
                    Stage::Upscaled,
                    Stage::Encoded
                ]
            );
            assert_eq!(report.output_fps, FrameRate { num: 20, den: 1 });
            assert_eq!(report.output_size, [8, 4]);
            assert!(fixture.output.is_file());
            assert_eq!(fixture.database().stage("test").unwrap(), Stage::Encoded);

            let waifu2x = fixture.calls(WAIFU2X);
            assert_eq!(waifu2x.len(), 1);
            assert!(waifu2x[0].contains(&format!("-i {}", fixture.session_dir(OUT_INTERPOLATED_FRAMES))));

            let encode = fixture.calls(FFMPEG).pop().unwrap();
            assert!(encode.contains("-framerate 20/1"));
            assert!(encode.contains(&format!("{}/%08d.png", fixture.session_dir(OUT_UPSCALED_FRAMES))));
            assert!(encode.contains("fps=20/1,scale=8x4"));
        }

        #[test]
        fn upscale_only_reads_original_frames() {
            let fixture = Fixture::new(false);
            let mut job = fixture.job();
            job.profile.interpolation.enabled = false;

            let report = Pipeline::new(&fixture.context).run(&job).unwrap();

            assert_eq!(
                report.stages,
                vec![Stage::FramesExtracted, Stage::Upscaled, Stage::Encoded]
            );
            assert_eq!(report.output_fps, FrameRate { num: 10, den: 1 });
            assert!(fixture.calls(RIFE).is_empty());
            let waifu2x = fixture.calls(WAIFU2X);
            assert!(waifu2x[0].contains(&format!("-i {}", fixture.session_dir(IN_ORIGINAL_FRAMES))));
        }

        #[test]
        fn failing_interpolation_stops_before_encode() {
            let fixture = Fixture::new(true);

            let err = Pipeline::new(&fixture.context).run(&fixture.job()).unwrap_err();

            match err {
                AioError::ToolFailed { tool, stderr_tail, .. } => {
                    assert_eq!(tool, RIFE);
                    assert!(stderr_tail.contains("vkCreateInstance failed"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(fixture.calls(WAIFU2X).is_empty());
            assert!(fixture.calls(FFMPEG).iter().all(|call| !call.contains("-framerate")));
            assert!(!fixture.output.exists());
            assert_eq!(fixture.database().stage("test").unwrap(), Stage::FramesExtracted);
        }
    }

    #[test]
    fn nothing_enabled_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let context = context(temp.path());
        let input = temp.path().join("in.mp4");
        fs::write(&input, b"").unwrap();

        let mut job = job(input, temp.path().join("out.mp4"));
        job.profile.interpolation.enabled = false;
        job.profile.upscale.enabled = false;

        let err = Pipeline::new(&context).run(&job).unwrap_err();
        assert!(matches!(err, AioError::Config(_)), "{err}");
    }

    #[test]
    fn missing_input_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let context = context(temp.path());
        let job = job(temp.path().join("nope.mp4"), temp.path().join("out.mp4"));

        assert!(matches!(Pipeline::new(&context).validate(&job), Err(AioError::Config(_))));
    }

    #[test]
    fn output_equal_to_input_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let context = context(temp.path());
        let input = temp.path().join("in.mp4");
        fs::write(&input, b"").unwrap();

        let job = job(input, temp.path().join("sub").join("..").join("in.mp4"));

        assert!(matches!(Pipeline::new(&context).validate(&job), Err(AioError::Config(_))));
    }

    #[test]
    fn geometry_follows_enabled_stages() {
        let info = VideoInfo {
            frame_count: 240,
            duration: 10.0,
            fps: FrameRate { num: 24000, den: 1001 },
            width: 640,
            height: 360,
        };
        let mut profile = Profile::default();

        assert_eq!(
            output_geometry(&info, &profile),
            (FrameRate { num: 48000, den: 1001 }, [1280, 720])
        );

        profile.interpolation.enabled = false;
        profile.upscale.waifu2x.scale = 4;
        assert_eq!(output_geometry(&info, &profile), (info.fps, [2560, 1440]));
    }

    #[test]
    fn count_frames_only_counts_matching_files() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["00000001.png", "00000002.png", "notes.txt"] {
            fs::write(temp.path().join(name), b"x").unwrap();
        }
        fs::create_dir_all(temp.path().join("nested.png")).unwrap();

        assert_eq!(count_frames(temp.path(), "png"), 2);
        assert_eq!(count_frames(&temp.path().join("missing"), "png"), 0);
    }
}
