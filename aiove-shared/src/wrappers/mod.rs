//! Subprocess plumbing shared by the FFmpeg, RIFE and Waifu2x wrappers.

pub mod ffmpeg;
pub mod rife;
pub mod waifu2x;

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::error::{AioError, Result};
use crate::locator::binary_dir;

const STDERR_TAIL_LINES: usize = 20;

/// Captured output of a finished tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` to completion and captures both streams.
pub fn run_capture(tool: &str, program: &Path, args: &[OsString]) -> Result<ToolOutput> {
    debug!("Running {}: {}", tool, display_command(program, args));

    let output = Command::new(program).args(args).output()?;
    let captured = ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    check_status(tool, output.status, &captured.stderr)?;
    Ok(captured)
}

/// Runs `program` while feeding every stderr line to `on_line`.
///
/// Lines are split on both `\n` and `\r` since FFmpeg rewrites its status
/// line in place. Only the last few lines are kept for error reporting.
pub fn run_streaming<F>(tool: &str, program: &Path, args: &[OsString], mut on_line: F) -> Result<()>
where
    F: FnMut(&str),
{
    info!("Running command for {}: {}", tool, display_command(program, args));

    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let drained = match child.stderr.take() {
        Some(stderr) => drain_lines(stderr, &mut tail, &mut on_line),
        None => Ok(()),
    };
    if let Err(e) = drained {
        reap(&mut child);
        return Err(e.into());
    }

    let status = child.wait()?;
    let tail: Vec<String> = tail.into_iter().collect();
    check_status(tool, status, &tail.join("\n"))
}

/// Feeds non-empty lines of `reader` to `on_line`, keeping the last few in `tail`.
fn drain_lines<R, F>(reader: R, tail: &mut VecDeque<String>, on_line: &mut F) -> std::io::Result<()>
where
    R: Read,
    F: FnMut(&str),
{
    for line in split_lines(reader) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        on_line(&line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Ok(())
}

/// Kills and waits for a child we stopped reading from.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Child already exited: {}", e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed waiting for child: {}", e);
    }
}

fn split_lines<R: Read>(reader: R) -> impl Iterator<Item = std::io::Result<String>> {
    BufReader::new(reader).split(b'\n').flat_map(|chunk| {
        let parts: Vec<std::io::Result<String>> = match chunk {
            Ok(bytes) => bytes
                .split(|b| *b == b'\r')
                .map(|part| Ok(String::from_utf8_lossy(part).into_owned()))
                .collect(),
            Err(e) => vec![Err(e)],
        };
        parts
    })
}

fn check_status(tool: &str, status: ExitStatus, stderr: &str) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    Err(AioError::ToolFailed {
        tool: tool.to_string(),
        status: status.to_string(),
        stderr_tail: lines[start..].join("\n"),
    })
}

/// Resolves a model for the ncnn tools.
///
/// An existing directory is used as given, anything else is looked up next
/// to the tool binary, where nihui's releases ship their models.
pub fn resolve_model(binary: &Path, model: &str) -> Result<PathBuf> {
    let given = Path::new(model);
    if given.is_dir() {
        return Ok(given.to_path_buf());
    }

    let model_path = binary_dir(binary).join(model);
    if !model_path.exists() {
        return Err(AioError::ModelNotFound {
            model: model.to_string(),
            path: model_path,
        });
    }
    Ok(model_path)
}

/// Progress bar over `total` frames, or a spinner when the total is unknown.
pub fn frames_bar(total: Option<u64>, label: &str) -> ProgressBar {
    match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            let template = format!(
                "[{}][{{elapsed_precise}}] [{{wide_bar:.green/white}}] {{percent}}% {{pos:>7}}/{{len:7}} frames       eta: {{eta:<7}}",
                label
            );
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(&template)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            let template = format!("[{}][{{elapsed_precise}}] {{spinner}} {{msg}}", label);
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template(&template)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner
        }
    }
}

pub(crate) fn arg(value: impl AsRef<OsStr>) -> OsString {
    value.as_ref().to_os_string()
}

fn display_command(program: &Path, args: &[OsString]) -> String {
    let mut parts = vec![program.to_string_lossy().into_owned()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn existing_model_directory_is_used_as_is() {
        let temp = tempfile::tempdir().unwrap();
        let model_dir = temp.path().join("my-model");
        fs::create_dir_all(&model_dir).unwrap();

        let resolved = resolve_model(Path::new("/nowhere/rife-ncnn-vulkan"), model_dir.to_str().unwrap());
        assert_eq!(resolved.unwrap(), model_dir);
    }

    #[test]
    fn model_name_resolves_next_to_binary() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("rife-anime")).unwrap();
        let binary = temp.path().join("rife-ncnn-vulkan");

        let resolved = resolve_model(&binary, "rife-anime").unwrap();
        assert_eq!(resolved, temp.path().join("rife-anime"));
    }

    #[test]
    fn unknown_model_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let binary = temp.path().join("rife-ncnn-vulkan");

        let err = resolve_model(&binary, "rife-UHD").unwrap_err();
        match err {
            AioError::ModelNotFound { model, path } => {
                assert_eq!(model, "rife-UHD");
                assert_eq!(path, temp.path().join("rife-UHD"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn carriage_returns_split_lines() {
        let input: &[u8] = b"frame=  1 fps=0\rframe=  2 fps=0\nvideo:1kB\n";
        let lines: Vec<String> = split_lines(input).map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["frame=  1 fps=0", "frame=  2 fps=0", "video:1kB"]);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_surfaced() {
        let args = vec![arg("-c"), arg("echo broken >&2; exit 3")];
        let err = run_capture("sh", Path::new("sh"), &args).unwrap_err();
        match err {
            AioError::ToolFailed { tool, stderr_tail, .. } => {
                assert_eq!(tool, "sh");
                assert_eq!(stderr_tail, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct BrokenPipe;

    impl Read for BrokenPipe {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn read_errors_stop_draining() {
        let mut tail = VecDeque::new();
        let mut seen = 0;
        let result = drain_lines(BrokenPipe, &mut tail, &mut |_: &str| seen += 1);

        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::BrokenPipe);
        assert_eq!(seen, 0);
        assert!(tail.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn reaped_child_is_not_left_running() {
        let mut child = Command::new("sh")
            .args(["-c", "sleep 30"])
            .spawn()
            .unwrap();
        let start = std::time::Instant::now();

        reap(&mut child);

        assert!(child.try_wait().unwrap().is_some());
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn streaming_sees_every_stderr_line() {
        let args = vec![arg("-c"), arg("printf 'a\\rb\\nc\\n' >&2")];
        let mut seen = Vec::new();
        run_streaming("sh", Path::new("sh"), &args, |line| seen.push(line.to_string())).unwrap();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }
}
