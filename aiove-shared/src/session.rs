use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AioError, Result};

pub const IN_ORIGINAL_FRAMES: &str = "in_original_frames";
pub const OUT_INTERPOLATED_FRAMES: &str = "out_interpolated_frames";
pub const OUT_UPSCALED_FRAMES: &str = "out_upscaled_frames";

/// Progress of one session, only ever advanced in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Uninitialized,
    FramesExtracted,
    Interpolated,
    Upscaled,
    Encoded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Uninitialized => "uninitialized",
            Stage::FramesExtracted => "frames-extracted",
            Stage::Interpolated => "interpolated",
            Stage::Upscaled => "upscaled",
            Stage::Encoded => "encoded",
        };
        f.write_str(name)
    }
}

/// Working directories of one enhancement run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub root: PathBuf,
    pub input_original_frames: PathBuf,
    pub output_interpolated_frames: PathBuf,
    pub output_upscaled_frames: PathBuf,
}

impl Session {
    fn at(sessions_root: &Path, name: &str) -> Session {
        let root = sessions_root.join(name);
        Session {
            name: name.to_string(),
            input_original_frames: root.join(IN_ORIGINAL_FRAMES),
            output_interpolated_frames: root.join(OUT_INTERPOLATED_FRAMES),
            output_upscaled_frames: root.join(OUT_UPSCALED_FRAMES),
            root,
        }
    }

    pub fn working_dirs(&self) -> [&Path; 3] {
        [
            &self.input_original_frames,
            &self.output_interpolated_frames,
            &self.output_upscaled_frames,
        ]
    }
}

pub struct SessionManager {
    sessions_root: PathBuf,
}

impl SessionManager {
    pub fn new(sessions_root: PathBuf) -> Self {
        Self { sessions_root }
    }

    /// Deletes any previous session called `name` and recreates its empty
    /// working directories. Never reuses what was there.
    pub fn setup(&self, name: &str) -> Result<Session> {
        validate_name(name)?;
        let session = Session::at(&self.sessions_root, name);

        info!("Setting up session [{}] at [{}]", name, session.root.display());
        rmdir(&session.root)?;

        for dir in session.working_dirs() {
            debug!("Creating [{}]", dir.display());
            fs::create_dir_all(dir)?;
        }
        Ok(session)
    }

    /// Names of the sessions currently on disk.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.sessions_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.sessions_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// A session name must be exactly one normal path component.
fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(AioError::InvalidSession(name.to_string())),
    }
}

/// Removes `path` recursively: one attempt, a check, a second attempt, then
/// an error if the directory is still there.
fn rmdir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        debug!("Directory doesn't exist, nothing to remove [{}]", path.display());
        return Ok(());
    }

    info!("Removing dir: [{}]", path.display());
    if fs::remove_dir_all(path).is_ok() && !path.is_dir() {
        return Ok(());
    }

    warn!("Error removing [{}], trying again", path.display());
    fs::remove_dir_all(path)?;
    if path.is_dir() {
        return Err(AioError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("could not remove directory [{}]", path.display()),
        )));
    }
    Ok(())
}
