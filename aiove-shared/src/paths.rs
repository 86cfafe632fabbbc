//! Install root resolution and the `directories.yaml` layout.
//!
//! Every path the tool touches lives under the install root. The
//! directories file may relocate any of them; inside it `~~` stands for the
//! install root and `/` is replaced by the platform separator.

use std::env;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AioError, Result};
use crate::platform::Platform;

pub const ENV_ROOT: &str = "AIOVE_ROOT";
pub const DIRECTORIES_FILE: &str = "directories.yaml";
pub const PRELUDE_FILE: &str = "prelude.toml";

/// Raw, unexpanded entries of `directories.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DirectoriesFile {
    pub externals: String,
    pub sessions: String,
    pub data: String,
    pub profiles: String,
    pub runtime_file: String,
    pub database_file: String,
    pub log_file: String,
}

impl Default for DirectoriesFile {
    fn default() -> Self {
        Self {
            externals: "~~/externals".to_string(),
            sessions: "~~/sessions".to_string(),
            data: "~~/data".to_string(),
            profiles: "~~/data/profiles".to_string(),
            runtime_file: "~~/runtime.yaml".to_string(),
            database_file: "~~/data/database.sqlite3".to_string(),
            log_file: "~~/last_log.log".to_string(),
        }
    }
}

/// Expanded absolute locations used at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directories {
    pub root: PathBuf,
    pub externals: PathBuf,
    pub platform_externals: PathBuf,
    pub sessions: PathBuf,
    pub data: PathBuf,
    pub profiles: PathBuf,
    pub runtime_file: PathBuf,
    pub database_file: PathBuf,
    pub log_file: PathBuf,
}

impl Directories {
    /// Reads `<root>/directories.yaml` (if any) and expands every entry.
    pub fn load(root: &Path) -> Result<Directories> {
        let root = absolute_path(root)?;
        let file = root.join(DIRECTORIES_FILE);

        let raw = if file.exists() {
            info!("Loading directories from [{}]", file.display());
            let content = fs::read_to_string(&file)?;
            if content.trim().is_empty() {
                DirectoriesFile::default()
            } else {
                serde_yaml::from_str(&content)?
            }
        } else {
            debug!("No [{}], using default layout", file.display());
            DirectoriesFile::default()
        };

        Self::from_raw(&root, &raw)
    }

    pub fn from_raw(root: &Path, raw: &DirectoriesFile) -> Result<Directories> {
        let externals = expand_dir(&raw.externals, root)?;
        let platform_externals = externals.join(Platform::current().as_str());

        Ok(Directories {
            root: root.to_path_buf(),
            externals,
            platform_externals,
            sessions: expand_dir(&raw.sessions, root)?,
            data: expand_dir(&raw.data, root)?,
            profiles: expand_dir(&raw.profiles, root)?,
            runtime_file: expand_dir(&raw.runtime_file, root)?,
            database_file: expand_dir(&raw.database_file, root)?,
            log_file: expand_dir(&raw.log_file, root)?,
        })
    }

    /// Creates the directories every run relies on.
    pub fn create_all(&self) -> Result<()> {
        for dir in [
            &self.externals,
            &self.platform_externals,
            &self.sessions,
            &self.data,
            &self.profiles,
        ] {
            mkdir_dne(dir)?;
        }
        Ok(())
    }

    /// Directories searched for binaries besides PATH.
    pub fn externals_search_path(&self) -> Vec<PathBuf> {
        vec![self.externals.clone(), self.platform_externals.clone()]
    }
}

/// Picks the install root: explicit override, then `AIOVE_ROOT`, then the
/// directory holding the running executable.
pub fn resolve_root(cli_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_override {
        return absolute_path(path);
    }

    if let Some(env_root) = env::var_os(ENV_ROOT) {
        return absolute_path(Path::new(&env_root));
    }

    let exe = env::current_exe()?;
    let dir = exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    absolute_path(&dir)
}

/// Expands one `directories.yaml` entry against the install root.
pub fn expand_dir(dir_string: &str, root: &Path) -> Result<PathBuf> {
    let mut expanded = dir_string.replace("~~", &root.to_string_lossy());
    if MAIN_SEPARATOR != '/' {
        expanded = expanded.replace('/', &MAIN_SEPARATOR.to_string());
    }
    debug!("Expanded [{}] -> [{}]", dir_string, expanded);
    absolute_path(expand_home(&expanded)?)
}

/// `~` and `~/...` point into the user's home directory.
fn expand_home(path: &str) -> Result<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with(['/', MAIN_SEPARATOR]) => &rest[1..],
        _ => return Ok(PathBuf::from(path)),
    };
    let home = dirs::home_dir().ok_or_else(|| {
        AioError::Config(format!("cannot expand [{}], no home directory found", path))
    })?;
    Ok(home.join(rest))
}

/// Absolute, lexically cleaned version of `path`.
pub fn absolute_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    }
    .clean();

    Ok(absolute_path)
}

/// `mkdir -p`
pub fn mkdir_dne(path: &Path) -> Result<()> {
    if !path.is_dir() {
        debug!("Creating directory [{}]", path.display());
    }
    fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_tilde_expands_to_root() {
        let root = Path::new("/opt/aiove");
        let expanded = expand_dir("~~/data/profiles", root).unwrap();
        assert_eq!(expanded, PathBuf::from("/opt/aiove/data/profiles"));
    }

    #[test]
    fn expansion_cleans_dot_segments() {
        let root = Path::new("/opt/aiove");
        let expanded = expand_dir("~~/data/../sessions/./x", root).unwrap();
        assert_eq!(expanded, PathBuf::from("/opt/aiove/sessions/x"));
    }

    #[test]
    fn single_tilde_expands_to_home() {
        let root = Path::new("/opt/aiove");
        match dirs::home_dir() {
            Some(home) => {
                assert_eq!(expand_dir("~/videos", root).unwrap(), home.join("videos").clean());
                assert_eq!(expand_dir("~", root).unwrap(), home.clean());
            }
            None => assert!(matches!(expand_dir("~/videos", root), Err(AioError::Config(_)))),
        }
    }

    #[test]
    fn tilde_inside_a_name_is_kept() {
        let root = Path::new("/opt/aiove");
        assert_eq!(
            expand_dir("/srv/~backup/x", root).unwrap(),
            PathBuf::from("/srv/~backup/x")
        );
    }

    #[test]
    fn absolute_entries_ignore_root() {
        let root = Path::new("/opt/aiove");
        let expanded = expand_dir("/var/tmp/sessions", root).unwrap();
        assert_eq!(expanded, PathBuf::from("/var/tmp/sessions"));
    }

    #[test]
    fn default_layout_lives_under_root() {
        let root = Path::new("/opt/aiove");
        let dirs = Directories::from_raw(root, &DirectoriesFile::default()).unwrap();

        assert_eq!(dirs.sessions, root.join("sessions"));
        assert_eq!(dirs.profiles, root.join("data").join("profiles"));
        assert_eq!(dirs.runtime_file, root.join("runtime.yaml"));
        assert_eq!(
            dirs.platform_externals,
            root.join("externals").join(Platform::current().as_str())
        );
        assert_eq!(dirs.externals_search_path().len(), 2);
    }

    #[test]
    fn load_merges_partial_file_with_defaults() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(DIRECTORIES_FILE),
            "sessions: ~~/scratch/sessions\n",
        )
        .unwrap();

        let dirs = Directories::load(temp.path()).unwrap();
        let root = absolute_path(temp.path()).unwrap();

        assert_eq!(dirs.sessions, root.join("scratch").join("sessions"));
        assert_eq!(dirs.data, root.join("data"));
    }

    #[test]
    fn resolve_root_prefers_cli_override() {
        let root = resolve_root(Some(Path::new("/custom/root"))).unwrap();
        assert_eq!(root, PathBuf::from("/custom/root"));
    }

    #[test]
    fn create_all_builds_tree() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = Directories::load(temp.path()).unwrap();
        dirs.create_all().unwrap();

        assert!(dirs.platform_externals.is_dir());
        assert!(dirs.profiles.is_dir());
        assert!(dirs.sessions.is_dir());
    }
}
