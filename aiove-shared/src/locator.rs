use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{AioError, Result};

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";
pub const RIFE: &str = "rife-ncnn-vulkan";
pub const WAIFU2X: &str = "waifu2x-ncnn-vulkan";

/// Finds executables on PATH plus a list of extra directories.
///
/// Each extra directory is searched together with its immediate
/// subdirectories, which is where release archives of the ncnn tools
/// extract to (`externals/linux/rife-ncnn-vulkan-20210227-ubuntu/...`).
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    extra_paths: Vec<PathBuf>,
    system_path: bool,
}

impl BinaryLocator {
    pub fn new(extra_dirs: &[PathBuf]) -> Self {
        let mut extra_paths = Vec::new();
        for dir in extra_dirs {
            extra_paths.push(dir.clone());
            for entry in WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir())
            {
                extra_paths.push(entry.into_path());
            }
        }
        debug!("Extra binary search paths: {:?}", extra_paths);
        Self {
            extra_paths,
            system_path: true,
        }
    }

    /// Ignores PATH, only the extra directories are searched.
    pub fn externals_only(mut self) -> Self {
        self.system_path = false;
        self
    }

    pub fn extra_paths(&self) -> &[PathBuf] {
        &self.extra_paths
    }

    /// PATH followed by the extra directories.
    pub fn search_path(&self) -> OsString {
        let mut dirs: Vec<PathBuf> = match env::var_os("PATH") {
            Some(path) if self.system_path => env::split_paths(&path).collect(),
            _ => Vec::new(),
        };
        dirs.extend(self.extra_paths.iter().cloned());
        env::join_paths(dirs).unwrap_or_default()
    }

    /// Locates `name`. Don't append `.exe`, that is handled on Windows.
    pub fn find(&self, name: &str) -> Result<PathBuf> {
        info!("Finding binary [{}] in PATH and externals", name);

        let cwd = env::current_dir()?;
        match which::which_in(name, Some(self.search_path()), cwd) {
            Ok(path) => {
                info!("Binary [{}] found at [{}]", name, path.display());
                Ok(path)
            }
            Err(_) => {
                warn!("Couldn't find binary [{}]", name);
                Err(AioError::MissingBinary {
                    name: name.to_string(),
                    searched: self.extra_paths.clone(),
                })
            }
        }
    }
}

/// Directory containing `binary`, used to resolve model directories.
pub fn binary_dir(binary: &Path) -> PathBuf {
    binary
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_binary_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let locator = BinaryLocator::new(&[temp.path().to_path_buf()]);

        let err = locator.find("aiove-surely-not-installed-tool").unwrap_err();

        match err {
            AioError::MissingBinary { name, searched } => {
                assert_eq!(name, "aiove-surely-not-installed-tool");
                assert_eq!(searched, vec![temp.path().to_path_buf()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn subdirectories_are_searched() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("rife-ncnn-vulkan-20210227-ubuntu")).unwrap();
        fs::create_dir_all(temp.path().join("waifu2x-ncnn-vulkan-20210210-ubuntu")).unwrap();
        fs::write(temp.path().join("readme.txt"), "not a dir").unwrap();

        let locator = BinaryLocator::new(&[temp.path().to_path_buf()]);

        assert_eq!(locator.extra_paths().len(), 3);
        assert_eq!(locator.extra_paths()[0], temp.path());
        assert!(locator.extra_paths()[1].ends_with("rife-ncnn-vulkan-20210227-ubuntu"));
    }

    #[cfg(unix)]
    #[test]
    fn finds_executable_in_externals_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let release = temp.path().join("fake-release");
        fs::create_dir_all(&release).unwrap();
        let tool = release.join("aiove-fake-tool");
        fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let locator = BinaryLocator::new(&[temp.path().to_path_buf()]);

        assert_eq!(locator.find("aiove-fake-tool").unwrap(), tool);
    }

    #[test]
    fn externals_only_skips_system_path() {
        let temp = tempfile::tempdir().unwrap();
        let locator = BinaryLocator::new(&[temp.path().to_path_buf()]).externals_only();

        assert_eq!(locator.search_path(), temp.path().as_os_str().to_os_string());
        assert!(matches!(locator.find("sh"), Err(AioError::MissingBinary { .. })));
    }

    #[test]
    fn binary_dir_is_parent() {
        assert_eq!(
            binary_dir(Path::new("/opt/rife/rife-ncnn-vulkan")),
            PathBuf::from("/opt/rife")
        );
    }
}
