//! Everything a run needs, built once at startup and passed by reference.

use tracing::{debug, info};

use crate::database::Database;
use crate::error::Result;
use crate::locator::{BinaryLocator, FFMPEG, FFPROBE, RIFE, WAIFU2X};
use crate::paths::Directories;
use crate::prelude::PreludeData;
use crate::profile::{Profile, ProfileStore};
use crate::runtime::{RuntimeData, RuntimeState};
use crate::session::SessionManager;
use crate::wrappers::ffmpeg::FFmpegWrapper;
use crate::wrappers::rife::RifeWrapper;
use crate::wrappers::waifu2x::Waifu2xWrapper;

pub struct Context {
    pub dirs: Directories,
    pub prelude: PreludeData,
    pub locator: BinaryLocator,
    pub sessions: SessionManager,
    pub profiles: ProfileStore,
    pub runtime: RuntimeState,
    pub database: Database,
}

impl Context {
    /// Prepares the install root: creates the directory layout, writes the
    /// built-in profiles and opens the runtime file and database.
    pub fn initialize(dirs: Directories, prelude: PreludeData) -> Result<Context> {
        info!("Initializing context at [{}]", dirs.root.display());
        dirs.create_all()?;

        let locator = BinaryLocator::new(&dirs.externals_search_path());
        let sessions = SessionManager::new(dirs.sessions.clone());

        let profiles = ProfileStore::new(dirs.profiles.clone());
        profiles.ensure_builtin()?;

        let mut runtime = RuntimeState::new(dirs.runtime_file.clone());
        runtime.load_or_create()?;

        let database = Database::open(&dirs.database_file)?;
        debug!("Context directories: {:?}", dirs);

        Ok(Context {
            dirs,
            prelude,
            locator,
            sessions,
            profiles,
            runtime,
            database,
        })
    }

    /// `[flow] stop_at_initialization` from the prelude.
    pub fn stop_at_initialization(&self) -> bool {
        self.prelude.flow.stop_at_initialization
    }

    pub fn runtime_data(&self) -> RuntimeData {
        self.runtime.data().cloned().unwrap_or_default()
    }

    /// The profile named in the runtime state.
    pub fn last_profile(&self) -> Result<Profile> {
        self.profiles.load(&self.runtime_data().last_profile)
    }

    pub fn ffmpeg_wrapper(&self) -> Result<FFmpegWrapper> {
        Ok(FFmpegWrapper::new(
            self.locator.find(FFMPEG)?,
            self.locator.find(FFPROBE)?,
        ))
    }

    pub fn rife_wrapper(&self) -> Result<RifeWrapper> {
        Ok(RifeWrapper::new(self.locator.find(RIFE)?))
    }

    pub fn waifu2x_wrapper(&self) -> Result<Waifu2xWrapper> {
        Ok(Waifu2xWrapper::new(self.locator.find(WAIFU2X)?))
    }
}
