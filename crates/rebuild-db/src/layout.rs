//! iPod shuffle volume layout constants and path builders.
//!
//! ```text
//! {root}/
//! ├── rebuild_db.rules        — optional user rules
//! ├── rebuild_db.log.txt      — run log (unless --nolog)
//! └── iPod_Control/
//!     ├── Music/              — iTunes-managed tracks (F00, F01, ...)
//!     └── iTunes/
//!         ├── iTunesSD        — track database
//!         ├── iTunesShuffle   — shuffle order
//!         ├── iTunesPState    — playback state
//!         └── iTunesStats     — play statistics
//! ```
//!
//! Every device file the rebuild touches is located through [`Layout`].

use std::path::{Path, PathBuf};

/// Control directory, relative to the volume root. Its absence is fatal.
pub const CONTROL_DIR: &str = "iPod_Control/iTunes";

/// Directory whose immediate subdirectories are flattened into one listing.
pub const MUSIC_DIR: &str = "iPod_Control/Music";

/// Top-level directory that renaming never touches.
pub const RESERVED_PREFIX: &str = "iPod_Control";

pub const RULES_FILE: &str = "rebuild_db.rules";
pub const LOG_FILE: &str = "rebuild_db.log.txt";

/// Paths of a mounted iPod shuffle volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/iPod_Control/iTunes`
    #[must_use]
    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    #[must_use]
    pub fn itunes_sd(&self) -> PathBuf {
        self.control_dir().join("iTunesSD")
    }

    #[must_use]
    pub fn itunes_shuffle(&self) -> PathBuf {
        self.control_dir().join("iTunesShuffle")
    }

    #[must_use]
    pub fn itunes_pstate(&self) -> PathBuf {
        self.control_dir().join("iTunesPState")
    }

    #[must_use]
    pub fn itunes_stats(&self) -> PathBuf {
        self.control_dir().join("iTunesStats")
    }

    #[must_use]
    pub fn rules_file(&self) -> PathBuf {
        self.root.join(RULES_FILE)
    }

    /// Log file location; relative overrides are resolved against the root.
    #[must_use]
    pub fn log_file(&self, custom: Option<&Path>) -> PathBuf {
        self.root.join(custom.unwrap_or_else(|| Path::new(LOG_FILE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_files_live_under_control_dir() {
        let layout = Layout::new("/mnt/ipod");
        assert_eq!(layout.itunes_sd(), Path::new("/mnt/ipod/iPod_Control/iTunes/iTunesSD"));
        assert_eq!(
            layout.itunes_shuffle(),
            Path::new("/mnt/ipod/iPod_Control/iTunes/iTunesShuffle")
        );
        assert_eq!(
            layout.itunes_pstate(),
            Path::new("/mnt/ipod/iPod_Control/iTunes/iTunesPState")
        );
        assert_eq!(
            layout.itunes_stats(),
            Path::new("/mnt/ipod/iPod_Control/iTunes/iTunesStats")
        );
    }

    #[test]
    fn root_files() {
        let layout = Layout::new("/mnt/ipod");
        assert_eq!(layout.rules_file(), Path::new("/mnt/ipod/rebuild_db.rules"));
        assert_eq!(layout.log_file(None), Path::new("/mnt/ipod/rebuild_db.log.txt"));
        assert_eq!(
            layout.log_file(Some(Path::new("run.log"))),
            Path::new("/mnt/ipod/run.log")
        );
        assert_eq!(
            layout.log_file(Some(Path::new("/tmp/run.log"))),
            Path::new("/tmp/run.log")
        );
    }
}
