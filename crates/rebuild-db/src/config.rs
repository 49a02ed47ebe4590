//! Command-line options.

use std::path::{Path, PathBuf};

use clap::Parser;
use shuffle_db::VolumeLevel;

/// Rebuild the iPod shuffle database.
///
/// By default the whole volume is searched for playable files, unless at
/// least one DIRECTORY is given.
#[derive(Parser, Debug, Clone)]
#[command(name = "rebuild_db")]
#[command(version)]
pub struct Cli {
    /// Dump the current iTunesSD headers and entries; do not rebuild anything
    #[arg(short, long)]
    pub dump: bool,

    /// Prompt before browsing each directory
    #[arg(short, long)]
    pub interactive: bool,

    /// Set playback volume to a value between 0 and 38
    #[arg(short, long, value_name = "VOL", env = "REBUILD_DB_VOLUME")]
    pub volume: Option<VolumeLevel>,

    /// Do not use smart shuffle
    #[arg(short = 's', long)]
    pub nosmart: bool,

    /// Do not change to the executable's directory first
    #[arg(short, long)]
    pub nochdir: bool,

    /// Do not create a log file
    #[arg(short = 'l', long)]
    pub nolog: bool,

    /// Always rebuild database entries, do not reuse old ones
    #[arg(short, long)]
    pub force: bool,

    /// Set log file name
    #[arg(short = 'L', long, value_name = "FILE", env = "REBUILD_DB_LOGFILE")]
    pub logfile: Option<PathBuf>,

    /// Rename files and directories outside iPod_Control to safe names
    #[arg(short, long)]
    pub rename: bool,

    /// Directories to search, relative to the volume root
    #[arg(value_name = "DIRECTORY")]
    pub dirs: Vec<String>,
}

/// Settings for one rebuild, independent of how they were parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub dump: bool,
    pub interactive: bool,
    pub volume: Option<VolumeLevel>,
    pub smart: bool,
    pub reuse: bool,
    pub rename: bool,
    pub dirs: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dump: false,
            interactive: false,
            volume: None,
            smart: true,
            reuse: true,
            rename: false,
            dirs: Vec::new(),
        }
    }
}

impl From<&Cli> for Options {
    fn from(cli: &Cli) -> Self {
        Self {
            dump: cli.dump,
            interactive: cli.interactive,
            volume: cli.volume,
            smart: !cli.nosmart,
            reuse: !cli.force,
            rename: cli.rename,
            dirs: cli.dirs.clone(),
        }
    }
}

/// The volume root: the executable's directory, or the current directory
/// with `--nochdir`.
///
/// Falls back to the current directory when the executable's location
/// cannot be determined.
#[must_use]
pub fn volume_root(nochdir: bool) -> PathBuf {
    let cwd = PathBuf::from(".");
    if nochdir {
        return cwd;
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or(cwd)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from([
            "rebuild_db", "-i", "-v", "12", "-s", "-n", "-l", "-f", "-r", "Music", "Books",
        ])
        .unwrap();
        let opts = Options::from(&cli);
        assert!(opts.interactive);
        assert_eq!(opts.volume, Some(VolumeLevel::new(12)));
        assert!(!opts.smart);
        assert!(!opts.reuse);
        assert!(opts.rename);
        assert!(!opts.dump);
        assert!(cli.nochdir && cli.nolog);
        assert_eq!(opts.dirs, ["Music", "Books"]);
    }

    #[test]
    fn long_flags() {
        let cli = Cli::try_parse_from([
            "rebuild_db",
            "--dump",
            "--volume=38",
            "--logfile",
            "x.log",
        ])
        .unwrap();
        assert!(cli.dump);
        assert_eq!(cli.volume, Some(VolumeLevel::new(38)));
        assert_eq!(cli.logfile.as_deref(), Some(Path::new("x.log")));
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["rebuild_db"]).unwrap();
        assert_eq!(Options::from(&cli), Options::default());
    }

    #[test]
    fn volume_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["rebuild_db", "-v", "39"]).is_err());
        assert!(Cli::try_parse_from(["rebuild_db", "-v", "loud"]).is_err());
    }

    #[test]
    fn nochdir_uses_current_directory() {
        assert_eq!(volume_root(true), PathBuf::from("."));
    }
}
