//! One full rebuild of the device database and its companion files.
//!
//! Order of work:
//! 1. load user rules, check for `iPod_Control/iTunes`
//! 2. read the old `iTunesSD` (unless `--force`) for headers and reuse
//! 3. stream the new `iTunesSD` while traversing the volume, patch the count
//! 4. write `iTunesPState`, `iTunesStats`, `iTunesShuffle`
//!
//! Failures up to and including step 3 are fatal. Step 4 failures only
//! degrade the result: the database itself is already complete.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context};
use rand::Rng;
use shuffle_db::shuffle::{generate, write_sequence};
use shuffle_db::state::write_stats;
use shuffle_db::{
    DatabaseWriter, ExistingDatabase, HeaderSource, PlaybackState, RuleSet, StateError,
};
use tracing::{error, info, warn};

use crate::browse::{Browser, Prompt};
use crate::config::Options;
use crate::interrupt::Interrupt;
use crate::layout::Layout;

/// What a completed rebuild produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Entries written to `iTunesSD`.
    pub tracks: u32,
    /// Playable files found, including those the rules ignored.
    pub playable: u32,
    /// Length of the shuffle order.
    pub shuffled: usize,
    /// A companion file could not be written.
    pub degraded: bool,
}

/// Load `rebuild_db.rules` on top of the built-in rules.
///
/// A missing or unreadable file leaves the built-in rules alone.
#[must_use]
pub fn load_rules(layout: &Layout) -> RuleSet {
    let path = layout.rules_file();
    match fs::read_to_string(&path) {
        Ok(text) => {
            let rules = RuleSet::with_user_rules(&text);
            info!(
                path = %path.display(),
                user_rules = rules.len().saturating_sub(RuleSet::builtin().len()),
                "loaded rules"
            );
            rules
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => RuleSet::builtin(),
        Err(err) => {
            warn!(path = %path.display(), %err, "cannot read rules file, using built-in rules");
            RuleSet::builtin()
        }
    }
}

/// Read the previous database, or start from scratch when reuse is off.
#[must_use]
pub fn load_existing(layout: &Layout, reuse: bool) -> ExistingDatabase {
    let existing = if reuse {
        match File::open(layout.itunes_sd()) {
            Ok(file) => ExistingDatabase::load(file),
            Err(err) if err.kind() == io::ErrorKind::NotFound => ExistingDatabase::empty(),
            Err(err) => {
                warn!(
                    path = %layout.itunes_sd().display(),
                    %err,
                    "cannot open existing database, building from scratch"
                );
                ExistingDatabase::empty()
            }
        }
    } else {
        ExistingDatabase::empty()
    };

    match existing.source {
        HeaderSource::Complete => {
            info!("found complete iTunesSD headers in existing database");
            if !existing.known.is_empty() {
                info!(
                    "collected {} entries from existing database",
                    existing.known.len()
                );
            }
        }
        HeaderSource::MainOnly => {
            info!("using existing main iTunesSD header");
            info!("iTunesSD entry headers not found, building them from scratch");
        }
        HeaderSource::Missing => {
            info!("iTunesSD headers not found, building them from scratch");
        }
    }
    existing
}

/// Rebuild everything under `layout`.
///
/// # Errors
///
/// Fatal conditions: missing control directory, an `iTunesSD` that cannot be
/// created or written, and cancellation at a prompt or through `interrupt`
/// ([`crate::browse::Cancelled`]).
pub fn run<P: Prompt, R: Rng + ?Sized>(
    layout: &Layout,
    options: &Options,
    prompt: &mut P,
    rng: &mut R,
    interrupt: &Interrupt,
) -> anyhow::Result<Summary> {
    info!(
        "welcome to rebuild_db, version {}",
        env!("CARGO_PKG_VERSION")
    );

    let rules = load_rules(layout);

    if !layout.control_dir().is_dir() {
        error!("no iPod control directory found");
        error!("please make sure that:");
        error!(" (*) the volume root is the iPod's root directory");
        error!(" (*) the iPod was correctly initialized with iTunes");
        bail!(
            "missing control directory {}",
            layout.control_dir().display()
        );
    }

    let existing = load_existing(layout, options.reuse);

    let db_path = layout.itunes_sd();
    let file = File::create(&db_path).inspect_err(|_| {
        error!("cannot write to the iPod database file (iTunesSD)");
        error!("please make sure that:");
        error!(" (*) you have sufficient permissions to write to the iPod volume");
        error!(" (*) you are actually using an iPod shuffle, and not some other iPod model");
    });
    let file = file.with_context(|| format!("creating {}", db_path.display()))?;
    let mut writer = DatabaseWriter::begin(file, existing, rules, options.reuse)
        .with_context(|| format!("writing header of {}", db_path.display()))?;

    info!("searching for files on your iPod");
    let playable = {
        let mut browser = Browser::new(layout.root(), &mut writer, prompt, options.rename)
            .with_interrupt(interrupt.clone());
        if options.dirs.is_empty() {
            browser.browse("", options.interactive)?;
        } else {
            for dir in &options.dirs {
                browser.browse(dir, options.interactive)?;
            }
        }
        browser.playable()
    };
    info!("{} playable files were found on your iPod", writer.count());
    interrupt.check()?;

    info!("fixing iTunesSD header");
    let finished = writer.finish().inspect_err(|_| {
        error!("some strange errors occurred while writing iTunesSD");
        error!("you may have to re-initialize the iPod using iTunes");
    });
    let finished = finished.with_context(|| format!("finishing {}", db_path.display()))?;
    let tracks = finished.count;

    let pstate_ok = write_companion(&layout.itunes_pstate(), "playback state", |out| {
        let prior = fs::read(layout.itunes_pstate()).ok();
        PlaybackState::rebuild(prior.as_deref(), options.volume).write(out)
    });
    let stats_ok = write_companion(&layout.itunes_stats(), "statistics", |out| {
        write_stats(out, tracks)
    });
    if options.smart {
        info!("generating smart shuffle sequence");
    } else {
        info!("generating shuffle sequence");
    }
    let sequence = generate(finished.domains.groups(), options.smart, rng);
    let shuffle_ok = write_companion(&layout.itunes_shuffle(), "shuffle sequence", |out| {
        write_sequence(out, &sequence)
    });

    let degraded = !(pstate_ok && stats_ok && shuffle_ok);
    if degraded {
        warn!("the main database file was rebuilt successfully, but there were errors");
        warn!("while resetting the other files; playback MAY still work correctly");
    } else {
        info!("the iPod shuffle database was rebuilt successfully");
    }

    Ok(Summary {
        tracks,
        playable,
        shuffled: sequence.len(),
        degraded,
    })
}

/// Render one companion file and write it out; failure is logged and
/// reported as `false`.
///
/// `render` runs before `path` is truncated, so it may still read the
/// previous contents.
fn write_companion<F>(path: &Path, what: &str, render: F) -> bool
where
    F: FnOnce(&mut dyn Write) -> Result<(), StateError>,
{
    let result = render_to_file(path, render);
    match result {
        Ok(()) => {
            info!("{what}: OK");
            true
        }
        Err(err) => {
            warn!(path = %path.display(), err = %format!("{err:#}"), "{what}: FAILED");
            false
        }
    }
}

fn render_to_file<F>(path: &Path, render: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<(), StateError>,
{
    let mut buf = Vec::new();
    render(&mut buf)?;
    fs::write(path, &buf).with_context(|| format!("writing {}", path.display()))
}

/// Print the existing database without changing anything.
///
/// # Errors
///
/// Returns errors writing to `out`. An unreadable database prints nothing.
pub fn dump<W: Write>(layout: &Layout, out: W) -> anyhow::Result<usize> {
    let bytes = match fs::read(layout.itunes_sd()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %layout.itunes_sd().display(), %err, "cannot read iTunesSD");
            return Ok(0);
        }
    };
    shuffle_db::dump::dump(&bytes, out).context("writing dump")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_rules_file_means_builtin_rules() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        assert_eq!(load_rules(&layout).len(), RuleSet::builtin().len());
    }

    #[test]
    fn user_rules_are_appended() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        fs::write(
            layout.rules_file(),
            "# comment\nfilename ~ *.wav: shuffle=1\nbroken line\n",
        )
        .unwrap();
        assert_eq!(load_rules(&layout).len(), RuleSet::builtin().len() + 1);
    }

    #[test]
    fn force_ignores_existing_database() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        fs::create_dir_all(layout.control_dir()).unwrap();
        let mut header = shuffle_db::MainHeader::empty().encode().to_vec();
        header[4] = 0x09;
        fs::write(layout.itunes_sd(), &header).unwrap();

        assert_eq!(load_existing(&layout, true).source, HeaderSource::MainOnly);
        assert_eq!(load_existing(&layout, false).source, HeaderSource::Missing);
    }

    #[test]
    fn unopenable_database_falls_back_to_scratch() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        // a directory in place of iTunesSD opens (or reads) with an error
        // other than NotFound on every platform
        fs::create_dir_all(layout.itunes_sd()).unwrap();
        let existing = load_existing(&layout, true);
        assert_eq!(existing.source, HeaderSource::Missing);
        assert!(existing.known.is_empty());
    }

    #[test]
    fn companion_failure_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing-dir").join("iTunesStats");
        assert!(!write_companion(&path, "statistics", |out| write_stats(out, 1)));
        let ok = tmp.path().join("iTunesStats");
        assert!(write_companion(&ok, "statistics", |out| write_stats(out, 1)));
        assert_eq!(fs::read(ok).unwrap().len(), 6 + 18);
    }
}
