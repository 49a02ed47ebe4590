//! Volume traversal: find playable files and feed them to the database writer.
//!
//! Each directory is listed on its own, sorted case-insensitively, and its
//! files and subdirectories are handled in that order. Every directory is a
//! separate shuffle domain. `iPod_Control/Music` is special: the files of its
//! `Fxx` subdirectories are merged into its own listing so iTunes-managed
//! tracks form a single domain.

use std::fs;
use std::io::{self, BufRead, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use shuffle_db::{DatabaseWriter, DomainSlot};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::interrupt::Interrupt;
use crate::layout::{MUSIC_DIR, RESERVED_PREFIX};
use crate::rename::rename_safely;

/// Extensions (lowercase, without dot) the player can handle.
pub const PLAYABLE_EXTENSIONS: &[&str] = &["mp3", "m4a", "m4b", "m4p", "aa", "wav"];

#[must_use]
pub fn is_playable(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            PLAYABLE_EXTENSIONS
                .iter()
                .any(|p| p.eq_ignore_ascii_case(ext))
        })
}

// ---------------------------------------------------------------------------
// Interactive prompt
// ---------------------------------------------------------------------------

/// The operator stopped the run: end-of-input at a prompt, or Ctrl-C.
#[derive(Debug, thiserror::Error)]
#[error("processing cancelled by the operator")]
pub struct Cancelled;

/// A reply to "include this directory?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Include this directory and everything below without asking again.
    All,
}

impl Answer {
    /// Interpret a reply by its first letter (English, German, French,
    /// Spanish). `None` means ask again.
    #[must_use]
    pub fn parse(reply: &str) -> Option<Self> {
        match reply.trim().chars().next()?.to_ascii_lowercase() {
            'y' | 'j' | 'o' | 's' => Some(Self::Yes),
            'n' => Some(Self::No),
            'a' | 't' => Some(Self::All),
            _ => None,
        }
    }
}

/// Source of operator replies.
pub trait Prompt {
    /// Show `question` and read one reply; `Ok(None)` on end of input.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the terminal.
    fn ask(&mut self, question: &str) -> io::Result<Option<String>>;
}

/// Prompts on stdout and reads replies from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{question}")?;
        stdout.flush()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// One entry of a directory listing, named relative to the listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    File(String),
    Dir(String),
}

impl Item {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File(name) | Self::Dir(name) => name,
        }
    }
}

/// `a` + `/` + `b`, where an empty `a` is the volume root.
#[must_use]
pub fn join_rel(a: &str, b: &str) -> String {
    if a.is_empty() {
        b.to_owned()
    } else {
        format!("{a}/{b}")
    }
}

/// List the directory `rel` (relative to `root`), ready for traversal.
///
/// Hidden entries and symlinks are skipped; files must be playable. The
/// result is sorted by lowercase name.
///
/// # Errors
///
/// Returns the I/O error if the directory itself cannot be read.
pub fn list_dir(root: &Path, rel: &str, rename: bool) -> io::Result<Vec<Item>> {
    let mut items = list_entries(root, rel, "", rename)?;

    if rel == MUSIC_DIR {
        let (files, subdirs): (Vec<Item>, Vec<Item>) =
            items.into_iter().partition(|i| matches!(i, Item::File(_)));
        items = files;
        for sub in subdirs {
            let sub_rel = join_rel(rel, sub.name());
            let prefix = format!("{}/", sub.name());
            match list_entries(root, &sub_rel, &prefix, rename) {
                Ok(found) => items.extend(found.into_iter().filter(|i| matches!(i, Item::File(_)))),
                Err(err) => warn!(dir = %sub_rel, %err, "cannot list directory"),
            }
        }
    }

    items.sort_by_cached_key(|i| i.name().to_lowercase());
    Ok(items)
}

fn list_entries(root: &Path, rel: &str, prefix: &str, rename: bool) -> io::Result<Vec<Item>> {
    let dir: PathBuf = root.join(rel);
    let may_rename = rename && !rel.starts_with(RESERVED_PREFIX);
    let mut items = Vec::new();

    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                debug!(%err, "skipping unreadable entry");
                continue;
            }
        };
        let Some(name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "skipping non-UTF-8 name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type();
        let item = if file_type.is_symlink() {
            continue;
        } else if file_type.is_dir() {
            let name = if may_rename { rename_safely(&dir, name) } else { name.to_owned() };
            Item::Dir(format!("{prefix}{name}"))
        } else if is_playable(name) {
            let name = if may_rename { rename_safely(&dir, name) } else { name.to_owned() };
            Item::File(format!("{prefix}{name}"))
        } else {
            continue;
        };
        items.push(item);
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Recursive traversal feeding a [`DatabaseWriter`].
pub struct Browser<'a, W: Write + Seek, P: Prompt> {
    root: &'a Path,
    writer: &'a mut DatabaseWriter<W>,
    prompt: &'a mut P,
    rename: bool,
    interrupt: Interrupt,
    playable: u32,
}

impl<'a, W: Write + Seek, P: Prompt> Browser<'a, W, P> {
    pub fn new(
        root: &'a Path,
        writer: &'a mut DatabaseWriter<W>,
        prompt: &'a mut P,
        rename: bool,
    ) -> Self {
        Self {
            root,
            writer,
            prompt,
            rename,
            interrupt: Interrupt::new(),
            playable: 0,
        }
    }

    /// Stop with [`Cancelled`] once `interrupt` is raised.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Playable files seen so far, including ignored ones.
    #[must_use]
    pub fn playable(&self) -> u32 {
        self.playable
    }

    /// Traverse `rel` and everything below it.
    ///
    /// # Errors
    ///
    /// Fails with [`Cancelled`] on end-of-input at a prompt or when the
    /// interrupt is raised, or with the writer's error; all of these leave
    /// the database incomplete.
    pub fn browse(&mut self, rel: &str, interactive: bool) -> anyhow::Result<()> {
        let rel = rel.trim_start_matches("./").trim_matches('/');
        let shown = format!("/{rel}");

        let mut interactive = interactive;
        if interactive {
            match self.ask(&shown)? {
                Answer::No => return Ok(()),
                Answer::All => interactive = false,
                Answer::Yes => {}
            }
        }

        let items = match list_dir(self.root, rel, self.rename) {
            Ok(items) => items,
            Err(err) => {
                warn!(dir = %shown, %err, "cannot list directory");
                return Ok(());
            }
        };

        let count = items.iter().filter(|i| matches!(i, Item::File(_))).count();
        self.playable = self
            .playable
            .saturating_add(u32::try_from(count).unwrap_or(u32::MAX));

        // the domain takes its place when the directory is entered, ahead of
        // any subdirectory listed before its files
        let mut slot = if count > 0 {
            self.writer.open_domain()
        } else {
            DomainSlot::new()
        };
        let mut written = 0usize;
        for item in &items {
            self.interrupt.check()?;
            let path = join_rel(rel, item.name());
            match item {
                Item::File(_) => {
                    let size = fs::metadata(self.root.join(&path)).ok().map(|m| m.len());
                    let filename = format!("/{path}");
                    let outcome = self
                        .writer
                        .add_file(&filename, size, &mut slot)
                        .with_context(|| format!("writing entry for {filename}"))?;
                    if outcome.is_written() {
                        written = written.saturating_add(1);
                    }
                }
                Item::Dir(_) => self.browse(&path, interactive)?,
            }
        }

        if written == count {
            info!("{shown}: {count} files");
        } else {
            info!("{shown}: {written} files (out of {count})");
        }
        Ok(())
    }

    fn ask(&mut self, shown: &str) -> anyhow::Result<Answer> {
        let question = format!("include '{shown}'? [(Y)es, (N)o, (A)ll] ");
        loop {
            let reply = self
                .prompt
                .ask(&question)
                .context("reading the interactive prompt")?;
            self.interrupt.check()?;
            let Some(reply) = reply else {
                return Err(Cancelled.into());
            };
            if let Some(answer) = Answer::parse(&reply) {
                return Ok(answer);
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use shuffle_db::{ExistingDatabase, RuleSet};
    use std::collections::VecDeque;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Replays canned replies; runs out like a closed stdin.
    struct Scripted(VecDeque<&'static str>, Vec<String>);

    impl Prompt for Scripted {
        fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
            self.1.push(question.to_owned());
            Ok(self.0.pop_front().map(str::to_owned))
        }
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"FAKE").unwrap();
    }

    fn volume() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "iPod_Control/Music/F01/b.mp3");
        touch(root, "iPod_Control/Music/F00/c.mp3");
        touch(root, "iPod_Control/Music/F00/notes.txt");
        touch(root, "iPod_Control/iTunes/iTunesSD");
        touch(root, "Books/Zed.m4b");
        touch(root, "Books/alpha.MP3");
        touch(root, ".Trashes/x.mp3");
        touch(root, "top.wav");
        tmp
    }

    fn run(root: &Path, dirs: &[&str], prompt: &mut Scripted, interactive: bool) -> Vec<String> {
        let mut writer = DatabaseWriter::begin(
            Cursor::new(Vec::new()),
            ExistingDatabase::empty(),
            RuleSet::builtin(),
            true,
        )
        .unwrap();
        {
            let mut browser = Browser::new(root, &mut writer, prompt, false);
            for dir in dirs {
                browser.browse(dir, interactive).unwrap();
            }
        }
        let bytes = writer.finish().unwrap().out.into_inner();
        shuffle_db::database::records(&bytes)
            .map(|r| r.filename())
            .collect()
    }

    #[test]
    fn playable_extensions_are_case_insensitive() {
        assert!(is_playable("a.MP3"));
        assert!(is_playable("b.m4p"));
        assert!(is_playable("c.aa"));
        assert!(!is_playable("d.ogg"));
        assert!(!is_playable("mp3"));
    }

    #[test]
    fn answers() {
        assert_eq!(Answer::parse("Yes\n"), Some(Answer::Yes));
        assert_eq!(Answer::parse("ja"), Some(Answer::Yes));
        assert_eq!(Answer::parse("oui"), Some(Answer::Yes));
        assert_eq!(Answer::parse("si"), Some(Answer::Yes));
        assert_eq!(Answer::parse("No"), Some(Answer::No));
        assert_eq!(Answer::parse("all"), Some(Answer::All));
        assert_eq!(Answer::parse("tous"), Some(Answer::All));
        assert_eq!(Answer::parse(""), None);
        assert_eq!(Answer::parse("\n"), None);
        assert_eq!(Answer::parse("x"), None);
    }

    #[test]
    fn music_dir_is_flattened_and_sorted() {
        let tmp = volume();
        let items = list_dir(tmp.path(), MUSIC_DIR, false).unwrap();
        assert_eq!(
            items,
            vec![
                Item::File("F00/c.mp3".into()),
                Item::File("F01/b.mp3".into()),
            ]
        );
    }

    #[test]
    fn root_listing_skips_hidden_and_unplayable() {
        let tmp = volume();
        let items = list_dir(tmp.path(), "", false).unwrap();
        assert_eq!(
            items,
            vec![
                Item::Dir("Books".into()),
                Item::Dir("iPod_Control".into()),
                Item::File("top.wav".into()),
            ]
        );
    }

    #[test]
    fn full_traversal_order() {
        let tmp = volume();
        let mut prompt = Scripted(VecDeque::new(), Vec::new());
        let names = run(tmp.path(), &[""], &mut prompt, false);
        assert_eq!(
            names,
            [
                "/Books/alpha.MP3",
                "/Books/Zed.m4b",
                "/iPod_Control/Music/F00/c.mp3",
                "/iPod_Control/Music/F01/b.mp3",
                "/top.wav",
            ]
        );
    }

    #[test]
    fn requested_directories_only() {
        let tmp = volume();
        let mut prompt = Scripted(VecDeque::new(), Vec::new());
        let names = run(tmp.path(), &["Books/"], &mut prompt, false);
        assert_eq!(names, ["/Books/alpha.MP3", "/Books/Zed.m4b"]);
    }

    #[test]
    fn interactive_no_skips_subtree_and_all_stops_asking() {
        let tmp = volume();
        // root: yes, Books: no, iPod_Control: all
        let mut prompt = Scripted(VecDeque::from(["", "y", "n", "a"]), Vec::new());
        let names = run(tmp.path(), &[""], &mut prompt, true);
        assert_eq!(
            names,
            [
                "/iPod_Control/Music/F00/c.mp3",
                "/iPod_Control/Music/F01/b.mp3",
                "/top.wav",
            ]
        );
        assert_eq!(prompt.1.len(), 4);
        assert_eq!(prompt.1[0], "include '/'? [(Y)es, (N)o, (A)ll] ");
        assert_eq!(prompt.1[2], "include '/Books'? [(Y)es, (N)o, (A)ll] ");
    }

    #[test]
    fn end_of_input_cancels() {
        let tmp = volume();
        let mut writer = DatabaseWriter::begin(
            Cursor::new(Vec::new()),
            ExistingDatabase::empty(),
            RuleSet::builtin(),
            true,
        )
        .unwrap();
        let mut prompt = Scripted(VecDeque::new(), Vec::new());
        let mut browser = Browser::new(tmp.path(), &mut writer, &mut prompt, false);
        let err = browser.browse("", true).unwrap_err();
        assert!(err.is::<Cancelled>());
    }

    #[test]
    fn domains_follow_directory_visitation_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Books/a.mp3");
        touch(tmp.path(), "top.mp3");
        touch(tmp.path(), "Empty/.hidden.mp3");
        let mut writer = DatabaseWriter::begin(
            Cursor::new(Vec::new()),
            ExistingDatabase::empty(),
            RuleSet::builtin(),
            true,
        )
        .unwrap();
        let mut prompt = Scripted(VecDeque::new(), Vec::new());
        Browser::new(tmp.path(), &mut writer, &mut prompt, false)
            .browse("", false)
            .unwrap();
        let done = writer.finish().unwrap();
        // entry 0 is /Books/a.mp3, entry 1 is /top.mp3; the root is entered
        // first, so its domain comes first
        assert_eq!(done.domains.groups(), &[vec![1], vec![0]]);
    }

    #[test]
    fn raised_interrupt_stops_before_the_next_item() {
        let tmp = volume();
        let mut writer = DatabaseWriter::begin(
            Cursor::new(Vec::new()),
            ExistingDatabase::empty(),
            RuleSet::builtin(),
            true,
        )
        .unwrap();
        let interrupt = Interrupt::new();
        interrupt.raise();
        let mut prompt = Scripted(VecDeque::new(), Vec::new());
        let err = Browser::new(tmp.path(), &mut writer, &mut prompt, false)
            .with_interrupt(interrupt)
            .browse("", false)
            .unwrap_err();
        assert!(err.is::<Cancelled>());
        assert_eq!(writer.count(), 0);
    }

    #[test]
    fn rename_outside_ipod_control_only() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "My Music/a song.mp3");
        touch(tmp.path(), "iPod_Control/Music/F00/odd name.mp3");
        let items = list_dir(tmp.path(), "My_Music", true);
        assert!(items.is_err());

        let root_items = list_dir(tmp.path(), "", true).unwrap();
        assert!(root_items.contains(&Item::Dir("My_Music".into())));
        let music = list_dir(tmp.path(), "My_Music", true).unwrap();
        assert_eq!(music, vec![Item::File("a_song.mp3".into())]);
        let ipod = list_dir(tmp.path(), MUSIC_DIR, true).unwrap();
        assert_eq!(ipod, vec![Item::File("F00/odd name.mp3".into())]);
    }
}
