//! DatabaseWriter — stream entries into `iTunesSD` and patch the count last.
//!
//! The header goes out first with a zero track count, then one 558-byte
//! entry per accepted file, in the order files are added. [`DatabaseWriter::finish`]
//! seeks back to offset 0 and writes the real count. Until that happens the
//! file on the device is inconsistent; an interrupted run must be treated as
//! a corrupt database.

use std::io::{Seek, SeekFrom, Write};

use tracing::debug;

use crate::binary::{encode, u24_be, EntryHeader, MainHeader, U24_MAX};
use crate::database::{ExistingDatabase, KnownEntries};
use crate::domain::{DomainSlot, Domains};
use crate::error::WriterError;
use crate::props::PropertySet;
use crate::rules::RuleSet;

/// What happened to one file handed to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The rules resolved `ignore`; nothing was written.
    Ignored,
    /// Written as entry `index`.
    Written { index: u32, in_shuffle: bool, reused: bool },
}

impl Outcome {
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Result of a completed database write.
#[derive(Debug)]
pub struct Finished<W> {
    pub out: W,
    /// Number of entries written (the value patched into the header).
    pub count: u32,
    pub domains: Domains,
}

/// Builds `iTunesSD` incrementally on any seekable sink.
pub struct DatabaseWriter<W: Write + Seek> {
    out: W,
    rules: RuleSet,
    template: EntryHeader,
    known: KnownEntries,
    reuse: bool,
    count: u32,
    domains: Domains,
}

impl<W: Write + Seek> DatabaseWriter<W> {
    /// Write the main header and return a writer ready for entries.
    ///
    /// `existing` supplies the header bytes, the entry template and the reuse
    /// cache. `reuse` is the default for the `reuse` property before rules run.
    ///
    /// # Errors
    ///
    /// Returns `WriterError::Io` if the header cannot be written.
    pub fn begin(
        mut out: W,
        existing: ExistingDatabase,
        rules: RuleSet,
        reuse: bool,
    ) -> Result<Self, WriterError> {
        let header = MainHeader {
            track_count: 0,
            ..existing.main
        };
        out.write_all(&header.encode())?;
        Ok(Self {
            out,
            rules,
            template: existing.template,
            known: existing.known,
            reuse,
            count: 0,
            domains: Domains::new(),
        })
    }

    /// Resolve `filename`'s properties and write its entry unless ignored.
    ///
    /// `filename` is volume-relative with a leading `/`; `size` is `None` if
    /// the file could not be stat'ed. `dir` identifies the directory's domain.
    ///
    /// # Errors
    ///
    /// Returns `WriterError::Io` on write failure and
    /// `WriterError::DatabaseFull` past 2^24 - 1 entries.
    pub fn add_file(
        &mut self,
        filename: &str,
        size: Option<u64>,
        dir: &mut DomainSlot,
    ) -> Result<Outcome, WriterError> {
        let props = self
            .rules
            .resolve(PropertySet::defaults(filename, size, self.reuse));
        self.add_resolved(&props, dir)
    }

    /// Write an entry for already-resolved properties.
    ///
    /// # Errors
    ///
    /// See [`DatabaseWriter::add_file`].
    pub fn add_resolved(
        &mut self,
        props: &PropertySet,
        dir: &mut DomainSlot,
    ) -> Result<Outcome, WriterError> {
        if props.ignore {
            debug!(file = %props.filename, "ignored by rules");
            return Ok(Outcome::Ignored);
        }
        if self.count >= U24_MAX {
            return Err(WriterError::DatabaseFull);
        }

        let cached = self.known.get(&props.filename);
        let reused = props.reuse && cached.is_some();
        let record = encode(props, &self.template, cached);
        self.out.write_all(record.as_bytes())?;

        let index = self.count;
        self.count = self.count.saturating_add(1);
        let in_shuffle = props.in_shuffle();
        self.domains.record(dir, index, in_shuffle);
        debug!(file = %props.filename, index, in_shuffle, reused, "entry written");

        Ok(Outcome::Written {
            index,
            in_shuffle,
            reused,
        })
    }

    /// Reserve the next shuffle domain, see [`Domains::open`].
    pub fn open_domain(&mut self) -> DomainSlot {
        self.domains.open()
    }

    /// Entries written so far.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Patch the track count into the header and flush.
    ///
    /// # Errors
    ///
    /// Returns `WriterError::Io` if the seek or the rewrite fails; the
    /// database is then inconsistent.
    pub fn finish(mut self) -> Result<Finished<W>, WriterError> {
        self.out.seek(SeekFrom::Start(MainHeader::COUNT_OFFSET))?;
        self.out.write_all(&u24_be(self.count))?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()?;
        Ok(Finished {
            out: self.out,
            count: self.count,
            domains: self.domains,
        })
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
    use crate::binary::EntryRecord;
    use crate::database::records;
    use std::io::Cursor;

    fn writer() -> DatabaseWriter<Cursor<Vec<u8>>> {
        DatabaseWriter::begin(
            Cursor::new(Vec::new()),
            ExistingDatabase::empty(),
            RuleSet::builtin(),
            true,
        )
        .unwrap()
    }

    #[test]
    fn header_count_is_patched_on_finish() {
        let mut w = writer();
        let mut dir = DomainSlot::new();
        for name in ["/a.mp3", "/b.mp3", "/c.wav"] {
            w.add_file(name, Some(10), &mut dir).unwrap();
        }
        let done = w.finish().unwrap();
        let bytes = done.out.into_inner();
        assert_eq!(done.count, 3);
        assert_eq!(&bytes[0..3], &[0, 0, 3]);
        assert_eq!(bytes.len(), MainHeader::SIZE + 3 * EntryRecord::SIZE);
    }

    #[test]
    fn ignored_files_write_nothing() {
        let mut w = writer();
        let mut dir = DomainSlot::new();
        let outcome = w.add_file("/recycled/a.mp3", Some(1), &mut dir).unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        let done = w.finish().unwrap();
        assert_eq!(done.count, 0);
        assert!(done.domains.groups().is_empty());
        let bytes = done.out.into_inner();
        assert_eq!(bytes.len(), MainHeader::SIZE);
        assert_eq!(&bytes[0..3], &[0, 0, 0]);
    }

    #[test]
    fn only_shuffle_eligible_entries_join_domains() {
        let mut w = writer();
        let mut music = DomainSlot::new();
        let mut books = DomainSlot::new();
        w.add_file("/m/a.mp3", None, &mut music).unwrap();
        w.add_file("/b/1.m4b", None, &mut books).unwrap();
        w.add_file("/m/b.mp3", None, &mut music).unwrap();
        let done = w.finish().unwrap();
        assert_eq!(done.domains.groups(), &[vec![0, 2], vec![]]);
    }

    #[test]
    fn refuses_entries_past_the_24_bit_count() {
        let mut w = writer();
        w.count = U24_MAX;
        let mut dir = DomainSlot::new();

        let err = w.add_file("/a.mp3", Some(1), &mut dir).unwrap_err();
        assert!(matches!(err, WriterError::DatabaseFull));
        // ignored files are still accepted: they take no slot
        assert_eq!(
            w.add_file("/recycled/b.mp3", Some(1), &mut dir).unwrap(),
            Outcome::Ignored
        );
        assert_eq!(w.count(), U24_MAX);
        assert_eq!(dir.index(), None);

        let done = w.finish().unwrap();
        assert!(done.domains.groups().is_empty());
        let bytes = done.out.into_inner();
        assert_eq!(bytes.len(), MainHeader::SIZE);
        assert_eq!(&bytes[0..3], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn flags_follow_resolved_properties() {
        let mut w = writer();
        let mut dir = DomainSlot::new();
        w.add_file("/a.m4b", None, &mut dir).unwrap();
        let bytes = w.finish().unwrap().out.into_inner();
        let record = records(&bytes).next().unwrap();
        assert_eq!(record.kind(), 2);
        assert_eq!((record.shuffle(), record.bookmark()), (0, 1));
    }

    #[test]
    fn existing_header_fields_are_kept_but_count_is_not() {
        let mut existing = ExistingDatabase::empty();
        existing.main.track_count = 99;
        existing.main.padding[0] = 0x11;
        let w = DatabaseWriter::begin(Cursor::new(Vec::new()), existing, RuleSet::builtin(), true)
            .unwrap();
        let bytes = w.finish().unwrap().out.into_inner();
        assert_eq!(&bytes[0..3], &[0, 0, 0]);
        assert_eq!(bytes[9], 0x11);
    }

    #[test]
    fn reuse_uses_cached_bytes() {
        let mut raw = *EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, "/a.mp3").as_bytes();
        raw[EntryRecord::RESERVED_OFFSET] = 9;
        let mut existing = ExistingDatabase::empty();
        existing
            .known
            .insert("/a.mp3".to_owned(), EntryRecord::from_bytes(raw));

        let mut w = DatabaseWriter::begin(Cursor::new(Vec::new()), existing, RuleSet::builtin(), true)
            .unwrap();
        let mut dir = DomainSlot::new();
        let outcome = w.add_file("/a.mp3", None, &mut dir).unwrap();
        assert_eq!(
            outcome,
            Outcome::Written {
                index: 0,
                in_shuffle: true,
                reused: true
            }
        );
        let bytes = w.finish().unwrap().out.into_inner();
        assert_eq!(records(&bytes).next().unwrap().reserved(), 9);
    }
}
