//! Loading an existing `iTunesSD` so unchanged entries can be reused.
//!
//! The loader never fails: a missing, short or corrupt database simply yields
//! the built-in headers and an empty cache, and the rebuild starts from
//! scratch.

use std::collections::HashMap;
use std::io::Read;

use tracing::{debug, warn};

use crate::binary::{EntryHeader, EntryRecord, MainHeader};

/// Filename → the raw entry last written for it.
pub type KnownEntries = HashMap<String, EntryRecord>;

/// How much of the header block the existing database provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSource {
    /// Main header and the first entry's header were both present.
    Complete,
    /// Only the 18-byte main header was present; entry template is built in.
    MainOnly,
    /// Nothing usable; both headers are built in.
    Missing,
}

/// Headers and cached entries recovered from a previous database.
#[derive(Debug, Clone)]
pub struct ExistingDatabase {
    pub main: MainHeader,
    pub template: EntryHeader,
    pub known: KnownEntries,
    pub source: HeaderSource,
}

impl ExistingDatabase {
    /// Size of a complete header block: main header plus one entry header.
    pub const COMPLETE_HEADER: usize = MainHeader::SIZE + EntryHeader::SIZE;

    /// State used when no prior database is available.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            main: MainHeader::empty(),
            template: EntryHeader::DEFAULT,
            known: KnownEntries::new(),
            source: HeaderSource::Missing,
        }
    }

    /// Parse a database image.
    ///
    /// Entries are scanned in 558-byte blocks from offset 18; a trailing
    /// partial block is dropped.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let main = bytes
            .get(..MainHeader::SIZE)
            .and_then(|b| <&[u8; MainHeader::SIZE]>::try_from(b).ok())
            .map(MainHeader::decode);
        let template = bytes
            .get(MainHeader::SIZE..Self::COMPLETE_HEADER)
            .and_then(|b| <[u8; EntryHeader::SIZE]>::try_from(b).ok())
            .map(EntryHeader::from_bytes);

        let (main, template, source) = match (main, template) {
            (Some(main), Some(template)) => (main, template, HeaderSource::Complete),
            (Some(main), None) => (main, EntryHeader::DEFAULT, HeaderSource::MainOnly),
            _ => (MainHeader::empty(), EntryHeader::DEFAULT, HeaderSource::Missing),
        };

        let mut known = KnownEntries::new();
        for record in records(bytes) {
            known.insert(record.filename(), record);
        }
        debug!(entries = known.len(), ?source, "parsed existing database");

        Self {
            main,
            template,
            known,
            source,
        }
    }

    /// Read and parse a database; read errors degrade to an empty database.
    pub fn load<R: Read>(mut reader: R) -> Self {
        let mut bytes = Vec::new();
        match reader.read_to_end(&mut bytes) {
            Ok(_) => Self::parse(&bytes),
            Err(err) => {
                warn!(%err, "existing database unreadable, rebuilding from scratch");
                Self::empty()
            }
        }
    }
}

impl Default for ExistingDatabase {
    fn default() -> Self {
        Self::empty()
    }
}

/// Iterate the complete 558-byte entries of a database image, in order.
pub fn records(bytes: &[u8]) -> impl Iterator<Item = EntryRecord> + '_ {
    bytes
        .get(MainHeader::SIZE..)
        .unwrap_or_default()
        .chunks_exact(EntryRecord::SIZE)
        .filter_map(|chunk| <[u8; EntryRecord::SIZE]>::try_from(chunk).ok())
        .map(EntryRecord::from_bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn image(names: &[&str]) -> Vec<u8> {
        let mut bytes = MainHeader::empty().encode().to_vec();
        for name in names {
            bytes.extend_from_slice(EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, name).as_bytes());
        }
        bytes
    }

    #[test]
    fn empty_input_uses_builtin_headers() {
        let db = ExistingDatabase::parse(&[]);
        assert_eq!(db.source, HeaderSource::Missing);
        assert_eq!(db.main, MainHeader::empty());
        assert_eq!(db.template, EntryHeader::DEFAULT);
        assert!(db.known.is_empty());
    }

    #[test]
    fn main_header_only() {
        let mut bytes = MainHeader::empty().encode().to_vec();
        bytes[4] = 0x07;
        bytes.extend_from_slice(&[0xEE; 10]);
        let db = ExistingDatabase::parse(&bytes);
        assert_eq!(db.source, HeaderSource::MainOnly);
        assert_eq!(db.main.release, [0x01, 0x07, 0x00]);
        assert_eq!(db.template, EntryHeader::DEFAULT);
    }

    #[test]
    fn complete_header_borrows_first_entry_template() {
        let mut bytes = image(&["/a.mp3", "/b.mp3"]);
        bytes[MainHeader::SIZE + 26] = 0x50;
        let db = ExistingDatabase::parse(&bytes);
        assert_eq!(db.source, HeaderSource::Complete);
        assert_eq!(db.template.as_bytes()[26], 0x50);
        assert_eq!(db.known.len(), 2);
        assert!(db.known.contains_key("/a.mp3"));
        assert!(db.known.contains_key("/b.mp3"));
    }

    #[test]
    fn trailing_partial_entry_is_dropped() {
        let mut bytes = image(&["/a.mp3", "/b.mp3"]);
        bytes.truncate(bytes.len() - 100);
        let db = ExistingDatabase::parse(&bytes);
        assert_eq!(db.known.len(), 1);
        assert!(db.known.contains_key("/a.mp3"));
    }

    #[test]
    fn cached_entries_are_byte_exact() {
        let bytes = image(&["/x/y.m4a"]);
        let db = ExistingDatabase::parse(&bytes);
        let cached = db.known.get("/x/y.m4a").unwrap();
        assert_eq!(&cached.as_bytes()[..], &bytes[MainHeader::SIZE..]);
    }

    #[test]
    fn load_reads_from_any_reader() {
        let bytes = image(&["/a.mp3"]);
        let db = ExistingDatabase::load(std::io::Cursor::new(bytes));
        assert_eq!(db.known.len(), 1);
    }

    #[test]
    fn records_preserve_order() {
        let bytes = image(&["/c.mp3", "/a.mp3", "/b.mp3"]);
        let names: Vec<String> = records(&bytes).map(|r| r.filename()).collect();
        assert_eq!(names, ["/c.mp3", "/a.mp3", "/b.mp3"]);
    }
}
