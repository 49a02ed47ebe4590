//! End-to-end tests: DatabaseWriter → disk → ExistingDatabase → DatabaseWriter.
//!
//! No mocks. Uses tempfiles, the same way a rebuild runs against a mounted
//! volume.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use shuffle_db::binary::{EntryRecord, MainHeader};
use shuffle_db::database::records;
use shuffle_db::shuffle::{generate, write_sequence};
use shuffle_db::{DatabaseWriter, DomainSlot, ExistingDatabase, RuleSet};
use tempfile::TempDir;

// (directory, file) pairs in traversal order
const VOLUME: &[(&str, &str)] = &[
    ("/Music/A", "/Music/A/01.mp3"),
    ("/Music/A", "/Music/A/02.mp3"),
    ("/Music/A", "/Music/A/03.m4a"),
    ("/Music/B", "/Music/B/talk.m4b"),
    ("/Music/B", "/Music/B/x.mp3"),
    ("/Recycled", "/Recycled/old.mp3"),
    ("/Sounds", "/Sounds/beep.wav"),
];

const USER_RULES: &str = "\
# keep the intro out of shuffle
filename ~ */01.mp3: shuffle=0
";

/// Run one rebuild of `VOLUME` into `db_path`, reading whatever is already there.
fn rebuild(db_path: &Path, reuse: bool) -> (u32, Vec<Vec<u32>>) {
    let existing = match fs::read(db_path) {
        Ok(bytes) if reuse => ExistingDatabase::parse(&bytes),
        _ => ExistingDatabase::empty(),
    };
    let out = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(db_path)
        .expect("open database");
    let rules = RuleSet::with_user_rules(USER_RULES);
    let mut writer = DatabaseWriter::begin(out, existing, rules, reuse).expect("header");

    let mut current: Option<(&str, DomainSlot)> = None;
    for &(dir, file) in VOLUME {
        if current.map(|(d, _)| d) != Some(dir) {
            current = Some((dir, DomainSlot::new()));
        }
        let (_, slot) = current.as_mut().unwrap();
        writer.add_file(file, Some(1000), slot).expect("add_file");
    }
    let done = writer.finish().expect("finish");
    (done.count, done.domains.into_groups())
}

#[test]
fn e2e_count_matches_non_ignored_files() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("iTunesSD");
    let (count, _) = rebuild(&db, true);

    let bytes = fs::read(&db).unwrap();
    assert_eq!(count, 6);
    assert_eq!(&bytes[0..3], &[0, 0, 6]);
    assert_eq!(bytes.len(), MainHeader::SIZE + 6 * EntryRecord::SIZE);
    assert!(records(&bytes).all(|r| !r.filename().starts_with("/Recycled")));
}

#[test]
fn e2e_domains_follow_directories_and_shuffle_flags() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("iTunesSD");
    let (_, domains) = rebuild(&db, true);

    // 01.mp3 is excluded by the user rule, talk.m4b and beep.wav by the
    // built-in rules; their directories still get a domain.
    assert_eq!(domains, vec![vec![1, 2], vec![4], vec![]]);

    let bytes = fs::read(&db).unwrap();
    let flags: Vec<u8> = records(&bytes).map(|r| r.shuffle()).collect();
    assert_eq!(flags, vec![0, 1, 1, 0, 1, 0]);
}

#[test]
fn e2e_second_run_with_reuse_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("iTunesSD");
    rebuild(&db, true);

    // Mark an opaque byte so reuse is observable.
    let mut first = fs::read(&db).unwrap();
    first[MainHeader::SIZE + EntryRecord::RESERVED_OFFSET] = 0x42;
    fs::write(&db, &first).unwrap();

    rebuild(&db, true);
    let second = fs::read(&db).unwrap();
    assert_eq!(first, second);
}

#[test]
fn e2e_without_reuse_entries_are_fresh() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("iTunesSD");
    rebuild(&db, true);
    let mut first = fs::read(&db).unwrap();
    first[MainHeader::SIZE + EntryRecord::RESERVED_OFFSET] = 0x42;
    fs::write(&db, &first).unwrap();

    rebuild(&db, false);
    let second = fs::read(&db).unwrap();
    assert_eq!(second[MainHeader::SIZE + EntryRecord::RESERVED_OFFSET], 0);
}

#[test]
fn e2e_all_ignored_gives_empty_database_and_shuffle() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("iTunesSD");
    let out = File::create(&db).unwrap();
    let rules = RuleSet::with_user_rules(": ignore=1");
    let mut writer =
        DatabaseWriter::begin(out, ExistingDatabase::empty(), rules, true).unwrap();
    let mut slot = DomainSlot::new();
    for &(_, file) in VOLUME {
        writer.add_file(file, None, &mut slot).unwrap();
    }
    let done = writer.finish().unwrap();
    assert_eq!(done.count, 0);

    let bytes = fs::read(&db).unwrap();
    assert_eq!(bytes, MainHeader::empty().encode().to_vec());

    let seq = generate(done.domains.groups(), true, &mut StdRng::seed_from_u64(3));
    let shuffle_path = tmp.path().join("iTunesShuffle");
    write_sequence(File::create(&shuffle_path).unwrap(), &seq).unwrap();
    assert_eq!(fs::metadata(&shuffle_path).unwrap().len(), 0);
}
