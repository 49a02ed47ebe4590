//! iPod shuffle database — rule engine, `iTunesSD` codec, balanced shuffle.
//!
//! # Modules
//!
//! - [`props`] — `PropertySet` and rule values
//! - [`glob`] — case-insensitive filename patterns
//! - [`rules`] — rule parsing and resolution, built-in extension rules
//! - [`binary`] — byte layout of headers and 558-byte entries
//! - [`database`] — loading an existing database for reuse
//! - [`domain`] — per-directory shuffle groups
//! - [`writer`] — `DatabaseWriter`, header count patching
//! - [`shuffle`] — smart and plain shuffle order, `iTunesShuffle`
//! - [`state`] — `iTunesPState` and `iTunesStats`
//! - [`dump`] — human-readable database listing
//!
//! All I/O goes through caller-supplied `Read`/`Write`/`Seek` handles; the
//! crate never touches paths itself.

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
// TODO: Add rustdoc to remaining public items (fields and accessors)
#![allow(missing_docs)]

pub mod binary;
pub mod database;
pub mod domain;
pub mod dump;
pub mod error;
pub mod glob;
pub mod props;
pub mod rules;
pub mod shuffle;
pub mod state;
pub mod writer;

// Top-level re-exports for convenience
pub use binary::{EntryHeader, EntryRecord, MainHeader};
pub use database::{ExistingDatabase, HeaderSource, KnownEntries};
pub use domain::{DomainSlot, Domains};
pub use error::{RuleError, StateError, WriterError};
pub use props::{PropName, PropertySet, Value};
pub use rules::{Rule, RuleSet};
pub use state::{PlaybackState, VolumeLevel};
pub use writer::{DatabaseWriter, Finished, Outcome};
