//! rebuild_db — rebuild the database of a first-generation iPod shuffle.
//!
//! # Modules
//!
//! - [`config`] — command-line options
//! - [`layout`] — device file locations
//! - [`logging`] — console and log-file output
//! - [`browse`] — volume traversal and interactive prompts
//! - [`interrupt`] — Ctrl-C handling
//! - [`rename`] — safe file and directory names
//! - [`rebuild`] — a full rebuild and the dump mode

// TODO: Add rustdoc to remaining public items (fields and accessors)
#![allow(missing_docs)]

pub mod browse;
pub mod config;
pub mod interrupt;
pub mod layout;
pub mod logging;
pub mod rebuild;
pub mod rename;

pub use browse::{Cancelled, Prompt, StdinPrompt};
pub use config::{Cli, Options};
pub use interrupt::Interrupt;
pub use layout::Layout;
pub use rebuild::Summary;
