//! Operator interrupt (Ctrl-C) during a rebuild.
//!
//! The first Ctrl-C only raises a flag: traversal notices it before the next
//! item and stops with [`Cancelled`], so the corrupt-database warning still
//! reaches the console and the log file. A second Ctrl-C exits at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::browse::Cancelled;

/// Shared "stop now" flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// A flag nothing will raise except [`Interrupt::raise`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route Ctrl-C to a new flag.
    ///
    /// # Errors
    ///
    /// Returns the `ctrlc` error if a handler cannot be installed (or one
    /// already is).
    pub fn install() -> Result<Self, ctrlc::Error> {
        let interrupt = Self::new();
        let flag = interrupt.clone();
        ctrlc::set_handler(move || {
            if flag.0.swap(true, Ordering::SeqCst) {
                warn!("interrupted twice, exiting immediately");
                warn!("the iPod database is now corrupt and the iPod won't play!");
                std::process::exit(1);
            }
            warn!("interrupt received, stopping after the current file");
        })?;
        Ok(interrupt)
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is up.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_raised() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
