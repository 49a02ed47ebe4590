//! Human-readable rendering of an existing `iTunesSD`.
//!
//! Used by `--dump`; nothing here writes to the device.

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use crate::binary::{EntryView, MainHeader};
use crate::database::records;

/// Length of one playback tick.
pub const TICK: Duration = Duration::from_millis(256);

const TYPE_NAMES: [&str; 5] = ["Unknown", "MP3", "AAC", "Unknown", "WAV"];

/// Display name of an entry's file type field.
#[must_use]
pub fn type_name(file_type: u32) -> &'static str {
    usize::try_from(file_type)
        .ok()
        .and_then(|i| TYPE_NAMES.get(i))
        .copied()
        .unwrap_or("Unknown")
}

fn seconds(ticks: u32) -> f64 {
    TICK.saturating_mul(ticks).as_secs_f64()
}

impl fmt::Display for MainHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "iTunesSD header")?;
        writeln!(
            f,
            "\theader size: {} bytes, padding: 0x{}",
            self.header_size,
            hex(&self.padding)
        )?;
        writeln!(f, "\trelease token: 0x{}", hex(&self.release))?;
        writeln!(f, "\t{} songs", self.track_count)
    }
}

impl fmt::Display for EntryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(39))?;
        writeln!(f, "File:\n\t{}", self.filename)?;
        writeln!(
            f,
            "Type:\n\t0x{:06x} ({})",
            self.file_type,
            type_name(self.file_type)
        )?;
        writeln!(
            f,
            "\tstart: {:.3} s\tstop: {:.3} s\tvolume: 0x{:06x} ({}%)",
            seconds(self.start_ticks),
            seconds(self.stop_ticks),
            self.volume,
            i64::from(self.volume).saturating_sub(100)
        )?;
        writeln!(
            f,
            "\t{}\t{}\trecord size: {} bytes",
            if self.bookmark { "bookmarkable" } else { "not bookmarkable" },
            if self.shuffle { "in shuffle" } else { "not in shuffle" },
            self.record_size
        )?;
        writeln!(f, "Unknown fields:")?;
        writeln!(
            f,
            "\tU1: 0x{:06x}\tU2: 0x{:06x}\tU3: 0x{:06x}\tU4: 0x{:06x}",
            self.unknown1, self.unknown2, self.unknown3, self.unknown4
        )?;
        writeln!(
            f,
            "\tU5: 0x{:06x}\tU6: 0x{:06x}\tU7: 0x{:02x}",
            self.unknown5, self.unknown6, self.reserved
        )
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Print the header (when at least 18 bytes are present) and every complete
/// entry of `bytes`. Returns the number of entries printed.
///
/// # Errors
///
/// Returns any error from writing to `out`.
pub fn dump<W: Write>(bytes: &[u8], mut out: W) -> io::Result<usize> {
    if let Some(header) = bytes
        .get(..MainHeader::SIZE)
        .and_then(|b| <&[u8; MainHeader::SIZE]>::try_from(b).ok())
    {
        writeln!(out, "{}", MainHeader::decode(header))?;
    }
    let mut printed = 0usize;
    for record in records(bytes) {
        writeln!(out, "{}", record.view())?;
        printed = printed.saturating_add(1);
    }
    Ok(printed)
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
    use crate::binary::{EntryHeader, EntryRecord};

    #[test]
    fn type_names() {
        assert_eq!(type_name(1), "MP3");
        assert_eq!(type_name(2), "AAC");
        assert_eq!(type_name(4), "WAV");
        assert_eq!(type_name(3), "Unknown");
        assert_eq!(type_name(77), "Unknown");
    }

    #[test]
    fn header_text() {
        let text = MainHeader::empty().to_string();
        assert!(text.contains("header size: 18 bytes"));
        assert!(text.contains("release token: 0x010600"));
        assert!(text.contains("0 songs"));
    }

    #[test]
    fn entry_text() {
        let record = EntryRecord::synthesize(&EntryHeader::DEFAULT, 2, "/a.m4a");
        let text = record.view().to_string();
        assert!(text.contains("/a.m4a"));
        assert!(text.contains("(AAC)"));
        // template volume 0x64 = 100 -> 0 %
        assert!(text.contains("(0%)"));
        assert!(text.contains("record size: 558 bytes"));
    }

    #[test]
    fn dump_counts_entries_and_skips_partial() {
        let mut bytes = MainHeader::empty().encode().to_vec();
        for name in ["/a.mp3", "/b.mp3"] {
            bytes.extend_from_slice(
                EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, name).as_bytes(),
            );
        }
        bytes.extend_from_slice(&[0; 40]);
        let mut out = Vec::new();
        assert_eq!(dump(&bytes, &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("iTunesSD header"));
        assert!(text.contains("/b.mp3"));
    }

    #[test]
    fn dump_of_nothing_prints_nothing() {
        let mut out = Vec::new();
        assert_eq!(dump(&[], &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn ticks_are_256_ms() {
        assert!((seconds(125) - 32.0).abs() < 1e-9);
    }
}
