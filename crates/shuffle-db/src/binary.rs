//! Binary layout of the `iTunesSD` database.
//!
//! ```text
//! iTunesSD
//! ├── MainHeader      — 18 B (track count patched last)
//! └── EntryRecord × N — 558 B each, in traversal order
//! ```
//!
//! All multi-byte header and entry fields are 24-bit big-endian. The
//! companion files (`iTunesShuffle`, `iTunesPState`, `iTunesStats`) use
//! 24-bit little-endian instead; see [`u24_le`].

use crate::props::PropertySet;

// ---------------------------------------------------------------------------
// 24-bit integer helpers
// ---------------------------------------------------------------------------

/// Largest value a 24-bit field can hold.
pub const U24_MAX: u32 = 0x00FF_FFFF;

/// Decode a 24-bit big-endian integer.
#[must_use]
pub fn read_u24_be(bytes: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

/// Encode `value mod 2^24` as 24-bit big-endian.
#[must_use]
pub fn u24_be(value: u32) -> [u8; 3] {
    let [_, a, b, c] = value.to_be_bytes();
    [a, b, c]
}

/// Encode `value mod 2^24` as 24-bit little-endian (low byte first).
#[must_use]
pub fn u24_le(value: u32) -> [u8; 3] {
    let [a, b, c, _] = value.to_le_bytes();
    [a, b, c]
}

/// Decode a 24-bit little-endian integer.
#[must_use]
pub fn read_u24_le(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// Copy out the three bytes at `offset`.
///
/// Only called with compile-time offsets inside fixed-size buffers.
#[allow(clippy::indexing_slicing)]
fn field3(buf: &[u8], offset: usize) -> [u8; 3] {
    [
        buf[offset],
        buf[offset.saturating_add(1)],
        buf[offset.saturating_add(2)],
    ]
}

// ---------------------------------------------------------------------------
// MainHeader — 18 bytes at offset 0
// ---------------------------------------------------------------------------

/// The 18-byte main header.
///
/// Layout:
/// ```text
/// [0..3]   track_count  u24 be  (patched after all entries are written)
/// [3..6]   release      opaque token (0x010600 on freshly built databases)
/// [6..9]   header_size  u24 be  (18)
/// [9..18]  padding      opaque, preserved
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainHeader {
    pub track_count: u32,
    pub release: [u8; 3],
    pub header_size: u32,
    pub padding: [u8; 9],
}

impl MainHeader {
    pub const SIZE: usize = 18;
    /// Offset of the track count, rewritten in place at the end of a run.
    pub const COUNT_OFFSET: u64 = 0;

    /// The header written when no usable database exists on the device.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            track_count: 0,
            release: [0x01, 0x06, 0x00],
            header_size: 18,
            padding: [0; 9],
        }
    }

    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..3].copy_from_slice(&u24_be(self.track_count));
        buf[3..6].copy_from_slice(&self.release);
        buf[6..9].copy_from_slice(&u24_be(self.header_size));
        buf[9..18].copy_from_slice(&self.padding);
        buf
    }

    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        let mut padding = [0u8; 9];
        padding.copy_from_slice(&buf[9..18]);
        Self {
            track_count: read_u24_be(field3(buf, 0)),
            release: field3(buf, 3),
            header_size: read_u24_be(field3(buf, 6)),
            padding,
        }
    }
}

impl Default for MainHeader {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// EntryHeader — first 33 bytes of every entry
// ---------------------------------------------------------------------------

/// The 33-byte prefix of an entry, used as the template for new entries.
///
/// Layout (all u24 big-endian):
/// ```text
/// [0..3]   record size (558)     [18..21] unknown 4
/// [3..6]   unknown 1             [21..24] unknown 5
/// [6..9]   start time (ticks)    [24..27] volume (100 = unchanged)
/// [9..12]  unknown 2             [27..30] file type (patched at byte 29)
/// [12..15] unknown 3             [30..33] unknown 6
/// [15..18] stop time (ticks)
/// ```
///
/// The unknown fields are carried verbatim; their meaning is not inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader([u8; 33]);

impl EntryHeader {
    pub const SIZE: usize = 33;
    /// Offset of the file type byte (low byte of the type field).
    pub const TYPE_OFFSET: usize = 29;

    /// The template used when no existing entry can be borrowed from.
    pub const DEFAULT: Self = Self([
        0x00, 0x02, 0x2E, // record size 558
        0x5A, 0xA5, 0x01, // unknown 1
        0, 0, 0, // start
        0, 0, 0, // unknown 2
        0, 0, 0, // unknown 3
        0, 0, 0, // stop
        0, 0, 0, // unknown 4
        0, 0, 0, // unknown 5
        0, 0, 0x64, // volume 100
        0, 0, 0x01, // type MP3
        0, 0x02, 0x00, // unknown 6
    ]);

    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }
}

impl Default for EntryHeader {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// EntryRecord — 558-byte entry
// ---------------------------------------------------------------------------

/// One 558-byte database entry.
///
/// Layout:
/// ```text
/// [0..33]    EntryHeader
/// [33..555]  filename    UTF-16LE, at most 261 code units, zero-padded
/// [555]      shuffle     1 = part of the shuffle sequence
/// [556]      bookmark    1 = resume position is remembered
/// [557]      reserved    opaque, carried over from the source bytes
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct EntryRecord([u8; 558]);

impl EntryRecord {
    pub const SIZE: usize = 558;
    pub const NAME_OFFSET: usize = EntryHeader::SIZE;
    pub const NAME_UNITS: usize = 261;
    pub const NAME_END: usize = 555;
    pub const SHUFFLE_OFFSET: usize = 555;
    pub const BOOKMARK_OFFSET: usize = 556;
    pub const RESERVED_OFFSET: usize = 557;
    /// Value of the reserved byte on freshly synthesised entries.
    pub const FRESH_RESERVED: u8 = 0;

    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a fresh entry from `template`, with the type byte set to `kind`
    /// and `filename` written into the name field.
    ///
    /// Names longer than [`Self::NAME_UNITS`] UTF-16 code units are truncated.
    ///
    /// # Safety (lint allow)
    /// Header and name offsets are constants within `[0, SIZE)`; `i` is
    /// bounded by `take(NAME_UNITS)` so `NAME_OFFSET + 2*i + 1 < NAME_END`.
    #[must_use]
    #[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
    pub fn synthesize(template: &EntryHeader, kind: u8, filename: &str) -> Self {
        #[allow(clippy::large_stack_arrays)]
        let mut buf = [0u8; Self::SIZE];
        buf[..EntryHeader::SIZE].copy_from_slice(template.as_bytes());
        buf[EntryHeader::TYPE_OFFSET] = kind;
        for (i, unit) in filename.encode_utf16().take(Self::NAME_UNITS).enumerate() {
            let at = Self::NAME_OFFSET + 2 * i;
            buf[at..at + 2].copy_from_slice(&unit.to_le_bytes());
        }
        buf[Self::RESERVED_OFFSET] = Self::FRESH_RESERVED;
        Self(buf)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// The entry's 33-byte header.
    ///
    /// # Safety (lint allow)
    /// `EntryHeader::SIZE < SIZE`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn header(&self) -> EntryHeader {
        let mut bytes = [0u8; EntryHeader::SIZE];
        bytes.copy_from_slice(&self.0[..EntryHeader::SIZE]);
        EntryHeader(bytes)
    }

    /// Decode the filename: UTF-16LE units up to the first zero unit.
    ///
    /// # Safety (lint allow)
    /// `NAME_OFFSET..NAME_END` is a constant range within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn filename(&self) -> String {
        let units: Vec<u16> = self.0[Self::NAME_OFFSET..Self::NAME_END]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }

    #[must_use]
    #[allow(clippy::indexing_slicing)] // SAFETY: constant offset < SIZE
    pub fn kind(&self) -> u8 {
        self.0[EntryHeader::TYPE_OFFSET]
    }

    #[must_use]
    #[allow(clippy::indexing_slicing)] // SAFETY: constant offset < SIZE
    pub fn shuffle(&self) -> u8 {
        self.0[Self::SHUFFLE_OFFSET]
    }

    #[must_use]
    #[allow(clippy::indexing_slicing)] // SAFETY: constant offset < SIZE
    pub fn bookmark(&self) -> u8 {
        self.0[Self::BOOKMARK_OFFSET]
    }

    #[must_use]
    #[allow(clippy::indexing_slicing)] // SAFETY: constant offset < SIZE
    pub fn reserved(&self) -> u8 {
        self.0[Self::RESERVED_OFFSET]
    }

    /// Overwrite the shuffle and bookmark flags, leaving everything else alone.
    #[allow(clippy::indexing_slicing)] // SAFETY: constant offsets < SIZE
    pub fn set_flags(&mut self, shuffle: u8, bookmark: u8) {
        self.0[Self::SHUFFLE_OFFSET] = shuffle;
        self.0[Self::BOOKMARK_OFFSET] = bookmark;
    }

    /// Field-by-field breakdown for the dump view.
    #[must_use]
    pub fn view(&self) -> EntryView {
        let b = &self.0;
        EntryView {
            record_size: read_u24_be(field3(b, 0)),
            unknown1: read_u24_be(field3(b, 3)),
            start_ticks: read_u24_be(field3(b, 6)),
            unknown2: read_u24_be(field3(b, 9)),
            unknown3: read_u24_be(field3(b, 12)),
            stop_ticks: read_u24_be(field3(b, 15)),
            unknown4: read_u24_be(field3(b, 18)),
            unknown5: read_u24_be(field3(b, 21)),
            volume: read_u24_be(field3(b, 24)),
            file_type: read_u24_be(field3(b, 27)),
            unknown6: read_u24_be(field3(b, 30)),
            filename: self.filename(),
            shuffle: self.shuffle() != 0,
            bookmark: self.bookmark() != 0,
            reserved: self.reserved(),
        }
    }
}

impl core::fmt::Debug for EntryRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntryRecord")
            .field("filename", &self.filename())
            .field("kind", &self.kind())
            .field("shuffle", &self.shuffle())
            .field("bookmark", &self.bookmark())
            .field("reserved", &self.reserved())
            .finish()
    }
}

/// Decoded entry fields, for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub record_size: u32,
    pub unknown1: u32,
    pub start_ticks: u32,
    pub unknown2: u32,
    pub unknown3: u32,
    pub stop_ticks: u32,
    pub unknown4: u32,
    pub unknown5: u32,
    pub volume: u32,
    pub file_type: u32,
    pub unknown6: u32,
    pub filename: String,
    pub shuffle: bool,
    pub bookmark: bool,
    pub reserved: u8,
}

// ---------------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------------

/// Produce the entry for `props`.
///
/// When `props.reuse` is set and `reused` holds a prior entry for the same
/// file, that entry is the starting point; otherwise a fresh one is built from
/// `template`. Either way the shuffle and bookmark flags come from `props`
/// and the reserved byte is whatever the starting point carried.
#[must_use]
pub fn encode(props: &PropertySet, template: &EntryHeader, reused: Option<&EntryRecord>) -> EntryRecord {
    let mut record = match reused {
        Some(prior) if props.reuse => prior.clone(),
        _ => EntryRecord::synthesize(template, props.kind, &props.filename),
    };
    record.set_flags(props.shuffle, props.bookmark);
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn props(name: &str, kind: u8, shuffle: u8, bookmark: u8) -> PropertySet {
        let mut p = PropertySet::defaults(name, Some(1), true);
        p.kind = kind;
        p.shuffle = shuffle;
        p.bookmark = bookmark;
        p
    }

    #[test]
    fn u24_helpers_use_the_right_byte_order() {
        assert_eq!(u24_be(0x0001_022E), [0x01, 0x02, 0x2E]);
        assert_eq!(u24_le(0x0001_022E), [0x2E, 0x02, 0x01]);
        assert_eq!(read_u24_be([0x00, 0x02, 0x2E]), 558);
        assert_eq!(read_u24_le([0x2E, 0x02, 0x00]), 558);
    }

    #[test]
    fn u24_wraps_modulo_2_pow_24() {
        assert_eq!(u24_le(0x0100_0005), [5, 0, 0]);
        assert_eq!(u24_le(u32::MAX), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn empty_main_header_bytes() {
        assert_eq!(
            MainHeader::empty().encode(),
            [0, 0, 0, 1, 6, 0, 0, 0, 18, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn main_header_decode_reads_count_big_endian() {
        let mut raw = MainHeader::empty().encode();
        raw[0..3].copy_from_slice(&[0x00, 0x01, 0x2C]);
        raw[17] = 0xAB;
        let h = MainHeader::decode(&raw);
        assert_eq!(h.track_count, 300);
        assert_eq!(h.header_size, 18);
        assert_eq!(h.padding[8], 0xAB);
        assert_eq!(h.encode(), raw);
    }

    #[test]
    fn default_template_describes_a_558_byte_mp3() {
        let t = EntryHeader::DEFAULT.as_bytes();
        assert_eq!(read_u24_be([t[0], t[1], t[2]]), EntryRecord::SIZE as u32);
        assert_eq!(t[EntryHeader::TYPE_OFFSET], 1);
        assert_eq!(read_u24_be([t[24], t[25], t[26]]), 100);
    }

    #[test]
    fn synthesized_entry_layout() {
        let r = EntryRecord::synthesize(&EntryHeader::DEFAULT, 2, "/a.m4a");
        let b = r.as_bytes();
        assert_eq!(b.len(), 558);
        assert_eq!(b[29], 2);
        assert_eq!(&b[33..45], b"/\0a\0.\0m\x004\0a\0");
        assert!(b[45..555].iter().all(|&x| x == 0));
        assert_eq!(r.filename(), "/a.m4a");
        assert_eq!(r.reserved(), EntryRecord::FRESH_RESERVED);
    }

    #[test]
    fn long_names_are_truncated_to_261_units() {
        let name: String = core::iter::once('/').chain(core::iter::repeat('x').take(400)).collect();
        let r = EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, &name);
        assert_eq!(r.as_bytes().len(), EntryRecord::SIZE);
        assert_eq!(r.filename().chars().count(), EntryRecord::NAME_UNITS);
        assert!(name.starts_with(&r.filename()));
    }

    #[test]
    fn non_ascii_names_round_trip() {
        let r = EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, "/Björk/Jóga.mp3");
        assert_eq!(r.filename(), "/Björk/Jóga.mp3");
    }

    #[test]
    fn encode_then_view_recovers_properties() {
        let r = encode(&props("/x.wav", 4, 0, 1), &EntryHeader::DEFAULT, None);
        let v = r.view();
        assert_eq!(v.file_type, 4);
        assert!(!v.shuffle);
        assert!(v.bookmark);
        assert_eq!(v.filename, "/x.wav");
        assert_eq!(v.record_size, 558);
        assert_eq!(v.volume, 100);
    }

    #[test]
    fn reserved_byte_is_passthrough_on_reuse() {
        let mut raw = *EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, "/a.mp3").as_bytes();
        raw[EntryRecord::RESERVED_OFFSET] = 0x7E;
        raw[10] = 0x42; // something only the old entry knows
        let prior = EntryRecord::from_bytes(raw);

        let r = encode(&props("/a.mp3", 1, 0, 1), &EntryHeader::DEFAULT, Some(&prior));
        assert_eq!(r.reserved(), 0x7E);
        assert_eq!(r.as_bytes()[10], 0x42);
        assert_eq!((r.shuffle(), r.bookmark()), (0, 1));
    }

    #[test]
    fn reuse_disabled_ignores_prior_entry() {
        let mut raw = *EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, "/a.mp3").as_bytes();
        raw[EntryRecord::RESERVED_OFFSET] = 0x7E;
        let prior = EntryRecord::from_bytes(raw);

        let mut p = props("/a.mp3", 1, 1, 0);
        p.reuse = false;
        let r = encode(&p, &EntryHeader::DEFAULT, Some(&prior));
        assert_eq!(r.reserved(), EntryRecord::FRESH_RESERVED);
    }

    #[test]
    fn reused_type_byte_is_not_repatched() {
        let prior = EntryRecord::synthesize(&EntryHeader::DEFAULT, 1, "/a.m4a");
        let r = encode(&props("/a.m4a", 2, 1, 0), &EntryHeader::DEFAULT, Some(&prior));
        assert_eq!(r.kind(), 1);
    }

    #[test]
    fn template_fields_flow_into_fresh_entries() {
        let mut bytes = *EntryHeader::DEFAULT.as_bytes();
        bytes[26] = 90; // volume -10 %
        let r = encode(
            &props("/a.mp3", 1, 1, 0),
            &EntryHeader::from_bytes(bytes),
            None,
        );
        assert_eq!(r.view().volume, 90);
        assert_eq!(r.header().as_bytes()[26], 90);
    }
}
