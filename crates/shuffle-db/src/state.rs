//! Companion files: `iTunesPState` (playback state) and `iTunesStats`.
//!
//! Both are rewritten from scratch on every rebuild. The playback state keeps
//! the volume and firmware fields of the previous file when there is one; the
//! statistics file simply says "never played" for every entry.

use std::io::Write;

use crate::binary::{read_u24_le, u24_le};
use crate::error::StateError;

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{value} is outside {min}..={max}")]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── VolumeLevel ──────────────────────────────────────────────────────────────

/// Player volume step as stored in `iTunesPState`, 0–38.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VolumeLevel(u8);

impl VolumeLevel {
    /// Loudest step the firmware accepts.
    pub const MAX: u8 = 38;

    /// Volume written when no previous playback state exists.
    pub const DEFAULT: Self = Self(29);

    /// Create a `VolumeLevel`, clamping values above 38 to 38.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    /// Create a `VolumeLevel`, returning an error if `value > 38`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `value > 38`.
    pub fn try_new(value: u32) -> Result<Self, OutOfRangeError> {
        match u8::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(OutOfRangeError {
                value,
                min: 0,
                max: u32::from(Self::MAX),
            }),
        }
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::str::FromStr for VolumeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| format!("`{s}` is not a number"))?;
        Self::try_new(value).map_err(|e| e.to_string())
    }
}

// ── PlaybackState ────────────────────────────────────────────────────────────

/// The 21-byte `iTunesPState` block.
///
/// ```text
/// Offset  Size  Field (all u24 little-endian)
/// ──────  ────  ─────────────────────────────
///  0       3    volume
///  3       3    shuffle position
///  6       3    track index
///  9       3    shuffle mode flag
/// 12       3    position within track
/// 15       3    reserved
/// 18       3    firmware version
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState([u8; 21]);

impl PlaybackState {
    pub const SIZE: usize = 21;
    pub const VOLUME_OFFSET: usize = 0;
    pub const VERSION_OFFSET: usize = 18;

    /// "Track 0, shuffle mode, start of track" for bytes 3..15.
    const RESET: [u8; 12] = [0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0];

    /// Fresh state: default volume, firmware version 1.
    #[must_use]
    pub fn defaults() -> Self {
        let mut bytes = [0u8; Self::SIZE];
        write3(&mut bytes, Self::VOLUME_OFFSET, u24_le(u32::from(VolumeLevel::DEFAULT.get())));
        write3(&mut bytes, Self::VERSION_OFFSET, u24_le(1));
        Self(bytes)
    }

    /// Build the state to write after a rebuild.
    ///
    /// `prior` is the previous file's contents, if it could be read; anything
    /// other than exactly 21 bytes is discarded. Playback always restarts at
    /// the first track in shuffle mode.
    #[must_use]
    pub fn rebuild(prior: Option<&[u8]>, volume: Option<VolumeLevel>) -> Self {
        let mut state = prior
            .and_then(|b| <[u8; Self::SIZE]>::try_from(b).ok())
            .map_or_else(Self::defaults, Self);
        if let Some(position) = state.0.get_mut(3..15) {
            position.copy_from_slice(&Self::RESET);
        }
        if let Some(volume) = volume {
            write3(&mut state.0, Self::VOLUME_OFFSET, u24_le(u32::from(volume.get())));
        }
        state
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    #[must_use]
    pub fn volume(&self) -> u32 {
        self.field(Self::VOLUME_OFFSET)
    }

    #[must_use]
    pub fn track_index(&self) -> u32 {
        self.field(6)
    }

    #[must_use]
    pub fn shuffle_mode(&self) -> bool {
        self.field(9) != 0
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.field(Self::VERSION_OFFSET)
    }

    fn field(&self, offset: usize) -> u32 {
        let mut out = [0u8; 3];
        if let Some(src) = self.0.get(offset..offset.saturating_add(3)) {
            out.copy_from_slice(src);
        }
        read_u24_le(out)
    }

    /// Write the 21 bytes to `out`.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Io` if the write fails.
    pub fn write<W: Write>(&self, mut out: W) -> Result<(), StateError> {
        out.write_all(&self.0)?;
        out.flush()?;
        Ok(())
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::defaults()
    }
}

impl std::fmt::Debug for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackState")
            .field("volume", &self.volume())
            .field("track_index", &self.track_index())
            .field("shuffle_mode", &self.shuffle_mode())
            .field("version", &self.version())
            .finish()
    }
}

fn write3(buf: &mut [u8], offset: usize, value: [u8; 3]) {
    if let Some(dst) = buf.get_mut(offset..offset.saturating_add(3)) {
        dst.copy_from_slice(&value);
    }
}

// ── Statistics ───────────────────────────────────────────────────────────────

/// Size of one per-track statistics record.
pub const STATS_RECORD_SIZE: usize = 18;

/// One "never played" statistics record.
const STATS_RECORD: [u8; STATS_RECORD_SIZE] = [
    18, 0, 0, // record size
    0xFF, 0xFF, 0xFF, // no bookmark
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Render `iTunesStats` for `count` entries.
#[must_use]
pub fn stats_bytes(count: u32) -> Vec<u8> {
    let records = usize::try_from(count).unwrap_or(0);
    let mut out = Vec::with_capacity(
        STATS_RECORD_SIZE
            .saturating_mul(records)
            .saturating_add(6),
    );
    out.extend_from_slice(&u24_le(count));
    out.extend_from_slice(&[0, 0, 0]);
    for _ in 0..records {
        out.extend_from_slice(&STATS_RECORD);
    }
    out
}

/// Write `iTunesStats` for `count` entries.
///
/// # Errors
///
/// Returns `StateError::Io` if the write fails.
pub fn write_stats<W: Write>(mut out: W, count: u32) -> Result<(), StateError> {
    out.write_all(&stats_bytes(count))?;
    out.flush()?;
    Ok(())
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

    #[test]
    fn volume_range() {
        assert_eq!(VolumeLevel::try_new(0).unwrap().get(), 0);
        assert_eq!(VolumeLevel::try_new(38).unwrap().get(), 38);
        let err = VolumeLevel::try_new(39).unwrap_err();
        assert_eq!((err.value, err.min, err.max), (39, 0, 38));
        assert!(VolumeLevel::try_new(300).is_err());
        assert_eq!(VolumeLevel::new(200).get(), 38);
        assert!("12".parse::<VolumeLevel>().is_ok());
        assert!("loud".parse::<VolumeLevel>().is_err());
        assert!("-1".parse::<VolumeLevel>().is_err());
    }

    #[test]
    fn defaults_when_no_prior_state() {
        let state = PlaybackState::rebuild(None, None);
        assert_eq!(
            state.as_bytes(),
            &[29, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0]
        );
        assert_eq!(state.volume(), 29);
        assert_eq!(state.version(), 1);
        assert!(state.shuffle_mode());
    }

    #[test]
    fn wrong_size_prior_is_discarded() {
        let state = PlaybackState::rebuild(Some(&[7; 20]), None);
        assert_eq!(state, PlaybackState::rebuild(None, None));
    }

    #[test]
    fn prior_state_keeps_volume_and_trailer_but_resets_position() {
        let mut prior = [0xAAu8; 21];
        prior[0..3].copy_from_slice(&[20, 0, 0]);
        let state = PlaybackState::rebuild(Some(&prior), None);
        let bytes = state.as_bytes();
        assert_eq!(&bytes[0..3], &[20, 0, 0]);
        assert_eq!(&bytes[3..15], &[0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[15..21], &[0xAA; 6]);
        assert_eq!(state.track_index(), 0);
    }

    #[test]
    fn volume_override() {
        let state = PlaybackState::rebuild(None, Some(VolumeLevel::new(5)));
        assert_eq!(&state.as_bytes()[0..3], &[5, 0, 0]);
    }

    #[test]
    fn stats_layout() {
        let bytes = stats_bytes(2);
        assert_eq!(bytes.len(), 6 + 2 * 18);
        assert_eq!(&bytes[0..6], &[2, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[6..12], &[18, 0, 0, 0xFF, 0xFF, 0xFF]);
        assert!(bytes[12..24].iter().all(|&b| b == 0));
        assert_eq!(&bytes[24..30], &[18, 0, 0, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn empty_stats() {
        let mut out = Vec::new();
        write_stats(&mut out, 0).unwrap();
        assert_eq!(out, vec![0; 6]);
    }
}
