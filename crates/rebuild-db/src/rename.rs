//! Renaming files and directories to names the player can display.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
#[must_use]
pub fn safe_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Split `name` into stem and extension (with its dot).
///
/// A leading dot does not start an extension.
#[must_use]
pub fn split_ext(name: &str) -> (&str, &str) {
    let Some(pos) = name.rfind('.') else {
        return (name, "");
    };
    let (stem, ext) = name.split_at(pos);
    if stem.chars().all(|c| c == '.') {
        (name, "")
    } else {
        (stem, ext)
    }
}

/// The name `name` should be renamed to inside `dir`, or `None` if it is
/// already safe.
///
/// Collisions with existing entries get a `_N` suffix, counting from 0.
#[must_use]
pub fn safe_name(dir: &Path, name: &str) -> Option<String> {
    let (stem, ext) = split_ext(name);
    let mut candidate = safe_stem(stem);
    if candidate == stem {
        return None;
    }
    if dir.join(format!("{candidate}{ext}")).exists() {
        let mut n = 0u32;
        while dir.join(format!("{candidate}_{n}{ext}")).exists() {
            n = n.saturating_add(1);
        }
        candidate = format!("{candidate}_{n}");
    }
    Some(format!("{candidate}{ext}"))
}

/// Rename `dir/name` to a safe name and return the name now in effect.
///
/// A failed rename keeps the old name.
pub fn rename_safely(dir: &Path, name: &str) -> String {
    let Some(new_name) = safe_name(dir, name) else {
        return name.to_owned();
    };
    match fs::rename(dir.join(name), dir.join(&new_name)) {
        Ok(()) => {
            info!(from = name, to = %new_name, "renamed");
            new_name
        }
        Err(err) => {
            warn!(name, %err, "rename failed, keeping the old name");
            name.to_owned()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stems_are_sanitised() {
        assert_eq!(safe_stem("Hello World!"), "Hello_World_");
        assert_eq!(safe_stem("ok-name_1"), "ok-name_1");
        assert_eq!(safe_stem("Café"), "Caf_");
    }

    #[test]
    fn extension_split() {
        assert_eq!(split_ext("a b.mp3"), ("a b", ".mp3"));
        assert_eq!(split_ext("a.b.mp3"), ("a.b", ".mp3"));
        assert_eq!(split_ext("noext"), ("noext", ""));
        assert_eq!(split_ext(".hidden"), (".hidden", ""));
    }

    #[test]
    fn safe_names_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(safe_name(tmp.path(), "track_01.mp3"), None);
    }

    #[test]
    fn collision_gets_numbered_suffix() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a_b.mp3"), b"x").unwrap();
        fs::write(tmp.path().join("a_b_0.mp3"), b"x").unwrap();
        assert_eq!(safe_name(tmp.path(), "a b.mp3").unwrap(), "a_b_1.mp3");
    }

    #[test]
    fn rename_moves_the_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("my song.mp3"), b"x").unwrap();
        let name = rename_safely(tmp.path(), "my song.mp3");
        assert_eq!(name, "my_song.mp3");
        assert!(tmp.path().join("my_song.mp3").exists());
        assert!(!tmp.path().join("my song.mp3").exists());
    }

    #[test]
    fn failed_rename_keeps_old_name() {
        let tmp = TempDir::new().unwrap();
        // source does not exist
        assert_eq!(rename_safely(tmp.path(), "gone file.mp3"), "gone file.mp3");
    }
}
