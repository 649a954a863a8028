//! Resolving logical records to audio files on disk.
//!
//! Three strategies cover the dataset layouts: direct construction of a clip
//! path, direct construction of an episode path, and a one-shot tree index
//! for datasets whose directory structure is not semantically meaningful.
//! A path that does not exist is never an error here; resolution reports
//! `None` and the decode stage records the miss.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::metadata::ClipKey;

/// Extensions picked up by the tree index (lowercase, without dots).
const INDEXED_AUDIO_EXTENSIONS: [&str; 4] = ["wav", "aif", "aiff", "flac"];

/// Errors raised while building a tree index.
#[derive(Debug, Error)]
pub enum WalkError {
    /// The index root itself is missing or unreadable.
    #[error("Audio root {path} is not a readable directory: {source}")]
    InvalidRoot {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Expected file name for a clip, `{show}_{ep}_{clip}.wav`.
pub fn clip_file_name(key: &ClipKey) -> String {
    format!("{}.wav", key)
}

/// Resolve a clip under `clips_root/<show>/<ep>/<show>_<ep>_<clip>.wav`,
/// probing the filesystem once.
pub fn resolve_clip(clips_root: &Path, key: &ClipKey) -> Option<PathBuf> {
    let path = clips_root
        .join(&key.show)
        .join(key.ep_id.to_string())
        .join(clip_file_name(key));
    path.is_file().then_some(path)
}

/// Resolve a full episode under `originals_root/<show>/<ep>.wav`, probing
/// the filesystem once.
pub fn resolve_episode(originals_root: &Path, show: &str, ep_id: i64) -> Option<PathBuf> {
    let path = originals_root.join(show).join(format!("{ep_id}.wav"));
    path.is_file().then_some(path)
}

/// Bare-filename index over an arbitrary directory tree.
///
/// Built once with a single recursive walk, then shared read-only by every
/// worker; lookups are O(1) instead of one stat per record. When two files
/// in different subdirectories share a bare name, the one encountered later
/// in the walk wins. The walk visits each directory's entries in name
/// order, depth first, so the winner is deterministic for a given tree.
#[derive(Debug, Default)]
pub struct TreeIndex {
    by_name: HashMap<String, PathBuf>,
}

impl TreeIndex {
    /// Walk `root` and index every supported audio file by bare filename.
    ///
    /// Unreadable subdirectories are logged and skipped; an unreadable root
    /// is fatal. Symlinks are not followed.
    pub fn build(root: &Path) -> Result<TreeIndex, WalkError> {
        let mut by_name = HashMap::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(source) if dir != root => {
                    warn!(
                        dir = %dir.display(),
                        error = %source,
                        "Failed to read directory while indexing"
                    );
                    continue;
                }
                Err(source) => {
                    return Err(WalkError::InvalidRoot {
                        path: dir.clone(),
                        source,
                    });
                }
            };

            let mut files = Vec::new();
            let mut subdirs = Vec::new();
            for entry_result in entries {
                let entry = match entry_result {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(
                            dir = %dir.display(),
                            error = %err,
                            "Failed to read directory entry while indexing"
                        );
                        continue;
                    }
                };
                let path = entry.path();
                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "Failed to read file type while indexing"
                        );
                        continue;
                    }
                };
                if file_type.is_symlink() {
                    continue;
                }
                if file_type.is_dir() {
                    subdirs.push(path);
                } else if file_type.is_file() && is_indexed_audio(&path) {
                    files.push(path);
                }
            }

            files.sort();
            for path in files {
                if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                    // Last write wins for duplicate bare names.
                    by_name.insert(name.to_string(), path.clone());
                }
            }
            // Popping takes the last element, so push in reverse to visit
            // subdirectories in name order.
            subdirs.sort();
            subdirs.reverse();
            stack.extend(subdirs);
        }
        Ok(TreeIndex { by_name })
    }

    /// Look up the expected clip file for a key.
    pub fn resolve(&self, key: &ClipKey) -> Option<PathBuf> {
        self.by_name.get(&clip_file_name(key)).cloned()
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Return true if the path has an extension the tree index picks up.
fn is_indexed_audio(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    INDEXED_AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(show: &str, ep_id: i64, clip_id: i64) -> ClipKey {
        ClipKey {
            show: show.to_string(),
            ep_id,
            clip_id,
        }
    }

    #[test]
    fn clip_file_name_matches_dataset_convention() {
        assert_eq!(clip_file_name(&key("HeyStella", 73, 4)), "HeyStella_73_4.wav");
    }

    #[test]
    fn resolve_clip_probes_expected_layout() {
        let dir = tempdir().unwrap();
        let expected = dir.path().join("HeyStella/73/HeyStella_73_4.wav");
        std::fs::create_dir_all(expected.parent().unwrap()).unwrap();
        std::fs::write(&expected, b"").unwrap();

        assert_eq!(
            resolve_clip(dir.path(), &key("HeyStella", 73, 4)),
            Some(expected)
        );
        assert_eq!(resolve_clip(dir.path(), &key("HeyStella", 73, 5)), None);
    }

    #[test]
    fn resolve_episode_probes_expected_layout() {
        let dir = tempdir().unwrap();
        let expected = dir.path().join("HeyStella/73.wav");
        std::fs::create_dir_all(expected.parent().unwrap()).unwrap();
        std::fs::write(&expected, b"").unwrap();

        assert_eq!(
            resolve_episode(dir.path(), "HeyStella", 73),
            Some(expected)
        );
        assert_eq!(resolve_episode(dir.path(), "HeyStella", 74), None);
    }

    #[test]
    fn tree_index_finds_nested_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c/HeyStella_73_4.wav");
        std::fs::create_dir_all(nested.parent().unwrap()).unwrap();
        std::fs::write(&nested, b"").unwrap();

        let index = TreeIndex::build(dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(&key("HeyStella", 73, 4)), Some(nested));
    }

    #[test]
    fn tree_index_skips_unsupported_extensions() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("clip.wav"), b"").unwrap();

        let index = TreeIndex::build(dir.path()).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn duplicate_bare_names_keep_the_later_walk_entry() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("early/HeyStella_73_4.wav");
        let second = dir.path().join("late/HeyStella_73_4.wav");
        for path in [&first, &second] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"").unwrap();
        }

        let index = TreeIndex::build(dir.path()).unwrap();
        // Subdirectories are visited in name order, so `late` overwrites.
        assert_eq!(index.resolve(&key("HeyStella", 73, 4)), Some(second));
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = TreeIndex::build(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, WalkError::InvalidRoot { .. }));
    }
}
