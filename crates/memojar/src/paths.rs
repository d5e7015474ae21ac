//! Cache path resolution
//!
//! Layout: `<root>/<module file stem>/<function>/[<shard>/]<key>.<ext>`.
//! Everything here is pure; directories are created by the disk store when it
//! first writes.

use crate::encode::{content_hash_128, short_hash};
use std::path::{Path, PathBuf};

/// Directory name of the fallback cache next to the declaring source file
pub const FALLBACK_DIR_NAME: &str = ".memojar";

/// Identity of a wrapped function: the file that declares it and its name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId {
    file: String,
    name: String,
}

/// Build a [`FunctionId`] for `name` declared in the current source file
#[macro_export]
macro_rules! function_id {
    ($name:ident) => {
        $crate::FunctionId::new(file!(), stringify!($name))
    };
    ($name:expr) => {
        $crate::FunctionId::new(file!(), $name)
    };
}

impl FunctionId {
    /// Create an identity from a source file path and a function name
    #[must_use]
    pub fn new(file: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
        }
    }

    /// Function name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring source file
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// File stem of the declaring source file, e.g. `lib` for `src/lib.rs`
    #[must_use]
    pub fn module_stem(&self) -> String {
        Path::new(&self.file)
            .file_stem()
            .map_or_else(|| self.file.clone(), |s| s.to_string_lossy().into_owned())
    }

    /// Fallback cache root colocated with the declaring source file
    #[must_use]
    pub fn fallback_root(&self) -> PathBuf {
        Path::new(&self.file)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(FALLBACK_DIR_NAME)
    }
}

/// Pick the cache root: explicit override, then the context default, then the
/// fallback next to the declaring file.
#[must_use]
pub fn cache_root(explicit: Option<&Path>, default: Option<&Path>, id: &FunctionId) -> PathBuf {
    explicit
        .or(default)
        .map_or_else(|| id.fallback_root(), Path::to_path_buf)
}

/// Directory holding every disk entry of one function
#[must_use]
pub fn function_dir(root: &Path, id: &FunctionId) -> PathBuf {
    root.join(id.module_stem()).join(id.name())
}

/// Shard bucket of a key: its 128-bit hash modulo `shard_count`
#[must_use]
pub fn shard_index(key: &str, shard_count: u32) -> Option<u32> {
    if shard_count == 0 {
        return None;
    }
    let hash = u128::from_be_bytes(content_hash_128(key.as_bytes()));
    u32::try_from(hash % u128::from(shard_count)).ok()
}

/// Longest file name, in bytes, most file systems accept
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// File stem for a key stored with `extension`.
///
/// Keys that cannot be used as a single path component, or whose entry or
/// lock file name would exceed [`MAX_FILE_NAME_BYTES`], are replaced by their
/// 128-bit hash.
#[must_use]
pub fn file_stem(key: &str, extension: &str) -> String {
    const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];
    // `<stem>.<ext>.lock`
    let longest_name = key.len() + extension.len() + ".lock".len() + 1;
    if key == "."
        || key == ".."
        || key.contains(RESERVED)
        || longest_name > MAX_FILE_NAME_BYTES
    {
        short_hash(key, 32)
    } else {
        key.to_string()
    }
}

/// Full path of the disk entry for `key`
#[must_use]
pub fn entry_path(
    root: &Path,
    id: &FunctionId,
    key: &str,
    shard_count: u32,
    extension: &str,
) -> PathBuf {
    let mut path = function_dir(root, id);
    if let Some(shard) = shard_index(key, shard_count) {
        path.push(shard.to_string());
    }
    path.push(format!("{}.{extension}", file_stem(key, extension)));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> FunctionId {
        FunctionId::new("src/analysis.rs", "fit")
    }

    #[test]
    fn layout_without_shards() {
        let path = entry_path(Path::new("/cache"), &id(), "_a-2_", 0, "json");
        assert_eq!(path, PathBuf::from("/cache/analysis/fit/_a-2_.json"));
    }

    #[test]
    fn shard_segment_is_stable_and_bounded() {
        let p1 = entry_path(Path::new("/cache"), &id(), "_a-2_", 8, "json");
        let p2 = entry_path(Path::new("/cache"), &id(), "_a-2_", 8, "json");
        assert_eq!(p1, p2);
        let shard: u32 = p1
            .parent()
            .unwrap()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(shard < 8);
        assert_eq!(Some(shard), shard_index("_a-2_", 8));
    }

    #[test]
    fn shards_spread_keys() {
        let used: std::collections::HashSet<u32> = (0..200)
            .filter_map(|i| shard_index(&format!("_k-{i}_"), 4))
            .collect();
        assert_eq!(used.len(), 4);
    }

    #[test]
    fn root_precedence() {
        let explicit = PathBuf::from("/explicit");
        let default = PathBuf::from("/default");
        assert_eq!(
            cache_root(Some(&explicit), Some(&default), &id()),
            explicit
        );
        assert_eq!(cache_root(None, Some(&default), &id()), default);
        assert_eq!(
            cache_root(None, None, &id()),
            PathBuf::from("src").join(FALLBACK_DIR_NAME)
        );
    }

    #[test]
    fn unsafe_keys_are_hashed() {
        assert_eq!(file_stem("a/b_", "json").len(), 32);
        assert_eq!(file_stem("..", "json").len(), 32);
        assert_eq!(file_stem("plain_", "json"), "plain_");
    }

    #[test]
    fn multibyte_keys_are_bounded_in_bytes() {
        // 90 characters, 270 bytes
        let key = "日本語".repeat(30);
        let stem = file_stem(&key, "json");
        assert_eq!(stem.len(), 32);
        assert_eq!(stem, file_stem(&key, "json"));

        let path = entry_path(Path::new("/cache"), &id(), &key, 0, "json.zst");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.len() + ".lock".len() <= MAX_FILE_NAME_BYTES);
    }

    #[test]
    fn long_ascii_keys_keep_room_for_the_lock_suffix() {
        let fits = "k".repeat(MAX_FILE_NAME_BYTES - ".json.lock".len());
        assert_eq!(file_stem(&fits, "json"), fits);
        let too_long = format!("{fits}k");
        assert_eq!(file_stem(&too_long, "json").len(), 32);
    }

    #[test]
    fn function_id_macro_captures_file() {
        let id = crate::function_id!(fit);
        assert_eq!(id.name(), "fit");
        assert_eq!(id.module_stem(), "paths");
    }
}
