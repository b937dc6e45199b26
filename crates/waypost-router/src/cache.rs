//! On-disk route table cache.
//!
//! Each entry is a JSON file named by the SHA-256 of its key and grouped into
//! two-character prefix directories:
//!
//! ```text
//! <dir>/3f/3fa1...c9.json
//! ```
//!
//! Entries hold compiled routes (segments, matching expression, defaults and
//! parameter names), so loading does not re-parse any pattern. Writes go to a
//! temporary file in the target directory and are renamed into place, so a
//! reader sees either the old entry, the new one, or none.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use waypost_core::{WaypostError, WaypostResult};

use crate::config::RouteDefinition;
use crate::registry::RouteTable;

/// Bumped whenever the serialized route layout changes.
const CACHE_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheEnvelope {
    format: u32,
    key: String,
    table: RouteTable,
}

/// A directory of cached route tables.
#[derive(Debug, Clone)]
pub struct RouteCache {
    dir: PathBuf,
}

impl RouteCache {
    /// Creates a cache rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the cache root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(&hash[..2]).join(format!("{hash}.json"))
    }

    /// Returns `true` if an entry exists for `key`. The entry may still be
    /// unreadable.
    pub fn exists(&self, key: &str) -> bool {
        self.entry_path(key).is_file()
    }

    /// Writes `table` under `key`, atomically replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the entry cannot be written, or a
    /// serialization error if the table cannot be encoded.
    pub fn save(&self, key: &str, table: &RouteTable) -> WaypostResult<()> {
        let path = self.entry_path(key);
        let parent = path.parent().unwrap_or(&self.dir);
        std::fs::create_dir_all(parent)?;

        let envelope = CacheEnvelope {
            format: CACHE_FORMAT,
            key: key.to_string(),
            table: table.clone(),
        };
        let data = serde_json::to_vec(&envelope)
            .map_err(|e| WaypostError::SerializationError(e.to_string()))?;

        match write_atomic(parent, &path, &data) {
            // The prefix directory was removed by a concurrent `clear(None)`.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(parent)?;
                write_atomic(parent, &path, &data)?;
            }
            result => result?,
        }

        tracing::info!(key, routes = table.len(), path = %path.display(), "Cached route table");
        Ok(())
    }

    /// Reads the table cached under `key`.
    ///
    /// Missing, unreadable, corrupt and outdated entries are all misses.
    pub fn load(&self, key: &str) -> Option<RouteTable> {
        let path = self.entry_path(key);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key, "Route cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key, path = %path.display(), "Unreadable route cache entry: {e}");
                return None;
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_slice(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(key, path = %path.display(), "Corrupt route cache entry: {e}");
                return None;
            }
        };

        if envelope.format != CACHE_FORMAT || envelope.key != key {
            tracing::warn!(
                key,
                format = envelope.format,
                path = %path.display(),
                "Stale route cache entry"
            );
            return None;
        }

        tracing::info!(key, routes = envelope.table.len(), "Loaded route table from cache");
        Some(envelope.table)
    }

    /// Removes the entry for `key`, or every entry when `key` is `None`.
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing entry cannot be removed.
    pub fn clear(&self, key: Option<&str>) -> WaypostResult<usize> {
        match key {
            Some(key) => self.clear_one(key),
            None => self.clear_all(),
        }
    }

    fn clear_one(&self, key: &str) -> WaypostResult<usize> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            // The prefix directory stays; a concurrent save may be about to
            // create its temporary file there.
            Ok(()) => Ok(1),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(WaypostError::IoError(e)),
        }
    }

    fn clear_all(&self) -> WaypostResult<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(WaypostError::IoError(e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() && is_prefix_dir(&path) {
                removed += std::fs::read_dir(&path)?
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count();
                std::fs::remove_dir_all(&path)?;
            }
        }

        tracing::info!(removed, dir = %self.dir.display(), "Cleared route cache");
        Ok(removed)
    }
}

/// Writes `data` to a temporary file in `dir` and renames it onto `path`.
fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn is_prefix_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() == 2 && name.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Derives a cache key from the content of `definitions`. Any change to a
/// name, pattern, default or constraint, or to their order, gives a new key.
pub fn cache_key_for(definitions: &[RouteDefinition]) -> String {
    let mut hasher = Sha256::new();
    for definition in definitions {
        // Serializing plain strings and maps cannot fail.
        let encoded = serde_json::to_vec(definition).unwrap_or_default();
        hasher.update((encoded.len() as u64).to_le_bytes());
        hasher.update(&encoded);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::RouteOptions;

    fn sample_table() -> RouteTable {
        let mut table = RouteTable::new();
        table
            .register(
                Some("admin"),
                "admin(/<controller>(/<action>(/<id>)))",
                &RouteOptions::new().constraint("id", "[0-9]+"),
            )
            .unwrap();
        table
            .register(
                Some("default"),
                "(<controller>(/<action>(/<id>)))",
                &RouteOptions::new()
                    .default_value("controller", "welcome")
                    .default_value("action", "index"),
            )
            .unwrap();
        table
    }

    #[test]
    fn test_entry_path_layout() {
        let cache = RouteCache::new("/var/cache/routes");
        let path = cache.entry_path("routes");
        let file = path.file_name().unwrap().to_str().unwrap();
        let prefix = path.parent().unwrap().file_name().unwrap().to_str().unwrap();

        assert_eq!(file.len(), 64 + ".json".len());
        assert!(file.starts_with(prefix));
        assert_eq!(prefix.len(), 2);
        assert_eq!(path.parent().unwrap().parent().unwrap(), Path::new("/var/cache/routes"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        let table = sample_table();

        assert!(cache.load("routes").is_none());
        cache.save("routes", &table).unwrap();
        assert!(cache.exists("routes"));

        let loaded = cache.load("routes").unwrap();
        assert_eq!(loaded, table);
        assert_eq!(
            loaded.lookup("admin").unwrap().matching_expression(),
            table.lookup("admin").unwrap().matching_expression()
        );
    }

    #[test]
    fn test_save_replaces_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        cache.save("routes", &RouteTable::new()).unwrap();
        cache.save("routes", &sample_table()).unwrap();
        assert_eq!(cache.load("routes").unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        cache.save("routes", &sample_table()).unwrap();

        std::fs::write(cache.entry_path("routes"), b"{\"format\": 1, \"key\": ").unwrap();
        assert!(cache.load("routes").is_none());
    }

    #[test]
    fn test_outdated_format_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        let path = cache.entry_path("routes");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, br#"{"format": 0, "key": "routes", "table": {"routes": []}}"#)
            .unwrap();
        assert!(cache.load("routes").is_none());
    }

    #[test]
    fn test_tampered_route_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        let mut table = RouteTable::new();
        table.register(Some("a"), "<x>", &RouteOptions::new()).unwrap();
        cache.save("routes", &table).unwrap();

        let path = cache.entry_path("routes");
        let text = std::fs::read_to_string(&path).unwrap();
        let tampered = text.replace(r#""parameter_names":["x"]"#, r#""parameter_names":["y"]"#);
        assert_ne!(tampered, text);
        std::fs::write(&path, tampered).unwrap();
        assert!(cache.load("routes").is_none());
    }

    fn edit_entry(cache: &RouteCache, key: &str, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = cache.entry_path(key);
        let mut value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        edit(&mut value);
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_edited_expression_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        let mut table = RouteTable::new();
        table.register(Some("user"), "users/<x>", &RouteOptions::new()).unwrap();
        cache.save("routes", &table).unwrap();

        edit_entry(&cache, "routes", |value| {
            let route = &mut value["table"]["routes"][0]["route"];
            assert_eq!(route["matching_expression"], "^users/(?P<__p0>[^/]+)$");
            route["matching_expression"] = serde_json::json!("^(?P<__p0>.*)$");
        });
        assert!(cache.load("routes").is_none());
    }

    #[test]
    fn test_duplicate_parameter_names_are_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        let mut table = RouteTable::new();
        table.register(Some("pair"), "<a>/<b>", &RouteOptions::new()).unwrap();
        cache.save("routes", &table).unwrap();

        edit_entry(&cache, "routes", |value| {
            let route = &mut value["table"]["routes"][0]["route"];
            route["pattern"] = serde_json::json!("<a>/<a>");
            route["segments"][2]["name"] = serde_json::json!("a");
            route["parameter_names"] = serde_json::json!(["a", "a"]);
            route["matching_expression"] =
                serde_json::json!("^(?P<__p0>[^/]+)/(?P<__p1>[^/]+)$");
        });
        assert!(cache.load("routes").is_none());
    }

    #[test]
    fn test_clear_single_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        cache.save("one", &sample_table()).unwrap();
        cache.save("two", &sample_table()).unwrap();

        assert_eq!(cache.clear(Some("one")).unwrap(), 1);
        assert_eq!(cache.clear(Some("one")).unwrap(), 0);
        assert!(!cache.exists("one"));
        assert!(cache.exists("two"));
        assert!(cache.entry_path("one").parent().unwrap().is_dir());
    }

    #[test]
    fn test_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        for key in ["one", "two", "three"] {
            cache.save(key, &sample_table()).unwrap();
        }
        std::fs::write(dir.path().join("README"), "keep").unwrap();

        assert_eq!(cache.clear(None).unwrap(), 3);
        for key in ["one", "two", "three"] {
            assert!(cache.load(key).is_none());
        }
        assert!(dir.path().join("README").exists());
    }

    #[test]
    fn test_clear_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path().join("absent"));
        assert_eq!(cache.clear(None).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_saves_leave_whole_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        let table = sample_table();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        cache.save("routes", &table).unwrap();
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..50 {
                    if let Some(loaded) = cache.load("routes") {
                        assert_eq!(loaded, table);
                    }
                }
            });
        });

        assert_eq!(cache.load("routes").unwrap(), table);
        let leftovers = std::fs::read_dir(cache.entry_path("routes").parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_saves_race_single_key_clears() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path());
        let table = sample_table();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        cache.save("routes", &table).unwrap();
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..100 {
                    cache.clear(Some("routes")).unwrap();
                }
            });
        });

        cache.save("routes", &table).unwrap();
        assert_eq!(cache.load("routes").unwrap(), table);
    }

    #[test]
    fn test_cache_key_for_tracks_content() {
        let a = vec![RouteDefinition::new("(<controller>)").named("default")];
        let b = vec![RouteDefinition::new("(<controller>)")
            .named("default")
            .default_value("controller", "welcome")];

        assert_eq!(cache_key_for(&a), cache_key_for(&a.clone()));
        assert_ne!(cache_key_for(&a), cache_key_for(&b));
        assert_eq!(cache_key_for(&[]).len(), 64);
    }
}
