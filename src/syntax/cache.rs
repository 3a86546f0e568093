//! Compiled rule caching
//!
//! Two layers: `RuleCache` keeps compiled rule sets in memory for the
//! life of the compiler that owns it, and the artifact functions persist a
//! rule set as JSON next to the timestamp of the rule file it came from.
//! An artifact is only trusted while the rule file has not been modified
//! since; anything unreadable is treated as a miss.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rules::RuleSet;
use crate::error::{HighlightError, Result};

/// Bumped whenever the serialized `RuleSet` layout changes
pub const CACHE_VERSION: u32 = 1;

/// On-disk form of a compiled rule set
#[derive(Serialize, Deserialize)]
struct Artifact<R> {
    version: u32,
    source_modified_secs: u64,
    source_modified_nanos: u32,
    rules: R,
}

/// Split a file time into (seconds, nanoseconds) since the epoch
fn timestamp(time: SystemTime) -> (u64, u32) {
    let since = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    (since.as_secs(), since.subsec_nanos())
}

/// Serialize a rule set into artifact bytes
pub fn to_bytes(rules: &RuleSet, source_modified: SystemTime) -> serde_json::Result<Vec<u8>> {
    let (secs, nanos) = timestamp(source_modified);
    serde_json::to_vec(&Artifact {
        version: CACHE_VERSION,
        source_modified_secs: secs,
        source_modified_nanos: nanos,
        rules,
    })
}

/// Load a cached rule set
///
/// Returns `None` for a missing, unparseable, foreign or stale artifact.
/// A stale artifact is one recorded against a rule file older than
/// `source_modified`.
pub fn load(path: &Path, language_id: &str, source_modified: SystemTime) -> Option<RuleSet> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "cannot read rule cache");
            }
            return None;
        }
    };

    let artifact: Artifact<RuleSet> = match serde_json::from_slice(&bytes) {
        Ok(artifact) => artifact,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable rule cache, recompiling");
            return None;
        }
    };

    if artifact.version != CACHE_VERSION || artifact.rules.language_id != language_id {
        debug!(path = %path.display(), "rule cache belongs to another version or language");
        return None;
    }

    let recorded = (artifact.source_modified_secs, artifact.source_modified_nanos);
    if recorded < timestamp(source_modified) {
        debug!(path = %path.display(), "rule cache is stale");
        return None;
    }

    Some(artifact.rules)
}

/// Persist a rule set
///
/// The artifact is written to a temporary sibling and renamed into place,
/// so concurrent readers see either the old or the new file.
pub fn store(path: &Path, rules: &RuleSet, source_modified: SystemTime) -> Result<()> {
    let cache_error = |path: &Path, source: io::Error| HighlightError::CacheWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| cache_error(dir, e))?;
    }

    let bytes = to_bytes(rules, source_modified).map_err(|e| cache_error(path, e.into()))?;

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(cache_error(path, e));
    }

    debug!(path = %path.display(), "wrote rule cache");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", process::id()));
    path.with_file_name(name)
}

struct CachedRules {
    source_modified: SystemTime,
    rules: Arc<RuleSet>,
}

/// In-memory cache of compiled rule sets, keyed by language id
#[derive(Default)]
pub struct RuleCache {
    entries: HashMap<String, CachedRules>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule set compiled from a rule file with exactly this timestamp
    pub fn get(&self, language_id: &str, source_modified: SystemTime) -> Option<Arc<RuleSet>> {
        self.entries
            .get(language_id)
            .filter(|entry| entry.source_modified == source_modified)
            .map(|entry| Arc::clone(&entry.rules))
    }

    pub fn insert(&mut self, language_id: &str, source_modified: SystemTime, rules: Arc<RuleSet>) {
        self.entries.insert(
            language_id.to_string(),
            CachedRules {
                source_modified,
                rules,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample_rules() -> RuleSet {
        let mut rules = RuleSet::new("demo");
        rules.add_keyword("reserved_words", "if");
        rules.prefixes.insert('$', "variable".to_string());
        rules.quotes.insert('"');
        rules
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("demo.json");
        let modified = UNIX_EPOCH + Duration::from_secs(1_000);
        let rules = sample_rules();

        store(&path, &rules, modified).expect("store should succeed");
        assert_eq!(load(&path, "demo", modified), Some(rules));
    }

    #[test]
    fn test_stale_artifact_is_a_miss() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("demo.json");
        let modified = UNIX_EPOCH + Duration::from_secs(1_000);

        store(&path, &sample_rules(), modified).expect("store should succeed");
        assert!(load(&path, "demo", modified + Duration::from_secs(1)).is_none());
        assert!(load(&path, "demo", modified - Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_foreign_or_truncated_artifact_is_a_miss() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("demo.json");
        let modified = UNIX_EPOCH + Duration::from_secs(1_000);

        store(&path, &sample_rules(), modified).expect("store should succeed");
        assert!(load(&path, "other", modified).is_none());

        fs::write(&path, "{\"version\":1,\"source_mod").unwrap();
        assert!(load(&path, "demo", modified).is_none());
        assert!(load(&dir.path().join("missing.json"), "demo", modified).is_none());
    }

    #[test]
    fn test_store_into_unwritable_location() {
        let dir = tempdir().expect("Failed to create temp dir");
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let err = store(&blocker.join("demo.json"), &sample_rules(), SystemTime::now())
            .expect_err("store should fail");
        assert!(matches!(err, HighlightError::CacheWrite { .. }));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let modified = UNIX_EPOCH + Duration::from_secs(42);
        let a = to_bytes(&sample_rules(), modified).unwrap();
        let b = to_bytes(&sample_rules(), modified).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_memory_cache_matches_timestamp() {
        let mut cache = RuleCache::new();
        let modified = UNIX_EPOCH + Duration::from_secs(7);
        cache.insert("demo", modified, Arc::new(sample_rules()));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("demo", modified).is_some());
        assert!(cache.get("demo", modified + Duration::from_secs(1)).is_none());
        assert!(cache.get("other", modified).is_none());

        cache.clear();
        assert!(cache.is_empty());
    }
}
