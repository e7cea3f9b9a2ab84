//! Caching of per-revision source analysis.
//!
//! One trait, implemented twice: an in-memory tier for the life of a process
//! and a SQLite-backed tier that survives between runs. [`TieredCache`]
//! composes any two implementations, checking the fast tier first and
//! hydrating it on a slow-tier hit.
//!
//! All keys are revision-scoped, which is what makes caching sound: an
//! analyzer is deterministic per revision, so `(revision, analyzer)` fully
//! determines its output.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context as _;
use rusqlite::Connection;
use tracing::warn;

use crate::core::analyzer::AnalyzerInfo;
use crate::core::encode;
use crate::core::lock::Lock;
use crate::core::manifest::Manifest;
use crate::core::pkgtree::PackageTree;
use crate::core::version::{Revision, Version};
use crate::util::errors::DepsolveResult;

/// Stable key for an unpaired label. Bare revisions have no label and are
/// never keys in the version map.
fn label_key(v: &Version) -> Option<String> {
    match v {
        Version::Semver { sv, .. } => Some(format!("s:{sv}")),
        Version::Tag { name, .. } => Some(format!("t:{name}")),
        Version::Branch { name, .. } => Some(format!("b:{name}")),
        Version::Revision(_) => None,
    }
}

/// A cache of source analysis results, shared between bridge calls and
/// safe for concurrent use.
pub trait SourceCache: Send + Sync {
    fn set_manifest_and_lock(
        &self,
        rev: &Revision,
        info: &AnalyzerInfo,
        manifest: &Manifest,
        lock: &Lock,
    ) -> DepsolveResult<()>;
    fn get_manifest_and_lock(&self, rev: &Revision, info: &AnalyzerInfo)
    -> Option<(Manifest, Lock)>;

    fn set_package_tree(&self, rev: &Revision, tree: &PackageTree) -> DepsolveResult<()>;
    fn get_package_tree(&self, rev: &Revision) -> Option<PackageTree>;

    /// Records that an unpaired label currently resolves to the version's
    /// paired revision. Versions without a revision are ignored.
    fn set_version_pairing(&self, v: &Version) -> DepsolveResult<()>;
    fn revision_for(&self, unpaired: &Version) -> Option<Revision>;

    fn mark_revision_exists(&self, rev: &Revision);
    fn revision_exists(&self, rev: &Revision) -> bool;

    /// Atomically empties the cache and stamps it with the clearing client's
    /// version, so a later process can tell the cache was emptied rather
    /// than never populated.
    fn clear(&self) -> DepsolveResult<()>;
}

#[derive(Default)]
struct MemoryInner {
    metadata: HashMap<(String, String), (Manifest, Lock)>,
    trees: HashMap<String, PackageTree>,
    versions: HashMap<String, Revision>,
    revisions: HashSet<String>,
}

/// The in-process tier.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<MemoryInner>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }
}

impl SourceCache for MemoryCache {
    fn set_manifest_and_lock(
        &self,
        rev: &Revision,
        info: &AnalyzerInfo,
        manifest: &Manifest,
        lock: &Lock,
    ) -> DepsolveResult<()> {
        self.inner.lock().unwrap().metadata.insert(
            (rev.to_string(), info.to_string()),
            (manifest.clone(), lock.clone()),
        );
        Ok(())
    }

    fn get_manifest_and_lock(
        &self,
        rev: &Revision,
        info: &AnalyzerInfo,
    ) -> Option<(Manifest, Lock)> {
        self.inner
            .lock()
            .unwrap()
            .metadata
            .get(&(rev.to_string(), info.to_string()))
            .cloned()
    }

    fn set_package_tree(&self, rev: &Revision, tree: &PackageTree) -> DepsolveResult<()> {
        self.inner
            .lock()
            .unwrap()
            .trees
            .insert(rev.to_string(), tree.clone());
        Ok(())
    }

    fn get_package_tree(&self, rev: &Revision) -> Option<PackageTree> {
        self.inner.lock().unwrap().trees.get(rev.as_str()).cloned()
    }

    fn set_version_pairing(&self, v: &Version) -> DepsolveResult<()> {
        if let (Some(key), Some(rev)) = (label_key(v), v.revision()) {
            self.inner.lock().unwrap().versions.insert(key, rev.clone());
        }
        Ok(())
    }

    fn revision_for(&self, unpaired: &Version) -> Option<Revision> {
        let key = label_key(unpaired)?;
        self.inner.lock().unwrap().versions.get(&key).cloned()
    }

    fn mark_revision_exists(&self, rev: &Revision) {
        self.inner.lock().unwrap().revisions.insert(rev.to_string());
    }

    fn revision_exists(&self, rev: &Revision) -> bool {
        self.inner.lock().unwrap().revisions.contains(rev.as_str())
    }

    fn clear(&self) -> DepsolveResult<()> {
        *self.inner.lock().unwrap() = MemoryInner::default();
        Ok(())
    }
}

/// The persistent tier, one SQLite database per cache directory.
pub struct DiskCache {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
     CREATE TABLE IF NOT EXISTS metadata (
         rev TEXT NOT NULL, analyzer TEXT NOT NULL,
         manifest TEXT NOT NULL, lock TEXT NOT NULL,
         PRIMARY KEY (rev, analyzer));
     CREATE TABLE IF NOT EXISTS trees (rev TEXT PRIMARY KEY, tree TEXT NOT NULL);
     CREATE TABLE IF NOT EXISTS versions (label TEXT PRIMARY KEY, rev TEXT NOT NULL);
     CREATE TABLE IF NOT EXISTS revisions (rev TEXT PRIMARY KEY);";

impl DiskCache {
    fn from_conn(conn: Connection) -> DepsolveResult<DiskCache> {
        conn.execute_batch(SCHEMA)?;
        Ok(DiskCache {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &Path) -> DepsolveResult<DiskCache> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open source cache at {}", path.display()))?;
        DiskCache::from_conn(conn)
    }

    pub fn open_in_memory() -> DepsolveResult<DiskCache> {
        DiskCache::from_conn(Connection::open_in_memory()?)
    }

    /// The version of the client that last cleared this cache, if any.
    pub fn cleared_by(&self) -> Option<String> {
        self.conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT value FROM meta WHERE key = 'cleared-by'",
                [],
                |row| row.get(0),
            )
            .ok()
    }
}

impl SourceCache for DiskCache {
    fn set_manifest_and_lock(
        &self,
        rev: &Revision,
        info: &AnalyzerInfo,
        manifest: &Manifest,
        lock: &Lock,
    ) -> DepsolveResult<()> {
        let manifest_toml = encode::manifest_to_toml_string(manifest)?;
        let lock_toml = encode::lock_to_toml_string(lock)?;
        self.conn.lock().unwrap().execute(
            "INSERT OR REPLACE INTO metadata (rev, analyzer, manifest, lock) VALUES (?1, ?2, ?3, ?4)",
            (rev.as_str(), info.to_string(), manifest_toml, lock_toml),
        )?;
        Ok(())
    }

    fn get_manifest_and_lock(
        &self,
        rev: &Revision,
        info: &AnalyzerInfo,
    ) -> Option<(Manifest, Lock)> {
        let row: Result<(String, String), _> = self.conn.lock().unwrap().query_row(
            "SELECT manifest, lock FROM metadata WHERE rev = ?1 AND analyzer = ?2",
            (rev.as_str(), info.to_string()),
            |row| Ok((row.get(0)?, row.get(1)?)),
        );
        let (manifest_toml, lock_toml) = row.ok()?;
        match (
            encode::manifest_from_toml_str(&manifest_toml),
            encode::lock_from_toml_str(&lock_toml),
        ) {
            (Ok(m), Ok(l)) => Some((m, l)),
            _ => {
                warn!("discarding undecodable cache row for {rev}");
                None
            }
        }
    }

    fn set_package_tree(&self, rev: &Revision, tree: &PackageTree) -> DepsolveResult<()> {
        let json = serde_json::to_string(tree)?;
        self.conn.lock().unwrap().execute(
            "INSERT OR REPLACE INTO trees (rev, tree) VALUES (?1, ?2)",
            (rev.as_str(), json),
        )?;
        Ok(())
    }

    fn get_package_tree(&self, rev: &Revision) -> Option<PackageTree> {
        let json: Result<String, _> = self.conn.lock().unwrap().query_row(
            "SELECT tree FROM trees WHERE rev = ?1",
            [rev.as_str()],
            |row| row.get(0),
        );
        serde_json::from_str(&json.ok()?).ok()
    }

    fn set_version_pairing(&self, v: &Version) -> DepsolveResult<()> {
        if let (Some(key), Some(rev)) = (label_key(v), v.revision()) {
            self.conn.lock().unwrap().execute(
                "INSERT OR REPLACE INTO versions (label, rev) VALUES (?1, ?2)",
                (key, rev.as_str()),
            )?;
        }
        Ok(())
    }

    fn revision_for(&self, unpaired: &Version) -> Option<Revision> {
        let key = label_key(unpaired)?;
        let rev: Result<String, _> = self.conn.lock().unwrap().query_row(
            "SELECT rev FROM versions WHERE label = ?1",
            [key],
            |row| row.get(0),
        );
        rev.ok().map(Revision::new)
    }

    fn mark_revision_exists(&self, rev: &Revision) {
        let _ = self.conn.lock().unwrap().execute(
            "INSERT OR IGNORE INTO revisions (rev) VALUES (?1)",
            [rev.as_str()],
        );
    }

    fn revision_exists(&self, rev: &Revision) -> bool {
        self.conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT 1 FROM revisions WHERE rev = ?1",
                [rev.as_str()],
                |_| Ok(()),
            )
            .is_ok()
    }

    fn clear(&self) -> DepsolveResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "BEGIN;
             DELETE FROM metadata; DELETE FROM trees;
             DELETE FROM versions; DELETE FROM revisions;
             COMMIT;",
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('cleared-by', ?1)",
            [env!("CARGO_PKG_VERSION")],
        )?;
        Ok(())
    }
}

/// Composes a fast tier over a slow one. Reads hit the fast tier first and
/// hydrate it from the slow tier on a miss; writes land in both.
pub struct TieredCache<F, S> {
    fast: F,
    slow: S,
}

impl<F: SourceCache, S: SourceCache> TieredCache<F, S> {
    pub fn new(fast: F, slow: S) -> TieredCache<F, S> {
        TieredCache { fast, slow }
    }
}

impl<F: SourceCache, S: SourceCache> SourceCache for TieredCache<F, S> {
    fn set_manifest_and_lock(
        &self,
        rev: &Revision,
        info: &AnalyzerInfo,
        manifest: &Manifest,
        lock: &Lock,
    ) -> DepsolveResult<()> {
        self.fast.set_manifest_and_lock(rev, info, manifest, lock)?;
        self.slow.set_manifest_and_lock(rev, info, manifest, lock)
    }

    fn get_manifest_and_lock(
        &self,
        rev: &Revision,
        info: &AnalyzerInfo,
    ) -> Option<(Manifest, Lock)> {
        if let Some(hit) = self.fast.get_manifest_and_lock(rev, info) {
            return Some(hit);
        }
        let (m, l) = self.slow.get_manifest_and_lock(rev, info)?;
        if let Err(e) = self.fast.set_manifest_and_lock(rev, info, &m, &l) {
            warn!("failed to hydrate fast cache tier: {e}");
        }
        Some((m, l))
    }

    fn set_package_tree(&self, rev: &Revision, tree: &PackageTree) -> DepsolveResult<()> {
        self.fast.set_package_tree(rev, tree)?;
        self.slow.set_package_tree(rev, tree)
    }

    fn get_package_tree(&self, rev: &Revision) -> Option<PackageTree> {
        if let Some(hit) = self.fast.get_package_tree(rev) {
            return Some(hit);
        }
        let tree = self.slow.get_package_tree(rev)?;
        if let Err(e) = self.fast.set_package_tree(rev, &tree) {
            warn!("failed to hydrate fast cache tier: {e}");
        }
        Some(tree)
    }

    fn set_version_pairing(&self, v: &Version) -> DepsolveResult<()> {
        self.fast.set_version_pairing(v)?;
        self.slow.set_version_pairing(v)
    }

    fn revision_for(&self, unpaired: &Version) -> Option<Revision> {
        self.fast
            .revision_for(unpaired)
            .or_else(|| self.slow.revision_for(unpaired))
    }

    fn mark_revision_exists(&self, rev: &Revision) {
        self.fast.mark_revision_exists(rev);
        self.slow.mark_revision_exists(rev);
    }

    fn revision_exists(&self, rev: &Revision) -> bool {
        self.fast.revision_exists(rev) || self.slow.revision_exists(rev)
    }

    fn clear(&self) -> DepsolveResult<()> {
        self.fast.clear()?;
        self.slow.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::ProjectIdentifier;

    fn info() -> AnalyzerInfo {
        AnalyzerInfo {
            name: "depsolve".into(),
            version: 1,
        }
    }

    fn sample_metadata() -> (Manifest, Lock) {
        let mut m = Manifest::new();
        m.required.insert("github.com/gen/tool".to_string());
        let mut l = Lock::new();
        l.upsert_project(crate::core::lock::LockedProject {
            id: ProjectIdentifier::plain("github.com/dep/one"),
            version: Version::from_tag("v1.0.0").pair(Revision::new("aaaa")),
            packages: ["github.com/dep/one".to_string()].into(),
        });
        (m, l)
    }

    fn exercise(cache: &dyn SourceCache) {
        let rev = Revision::new("aaaa");
        let (m, l) = sample_metadata();

        assert!(cache.get_manifest_and_lock(&rev, &info()).is_none());
        cache.set_manifest_and_lock(&rev, &info(), &m, &l).unwrap();
        let (m2, l2) = cache.get_manifest_and_lock(&rev, &info()).unwrap();
        assert_eq!(m, m2);
        assert_eq!(l, l2);

        let paired = Version::from_tag("v1.0.0").pair(rev.clone());
        cache.set_version_pairing(&paired).unwrap();
        assert_eq!(
            cache.revision_for(&Version::from_tag("v1.0.0")),
            Some(rev.clone())
        );

        assert!(!cache.revision_exists(&rev));
        cache.mark_revision_exists(&rev);
        assert!(cache.revision_exists(&rev));

        cache.clear().unwrap();
        assert!(cache.get_manifest_and_lock(&rev, &info()).is_none());
        assert!(!cache.revision_exists(&rev));
    }

    #[test]
    fn memory_cache_round_trips() {
        exercise(&MemoryCache::new());
    }

    #[test]
    fn disk_cache_round_trips() {
        exercise(&DiskCache::open_in_memory().unwrap());
    }

    #[test]
    fn disk_cache_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.db");
        let rev = Revision::new("aaaa");
        let (m, l) = sample_metadata();
        {
            let cache = DiskCache::open(&path).unwrap();
            cache.set_manifest_and_lock(&rev, &info(), &m, &l).unwrap();
        }
        let cache = DiskCache::open(&path).unwrap();
        assert!(cache.get_manifest_and_lock(&rev, &info()).is_some());
        assert!(cache.cleared_by().is_none());
        cache.clear().unwrap();
        assert_eq!(cache.cleared_by().as_deref(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn tiered_cache_hydrates_the_fast_tier() {
        let slow = MemoryCache::new();
        let rev = Revision::new("aaaa");
        let (m, l) = sample_metadata();
        slow.set_manifest_and_lock(&rev, &info(), &m, &l).unwrap();

        let tiered = TieredCache::new(MemoryCache::new(), slow);
        assert!(tiered.get_manifest_and_lock(&rev, &info()).is_some());
        // A second read is served by the fast tier even if the slow tier
        // goes away logically; verify by clearing only the slow tier.
        tiered.slow.clear().unwrap();
        assert!(tiered.get_manifest_and_lock(&rev, &info()).is_some());
    }
}
