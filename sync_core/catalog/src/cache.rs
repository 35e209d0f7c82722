use crate::error::CatalogError;
use crate::fingerprint::{DiscoveryKey, SchemaFingerprint};
use crate::schema::Schema;
use chrono::{DateTime, Utc};
use common::config::components::discovery::DiscoveryCacheConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDiscovery {
    pub key: DiscoveryKey,
    pub schema: Schema,
    pub fingerprint: SchemaFingerprint,
    pub discovered_at: DateTime<Utc>,
}

/// internal flat state (easy to serde)
#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct State {
    entries: HashMap<String, CachedDiscovery>,
    // insertion order, oldest first
    order: VecDeque<String>,
}

/// Discovery results keyed by (actor, connector version, config hash).
///
/// Cloning shares the underlying store. The cache only answers "did we
/// already discover this"; what the caller does with a hit is the same as
/// with a fresh discovery.
#[derive(Clone)]
pub struct DiscoveryCache {
    inner: Arc<RwLock<State>>,
    max_entries: usize,
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(&DiscoveryCacheConfig::default())
    }
}

impl DiscoveryCache {
    pub fn new(config: &DiscoveryCacheConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(State::default())),
            max_entries: config.max_entries.max(1),
        }
    }

    /* ---------- optional durability ---------- */
    pub fn load_from(path: &str, config: &DiscoveryCacheConfig) -> Result<Self, CatalogError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => "{}".into(),
            Err(e) => return Err(e.into()),
        };
        let mut state: State = serde_json::from_str(&json)?;
        let State { entries, order } = &mut state;
        order.retain(|id| entries.contains_key(id));
        let mut untracked: Vec<String> = entries
            .keys()
            .filter(|id| !order.contains(id))
            .cloned()
            .collect();
        untracked.sort();
        order.extend(untracked);
        let cache = Self {
            inner: Arc::new(RwLock::new(state)),
            max_entries: config.max_entries.max(1),
        };
        cache.evict_overflow();
        Ok(cache)
    }

    pub fn flush_to(&self, path: &str) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(&*self.inner.read())?;
        let tmp = format!("{path}.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    pub fn get(&self, key: &DiscoveryKey) -> Option<CachedDiscovery> {
        self.inner.read().entries.get(&key.cache_id()).cloned()
    }

    pub fn put(&self, key: DiscoveryKey, schema: Schema) -> Result<CachedDiscovery, CatalogError> {
        let entry = CachedDiscovery {
            fingerprint: SchemaFingerprint::of_schema(&schema)?,
            key,
            schema,
            discovered_at: Utc::now(),
        };
        let id = entry.key.cache_id();
        {
            let mut g = self.inner.write();
            if g.entries.insert(id.clone(), entry.clone()).is_some() {
                g.order.retain(|existing| existing != &id);
            }
            g.order.push_back(id);
        }
        self.evict_overflow();
        Ok(entry)
    }

    /// Drop every entry of an actor, e.g. after its configuration changed.
    pub fn invalidate_actor(&self, actor_id: Uuid) -> usize {
        let mut g = self.inner.write();
        let before = g.entries.len();
        g.entries.retain(|_, e| e.key.actor_id != actor_id);
        let State { entries, order } = &mut *g;
        order.retain(|id| entries.contains_key(id));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_overflow(&self) {
        let mut g = self.inner.write();
        while g.entries.len() > self.max_entries {
            let Some(oldest) = g.order.pop_front() else {
                break;
            };
            g.entries.remove(&oldest);
            tracing::debug!(entry = %oldest, "evicted discovery cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DiscoveredCatalog, DiscoveredStream};
    use crate::sync_mode::SyncMode;
    use serde_json::json;

    fn schema(field: &str) -> Schema {
        Schema::try_from(DiscoveredCatalog {
            streams: vec![DiscoveredStream {
                name: "users".into(),
                namespace: Some("public".into()),
                json_schema: json!({"properties": {field: {"type": "string"}}}),
                supported_sync_modes: vec![SyncMode::FullRefresh],
                source_defined_cursor: false,
                default_cursor_field: None,
                source_defined_primary_key: None,
                is_file_based: false,
            }],
        })
        .expect("schema")
    }

    fn key(actor: Uuid, version: &str) -> DiscoveryKey {
        DiscoveryKey::new(actor, version, &json!({"host": "db"})).expect("key")
    }

    #[test]
    fn hit_returns_the_stored_schema() {
        let cache = DiscoveryCache::default();
        let actor = Uuid::new_v4();
        assert!(cache.get(&key(actor, "1.0.0")).is_none());

        let stored = cache.put(key(actor, "1.0.0"), schema("email")).expect("put");
        let hit = cache.get(&key(actor, "1.0.0")).expect("hit");
        assert_eq!(hit, stored);
        assert!(cache.get(&key(actor, "1.1.0")).is_none());
    }

    #[test]
    fn oldest_entry_is_evicted_past_capacity() {
        let cache = DiscoveryCache::new(&DiscoveryCacheConfig { max_entries: 2 });
        let actor = Uuid::new_v4();
        cache.put(key(actor, "1"), schema("a")).expect("put");
        cache.put(key(actor, "2"), schema("b")).expect("put");
        // refreshing "1" makes "2" the oldest
        cache.put(key(actor, "1"), schema("a")).expect("put");
        cache.put(key(actor, "3"), schema("c")).expect("put");

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(actor, "2")).is_none());
        assert!(cache.get(&key(actor, "1")).is_some());
        assert!(cache.get(&key(actor, "3")).is_some());
    }

    #[test]
    fn invalidate_actor_only_touches_that_actor() {
        let cache = DiscoveryCache::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        cache.put(key(a, "1"), schema("x")).expect("put");
        cache.put(key(a, "2"), schema("x")).expect("put");
        cache.put(key(b, "1"), schema("x")).expect("put");

        assert_eq!(cache.invalidate_actor(a), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(b, "1")).is_some());
    }

    #[test]
    fn flush_and_reload_preserves_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("discovery.json");
        let path = path.to_str().expect("utf8 path");

        let cache = DiscoveryCache::default();
        let actor = Uuid::new_v4();
        let stored = cache.put(key(actor, "1"), schema("email")).expect("put");
        cache.flush_to(path).expect("flush");

        let reloaded = DiscoveryCache::load_from(path, &DiscoveryCacheConfig::default())
            .expect("reload");
        assert_eq!(reloaded.get(&key(actor, "1")), Some(stored));
    }

    #[test]
    fn absent_or_partial_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = DiscoveryCacheConfig::default();

        let missing = dir.path().join("absent.json");
        let empty = DiscoveryCache::load_from(missing.to_str().expect("utf8 path"), &config)
            .expect("missing file");
        assert!(empty.is_empty());

        let partial = dir.path().join("partial.json");
        std::fs::write(&partial, r#"{"entries": {}}"#).expect("write");
        let empty = DiscoveryCache::load_from(partial.to_str().expect("utf8 path"), &config)
            .expect("partial file");
        assert!(empty.is_empty());

        // a fresh cache can be written where nothing existed before
        let actor = Uuid::new_v4();
        empty.put(key(actor, "1"), schema("email")).expect("put");
        empty.flush_to(missing.to_str().expect("utf8 path")).expect("flush");
        assert!(missing.exists());
    }
}
