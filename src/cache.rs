use std::future::Future;
use std::sync::{Arc, OnceLock};

use moka::future::Cache;
use tracing::debug;

use crate::binding::BindingModel;
use crate::error::{Result, TransformError};

/// Models kept by the process-wide cache
const GLOBAL_CAPACITY: u64 = 64;

/// In-memory cache of compiled binding models
///
/// Keyed by schema location plus a hash of the root document, so a changed schema at
/// the same location compiles afresh. `moka` makes concurrent requests for one key
/// wait for a single compilation (the key and value transforms of one pipeline
/// usually configure at the same moment).
pub struct BindingModelCache {
    cache: Cache<String, Arc<BindingModel>>,
}

static GLOBAL: OnceLock<BindingModelCache> = OnceLock::new();

impl BindingModelCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();
        Self { cache }
    }

    /// The cache shared by every transform instance of the process
    pub fn global() -> &'static BindingModelCache {
        GLOBAL.get_or_init(|| BindingModelCache::new(GLOBAL_CAPACITY))
    }

    /// Generate a cache key from a location and the bytes found there
    pub fn generate_key(location: &str, content: &[u8]) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        format!("{}#{:016x}", location, hasher.finish())
    }

    /// Get a compiled model, or compile it if missing.
    ///
    /// `compile` only runs for the first caller of a missing key.
    pub async fn get_or_compile<F, Fut>(&self, key: String, compile: F) -> Result<Arc<BindingModel>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<BindingModel>>>,
    {
        let mut compiled_here = false;
        let result = self
            .cache
            .try_get_with(key.clone(), async {
                compiled_here = true;
                compile().await
            })
            .await
            .map_err(unshare);
        if result.is_ok() && !compiled_here {
            debug!(key = %key, "binding model cache hit");
        }
        result
    }

    pub async fn get(&self, key: &str) -> Option<Arc<BindingModel>> {
        self.cache.get(key).await
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

/// Recover an owned error from the one moka shares between waiting callers
fn unshare(error: Arc<TransformError>) -> TransformError {
    Arc::try_unwrap(error).unwrap_or_else(|shared| match shared.as_ref() {
        TransformError::SchemaUnavailable { location, reason } => {
            TransformError::SchemaUnavailable {
                location: location.clone(),
                reason: reason.clone(),
            }
        }
        TransformError::SchemaCompilation { location, details } => {
            TransformError::compilation(location, details.clone())
        }
        other => TransformError::Cache(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_str;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:element name="a" type="xs:string"/>
    </xs:schema>"#;

    #[test]
    fn test_cache_key_generation() {
        let key1 = BindingModelCache::generate_key("a.xsd", b"<xs:schema/>");
        let key2 = BindingModelCache::generate_key("a.xsd", b"<xs:schema></xs:schema>");
        let key3 = BindingModelCache::generate_key("b.xsd", b"<xs:schema/>");

        assert_ne!(key1, key2);
        assert_ne!(key1, key3);
        assert!(key1.starts_with("a.xsd#"));
        assert_eq!(key1, BindingModelCache::generate_key("a.xsd", b"<xs:schema/>"));
    }

    #[tokio::test]
    async fn test_compiles_once_per_key() {
        let cache = Arc::new(BindingModelCache::new(10));
        let compilations = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let compilations = compilations.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_compile("a.xsd#1".to_string(), || async move {
                            compilations.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            compile_str("a.xsd", XSD).map(Arc::new)
                        })
                        .await
                })
            })
            .collect();

        let mut models = Vec::new();
        for task in tasks {
            models.push(task.await.unwrap().unwrap());
        }

        assert_eq!(compilations.load(Ordering::SeqCst), 1);
        assert!(models.iter().all(|model| Arc::ptr_eq(model, &models[0])));
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_compilation_is_not_cached() {
        let cache = BindingModelCache::new(10);

        let failed = cache
            .get_or_compile("bad.xsd#1".to_string(), || async {
                Err(TransformError::compilation("bad.xsd", "unresolved type reference Foo"))
            })
            .await;
        match failed {
            Err(TransformError::SchemaCompilation { location, details }) => {
                assert_eq!(location, "bad.xsd");
                assert!(details.contains("Foo"));
            }
            other => panic!("Expected SchemaCompilation, got {:?}", other.map(|_| ())),
        }
        assert!(cache.get("bad.xsd#1").await.is_none());

        let model = cache
            .get_or_compile("bad.xsd#1".to_string(), || async {
                compile_str("bad.xsd", XSD).map(Arc::new)
            })
            .await
            .unwrap();
        assert_eq!(model.element_count(), 1);

        cache.invalidate("bad.xsd#1").await;
        assert!(cache.get("bad.xsd#1").await.is_none());
    }
}
