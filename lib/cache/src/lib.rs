use std::{collections::HashMap, hash::Hash};

use tokio::sync::RwLock;

/// A cache of clonable values behind a single `RwLock`, supporting the
/// double-checked locking pattern for fallible, possibly-async
/// construction of missing entries.
#[derive(Debug)]
pub struct CloneCache<K: PartialEq + Eq + Hash, T: Clone>(
  RwLock<HashMap<K, T>>,
);

impl<K: PartialEq + Eq + Hash, T: Clone> Default for CloneCache<K, T> {
  fn default() -> Self {
    Self(RwLock::new(HashMap::new()))
  }
}

impl<K: PartialEq + Eq + Hash + std::fmt::Debug + Clone, T: Clone>
  CloneCache<K, T>
{
  pub async fn get(&self, key: &K) -> Option<T> {
    self.0.read().await.get(key).cloned()
  }

  pub async fn get_values(&self) -> Vec<T> {
    let cache = self.0.read().await;
    cache.values().cloned().collect()
  }

  pub async fn insert<Key>(&self, key: Key, val: T) -> Option<T>
  where
    T: std::fmt::Debug,
    Key: Into<K> + std::fmt::Debug,
  {
    self.0.write().await.insert(key.into(), val)
  }

  pub async fn remove(&self, key: &K) -> Option<T> {
    self.0.write().await.remove(key)
  }

  /// Double-checked locking `get_or_insert`: an optimistic read under the
  /// shared lock, and only on a miss does it take the exclusive lock,
  /// recheck, and run `init` to build the missing entry. Guarantees at
  /// most one `init` call per key across concurrent callers.
  pub async fn get_or_try_init<F, Fut, E>(
    &self,
    key: &K,
    init: F,
  ) -> Result<T, E>
  where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
  {
    if let Some(found) = self.0.read().await.get(key).cloned() {
      return Ok(found);
    }
    let mut write = self.0.write().await;
    if let Some(found) = write.get(key).cloned() {
      return Ok(found);
    }
    let built = init().await?;
    write.insert(key.clone(), built.clone());
    Ok(built)
  }
}
