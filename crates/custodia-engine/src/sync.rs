//! Per-key serialisation primitives and bounded store calls.

use std::{
  collections::{HashMap, HashSet},
  future::Future,
  hash::Hash,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{Error, Result};

/// One async mutex per key. Writers to the same key queue up; different keys
/// never contend beyond the brief map lookup. A key's slot is dropped once no
/// guard or waiter refers to it.
#[derive(Debug)]
pub(crate) struct KeyedMutex<K> {
  slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
  pub(crate) fn new() -> Self { Self { slots: Mutex::new(HashMap::new()) } }

  pub(crate) async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
    let slot = {
      let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(slots.entry(key.clone()).or_default())
    };
    KeyedGuard { owner: self, key, guard: Some(slot.lock_owned().await) }
  }

  #[cfg(test)]
  fn slot_count(&self) -> usize {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

/// Holds one key of a [`KeyedMutex`].
#[derive(Debug)]
pub(crate) struct KeyedGuard<'a, K: Eq + Hash + Clone> {
  owner: &'a KeyedMutex<K>,
  key:   K,
  guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<'_, K> {
  fn drop(&mut self) {
    // Release first so the map holds the only remaining reference when idle.
    drop(self.guard.take());
    let mut slots = self
      .owner
      .slots
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
      slots.remove(&self.key);
    }
  }
}

/// A set of keys with work in flight. Claiming a key that is already held
/// fails instead of waiting.
#[derive(Debug)]
pub(crate) struct InFlight<K> {
  active: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash + Clone> InFlight<K> {
  pub(crate) fn new() -> Self { Self { active: Mutex::new(HashSet::new()) } }

  pub(crate) fn try_claim(&self, key: K) -> Option<Claim<'_, K>> {
    let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
    if active.insert(key.clone()) {
      Some(Claim { owner: self, key })
    } else {
      None
    }
  }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub(crate) struct Claim<'a, K: Eq + Hash + Clone> {
  owner: &'a InFlight<K>,
  key:   K,
}

impl<K: Eq + Hash + Clone> Drop for Claim<'_, K> {
  fn drop(&mut self) {
    let mut active = self
      .owner
      .active
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    active.remove(&self.key);
  }
}

/// Run one record store call under `timeout`, boxing its error.
pub(crate) async fn bounded<T, E>(
  timeout: Duration,
  call: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
  E: std::error::Error + Send + Sync + 'static,
{
  match tokio::time::timeout(timeout, call).await {
    Ok(result) => result.map_err(|e| Error::Store(Box::new(e))),
    Err(_) => Err(Error::Timeout(timeout)),
  }
}
