use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{errors::Result, option::SubOptions, Store};

/// A mutation observed by [`Evented`], emitted before the write is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent<K, V> {
  Put { path: Vec<String>, key: K, value: V },
  Del { path: Vec<String>, key: K },
}

pub type Listener<K, V> = Arc<dyn Fn(&StoreEvent<K, V>) + Send + Sync>;

/// Decorator that reports every put and del to registered listeners. Stores
/// reached through [`Store::sub`] share the listeners of their parent.
pub struct Evented<S: Store> {
  inner: S,
  listeners: Arc<RwLock<Vec<Listener<S::Key, S::Value>>>>,
}

impl<S: Store> Evented<S> {
  pub fn new(inner: S) -> Self {
    Self {
      inner,
      listeners: Arc::new(RwLock::new(Vec::new())),
    }
  }

  pub fn inner(&self) -> &S {
    &self.inner
  }

  /// Wraps another store on the same listeners.
  pub fn with_inner(&self, inner: S) -> Self {
    Self {
      inner,
      listeners: self.listeners.clone(),
    }
  }

  pub fn on<F>(&self, listener: F)
  where
    F: Fn(&StoreEvent<S::Key, S::Value>) + Send + Sync + 'static,
  {
    self.listeners.write().push(Arc::new(listener));
  }

  pub fn listener_count(&self) -> usize {
    self.listeners.read().len()
  }

  fn emit<F>(&self, event: F)
  where
    F: FnOnce() -> StoreEvent<S::Key, S::Value>,
  {
    // snapshot so a listener may subscribe without deadlocking
    let listeners = self.listeners.read().clone();
    if listeners.is_empty() {
      return;
    }
    let event = event();
    for listener in listeners.iter() {
      listener(&event);
    }
  }
}

impl<S: Store> Clone for Evented<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      listeners: self.listeners.clone(),
    }
  }
}

#[async_trait]
impl<S> Store for Evented<S>
where
  S: Store,
  S::Key: Clone,
  S::Value: Clone,
{
  type Key = S::Key;
  type Value = S::Value;

  async fn put(&self, key: &Self::Key, value: &Self::Value) -> Result<()> {
    self.emit(|| StoreEvent::Put {
      path: self.inner.path().to_vec(),
      key: key.clone(),
      value: value.clone(),
    });
    self.inner.put(key, value).await
  }

  async fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>> {
    self.inner.get(key).await
  }

  async fn del(&self, key: &Self::Key) -> Result<()> {
    self.emit(|| StoreEvent::Del {
      path: self.inner.path().to_vec(),
      key: key.clone(),
    });
    self.inner.del(key).await
  }

  fn sub_with(&self, path: &[String], opts: SubOptions<Self::Key, Self::Value>) -> Self {
    self.with_inner(self.inner.sub_with(path, opts))
  }

  fn path(&self) -> &[String] {
    self.inner.path()
  }
}
