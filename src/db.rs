use std::fmt::Display;

use async_trait::async_trait;
use log::debug;

use crate::{
  batch::{Batch, BatchExecutor, Operation},
  errors::Result,
  event::{Evented, StoreEvent},
  option::{IteratorOptions, Options, SubOptions},
  tree::{Entry, Tree, TreeIter},
  Store,
};

/// In-memory store handle: a namespace tree that reports its mutations and
/// runs batches. Handles are cheap to clone and every clone addresses the
/// same node. There is no shared default instance; callers keep the handle.
pub struct MemoryDb<K, V>
where
  K: Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  store: Evented<Tree<K, V>>,
}

impl<K, V> MemoryDb<K, V>
where
  K: Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn open(options: Options<K, V>) -> Self {
    debug!(
      "opening memory db, key codec {}, value codec {}, separator {:?}",
      options.key_codec.name(),
      options.value_codec.name(),
      options.separator
    );
    Self {
      store: Evented::new(Tree::new(options)),
    }
  }

  pub fn tree(&self) -> &Tree<K, V> {
    self.store.inner()
  }

  pub fn path(&self) -> &[String] {
    self.tree().path()
  }

  pub async fn put(&self, key: &K, value: &V) -> Result<()> {
    self.store.put(key, value).await
  }

  pub async fn get(&self, key: &K) -> Result<Option<V>> {
    self.store.get(key).await
  }

  pub async fn del(&self, key: &K) -> Result<()> {
    self.store.del(key).await
  }

  pub fn sub<I, S>(&self, path: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.sub_with(path, SubOptions::default())
  }

  pub fn sub_with<I, S>(&self, path: I, opts: SubOptions<K, V>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let tree = self.tree().sub_with(path, opts);
    Self {
      store: self.store.with_inner(tree),
    }
  }

  /// Registers a listener for puts and dels made through this handle or
  /// any handle derived from it with `sub`.
  pub fn on<F>(&self, listener: F)
  where
    F: Fn(&StoreEvent<K, V>) + Send + Sync + 'static,
  {
    self.store.on(listener);
  }

  pub fn iter(&self, opts: IteratorOptions<K>) -> TreeIter<K, V> {
    self.tree().iter(opts)
  }

  pub fn collect(&self, opts: IteratorOptions<K>) -> Result<Vec<Entry<K, V>>> {
    self.iter(opts).collect()
  }

  pub fn keys(&self, opts: IteratorOptions<K>) -> Result<Vec<K>> {
    self.iter(opts).map(|e| e.map(|e| e.key)).collect()
  }

  pub fn values(&self, opts: IteratorOptions<K>) -> Result<Vec<V>> {
    self.iter(opts).map(|e| e.map(|e| e.value)).collect()
  }

  /// Listing with string keys. With `opts.all` descendant keys are
  /// flattened; otherwise every key is rendered as is.
  pub fn flatten(&self, opts: IteratorOptions<K>) -> Result<Vec<(String, V)>>
  where
    K: Display,
  {
    let separator = opts.separator.unwrap_or(self.tree().separator());
    let all = opts.all;
    self
      .iter(opts)
      .map(|e| {
        e.map(|e| {
          if all {
            (e.flat_key(separator), e.value)
          } else {
            (e.key.to_string(), e.value)
          }
        })
      })
      .collect()
  }

  /// Every entry of this node and its descendants, flattened.
  pub fn list_all(&self) -> Result<Vec<(String, V)>>
  where
    K: Display,
  {
    self.flatten(IteratorOptions {
      all: true,
      ..Default::default()
    })
  }

  pub fn batch(&self) -> Batch<Self> {
    Batch::new(self.clone())
  }

  pub async fn execute(&self, ops: &[Operation<K, V>]) -> Result<()> {
    BatchExecutor::run(self.clone(), ops).await
  }
}

impl<K, V> Clone for MemoryDb<K, V>
where
  K: Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
    }
  }
}

#[async_trait]
impl<K, V> Store for MemoryDb<K, V>
where
  K: Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  type Key = K;
  type Value = V;

  async fn put(&self, key: &K, value: &V) -> Result<()> {
    MemoryDb::put(self, key, value).await
  }

  async fn get(&self, key: &K) -> Result<Option<V>> {
    MemoryDb::get(self, key).await
  }

  async fn del(&self, key: &K) -> Result<()> {
    MemoryDb::del(self, key).await
  }

  fn sub_with(&self, path: &[String], opts: SubOptions<K, V>) -> Self {
    MemoryDb::sub_with(self, path, opts)
  }

  fn path(&self) -> &[String] {
    MemoryDb::path(self)
  }
}
