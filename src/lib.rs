//! Plain-KV: an embeddable, in-process ordered key-value store.
//!
//! The store is a tree of namespaces. Every namespace node owns a sorted
//! index of its own entries and lazily creates child namespaces the first
//! time a path segment is addressed. Keys and values pass through pluggable
//! codecs, so the sorted index only ever holds bytes.
//!
//! Groups of writes run through a batch executor which captures the prior
//! state of every touched key, applies all writes concurrently and, if any
//! write fails, replays the captured state as a best-effort rollback. This
//! is compensation, not isolation: nothing stops another writer from
//! touching the same keys between capture and apply.
//!
//! # Features
//!
//! * Sorted index with O(1) point access and bounded, reversible range scans
//! * Addressable namespace tree with per-node codecs
//! * Flattened listings across a whole subtree
//! * Batches with compensating rollback
//! * Mutation events through a decorator store
//!
//! # Basic Usage
//!
//! ```
//! use plain_kv::{db::MemoryDb, option::Options};
//!
//! # futures::executor::block_on(async {
//! let db: MemoryDb<String, String> = MemoryDb::open(Options::default());
//!
//! db.put(&"hello".to_string(), &"world".to_string()).await.expect("failed to put");
//! let value = db.get(&"hello".to_string()).await.expect("failed to get");
//! assert_eq!(value.as_deref(), Some("world"));
//!
//! let users = db.sub(["users"]);
//! users.put(&"alice".to_string(), &"admin".to_string()).await.expect("failed to put");
//!
//! db.batch()
//!   .put("a".to_string(), "1".to_string())
//!   .del("hello".to_string())
//!   .exec()
//!   .await
//!   .expect("failed to run batch");
//! # });
//! ```

mod index;

pub mod batch;
pub mod codec;
pub mod db;
pub mod errors;
pub mod event;
pub mod option;
pub mod tree;
pub mod util;

use async_trait::async_trait;

use crate::{errors::Result, option::SubOptions};

pub use crate::index::{default_comparator, Comparator, Iter as SortedIter, Sorted};

/// The put/get/del/sub contract shared by every store layer. Anything that
/// implements it can be the target of a batch or be wrapped by a decorator.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
  type Key: Send + Sync;

  type Value: Send + Sync;

  async fn put(&self, key: &Self::Key, value: &Self::Value) -> Result<()>;

  /// `None` when the key has no entry.
  async fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>>;

  /// Deleting an absent key succeeds.
  async fn del(&self, key: &Self::Key) -> Result<()>;

  /// Resolves a descendant namespace, creating missing nodes.
  fn sub(&self, path: &[String]) -> Self {
    self.sub_with(path, SubOptions::default())
  }

  /// Like `sub`, with codec overrides for the nodes this call creates.
  fn sub_with(&self, path: &[String], opts: SubOptions<Self::Key, Self::Value>) -> Self;

  /// Segments from the root to this store.
  fn path(&self) -> &[String];
}
