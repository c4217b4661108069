//! Batched writes with compensating rollback.
//!
//! [`BatchExecutor`] reads the current value of every key a batch touches,
//! derives the inverse operations, then applies the whole batch at once.
//! If any write fails the inverse operations are applied as a best-effort
//! undo and the original error is returned.
//!
//! The executor gives no isolation. Prior values are captured before any
//! write is issued and are not re-checked, so a writer outside the batch that
//! changes a key between capture and apply makes the undo for that key
//! stale. Writes inside one batch run concurrently without ordering; two
//! writes to the same key race and the last one to complete wins.

use derive_more::Display;
use futures::future::join_all;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::{errors::Result, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
  #[display("put")]
  Put,

  #[display("del")]
  Del,

  /// Any other type string. Applied as a no-op and never undone.
  #[serde(other)]
  #[display("unknown")]
  Unknown,
}

/// A single write. `path` selects the target namespace relative to the
/// store the executor is bound to; `None` targets that store itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation<K, V> {
  #[serde(rename = "type")]
  pub op_type: OpType,

  pub key: K,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub value: Option<V>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<Vec<String>>,
}

impl<K, V> Operation<K, V> {
  pub fn put(key: K, value: V) -> Self {
    Self {
      op_type: OpType::Put,
      key,
      value: Some(value),
      path: None,
    }
  }

  pub fn del(key: K) -> Self {
    Self {
      op_type: OpType::Del,
      key,
      value: None,
      path: None,
    }
  }

  pub fn at<I, S>(mut self, path: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.path = Some(path.into_iter().map(Into::into).collect());
    self
  }
}

pub struct BatchExecutor<S> {
  store: S,
  performing_undo: bool,
}

impl<S> BatchExecutor<S>
where
  S: Store,
  S::Key: Clone,
  S::Value: Clone,
{
  pub fn new(store: S) -> Self {
    Self {
      store,
      performing_undo: false,
    }
  }

  fn for_undo(store: S) -> Self {
    Self {
      store,
      performing_undo: true,
    }
  }

  pub async fn run(store: S, ops: &[Operation<S::Key, S::Value>]) -> Result<()> {
    Self::new(store).execute(ops).await
  }

  pub fn performing_undo(&self) -> bool {
    self.performing_undo
  }

  /// Applies `ops` together. On failure the captured prior state is
  /// restored as far as possible and the first failing operation's error is
  /// returned; errors raised while restoring are logged and dropped.
  pub async fn execute(&self, ops: &[Operation<S::Key, S::Value>]) -> Result<()> {
    if self.performing_undo {
      return self.apply_all(ops).await;
    }

    let undo_ops = self.undo_ops(ops).await?;
    let Err(err) = self.apply_all(ops).await else {
      return Ok(());
    };

    warn!(
      "batch of {} operations failed: {err}, replaying {} undo operations",
      ops.len(),
      undo_ops.len()
    );
    let undo = Self::for_undo(self.store.clone());
    if let Err(e) = undo.apply_all(&undo_ops).await {
      error!("rollback left the store partially restored: {e}");
    }
    Err(err)
  }

  /// Inverse operations computed against the current state. Operations of
  /// unknown type get no entry.
  pub async fn undo_ops(
    &self,
    ops: &[Operation<S::Key, S::Value>],
  ) -> Result<Vec<Operation<S::Key, S::Value>>> {
    let captured = join_all(ops.iter().map(|op| self.undo_op(op))).await;
    let mut undo_ops = Vec::with_capacity(captured.len());
    for undo_op in captured {
      if let Some(undo_op) = undo_op? {
        undo_ops.push(undo_op);
      }
    }
    Ok(undo_ops)
  }

  pub fn get_db(&self, path: Option<&[String]>) -> S {
    match path {
      Some(path) => self.store.sub(path),
      None => self.store.clone(),
    }
  }

  /// Issues every operation without waiting on the others, then waits for
  /// all of them. Every operation runs to completion; the error of the
  /// earliest failing operation in `ops` order is returned.
  async fn apply_all(&self, ops: &[Operation<S::Key, S::Value>]) -> Result<()> {
    let outcomes = join_all(ops.iter().map(|op| self.apply(op))).await;
    match outcomes.into_iter().find_map(|res| res.err()) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  async fn apply(&self, op: &Operation<S::Key, S::Value>) -> Result<()> {
    let db = self.get_db(op.path.as_deref());
    match op.op_type {
      OpType::Put => match &op.value {
        Some(value) => db.put(&op.key, value).await,
        None => {
          debug!("skipping put without a value at {:?}", db.path());
          Ok(())
        }
      },
      OpType::Del => db.del(&op.key).await,
      OpType::Unknown => Ok(()),
    }
  }

  async fn undo_op(
    &self,
    op: &Operation<S::Key, S::Value>,
  ) -> Result<Option<Operation<S::Key, S::Value>>> {
    let op_type = match op.op_type {
      OpType::Put | OpType::Del => op.op_type,
      OpType::Unknown => return Ok(None),
    };
    let prior = self.get_db(op.path.as_deref()).get(&op.key).await?;
    let undo_type = match (op_type, &prior) {
      (OpType::Put, None) => OpType::Del,
      _ => OpType::Put,
    };
    Ok(Some(Operation {
      op_type: undo_type,
      key: op.key.clone(),
      value: prior,
      path: op.path.clone(),
    }))
  }
}

/// Accumulates operations for one store and hands them to a
/// [`BatchExecutor`]. Nothing is validated until execution.
pub struct Batch<S: Store> {
  store: S,
  operations: Vec<Operation<S::Key, S::Value>>,
}

impl<S> Batch<S>
where
  S: Store,
  S::Key: Clone,
  S::Value: Clone,
{
  pub fn new(store: S) -> Self {
    Self {
      store,
      operations: Vec::new(),
    }
  }

  pub fn put(&mut self, key: S::Key, value: S::Value) -> &mut Self {
    self.operations.push(Operation::put(key, value));
    self
  }

  pub fn put_in<I, P>(&mut self, path: I, key: S::Key, value: S::Value) -> &mut Self
  where
    I: IntoIterator<Item = P>,
    P: Into<String>,
  {
    self.operations.push(Operation::put(key, value).at(path));
    self
  }

  pub fn del(&mut self, key: S::Key) -> &mut Self {
    self.operations.push(Operation::del(key));
    self
  }

  pub fn del_in<I, P>(&mut self, path: I, key: S::Key) -> &mut Self
  where
    I: IntoIterator<Item = P>,
    P: Into<String>,
  {
    self.operations.push(Operation::del(key).at(path));
    self
  }

  pub fn operations(&self) -> &[Operation<S::Key, S::Value>] {
    &self.operations
  }

  pub fn len(&self) -> usize {
    self.operations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.operations.is_empty()
  }

  /// Snapshot of the operations added so far.
  pub fn build(&self) -> Vec<Operation<S::Key, S::Value>> {
    self.operations.clone()
  }

  pub async fn exec(&self) -> Result<()> {
    BatchExecutor::run(self.store.clone(), &self.build()).await
  }
}
