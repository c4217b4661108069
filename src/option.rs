use std::{fmt, sync::Arc};

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
  codec::{Codec, MsgPack, Utf8},
  index::{default_comparator, Comparator},
};

pub const DEFAULT_SEPARATOR: char = '!';

/// Construction options for a store root. Every node created below the root
/// inherits the separator and comparator, and the codecs unless a `sub` call
/// overrides them.
pub struct Options<K, V> {
  pub separator: char,

  /// Orders encoded keys, so it must agree with the byte form the key codec produces.
  pub comparator: Comparator<Bytes>,

  pub key_codec: Arc<dyn Codec<K>>,

  pub value_codec: Arc<dyn Codec<V>>,
}

impl<K, V> Options<K, V> {
  pub fn new<KC, VC>(key_codec: KC, value_codec: VC) -> Self
  where
    KC: Codec<K> + 'static,
    VC: Codec<V> + 'static,
  {
    Self {
      separator: DEFAULT_SEPARATOR,
      comparator: default_comparator(),
      key_codec: Arc::new(key_codec),
      value_codec: Arc::new(value_codec),
    }
  }

  pub fn separator(mut self, separator: char) -> Self {
    self.separator = separator;
    self
  }

  pub fn comparator(mut self, comparator: Comparator<Bytes>) -> Self {
    self.comparator = comparator;
    self
  }
}

impl<V> Default for Options<String, V>
where
  V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new(Utf8, MsgPack::<V>::default())
  }
}

impl<K, V> Clone for Options<K, V> {
  fn clone(&self) -> Self {
    Self {
      separator: self.separator,
      comparator: self.comparator.clone(),
      key_codec: self.key_codec.clone(),
      value_codec: self.value_codec.clone(),
    }
  }
}

impl<K, V> fmt::Debug for Options<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Options")
      .field("separator", &self.separator)
      .finish_non_exhaustive()
  }
}

/// Codec overrides for the nodes created by a single `sub` call. Nodes that
/// already exist along the path keep their codecs.
pub struct SubOptions<K, V> {
  pub key_codec: Option<Arc<dyn Codec<K>>>,

  pub value_codec: Option<Arc<dyn Codec<V>>>,
}

impl<K, V> SubOptions<K, V> {
  pub fn key_codec<C: Codec<K> + 'static>(mut self, codec: C) -> Self {
    self.key_codec = Some(Arc::new(codec));
    self
  }

  pub fn value_codec<C: Codec<V> + 'static>(mut self, codec: C) -> Self {
    self.value_codec = Some(Arc::new(codec));
    self
  }
}

#[allow(clippy::derivable_impls)]
impl<K, V> Default for SubOptions<K, V> {
  fn default() -> Self {
    Self {
      key_codec: None,
      value_codec: None,
    }
  }
}

/// Range and direction filters for iteration. All supplied bounds must hold
/// at once; they are checked with the index comparator.
#[derive(Debug, Clone)]
pub struct IteratorOptions<K> {
  pub gt: Option<K>,

  pub gte: Option<K>,

  pub lt: Option<K>,

  pub lte: Option<K>,

  pub reverse: bool,

  /// Also visit every descendant namespace (tree iteration only).
  pub all: bool,

  /// Overrides the node separator when flattening descendant keys.
  pub separator: Option<char>,
}

impl<K> IteratorOptions<K> {
  /// Re-expresses the bounds in another key space, e.g. encoded keys.
  pub fn try_map_bounds<T, E, F>(&self, mut f: F) -> std::result::Result<IteratorOptions<T>, E>
  where
    F: FnMut(&K) -> std::result::Result<T, E>,
  {
    let mut map = |bound: &Option<K>| bound.as_ref().map(&mut f).transpose();
    Ok(IteratorOptions {
      gt: map(&self.gt)?,
      gte: map(&self.gte)?,
      lt: map(&self.lt)?,
      lte: map(&self.lte)?,
      reverse: self.reverse,
      all: self.all,
      separator: self.separator,
    })
  }

  pub fn has_bounds(&self) -> bool {
    self.gt.is_some() || self.gte.is_some() || self.lt.is_some() || self.lte.is_some()
  }
}

impl<K> Default for IteratorOptions<K> {
  fn default() -> Self {
    Self {
      gt: None,
      gte: None,
      lt: None,
      lte: None,
      reverse: false,
      all: false,
      separator: None,
    }
  }
}
