//! Namespace tree: ordered indexes arranged as an addressable hierarchy.
//!
//! Each node owns one index of its own entries and one index of its children
//! keyed by path segment. Children are created on first address and live as
//! long as the root. A node's identity is its path, and every lookup of the
//! same path from the same root hands back the same node.
//!
//! Descendant listings flatten keys as `<sep>seg1<sep><sep>seg2<sep>key`.
//! The doubled separator only disambiguates when no segment itself contains
//! two consecutive separators, so segment names must avoid that sequence.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use parking_lot::RwLock;

use crate::{
  codec::Codec,
  errors::Result,
  index::{default_comparator, Sorted},
  option::{IteratorOptions, Options, SubOptions},
  Store,
};

struct Node<K, V> {
  path: Vec<String>,
  separator: char,
  key_codec: Arc<dyn Codec<K>>,
  value_codec: Arc<dyn Codec<V>>,
  entries: RwLock<Sorted<Bytes, Bytes>>,
  children: RwLock<Sorted<String, Tree<K, V>>>,
}

/// Handle to one namespace node. Cloning the handle does not copy the node.
pub struct Tree<K, V> {
  node: Arc<Node<K, V>>,
}

impl<K, V> Clone for Tree<K, V> {
  fn clone(&self) -> Self {
    Self {
      node: self.node.clone(),
    }
  }
}

impl<K, V> Tree<K, V> {
  /// Creates a root node.
  pub fn new(options: Options<K, V>) -> Self {
    Self::with_path(Vec::new(), options)
  }

  fn with_path(path: Vec<String>, options: Options<K, V>) -> Self {
    let entries = Sorted::new(options.comparator);
    Self {
      node: Arc::new(Node {
        path,
        separator: options.separator,
        key_codec: options.key_codec,
        value_codec: options.value_codec,
        entries: RwLock::new(entries),
        children: RwLock::new(Sorted::new(default_comparator())),
      }),
    }
  }

  pub fn path(&self) -> &[String] {
    &self.node.path
  }

  pub fn separator(&self) -> char {
    self.node.separator
  }

  pub fn key_codec(&self) -> &Arc<dyn Codec<K>> {
    &self.node.key_codec
  }

  pub fn value_codec(&self) -> &Arc<dyn Codec<V>> {
    &self.node.value_codec
  }

  /// Options a child of this node starts from.
  pub fn options(&self) -> Options<K, V> {
    Options {
      separator: self.node.separator,
      comparator: self.node.entries.read().comparator().clone(),
      key_codec: self.node.key_codec.clone(),
      value_codec: self.node.value_codec.clone(),
    }
  }

  pub fn put(&self, key: &K, value: &V) -> Result<()> {
    let key = self.node.key_codec.encode(key)?;
    let value = self.node.value_codec.encode(value)?;
    self.node.entries.write().put(key, value);
    Ok(())
  }

  pub fn get(&self, key: &K) -> Result<Option<V>> {
    let key = self.node.key_codec.encode(key)?;
    let raw = self.node.entries.read().get(&key).cloned();
    raw.map(|raw| self.node.value_codec.decode(&raw)).transpose()
  }

  pub fn del(&self, key: &K) -> Result<()> {
    let key = self.node.key_codec.encode(key)?;
    self.node.entries.write().del(&key);
    Ok(())
  }

  pub fn sub<I, S>(&self, path: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.sub_with(path, SubOptions::default())
  }

  /// Walks `path` from this node, creating missing nodes. Codec overrides
  /// apply only to nodes this call creates.
  pub fn sub_with<I, S>(&self, path: I, opts: SubOptions<K, V>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut node = self.clone();
    for segment in path {
      let segment = segment.as_ref().to_string();
      let next = {
        let mut children = node.node.children.write();
        match children.get(&segment) {
          Some(child) => child.clone(),
          None => {
            let mut options = node.options();
            if let Some(codec) = &opts.key_codec {
              options.key_codec = codec.clone();
            }
            if let Some(codec) = &opts.value_codec {
              options.value_codec = codec.clone();
            }
            let mut path = node.node.path.clone();
            path.push(segment.clone());
            debug!("creating namespace node {path:?}");
            let child = Self::with_path(path, options);
            children.put(segment, child.clone());
            child
          }
        }
      };
      node = next;
    }
    node
  }

  /// Lazy listing of this node's entries, and of every descendant's entries
  /// after them when `opts.all` is set. Descendants are visited depth first
  /// in children-index order.
  ///
  /// The walk reads the live indexes one step at a time. Writing to a node
  /// while it is being walked leaves the rest of that walk unspecified.
  pub fn iter(&self, opts: IteratorOptions<K>) -> TreeIter<K, V> {
    TreeIter {
      opts,
      stack: vec![Frame::Enter(self.clone())],
    }
  }

  /// Number of entries held directly by this node.
  pub fn len(&self) -> usize {
    self.node.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.node.entries.read().is_empty()
  }

  /// A node is populated once its own index holds an entry.
  pub fn is_populated(&self) -> bool {
    !self.is_empty()
  }

  /// Immediate child segments in children-index order.
  pub fn children(&self) -> Vec<String> {
    self.node.children.read().keys()
  }

  pub fn same_node(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.node, &other.node)
  }

  fn child_nodes(&self) -> Vec<Self> {
    self.node.children.read().values()
  }

  fn decode_entry(&self, key: &Bytes, value: &Bytes) -> Result<Entry<K, V>> {
    Ok(Entry {
      path: self.node.path.clone(),
      key: self.node.key_codec.decode(key)?,
      value: self.node.value_codec.decode(value)?,
    })
  }
}

impl<K, V> fmt::Debug for Tree<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Tree")
      .field("path", &self.node.path)
      .field("separator", &self.node.separator)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl<K, V> Store for Tree<K, V>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  type Key = K;
  type Value = V;

  async fn put(&self, key: &K, value: &V) -> Result<()> {
    Tree::put(self, key, value)
  }

  async fn get(&self, key: &K) -> Result<Option<V>> {
    Tree::get(self, key)
  }

  async fn del(&self, key: &K) -> Result<()> {
    Tree::del(self, key)
  }

  fn sub_with(&self, path: &[String], opts: SubOptions<K, V>) -> Self {
    Tree::sub_with(self, path, opts)
  }

  fn path(&self) -> &[String] {
    Tree::path(self)
  }
}

/// One decoded entry and the path of the node holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<K, V> {
  pub path: Vec<String>,
  pub key: K,
  pub value: V,
}

impl<K: fmt::Display, V> Entry<K, V> {
  /// The key as it appears in a flattened listing. Entries of the root keep
  /// their plain key.
  pub fn flat_key(&self, separator: char) -> String {
    if self.path.is_empty() {
      return self.key.to_string();
    }
    let joint = format!("{separator}{separator}");
    format!(
      "{separator}{}{separator}{}",
      self.path.join(&joint),
      self.key
    )
  }
}

enum Frame<K, V> {
  Enter(Tree<K, V>),
  Entries {
    tree: Tree<K, V>,
    bounds: IteratorOptions<Bytes>,
    cursor: Option<usize>,
  },
  Children(std::vec::IntoIter<Tree<K, V>>),
}

pub struct TreeIter<K, V> {
  opts: IteratorOptions<K>,
  stack: Vec<Frame<K, V>>,
}

impl<K, V> Iterator for TreeIter<K, V> {
  type Item = Result<Entry<K, V>>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      match self.stack.pop()? {
        Frame::Enter(tree) => {
          let bounds = match self.opts.try_map_bounds(|k| tree.node.key_codec.encode(k)) {
            Ok(bounds) => bounds,
            Err(e) => return Some(Err(e)),
          };
          let cursor = tree.node.entries.read().first(bounds.reverse);
          self.stack.push(Frame::Entries {
            tree,
            bounds,
            cursor,
          });
        }
        Frame::Entries {
          tree,
          bounds,
          mut cursor,
        } => {
          let found = {
            let entries = tree.node.entries.read();
            let mut found = None;
            while let Some(at) = cursor {
              let Some((key, value)) = entries.entry(at) else {
                cursor = None;
                break;
              };
              cursor = entries.advance(at, bounds.reverse);
              if entries.matches(key, &bounds) {
                found = Some((key.clone(), value.clone()));
                break;
              }
            }
            found
          };

          match found {
            Some((key, value)) => {
              let item = tree.decode_entry(&key, &value);
              self.stack.push(Frame::Entries {
                tree,
                bounds,
                cursor,
              });
              return Some(item);
            }
            None if self.opts.all => {
              self.stack.push(Frame::Children(tree.child_nodes().into_iter()));
            }
            None => {}
          }
        }
        Frame::Children(mut children) => {
          if let Some(child) = children.next() {
            self.stack.push(Frame::Children(children));
            self.stack.push(Frame::Enter(child));
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::{from_fn, Json, LexInt, Utf8};
  use crate::errors::Errors;

  fn new_tree() -> Tree<String, u32> {
    Tree::new(Options::new(Utf8, Json::default()))
  }

  fn keys_of(tree: &Tree<String, u32>, opts: IteratorOptions<String>) -> Vec<String> {
    tree.iter(opts).map(|e| e.unwrap().key).collect()
  }

  #[test]
  fn test_tree_put_get_del() {
    let tree = new_tree();
    let key = "key".to_string();
    assert!(tree.put(&key, &1).is_ok());
    assert_eq!(tree.get(&key).unwrap(), Some(1));

    assert!(tree.del(&key).is_ok());
    assert_eq!(tree.get(&key).unwrap(), None);
    assert!(tree.del(&key).is_ok());
  }

  #[test]
  fn test_tree_sub_identity() {
    let root = new_tree();
    let a = root.sub(["a", "b"]);
    let b = root.sub(["a", "b"]);
    assert!(a.same_node(&b));
    assert_eq!(a.path(), ["a".to_string(), "b".to_string()]);
    assert!(root.sub(["a"]).sub(["b"]).same_node(&a));
    assert!(!root.sub(["a"]).same_node(&a));
    assert!(root.sub(Vec::<String>::new()).same_node(&root));
  }

  #[test]
  fn test_tree_sub_entries_are_isolated() {
    let root = new_tree();
    let sub = root.sub(["a", "b"]);
    sub.put(&"k".to_string(), &7).unwrap();

    assert_eq!(root.get(&"k".to_string()).unwrap(), None);
    assert!(keys_of(&root, IteratorOptions::default()).is_empty());
    assert_eq!(keys_of(&sub, IteratorOptions::default()), vec!["k"]);
    assert!(!root.is_populated());
    assert!(sub.is_populated());
  }

  #[test]
  fn test_tree_flattened_listing() {
    let root = new_tree();
    root.put(&"x".to_string(), &1).unwrap();
    root.sub(["a"]).put(&"y".to_string(), &2).unwrap();

    let opts = IteratorOptions {
      all: true,
      ..Default::default()
    };
    let listed: Vec<(String, u32)> = root
      .iter(opts)
      .map(|e| e.unwrap())
      .map(|e| (e.flat_key('!'), e.value))
      .collect();
    assert_eq!(
      listed,
      vec![("x".to_string(), 1), ("!a!!y".to_string(), 2)]
    );
  }

  #[test]
  fn test_tree_flattened_listing_nested() {
    let root = new_tree();
    root.sub(["b"]).put(&"k".to_string(), &2).unwrap();
    root.sub(["a", "c"]).put(&"k".to_string(), &3).unwrap();
    root.sub(["a"]).put(&"k".to_string(), &1).unwrap();
    root.put(&"z".to_string(), &0).unwrap();

    let opts = IteratorOptions {
      all: true,
      ..Default::default()
    };
    let listed: Vec<String> = root
      .iter(opts)
      .map(|e| e.unwrap().flat_key('!'))
      .collect();
    assert_eq!(listed, vec!["z", "!a!k", "!a!!c!k", "!b!k"]);

    let own: Vec<String> = keys_of(&root, IteratorOptions::default());
    assert_eq!(own, vec!["z"]);
  }

  #[test]
  fn test_tree_range_applies_to_descendants() {
    let root = new_tree();
    for k in ["a", "b", "c"] {
      root.put(&k.to_string(), &1).unwrap();
      root.sub(["s"]).put(&k.to_string(), &2).unwrap();
    }
    let opts = IteratorOptions {
      gte: Some("b".to_string()),
      reverse: true,
      all: true,
      ..Default::default()
    };
    let listed: Vec<(Vec<String>, String)> = root
      .iter(opts)
      .map(|e| e.unwrap())
      .map(|e| (e.path, e.key))
      .collect();
    assert_eq!(
      listed,
      vec![
        (vec![], "c".to_string()),
        (vec![], "b".to_string()),
        (vec!["s".to_string()], "c".to_string()),
        (vec!["s".to_string()], "b".to_string()),
      ]
    );
  }

  #[test]
  fn test_tree_sub_codec_override() {
    let root: Tree<String, u32> = new_tree();
    let upper = from_fn(
      "upper",
      |s: &String| Ok(Bytes::from(s.to_uppercase())),
      |raw: &Bytes| Utf8.decode(raw),
    );
    let shouting = root.sub_with(["loud"], SubOptions::default().key_codec(upper));
    let sibling = root.sub(["quiet"]);
    let grandchild = shouting.sub(["inner"]);

    shouting.put(&"abc".to_string(), &1).unwrap();
    assert_eq!(shouting.get(&"ABC".to_string()).unwrap(), Some(1));
    assert_eq!(keys_of(&shouting, IteratorOptions::default()), vec!["ABC"]);

    sibling.put(&"abc".to_string(), &2).unwrap();
    assert_eq!(keys_of(&sibling, IteratorOptions::default()), vec!["abc"]);

    // inherited from the overridden parent
    assert_eq!(grandchild.key_codec().name(), "upper");
    assert_eq!(root.key_codec().name(), "utf-8");
  }

  #[test]
  fn test_tree_codec_rejection_surfaces() {
    let picky = from_fn(
      "picky",
      |v: &u32| match *v {
        0 => Err(Errors::EncodeFailed("zero".to_string())),
        v => Ok(Bytes::from(v.to_string())),
      },
      |raw: &Bytes| {
        std::str::from_utf8(raw)
          .ok()
          .and_then(|s| s.parse().ok())
          .ok_or_else(|| Errors::DecodeFailed("not a number".to_string()))
      },
    );
    let tree = Tree::new(Options::new(Utf8, picky));
    assert_eq!(
      tree.put(&"k".to_string(), &0),
      Err(Errors::EncodeFailed("zero".to_string()))
    );
    assert!(tree.put(&"k".to_string(), &5).is_ok());
    assert_eq!(tree.get(&"k".to_string()).unwrap(), Some(5));
  }

  #[test]
  fn test_tree_lexint_keys_sort_numerically() {
    let tree: Tree<u64, String> = Tree::new(Options::new(LexInt, Json::default()));
    for n in [1000u64, 3, 70_000, 251, 42] {
      tree.put(&n, &n.to_string()).unwrap();
    }
    let keys: Vec<u64> = tree
      .iter(IteratorOptions::default())
      .map(|e| e.unwrap().key)
      .collect();
    assert_eq!(keys, vec![3, 42, 251, 1000, 70_000]);

    let opts = IteratorOptions {
      gt: Some(42),
      lte: Some(1000),
      ..Default::default()
    };
    let keys: Vec<u64> = tree.iter(opts).map(|e| e.unwrap().key).collect();
    assert_eq!(keys, vec![251, 1000]);
  }

  #[test]
  fn test_tree_children_listing() {
    let root = new_tree();
    root.sub(["b"]);
    root.sub(["a", "x"]);
    assert_eq!(root.children(), vec!["a", "b"]);
    assert_eq!(root.sub(["a"]).children(), vec!["x"]);
    assert_eq!(root.sub(["a"]).separator(), '!');
  }

  #[test]
  fn test_tree_children_inherit_comparator() {
    let descending: crate::Comparator<Bytes> = Arc::new(|a: &Bytes, b: &Bytes| b.cmp(a));
    let root: Tree<String, u32> =
      Tree::new(Options::new(Utf8, Json::default()).comparator(descending));
    let child = root.sub(["a", "b"]);
    for (i, key) in ["k1", "k3", "k2"].iter().enumerate() {
      root.put(&key.to_string(), &(i as u32)).unwrap();
      child.put(&key.to_string(), &(i as u32)).unwrap();
    }
    assert_eq!(keys_of(&root, IteratorOptions::default()), vec!["k3", "k2", "k1"]);
    assert_eq!(keys_of(&child, IteratorOptions::default()), vec!["k3", "k2", "k1"]);
  }
}
