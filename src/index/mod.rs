//! Ordered index: a doubly-linked sequence of entries kept in comparator
//! order, plus a key to slot map for O(1) point access.
//!
//! Entries live in an arena and link to each other by slot number. Deleted
//! slots go on a free list and are reused by later inserts.

use std::{cmp::Ordering, collections::HashMap, fmt, hash::Hash, sync::Arc};

use crate::option::IteratorOptions;

/// Total order over keys. Must stay consistent with itself for the lifetime
/// of the index.
pub type Comparator<K> = Arc<dyn Fn(&K, &K) -> Ordering + Send + Sync>;

pub fn default_comparator<K: Ord>() -> Comparator<K> {
  Arc::new(|a: &K, b: &K| a.cmp(b))
}

struct Node<K, V> {
  key: K,
  value: V,
  prev: Option<usize>,
  next: Option<usize>,
}

pub struct Sorted<K, V> {
  comparator: Comparator<K>,
  slots: Vec<Option<Node<K, V>>>,
  free: Vec<usize>,
  head: Option<usize>,
  tail: Option<usize>,
  map: HashMap<K, usize>,
}

impl<K, V> Sorted<K, V>
where
  K: Hash + Eq + Clone,
{
  pub fn new(comparator: Comparator<K>) -> Self {
    Self {
      comparator,
      slots: Vec::new(),
      free: Vec::new(),
      head: None,
      tail: None,
      map: HashMap::new(),
    }
  }

  pub fn comparator(&self) -> &Comparator<K> {
    &self.comparator
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  pub fn contains_key(&self, key: &K) -> bool {
    self.map.contains_key(key)
  }

  /// Inserts or replaces. A replaced entry keeps its position; a new one is
  /// spliced in before the first entry that sorts after it.
  pub fn put(&mut self, key: K, value: V) {
    if let Some(&at) = self.map.get(&key) {
      if let Some(node) = self.slots[at].as_mut() {
        node.value = value;
      }
      return;
    }

    // linear scan, insertion is O(n)
    let mut current = self.head;
    while let Some(at) = current {
      let node = self.node(at);
      if (self.comparator)(&key, &node.key) == Ordering::Less {
        break;
      }
      current = node.next;
    }

    let prev = match current {
      Some(at) => self.node(at).prev,
      None => self.tail,
    };
    let slot = self.alloc(Node {
      key: key.clone(),
      value,
      prev,
      next: current,
    });

    match prev {
      Some(p) => self.node_mut(p).next = Some(slot),
      None => self.head = Some(slot),
    }
    match current {
      Some(n) => self.node_mut(n).prev = Some(slot),
      None => self.tail = Some(slot),
    }
    self.map.insert(key, slot);
  }

  pub fn get(&self, key: &K) -> Option<&V> {
    self
      .map
      .get(key)
      .and_then(|&at| self.slots[at].as_ref())
      .map(|node| &node.value)
  }

  /// Unlinks the entry and returns its value. Absent keys are a no-op.
  pub fn del(&mut self, key: &K) -> Option<V> {
    let at = self.map.remove(key)?;
    let node = self.slots[at].take()?;

    match node.prev {
      Some(p) => self.node_mut(p).next = node.next,
      None => self.head = node.next,
    }
    match node.next {
      Some(n) => self.node_mut(n).prev = node.prev,
      None => self.tail = node.prev,
    }
    self.free.push(at);
    Some(node.value)
  }

  /// Lazy walk over the entries satisfying `opts`. Mutating the index while
  /// an iterator is alive is prevented by the borrow; callers holding slot
  /// cursors across mutations get unspecified results.
  pub fn iter<'a>(&'a self, opts: &'a IteratorOptions<K>) -> Iter<'a, K, V> {
    Iter {
      sorted: self,
      opts,
      cursor: self.first(opts.reverse),
    }
  }

  pub fn keys(&self) -> Vec<K> {
    let opts = IteratorOptions::default();
    self.iter(&opts).map(|(k, _)| k.clone()).collect()
  }

  pub fn values(&self) -> Vec<V>
  where
    V: Clone,
  {
    let opts = IteratorOptions::default();
    self.iter(&opts).map(|(_, v)| v.clone()).collect()
  }

  /// Slot of the first entry in walk order.
  pub fn first(&self, reverse: bool) -> Option<usize> {
    if reverse {
      self.tail
    } else {
      self.head
    }
  }

  /// Slot following `at` in walk order, `None` at the end or if `at` has
  /// been freed.
  pub fn advance(&self, at: usize, reverse: bool) -> Option<usize> {
    let node = self.slots.get(at)?.as_ref()?;
    if reverse {
      node.prev
    } else {
      node.next
    }
  }

  pub fn entry(&self, at: usize) -> Option<(&K, &V)> {
    self
      .slots
      .get(at)?
      .as_ref()
      .map(|node| (&node.key, &node.value))
  }

  /// Whether `key` satisfies every bound in `opts`.
  pub fn matches(&self, key: &K, opts: &IteratorOptions<K>) -> bool {
    if !opts.has_bounds() {
      return true;
    }
    let cmp = |bound: &K| (self.comparator)(key, bound);
    opts.gt.as_ref().map_or(true, |b| cmp(b) == Ordering::Greater)
      && opts.gte.as_ref().map_or(true, |b| cmp(b) != Ordering::Less)
      && opts.lt.as_ref().map_or(true, |b| cmp(b) == Ordering::Less)
      && opts.lte.as_ref().map_or(true, |b| cmp(b) != Ordering::Greater)
  }

  fn alloc(&mut self, node: Node<K, V>) -> usize {
    match self.free.pop() {
      Some(at) => {
        self.slots[at] = Some(node);
        at
      }
      None => {
        self.slots.push(Some(node));
        self.slots.len() - 1
      }
    }
  }

  fn node(&self, at: usize) -> &Node<K, V> {
    match self.slots[at].as_ref() {
      Some(node) => node,
      None => unreachable!("linked slot {at} is vacant"),
    }
  }

  fn node_mut(&mut self, at: usize) -> &mut Node<K, V> {
    match self.slots[at].as_mut() {
      Some(node) => node,
      None => unreachable!("linked slot {at} is vacant"),
    }
  }
}

impl<K, V> Default for Sorted<K, V>
where
  K: Hash + Eq + Clone + Ord,
{
  fn default() -> Self {
    Self::new(default_comparator())
  }
}

impl<K: fmt::Debug, V> fmt::Debug for Sorted<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Sorted")
      .field("len", &self.map.len())
      .finish_non_exhaustive()
  }
}

pub struct Iter<'a, K, V> {
  sorted: &'a Sorted<K, V>,
  opts: &'a IteratorOptions<K>,
  cursor: Option<usize>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
  K: Hash + Eq + Clone,
{
  type Item = (&'a K, &'a V);

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(at) = self.cursor {
      let sorted = self.sorted;
      let (key, value) = sorted.entry(at)?;
      self.cursor = sorted.advance(at, self.opts.reverse);
      if sorted.matches(key, self.opts) {
        return Some((key, value));
      }
    }
    None
  }
}
