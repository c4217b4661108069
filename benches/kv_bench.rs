use criterion::{criterion_group, criterion_main, Criterion};
use plain_kv::{
  codec::{Json, Utf8},
  option::{IteratorOptions, Options},
  tree::Tree,
  util::rand_kv::{get_test_key, get_test_value},
};
use rand::Rng;

const ENTRIES: usize = 10000;

fn open_tree() -> Tree<String, String> {
  Tree::new(Options::new(Utf8, Json::default()))
}

fn filled_tree() -> Tree<String, String> {
  let tree = open_tree();
  for i in 0..ENTRIES {
    let res = tree.put(&get_test_key(i), &get_test_value(i));
    assert!(res.is_ok());
  }
  tree
}

fn bench_put(c: &mut Criterion) {
  let tree = filled_tree();
  let mut rnd = rand::rng();

  c.bench_function("plain-kv-put-bench", |b| {
    b.iter(|| {
      let i = rnd.random_range(0..ENTRIES * 2);
      let res = tree.put(&get_test_key(i), &get_test_value(i));
      assert!(res.is_ok());
    })
  });
}

fn bench_get(c: &mut Criterion) {
  let tree = filled_tree();
  let mut rnd = rand::rng();

  c.bench_function("plain-kv-get-bench", |b| {
    b.iter(|| {
      let i = rnd.random_range(0..ENTRIES * 2);
      let res = tree.get(&get_test_key(i));
      if i < ENTRIES {
        assert!(res.unwrap().is_some());
      } else {
        assert!(res.unwrap().is_none());
      }
    })
  });
}

fn bench_delete(c: &mut Criterion) {
  let tree = filled_tree();
  let mut rnd = rand::rng();

  c.bench_function("plain-kv-delete-bench", |b| {
    b.iter(|| {
      let i = rnd.random_range(0..ENTRIES);
      tree.del(&get_test_key(i)).unwrap();
    })
  });
}

fn bench_iterate(c: &mut Criterion) {
  let tree = filled_tree();

  c.bench_function("plain-kv-iterate-bench", |b| {
    b.iter(|| {
      let opts = IteratorOptions {
        gte: Some(get_test_key(ENTRIES / 4)),
        lt: Some(get_test_key(ENTRIES / 2)),
        ..Default::default()
      };
      let count = tree.iter(opts).filter(|e| e.is_ok()).count();
      assert_eq!(count, ENTRIES / 4);
    })
  });
}

fn bench_list_all(c: &mut Criterion) {
  let tree = open_tree();
  for i in 0..ENTRIES {
    let sub = tree.sub([format!("ns-{}", i % 16)]);
    let res = sub.put(&get_test_key(i), &get_test_value(i));
    assert!(res.is_ok());
  }

  c.bench_function("plain-kv-list-all-bench", |b| {
    b.iter(|| {
      let opts = IteratorOptions {
        all: true,
        ..Default::default()
      };
      assert_eq!(tree.iter(opts).count(), ENTRIES);
    })
  });
}

criterion_group!(
  benches,
  bench_get,
  bench_put,
  bench_delete,
  bench_iterate,
  bench_list_all
);
criterion_main!(benches);
