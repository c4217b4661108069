use rand::{distr::Alphanumeric, Rng};

/// Zero-padded so test keys sort in the same order as their numbers.
pub fn get_test_key(i: usize) -> String {
  format!("plain-kv-key-{:09}", i)
}

pub fn get_test_value(i: usize) -> String {
  let suffix: String = rand::rng()
    .sample_iter(&Alphanumeric)
    .take(16)
    .map(char::from)
    .collect();
  format!("plain-kv-value-{:09}-{}", i, suffix)
}
