use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Errors {
  #[error("failed to encode: {0}")]
  EncodeFailed(String),

  #[error("failed to decode: {0}")]
  DecodeFailed(String),

  #[error("malformed lexicographic integer")]
  MalformedLexInt,

  #[error("store rejected the operation: {0}")]
  StoreRejected(String),
}

pub type Result<T> = std::result::Result<T, Errors>;
