/// Errors raised by the built-in agents.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuiltinError {
  /// No operation was bound at registration or given as input.
  #[error("missing operation")]
  MissingOperation,

  #[error("unsupported operation: {0}")]
  UnsupportedOperation(String),

  /// `values` is present but not a list.
  #[error("values must be a list")]
  InvalidValues,

  /// A value is neither a number nor the name of a numeric input.
  #[error("value at index {index} is not numeric: {value}")]
  NotNumeric { index: usize, value: String },

  #[error("division by zero")]
  DivisionByZero,

  /// The result overflowed to infinity or NaN.
  #[error("result is not a finite number")]
  NonFinite,
}
