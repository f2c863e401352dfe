//! Arithmetic over a list of values.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use loom_agent::{Agent, AgentContext, AgentFailure};
use loom_config::Mapping;
use serde_json::{Value, json};

use crate::error::BuiltinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Add,
  Subtract,
  Multiply,
  Divide,
}

impl Operation {
  pub const ALL: [Operation; 4] = [
    Operation::Add,
    Operation::Subtract,
    Operation::Multiply,
    Operation::Divide,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Operation::Add => "add",
      Operation::Subtract => "subtract",
      Operation::Multiply => "multiply",
      Operation::Divide => "divide",
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Operation {
  type Err = BuiltinError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Operation::ALL
      .into_iter()
      .find(|op| op.name() == s)
      .ok_or_else(|| BuiltinError::UnsupportedOperation(s.to_string()))
  }
}

/// Integers stay integers until an operation forces a float.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
  Int(i64),
  Float(f64),
}

impl Number {
  fn from_json(value: &Value) -> Option<Self> {
    value
      .as_i64()
      .map(Number::Int)
      .or_else(|| value.as_f64().map(Number::Float))
  }

  fn as_f64(self) -> f64 {
    match self {
      Number::Int(i) => i as f64,
      Number::Float(f) => f,
    }
  }

  fn is_zero(self) -> bool {
    self.as_f64() == 0.0
  }

  fn combine(
    self,
    other: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
  ) -> Number {
    match (self, other) {
      (Number::Int(a), Number::Int(b)) => int_op(a, b)
        .map(Number::Int)
        .unwrap_or_else(|| Number::Float(float_op(a as f64, b as f64))),
      (a, b) => Number::Float(float_op(a.as_f64(), b.as_f64())),
    }
  }

  fn into_json(self) -> Result<Value, BuiltinError> {
    match self {
      Number::Int(i) => Ok(json!(i)),
      Number::Float(f) => serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or(BuiltinError::NonFinite),
    }
  }
}

/// Arithmetic agent.
///
/// Inputs:
/// - `values`: list of numbers or names of other inputs. A name resolves to
///   that input, unwrapping `{"result": n}` objects from upstream nodes.
/// - `operation`: only read when no operation was bound at construction.
///
/// Output: `{"result": n}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator {
  operation: Option<Operation>,
}

impl Calculator {
  /// A calculator that always performs `operation`.
  pub fn new(operation: Operation) -> Self {
    Self {
      operation: Some(operation),
    }
  }

  /// A calculator that reads its operation from the `operation` input.
  pub fn dynamic() -> Self {
    Self::default()
  }

  fn operation(&self, inputs: &Mapping) -> Result<Operation, BuiltinError> {
    if let Some(op) = self.operation {
      return Ok(op);
    }
    inputs
      .get("operation")
      .and_then(Value::as_str)
      .ok_or(BuiltinError::MissingOperation)?
      .parse()
  }
}

fn resolve_values(inputs: &Mapping) -> Result<Vec<Number>, BuiltinError> {
  let values = match inputs.get("values") {
    None | Some(Value::Null) => return Ok(Vec::new()),
    Some(Value::Array(values)) => values,
    Some(_) => return Err(BuiltinError::InvalidValues),
  };

  values
    .iter()
    .enumerate()
    .map(|(index, value)| {
      let resolved = match value {
        Value::String(name) => match inputs.get(name) {
          Some(Value::Object(obj)) => obj.get("result").unwrap_or(value),
          Some(other) => other,
          None => value,
        },
        _ => value,
      };
      Number::from_json(resolved).ok_or_else(|| BuiltinError::NotNumeric {
        index,
        value: resolved.to_string(),
      })
    })
    .collect()
}

fn calculate(operation: Operation, values: &[Number]) -> Result<Number, BuiltinError> {
  let Some((&first, rest)) = values.split_first() else {
    return Ok(Number::Int(0));
  };

  match operation {
    Operation::Add => Ok(
      rest
        .iter()
        .fold(first, |acc, &v| acc.combine(v, i64::checked_add, |a, b| a + b)),
    ),
    Operation::Multiply => Ok(
      rest
        .iter()
        .fold(first, |acc, &v| acc.combine(v, i64::checked_mul, |a, b| a * b)),
    ),
    Operation::Subtract if rest.is_empty() => Ok(Number::Int(0)),
    Operation::Subtract => Ok(
      rest
        .iter()
        .fold(first, |acc, &v| acc.combine(v, i64::checked_sub, |a, b| a - b)),
    ),
    Operation::Divide if rest.is_empty() => Ok(Number::Int(0)),
    Operation::Divide => {
      let mut acc = first.as_f64();
      for v in rest {
        if v.is_zero() {
          return Err(BuiltinError::DivisionByZero);
        }
        acc /= v.as_f64();
      }
      Ok(Number::Float(acc))
    }
  }
}

#[async_trait]
impl Agent for Calculator {
  async fn run(&self, inputs: Mapping, _ctx: &AgentContext) -> Result<Mapping, AgentFailure> {
    let operation = self.operation(&inputs)?;
    let values = resolve_values(&inputs)?;
    let result = calculate(operation, &values)?.into_json()?;

    let mut output = Mapping::new();
    output.insert("result".to_string(), result);
    Ok(output)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn inputs(value: Value) -> Mapping {
    match value {
      Value::Object(map) => map,
      other => panic!("expected object, got {other}"),
    }
  }

  async fn run(calc: Calculator, value: Value) -> Result<Value, AgentFailure> {
    let output = calc
      .run(inputs(value), &AgentContext::detached("test"))
      .await?;
    Ok(output["result"].clone())
  }

  #[tokio::test]
  async fn test_add_and_multiply() {
    assert_eq!(
      run(Calculator::new(Operation::Add), json!({"values": [2, 8]}))
        .await
        .unwrap(),
      json!(10)
    );
    assert_eq!(
      run(
        Calculator::new(Operation::Multiply),
        json!({"values": [2, 1.5]})
      )
      .await
      .unwrap(),
      json!(3.0)
    );
  }

  #[tokio::test]
  async fn test_resolves_upstream_results_by_name() {
    let value = json!({"A": {"result": 10}, "values": ["A", 3]});
    assert_eq!(
      run(Calculator::new(Operation::Multiply), value)
        .await
        .unwrap(),
      json!(30)
    );
  }

  #[tokio::test]
  async fn test_resolves_plain_inputs_by_name() {
    let value = json!({"x": 7, "values": ["x", 2]});
    assert_eq!(
      run(Calculator::new(Operation::Subtract), value)
        .await
        .unwrap(),
      json!(5)
    );
  }

  #[tokio::test]
  async fn test_degenerate_inputs_yield_zero() {
    assert_eq!(
      run(Calculator::new(Operation::Add), json!({})).await.unwrap(),
      json!(0)
    );
    assert_eq!(
      run(Calculator::new(Operation::Divide), json!({"values": [4]}))
        .await
        .unwrap(),
      json!(0)
    );
    assert_eq!(
      run(Calculator::new(Operation::Subtract), json!({"values": [4]}))
        .await
        .unwrap(),
      json!(0)
    );
  }

  #[tokio::test]
  async fn test_divide() {
    assert_eq!(
      run(Calculator::new(Operation::Divide), json!({"values": [9, 2]}))
        .await
        .unwrap(),
      json!(4.5)
    );

    let err = run(Calculator::new(Operation::Divide), json!({"values": [1, 0]}))
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "division by zero");
  }

  #[tokio::test]
  async fn test_dynamic_operation() {
    assert_eq!(
      run(
        Calculator::dynamic(),
        json!({"operation": "subtract", "values": [10, 4, 1]})
      )
      .await
      .unwrap(),
      json!(5)
    );

    let err = run(Calculator::dynamic(), json!({"values": [1]}))
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "missing operation");

    let err = run(
      Calculator::dynamic(),
      json!({"operation": "modulo", "values": [1]}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "unsupported operation: modulo");
  }

  #[tokio::test]
  async fn test_non_numeric_value_fails() {
    let err = run(Calculator::new(Operation::Add), json!({"values": [1, "nope"]}))
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "value at index 1 is not numeric: \"nope\"");

    let err = run(Calculator::new(Operation::Add), json!({"values": 3}))
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "values must be a list");
  }

  #[test]
  fn test_integer_overflow_falls_back_to_float() {
    let result = calculate(
      Operation::Add,
      &[Number::Int(i64::MAX), Number::Int(1)],
    )
    .unwrap();
    assert!(matches!(result, Number::Float(_)));
  }
}
