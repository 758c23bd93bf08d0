// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::{Map, Value as JsonValue};

use super::ast::{CompareOp, Expr, Literal, LogicalOp, Operand};
use crate::context::AttributeContext;

/// A normalised runtime value.
///
/// JSON `null` and missing attributes both become [`Value::Undefined`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Undefined,
	Bool(bool),
	Number(f64),
	String(String),
	Array(Vec<JsonValue>),
	Object(Map<String, JsonValue>),
}

impl Value {
	/// Value-for-value equality. Values of different kinds are never equal.
	pub fn loose_eq(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Array(a), Value::Array(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => a == b,
			_ => false,
		}
	}

	/// Numeric coercion used by the ordering operators.
	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
			_ => None,
		}
	}

	pub fn is_true(&self) -> bool {
		matches!(self, Value::Bool(true))
	}
}

impl From<JsonValue> for Value {
	fn from(value: JsonValue) -> Self {
		match value {
			JsonValue::Null => Value::Undefined,
			JsonValue::Bool(b) => Value::Bool(b),
			JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Undefined),
			JsonValue::String(s) => Value::String(s),
			JsonValue::Array(items) => Value::Array(items),
			JsonValue::Object(map) => Value::Object(map),
		}
	}
}

impl From<&Literal> for Value {
	fn from(literal: &Literal) -> Self {
		match literal {
			Literal::String(s) => Value::String(s.clone()),
			Literal::Number(n) => Value::Number(*n),
			Literal::Bool(b) => Value::Bool(*b),
			Literal::Undefined => Value::Undefined,
		}
	}
}

impl CompareOp {
	pub fn apply(&self, left: &Value, right: &Value) -> bool {
		match self {
			CompareOp::Eq => left.loose_eq(right),
			CompareOp::Ne => !left.loose_eq(right),
			CompareOp::Gt => compare_numbers(left, right, |a, b| a > b),
			CompareOp::Lt => compare_numbers(left, right, |a, b| a < b),
			CompareOp::Ge => compare_numbers(left, right, |a, b| a >= b),
			CompareOp::Le => compare_numbers(left, right, |a, b| a <= b),
		}
	}
}

/// Both sides must coerce to numbers; anything else compares as false.
fn compare_numbers<F>(left: &Value, right: &Value, cmp: F) -> bool
where
	F: Fn(f64, f64) -> bool,
{
	match (left.as_number(), right.as_number()) {
		(Some(a), Some(b)) => cmp(a, b),
		_ => false,
	}
}

impl Operand {
	pub fn resolve(&self, context: &AttributeContext) -> Value {
		match self {
			Operand::Literal(literal) => Value::from(literal),
			Operand::Path(path) => context
				.lookup(path.namespace, &path.segments)
				.map(Value::from)
				.unwrap_or(Value::Undefined),
			// A parenthesised bare operand keeps its value: `(subject.id) == 'u1'`.
			Operand::Group(expr) => match expr.as_ref() {
				Expr::Operand(inner) => inner.resolve(context),
				_ => Value::Bool(expr.evaluate(context)),
			},
		}
	}
}

impl Expr {
	pub fn evaluate(&self, context: &AttributeContext) -> bool {
		match self {
			Expr::Compare { left, op, right } => {
				op.apply(&left.resolve(context), &right.resolve(context))
			}
			Expr::Logical { op, left, right } => {
				let left_result = left.evaluate(context);
				match op {
					LogicalOp::And => left_result && right.evaluate(context),
					LogicalOp::Or => left_result || right.evaluate(context),
				}
			}
			Expr::Operand(operand) => operand.resolve(context).is_true(),
		}
	}
}
