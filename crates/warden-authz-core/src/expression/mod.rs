// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule expression language for ABAC policies.
//!
//! Rules are small boolean expressions over the `subject`, `resource` and
//! `environment` namespaces of an [`AttributeContext`]:
//!
//! ```text
//! subject.id == resource.ownerId
//! subject.role == "manager" and subject.department == resource.department
//! (environment.timeOfDay >= 9 && environment.timeOfDay < 17) || subject.role == 'oncall'
//! ```
//!
//! Expressions are tokenized, parsed by recursive descent into an [`Expr`] tree
//! and evaluated by walking that tree. Rule text is never executed as code.
//!
//! Evaluation is fail-closed per rule: [`evaluate`] returns `false` for an
//! expression that does not parse and logs the parse error.

pub mod ast;
pub mod eval;
mod lexer;
pub mod parser;

pub use ast::{AttributePath, CompareOp, Expr, Literal, LogicalOp, Operand};
pub use eval::Value;
pub use parser::{ExpressionParser, MAX_NESTING_DEPTH};

use tracing::warn;

use crate::context::AttributeContext;
use crate::error::Result;

/// Parses an expression into its syntax tree.
pub fn parse(source: &str) -> Result<Expr> {
	ExpressionParser::parse(source)
}

/// Parses and evaluates an expression in one step.
///
/// A malformed expression evaluates to `false`.
pub fn evaluate(source: &str, context: &AttributeContext) -> bool {
	match parse(source) {
		Ok(expr) => expr.evaluate(context),
		Err(err) => {
			warn!(expression = %source, error = %err, "malformed rule expression evaluates to false");
			false
		}
	}
}
