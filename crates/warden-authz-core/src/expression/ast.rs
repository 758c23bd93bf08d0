// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use crate::context::Namespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Eq,
	Ne,
	Gt,
	Lt,
	Ge,
	Le,
}

impl CompareOp {
	pub fn symbol(&self) -> &'static str {
		match self {
			CompareOp::Eq => "==",
			CompareOp::Ne => "!=",
			CompareOp::Gt => ">",
			CompareOp::Lt => "<",
			CompareOp::Ge => ">=",
			CompareOp::Le => "<=",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
	And,
	Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
	String(String),
	Number(f64),
	Bool(bool),
	Undefined,
}

/// A dotted attribute reference such as `resource.ownerId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
	pub namespace: Namespace,
	pub segments: Vec<String>,
}

impl fmt::Display for AttributePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.namespace)?;
		for segment in &self.segments {
			write!(f, ".{segment}")?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
	Literal(Literal),
	Path(AttributePath),
	/// Parenthesised expression. Around a bare operand it yields that
	/// operand's value rather than a boolean.
	Group(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Compare {
		left: Operand,
		op: CompareOp,
		right: Operand,
	},
	Logical {
		op: LogicalOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	/// A lone operand; true only when it resolves to boolean `true`.
	Operand(Operand),
}
