// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Expression error types.

use thiserror::Error;

/// Errors raised while tokenizing or parsing a rule expression.
///
/// These never leave the evaluator: a rule that fails to parse evaluates to
/// `false`. They are kept as values so compiled policies can report which of
/// their rules are malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
	#[error("expression is empty")]
	Empty,

	#[error("unexpected character {found:?} at offset {offset}")]
	UnexpectedCharacter { offset: usize, found: char },

	#[error("unterminated string literal starting at offset {0}")]
	UnterminatedString(usize),

	#[error("unexpected token {0}")]
	UnexpectedToken(String),

	#[error("unexpected end of expression")]
	UnexpectedEnd,

	#[error("unbalanced parentheses")]
	UnbalancedParens,

	#[error("unknown attribute namespace '{0}'")]
	UnknownNamespace(String),

	#[error("attribute path '{0}' names a namespace without a property")]
	MissingProperty(String),

	#[error("expression nesting exceeds {0} levels")]
	TooDeep(usize),
}

pub type Result<T> = std::result::Result<T, ExpressionError>;
