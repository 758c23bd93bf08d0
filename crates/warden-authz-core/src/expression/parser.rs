// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use super::ast::{AttributePath, Expr, Literal, LogicalOp, Operand};
use super::lexer::{tokenize, Token};
use crate::context::Namespace;
use crate::error::{ExpressionError, Result};

/// Maximum parenthesis nesting accepted in a single expression.
pub const MAX_NESTING_DEPTH: usize = 32;

pub struct ExpressionParser;

impl ExpressionParser {
	pub fn parse(source: &str) -> Result<Expr> {
		let tokens = tokenize(source)?;
		if tokens.is_empty() {
			return Err(ExpressionError::Empty);
		}

		let mut cursor = Cursor {
			tokens: &tokens,
			pos: 0,
			depth: 0,
		};
		let expr = cursor.parse_or()?;

		match cursor.peek() {
			None => Ok(expr),
			Some(Token::RParen) => Err(ExpressionError::UnbalancedParens),
			Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
		}
	}
}

struct Cursor<'t> {
	tokens: &'t [Token],
	pos: usize,
	depth: usize,
}

impl<'t> Cursor<'t> {
	fn peek(&self) -> Option<&'t Token> {
		self.tokens.get(self.pos)
	}

	fn advance(&mut self) -> Option<&'t Token> {
		let token = self.tokens.get(self.pos)?;
		self.pos += 1;
		Some(token)
	}

	fn eat(&mut self, expected: &Token) -> bool {
		if self.peek() == Some(expected) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn parse_or(&mut self) -> Result<Expr> {
		let mut result = self.parse_and()?;
		while self.eat(&Token::Or) {
			let right = self.parse_and()?;
			result = Expr::Logical {
				op: LogicalOp::Or,
				left: Box::new(result),
				right: Box::new(right),
			};
		}
		Ok(result)
	}

	fn parse_and(&mut self) -> Result<Expr> {
		let mut result = self.parse_comparison()?;
		while self.eat(&Token::And) {
			let right = self.parse_comparison()?;
			result = Expr::Logical {
				op: LogicalOp::And,
				left: Box::new(result),
				right: Box::new(right),
			};
		}
		Ok(result)
	}

	fn parse_comparison(&mut self) -> Result<Expr> {
		let left = self.parse_operand()?;

		let Some(Token::Compare(op)) = self.peek() else {
			return Ok(Expr::Operand(left));
		};
		self.pos += 1;

		let right = self.parse_operand()?;
		Ok(Expr::Compare {
			left,
			op: *op,
			right,
		})
	}

	fn parse_operand(&mut self) -> Result<Operand> {
		let Some(token) = self.advance() else {
			return Err(ExpressionError::UnexpectedEnd);
		};

		match token {
			Token::LParen => {
				self.depth += 1;
				if self.depth > MAX_NESTING_DEPTH {
					return Err(ExpressionError::TooDeep(MAX_NESTING_DEPTH));
				}
				let inner = self.parse_or()?;
				if !self.eat(&Token::RParen) {
					return Err(ExpressionError::UnbalancedParens);
				}
				self.depth -= 1;
				Ok(Operand::Group(Box::new(inner)))
			}
			Token::Str(value) => Ok(Operand::Literal(Literal::String(value.clone()))),
			Token::Number(value) => Ok(Operand::Literal(Literal::Number(*value))),
			Token::Bool(value) => Ok(Operand::Literal(Literal::Bool(*value))),
			Token::Undefined => Ok(Operand::Literal(Literal::Undefined)),
			Token::Path(raw) => parse_attribute_path(raw).map(Operand::Path),
			Token::RParen => Err(ExpressionError::UnbalancedParens),
			other => Err(ExpressionError::UnexpectedToken(other.to_string())),
		}
	}
}

fn parse_attribute_path(raw: &str) -> Result<AttributePath> {
	let mut parts = raw.split('.');
	let head = parts.next().unwrap_or_default();
	let namespace =
		Namespace::parse(head).ok_or_else(|| ExpressionError::UnknownNamespace(head.to_string()))?;

	let segments: Vec<String> = parts.map(str::to_string).collect();
	if segments.is_empty() {
		return Err(ExpressionError::MissingProperty(raw.to_string()));
	}
	if segments.iter().any(String::is_empty) {
		return Err(ExpressionError::UnexpectedToken(format!("'{raw}'")));
	}

	Ok(AttributePath {
		namespace,
		segments,
	})
}
