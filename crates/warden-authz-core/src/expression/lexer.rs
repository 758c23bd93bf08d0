// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, opt};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use super::ast::CompareOp;
use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
	/// A bare word that is not a keyword, e.g. `subject.role`.
	Path(String),
	Str(String),
	Number(f64),
	Bool(bool),
	Undefined,
	And,
	Or,
	Compare(CompareOp),
	LParen,
	RParen,
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Token::Path(path) => write!(f, "'{path}'"),
			Token::Str(value) => write!(f, "{value:?}"),
			Token::Number(value) => write!(f, "{value}"),
			Token::Bool(value) => write!(f, "{value}"),
			Token::Undefined => f.write_str("undefined"),
			Token::And => f.write_str("and"),
			Token::Or => f.write_str("or"),
			Token::Compare(op) => f.write_str(op.symbol()),
			Token::LParen => f.write_str("("),
			Token::RParen => f.write_str(")"),
		}
	}
}

/// Splits an expression into tokens.
///
/// Keywords are only recognised as whole words, so `subject.name == "Andrea"`
/// never sees an `and` inside the literal or an `or` inside `subject.order`.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
	let mut input = source;
	let mut tokens = Vec::new();

	loop {
		let _: Result<&str, ContextError> = multispace0.parse_next(&mut input);
		if input.is_empty() {
			return Ok(tokens);
		}

		let offset = source.len() - input.len();
		let token: Result<Token, ContextError> = lex_token.parse_next(&mut input);
		match token {
			Ok(token) => tokens.push(token),
			Err(_) => {
				let found = source[offset..].chars().next().unwrap_or_default();
				return Err(if found == '"' || found == '\'' {
					ExpressionError::UnterminatedString(offset)
				} else {
					ExpressionError::UnexpectedCharacter { offset, found }
				});
			}
		}
	}
}

fn lex_token(input: &mut &str) -> Result<Token, ContextError> {
	alt((lex_string, lex_number, lex_word, lex_symbol)).parse_next(input)
}

fn lex_string(input: &mut &str) -> Result<Token, ContextError> {
	let quote: Result<char, ContextError> = one_of(['"', '\'']).parse_next(input);
	let quote = quote?;

	let mut value = String::new();
	loop {
		let next: Result<char, ContextError> = any.parse_next(input);
		match next? {
			c if c == quote => return Ok(Token::Str(value)),
			'\\' => {
				let escaped: Result<char, ContextError> = any.parse_next(input);
				value.push(match escaped? {
					'n' => '\n',
					't' => '\t',
					other => other,
				});
			}
			c => value.push(c),
		}
	}
}

fn lex_number(input: &mut &str) -> Result<Token, ContextError> {
	(opt(one_of(['-', '+'])), digit1, opt(('.', digit1)))
		.take()
		.try_map(|text: &str| text.parse::<f64>().map(Token::Number))
		.parse_next(input)
}

fn lex_word(input: &mut &str) -> Result<Token, ContextError> {
	(
		one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
		take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
	)
		.take()
		.map(classify_word)
		.parse_next(input)
}

fn lex_symbol(input: &mut &str) -> Result<Token, ContextError> {
	alt((
		"===".value(Token::Compare(CompareOp::Eq)),
		"!==".value(Token::Compare(CompareOp::Ne)),
		"==".value(Token::Compare(CompareOp::Eq)),
		"!=".value(Token::Compare(CompareOp::Ne)),
		">=".value(Token::Compare(CompareOp::Ge)),
		"<=".value(Token::Compare(CompareOp::Le)),
		">".value(Token::Compare(CompareOp::Gt)),
		"<".value(Token::Compare(CompareOp::Lt)),
		"&&".value(Token::And),
		"||".value(Token::Or),
		'('.value(Token::LParen),
		')'.value(Token::RParen),
	))
	.parse_next(input)
}

fn classify_word(word: &str) -> Token {
	if word.eq_ignore_ascii_case("and") {
		return Token::And;
	}
	if word.eq_ignore_ascii_case("or") {
		return Token::Or;
	}
	match word {
		"true" => Token::Bool(true),
		"false" => Token::Bool(false),
		"undefined" | "null" => Token::Undefined,
		_ => Token::Path(word.to_string()),
	}
}
