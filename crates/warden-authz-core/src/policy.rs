// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RBAC/ABAC policy model and evaluation.
//!
//! A [`Policy`] grants access when either:
//!
//! 1. **RBAC**: the subject's role is one of `roles`, or
//! 2. **ABAC**: one of `rules` evaluates to true against the [`AttributeContext`].
//!
//! RBAC is always checked first. When both paths would grant access the result
//! reports the matched role and leaves the matched rule unset. Among rules the
//! first match wins and later rules are not evaluated.
//!
//! A policy with no roles and no rules is the explicit "allow all" sentinel.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::context::AttributeContext;
use crate::error::ExpressionError;
use crate::expression::{self, Expr};

/// A decision rule set as declared in a specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
	/// Roles granted access outright (RBAC allow-list).
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub roles: Vec<String>,

	/// Raw ABAC expressions, evaluated in order.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub rules: Vec<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl Policy {
	/// The "allow all" sentinel.
	pub fn allow_all() -> Self {
		Self::default()
	}

	/// Creates a policy from an RBAC allow-list.
	pub fn with_roles<I, S>(roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut policy = Self::default();
		for role in roles {
			policy = policy.role(role);
		}
		policy
	}

	/// Builder: add a role, ignoring duplicates.
	pub fn role(mut self, role: impl Into<String>) -> Self {
		let role = role.into();
		if !self.roles.contains(&role) {
			self.roles.push(role);
		}
		self
	}

	/// Builder: append an ABAC rule.
	pub fn rule(mut self, rule: impl Into<String>) -> Self {
		self.rules.push(rule.into());
		self
	}

	/// Builder: set description.
	pub fn describe(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn is_allow_all(&self) -> bool {
		self.roles.is_empty() && self.rules.is_empty()
	}
}

/// Output of one policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
	pub allowed: bool,
	pub reason: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub matched_role: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub matched_rule: Option<String>,
}

impl EvaluationResult {
	pub fn allow_all() -> Self {
		Self {
			allowed: true,
			reason: "policy is empty - allow all".to_string(),
			matched_role: None,
			matched_rule: None,
		}
	}

	pub fn role_matched(role: &str) -> Self {
		Self {
			allowed: true,
			reason: format!("{role} is in allowed roles"),
			matched_role: Some(role.to_string()),
			matched_rule: None,
		}
	}

	pub fn rule_matched(rule: &str) -> Self {
		Self {
			allowed: true,
			reason: format!("rule matched: {rule}"),
			matched_role: None,
			matched_rule: Some(rule.to_string()),
		}
	}

	pub fn no_match(role: &str) -> Self {
		Self {
			allowed: false,
			reason: format!("no matching role or rule; subject role was {role}"),
			matched_role: None,
			matched_rule: None,
		}
	}

	/// A denial with a caller-supplied reason.
	pub fn denied(reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			reason: reason.into(),
			matched_role: None,
			matched_rule: None,
		}
	}

	pub fn is_allowed(&self) -> bool {
		self.allowed
	}
}

/// An ABAC rule parsed once, ahead of evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
	source: String,
	parsed: Result<Expr, ExpressionError>,
}

impl CompiledRule {
	pub fn compile(source: impl Into<String>) -> Self {
		let source = source.into();
		let parsed = expression::parse(&source);
		if let Err(err) = &parsed {
			warn!(rule = %source, error = %err, "malformed policy rule will never match");
		}
		Self { source, parsed }
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// The parse error, if this rule is malformed.
	pub fn error(&self) -> Option<&ExpressionError> {
		self.parsed.as_ref().err()
	}

	pub fn matches(&self, context: &AttributeContext) -> bool {
		match &self.parsed {
			Ok(expr) => expr.evaluate(context),
			Err(err) => {
				debug!(rule = %self.source, error = %err, "skipping malformed rule");
				false
			}
		}
	}
}

/// A policy prepared for repeated evaluation.
///
/// Roles are held in a hash set so the RBAC check is O(1) regardless of the
/// allow-list length, and every rule is parsed exactly once.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
	policy: Policy,
	roles: HashSet<String>,
	rules: Vec<CompiledRule>,
}

impl CompiledPolicy {
	pub fn compile(policy: &Policy) -> Self {
		Self {
			policy: policy.clone(),
			roles: policy.roles.iter().cloned().collect(),
			rules: policy.rules.iter().map(CompiledRule::compile).collect(),
		}
	}

	pub fn policy(&self) -> &Policy {
		&self.policy
	}

	pub fn rules(&self) -> &[CompiledRule] {
		&self.rules
	}

	/// Rules that failed to parse and therefore never match.
	pub fn malformed_rules(&self) -> impl Iterator<Item = &CompiledRule> {
		self.rules.iter().filter(|rule| rule.error().is_some())
	}

	#[instrument(
		level = "debug",
		skip(self, context),
		fields(
			subject_id = %context.subject.id,
			role = %context.subject.role,
		)
	)]
	pub fn evaluate(&self, context: &AttributeContext) -> EvaluationResult {
		let result = self.decide(context);
		debug!(
			allowed = result.allowed,
			matched_role = ?result.matched_role,
			matched_rule = ?result.matched_rule,
			"policy evaluated"
		);
		result
	}

	fn decide(&self, context: &AttributeContext) -> EvaluationResult {
		if self.roles.is_empty() && self.rules.is_empty() {
			return EvaluationResult::allow_all();
		}

		let role = context.subject.role.as_str();
		if self.roles.contains(role) {
			return EvaluationResult::role_matched(role);
		}

		if let Some(rule) = self.rules.iter().find(|rule| rule.matches(context)) {
			return EvaluationResult::rule_matched(rule.source());
		}

		EvaluationResult::no_match(role)
	}
}

impl From<&Policy> for CompiledPolicy {
	fn from(policy: &Policy) -> Self {
		Self::compile(policy)
	}
}

/// Evaluates an optional policy against a context.
///
/// An absent policy behaves like the allow-all sentinel.
pub fn evaluate_policy(policy: Option<&Policy>, context: &AttributeContext) -> EvaluationResult {
	match policy {
		Some(policy) => CompiledPolicy::compile(policy).evaluate(context),
		None => EvaluationResult::allow_all(),
	}
}
