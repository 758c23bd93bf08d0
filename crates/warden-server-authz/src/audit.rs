// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit records for authorization decisions.
//!
//! Entries are emitted as structured events on the [`AUDIT_TARGET`] tracing
//! target so an audit sink can subscribe to them separately from diagnostic
//! logs. The engine never persists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use warden_authz_core::AttributeContext;

use crate::engine::Decision;

/// Tracing target for decision audit events.
pub const AUDIT_TARGET: &str = "warden_authz::audit";

/// One authorization decision, as recorded for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzAuditEntry {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub subject_id: String,
	pub subject_role: String,
	/// What was asked for: a capability id or `METHOD /path`.
	pub target: String,
	/// Qualified form of the capability instance, when one was registered.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub capability: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub canonical: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub route: Option<String>,
	pub allowed: bool,
	pub reason: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub matched_role: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub matched_rule: Option<String>,
	/// Specification generation the decision was made against.
	pub generation: u64,
}

impl AuthzAuditEntry {
	pub fn from_decision(decision: &Decision, context: &AttributeContext) -> Self {
		Self {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			subject_id: context.subject.id.clone(),
			subject_role: context.subject.role.clone(),
			target: decision.target.to_string(),
			capability: decision
				.capability
				.as_ref()
				.map(|instance| instance.qualified_form()),
			canonical: decision
				.capability
				.as_ref()
				.map(|instance| instance.canonical.clone()),
			route: decision.route.as_ref().map(ToString::to_string),
			allowed: decision.result.allowed,
			reason: decision.result.reason.clone(),
			matched_role: decision.result.matched_role.clone(),
			matched_rule: decision.result.matched_rule.clone(),
			generation: decision.generation,
		}
	}

	/// Emits this entry on the audit target: `info` for grants, `warn` for
	/// denials.
	pub fn emit(&self) {
		if self.allowed {
			info!(
				target: AUDIT_TARGET,
				audit_id = %self.id,
				subject_id = %self.subject_id,
				subject_role = %self.subject_role,
				target_name = %self.target,
				capability = ?self.capability,
				route = ?self.route,
				matched_role = ?self.matched_role,
				matched_rule = ?self.matched_rule,
				generation = self.generation,
				"access granted"
			);
		} else {
			warn!(
				target: AUDIT_TARGET,
				audit_id = %self.id,
				subject_id = %self.subject_id,
				subject_role = %self.subject_role,
				target_name = %self.target,
				capability = ?self.capability,
				route = ?self.route,
				reason = %self.reason,
				generation = self.generation,
				"access denied"
			);
		}
	}
}
