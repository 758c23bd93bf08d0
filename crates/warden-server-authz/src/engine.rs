// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reloadable authorization decision engine.
//!
//! The engine owns one [`Generation`] at a time: a capability index and a
//! policy directory (with its resolution cache) built from the same
//! specification. Loading a specification builds the next generation off to
//! the side and installs it with a single pointer swap, so the registry and
//! the policy cache always change together and a decision never mixes the
//! two.
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use warden_authz_core::{AttributeContext, Policy, ResourceAttrs, SubjectAttrs};
//! use warden_server_authz::{
//!     AuthzConfig, AuthzEngine, DecisionTarget, Operation, PolicySource, Specification,
//! };
//!
//! let spec = Specification::new()
//!     .with_operation(
//!         Method::GET,
//!         "/users/{id}",
//!         Operation::new()
//!             .capability("user:read")
//!             .policy(PolicySource::reference("#/policies/selfOrAdmin")),
//!     )
//!     .with_policy(
//!         "selfOrAdmin",
//!         Policy::with_roles(["admin"]).rule("subject.id == resource.id"),
//!     );
//!
//! let engine = AuthzEngine::new(AuthzConfig::default());
//! engine.load_specification(&spec);
//!
//! let ctx = AttributeContext::new(SubjectAttrs::new("u1", "user"), ResourceAttrs::new("u1"));
//! let decision = engine
//!     .decide(&DecisionTarget::route(Method::GET, "/users/u1"), &ctx)
//!     .unwrap();
//! assert!(decision.allowed());
//! assert_eq!(decision.qualified_capability().as_deref(), Some("user:u1:read"));
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::Method;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use warden_authz_core::{AttributeContext, EvaluationResult};

use crate::audit::AuthzAuditEntry;
use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::registry::{BuildReport, CapabilityIndex, CapabilityInstance, CapabilityMapping};
use crate::resolver::PolicyDirectory;
use crate::route::Route;
use crate::spec::{PolicySource, Specification};

/// What a decision is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionTarget {
	/// A canonical capability id such as `user:read`.
	Capability(String),
	/// A concrete request.
	Route { method: Method, path: String },
}

impl DecisionTarget {
	pub fn capability(id: impl Into<String>) -> Self {
		DecisionTarget::Capability(id.into())
	}

	pub fn route(method: Method, path: impl Into<String>) -> Self {
		DecisionTarget::Route {
			method,
			path: path.into(),
		}
	}
}

impl fmt::Display for DecisionTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DecisionTarget::Capability(id) => f.write_str(id),
			DecisionTarget::Route { method, path } => write!(f, "{method} {path}"),
		}
	}
}

/// The outcome of [`AuthzEngine::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
	pub target: DecisionTarget,
	pub result: EvaluationResult,
	/// The capability instance, when the target mapped to a registered
	/// capability.
	pub capability: Option<CapabilityInstance>,
	/// The matched route template, for route targets.
	pub route: Option<Route>,
	pub generation: u64,
}

impl Decision {
	pub fn allowed(&self) -> bool {
		self.result.allowed
	}

	pub fn reason(&self) -> &str {
		&self.result.reason
	}

	pub fn qualified_capability(&self) -> Option<String> {
		self.capability.as_ref().map(CapabilityInstance::qualified_form)
	}

	/// Converts a denial into [`AuthzError::AccessDenied`].
	pub fn ensure_allowed(self) -> Result<Self> {
		if self.result.allowed {
			Ok(self)
		} else {
			Err(AuthzError::AccessDenied(self.result.reason))
		}
	}
}

/// One consistent pairing of capability index and policy directory.
#[derive(Debug)]
pub struct Generation {
	sequence: u64,
	loaded_at: DateTime<Utc>,
	capabilities: CapabilityIndex,
	policies: PolicyDirectory,
	report: BuildReport,
}

impl Generation {
	fn build(spec: &Specification, prefix: &str, sequence: u64) -> Self {
		let (capabilities, mut report) = CapabilityIndex::build(spec);
		let policies = PolicyDirectory::new(prefix, spec.policy_directory());

		for mapping in capabilities.mappings() {
			let Some(reference) = mapping.policy.as_ref().and_then(PolicySource::as_reference) else {
				continue;
			};
			if let Err(err) = policies.check_reference(reference) {
				warn!(capability = %mapping.id, error = %err, "capability policy will fail to resolve");
				if !report.unresolved_references.iter().any(|r| r == reference) {
					report.unresolved_references.push(reference.to_string());
				}
			}
		}

		Self {
			sequence,
			loaded_at: Utc::now(),
			capabilities,
			policies,
			report,
		}
	}

	pub fn sequence(&self) -> u64 {
		self.sequence
	}

	pub fn loaded_at(&self) -> DateTime<Utc> {
		self.loaded_at
	}

	pub fn capabilities(&self) -> &CapabilityIndex {
		&self.capabilities
	}

	pub fn policies(&self) -> &PolicyDirectory {
		&self.policies
	}

	pub fn report(&self) -> &BuildReport {
		&self.report
	}
}

/// Shared handle to the decision engine. Cloning is cheap.
#[derive(Clone)]
pub struct AuthzEngine {
	inner: Arc<EngineInner>,
}

struct EngineInner {
	config: AuthzConfig,
	current: RwLock<Option<Arc<Generation>>>,
	/// Last issued generation sequence. Held for the whole build and install
	/// so concurrent loads install in sequence order.
	reload: Mutex<u64>,
}

impl AuthzEngine {
	pub fn new(config: AuthzConfig) -> Self {
		Self {
			inner: Arc::new(EngineInner {
				config,
				current: RwLock::new(None),
				reload: Mutex::new(0),
			}),
		}
	}

	pub fn config(&self) -> &AuthzConfig {
		&self.inner.config
	}

	/// Builds a generation from the specification and installs it.
	///
	/// Concurrent loads are serialized: the load that returns last is the one
	/// left installed, and readers never observe the sequence going backwards.
	#[instrument(level = "debug", skip(self, spec), fields(paths = spec.paths.len()))]
	pub fn load_specification(&self, spec: &Specification) -> BuildReport {
		let mut last = self.inner.reload.lock();
		let sequence = *last + 1;
		let generation = Arc::new(Generation::build(
			spec,
			&self.inner.config.policy_ref_prefix,
			sequence,
		));
		let report = generation.report.clone();
		let policies = generation.policies().len();

		*self.inner.current.write() = Some(generation);
		*last = sequence;
		drop(last);

		info!(
			generation = sequence,
			capabilities = report.capabilities,
			routes = report.routes,
			policies,
			skipped = report.skipped.len(),
			unresolved = report.unresolved_references.len(),
			"authorization specification installed"
		);
		report
	}

	/// Replaces the current specification. Readers holding a snapshot keep
	/// the previous generation until they drop it.
	pub fn reload(&self, spec: &Specification) -> BuildReport {
		debug!("reloading authorization specification");
		self.load_specification(spec)
	}

	/// The current generation, if a specification has been loaded.
	pub fn snapshot(&self) -> Option<Arc<Generation>> {
		self.inner.current.read().as_ref().map(Arc::clone)
	}

	pub fn is_loaded(&self) -> bool {
		self.inner.current.read().is_some()
	}

	/// Decides whether the subject in `context` may perform `target`.
	///
	/// Unregistered targets yield the configured default decision. Policy
	/// references that do not resolve are returned as errors.
	#[instrument(
		level = "debug",
		skip(self, context),
		fields(
			target = %target,
			subject_id = %context.subject.id,
			role = %context.subject.role,
		)
	)]
	pub fn decide(&self, target: &DecisionTarget, context: &AttributeContext) -> Result<Decision> {
		let generation = self.snapshot().ok_or(AuthzError::NotLoaded)?;
		let index = generation.capabilities();

		let (mapping, route, target_id) = match target {
			DecisionTarget::Capability(id) => (index.get_by_id(id), None, None),
			DecisionTarget::Route { method, path } => match index.match_route(method, path) {
				Some(matched) => {
					let target_id = matched.target_id().map(str::to_string);
					(
						index.get_by_id(&matched.capability_id),
						Some(matched.route),
						target_id,
					)
				}
				None => (None, None, None),
			},
		};

		let decision = match mapping {
			Some(mapping) => {
				let result = self.evaluate_mapping(&generation, mapping, context)?;
				Decision {
					target: target.clone(),
					result,
					capability: Some(mapping.instantiate(target_id.as_deref(), None)),
					route,
					generation: generation.sequence,
				}
			}
			None => Decision {
				target: target.clone(),
				result: self.unregistered(target),
				capability: None,
				route: None,
				generation: generation.sequence,
			},
		};

		debug!(
			allowed = decision.allowed(),
			capability = ?decision.qualified_capability(),
			reason = %decision.reason(),
			"authorization decided"
		);
		if self.inner.config.audit_decisions {
			AuthzAuditEntry::from_decision(&decision, context).emit();
		}
		Ok(decision)
	}

	/// Shorthand for a route decision.
	pub fn decide_route(
		&self,
		method: Method,
		path: &str,
		context: &AttributeContext,
	) -> Result<Decision> {
		self.decide(&DecisionTarget::route(method, path), context)
	}

	fn evaluate_mapping(
		&self,
		generation: &Generation,
		mapping: &CapabilityMapping,
		context: &AttributeContext,
	) -> Result<EvaluationResult> {
		match &mapping.policy {
			Some(source) => Ok(generation.policies.resolve(source)?.evaluate(context)),
			None => Ok(EvaluationResult::allow_all()),
		}
	}

	fn unregistered(&self, target: &DecisionTarget) -> EvaluationResult {
		let reason = format!("no capability registered for {target}");
		if self.inner.config.unregistered.allows() {
			EvaluationResult {
				allowed: true,
				reason,
				matched_role: None,
				matched_rule: None,
			}
		} else {
			EvaluationResult::denied(reason)
		}
	}
}

impl fmt::Debug for AuthzEngine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuthzEngine")
			.field("config", &self.inner.config)
			.field("generation", &self.snapshot().map(|g| g.sequence))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::UnregisteredPolicy;
	use crate::spec::Operation;
	use warden_authz_core::{Policy, ResourceAttrs, SubjectAttrs};

	fn spec() -> Specification {
		Specification::new()
			.with_operation(
				Method::GET,
				"/users/{id}",
				Operation::new()
					.capability("user:read")
					.policy(PolicySource::reference("#/policies/selfOrAdmin")),
			)
			.with_operation(
				Method::DELETE,
				"/users/{id}",
				Operation::new()
					.capability("user:delete")
					.policy(Policy::with_roles(["admin"])),
			)
			.with_operation(
				Method::GET,
				"/status",
				Operation::new().capability("status:read"),
			)
			.with_operation(
				Method::POST,
				"/reports",
				Operation::new()
					.capability("report:create")
					.policy(PolicySource::reference("#/policies/missing")),
			)
			.with_policy(
				"selfOrAdmin",
				Policy::with_roles(["admin"]).rule("subject.id == resource.id"),
			)
	}

	fn ctx(subject: &str, role: &str, resource: &str) -> AttributeContext {
		AttributeContext::new(SubjectAttrs::new(subject, role), ResourceAttrs::new(resource))
	}

	fn engine() -> AuthzEngine {
		let engine = AuthzEngine::new(AuthzConfig {
			audit_decisions: false,
			..AuthzConfig::default()
		});
		engine.load_specification(&spec());
		engine
	}

	#[test]
	fn decide_before_load_fails() {
		let engine = AuthzEngine::new(AuthzConfig::default());
		assert!(!engine.is_loaded());
		let err = engine
			.decide(&DecisionTarget::capability("user:read"), &ctx("u1", "admin", "u1"))
			.unwrap_err();
		assert!(matches!(err, AuthzError::NotLoaded));
	}

	#[test]
	fn route_decision_uses_referenced_policy() {
		let engine = engine();

		let own = engine
			.decide_route(Method::GET, "/users/u1", &ctx("u1", "user", "u1"))
			.unwrap();
		assert!(own.allowed());
		assert_eq!(own.result.matched_rule.as_deref(), Some("subject.id == resource.id"));
		assert_eq!(own.qualified_capability().as_deref(), Some("user:u1:read"));
		assert_eq!(own.route, Some(Route::new(Method::GET, "/users/{id}")));

		let other = engine
			.decide_route(Method::GET, "/users/u2", &ctx("u1", "user", "u2"))
			.unwrap();
		assert!(!other.allowed());
		assert!(matches!(
			other.ensure_allowed(),
			Err(AuthzError::AccessDenied(reason)) if reason == "no matching role or rule; subject role was user"
		));
	}

	#[test]
	fn capability_decision_uses_inline_policy() {
		let engine = engine();
		let target = DecisionTarget::capability("user:delete");

		assert!(engine.decide(&target, &ctx("root", "admin", "u1")).unwrap().allowed());
		let denied = engine.decide(&target, &ctx("u1", "user", "u1")).unwrap();
		assert!(!denied.allowed());
		assert_eq!(denied.qualified_capability().as_deref(), Some("user:delete"));
	}

	#[test]
	fn capability_without_policy_allows_all() {
		let decision = engine()
			.decide_route(Method::GET, "/status", &ctx("anon", "guest", "status"))
			.unwrap();
		assert!(decision.allowed());
		assert_eq!(decision.reason(), "policy is empty - allow all");
	}

	#[test]
	fn unresolved_reference_is_an_error() {
		let engine = engine();
		let report = engine.snapshot().unwrap().report().clone();
		assert_eq!(report.unresolved_references, vec!["#/policies/missing".to_string()]);

		let err = engine
			.decide_route(Method::POST, "/reports", &ctx("u1", "admin", "r1"))
			.unwrap_err();
		assert!(matches!(err, AuthzError::PolicyReferenceNotFound(_)));
		assert_eq!(err.status_code(), 500);
	}

	mod unregistered {
		use super::*;

		#[test]
		fn denied_by_default() {
			let decision = engine()
				.decide_route(Method::GET, "/admin/secrets", &ctx("u1", "admin", "x"))
				.unwrap();
			assert!(!decision.allowed());
			assert_eq!(
				decision.reason(),
				"no capability registered for GET /admin/secrets"
			);
			assert!(decision.capability.is_none());
		}

		#[test]
		fn allowed_when_configured() {
			let engine = AuthzEngine::new(AuthzConfig {
				unregistered: UnregisteredPolicy::Allow,
				audit_decisions: false,
				..AuthzConfig::default()
			});
			engine.load_specification(&spec());
			let decision = engine
				.decide(&DecisionTarget::capability("report:export"), &ctx("u1", "user", "x"))
				.unwrap();
			assert!(decision.allowed());
			assert_eq!(decision.reason(), "no capability registered for report:export");
		}
	}

	#[test]
	fn reload_swaps_registry_and_policies_together() {
		let engine = engine();
		let before = engine.snapshot().unwrap();
		engine
			.decide_route(Method::GET, "/users/u1", &ctx("u1", "user", "u1"))
			.unwrap();
		assert_eq!(before.policies().cached_len(), 1);

		let next = Specification::new()
			.with_operation(
				Method::GET,
				"/users/{id}",
				Operation::new()
					.capability("user:read")
					.policy(PolicySource::reference("#/policies/selfOrAdmin")),
			)
			.with_policy("selfOrAdmin", Policy::with_roles(["admin"]));
		engine.reload(&next);

		let after = engine.snapshot().unwrap();
		assert_eq!(after.sequence(), before.sequence() + 1);
		assert_eq!(after.policies().cached_len(), 0);
		assert!(after.capabilities().get_by_id("user:delete").is_none());

		let decision = engine
			.decide_route(Method::GET, "/users/u1", &ctx("u1", "user", "u1"))
			.unwrap();
		assert!(!decision.allowed());
		assert_eq!(decision.generation, after.sequence());
	}
}
