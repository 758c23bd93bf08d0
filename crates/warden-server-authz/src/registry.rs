// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capability registry.
//!
//! Maps wire-level operations (method + path template) onto canonical
//! `resource:action` capability ids, built from the `x-capability`
//! annotations of a [`Specification`].
//!
//! A [`CapabilityIndex`] is built off to the side and never mutated after
//! construction. [`CapabilityRegistry`] publishes one index at a time behind
//! a lock that is only held long enough to clone or replace an `Arc`, so a
//! reader sees either the previous index or the next one, never a partial
//! build.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::route::{PathTemplate, Route, RouteMatch};
use crate::spec::{PolicySource, Specification};

/// Splits a capability annotation into `(resource, action)`.
///
/// Returns `None` unless the string has exactly two non-empty
/// colon-separated parts. Case is preserved.
pub fn parse_capability(capability: &str) -> Option<(&str, &str)> {
	let (resource, action) = capability.split_once(':')?;
	if resource.is_empty() || action.is_empty() || action.contains(':') {
		return None;
	}
	Some((resource, action))
}

/// One canonical capability and every route that implements it.
///
/// Specification paths are visited in sorted template order, then by method,
/// so `routes`, `operation_ids` and the "first occurrence" that supplies the
/// policy and description follow that order rather than document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityMapping {
	/// `"<resource>:<action>"`.
	pub id: String,
	pub resource: String,
	pub action: String,
	pub routes: Vec<Route>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub policy: Option<PolicySource>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub operation_ids: Vec<String>,
}

impl CapabilityMapping {
	/// Instantiates this capability for a specific target.
	pub fn instantiate(
		&self,
		target_id: Option<&str>,
		target_scope: Option<&str>,
	) -> CapabilityInstance {
		CapabilityInstance {
			resource: self.resource.clone(),
			action: self.action.clone(),
			canonical: self.id.clone(),
			target_id: target_id.map(str::to_string),
			target_scope: target_scope.map(str::to_string),
		}
	}
}

/// A capability applied to a specific target, for audit trails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityInstance {
	pub resource: String,
	pub action: String,
	pub canonical: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target_scope: Option<String>,
}

impl CapabilityInstance {
	/// `resource:action`, `resource:targetId:action` or
	/// `resource:targetId:targetScope:action`.
	///
	/// A scope without a target id is not rendered.
	pub fn qualified_form(&self) -> String {
		match (&self.target_id, &self.target_scope) {
			(Some(id), Some(scope)) => {
				format!("{}:{}:{}:{}", self.resource, id, scope, self.action)
			}
			(Some(id), None) => format!("{}:{}:{}", self.resource, id, self.action),
			(None, _) => format!("{}:{}", self.resource, self.action),
		}
	}
}

impl fmt::Display for CapabilityInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.qualified_form())
	}
}

/// Builds an instance without consulting any registry. Never fails.
pub fn instantiate(
	resource: &str,
	action: &str,
	target_id: Option<&str>,
	target_scope: Option<&str>,
) -> CapabilityInstance {
	CapabilityInstance {
		resource: resource.to_string(),
		action: action.to_string(),
		canonical: format!("{resource}:{action}"),
		target_id: target_id.map(str::to_string),
		target_scope: target_scope.map(str::to_string),
	}
}

/// An annotation that was skipped during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAnnotation {
	pub route: Route,
	pub annotation: String,
	pub reason: String,
}

/// Outcome of building a [`CapabilityIndex`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
	/// Distinct capabilities registered.
	pub capabilities: usize,
	/// Routes mapped to a capability.
	pub routes: usize,
	/// Operations declared without an `x-capability` annotation.
	pub unannotated: usize,
	pub skipped: Vec<SkippedAnnotation>,
	/// Policy references that do not resolve against the specification's
	/// directory. Filled in by the engine.
	pub unresolved_references: Vec<String>,
}

impl BuildReport {
	pub fn is_clean(&self) -> bool {
		self.skipped.is_empty() && self.unresolved_references.is_empty()
	}
}

/// An immutable, fully built capability index.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
	by_id: BTreeMap<String, CapabilityMapping>,
	by_route: HashMap<Route, String>,
	templates: Vec<PathTemplate>,
}

impl CapabilityIndex {
	pub fn empty() -> Self {
		Self::default()
	}

	/// Builds an index from the `x-capability` annotations of a specification.
	pub fn build(spec: &Specification) -> (Self, BuildReport) {
		let mut index = Self::default();
		let mut report = BuildReport::default();

		for (method, path, operation) in spec.operations() {
			let route = Route::new(method, path);
			let Some(annotation) = operation.capability.as_deref() else {
				debug!(route = %route, "operation has no capability annotation");
				report.unannotated += 1;
				continue;
			};

			let Some((resource, action)) = parse_capability(annotation) else {
				warn!(
					route = %route,
					annotation,
					"skipping malformed capability annotation; expected resource:action"
				);
				report.skipped.push(SkippedAnnotation {
					route,
					annotation: annotation.to_string(),
					reason: "expected exactly two non-empty parts separated by ':'".to_string(),
				});
				continue;
			};

			let id = format!("{resource}:{action}");
			let mapping = index
				.by_id
				.entry(id.clone())
				.or_insert_with(|| CapabilityMapping {
					id: id.clone(),
					resource: resource.to_string(),
					action: action.to_string(),
					routes: Vec::new(),
					policy: None,
					description: None,
					operation_ids: Vec::new(),
				});

			// The first occurrence to carry a policy or description wins.
			if mapping.policy.is_none() {
				mapping.policy = operation.policy.clone();
			} else if operation.policy.is_some() && operation.policy != mapping.policy {
				warn!(
					capability = %id,
					route = %route,
					"ignoring conflicting policy on additional route"
				);
			}
			if mapping.description.is_none() {
				mapping.description = operation.display_description().map(str::to_string);
			}
			if let Some(operation_id) = &operation.operation_id {
				mapping.operation_ids.push(operation_id.clone());
			}
			mapping.routes.push(route.clone());

			index.templates.push(PathTemplate::new(route.clone()));
			index.by_route.insert(route, id);
			report.routes += 1;
		}

		report.capabilities = index.by_id.len();
		info!(
			capabilities = report.capabilities,
			routes = report.routes,
			skipped = report.skipped.len(),
			"capability index built"
		);
		(index, report)
	}

	pub fn get_by_id(&self, id: &str) -> Option<&CapabilityMapping> {
		self.by_id.get(id)
	}

	pub fn get_by_resource_action(&self, resource: &str, action: &str) -> Option<&CapabilityMapping> {
		self.get_by_id(&format!("{resource}:{action}"))
	}

	/// Exact lookup by method and path template.
	pub fn get_for_route(&self, method: &Method, path: &str) -> Option<&CapabilityMapping> {
		let id = self.by_route.get(&Route::new(method.clone(), path))?;
		self.by_id.get(id)
	}

	/// Resolves a concrete request path against the registered templates.
	///
	/// An exact template hit wins; otherwise the matching template with the
	/// most literal segments is chosen, ties going to the template that sorts
	/// first.
	pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
		if let Some(id) = self.by_route.get(&Route::new(method.clone(), path)) {
			return Some(RouteMatch {
				capability_id: id.clone(),
				route: Route::new(method.clone(), path),
				params: Vec::new(),
			});
		}

		let mut best: Option<(&PathTemplate, Vec<(String, String)>)> = None;
		for template in &self.templates {
			let Some(params) = template.matches(method, path) else {
				continue;
			};
			let better = match &best {
				Some((current, _)) => template.literals() > current.literals(),
				None => true,
			};
			if better {
				best = Some((template, params));
			}
		}

		let (template, params) = best?;
		let capability_id = self.by_route.get(template.route())?.clone();
		Some(RouteMatch {
			capability_id,
			route: template.route().clone(),
			params,
		})
	}

	/// Distinct resources, sorted.
	pub fn all_resources(&self) -> Vec<&str> {
		let resources: BTreeSet<&str> = self
			.by_id
			.values()
			.map(|mapping| mapping.resource.as_str())
			.collect();
		resources.into_iter().collect()
	}

	/// Actions registered for a resource, sorted.
	pub fn actions_for_resource(&self, resource: &str) -> Vec<&str> {
		let actions: BTreeSet<&str> = self
			.by_id
			.values()
			.filter(|mapping| mapping.resource == resource)
			.map(|mapping| mapping.action.as_str())
			.collect();
		actions.into_iter().collect()
	}

	pub fn exists(&self, resource: &str, action: &str) -> bool {
		self.get_by_resource_action(resource, action).is_some()
	}

	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}

	/// All mappings in id order.
	pub fn mappings(&self) -> impl Iterator<Item = &CapabilityMapping> {
		self.by_id.values()
	}

	/// All `(route, capability id)` pairs of the reverse index.
	pub fn routes(&self) -> impl Iterator<Item = (&Route, &str)> {
		self.by_route.iter().map(|(route, id)| (route, id.as_str()))
	}
}

/// Reloadable handle to the current [`CapabilityIndex`].
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
	index: RwLock<Arc<CapabilityIndex>>,
}

impl CapabilityRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_specification(spec: &Specification) -> (Self, BuildReport) {
		let (index, report) = CapabilityIndex::build(spec);
		(
			Self {
				index: RwLock::new(Arc::new(index)),
			},
			report,
		)
	}

	/// Rebuilds the index from a specification and publishes it atomically.
	pub fn reload(&self, spec: &Specification) -> BuildReport {
		let (index, report) = CapabilityIndex::build(spec);
		*self.index.write() = Arc::new(index);
		report
	}

	/// A consistent view of the current index.
	pub fn snapshot(&self) -> Arc<CapabilityIndex> {
		Arc::clone(&self.index.read())
	}

	pub fn get_by_id(&self, id: &str) -> Option<CapabilityMapping> {
		self.snapshot().get_by_id(id).cloned()
	}

	pub fn get_by_resource_action(&self, resource: &str, action: &str) -> Option<CapabilityMapping> {
		self.snapshot().get_by_resource_action(resource, action).cloned()
	}

	pub fn get_for_route(&self, method: &Method, path: &str) -> Option<CapabilityMapping> {
		self.snapshot().get_for_route(method, path).cloned()
	}

	pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
		self.snapshot().match_route(method, path)
	}

	pub fn all_resources(&self) -> Vec<String> {
		self.snapshot()
			.all_resources()
			.into_iter()
			.map(str::to_string)
			.collect()
	}

	pub fn actions_for_resource(&self, resource: &str) -> Vec<String> {
		self.snapshot()
			.actions_for_resource(resource)
			.into_iter()
			.map(str::to_string)
			.collect()
	}

	pub fn exists(&self, resource: &str, action: &str) -> bool {
		self.snapshot().exists(resource, action)
	}

	pub fn instantiate(
		resource: &str,
		action: &str,
		target_id: Option<&str>,
		target_scope: Option<&str>,
	) -> CapabilityInstance {
		instantiate(resource, action, target_id, target_scope)
	}

	pub fn len(&self) -> usize {
		self.snapshot().len()
	}

	pub fn is_empty(&self) -> bool {
		self.snapshot().is_empty()
	}
}
