// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy store and reference resolution.
//!
//! A [`PolicyDirectory`] is one immutable generation of named policies plus
//! the memo of references already resolved against it. The cache is owned by
//! the directory, so replacing the directory drops every cached entry in the
//! same step and a stale policy can never be served against a newer
//! specification.
//!
//! [`PolicyResolver`] is the long-lived handle: it swaps whole directories on
//! [`PolicyResolver::set_spec`] and hands out snapshots to readers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, instrument};
use warden_authz_core::{CompiledPolicy, Policy};

use crate::error::{AuthzError, Result};
use crate::spec::PolicySource;

/// Default prefix for references into the named-policy directory.
pub const DEFAULT_POLICY_REF_PREFIX: &str = "#/policies/";

/// Extracts the policy name from a reference, or `None` if the reference
/// does not have the shape `<prefix><name>` with a single non-empty segment.
pub fn reference_name<'a>(prefix: &str, reference: &'a str) -> Option<&'a str> {
	let name = reference.strip_prefix(prefix)?;
	if name.is_empty() || name.contains('/') {
		return None;
	}
	Some(name)
}

/// One generation of named policies with its resolution cache.
#[derive(Debug)]
pub struct PolicyDirectory {
	prefix: String,
	policies: HashMap<String, Policy>,
	cache: RwLock<HashMap<String, Arc<CompiledPolicy>>>,
}

impl PolicyDirectory {
	pub fn new<I>(prefix: impl Into<String>, policies: I) -> Self
	where
		I: IntoIterator<Item = (String, Policy)>,
	{
		Self {
			prefix: prefix.into(),
			policies: policies.into_iter().collect(),
			cache: RwLock::new(HashMap::new()),
		}
	}

	pub fn empty(prefix: impl Into<String>) -> Self {
		Self::new(prefix, std::iter::empty())
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	pub fn get(&self, name: &str) -> Option<&Policy> {
		self.policies.get(name)
	}

	pub fn len(&self) -> usize {
		self.policies.len()
	}

	pub fn is_empty(&self) -> bool {
		self.policies.is_empty()
	}

	/// Policy names, sorted.
	pub fn policy_names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	/// Number of references memoised so far.
	pub fn cached_len(&self) -> usize {
		self.cache.read().len()
	}

	/// Turns a policy-or-reference into a compiled policy.
	///
	/// Inline policies are compiled on every call and never cached.
	pub fn resolve(&self, source: &PolicySource) -> Result<Arc<CompiledPolicy>> {
		match source {
			PolicySource::Reference(reference) => self.resolve_reference(reference),
			PolicySource::Inline(policy) => Ok(Arc::new(CompiledPolicy::compile(policy))),
		}
	}

	#[instrument(level = "debug", skip(self))]
	pub fn resolve_reference(&self, reference: &str) -> Result<Arc<CompiledPolicy>> {
		if let Some(hit) = self.cache.read().get(reference) {
			return Ok(Arc::clone(hit));
		}

		let Some(name) = reference_name(&self.prefix, reference) else {
			error!(reference, prefix = %self.prefix, "malformed policy reference");
			return Err(AuthzError::InvalidPolicyReference(reference.to_string()));
		};
		let Some(policy) = self.policies.get(name) else {
			error!(reference, name, "policy reference does not resolve");
			return Err(AuthzError::PolicyReferenceNotFound(reference.to_string()));
		};

		let compiled = Arc::new(CompiledPolicy::compile(policy));
		let mut cache = self.cache.write();
		let entry = cache
			.entry(reference.to_string())
			.or_insert_with(|| compiled);
		debug!(reference, name, "policy reference resolved");
		Ok(Arc::clone(entry))
	}

	/// Checks that a reference would resolve, without compiling or caching it.
	pub fn check_reference(&self, reference: &str) -> Result<()> {
		let name = reference_name(&self.prefix, reference)
			.ok_or_else(|| AuthzError::InvalidPolicyReference(reference.to_string()))?;
		if self.policies.contains_key(name) {
			Ok(())
		} else {
			Err(AuthzError::PolicyReferenceNotFound(reference.to_string()))
		}
	}
}

/// Reloadable policy store.
#[derive(Debug)]
pub struct PolicyResolver {
	prefix: String,
	directory: RwLock<Arc<PolicyDirectory>>,
}

impl PolicyResolver {
	pub fn new(prefix: impl Into<String>) -> Self {
		let prefix = prefix.into();
		Self {
			directory: RwLock::new(Arc::new(PolicyDirectory::empty(prefix.clone()))),
			prefix,
		}
	}

	/// Replaces the named-policy directory and discards every cached
	/// resolution in one step.
	pub fn set_spec(&self, policies: BTreeMap<String, Policy>) {
		let next = Arc::new(PolicyDirectory::new(self.prefix.clone(), policies));
		let count = next.len();
		*self.directory.write() = next;
		debug!(policies = count, "policy directory replaced");
	}

	/// The current directory. Resolutions through the snapshot keep working
	/// against it even if a newer one is installed meanwhile.
	pub fn directory(&self) -> Arc<PolicyDirectory> {
		Arc::clone(&self.directory.read())
	}

	pub fn resolve(&self, source: &PolicySource) -> Result<Arc<CompiledPolicy>> {
		self.directory().resolve(source)
	}

	pub fn resolve_reference(&self, reference: &str) -> Result<Arc<CompiledPolicy>> {
		self.directory().resolve_reference(reference)
	}

	pub fn cached_len(&self) -> usize {
		self.directory().cached_len()
	}

	pub fn policy_names(&self) -> Vec<String> {
		self.directory()
			.policy_names()
			.into_iter()
			.map(str::to_string)
			.collect()
	}
}

impl Default for PolicyResolver {
	fn default() -> Self {
		Self::new(DEFAULT_POLICY_REF_PREFIX)
	}
}
