// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serde model of the authorization specification document.
//!
//! The document is an OpenAPI-shaped object. Only the parts the engine reads
//! are modelled:
//!
//! ```json
//! {
//!   "paths": {
//!     "/users/{id}": {
//!       "get": {
//!         "operationId": "getUser",
//!         "x-capability": "user:read",
//!         "x-policy": "#/policies/ownerOrAdmin"
//!       }
//!     }
//!   },
//!   "policies": {
//!     "ownerOrAdmin": { "roles": ["admin"], "rules": ["subject.id == resource.id"] }
//!   }
//! }
//! ```
//!
//! Named policies may also live under `components.policies`; top-level
//! `policies` win on a name clash. Keys of a path item that are not HTTP
//! methods (`parameters`, `summary`, ...) are ignored.

use std::collections::BTreeMap;

use http::Method;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use warden_authz_core::Policy;

use crate::error::Result;

/// Method keys recognised inside a path item.
const HTTP_METHODS: [&str; 8] = [
	"get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Either an inline policy or a reference into the named-policy directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
	/// A reference such as `#/policies/ownerOrAdmin`.
	Reference(String),
	Inline(Policy),
}

impl PolicySource {
	pub fn reference(reference: impl Into<String>) -> Self {
		PolicySource::Reference(reference.into())
	}

	pub fn as_reference(&self) -> Option<&str> {
		match self {
			PolicySource::Reference(reference) => Some(reference),
			PolicySource::Inline(_) => None,
		}
	}
}

impl From<Policy> for PolicySource {
	fn from(policy: Policy) -> Self {
		PolicySource::Inline(policy)
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPolicySource {
	Reference(String),
	RefObject {
		#[serde(rename = "$ref")]
		reference: String,
	},
	Inline(InlinePolicy),
}

/// Inline policies reject unknown keys so that a broken `$ref` object is an
/// error instead of an empty allow-all policy.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct InlinePolicy {
	#[serde(default)]
	roles: Vec<String>,
	#[serde(default)]
	rules: Vec<String>,
	#[serde(default)]
	description: Option<String>,
}

impl<'de> Deserialize<'de> for PolicySource {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = RawPolicySource::deserialize(deserializer).map_err(|_| {
			de::Error::custom("expected a policy reference string, a {\"$ref\": ...} object or an inline policy")
		})?;

		Ok(match raw {
			RawPolicySource::Reference(reference) => PolicySource::Reference(reference),
			RawPolicySource::RefObject { reference } => PolicySource::Reference(reference),
			RawPolicySource::Inline(inline) => PolicySource::Inline(Policy {
				roles: inline.roles,
				rules: inline.rules,
				description: inline.description,
			}),
		})
	}
}

impl Serialize for PolicySource {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self {
			PolicySource::Reference(reference) => {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry("$ref", reference)?;
				map.end()
			}
			PolicySource::Inline(policy) => policy.serialize(serializer),
		}
	}
}

/// One declared operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub operation_id: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub summary: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,

	/// Canonical `resource:action` annotation.
	#[serde(default, rename = "x-capability", skip_serializing_if = "Option::is_none")]
	pub capability: Option<String>,

	#[serde(default, rename = "x-policy", skip_serializing_if = "Option::is_none")]
	pub policy: Option<PolicySource>,
}

impl Operation {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: set the `x-capability` annotation.
	pub fn capability(mut self, capability: impl Into<String>) -> Self {
		self.capability = Some(capability.into());
		self
	}

	/// Builder: set the `x-policy` annotation.
	pub fn policy(mut self, policy: impl Into<PolicySource>) -> Self {
		self.policy = Some(policy.into());
		self
	}

	/// Builder: set the operation id.
	pub fn id(mut self, operation_id: impl Into<String>) -> Self {
		self.operation_id = Some(operation_id.into());
		self
	}

	/// Builder: set the description.
	pub fn describe(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	/// Description, falling back to the summary.
	pub fn display_description(&self) -> Option<&str> {
		self.description.as_deref().or(self.summary.as_deref())
	}
}

/// The operations declared under one path template, keyed by method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathItem {
	operations: BTreeMap<String, Operation>,
}

impl PathItem {
	pub fn operations(&self) -> impl Iterator<Item = (Method, &Operation)> {
		self.operations.iter().filter_map(|(key, operation)| {
			Method::from_bytes(key.to_ascii_uppercase().as_bytes())
				.ok()
				.map(|method| (method, operation))
		})
	}

	pub fn insert(&mut self, method: Method, operation: Operation) {
		self.operations
			.insert(method.as_str().to_ascii_lowercase(), operation);
	}

	pub fn is_empty(&self) -> bool {
		self.operations.is_empty()
	}
}

impl<'de> Deserialize<'de> for PathItem {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = BTreeMap::<String, JsonValue>::deserialize(deserializer)?;
		let mut operations = BTreeMap::new();
		for (key, value) in raw {
			let method = key.to_ascii_lowercase();
			if !HTTP_METHODS.contains(&method.as_str()) {
				continue;
			}
			let operation: Operation = serde_json::from_value(value)
				.map_err(|e| de::Error::custom(format!("operation '{key}': {e}")))?;
			operations.insert(method, operation);
		}
		Ok(Self { operations })
	}
}

impl Serialize for PathItem {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.operations.serialize(serializer)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub policies: BTreeMap<String, Policy>,
}

/// A complete authorization specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specification {
	/// Path templates, iterated in sorted order.
	#[serde(default)]
	pub paths: BTreeMap<String, PathItem>,

	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub policies: BTreeMap<String, Policy>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub components: Option<Components>,
}

impl Specification {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_json_str(source: &str) -> Result<Self> {
		Ok(serde_json::from_str(source)?)
	}

	pub fn from_json_value(value: JsonValue) -> Result<Self> {
		Ok(serde_json::from_value(value)?)
	}

	/// Builder: declare an operation.
	pub fn with_operation(
		mut self,
		method: Method,
		path: impl Into<String>,
		operation: Operation,
	) -> Self {
		self.paths
			.entry(path.into())
			.or_default()
			.insert(method, operation);
		self
	}

	/// Builder: add a named policy.
	pub fn with_policy(mut self, name: impl Into<String>, policy: Policy) -> Self {
		self.policies.insert(name.into(), policy);
		self
	}

	/// Every declared operation as `(method, path template, operation)`.
	pub fn operations(&self) -> impl Iterator<Item = (Method, &str, &Operation)> {
		self.paths.iter().flat_map(|(path, item)| {
			item.operations()
				.map(move |(method, operation)| (method, path.as_str(), operation))
		})
	}

	/// The named-policy directory, merged from `components.policies` and
	/// top-level `policies`.
	pub fn policy_directory(&self) -> BTreeMap<String, Policy> {
		let mut directory = self
			.components
			.as_ref()
			.map(|components| components.policies.clone())
			.unwrap_or_default();
		directory.extend(
			self.policies
				.iter()
				.map(|(name, policy)| (name.clone(), policy.clone())),
		);
		directory
	}
}
