// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute context for policy evaluation.
//!
//! An [`AttributeContext`] carries three read-only namespaces:
//!
//! - [`SubjectAttrs`]: who is making the request (id, canonical role, department, permissions)
//! - [`ResourceAttrs`]: what is being accessed (id, owner, type, department)
//! - [`EnvironmentAttrs`]: ambient request facts (ip, timestamp, hour of day)
//!
//! Each namespace is a small struct of well-known fields plus an open extension
//! map. Attribute lookups consult the fixed fields first and fall back to the
//! extension map, so rules can reference arbitrary extra attributes without the
//! engine knowing about them up front.
//!
//! Contexts are assembled by the caller (the dispatch layer) and are never
//! mutated by evaluation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Open string-keyed attribute map attached to every namespace.
pub type Extensions = BTreeMap<String, JsonValue>;

/// The three attribute namespaces an expression may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
	Subject,
	Resource,
	Environment,
}

impl Namespace {
	/// Parses a namespace from the leading segment of an attribute path.
	pub fn parse(name: &str) -> Option<Self> {
		match name {
			"subject" => Some(Namespace::Subject),
			"resource" => Some(Namespace::Resource),
			"environment" => Some(Namespace::Environment),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Namespace::Subject => "subject",
			Namespace::Resource => "resource",
			Namespace::Environment => "environment",
		}
	}
}

impl fmt::Display for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Attributes describing the subject (principal) requesting access.
///
/// `role` is the single canonical role string for this call. Callers holding a
/// multi-role principal collapse it before building the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttrs {
	pub id: String,
	pub role: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub department: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub permissions: Vec<String>,
	#[serde(flatten)]
	pub extra: Extensions,
}

impl SubjectAttrs {
	/// Creates a subject with the given id and role and no other attributes.
	pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			role: role.into(),
			department: None,
			permissions: Vec::new(),
			extra: Extensions::new(),
		}
	}

	/// Builder: set department.
	pub fn with_department(mut self, department: impl Into<String>) -> Self {
		self.department = Some(department.into());
		self
	}

	/// Builder: add a permission.
	pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
		self.permissions.push(permission.into());
		self
	}

	/// Builder: set an extension attribute.
	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.extra.insert(name.into(), value.into());
		self
	}

	/// Looks up a single attribute by property name.
	pub fn attribute(&self, name: &str) -> Option<JsonValue> {
		let fixed = match name {
			"id" => Some(JsonValue::from(self.id.as_str())),
			"role" => Some(JsonValue::from(self.role.as_str())),
			"department" => self.department.as_deref().map(JsonValue::from),
			"permissions" if !self.permissions.is_empty() => {
				Some(JsonValue::from(self.permissions.clone()))
			}
			_ => None,
		};
		fixed.or_else(|| self.extra.get(name).cloned())
	}
}

/// Attributes describing the resource being accessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttrs {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub owner_id: Option<String>,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub resource_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub department: Option<String>,
	#[serde(flatten)]
	pub extra: Extensions,
}

impl ResourceAttrs {
	/// Creates a resource with the given id and no other attributes.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			owner_id: None,
			resource_type: None,
			department: None,
			extra: Extensions::new(),
		}
	}

	/// Builder: set owner id.
	pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
		self.owner_id = Some(owner_id.into());
		self
	}

	/// Builder: set resource type.
	pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
		self.resource_type = Some(resource_type.into());
		self
	}

	/// Builder: set department.
	pub fn with_department(mut self, department: impl Into<String>) -> Self {
		self.department = Some(department.into());
		self
	}

	/// Builder: set an extension attribute.
	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.extra.insert(name.into(), value.into());
		self
	}

	/// Looks up a single attribute by property name. Unset fixed fields fall
	/// back to the extension map.
	pub fn attribute(&self, name: &str) -> Option<JsonValue> {
		let fixed = match name {
			"id" => Some(JsonValue::from(self.id.as_str())),
			"ownerId" => self.owner_id.as_deref().map(JsonValue::from),
			"type" => self.resource_type.as_deref().map(JsonValue::from),
			"department" => self.department.as_deref().map(JsonValue::from),
			_ => None,
		};
		fixed.or_else(|| self.extra.get(name).cloned())
	}
}

/// Ambient attributes of the request.
///
/// `timestamp` is exposed to expressions as epoch seconds and `timeOfDay` as
/// the UTC hour (0-23), so both work with ordering operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentAttrs {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub time_of_day: Option<u32>,
	#[serde(flatten)]
	pub extra: Extensions,
}

impl EnvironmentAttrs {
	/// Creates an environment with no attributes.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an environment stamped with the current time.
	pub fn now() -> Self {
		Self::new().at(Utc::now())
	}

	/// Builder: set the request timestamp and derive the hour of day from it.
	pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self.time_of_day = Some(timestamp.hour());
		self
	}

	/// Builder: set the client ip.
	pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
		self.ip = Some(ip.into());
		self
	}

	/// Builder: set an extension attribute.
	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.extra.insert(name.into(), value.into());
		self
	}

	/// Looks up a single attribute by property name.
	pub fn attribute(&self, name: &str) -> Option<JsonValue> {
		let fixed = match name {
			"ip" => self.ip.as_deref().map(JsonValue::from),
			"timestamp" => self.timestamp.map(|ts| JsonValue::from(ts.timestamp())),
			"timeOfDay" => self
				.time_of_day
				.or_else(|| self.timestamp.map(|ts| ts.hour()))
				.map(JsonValue::from),
			_ => None,
		};
		fixed.or_else(|| self.extra.get(name).cloned())
	}
}

/// The complete input to one authorization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeContext {
	pub subject: SubjectAttrs,
	pub resource: ResourceAttrs,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub environment: Option<EnvironmentAttrs>,
}

impl AttributeContext {
	/// Creates a context without environment attributes.
	pub fn new(subject: SubjectAttrs, resource: ResourceAttrs) -> Self {
		Self {
			subject,
			resource,
			environment: None,
		}
	}

	/// Builder: attach environment attributes.
	pub fn with_environment(mut self, environment: EnvironmentAttrs) -> Self {
		self.environment = Some(environment);
		self
	}

	/// Resolves an attribute path such as `["ownerId"]` or `["profile", "team"]`
	/// inside a namespace.
	///
	/// The first segment is looked up on the namespace itself; remaining segments
	/// walk into JSON objects. Anything missing yields `None`.
	pub fn lookup<S: AsRef<str>>(&self, namespace: Namespace, path: &[S]) -> Option<JsonValue> {
		let (first, rest) = path.split_first()?;
		let first = first.as_ref();
		let root = match namespace {
			Namespace::Subject => self.subject.attribute(first),
			Namespace::Resource => self.resource.attribute(first),
			Namespace::Environment => self.environment.as_ref()?.attribute(first),
		}?;

		rest.iter().try_fold(root, |value, segment| match value {
			JsonValue::Object(mut map) => map.remove(segment.as_ref()),
			_ => None,
		})
	}
}
