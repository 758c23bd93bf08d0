// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Routes and path template matching.

use std::fmt;

use http::Method;
use serde::{Serialize, Serializer};

/// A `(method, path template)` pair as declared in a specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
	pub method: Method,
	pub path: String,
}

impl Route {
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
		}
	}

	/// Parses a method name case-insensitively.
	pub fn parse_method(method: &str) -> Option<Method> {
		Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()
	}
}

impl fmt::Display for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.method, self.path)
	}
}

impl Serialize for Route {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Param(String),
}

/// A path template split into literal and `{param}` segments.
#[derive(Debug, Clone)]
pub(crate) struct PathTemplate {
	route: Route,
	segments: Vec<Segment>,
	literals: usize,
}

impl PathTemplate {
	pub(crate) fn new(route: Route) -> Self {
		let segments: Vec<Segment> = split_path(&route.path)
			.map(|segment| {
				match segment
					.strip_prefix('{')
					.and_then(|rest| rest.strip_suffix('}'))
				{
					Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
					_ => Segment::Literal(segment.to_string()),
				}
			})
			.collect();
		let literals = segments
			.iter()
			.filter(|segment| matches!(segment, Segment::Literal(_)))
			.count();
		Self {
			route,
			segments,
			literals,
		}
	}

	pub(crate) fn route(&self) -> &Route {
		&self.route
	}

	pub(crate) fn literals(&self) -> usize {
		self.literals
	}

	/// Matches a concrete path, returning the extracted parameters in
	/// template order.
	pub(crate) fn matches(&self, method: &Method, path: &str) -> Option<Vec<(String, String)>> {
		if self.route.method != *method {
			return None;
		}

		let mut params = Vec::new();
		let mut concrete = split_path(path);
		for segment in &self.segments {
			let value = concrete.next()?;
			match segment {
				Segment::Literal(literal) if literal == value => {}
				Segment::Literal(_) => return None,
				Segment::Param(_) if value.is_empty() => return None,
				Segment::Param(name) => params.push((name.clone(), value.to_string())),
			}
		}
		if concrete.next().is_some() {
			return None;
		}
		Some(params)
	}
}

/// Splits a path into segments, ignoring the query string and a trailing
/// slash.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
	let path = path.split(['?', '#']).next().unwrap_or_default();
	let path = path.trim_start_matches('/');
	let path = path.strip_suffix('/').unwrap_or(path);
	path.split('/').filter(move |_| !path.is_empty())
}

/// A concrete request path resolved to a registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
	pub capability_id: String,
	/// The matched template.
	pub route: Route,
	/// Path parameters in template order.
	pub params: Vec<(String, String)>,
}

impl RouteMatch {
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	/// The instance id for audit purposes: the `id` parameter, else the last
	/// parameter in the template.
	pub fn target_id(&self) -> Option<&str> {
		self.param("id")
			.or_else(|| self.params.last().map(|(_, value)| value.as_str()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn template(method: Method, path: &str) -> PathTemplate {
		PathTemplate::new(Route::new(method, path))
	}

	#[test]
	fn parse_method_is_case_insensitive() {
		assert_eq!(Route::parse_method("get"), Some(Method::GET));
		assert_eq!(Route::parse_method("Patch"), Some(Method::PATCH));
		assert_eq!(Route::parse_method("not a method"), None);
	}

	#[test]
	fn display_route() {
		assert_eq!(
			Route::new(Method::DELETE, "/users/{id}").to_string(),
			"DELETE /users/{id}"
		);
	}

	#[test]
	fn counts_literal_segments() {
		assert_eq!(template(Method::GET, "/users/{id}").literals(), 1);
		assert_eq!(template(Method::GET, "/users/me").literals(), 2);
		assert_eq!(template(Method::GET, "/").literals(), 0);
	}

	#[test]
	fn extracts_parameters() {
		let tpl = template(Method::GET, "/orgs/{org}/members/{id}");
		assert_eq!(
			tpl.matches(&Method::GET, "/orgs/acme/members/42"),
			Some(vec![
				("org".to_string(), "acme".to_string()),
				("id".to_string(), "42".to_string()),
			])
		);
	}

	#[test]
	fn rejects_mismatches() {
		let tpl = template(Method::GET, "/users/{id}");
		assert_eq!(tpl.matches(&Method::POST, "/users/42"), None);
		assert_eq!(tpl.matches(&Method::GET, "/users"), None);
		assert_eq!(tpl.matches(&Method::GET, "/users/42/posts"), None);
		assert_eq!(tpl.matches(&Method::GET, "/teams/42"), None);
		assert_eq!(tpl.matches(&Method::GET, "/users//"), None);
	}

	#[test]
	fn ignores_query_and_trailing_slash() {
		let tpl = template(Method::GET, "/users/{id}");
		assert!(tpl.matches(&Method::GET, "/users/42/").is_some());
		assert!(tpl.matches(&Method::GET, "/users/42?expand=teams").is_some());
		assert!(template(Method::GET, "/").matches(&Method::GET, "/").is_some());
	}

	#[test]
	fn target_id_prefers_id_parameter() {
		let matched = RouteMatch {
			capability_id: "member:read".into(),
			route: Route::new(Method::GET, "/orgs/{id}/members/{member}"),
			params: vec![
				("id".into(), "acme".into()),
				("member".into(), "42".into()),
			],
		};
		assert_eq!(matched.target_id(), Some("acme"));

		let matched = RouteMatch {
			params: vec![("org".into(), "acme".into()), ("member".into(), "42".into())],
			..matched
		};
		assert_eq!(matched.target_id(), Some("42"));
	}
}
