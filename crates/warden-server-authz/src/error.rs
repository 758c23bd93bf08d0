// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization engine error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the authorization engine.
///
/// Malformed rule expressions and malformed capability annotations are not
/// represented here: the former evaluate to `false`, the latter are skipped
/// and listed in the registry's build report.
#[derive(Debug, Error)]
pub enum AuthzError {
	// =========================================================================
	// Decision Errors
	// =========================================================================
	/// The policy evaluated to a denial.
	#[error("access denied: {0}")]
	AccessDenied(String),

	// =========================================================================
	// Policy Resolution Errors
	// =========================================================================
	/// A policy reference names a policy that is not in the directory.
	#[error("policy reference not found: {0}")]
	PolicyReferenceNotFound(String),

	/// A policy reference does not have the expected shape.
	#[error("invalid policy reference: {0:?}")]
	InvalidPolicyReference(String),

	// =========================================================================
	// Lifecycle Errors
	// =========================================================================
	/// A decision was requested before any specification was loaded.
	#[error("no authorization specification loaded")]
	NotLoaded,

	/// The specification document could not be decoded.
	#[error("invalid specification: {0}")]
	InvalidSpecification(#[from] serde_json::Error),

	/// Configuration could not be loaded or validated.
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),
}

impl AuthzError {
	/// Returns true if this error points at a broken deployment rather than a
	/// refused caller, and should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			AuthzError::PolicyReferenceNotFound(_)
				| AuthzError::InvalidPolicyReference(_)
				| AuthzError::InvalidSpecification(_)
				| AuthzError::Config(_)
		)
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			// 403 Forbidden
			AuthzError::AccessDenied(_) => 403,

			// 503 Service Unavailable
			AuthzError::NotLoaded => 503,

			// 500 Internal Server Error
			AuthzError::PolicyReferenceNotFound(_)
			| AuthzError::InvalidPolicyReference(_)
			| AuthzError::InvalidSpecification(_)
			| AuthzError::Config(_) => 500,
		}
	}
}

/// Errors raised while loading authorization configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("validation failed: {0}")]
	Validation(String),
}

pub type Result<T> = std::result::Result<T, AuthzError>;
