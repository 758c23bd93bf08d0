// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the authorization engine.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. The `[authz]` table of a TOML config file
//! 3. Environment variables (`WARDEN_AUTHZ_*`)

pub mod sources;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use crate::error::ConfigError;
use crate::resolver::DEFAULT_POLICY_REF_PREFIX;

/// Decision returned for operations with no registered capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnregisteredPolicy {
	#[default]
	Deny,
	Allow,
}

impl UnregisteredPolicy {
	pub fn allows(&self) -> bool {
		matches!(self, UnregisteredPolicy::Allow)
	}
}

impl fmt::Display for UnregisteredPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			UnregisteredPolicy::Deny => f.write_str("deny"),
			UnregisteredPolicy::Allow => f.write_str("allow"),
		}
	}
}

impl FromStr for UnregisteredPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"deny" => Ok(UnregisteredPolicy::Deny),
			"allow" => Ok(UnregisteredPolicy::Allow),
			other => Err(format!("expected 'deny' or 'allow', got '{other}'")),
		}
	}
}

/// Partial configuration as read from one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthzConfigLayer {
	pub policy_ref_prefix: Option<String>,
	pub unregistered: Option<UnregisteredPolicy>,
	pub audit_decisions: Option<bool>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.policy_ref_prefix.is_some() {
			self.policy_ref_prefix = other.policy_ref_prefix;
		}
		if other.unregistered.is_some() {
			self.unregistered = other.unregistered;
		}
		if other.audit_decisions.is_some() {
			self.audit_decisions = other.audit_decisions;
		}
	}

	pub fn finalize(self) -> AuthzConfig {
		AuthzConfig {
			policy_ref_prefix: self
				.policy_ref_prefix
				.unwrap_or_else(|| DEFAULT_POLICY_REF_PREFIX.to_string()),
			unregistered: self.unregistered.unwrap_or_default(),
			audit_decisions: self.audit_decisions.unwrap_or(true),
		}
	}
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthzConfig {
	/// Prefix a policy reference must carry, e.g. `#/policies/`.
	pub policy_ref_prefix: String,
	pub unregistered: UnregisteredPolicy,
	/// Emit an audit event for every decision.
	pub audit_decisions: bool,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		AuthzConfigLayer::default().finalize()
	}
}

impl AuthzConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		let prefix = &self.policy_ref_prefix;
		if !prefix.starts_with("#/") || !prefix.ends_with('/') || prefix.len() < 3 {
			return Err(ConfigError::Validation(format!(
				"policy_ref_prefix must start with '#/' and end with '/', got '{prefix}'"
			)));
		}
		Ok(())
	}
}

fn load_from(sources: Vec<Box<dyn ConfigSource>>) -> Result<AuthzConfig, ConfigError> {
	let mut sources = sources;
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuthzConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let config = merged.finalize();
	config.validate()?;
	info!(
		policy_ref_prefix = %config.policy_ref_prefix,
		unregistered = %config.unregistered,
		audit_decisions = config.audit_decisions,
		"authorization configuration loaded"
	);
	Ok(config)
}

/// Load configuration from defaults, the system config file and the
/// environment.
pub fn load_config() -> Result<AuthzConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from the environment only.
pub fn load_config_from_env() -> Result<AuthzConfig, ConfigError> {
	load_from(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<AuthzConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}
