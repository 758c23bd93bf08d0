// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, trace};

use super::{AuthzConfigLayer, UnregisteredPolicy};
use crate::error::ConfigError;

pub const ENV_POLICY_REF_PREFIX: &str = "WARDEN_AUTHZ_POLICY_REF_PREFIX";
pub const ENV_UNREGISTERED: &str = "WARDEN_AUTHZ_UNREGISTERED";
pub const ENV_AUDIT_DECISIONS: &str = "WARDEN_AUTHZ_AUDIT_DECISIONS";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<AuthzConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(AuthzConfigLayer::default())
	}
}

/// Shape of a config file: the engine only reads the `[authz]` table.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
	#[serde(default)]
	authz: Option<AuthzConfigLayer>,
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/warden/authz.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(AuthzConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed authz layer from TOML");
		Ok(file.authz.unwrap_or_default())
	}
}

/// Environment variable source.
///
/// Convention: WARDEN_AUTHZ_<FIELD>
pub struct EnvSource;

impl EnvSource {
	/// Builds a layer from an arbitrary variable lookup.
	pub fn load_with<F>(lookup: F) -> Result<AuthzConfigLayer, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

		let unregistered = match var(ENV_UNREGISTERED) {
			Some(v) => Some(v.parse::<UnregisteredPolicy>().map_err(|message| {
				ConfigError::InvalidValue {
					key: ENV_UNREGISTERED.to_string(),
					message,
				}
			})?),
			None => None,
		};

		Ok(AuthzConfigLayer {
			policy_ref_prefix: var(ENV_POLICY_REF_PREFIX),
			unregistered,
			audit_decisions: var(ENV_AUDIT_DECISIONS)
				.map(|v| v.eq_ignore_ascii_case("true") || v == "1"),
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Self::load_with(|name| std::env::var(name).ok())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name: &str| map.get(name).cloned()
	}

	#[test]
	fn precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	mod env_source {
		use super::*;

		#[test]
		fn reads_all_fields() {
			let layer = EnvSource::load_with(env(&[
				(ENV_POLICY_REF_PREFIX, "#/components/policies/"),
				(ENV_UNREGISTERED, "Allow"),
				(ENV_AUDIT_DECISIONS, "0"),
			]))
			.unwrap();
			assert_eq!(layer.policy_ref_prefix.as_deref(), Some("#/components/policies/"));
			assert_eq!(layer.unregistered, Some(UnregisteredPolicy::Allow));
			assert_eq!(layer.audit_decisions, Some(false));
		}

		#[test]
		fn empty_values_are_unset() {
			let layer = EnvSource::load_with(env(&[(ENV_POLICY_REF_PREFIX, "")])).unwrap();
			assert_eq!(layer, AuthzConfigLayer::default());
		}

		#[test]
		fn invalid_unregistered_value_is_an_error() {
			let err = EnvSource::load_with(env(&[(ENV_UNREGISTERED, "sometimes")])).unwrap_err();
			assert!(matches!(
				err,
				ConfigError::InvalidValue { ref key, .. } if key == ENV_UNREGISTERED
			));
		}
	}

	mod toml_source {
		use super::*;

		#[test]
		fn missing_file_yields_empty_layer() {
			let layer = TomlSource::new("/nonexistent/warden/authz.toml").load().unwrap();
			assert_eq!(layer, AuthzConfigLayer::default());
		}

		#[test]
		fn reads_authz_table() {
			let mut file = tempfile::NamedTempFile::new().unwrap();
			writeln!(
				file,
				r##"
[server]
port = 8080

[authz]
policy_ref_prefix = "#/components/policies/"
unregistered = "allow"
audit_decisions = false
"##
			)
			.unwrap();

			let layer = TomlSource::new(file.path()).load().unwrap();
			assert_eq!(layer.policy_ref_prefix.as_deref(), Some("#/components/policies/"));
			assert_eq!(layer.unregistered, Some(UnregisteredPolicy::Allow));
			assert_eq!(layer.audit_decisions, Some(false));
		}

		#[test]
		fn invalid_toml_is_an_error() {
			let mut file = tempfile::NamedTempFile::new().unwrap();
			writeln!(file, "[authz\nunregistered = ").unwrap();
			assert!(matches!(
				TomlSource::new(file.path()).load(),
				Err(ConfigError::TomlParse { .. })
			));
		}
	}
}
