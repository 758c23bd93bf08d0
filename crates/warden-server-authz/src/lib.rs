// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side authorization for Warden.
//!
//! This crate turns an authorization specification into decisions:
//!
//! - [`spec`]: serde model of the specification document (paths annotated with
//!   `x-capability` / `x-policy`, plus a directory of named policies)
//! - [`resolver`]: resolves policy references against the directory, memoised
//! - [`registry`]: maps `(method, path)` onto canonical `resource:action`
//!   capabilities and renders qualified forms for audit
//! - [`engine`]: ties registry and resolver together behind one atomically
//!   reloadable generation
//! - [`audit`]: structured decision records
//! - [`config`]: layered configuration (defaults, TOML, `WARDEN_AUTHZ_*`)
//!
//! Policy evaluation itself lives in `warden-authz-core`.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod route;
pub mod spec;

pub use audit::{AuthzAuditEntry, AUDIT_TARGET};
pub use config::{
	load_config, load_config_from_env, load_config_with_file, AuthzConfig, AuthzConfigLayer,
	UnregisteredPolicy,
};
pub use engine::{AuthzEngine, Decision, DecisionTarget, Generation};
pub use error::{AuthzError, ConfigError, Result};
pub use registry::{
	instantiate, parse_capability, BuildReport, CapabilityIndex, CapabilityInstance,
	CapabilityMapping, CapabilityRegistry, SkippedAnnotation,
};
pub use resolver::{PolicyDirectory, PolicyResolver, DEFAULT_POLICY_REF_PREFIX};
pub use route::{Route, RouteMatch};
pub use spec::{Operation, PathItem, PolicySource, Specification};
