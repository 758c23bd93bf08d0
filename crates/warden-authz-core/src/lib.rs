// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Warden authorization engine.
//!
//! This crate is pure and I/O free. It provides the attribute context an
//! authorization decision is made against, the rule expression language used
//! by ABAC policies, and the RBAC/ABAC policy evaluator. The stateful pieces
//! (policy resolution, capability registry, reload) live in
//! `warden-server-authz`.
//!
//! # Example
//!
//! ```
//! use warden_authz_core::{evaluate_policy, AttributeContext, Policy, ResourceAttrs, SubjectAttrs};
//!
//! let policy = Policy::with_roles(["admin"]).rule("subject.id == resource.ownerId");
//!
//! let ctx = AttributeContext::new(
//!     SubjectAttrs::new("u1", "user"),
//!     ResourceAttrs::new("doc-7").with_owner("u1"),
//! );
//!
//! let result = evaluate_policy(Some(&policy), &ctx);
//! assert!(result.allowed);
//! assert_eq!(result.matched_rule.as_deref(), Some("subject.id == resource.ownerId"));
//! ```

pub mod context;
pub mod error;
pub mod expression;
pub mod policy;

pub use context::{
	AttributeContext, EnvironmentAttrs, Extensions, Namespace, ResourceAttrs, SubjectAttrs,
};
pub use error::{ExpressionError, Result};
pub use expression::{Expr, ExpressionParser, Value};
pub use policy::{evaluate_policy, CompiledPolicy, CompiledRule, EvaluationResult, Policy};
