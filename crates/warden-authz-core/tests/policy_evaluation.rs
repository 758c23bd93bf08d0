// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use proptest::prelude::*;
use serde_json::json;
use warden_authz_core::{
	evaluate_policy, expression, AttributeContext, CompiledPolicy, EnvironmentAttrs, Policy,
	ResourceAttrs, SubjectAttrs,
};

fn ctx(subject_id: &str, role: &str, resource_id: &str) -> AttributeContext {
	AttributeContext::new(
		SubjectAttrs::new(subject_id, role),
		ResourceAttrs::new(resource_id),
	)
}

mod end_to_end {
	use super::*;

	fn policy() -> Policy {
		Policy::with_roles(["admin"]).rule("subject.id == resource.id")
	}

	#[test]
	fn admin_is_allowed_by_role() {
		let result = evaluate_policy(Some(&policy()), &ctx("u1", "admin", "u2"));
		assert!(result.allowed);
		assert_eq!(result.matched_role.as_deref(), Some("admin"));
		assert!(result.matched_rule.is_none());
	}

	#[test]
	fn owner_is_allowed_by_rule() {
		let result = evaluate_policy(Some(&policy()), &ctx("u1", "user", "u1"));
		assert!(result.allowed);
		assert!(result.matched_role.is_none());
		assert_eq!(result.matched_rule.as_deref(), Some("subject.id == resource.id"));
	}

	#[test]
	fn stranger_is_denied() {
		let result = evaluate_policy(Some(&policy()), &ctx("u1", "user", "u2"));
		assert!(!result.allowed);
		assert!(result.matched_role.is_none());
		assert!(result.matched_rule.is_none());
		assert_eq!(result.reason, "no matching role or rule; subject role was user");
	}
}

#[test]
fn manager_in_same_department() {
	let policy = Policy::default()
		.rule(r#"subject.role == "manager" and subject.department == resource.department"#)
		.describe("managers may act on resources of their own department");

	let same = AttributeContext::new(
		SubjectAttrs::new("m1", "manager").with_department("finance"),
		ResourceAttrs::new("inv-1").with_department("finance"),
	);
	let other = AttributeContext::new(
		SubjectAttrs::new("m1", "manager").with_department("finance"),
		ResourceAttrs::new("inv-2").with_department("legal"),
	);

	assert!(evaluate_policy(Some(&policy), &same).allowed);
	assert!(!evaluate_policy(Some(&policy), &other).allowed);
}

#[test]
fn business_hours_rule_uses_environment() {
	let policy = Policy::default()
		.rule("environment.timeOfDay >= 9 && environment.timeOfDay < 17");

	let at = |hour: u32| {
		ctx("u1", "user", "r1").with_environment(EnvironmentAttrs::new().with_attribute(
			"timeOfDay",
			json!(hour),
		))
	};

	assert!(evaluate_policy(Some(&policy), &at(9)).allowed);
	assert!(evaluate_policy(Some(&policy), &at(16)).allowed);
	assert!(!evaluate_policy(Some(&policy), &at(17)).allowed);
	// No environment at all: every ordering comparison is false.
	assert!(!evaluate_policy(Some(&policy), &ctx("u1", "user", "r1")).allowed);
}

#[test]
fn compiled_policy_is_reusable_across_contexts() {
	let compiled = CompiledPolicy::compile(
		&Policy::with_roles(["admin"]).rule("subject.id == resource.ownerId"),
	);

	let owner = AttributeContext::new(
		SubjectAttrs::new("u1", "user"),
		ResourceAttrs::new("r1").with_owner("u1"),
	);
	assert!(compiled.evaluate(&owner).allowed);
	assert!(compiled.evaluate(&ctx("root", "admin", "r1")).allowed);
	assert!(!compiled.evaluate(&ctx("u2", "user", "r1")).allowed);
}

#[test]
fn policy_from_json_document() {
	let policy: Policy = serde_json::from_value(json!({
		"roles": ["admin", "manager"],
		"rules": ["subject.id == resource.ownerId"],
		"description": "owners and managers"
	}))
	.unwrap();

	let result = evaluate_policy(Some(&policy), &ctx("u9", "manager", "r1"));
	assert_eq!(result.matched_role.as_deref(), Some("manager"));
	assert_eq!(result.reason, "manager is in allowed roles");
}

#[test]
fn malformed_rules_never_grant() {
	let ctx = ctx("u1", "user", "r1");
	for rule in [
		"subject.id ==",
		"subject.id == 'u1' or",
		"((subject.id == 'u1')",
		"require('fs')",
		"subject.id == 'u1' ; true",
	] {
		assert!(!expression::evaluate(rule, &ctx), "{rule:?}");
		let result = evaluate_policy(Some(&Policy::default().rule(rule)), &ctx);
		assert!(!result.allowed, "{rule:?} should not grant");
	}
}

proptest! {
	#[test]
	fn role_membership_is_exact(role in "[a-z]{1,10}", other in "[a-z]{1,10}") {
		let policy = Policy::with_roles([role.clone()]);
		let allowed = evaluate_policy(Some(&policy), &ctx("u1", &other, "r1")).allowed;
		prop_assert_eq!(allowed, role == other);
	}

	#[test]
	fn rbac_always_wins_when_role_matches(id in "[a-z0-9]{1,8}") {
		let policy = Policy::with_roles(["admin"]).rule("subject.id == resource.id");
		let result = evaluate_policy(Some(&policy), &ctx(&id, "admin", &id));
		prop_assert_eq!(result.matched_role.as_deref(), Some("admin"));
		prop_assert!(result.matched_rule.is_none());
	}

	#[test]
	fn string_literals_never_split_on_keywords(name in "[A-Za-z ]{0,16}") {
		let ctx = AttributeContext::new(
			SubjectAttrs::new("u1", "user").with_attribute("name", name.clone()),
			ResourceAttrs::new("r1"),
		);
		let source = format!("subject.name == \"{name}\"");
		prop_assert!(expression::evaluate(&source, &ctx));
	}
}
