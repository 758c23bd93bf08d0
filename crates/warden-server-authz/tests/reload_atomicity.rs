// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use http::Method;
use warden_authz_core::{AttributeContext, Policy, ResourceAttrs, SubjectAttrs};
use warden_server_authz::{
	AuthzConfig, AuthzEngine, CapabilityIndex, CapabilityRegistry, DecisionTarget, Generation,
	Operation, PolicySource, Specification,
};

/// A specification whose every capability, route and policy carries `tag`.
fn tagged_spec(tag: &str, resources: usize) -> Specification {
	let mut spec = Specification::new().with_policy(
		format!("{tag}Policy"),
		Policy::with_roles([format!("{tag}-role")]),
	);
	for n in 0..resources {
		let resource = format!("{tag}{n}");
		for (method, action) in [(Method::GET, "read"), (Method::DELETE, "delete")] {
			spec = spec.with_operation(
				method,
				format!("/{tag}/{resource}/{{id}}"),
				Operation::new()
					.capability(format!("{resource}:{action}"))
					.policy(PolicySource::reference(format!("#/policies/{tag}Policy"))),
			);
		}
	}
	spec
}

fn assert_consistent(index: &CapabilityIndex) -> String {
	let mut tags: Vec<char> = Vec::new();
	for mapping in index.mappings() {
		assert!(!mapping.routes.is_empty(), "{} has no routes", mapping.id);
		for route in &mapping.routes {
			let found = index
				.get_for_route(&route.method, &route.path)
				.unwrap_or_else(|| panic!("route {route} missing from reverse index"));
			assert_eq!(found.id, mapping.id);
		}
		tags.extend(mapping.id.chars().next());
	}
	for (route, id) in index.routes() {
		let mapping = index
			.get_by_id(id)
			.unwrap_or_else(|| panic!("reverse entry {route} points at missing {id}"));
		assert!(mapping.routes.contains(route));
	}
	tags.sort_unstable();
	tags.dedup();
	assert_eq!(tags.len(), 1, "snapshot mixes generations: {tags:?}");
	tags.into_iter().collect()
}

fn assert_generation_consistent(generation: &Generation) {
	let tag = assert_consistent(generation.capabilities());
	assert_eq!(
		generation.policies().policy_names(),
		vec![format!("{tag}Policy").as_str()]
	);
}

#[test]
fn engine_reload_is_atomic_for_concurrent_readers() {
	let engine = AuthzEngine::new(AuthzConfig {
		audit_decisions: false,
		..AuthzConfig::default()
	});
	let spec_a = tagged_spec("a", 8);
	let spec_b = tagged_spec("b", 12);
	engine.load_specification(&spec_a);

	let done = AtomicBool::new(false);
	let observed = AtomicUsize::new(0);

	thread::scope(|scope| {
		for _ in 0..3 {
			scope.spawn(|| {
				while !done.load(Ordering::Acquire) {
					let generation = engine.snapshot().expect("specification loaded");
					assert_generation_consistent(&generation);

					// A decision made against the snapshot's tag always uses
					// that generation's policy.
					let tag = if generation.capabilities().exists("a0", "read") {
						"a"
					} else {
						"b"
					};
					let policy = generation
						.policies()
						.resolve_reference(&format!("#/policies/{tag}Policy"))
						.expect("policy of the same generation resolves");
					assert_eq!(policy.policy().roles, vec![format!("{tag}-role")]);
					observed.fetch_add(1, Ordering::Relaxed);
				}
			});
		}

		scope.spawn(|| {
			let ctx = AttributeContext::new(
				SubjectAttrs::new("u1", "a-role"),
				ResourceAttrs::new("1"),
			);
			while !done.load(Ordering::Acquire) {
				match engine.decide(&DecisionTarget::route(Method::GET, "/a/a0/1"), &ctx) {
					Ok(decision) => {
						if decision.capability.is_some() {
							assert!(decision.allowed(), "{}", decision.reason());
						} else {
							assert_eq!(decision.reason(), "no capability registered for GET /a/a0/1");
						}
					}
					Err(err) => panic!("decision failed during reload: {err}"),
				}
			}
		});

		for round in 0..200 {
			let spec = if round % 2 == 0 { &spec_b } else { &spec_a };
			let report = engine.reload(spec);
			assert!(report.is_clean());
		}
		done.store(true, Ordering::Release);
	});

	assert!(observed.load(Ordering::Relaxed) > 0);

	// Round 199 installed spec_a.
	let last = engine.snapshot().unwrap();
	assert_eq!(assert_consistent(last.capabilities()), "a");
	assert_eq!(last.sequence(), 201);
}

fn quiet_engine() -> AuthzEngine {
	AuthzEngine::new(AuthzConfig {
		audit_decisions: false,
		..AuthzConfig::default()
	})
}

#[test]
fn overlapping_reloads_install_the_last_generation() {
	let slow = tagged_spec("o", 2000);
	let fast = tagged_spec("n", 1);

	for _ in 0..20 {
		let engine = quiet_engine();
		let start = Barrier::new(2);

		thread::scope(|scope| {
			scope.spawn(|| {
				start.wait();
				assert!(engine.reload(&slow).is_clean());
			});
			scope.spawn(|| {
				start.wait();
				thread::sleep(Duration::from_millis(1));
				assert!(engine.reload(&fast).is_clean());
			});
		});

		let installed = engine.snapshot().expect("specification loaded");
		assert_eq!(installed.sequence(), 2);
		assert_generation_consistent(&installed);
	}
}

#[test]
fn concurrent_reloaders_never_move_sequence_backwards() {
	let engine = quiet_engine();
	let spec_a = tagged_spec("a", 6);
	let spec_b = tagged_spec("b", 40);
	engine.load_specification(&spec_a);

	let done = AtomicBool::new(false);
	let highest = AtomicU64::new(0);

	thread::scope(|scope| {
		scope.spawn(|| {
			let mut previous = 0;
			while !done.load(Ordering::Acquire) {
				let generation = engine.snapshot().expect("specification loaded");
				assert!(
					generation.sequence() >= previous,
					"sequence went from {previous} to {}",
					generation.sequence()
				);
				previous = generation.sequence();
				assert_generation_consistent(&generation);
			}
		});

		let writers: Vec<_> = (0..4)
			.map(|writer| {
				let (engine, spec_a, spec_b, highest) = (&engine, &spec_a, &spec_b, &highest);
				scope.spawn(move || {
					for round in 0..25 {
						let spec = if (writer + round) % 2 == 0 { spec_b } else { spec_a };
						engine.reload(spec);
						let seen = engine.snapshot().expect("specification loaded").sequence();
						highest.fetch_max(seen, Ordering::Relaxed);
					}
				})
			})
			.collect();
		for writer in writers {
			writer.join().expect("reload thread panicked");
		}
		done.store(true, Ordering::Release);
	});

	let last = engine.snapshot().unwrap();
	assert_eq!(last.sequence(), 101);
	assert_eq!(highest.load(Ordering::Relaxed), 101);
}

#[test]
fn registry_reload_never_exposes_previous_mappings() {
	let (registry, _) = CapabilityRegistry::from_specification(&tagged_spec("a", 4));
	registry.reload(&tagged_spec("b", 4));

	for n in 0..4 {
		assert!(!registry.exists(&format!("a{n}"), "read"));
		assert!(registry.exists(&format!("b{n}"), "read"));
		assert!(registry
			.get_for_route(&Method::GET, &format!("/a/a{n}/{{id}}"))
			.is_none());
	}
	assert_eq!(registry.all_resources(), vec!["b0", "b1", "b2", "b3"]);
	assert_consistent(&registry.snapshot());
}
