// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluate-and-gate behaviour of a request scope.

mod common;

use common::{Hook, Town, caller};
use fg_config::{Fallback, FieldgateConfig, PolicyMode};
use fg_core::{Args, Record};
use fg_error::ErrorCode;
use fg_gate::{AuthorizationGate, Denial, FieldOutcome, GateOptions};
use fg_policy::rules::arg_requests_arg;
use fg_policy::{PolicyTree, Tree};
use fg_telemetry::{DecisionCollector, DecisionOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Barrier;

fn flat_gate(store: Arc<common::Hooked>, options: GateOptions) -> AuthorizationGate {
    AuthorizationGate::new(PolicyTree::flat().unwrap(), store, options)
}

fn event_args(town: &Town) -> Args {
    Args::new().with("event", town.public_event.id.to_string())
}

#[tokio::test]
async fn denied_field_leaves_siblings_resolved() {
    let town = Town::new();
    let gate = flat_gate(Arc::new(town.store()), GateOptions::default());
    let scope = gate.begin(caller(&town.stranger));
    let parent = Record::from(town.public_event.clone());
    let args = Args::new();

    let title = scope
        .resolve("Event", "title", &args, Some(&parent), || async {
            town.public_event.title.clone()
        })
        .await
        .unwrap();
    let requests = scope
        .resolve("Event", "requests", &args, Some(&parent), || async {
            town.public_event.requests.clone()
        })
        .await
        .unwrap();
    let id = scope
        .resolve("User", "_id", &args, Some(&Record::from(town.owner.clone())), || async {
            town.owner.id
        })
        .await
        .unwrap();

    assert_eq!(title, FieldOutcome::Resolved("market".to_string()));
    assert_eq!(requests.denial(), Some(Denial::NotAuthorised));
    assert_eq!(id.into_option(), Some(town.owner.id));
}

#[tokio::test]
async fn resolver_never_runs_on_denial() {
    let town = Town::new();
    let gate = flat_gate(Arc::new(town.store()), GateOptions::default());
    let scope = gate.begin(caller(&town.stranger));
    let ran = AtomicBool::new(false);

    let outcome = scope
        .resolve("Mutation", "deleteEvent", &event_args(&town), None, || async {
            ran.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(outcome, FieldOutcome::Denied(Denial::NotAuthorised));
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn owner_may_delete_own_event() {
    let town = Town::new();
    let gate = flat_gate(Arc::new(town.store()), GateOptions::default());
    let allowed = gate
        .evaluate_and_gate(
            "Mutation",
            "deleteEvent",
            caller(&town.owner),
            &event_args(&town),
            None,
        )
        .await
        .unwrap();
    assert!(allowed);
}

#[tokio::test]
async fn anonymous_caller_is_asked_to_log_in() {
    let town = Town::new();
    let gate = flat_gate(Arc::new(town.store()), GateOptions::default());
    let scope = gate.begin(None);
    let parent = Record::from(town.owner.clone());

    let name = scope
        .check("User", "name", &Args::new(), Some(&parent))
        .await
        .unwrap();
    assert!(!name.allowed);
    assert_eq!(name.denial, Some(Denial::AuthenticationRequired));
    assert_eq!(
        name.denial.unwrap().to_error("User.name").code,
        ErrorCode::AuthenticationRequired
    );

    let events = scope
        .check("Query", "events", &Args::new(), None)
        .await
        .unwrap();
    assert!(events.allowed);
}

#[tokio::test]
async fn logged_in_denial_is_not_an_authentication_problem() {
    let town = Town::new();
    let gate = flat_gate(Arc::new(town.store()), GateOptions::default());
    let d = gate
        .begin(caller(&town.stranger))
        .check("Mutation", "setRole", &Args::new(), None)
        .await
        .unwrap();
    assert_eq!(d.denial, Some(Denial::NotAuthorised));
}

#[tokio::test]
async fn lookup_outage_fails_the_check() {
    let town = Town::new();
    let store = Arc::new(town.store().with_hook(Hook::Fail));
    let collector = DecisionCollector::new();
    let gate = flat_gate(
        store,
        GateOptions::default().with_collector(collector.clone()),
    );

    let err = gate
        .begin(caller(&town.owner))
        .check("Mutation", "deleteEvent", &event_args(&town), None)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::PredicateLookupFailed);
    assert_eq!(err.context["predicate"], "caller_owns_arg");
    assert_eq!(err.context["site"], "Mutation.deleteEvent");
    assert_eq!(collector.decisions()[0].outcome, DecisionOutcome::Failed);
}

#[tokio::test]
async fn outage_is_invisible_when_short_circuited() {
    let town = Town::new();
    let store = Arc::new(town.store().with_hook(Hook::Fail));
    let gate = flat_gate(store.clone(), GateOptions::default());
    // `and(admin, arg_is_locked)`: the role check fails first.
    let d = gate
        .begin(caller(&town.stranger))
        .check(
            "Mutation",
            "deletePost",
            &Args::new().with("post", town.post.id.to_string()),
            None,
        )
        .await
        .unwrap();
    assert!(!d.allowed);
    assert_eq!(store.lookups(), 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_lookup_hits_the_request_deadline() {
    let town = Town::new();
    let store = Arc::new(town.store().with_hook(Hook::Stall));
    let gate = flat_gate(
        store,
        GateOptions {
            request_timeout: Some(Duration::from_millis(50)),
            ..GateOptions::default()
        },
    );

    let err = gate
        .begin(caller(&town.owner))
        .check("Mutation", "deleteEvent", &event_args(&town), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RequestTimedOut);
}

#[tokio::test]
async fn sibling_checks_do_not_serialise() {
    let town = Town::new();
    let barrier = Arc::new(Barrier::new(2));
    let store = Arc::new(town.store().with_hook(Hook::Rendezvous(barrier)));
    let gate = flat_gate(store.clone(), GateOptions::default());
    let scope = gate.begin(caller(&town.owner));
    let args = event_args(&town);

    // Each check blocks in its event lookup until the other one arrives.
    let both = async {
        tokio::join!(
            scope.check("Mutation", "deleteEvent", &args, None),
            scope.check("Mutation", "promote", &args, None),
        )
    };
    let (a, b) = tokio::time::timeout(Duration::from_secs(5), both)
        .await
        .expect("checks of one request ran one after the other");

    assert!(a.unwrap().allowed);
    assert!(b.unwrap().allowed);
    assert_eq!(store.lookups(), 2);
}

#[tokio::test]
async fn strict_results_are_shared_across_requests() {
    let town = Town::new();
    let store = Arc::new(town.store());
    let tree =
        Tree::from_sections([("Mutation", vec![("acceptRequest", arg_requests_arg())])]).unwrap();
    let args = event_args(&town).with("user", town.requester.id.to_string());

    let shared = AuthorizationGate::new(
        PolicyTree::new(tree.clone()).unwrap(),
        store.clone(),
        GateOptions::default(),
    );
    for _ in 0..3 {
        let d = shared
            .begin(caller(&town.owner))
            .check("Mutation", "acceptRequest", &args, None)
            .await
            .unwrap();
        assert!(d.allowed);
    }
    assert_eq!(store.lookups(), 1);
    assert_eq!(shared.strict_cache().len(), 1);

    let private = AuthorizationGate::new(
        PolicyTree::new(tree).unwrap(),
        store.clone(),
        GateOptions {
            strict_cache: false,
            ..GateOptions::default()
        },
    );
    for _ in 0..3 {
        private
            .begin(caller(&town.owner))
            .check("Mutation", "acceptRequest", &args, None)
            .await
            .unwrap();
    }
    assert_eq!(store.lookups(), 4);
    assert!(private.strict_cache().is_empty());
}

#[tokio::test]
async fn debug_mode_reports_the_denied_rule() {
    let town = Town::new();
    let store = Arc::new(town.store());
    let quiet = flat_gate(store.clone(), GateOptions::default());
    let loud = flat_gate(
        store,
        GateOptions {
            debug: true,
            ..GateOptions::default()
        },
    );
    let args = event_args(&town);

    let d = quiet
        .begin(caller(&town.stranger))
        .check("Mutation", "deleteEvent", &args, None)
        .await
        .unwrap();
    assert_eq!(d.reason, None);

    let d = loud
        .begin(caller(&town.stranger))
        .check("Mutation", "deleteEvent", &args, None)
        .await
        .unwrap();
    assert_eq!(d.reason.as_deref(), Some("caller_owns_arg"));
}

#[tokio::test]
async fn collector_sees_every_decision() {
    let town = Town::new();
    let collector = DecisionCollector::new();
    let gate = flat_gate(
        Arc::new(town.store()),
        GateOptions::default().with_collector(collector.clone()),
    );
    let scope = gate.begin(None);
    let parent = Record::from(town.owner.clone());
    scope.check("User", "_id", &Args::new(), Some(&parent)).await.unwrap();
    scope.check("User", "name", &Args::new(), Some(&parent)).await.unwrap();
    scope.check("Secret", "x", &Args::new(), None).await.unwrap();

    let summary = collector.summary();
    assert_eq!(summary.count, 3);
    assert_eq!(summary.allowed, 1);
    assert_eq!(summary.authentication_required, 1);
    assert_eq!(summary.denied, 1);
    assert_eq!(summary.denials_by_site["Secret.x"], 1);
}

#[tokio::test]
async fn config_selects_style_and_fallback() {
    let town = Town::new();
    let store = Arc::new(town.store());
    let parent = Record::from(town.private_event.clone());

    for mode in [PolicyMode::Flat, PolicyMode::RoleBased] {
        let config = FieldgateConfig {
            policy_mode: mode,
            ..FieldgateConfig::default()
        };
        let gate = AuthorizationGate::from_config(&config, store.clone()).unwrap();
        assert_eq!(gate.policy().len(), 73, "{mode}");
        let owner = gate
            .evaluate_and_gate("Event", "title", caller(&town.owner), &Args::new(), Some(&parent))
            .await
            .unwrap();
        let stranger = gate
            .evaluate_and_gate(
                "Event",
                "title",
                caller(&town.stranger),
                &Args::new(),
                Some(&parent),
            )
            .await
            .unwrap();
        assert!(owner, "{mode}: attending owner reads a private title");
        assert!(!stranger, "{mode}: stranger cannot");
        assert!(
            !gate
                .evaluate_and_gate("Secret", "x", caller(&town.admin), &Args::new(), None)
                .await
                .unwrap()
        );
    }

    let open = FieldgateConfig {
        fallback: Fallback::Allow,
        ..FieldgateConfig::default()
    };
    let gate = AuthorizationGate::from_config(&open, store).unwrap();
    assert!(
        gate.evaluate_and_gate("Secret", "x", None, &Args::new(), None)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn config_carries_gate_options() {
    let town = Town::new();
    let config = FieldgateConfig {
        strict_cache: false,
        request_timeout_ms: Some(250),
        debug: true,
        ..FieldgateConfig::default()
    };
    let gate = AuthorizationGate::from_config(&config, Arc::new(town.store())).unwrap();
    let options = gate.options();
    assert!(!options.strict_cache);
    assert_eq!(options.request_timeout, Some(Duration::from_millis(250)));
    assert!(options.debug);
}

#[test]
fn invalid_config_never_builds_a_gate() {
    let town = Town::new();
    let config = FieldgateConfig {
        request_timeout_ms: Some(0),
        ..FieldgateConfig::default()
    };
    let err = AuthorizationGate::from_config(&config, Arc::new(town.store())).unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
}
