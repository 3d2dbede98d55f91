// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command implementations for the `fieldgate` CLI.
//!
//! Each command returns its report instead of printing, so it can be
//! tested without spawning the binary.

use anyhow::{Context, Result, bail};
use fg_config::{ConfigWarning, FieldgateConfig, PolicyMode, load_config, validate_config};
use fg_core::{Args, Caller, Record, UserId};
use fg_error::FgError;
use fg_gate::{AuthorizationGate, Denial, GateError, GateOptions};
use fg_policy::PolicyTree;
use fg_store::{Fixture, InMemoryStore};
use fg_telemetry::{DecisionCollector, DecisionSummary};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const RECORD_TYPES: [&str; 5] = ["User", "Category", "Event", "Invitation", "Post"];

/// Build the tree of one authoring style.
pub fn build_policy(mode: PolicyMode) -> Result<PolicyTree> {
    let tree = match mode {
        PolicyMode::Flat => PolicyTree::flat(),
        PolicyMode::RoleBased => PolicyTree::role_based(),
    };
    tree.map_err(|e| FgError::from(GateError::from(e)))
        .with_context(|| format!("build {mode} policy tree"))
}

// ---------------------------------------------------------------------------
// tree
// ---------------------------------------------------------------------------

/// `{type: {field: expression}}` for the given style, pretty-printed.
pub fn tree_json(mode: PolicyMode) -> Result<String> {
    let tree = build_policy(mode)?;
    serde_json::to_string_pretty(&tree.describe()).context("serialize policy tree")
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

/// Inputs of `fieldgate check`.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Schema type name.
    pub type_name: String,
    /// Field or operation name.
    pub field: String,
    /// Id of a fixture user; anonymous when absent.
    pub caller: Option<String>,
    /// `KIND:ID` of the parent record.
    pub parent: Option<String>,
    /// Arguments as a JSON object.
    pub args: Option<String>,
}

/// Result of `fieldgate check`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// `Type.field`.
    pub site: String,
    /// Final decision.
    pub allowed: bool,
    /// Why it was denied.
    pub denial: Option<Denial>,
    /// The rule that was evaluated.
    pub rule: String,
    /// Whether the path is listed or fell back.
    pub listed: bool,
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.denial {
            None => writeln!(f, "allow {}", self.site)?,
            Some(denial) => writeln!(f, "deny {}: {denial}", self.site)?,
        }
        let origin = if self.listed { "rule" } else { "fallback" };
        write!(f, "{origin}: {}", self.rule)
    }
}

/// Evaluate one path against a fixture.
pub async fn check(
    fixture_path: &Path,
    config: &FieldgateConfig,
    request: &CheckRequest,
) -> Result<CheckReport> {
    let fixture = Fixture::load(fixture_path)?;
    let caller = match &request.caller {
        Some(id) => Some(fixture_caller(&fixture, id)?),
        None => None,
    };
    let parent = match &request.parent {
        Some(spec) => Some(find_parent(&fixture, spec)?),
        None => None,
    };
    let args = parse_args(request.args.as_deref())?;

    let store = Arc::new(InMemoryStore::from_fixture(fixture));
    let gate =
        AuthorizationGate::from_config(config, store).context("build authorization gate")?;
    let policy = gate.policy();
    let (rule, listed) = match policy.get(&request.type_name, &request.field) {
        Some(rule) => (rule.describe(), true),
        None => (policy.fallback().describe(), false),
    };

    let decision = gate
        .begin(caller)
        .check(&request.type_name, &request.field, &args, parent.as_ref())
        .await?;

    Ok(CheckReport {
        site: decision.site,
        allowed: decision.allowed,
        denial: decision.denial,
        rule,
        listed,
    })
}

fn fixture_caller(fixture: &Fixture, id: &str) -> Result<Caller> {
    let uuid = uuid::Uuid::parse_str(id).with_context(|| format!("caller id '{id}'"))?;
    let user = fixture
        .user(UserId::from(uuid))
        .with_context(|| format!("no user '{id}' in fixture"))?;
    Ok(Caller::new(user.id, user.role))
}

/// Resolve `KIND:ID`. The kind is matched case-insensitively.
pub fn find_parent(fixture: &Fixture, spec: &str) -> Result<Record> {
    let Some((kind, id)) = spec.split_once(':') else {
        bail!("parent must be KIND:ID, got '{spec}'");
    };
    let Some(type_name) = RECORD_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(kind.trim()))
    else {
        bail!(
            "unknown parent kind '{kind}' (expected one of {})",
            RECORD_TYPES.join(", ")
        );
    };
    fixture
        .find(type_name, id.trim())
        .with_context(|| format!("no {type_name} '{id}' in fixture"))
}

/// Parse `--args`; absent means no arguments.
pub fn parse_args(raw: Option<&str>) -> Result<Args> {
    let Some(raw) = raw else {
        return Ok(Args::new());
    };
    let value: serde_json::Value = serde_json::from_str(raw).context("parse --args as JSON")?;
    Args::from_value(value).context("--args must be a JSON object")
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

/// Result of `fieldgate diff`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    /// Decisions compared.
    pub checked: usize,
    /// Human-readable description of every disagreement.
    pub disagreements: Vec<String>,
    /// Statistics over every check both gates made.
    pub summary: DecisionSummary,
}

impl DiffReport {
    /// Whether both styles agreed everywhere.
    pub fn is_clean(&self) -> bool {
        self.disagreements.is_empty()
    }
}

/// Argument bags for root operations, built from the fixture's records:
/// no arguments, every event paired with every user, events as input
/// objects, a fresh private event, every invitation, post, category and
/// user on its own, and a post input naming the first event.
pub fn arg_variants(fixture: &Fixture) -> Vec<Args> {
    let mut out = vec![Args::new()];
    for event in &fixture.events {
        for user in &fixture.users {
            out.push(
                Args::new()
                    .with("event", event.id.to_string())
                    .with("user", user.id.to_string()),
            );
        }
        out.push(Args::new().with(
            "event",
            serde_json::json!({ "_id": event.id.to_string(), "private": event.private }),
        ));
    }
    out.push(Args::new().with(
        "event",
        serde_json::json!({ "title": "new", "private": true }),
    ));
    for invitation in &fixture.invitations {
        out.push(Args::new().with("invitation", invitation.id.to_string()));
    }
    for post in &fixture.posts {
        out.push(Args::new().with("post", post.id.to_string()));
    }
    if let Some(event) = fixture.events.first() {
        out.push(Args::new().with(
            "post",
            serde_json::json!({ "postedAt": event.id.to_string(), "content": "hi" }),
        ));
    }
    for category in &fixture.categories {
        out.push(Args::new().with("category", category.id.to_string()));
    }
    for user in &fixture.users {
        out.push(Args::new().with("user", user.id.to_string()));
    }
    out
}

/// Compare both authoring styles on every path, for every fixture user
/// plus the anonymous caller. Record fields are checked against every
/// fixture record of their type; root operations against every bag from
/// [`arg_variants`].
pub async fn diff(fixture_path: &Path) -> Result<DiffReport> {
    let fixture = Fixture::load(fixture_path)?;
    let store = Arc::new(InMemoryStore::from_fixture(fixture.clone()));
    let collector = DecisionCollector::new();
    let options = GateOptions::default().with_collector(collector.clone());
    let flat = AuthorizationGate::new(
        build_policy(PolicyMode::Flat)?,
        store.clone(),
        options.clone(),
    );
    let composed = AuthorizationGate::new(build_policy(PolicyMode::RoleBased)?, store, options);

    let mut report = DiffReport::default();
    let flat_paths: BTreeSet<_> = flat.policy().paths().into_iter().collect();
    let composed_paths: BTreeSet<_> = composed.policy().paths().into_iter().collect();
    for (ty, field) in flat_paths.symmetric_difference(&composed_paths) {
        report
            .disagreements
            .push(format!("{ty}.{field}: listed by only one style"));
    }

    let mut callers: Vec<Option<Caller>> = fixture
        .users
        .iter()
        .map(|u| Some(Caller::new(u.id, u.role)))
        .collect();
    callers.push(None);
    let root_args = arg_variants(&fixture);
    let no_args = [Args::new()];

    for (ty, field) in flat_paths.intersection(&composed_paths) {
        let (parents, arg_sets): (Vec<Option<Record>>, &[Args]) =
            if RECORD_TYPES.contains(&ty.as_str()) {
                let parents = fixture.records_of(ty).into_iter().map(Some).collect();
                (parents, &no_args)
            } else {
                (vec![None], &root_args)
            };
        for caller in &callers {
            for parent in &parents {
                for args in arg_sets {
                    // One request per combination keeps per-request caches apart.
                    let left = flat.begin(*caller).check(ty, field, args, parent.as_ref()).await;
                    let right = composed
                        .begin(*caller)
                        .check(ty, field, args, parent.as_ref())
                        .await;
                    report.checked += 1;
                    let (left, right) = match (left, right) {
                        (Ok(l), Ok(r)) => (l.allowed, r.allowed),
                        (l, r) => bail!(
                            "{ty}.{field}: evaluation failed (flat: {:?}, role_based: {:?})",
                            l.err().map(|e| e.to_string()),
                            r.err().map(|e| e.to_string())
                        ),
                    };
                    if left != right {
                        let who = caller.map_or("anonymous".to_string(), |c| c.id.to_string());
                        let on = parent
                            .as_ref()
                            .map_or("-".to_string(), |p| p.id().to_string());
                        report.disagreements.push(format!(
                            "{ty}.{field} caller={who} parent={on} args={args:?}: \
                             flat={left} role_based={right}"
                        ));
                    }
                }
            }
        }
        debug!(site = %format!("{ty}.{field}"), "compared");
    }

    collector.emit();
    report.summary = collector.summary();
    info!(
        checked = report.checked,
        disagreements = report.disagreements.len(),
        "diff finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// config-check
// ---------------------------------------------------------------------------

/// Load and validate a config file; returns the advisory warnings.
pub fn config_check(path: Option<&Path>) -> Result<Vec<ConfigWarning>> {
    let config = load_config(path).map_err(FgError::from)?;
    let warnings = validate_config(&config).map_err(FgError::from)?;
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_tree_json_lists_every_type() {
        let json: serde_json::Value =
            serde_json::from_str(&tree_json(PolicyMode::Flat).unwrap()).unwrap();
        let obj = json.as_object().unwrap();
        for ty in ["User", "Category", "Invitation", "Event", "Post", "Query", "Mutation"] {
            assert!(obj.contains_key(ty), "{ty} missing");
        }
        assert_eq!(json["Mutation"]["deleteEvent"], "caller_owns_arg");
    }

    #[test]
    fn args_must_be_an_object() {
        assert!(parse_args(None).unwrap().is_empty());
        assert!(parse_args(Some("{\"event\": \"x\"}")).unwrap().contains("event"));
        assert!(parse_args(Some("[1, 2]")).is_err());
        assert!(parse_args(Some("{nope")).is_err());
    }

    #[test]
    fn parent_spec_is_validated() {
        let fixture = Fixture::default();
        let err = find_parent(&fixture, "Event").unwrap_err();
        assert!(err.to_string().contains("KIND:ID"));
        let err = find_parent(&fixture, "Comment:1").unwrap_err();
        assert!(err.to_string().contains("unknown parent kind"));
        let err = find_parent(&fixture, "event:00000000-0000-0000-0000-000000000000").unwrap_err();
        assert!(err.to_string().contains("no Event"));
    }

    #[test]
    fn arg_variants_cover_every_record() {
        let fixture = Fixture::load(
            &Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/town.json"),
        )
        .unwrap();
        let variants = arg_variants(&fixture);
        assert!(variants[0].is_empty());
        for event in &fixture.events {
            let id = event.id.to_string();
            assert!(variants.iter().any(|a| a.get("event") == Some(&serde_json::json!(id))
                || a.get("event").and_then(|v| v.get("_id")) == Some(&serde_json::json!(id))));
        }
        for key in ["invitation", "post", "category", "user"] {
            assert!(variants.iter().any(|a| a.contains(key)), "{key} missing");
        }
        let expected = 1
            + fixture.events.len() * (fixture.users.len() + 1)
            + 1
            + fixture.invitations.len()
            + fixture.posts.len()
            + 1
            + fixture.categories.len()
            + fixture.users.len();
        assert_eq!(variants.len(), expected);
    }

    #[tokio::test]
    async fn diff_exercises_mutations_both_ways() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/town.json");
        let report = diff(&path).await.unwrap();
        assert!(report.is_clean(), "{:#?}", report.disagreements);
        assert_eq!(report.summary.count, report.checked * 2);
        // With real argument bags some mutations are allowed, not just denied.
        assert!(report.summary.allowed > 0);
        assert!(report.summary.denials_by_site.contains_key("Mutation.deleteEvent"));
    }

    #[test]
    fn report_display() {
        let report = CheckReport {
            site: "User.name".into(),
            allowed: false,
            denial: Some(Denial::AuthenticationRequired),
            rule: "is_logged_in".into(),
            listed: true,
        };
        assert_eq!(
            report.to_string(),
            "deny User.name: must be logged in\nrule: is_logged_in"
        );
    }
}
