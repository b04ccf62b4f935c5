use super::*;
use crate::script::Script;

fn rev(s: &str) -> RevisionId {
    RevisionId::try_new(s).unwrap()
}

fn rec(id: &str, down: Option<&str>) -> MigrationRecord {
    MigrationRecord::from_scripts(rev(id), down.map(rev), Script::default(), Some(Script::default()))
}

fn rec_with_deps(id: &str, down: Option<&str>, deps: &[&str]) -> MigrationRecord {
    rec(id, down).with_depends_on(deps.iter().map(|d| rev(d)).collect())
}

/// a -> b -> c
fn linear() -> MigrationStore {
    MigrationStore::from_records([rec("a", None), rec("b", Some("a")), rec("c", Some("b"))])
        .unwrap()
}

fn markers<'p>(plan: &'p MigrationPlan<'_>) -> Vec<Option<&'p str>> {
    plan.steps.iter().map(|s| s.marker_after.as_deref()).collect()
}

#[test]
fn test_history_is_chain_order() {
    let store = MigrationStore::from_records([
        rec("c", Some("b")),
        rec("a", None),
        rec("b", Some("a")),
    ])
    .unwrap();
    let resolver = ChainResolver::build(&store).unwrap();
    let order: Vec<&str> = resolver.history().into_iter().map(|r| r.revision.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn test_upgrade_from_base_to_head() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver.plan_upgrade(None, &Target::Head).unwrap();

    assert_eq!(plan.direction, Direction::Upgrade);
    assert_eq!(plan.revisions(), vec!["a", "b", "c"]);
    assert_eq!(plan.to.as_deref(), Some("c"));
    assert_eq!(
        markers(&plan),
        vec![Some("a"), Some("b"), Some("c")]
    );
}

#[test]
fn test_upgrade_at_head_is_empty() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver.plan_upgrade(Some(&rev("c")), &Target::Head).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.to.as_deref(), Some("c"));
}

#[test]
fn test_upgrade_partial_range() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver
        .plan_upgrade(Some(&rev("a")), &Target::Revision("b".into()))
        .unwrap();
    assert_eq!(plan.revisions(), vec!["b"]);
}

#[test]
fn test_upgrade_relative() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver.plan_upgrade(None, &Target::Relative(2)).unwrap();
    assert_eq!(plan.revisions(), vec!["a", "b"]);

    let err = resolver
        .plan_upgrade(Some(&rev("b")), &Target::Relative(2))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTarget { .. }));
}

#[test]
fn test_upgrade_to_older_revision_is_invalid() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let err = resolver
        .plan_upgrade(Some(&rev("c")), &Target::Revision("a".into()))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTarget { .. }));
}

#[test]
fn test_downgrade_to_revision_excludes_target() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver
        .plan_downgrade(Some(&rev("c")), &Target::Revision("a".into()))
        .unwrap();

    assert_eq!(plan.direction, Direction::Downgrade);
    assert_eq!(plan.revisions(), vec!["c", "b"]);
    assert_eq!(markers(&plan), vec![Some("b"), Some("a")]);
    assert_eq!(plan.to.as_deref(), Some("a"));
}

#[test]
fn test_downgrade_one_step() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver
        .plan_downgrade(Some(&rev("c")), &Target::Relative(-1))
        .unwrap();
    assert_eq!(plan.revisions(), vec!["c"]);
    assert_eq!(plan.to.as_deref(), Some("b"));
}

#[test]
fn test_downgrade_to_base() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver
        .plan_downgrade(Some(&rev("c")), &Target::Base)
        .unwrap();
    assert_eq!(plan.revisions(), vec!["c", "b", "a"]);
    assert_eq!(markers(&plan), vec![Some("b"), Some("a"), None]);
    assert_eq!(plan.to, None);
}

#[test]
fn test_downgrade_past_base_is_invalid() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let err = resolver
        .plan_downgrade(Some(&rev("b")), &Target::Relative(-3))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTarget { .. }));
}

#[test]
fn test_downgrade_with_nothing_applied() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    assert!(resolver
        .plan_downgrade(None, &Target::Relative(-1))
        .unwrap()
        .is_empty());
}

#[test]
fn test_full_order_round_trip_inverts() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let up = resolver.order(None, Some(&rev("c"))).unwrap();
    let down = resolver.order(Some(&rev("c")), None).unwrap();

    let mut reversed = up.revisions();
    reversed.reverse();
    assert_eq!(down.revisions(), reversed);
    assert_eq!(up.direction, Direction::Upgrade);
    assert_eq!(down.direction, Direction::Downgrade);
}

#[test]
fn test_order_picks_direction() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver.order(Some(&rev("c")), Some(&rev("a"))).unwrap();
    assert_eq!(plan.direction, Direction::Downgrade);
    assert_eq!(plan.revisions(), vec!["c", "b"]);

    let plan = resolver.order(Some(&rev("b")), Some(&rev("b"))).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_shared_predecessor_is_multiple_heads() {
    let store = MigrationStore::from_records([
        rec("a", None),
        rec("b", Some("a")),
        rec("c", Some("a")),
    ])
    .unwrap();
    let resolver = ChainResolver::build(&store).unwrap();

    let err = resolver.plan_upgrade(None, &Target::Head).unwrap_err();
    match err {
        CoreError::MultipleHeads { heads } => assert_eq!(heads, vec!["b", "c"]),
        other => panic!("unexpected error: {other}"),
    }

    // Naming a revision on one branch does not make the marker unambiguous
    let err = resolver
        .plan_upgrade(None, &Target::Revision("c".into()))
        .unwrap_err();
    assert!(matches!(err, CoreError::MultipleHeads { .. }));
    assert!(err.to_string().starts_with("[E007]"));
}

#[test]
fn test_dangling_predecessor_is_broken_chain() {
    let store =
        MigrationStore::from_records([rec("a", None), rec("b", Some("missing"))]).unwrap();
    let err = ChainResolver::build(&store).unwrap_err();
    match err {
        CoreError::BrokenChain { revision, missing } => {
            assert_eq!(revision, "b");
            assert_eq!(missing, "missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_dangling_extra_dependency_is_broken_chain() {
    let store = MigrationStore::from_records([
        rec("a", None),
        rec_with_deps("b", Some("a"), &["zzz"]),
    ])
    .unwrap();
    assert!(matches!(
        ChainResolver::build(&store).unwrap_err(),
        CoreError::BrokenChain { .. }
    ));
}

#[test]
fn test_cycle_detected() {
    let store = MigrationStore::from_records([
        rec("a", None),
        rec("b", Some("c")),
        rec("c", Some("b")),
    ])
    .unwrap();
    match ChainResolver::build(&store).unwrap_err() {
        CoreError::CycleDetected { cycle } => {
            assert!(cycle.contains("b") && cycle.contains("c"), "{cycle}");
            assert!(cycle.contains(" -> "));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_extra_dependency_cycle_detected() {
    let store = MigrationStore::from_records([
        rec_with_deps("a", None, &["c"]),
        rec("b", Some("a")),
        rec("c", Some("b")),
    ])
    .unwrap();
    assert!(matches!(
        ChainResolver::build(&store).unwrap_err(),
        CoreError::CycleDetected { .. }
    ));
}

#[test]
fn test_multiple_roots_rejected() {
    let store = MigrationStore::from_records([
        rec("a", None),
        rec("b", Some("a")),
        rec("x", None),
        rec_with_deps("y", Some("x"), &["b"]),
    ])
    .unwrap();
    let resolver = ChainResolver::build(&store).unwrap();
    let err = resolver
        .plan_upgrade(None, &Target::Revision("y".into()))
        .unwrap_err();
    match err {
        CoreError::MultipleRoots { roots } => assert_eq!(roots, vec!["a", "x"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_merge_via_extra_dependency_is_rejected() {
    // a -> c, a -> b, m revises b and depends on c
    let store = MigrationStore::from_records([
        rec("a", None),
        rec("c", Some("a")),
        rec("b", Some("a")),
        rec_with_deps("m", Some("b"), &["c"]),
    ])
    .unwrap();
    let resolver = ChainResolver::build(&store).unwrap();

    // Only one record lacks a successor, but the chain still branches at a
    assert_eq!(resolver.heads().len(), 1);
    for target in [Target::Head, Target::Revision("m".into()), Target::Relative(3)] {
        match resolver.plan_upgrade(None, &target).unwrap_err() {
            CoreError::MultipleHeads { heads } => assert_eq!(heads, vec!["c", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }
    assert!(matches!(
        resolver.plan_downgrade(Some(&rev("m")), &Target::Base).unwrap_err(),
        CoreError::MultipleHeads { .. }
    ));
    assert!(matches!(
        resolver.resolve_marker(None, &Target::Revision("b".into())).unwrap_err(),
        CoreError::MultipleHeads { .. }
    ));
    assert!(matches!(
        resolver.applied(Some(&rev("b"))).unwrap_err(),
        CoreError::MultipleHeads { .. }
    ));
}

#[test]
fn test_redundant_extra_dependency_keeps_chain_order() {
    // c also lists its grandparent a
    let store = MigrationStore::from_records([
        rec_with_deps("c", Some("b"), &["a"]),
        rec("a", None),
        rec("b", Some("a")),
    ])
    .unwrap();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver.plan_upgrade(None, &Target::Head).unwrap();
    assert_eq!(plan.revisions(), vec!["a", "b", "c"]);
}

#[test]
fn test_upgrade_relative_counts_steps() {
    let store = MigrationStore::from_records([
        rec("a", None),
        rec("b", Some("a")),
        rec_with_deps("c", Some("b"), &["a"]),
        rec_with_deps("d", Some("c"), &["a", "b"]),
    ])
    .unwrap();
    let resolver = ChainResolver::build(&store).unwrap();

    let plan = resolver.plan_upgrade(None, &Target::Relative(3)).unwrap();
    assert_eq!(plan.revisions(), vec!["a", "b", "c"]);
    assert_eq!(plan.to.as_deref(), Some("c"));

    let plan = resolver
        .plan_upgrade(Some(&rev("a")), &Target::Relative(2))
        .unwrap();
    assert_eq!(plan.revisions(), vec!["b", "c"]);

    let plan = resolver
        .plan_upgrade(Some(&rev("b")), &Target::Relative(2))
        .unwrap();
    assert_eq!(plan.revisions(), vec!["c", "d"]);

    match resolver
        .plan_upgrade(Some(&rev("c")), &Target::Relative(2))
        .unwrap_err()
    {
        CoreError::InvalidTarget { reason, .. } => assert!(reason.contains("only 1"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_prefix_target() {
    let store = MigrationStore::from_records([rec("abc1", None), rec("bcd2", Some("abc1"))])
        .unwrap();
    let resolver = ChainResolver::build(&store).unwrap();
    let plan = resolver
        .plan_upgrade(None, &Target::Revision("bc".into()))
        .unwrap();
    assert_eq!(plan.to.as_deref(), Some("bcd2"));
}

#[test]
fn test_unknown_current_marker() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    let err = resolver
        .plan_upgrade(Some(&rev("gone")), &Target::Head)
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownRevision { .. }));
}

#[test]
fn test_empty_store() {
    let store = MigrationStore::new();
    let resolver = ChainResolver::build(&store).unwrap();
    assert_eq!(resolver.head().unwrap(), None);
    assert!(resolver.plan_upgrade(None, &Target::Head).unwrap().is_empty());
}

#[test]
fn test_resolve_marker() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    assert_eq!(
        resolver.resolve_marker(None, &Target::Head).unwrap().as_deref(),
        Some("c")
    );
    assert_eq!(resolver.resolve_marker(Some(&rev("c")), &Target::Base).unwrap(), None);
    assert_eq!(
        resolver
            .resolve_marker(Some(&rev("c")), &Target::Relative(-1))
            .unwrap()
            .as_deref(),
        Some("b")
    );
}

#[test]
fn test_applied_records() {
    let store = linear();
    let resolver = ChainResolver::build(&store).unwrap();
    assert!(resolver.applied(None).unwrap().is_empty());
    let applied: Vec<&str> = resolver
        .applied(Some(&rev("b")))
        .unwrap()
        .into_iter()
        .map(|r| r.revision.as_str())
        .collect();
    assert_eq!(applied, vec!["a", "b"]);
}
