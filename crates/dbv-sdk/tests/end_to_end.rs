use dbv_sdk::{
    ChangeKind, CheckStatus, DependencyKind, ErrorKind, MergeStatus, ObjectChange, ObjectClassification,
    ObjectKey, ObjectType, PathStatus, Repository, RepositoryConfig, ResolutionChoice, RollbackMode,
    SemVer, Severity,
};

fn repo() -> Repository {
    Repository::init(RepositoryConfig::default()).unwrap()
}

fn table(name: &str) -> ObjectKey {
    ObjectKey::new(ObjectType::Table, "public", name).unwrap()
}

#[test]
fn minor_alter_bumps_minor_and_logs_one_entry() {
    let repo = repo();
    let ctx = repo.context();
    let created = repo
        .record_change(
            &ctx,
            ObjectChange::create(ObjectType::Table, "public", "users", "CREATE TABLE users (id int)"),
        )
        .unwrap();
    assert_eq!(created.version, SemVer::new(1, 0, 0));

    let altered = repo
        .record_change(
            &ctx,
            ObjectChange::alter(
                ObjectType::Table,
                "public",
                "users",
                "CREATE TABLE users (id int, email text)",
            )
            .with_severity(Severity::Minor),
        )
        .unwrap();
    assert_eq!(altered.version, SemVer::new(1, 1, 0));
    assert_eq!(altered.change_count, 1);

    let entries = repo.commit_entries(&altered.commit.unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, ChangeKind::Alter);
    assert_eq!(entries[0].before_version, Some(SemVer::new(1, 0, 0)));
    assert_eq!(entries[0].after_version, SemVer::new(1, 1, 0));
}

#[test]
fn both_sides_modifying_an_object_conflicts() {
    let repo = repo();
    let main = repo.context();
    repo.record_change(
        &main,
        ObjectChange::create(ObjectType::Table, "public", "x", "CREATE TABLE x (a int)"),
    )
    .unwrap();
    repo.create_branch("feature", "main").unwrap();
    let feature = main.on_branch("feature");

    repo.record_change(
        &feature,
        ObjectChange::alter(ObjectType::Table, "public", "x", "CREATE TABLE x (a bigint)"),
    )
    .unwrap();
    repo.record_change(
        &main,
        ObjectChange::alter(ObjectType::Table, "public", "x", "CREATE TABLE x (a text)"),
    )
    .unwrap();

    let diff = repo.diff_branches("main", "feature").unwrap();
    assert_eq!(diff.get("table/public.x").unwrap().status, PathStatus::Conflict);

    let source = repo.head("feature").unwrap().unwrap();
    let target = repo.head("main").unwrap().unwrap();
    let op = repo.start_merge(&main, "feature", None).unwrap();
    assert_eq!(op.status(), MergeStatus::AwaitingResolution);
    let base = op.base_commit;
    let three_way = repo.three_way_diff(&source, &target, base.as_ref()).unwrap();
    assert_eq!(
        three_way.get("table/public.x").unwrap().classification,
        ObjectClassification::BothModifiedDifferent
    );

    let done = repo
        .resolve_conflict(&main, op.id, "table/public.x", ResolutionChoice::Theirs)
        .unwrap();
    assert_eq!(done.status(), MergeStatus::Completed);
    let merge_commit = repo.commit(&done.merge_commit.unwrap()).unwrap();
    assert_eq!(merge_commit.parents, vec![target, source]);
    assert_eq!(
        repo.object("main", &table("x")).unwrap().definition.as_deref(),
        Some("CREATE TABLE x (a bigint)")
    );
}

#[test]
fn conflict_detection_names_each_difference() {
    let repo = repo();
    let main = repo.context();
    for name in ["kept", "gone", "changed"] {
        repo.record_change(
            &main,
            ObjectChange::create(ObjectType::Table, "public", name, &format!("CREATE TABLE {name} (id int)")),
        )
        .unwrap();
    }
    repo.create_branch("feature", "main").unwrap();
    let feature = main.on_branch("feature");
    repo.record_change(
        &feature,
        ObjectChange::create(ObjectType::Table, "public", "fresh", "CREATE TABLE fresh (id int)"),
    )
    .unwrap();
    repo.record_change(&feature, ObjectChange::drop(ObjectType::Table, "public", "gone"))
        .unwrap();
    repo.record_change(
        &feature,
        ObjectChange::alter(ObjectType::Table, "public", "changed", "CREATE TABLE changed (id bigint)"),
    )
    .unwrap();

    let report = repo.detect_conflicts("feature", "main").unwrap();
    let types: Vec<String> = report
        .conflicts
        .iter()
        .map(|c| format!("{}={}", c.path, c.conflict_type))
        .collect();
    assert_eq!(
        types,
        vec![
            "table/public.changed=table_modified",
            "table/public.fresh=table_added",
            "table/public.gone=table_removed",
        ]
    );
}

#[test]
fn dependencies_order_and_reject_cycles() {
    let repo = repo();
    let ctx = repo.context();
    let (a, b, c) = (table("a"), table("b"), table("c"));
    repo.declare_dependency(&ctx, &b, &a, DependencyKind::Structural)
        .unwrap();
    repo.declare_dependency(&ctx, &c, &b, DependencyKind::Structural)
        .unwrap();

    let order = repo
        .dependency_order("main", &[c.clone(), b.clone(), a.clone()])
        .unwrap();
    assert_eq!(order, vec![a.clone(), b.clone(), c.clone()]);

    let err = repo
        .declare_dependency(&ctx, &a, &c, DependencyKind::Functional)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(repo.dependency_order("main", &[c.clone(), a.clone()]).unwrap(), vec![a, c]);
}

#[test]
fn dry_run_then_executed_rollback() {
    let repo = repo();
    let ctx = repo.context();
    repo.record_change(
        &ctx,
        ObjectChange::create(ObjectType::Function, "public", "f", "CREATE FUNCTION f() RETURNS int AS 'SELECT 1'"),
    )
    .unwrap();
    let bad = repo
        .record_change(
            &ctx,
            ObjectChange::alter(ObjectType::Function, "public", "f", "CREATE FUNCTION f() RETURNS int AS 'SELECT 2'"),
        )
        .unwrap()
        .commit
        .unwrap();
    let key = ObjectKey::new(ObjectType::Function, "public", "f").unwrap();

    let dry = repo.rollback_commit(&ctx, bad, RollbackMode::DryRun).unwrap();
    assert!(dry.is_success());
    assert!(dry.report.results.iter().all(|r| r.status == CheckStatus::Pass));
    assert_eq!(dry.changes.len(), 1);
    assert_eq!(repo.head("main").unwrap(), Some(bad));

    let done = repo.rollback_commit(&ctx, bad, RollbackMode::Executed).unwrap();
    let rollback_commit = done.operation.rollback_commit.unwrap();
    let entries = repo.commit_entries(&rollback_commit);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, ChangeKind::Rollback);
    assert_eq!(entries[0].before_hash, dry.changes[0].current);
    assert_eq!(entries[0].after_hash, dry.changes[0].restored);
    assert_eq!(
        repo.object("main", &key).unwrap().definition.as_deref(),
        Some("CREATE FUNCTION f() RETURNS int AS 'SELECT 1'")
    );
    assert!(repo.commit(&bad).is_ok());
}

#[test]
fn concurrent_writers_lose_cleanly() {
    let repo = repo();
    let first = repo
        .record_change(
            &repo.context(),
            ObjectChange::create(ObjectType::Sequence, "public", "ids", "CREATE SEQUENCE ids"),
        )
        .unwrap()
        .commit
        .unwrap();

    let writer_a = repo.context().at_head(first);
    let writer_b = repo.context().at_head(first);
    repo.record_change(
        &writer_a,
        ObjectChange::alter(ObjectType::Sequence, "public", "ids", "CREATE SEQUENCE ids START 10"),
    )
    .unwrap();
    let err = repo
        .record_change(
            &writer_b,
            ObjectChange::alter(ObjectType::Sequence, "public", "ids", "CREATE SEQUENCE ids START 20"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Concurrency);

    let key = ObjectKey::new(ObjectType::Sequence, "public", "ids").unwrap();
    assert_eq!(repo.current_version("main", &key).unwrap(), SemVer::new(1, 1, 0));
    assert_eq!(repo.history("main", &key, 0, None).unwrap().total, 2);
    repo.verify().unwrap();
}

#[test]
fn threads_share_one_repository() {
    let repo = std::sync::Arc::new(repo());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let repo = repo.clone();
            std::thread::spawn(move || {
                repo.record_change(
                    &repo.context(),
                    ObjectChange::create(ObjectType::View, "public", &format!("v{i}"), "SELECT 1"),
                )
                .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(repo.live_objects("main").unwrap().len(), 4);
    assert_eq!(repo.log("main", 10).unwrap().len(), 4);
}
