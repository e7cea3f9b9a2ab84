use depsolve::core::constraint::Constraint;
use depsolve::core::manifest::ProjectProperties;
use depsolve::core::project::ProjectRoot;
use depsolve::ops::{ProjectMetadata, delete_from_root, merge_metadata};

use solver_tests::helpers::locked;

fn constrained(meta: &mut ProjectMetadata, root: &str, c: Constraint) {
    meta.manifest
        .constraints
        .insert(ProjectRoot::new(root), ProjectProperties::constrained(c));
}

#[test]
fn merging_into_an_empty_parent_adopts_the_subtree_lock() {
    let mut source = ProjectMetadata::default();
    source.lock.upsert_project(locked("example.com/a", "v1.0.0"));
    source.lock.upsert_project(locked("example.com/b", "v2.1.0"));

    let mut target = ProjectMetadata::default();
    merge_metadata(&source, &mut target).unwrap();
    assert_eq!(target.lock, source.lock);
}

#[test]
fn a_literal_master_parent_constraint_yields_to_the_subtree_pin() {
    let mut target = ProjectMetadata::default();
    target.lock.upsert_project(locked("example.com/bar", "v0.9.0"));
    constrained(&mut target, "example.com/bar", Constraint::branch("master"));

    let mut source = ProjectMetadata::default();
    source.lock.upsert_project(locked("example.com/bar", "v1.1.0"));

    merge_metadata(&source, &mut target).unwrap();
    assert_eq!(
        target
            .lock
            .project_for(&ProjectRoot::new("example.com/bar"))
            .unwrap()
            .version
            .to_string(),
        "v1.1.0"
    );
}

#[test]
fn merge_is_associative_when_no_conflicts_arise() {
    let mut a = ProjectMetadata::default();
    a.lock.upsert_project(locked("example.com/x", "v1.0.0"));
    let mut b = ProjectMetadata::default();
    b.lock.upsert_project(locked("example.com/y", "v1.0.0"));
    let mut c = ProjectMetadata::default();
    c.lock.upsert_project(locked("example.com/z", "v1.0.0"));

    // (target <- a) <- b  versus  target <- (a <- b), checked over the lock.
    let mut left = ProjectMetadata::default();
    merge_metadata(&a, &mut left).unwrap();
    merge_metadata(&b, &mut left).unwrap();
    merge_metadata(&c, &mut left).unwrap();

    let mut ab = a.clone();
    merge_metadata(&b, &mut ab).unwrap();
    let mut right = ProjectMetadata::default();
    merge_metadata(&ab, &mut right).unwrap();
    merge_metadata(&c, &mut right).unwrap();

    assert_eq!(left.lock, right.lock);
}

#[test]
fn delete_from_root_removes_the_git_suffixed_variant_too() {
    let mut target = ProjectMetadata::default();
    target.lock.upsert_project(locked("example.com/gone", "v1.0.0"));
    target
        .lock
        .upsert_project(locked("example.com/gone.git", "v1.0.0"));
    target.lock.upsert_project(locked("example.com/kept", "v1.0.0"));
    constrained(&mut target, "example.com/gone", Constraint::Any);

    delete_from_root(&mut target, &ProjectRoot::new("example.com/gone"));

    assert!(
        target
            .lock
            .project_for(&ProjectRoot::new("example.com/gone"))
            .is_none()
    );
    assert!(
        target
            .lock
            .project_for(&ProjectRoot::new("example.com/gone.git"))
            .is_none()
    );
    assert!(
        target
            .lock
            .project_for(&ProjectRoot::new("example.com/kept"))
            .is_some()
    );
    assert!(target.manifest.constraints.is_empty());
}
