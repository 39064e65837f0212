mod common;

use bstr::BString;
use common::Fixture;
use octo_merge::strategy::MergeStrategy;
use octo_merge::{MergeError, MergeOptions, MergeStatus, ResolveStrategy, UnpackError};
use octo_object::FileMode;

fn strategy(f: &Fixture) -> ResolveStrategy<'_> {
    ResolveStrategy::new(
        &f.repo,
        MergeOptions {
            quiet: true,
            ..MergeOptions::default()
        },
    )
}

#[test]
fn tree_level_merge_is_clean() {
    let f = Fixture::new();
    let base = f.commit(&[("f", "1\n")], &[]);
    let head = f.commit(&[("f", "1\n"), ("g", "head\n")], &[base]);
    let remote = f.commit(&[("f", "2\n")], &[base]);
    f.checkout(head);

    let outcome = strategy(&f).run(&[base], Some(&head), Some(&remote)).unwrap();
    assert_eq!(outcome.status, MergeStatus::Clean);
    assert_eq!(outcome.tree, Some(f.tree(&[("f", "2\n"), ("g", "head\n")])));
    assert_eq!(outcome.merged, vec![head, remote]);
    assert_eq!(f.read("f"), "2\n");
    assert_eq!(f.read("g"), "head\n");
    assert!(f.unmerged().is_empty());
}

#[test]
fn content_merge_resolves_both_sided_edits() {
    let f = Fixture::new();
    let base = f.commit(&[("f", "1\n2\n3\n")], &[]);
    let head = f.commit(&[("f", "one\n2\n3\n")], &[base]);
    let remote = f.commit(&[("f", "1\n2\nthree\n")], &[base]);
    f.checkout(head);

    let outcome = strategy(&f).run(&[base], Some(&head), Some(&remote)).unwrap();
    assert_eq!(outcome.status, MergeStatus::Clean);
    assert_eq!(outcome.tree, Some(f.tree(&[("f", "one\n2\nthree\n")])));
    assert_eq!(f.read("f"), "one\n2\nthree\n");
    assert_eq!(f.merged_blob("f"), "one\n2\nthree\n");
}

#[test]
fn conflicts_are_left_for_the_operator() {
    let f = Fixture::new();
    let base = f.commit(&[("f", "a\n"), ("other", "o\n")], &[]);
    let head_tree = f.tree_with_modes(&[
        ("f", "X\n", FileMode::Executable),
        ("other", "o\n", FileMode::Regular),
    ]);
    let head = f.commit_tree(head_tree, &[base]);
    let remote = f.commit(&[("f", "Y\n"), ("other", "O\n")], &[base]);
    f.checkout(head);

    let outcome = strategy(&f).run(&[base], Some(&head), Some(&remote)).unwrap();
    assert_eq!(outcome.status, MergeStatus::Conflicted);
    assert_eq!(outcome.tree, None);
    assert_eq!(f.read("f"), "<<<<<<< our\nX\n=======\nY\n>>>>>>> their\n");
    assert_eq!(f.unmerged(), vec![BString::from("f")]);
    assert_eq!(f.stages("f"), vec![1, 2, 3]);
    // The rest of the merge went through.
    assert_eq!(f.read("other"), "O\n");
}

#[test]
fn path_only_we_added_survives() {
    let f = Fixture::new();
    let base = f.commit(&[("f", "1\n")], &[]);
    let head = f.commit(&[("f", "1\n"), ("ours", "mine\n")], &[base]);
    let remote = f.commit(&[("f", "1\n"), ("theirs", "yours\n")], &[base]);
    f.checkout(head);

    let outcome = strategy(&f).run(&[base], Some(&head), Some(&remote)).unwrap();
    assert_eq!(outcome.status, MergeStatus::Clean);
    assert_eq!(f.read("ours"), "mine\n");
    assert_eq!(f.read("theirs"), "yours\n");
}

#[test]
fn local_edit_to_merged_path_stops_the_merge() {
    let f = Fixture::new();
    let base = f.commit(&[("f", "1\n")], &[]);
    let head = f.commit(&[("f", "1\n")], &[base]);
    let remote = f.commit(&[("f", "2\n")], &[base]);
    f.checkout(head);
    f.write("f", "local edit\n");

    let err = strategy(&f)
        .run(&[base], Some(&head), Some(&remote))
        .unwrap_err();
    assert!(
        matches!(err, MergeError::Unpack(UnpackError::NotUptodate { .. })),
        "{err}"
    );
    assert_eq!(f.read("f"), "local edit\n");
    assert!(!f.repo.git_dir().join("index.lock").exists());
}

#[test]
fn strategy_handles_exactly_one_remote() {
    let f = Fixture::new();
    let base = f.commit(&[("f", "1\n")], &[]);
    let r1 = f.commit(&[("f", "2\n")], &[base]);
    let r2 = f.commit(&[("f", "3\n")], &[base]);
    f.checkout(base);

    let s = strategy(&f);
    assert_eq!(s.name(), "resolve");
    let err = s.merge(&[base], &base, &[r1, r2]).unwrap_err();
    assert_eq!(err.to_string(), "Not handling anything other than two heads merge.");

    let outcome = s.merge(&[base], &base, &[r1]).unwrap();
    assert_eq!(outcome.status, MergeStatus::Clean);
    assert_eq!(f.read("f"), "2\n");
}
