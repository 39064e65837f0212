mod common;

use common::TestRepo;
use octo_index::{IndexEntry, Stage};
use octo_object::FileMode;

/// A base commit and two children that each change a different line of `f`.
fn diverged(t: &TestRepo) -> [String; 3] {
    let base = t.commit(&[("f", "1\n2\n3\n4\n5\n")], &[]);
    let head = t.commit(&[("f", "one\n2\n3\n4\n5\n")], &[base]);
    let remote = t.commit(&[("f", "1\n2\n3\n4\nfive\n")], &[base]);
    t.checkout(head);
    [base.to_hex(), head.to_hex(), remote.to_hex()]
}

#[test]
fn help_and_bad_flags() {
    let t = TestRepo::new();
    assert_eq!(t.run(&["--help"]).exit_code, 0);
    assert_eq!(t.run(&["merge-resolve", "--bogus"]).exit_code, 128);
}

#[test]
fn resolve_needs_bases_head_and_remote() {
    let t = TestRepo::new();
    let [_, head, remote] = diverged(&t);

    let r = t.run(&["merge-resolve", "--", &head, &remote]);
    assert_eq!(r.exit_code, 128);
    assert!(r.stderr.contains("usage: octo merge-resolve"), "{}", r.stderr);
}

#[test]
fn resolve_clean_merge() {
    let t = TestRepo::new();
    let [base, head, remote] = diverged(&t);

    let r = t.run(&["merge-resolve", &base, "--", &head, &remote]);
    assert_eq!(r.exit_code, 0, "{}", r.stderr);
    assert!(r.stdout.contains("Trying simple merge."), "{}", r.stdout);
    assert!(r.stdout.contains("Auto-merging f"), "{}", r.stdout);
    assert!(!r.stderr.contains("Auto-merging"), "{}", r.stderr);
    assert_eq!(t.read("f"), "one\n2\n3\n4\nfive\n");
    assert!(t.unmerged().is_empty());
}

#[test]
fn resolve_conflict_exits_one() {
    let t = TestRepo::new();
    let base = t.commit(&[("f", "a\n")], &[]);
    let head = t.commit(&[("f", "b\n")], &[base]);
    let remote = t.commit(&[("f", "c\n")], &[base]);
    t.checkout(head);

    let r = t.run(&["merge-resolve", &base.to_hex(), "--", &head.to_hex(), &remote.to_hex()]);
    assert_eq!(r.exit_code, 1, "{}", r.stderr);
    assert!(r.stderr.contains("error: content conflict in f"), "{}", r.stderr);
    assert!(!r.stdout.contains("error:"), "{}", r.stdout);
    assert_eq!(t.read("f"), "<<<<<<< our\nb\n=======\nc\n>>>>>>> their\n");
    assert_eq!(t.unmerged(), vec!["f".to_string()]);
}

#[test]
fn resolve_keeps_an_empty_tree_head() {
    let t = TestRepo::new();
    let base = t.commit(&[("f", "1\n")], &[]);
    let remote = t.commit(&[("f", "1\n"), ("g", "new\n")], &[base]);
    let empty = t.repo.hash_algo().empty_tree().unwrap().to_hex();

    // Three-way over [base, empty, remote]: `f` was deleted on our side.
    let r = t.run(&["merge-resolve", &base.to_hex(), "--", &empty, &remote.to_hex()]);
    assert_eq!(r.exit_code, 0, "{}", r.stderr);
    assert_eq!(t.read("g"), "new\n");
    assert!(!t.path().join("f").exists());
    let index = t.repo.read_index().unwrap();
    assert!(index.get("f".into(), Stage::Normal).is_none());
    assert!(index.get("g".into(), Stage::Normal).is_some());
}

#[test]
fn resolve_refuses_two_remotes() {
    let t = TestRepo::new();
    let [base, head, remote] = diverged(&t);

    let r = t.run(&["merge-resolve", &base, "--", &head, &remote, &base]);
    assert_eq!(r.exit_code, 2);
    assert_eq!(t.read("f"), "one\n2\n3\n4\n5\n");
}

#[test]
fn octopus_merges_every_remote() {
    let t = TestRepo::new();
    let base = t.commit(&[("a", "a\n"), ("b", "b\n")], &[]);
    let r1 = t.commit(&[("a", "A\n"), ("b", "b\n")], &[base]);
    let r2 = t.commit(&[("a", "a\n"), ("b", "B\n")], &[base]);
    t.checkout(base);

    let r = t.run(&["merge-octopus", &base.to_hex(), "--", "HEAD", &r1.to_hex(), &r2.to_hex()]);
    assert_eq!(r.exit_code, 0, "{}", r.stderr);
    assert!(r.stdout.contains(&format!("Fast-forwarding to: {}", r1.to_hex())), "{}", r.stdout);
    assert_eq!(t.read("a"), "A\n");
    assert_eq!(t.read("b"), "B\n");
}

#[test]
fn octopus_skips_empty_tree_remotes() {
    let t = TestRepo::new();
    let base = t.commit(&[("a", "a\n")], &[]);
    let r1 = t.commit(&[("a", "A\n")], &[base]);
    t.checkout(base);
    let empty = t.repo.hash_algo().empty_tree().unwrap().to_hex();

    let r = t.run(&["merge-octopus", "--", "HEAD", &r1.to_hex(), &empty]);
    assert_eq!(r.exit_code, 2);
    assert_eq!(t.read("a"), "a\n");
}

#[test]
fn merge_index_runs_builtin_program() {
    let t = TestRepo::new();
    let head = t.commit(&[("other", "o\n")], &[]);
    t.checkout(head);

    let mut lock = t.repo.lock_index().unwrap();
    for (stage, data) in [
        (Stage::Base, "1\n2\n3\n4\n5\n"),
        (Stage::Ours, "one\n2\n3\n4\n5\n"),
        (Stage::Theirs, "1\n2\n3\n4\nfive\n"),
    ] {
        lock.index_mut()
            .add(IndexEntry::staged("f", FileMode::Regular, t.blob(data), stage));
    }
    lock.commit().unwrap();
    std::fs::write(t.path().join("f"), "one\n2\n3\n4\n5\n").unwrap();

    let r = t.run(&["merge-index", "merge-one-file", "-a"]);
    assert_eq!(r.exit_code, 0, "{}", r.stderr);
    assert_eq!(t.read("f"), "one\n2\n3\n4\nfive\n");
    assert!(t.unmerged().is_empty());

    let r = t.run(&["merge-index", "merge-one-file", "nope"]);
    assert_eq!(r.exit_code, 128);
    assert!(r.stderr.contains("fatal: nope is not in the cache"), "{}", r.stderr);

    assert_eq!(t.run(&["merge-index", "merge-one-file"]).exit_code, 128);
}

#[test]
fn merge_one_file_adds_their_file() {
    let t = TestRepo::new();
    let head = t.commit(&[("other", "o\n")], &[]);
    t.checkout(head);
    let theirs = t.blob("new\n").to_hex();

    let r = t.run(&["merge-one-file", "", "", &theirs, "added", "", "", "100644"]);
    assert_eq!(r.exit_code, 0, "{}", r.stderr);
    assert!(r.stdout.contains("Adding added"), "{}", r.stdout);
    assert_eq!(t.read("added"), "new\n");
}
