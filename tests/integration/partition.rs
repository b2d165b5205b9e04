//! Partition properties: coverage, size bound and disjointness.

use coldset::partition::{Inclusions, ItemKind, PlannedSet, SetPartitioner};
use coldset::tree::Tree;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

fn pool(files: &[(&str, u64)], limit: u64) -> Tree {
    let mut tree = Tree::new("/pool", limit);
    for (path, size) in files {
        tree.insert_file(Path::new(path), *size).unwrap();
    }
    tree
}

fn partition(tree: &Tree, inclusions: &[&str]) -> Vec<PlannedSet> {
    let inclusions = Inclusions::new(inclusions.iter().map(PathBuf::from).collect());
    SetPartitioner::new(tree, inclusions).partition()
}

/// Files covered by the sets, with multiplicity.
fn covered_files(tree: &Tree, sets: &[PlannedSet]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for set in sets {
        for item in &set.items {
            match item.kind {
                ItemKind::File => files.push(item.path.clone()),
                ItemKind::Directory(id) => files.extend(tree.files_below(id)),
            }
        }
    }
    files.sort();
    files
}

#[test]
fn whole_directory_fits_in_one_set() {
    let tree = pool(&[("a/1", 10), ("a/2", 10), ("a/b/3", 10)], 30);
    let sets = partition(&tree, &["a"]);
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].total_size, 30);
    assert_eq!(sets[0].file_count, 3);
    assert_eq!(sets[0].dir_count, 2);
}

#[test]
fn directory_over_limit_is_split() {
    let tree = pool(&[("a/1", 10), ("a/b/2", 10)], 10);
    let sets = partition(&tree, &["a"]);
    assert_eq!(sets.len(), 2);
    assert!(sets.iter().all(|s| s.total_size <= 10));
}

#[test]
fn sibling_outside_inclusion_is_left_out() {
    let tree = pool(&[("a/b/1", 10), ("a/b/2", 10)], 100);
    let sets = partition(&tree, &["a/b/1"]);
    assert_eq!(sets.len(), 1);
    let paths: Vec<&Path> = sets[0].item_paths().collect();
    assert_eq!(paths, vec![Path::new("a/b/1")]);
}

#[test]
fn repeated_inclusion_counts_once() {
    let tree = pool(&[("a/1", 10), ("a/2", 5)], 100);
    let once = partition(&tree, &["a"]);
    let twice = partition(&tree, &["a", "a"]);
    assert_eq!(once.len(), twice.len());
    assert_eq!(once[0].total_size, twice[0].total_size);
    assert_eq!(covered_files(&tree, &twice).len(), 2);
}

#[test]
fn prefix_without_separator_does_not_match() {
    let tree = pool(&[("a/b/1", 1), ("a/bc/2", 1)], 100);
    let sets = partition(&tree, &["a/b"]);
    assert_eq!(covered_files(&tree, &sets), vec![PathBuf::from("a/b/1")]);
}

#[test]
fn empty_directory_is_a_zero_byte_item() {
    let mut tree = pool(&[("a/1", 10)], 100);
    tree.dir_path(Path::new("a/empty")).unwrap();
    let sets = partition(&tree, &["a/empty"]);
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].total_size, 0);
    assert_eq!(sets[0].dir_count, 1);
    assert_eq!(sets[0].file_count, 0);
}

fn arb_files() -> impl Strategy<Value = Vec<(String, u64)>> {
    let segment = prop::sample::select(vec!["a", "b", "c", "d"]);
    let path = prop::collection::vec(segment, 1..4).prop_map(|parts| parts.join("/"));
    prop::collection::vec((path, 0u64..=50), 1..40)
}

/// Keep only paths that can coexist: no file may also be a directory prefix.
fn consistent(files: Vec<(String, u64)>) -> Vec<(String, u64)> {
    let mut kept: Vec<(String, u64)> = Vec::new();
    for (path, size) in files {
        let clashes = kept.iter().any(|(other, _)| {
            other == &path
                || other.starts_with(&format!("{}/", path))
                || path.starts_with(&format!("{}/", other))
        });
        if !clashes {
            kept.push((path, size));
        }
    }
    kept
}

proptest! {
    #[test]
    fn partition_covers_bounds_and_separates(
        files in arb_files(),
        limit in 50u64..=200,
        include_root in any::<bool>(),
    ) {
        let files = consistent(files);
        let mut tree = Tree::new("/pool", limit);
        for (path, size) in &files {
            tree.insert_file(Path::new(path), *size).unwrap();
        }

        let inclusion = if include_root { "" } else { "a" };
        let sets = partition(&tree, &[inclusion]);

        let expected: BTreeSet<PathBuf> = files
            .iter()
            .map(|(p, _)| PathBuf::from(p))
            .filter(|p| p.starts_with(inclusion))
            .collect();
        let covered = covered_files(&tree, &sets);
        let unique: BTreeSet<PathBuf> = covered.iter().cloned().collect();

        prop_assert_eq!(covered.len(), unique.len(), "a file landed in two sets");
        prop_assert_eq!(unique, expected);
        for set in &sets {
            prop_assert!(set.total_size <= limit);
            let sum: u64 = set.items.iter().map(|i| i.size).sum();
            prop_assert_eq!(sum, set.total_size);
        }
    }
}
