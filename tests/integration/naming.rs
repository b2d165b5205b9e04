//! Set naming: shared prefixes, labels and collision-free counters.

use coldset::partition::{Inclusions, SetPartitioner};
use coldset::sets::{self, writer::SetWriter};
use coldset::tree::Tree;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn planned(files: &[(&str, u64)], limit: u64) -> Vec<coldset::partition::PlannedSet> {
    let mut tree = Tree::new("/pool", limit);
    for (path, size) in files {
        tree.insert_file(Path::new(path), *size).unwrap();
    }
    SetPartitioner::new(&tree, Inclusions::new(vec![PathBuf::new()])).partition()
}

#[test]
fn second_run_never_overwrites() {
    let temp = TempDir::new().unwrap();
    let sets_dir = temp.path().join("sets");
    let plan = planned(&[("photos/2019/a", 6), ("photos/2019/b", 6)], 10);
    let writer = SetWriter::new(&sets_dir, None);

    let first: Vec<String> = plan.iter().map(|s| writer.write(s).unwrap().stem).collect();
    let first_list = fs::read_to_string(sets_dir.join(format!("{}.list", first[0]))).unwrap();
    let second: Vec<String> = plan.iter().map(|s| writer.write(s).unwrap().stem).collect();

    assert_eq!(first, vec!["photos_2019_a_000", "photos_2019_b_000"]);
    assert_eq!(second, vec!["photos_2019_a_001", "photos_2019_b_001"]);
    assert_eq!(
        fs::read_to_string(sets_dir.join(format!("{}.list", first[0]))).unwrap(),
        first_list
    );
    assert_eq!(sets::discover(&sets_dir).unwrap().len(), 4);
}

#[test]
fn label_prefixes_every_set() {
    let temp = TempDir::new().unwrap();
    let plan = planned(&[("docs/x", 1), ("docs/y", 1)], 10);
    let writer = SetWriter::new(temp.path(), Some("tank".to_string()));
    let stems: Vec<String> = plan.iter().map(|s| writer.write(s).unwrap().stem).collect();
    assert_eq!(stems, vec!["tank_000"]);
}

#[test]
fn half_written_set_blocks_its_name() {
    let temp = TempDir::new().unwrap();
    // A list without sidecar is not a set, but its name is still taken.
    fs::write(temp.path().join("docs_000.list"), "docs\n").unwrap();
    let plan = planned(&[("docs/x", 6), ("other/y", 6)], 10);
    let writer = SetWriter::new(temp.path(), None);

    let written = writer.write(&plan[0]).unwrap();
    assert_eq!(written.stem, "docs_001");
    assert_eq!(written.read_items().unwrap(), vec!["docs"]);
    assert_eq!(sets::discover(temp.path()).unwrap(), vec![written]);
}

#[test]
fn root_item_is_listed_as_dot() {
    let temp = TempDir::new().unwrap();
    let plan = planned(&[("docs/x", 1)], 10);
    let written = SetWriter::new(temp.path(), None).write(&plan[0]).unwrap();
    assert_eq!(written.stem, "set_000");
    assert_eq!(written.read_items().unwrap(), vec!["."]);
}
