//! Heuristic pre-grouping of changed files.
//!
//! Phase 1 of grouping: local, instant, no network. The refiner may move
//! files between groups afterwards.
//!
//! Rules applied in order:
//! 1. Same directory -> grouped together
//! 2. Name affinity (`x` + `x_test`) -> relabels the directory's reason
//! 3. Multi-file or affinity-matched directories become groups
//! 4. Singleton fallback for everything else

use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;

use crate::models::{ChangeSet, FileGroup};

/// Cluster changed files into commit-sized groups.
///
/// Pure and deterministic up to input order: the output covers every input
/// path exactly once and groups are pairwise disjoint.
pub fn pre_group(changeset: &ChangeSet) -> Vec<FileGroup> {
    if changeset.files.is_empty() {
        return Vec::new();
    }

    // Rule 1: partition by immediate parent directory, in first-seen order.
    let mut dir_groups: IndexMap<String, Vec<String>> = IndexMap::new();
    for fc in &changeset.files {
        let dir = parent_dir(&fc.path);
        let files = dir_groups.entry(dir).or_default();
        if !files.contains(&fc.path) {
            files.push(fc.path.clone());
        }
    }

    // Rule 2: name affinity. A `<stem>_test` file whose stripped stem
    // appears among the directory's stems marks the directory.
    let mut matched: HashSet<&str> = HashSet::new();
    let mut affinity_dirs: HashSet<&str> = HashSet::new();
    for (dir, files) in &dir_groups {
        let stems: HashSet<String> = files
            .iter()
            .map(|f| {
                let stem = file_stem(f);
                stem.strip_suffix("_test").unwrap_or(&stem).to_string()
            })
            .collect();

        for file in files {
            let stem = file_stem(file);
            if let Some(source) = stem.strip_suffix("_test") {
                if stems.contains(source) {
                    matched.insert(file.as_str());
                    affinity_dirs.insert(dir.as_str());
                }
            }
        }
    }

    // Rule 3: emit multi-file and affinity groups.
    let mut groups: Vec<FileGroup> = Vec::new();
    let mut grouped: HashSet<&str> = HashSet::new();
    for (dir, files) in &dir_groups {
        if files.len() > 1 || matched.contains(files[0].as_str()) {
            let reason = if affinity_dirs.contains(dir.as_str()) {
                format!("name affinity: {dir}")
            } else {
                format!("same package: {dir}")
            };
            grouped.extend(files.iter().map(String::as_str));
            groups.push(FileGroup::new(files.clone(), reason));
        }
    }

    // Rule 4: singletons, in arrival order.
    for fc in &changeset.files {
        if !grouped.contains(fc.path.as_str()) {
            grouped.insert(fc.path.as_str());
            groups.push(FileGroup::new(
                vec![fc.path.clone()],
                format!("singletons {}", base_name(&fc.path)),
            ));
        }
    }

    groups
}

/// Parent directory of a relative path, `"."` for top-level files.
fn parent_dir(path: &str) -> String {
    match Path::new(path).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    }
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Basename with its extension stripped.
fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| base_name(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeKind, ChangeSet, FileChange};
    use std::collections::BTreeSet;

    fn changeset(paths: &[&str]) -> ChangeSet {
        ChangeSet::now(
            paths
                .iter()
                .map(|p| FileChange {
                    path: p.to_string(),
                    kind: ChangeKind::Modified,
                })
                .collect(),
        )
    }

    fn all_files(groups: &[FileGroup]) -> BTreeSet<String> {
        groups.iter().flat_map(|g| g.files.iter().cloned()).collect()
    }

    #[test]
    fn empty_changeset_yields_no_groups() {
        assert!(pre_group(&changeset(&[])).is_empty());
    }

    #[test]
    fn same_directory_files_group_together() {
        let groups = pre_group(&changeset(&["pkg/a.rs", "pkg/b.rs"]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reason, "same package: pkg");
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn test_pair_relabels_as_name_affinity() {
        let groups = pre_group(&changeset(&["pkg/x.go", "pkg/x_test.go"]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reason, "name affinity: pkg");
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn unrelated_directories_become_singletons() {
        let groups = pre_group(&changeset(&["a/one.rs", "b/two.rs"]));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].reason, "singletons one.rs");
        assert_eq!(groups[1].reason, "singletons two.rs");
    }

    #[test]
    fn top_level_files_use_dot_directory() {
        let groups = pre_group(&changeset(&["README.md", "Makefile"]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reason, "same package: .");
    }

    #[test]
    fn partition_law_holds() {
        let input = [
            "pkg/x.go",
            "pkg/x_test.go",
            "docs/readme.md",
            "lib/a.rs",
            "lib/b.rs",
            "standalone.txt",
        ];
        let set = changeset(&input);
        let groups = pre_group(&set);

        let expected: BTreeSet<String> = input.iter().map(|s| s.to_string()).collect();
        assert_eq!(all_files(&groups), expected);

        // Pairwise disjoint: total file count equals the deduplicated set.
        let total: usize = groups.iter().map(|g| g.files.len()).sum();
        assert_eq!(total, expected.len());
    }

    #[test]
    fn duplicate_input_paths_are_idempotent() {
        let groups = pre_group(&changeset(&["a/f.rs", "a/f.rs"]));
        let total: usize = groups.iter().map(|g| g.files.len()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn deterministic_up_to_input_order() {
        let set = changeset(&["z/one.rs", "a/two.rs", "z/three.rs"]);
        let first = pre_group(&set);
        let second = pre_group(&set);
        assert_eq!(first, second);
        // z arrives first, so its group is emitted first.
        assert_eq!(first[0].reason, "same package: z");
    }
}
