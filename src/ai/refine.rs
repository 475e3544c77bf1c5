//! Group refinement and commit message generation.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write as _;

use super::{strip_code_fences, AiClient, AiError};
use crate::constants::{FALLBACK_COMMIT_MESSAGE, MAX_TOKENS_COMMIT_MESSAGE, MAX_TOKENS_REFINE};
use crate::models::FileGroup;

/// One refined group as returned on the wire.
#[derive(Deserialize)]
struct RefinedGroup {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    commit_message: String,
}

impl AiClient {
    /// Send pre-grouped changes for semantic refinement and commit message
    /// generation in a single call.
    ///
    /// On transport failure the error propagates so the caller can fall
    /// back to the heuristic groups. On a malformed response the input
    /// groups are kept and commit messages are filled per group instead.
    /// Either way the returned groups cover every input file exactly once
    /// and every commit message is non-empty.
    pub async fn refine_groups(&self, groups: Vec<FileGroup>) -> Result<Vec<FileGroup>, AiError> {
        let prompt = refine_prompt(&groups);
        let text = self.send(&prompt, MAX_TOKENS_REFINE).await?;
        let text = strip_code_fences(&text);

        let refined: Vec<RefinedGroup> = match serde_json::from_str(text) {
            Ok(refined) => refined,
            Err(_) => {
                // Keep the heuristic groups; generate messages individually.
                let mut groups = groups;
                for group in &mut groups {
                    if group.commit_message.is_empty() {
                        group.commit_message = self
                            .commit_message(&group.diffs, &group.files)
                            .await
                            .unwrap_or_else(|_| FALLBACK_COMMIT_MESSAGE.to_string());
                    }
                }
                return Ok(groups);
            }
        };

        Ok(reassemble(groups, refined))
    }

    /// Generate a conventional-commit message for one group's diff.
    pub async fn commit_message(
        &self,
        diff: &str,
        files: &[String],
    ) -> Result<String, AiError> {
        let prompt = format!(
            "Generate a single git commit message using conventional commits format \
             (feat/fix/refactor/chore/docs/test).\n\n\
             The message MUST be specific about WHAT changed, describing the actual \
             behavior or feature.\n\
             BAD:  'refactor(engine): update engine implementation'\n\
             GOOD: 'feat(engine): add AI code review gate with interactive fix/continue prompt'\n\
             Avoid generic verbs like 'update', 'modify', 'change'.\n\n\
             Files changed: {}\n\nDiff:\n{}\n\n\
             Respond with ONLY the commit message, nothing else.",
            files.join(", "),
            diff,
        );

        let message = self.send(&prompt, MAX_TOKENS_COMMIT_MESSAGE).await?;
        let message = message.trim();
        if message.is_empty() {
            return Ok(FALLBACK_COMMIT_MESSAGE.to_string());
        }
        Ok(message.to_string())
    }
}

fn refine_prompt(groups: &[FileGroup]) -> String {
    let mut prompt = String::from(
        "You are a git commit assistant. Analyze the following pre-grouped file changes and:\n\
         1. Refine the groupings if files should be moved between groups\n\
         2. Generate a specific, descriptive conventional commit message for each group.\n\
         \x20  - The message MUST describe WHAT changed, not just that something changed.\n\
         \x20  - BAD:  'refactor(ui): update logger implementation'\n\
         \x20  - GOOD: 'feat(ui): add interactive review prompts with severity-colored findings'\n\
         \x20  - Include the specific behavior or feature, not generic verbs like 'update'\n\n\
         Respond with ONLY valid JSON in this exact format:\n\
         [{\"files\":[\"path/to/file\"],\"reason\":\"why grouped\",\"commit_message\":\"feat: description\"}]\n\n\
         Pre-grouped changes:\n\n",
    );

    for (i, group) in groups.iter().enumerate() {
        let _ = writeln!(prompt, "Group {} ({}):", i + 1, group.reason);
        let _ = writeln!(prompt, "  Files: {}", group.files.join(", "));
        if !group.diffs.is_empty() {
            let _ = writeln!(prompt, "  Diff:\n{}", group.diffs);
        }
        prompt.push('\n');
    }

    prompt
}

/// Distribute the original per-file diffs into the refined groups and
/// restore any files the model dropped, so the partition invariant holds.
fn reassemble(original: Vec<FileGroup>, refined: Vec<RefinedGroup>) -> Vec<FileGroup> {
    let file_diffs = split_file_diffs(&original);

    let mut seen: Vec<String> = Vec::new();
    let mut groups: Vec<FileGroup> = Vec::new();

    for r in refined {
        // Drop files the model invented or repeated; they have no diff to
        // carry and would double-commit otherwise.
        let files: Vec<String> = r
            .files
            .into_iter()
            .filter(|f| file_diffs.contains_key(f) && !seen.contains(f))
            .collect();
        if files.is_empty() {
            continue;
        }
        seen.extend(files.iter().cloned());

        let mut diffs = String::new();
        for file in &files {
            if let Some(d) = file_diffs.get(file) {
                diffs.push_str(d);
            }
        }

        let commit_message = if r.commit_message.trim().is_empty() {
            FALLBACK_COMMIT_MESSAGE.to_string()
        } else {
            r.commit_message.trim().to_string()
        };

        groups.push(FileGroup {
            files,
            reason: r.reason,
            diffs,
            commit_message,
        });
    }

    // Files the model dropped come back as a trailing fallback group.
    let mut dropped: Vec<String> = Vec::new();
    for group in &original {
        for file in &group.files {
            if !seen.contains(file) && !dropped.contains(file) {
                dropped.push(file.clone());
            }
        }
    }
    if !dropped.is_empty() {
        let mut diffs = String::new();
        for file in &dropped {
            if let Some(d) = file_diffs.get(file) {
                diffs.push_str(d);
            }
        }
        groups.push(FileGroup {
            files: dropped,
            reason: "remaining changes".to_string(),
            diffs,
            commit_message: FALLBACK_COMMIT_MESSAGE.to_string(),
        });
    }

    groups
}

/// Split each group's combined diff into per-file sections keyed by path.
///
/// Single-file groups map directly; multi-file diffs are split on
/// `diff --git` boundaries and matched by their ` a/<path> ` / ` b/<path>`
/// headers.
fn split_file_diffs(groups: &[FileGroup]) -> HashMap<String, String> {
    let mut file_diffs = HashMap::new();

    for group in groups {
        if group.files.len() == 1 {
            file_diffs.insert(group.files[0].clone(), group.diffs.clone());
            continue;
        }

        for section in group.diffs.split("diff --git") {
            if section.trim().is_empty() {
                continue;
            }
            let section = format!("diff --git{section}");
            for file in &group.files {
                let a = format!(" a/{file} ");
                let b = format!(" b/{file}\n");
                if section.contains(&a) || section.contains(&b) {
                    file_diffs.insert(file.clone(), section.clone());
                    break;
                }
            }
        }

        // Placeholder sections carry no `diff --git` header; make sure
        // every member still has an entry.
        for file in &group.files {
            file_diffs
                .entry(file.clone())
                .or_insert_with(|| format!("--- /dev/null\n+++ b/{file}\n(new or deleted file)\n"));
        }
    }

    file_diffs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(files: &[&str], reason: &str, diffs: &str) -> FileGroup {
        FileGroup {
            files: files.iter().map(|s| s.to_string()).collect(),
            reason: reason.to_string(),
            diffs: diffs.to_string(),
            commit_message: String::new(),
        }
    }

    fn two_file_diff() -> String {
        "diff --git a/pkg/x.rs b/pkg/x.rs\n--- a/pkg/x.rs\n+++ b/pkg/x.rs\n+one\n\
         diff --git a/pkg/y.rs b/pkg/y.rs\n--- a/pkg/y.rs\n+++ b/pkg/y.rs\n+two\n"
            .to_string()
    }

    #[test]
    fn split_assigns_sections_by_header() {
        let groups = vec![group(&["pkg/x.rs", "pkg/y.rs"], "same package: pkg", &two_file_diff())];
        let map = split_file_diffs(&groups);
        assert!(map["pkg/x.rs"].contains("+one"));
        assert!(!map["pkg/x.rs"].contains("+two"));
        assert!(map["pkg/y.rs"].contains("+two"));
    }

    #[test]
    fn split_single_file_group_keeps_whole_diff() {
        let groups = vec![group(&["a.rs"], "singletons a.rs", "+whole\n")];
        let map = split_file_diffs(&groups);
        assert_eq!(map["a.rs"], "+whole\n");
    }

    #[test]
    fn reassemble_moves_diffs_with_files() {
        let original = vec![group(
            &["pkg/x.rs", "pkg/y.rs"],
            "same package: pkg",
            &two_file_diff(),
        )];
        let refined = vec![
            RefinedGroup {
                files: vec!["pkg/y.rs".into()],
                reason: "feature y".into(),
                commit_message: "feat: y".into(),
            },
            RefinedGroup {
                files: vec!["pkg/x.rs".into()],
                reason: "feature x".into(),
                commit_message: "feat: x".into(),
            },
        ];
        let out = reassemble(original, refined);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].files, vec!["pkg/y.rs"]);
        assert!(out[0].diffs.contains("+two"));
        assert!(out[1].diffs.contains("+one"));
    }

    #[test]
    fn reassemble_restores_dropped_files() {
        let original = vec![group(
            &["pkg/x.rs", "pkg/y.rs"],
            "same package: pkg",
            &two_file_diff(),
        )];
        let refined = vec![RefinedGroup {
            files: vec!["pkg/x.rs".into()],
            reason: "feature x".into(),
            commit_message: "feat: x".into(),
        }];
        let out = reassemble(original, refined);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].files, vec!["pkg/y.rs"]);
        assert_eq!(out[1].commit_message, FALLBACK_COMMIT_MESSAGE);
    }

    #[test]
    fn reassemble_ignores_invented_files() {
        let original = vec![group(&["a.rs"], "singletons a.rs", "+a\n")];
        let refined = vec![RefinedGroup {
            files: vec!["a.rs".into(), "phantom.rs".into()],
            reason: "r".into(),
            commit_message: "feat: a".into(),
        }];
        let out = reassemble(original, refined);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].files, vec!["a.rs"]);
    }

    #[test]
    fn reassemble_fills_empty_commit_messages() {
        let original = vec![group(&["a.rs"], "singletons a.rs", "+a\n")];
        let refined = vec![RefinedGroup {
            files: vec!["a.rs".into()],
            reason: "r".into(),
            commit_message: "  ".into(),
        }];
        let out = reassemble(original, refined);
        assert_eq!(out[0].commit_message, FALLBACK_COMMIT_MESSAGE);
    }

    #[test]
    fn refine_prompt_lists_groups() {
        let groups = vec![group(&["a.rs"], "singletons a.rs", "+a\n")];
        let prompt = refine_prompt(&groups);
        assert!(prompt.contains("Group 1 (singletons a.rs):"));
        assert!(prompt.contains("Files: a.rs"));
        assert!(prompt.contains("commit assistant"));
    }
}
