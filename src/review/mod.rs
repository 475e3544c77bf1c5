//! The review gate: a bounded loop of review, operator decision, and fix
//! application before staged changes are committed.
//!
//! The reviewer is advisory, never authoritative: any transport or parse
//! failure is logged and the commit proceeds. Each iteration refetches
//! diffs from the VCS, so the reviewer always sees current on-disk state
//! and no stale-cache invalidation is needed.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ai::{AiClient, AiError};
use crate::constants::MAX_REVIEW_ITERATIONS;
use crate::git::{self, GitManager};
use crate::models::{
    FileGroup, Finding, FixKind, FixRecord, ReviewAction, ReviewRecord, ReviewResult,
};
use crate::ui::Logger;

/// Errors applying a single fix.
#[derive(Error, Debug)]
pub enum FixError {
    #[error("snippet to replace was not found verbatim in {file}")]
    PatchNotApplicable { file: String },

    #[error("failed to read or write {file}: {source}")]
    Io {
        file: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Ai(#[from] AiError),
}

/// Run the review gate over the refined groups.
///
/// Returns the review snapshot to embed in the flush's commit records, or
/// `None` when review failed outright (degrade open). `groups` is mutated
/// in place: its diffs are refreshed whenever fixes may have changed the
/// working tree.
pub async fn run_gate(
    groups: &mut [FileGroup],
    ai: &AiClient,
    git: &GitManager,
    logger: &Logger,
    interactive: bool,
    stdin: &mut mpsc::Receiver<String>,
) -> Option<ReviewRecord> {
    let mut action: Option<ReviewAction> = None;
    let mut fixes: Vec<FixRecord> = Vec::new();
    let mut last: Option<ReviewResult> = None;

    for _ in 0..MAX_REVIEW_ITERATIONS {
        let result = match ai.review_groups(groups).await {
            Ok(result) => result,
            Err(e) => {
                logger.warn(format!("Code review failed, continuing without it: {e}"));
                return None;
            }
        };

        if result.findings.is_empty() {
            logger.info("Code review found no issues");
            return Some(record(result, action, fixes));
        }

        logger.findings(&result.findings);

        if !result.has_blockers {
            return Some(record(result, action, fixes));
        }

        if !interactive {
            logger.warn("Review found blockers; non-interactive flush continues");
            return Some(record(result, action, fixes));
        }

        let choice = logger.prompt_review_action(stdin).await;
        action = Some(choice);

        match choice {
            ReviewAction::Manual => {
                logger.wait_for_manual_fix(stdin).await;
                let touched: Vec<String> = result
                    .findings
                    .iter()
                    .filter(|f| f.severity.is_blocker())
                    .map(|f| f.file.clone())
                    .collect();
                fixes.push(FixRecord {
                    file: touched.join(", "),
                    description: "operator edited files by hand".to_string(),
                    kind: FixKind::Manual,
                });
                git::refresh_group_diffs(git, groups, logger).await;
            }
            ReviewAction::AiFix => {
                for finding in result.findings.iter().filter(|f| f.severity.is_blocker()) {
                    match apply_ai_fix(ai, git.repo_root(), finding).await {
                        Ok(()) => {
                            logger.fix_applied(&finding.file, &finding.description);
                            fixes.push(FixRecord {
                                file: finding.file.clone(),
                                description: finding.description.clone(),
                                kind: FixKind::Ai,
                            });
                        }
                        Err(e) => {
                            logger.warn(format!("Skipping fix for {}: {e}", finding.file));
                        }
                    }
                }
                git::refresh_group_diffs(git, groups, logger).await;
            }
            ReviewAction::Continue => {
                return Some(record(result, action, fixes));
            }
        }

        last = Some(result);
    }

    logger.warn("Review loop reached its iteration limit; continuing with current changes");
    last.map(|result| record(result, action, fixes))
}

fn record(
    result: ReviewResult,
    action: Option<ReviewAction>,
    fixes: Vec<FixRecord>,
) -> ReviewRecord {
    ReviewRecord {
        findings: result.findings,
        has_blockers: result.has_blockers,
        action,
        fixes,
    }
}

/// Request a minimal patch for one finding and apply it as a single
/// literal replacement in the primary file.
pub async fn apply_ai_fix(ai: &AiClient, root: &Path, finding: &Finding) -> Result<(), FixError> {
    let primary_path = root.join(&finding.file);
    let content = tokio::fs::read_to_string(&primary_path)
        .await
        .map_err(|e| FixError::Io {
            file: finding.file.clone(),
            source: e,
        })?;

    // Related locations are read-only context; skip any that cannot be read.
    let mut related: HashMap<String, String> = HashMap::new();
    for loc in &finding.related_locations {
        if let Ok(text) = tokio::fs::read_to_string(root.join(&loc.file)).await {
            related.insert(loc.file.clone(), text);
        }
    }

    let patch = ai.generate_fix(finding, &content, &related).await?;

    if !content.contains(&patch.old_code) {
        return Err(FixError::PatchNotApplicable {
            file: finding.file.clone(),
        });
    }
    let fixed = content.replacen(&patch.old_code, &patch.new_code, 1);

    tokio::fs::write(&primary_path, fixed)
        .await
        .map_err(|e| FixError::Io {
            file: finding.file.clone(),
            source: e,
        })
}
