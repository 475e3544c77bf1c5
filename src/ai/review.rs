//! LLM-backed code review and fix-patch generation.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write as _;

use super::{strip_code_fences, truncate, AiClient, AiError};
use crate::constants::{MAX_TOKENS_FIX, MAX_TOKENS_REVIEW};
use crate::models::{FileGroup, Finding, ReviewResult};

/// A minimal fix: replace one literal snippet with another.
///
/// Whole-file rewrites are never requested; large files would be
/// truncated by the model's token limit.
#[derive(Debug, Clone, Deserialize)]
pub struct FixPatch {
    pub old_code: String,
    pub new_code: String,
}

impl AiClient {
    /// Submit the per-group diffs for review and return normalized findings.
    ///
    /// The reviewer is advisory: callers must treat any error here as
    /// "skip review", never as a reason to block the commit.
    pub async fn review_groups(&self, groups: &[FileGroup]) -> Result<ReviewResult, AiError> {
        let prompt = review_prompt(groups);
        let text = self.send(&prompt, MAX_TOKENS_REVIEW).await?;
        let text = strip_code_fences(&text);

        let findings: Vec<Finding> = serde_json::from_str(text)
            .map_err(|e| AiError::Parse(format!("{e} (raw: {})", truncate(text, 200))))?;

        Ok(ReviewResult::from_findings(findings))
    }

    /// Ask for a minimal patch fixing one finding.
    ///
    /// `primary_content` is the current content of the finding's file;
    /// `related_contents` maps related files to their content, sent as
    /// read-only context.
    pub async fn generate_fix(
        &self,
        finding: &Finding,
        primary_content: &str,
        related_contents: &HashMap<String, String>,
    ) -> Result<FixPatch, AiError> {
        let prompt = fix_prompt(finding, primary_content, related_contents);
        let text = self.send(&prompt, MAX_TOKENS_FIX).await?;
        let text = strip_code_fences(&text);

        let patch: FixPatch = serde_json::from_str(text)
            .map_err(|e| AiError::Parse(format!("{e} (raw: {})", truncate(text, 200))))?;

        if patch.old_code.is_empty() {
            return Err(AiError::Parse("patch has an empty old_code".to_string()));
        }
        Ok(patch)
    }
}

fn review_prompt(groups: &[FileGroup]) -> String {
    let mut prompt = String::from(
        "You are an expert code reviewer. Analyze the following file diffs and identify:\n\
         1. Bugs and logic errors\n\
         2. Security vulnerabilities\n\
         3. Null-pointer / out-of-bounds risks\n\
         4. Race conditions or concurrency issues\n\
         5. Obvious mistakes (typos in logic, wrong variable, missing error handling)\n\n\
         Do NOT flag style issues, naming preferences, or minor nits.\n\
         Only report genuine problems that could cause bugs or security issues.\n\n\
         If you find NO issues, respond with an empty JSON array: []\n\n\
         For issues spanning multiple lines, use start_line and end_line to indicate the range.\n\
         For issues involving multiple files, include related_locations referencing the connected code.\n\n\
         Respond with ONLY valid JSON in this exact format:\n\
         [{\"file\":\"path/to/file\",\"start_line\":42,\"end_line\":50,\
         \"severity\":\"error|warning|info\",\"description\":\"what is wrong\",\
         \"suggestion\":\"how to fix it\",\
         \"related_locations\":[{\"file\":\"path/to/other\",\"start_line\":10,\"end_line\":12}]}]\n\n\
         File diffs to review:\n\n",
    );

    for (i, group) in groups.iter().enumerate() {
        let _ = writeln!(prompt, "=== Group {} ===", i + 1);
        let _ = writeln!(prompt, "Files: {}", group.files.join(", "));
        if !group.diffs.is_empty() {
            let _ = writeln!(prompt, "Diff:\n{}", group.diffs);
        }
        prompt.push('\n');
    }

    prompt
}

fn fix_prompt(
    finding: &Finding,
    primary_content: &str,
    related_contents: &HashMap<String, String>,
) -> String {
    let mut prompt = String::from("You are a code fixer. A code review found the following issue:\n\n");
    let _ = writeln!(prompt, "File: {}", finding.file);
    let _ = writeln!(prompt, "Lines: {}-{}", finding.start_line, finding.end_line);
    let _ = writeln!(prompt, "Severity: {}", finding.severity);
    let _ = writeln!(prompt, "Problem: {}", finding.description);
    let _ = writeln!(prompt, "Suggestion: {}\n", finding.suggestion);

    let _ = writeln!(
        prompt,
        "Here is the primary file content ({}):\n\n```\n{}\n```\n",
        finding.file, primary_content
    );

    if !finding.related_locations.is_empty() && !related_contents.is_empty() {
        prompt.push_str("Related files for context (do NOT modify these):\n\n");
        for loc in &finding.related_locations {
            if let Some(content) = related_contents.get(&loc.file) {
                let _ = writeln!(
                    prompt,
                    "--- {} (lines {}-{} relevant) ---\n```\n{}\n```\n",
                    loc.file, loc.start_line, loc.end_line, content
                );
            }
        }
    }

    prompt.push_str(
        "Produce the SMALLEST possible fix as a literal replacement in the primary file.\n\
         Respond with ONLY valid JSON in this exact format:\n\
         {\"old_code\":\"the exact snippet to replace, verbatim from the file\",\
         \"new_code\":\"the corrected snippet\"}\n\
         The old_code MUST appear verbatim in the primary file. Do not rewrite the whole file.\n\
         Do not change anything besides fixing the identified issue.",
    );

    prompt
}
