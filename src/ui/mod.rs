//! Styled terminal output and the gate's interactive prompts.
//!
//! All line input comes through one shared stdin channel owned by the
//! engine's main loop; the prompts here borrow that channel instead of
//! opening a second reader, so keystrokes never race between consumers.

use chrono::Local;
use colored::Colorize;
use tokio::sync::mpsc;

use crate::models::{FileGroup, Finding, ReviewAction, Severity};

/// Timestamped, colored logger for daemon output.
#[derive(Debug, Default)]
pub struct Logger;

impl Logger {
    pub fn new() -> Self {
        Self
    }

    fn stamp(&self) -> String {
        Local::now().format("%H:%M:%S").to_string()
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        println!(
            "{} {} {}",
            self.stamp().dimmed(),
            "INFO".cyan().bold(),
            msg.as_ref()
        );
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        println!(
            "{} {} {}",
            self.stamp().dimmed(),
            "WARN".yellow().bold(),
            msg.as_ref()
        );
    }

    pub fn error(&self, msg: impl AsRef<str>, err: &dyn std::fmt::Display) {
        println!(
            "{} {} {}: {err}",
            self.stamp().dimmed(),
            "ERROR".red().bold(),
            msg.as_ref()
        );
    }

    /// Render grouping results in a tree-like format.
    pub fn groups(&self, groups: &[FileGroup]) {
        self.info(format!("Semantic grouping: {} group(s)", groups.len()));
        for (i, group) in groups.iter().enumerate() {
            let connector = if i == groups.len() - 1 { "└─" } else { "├─" };
            println!(
                "  {connector} Group {}: {}",
                i + 1,
                group.files.join(", ").bold()
            );
            println!("     reason: {}", format!("{:?}", group.reason).dimmed());
        }
    }

    pub fn commit_success(&self, hash: &str, message: &str) {
        let short = &hash[..hash.len().min(7)];
        self.info(format!("Committed {} {}", short.green().bold(), message));
    }

    pub fn push_success(&self, count: usize, remote: &str) {
        self.info(format!(
            "Pushed {count} commit(s) to {}",
            remote.green().bold()
        ));
    }

    pub fn fix_applied(&self, file: &str, description: &str) {
        self.info(format!("AI fix applied to {}: {description}", file.bold()));
    }

    /// Render review findings with severity-colored labels.
    pub fn findings(&self, findings: &[Finding]) {
        let blockers = findings.iter().filter(|f| f.severity.is_blocker()).count();
        self.warn(format!(
            "Code review found {} issue(s), {blockers} blocking",
            findings.len()
        ));
        println!();

        for (i, f) in findings.iter().enumerate() {
            let connector = if i == findings.len() - 1 { "└─" } else { "├─" };
            let label = match f.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warning => "WARNING".yellow().bold(),
                Severity::Info => "INFO".cyan().bold(),
            };
            let lines = if f.end_line > f.start_line {
                format!("L{}-{}", f.start_line, f.end_line)
            } else {
                format!("L{}", f.start_line)
            };

            println!("  {connector} [{label}] {} {}", f.file, format!("({lines})").dimmed());
            println!("     {}", f.description.bold());
            if !f.suggestion.is_empty() {
                println!("     {}", format!("fix: {}", f.suggestion).dimmed());
            }
            for (j, loc) in f.related_locations.iter().enumerate() {
                let rel = if j == f.related_locations.len() - 1 {
                    "│  └─"
                } else {
                    "│  ├─"
                };
                println!(
                    "     {rel} {}",
                    format!(
                        "also see: {} (L{}-{})",
                        loc.file, loc.start_line, loc.end_line
                    )
                    .dimmed()
                );
            }
        }
        println!();
    }

    /// Show the three gate options and read the operator's choice from the
    /// shared stdin channel. Invalid input defaults to continue so the
    /// daemon never wedges on a typo.
    pub async fn prompt_review_action(
        &self,
        stdin: &mut mpsc::Receiver<String>,
    ) -> ReviewAction {
        println!("{}", "  How would you like to proceed?".bold());
        println!("    [1] Fix manually (pause and re-review after)");
        println!("    [2] Let AI fix");
        println!("    [3] Continue anyway (push with current code)");
        println!("\n  Choice [1/2/3]: ");

        let line = stdin.recv().await.unwrap_or_default();
        match parse_review_action(&line) {
            Some(action) => action,
            None => {
                self.warn("Invalid choice, defaulting to continue");
                ReviewAction::Continue
            }
        }
    }

    /// Block until the operator presses ENTER after a hand edit.
    pub async fn wait_for_manual_fix(&self, stdin: &mut mpsc::Receiver<String>) {
        println!();
        self.info("Fix the issues in your editor, then press ENTER to re-review...");
        let _ = stdin.recv().await;
    }
}

/// Map a gate prompt answer to an action.
pub fn parse_review_action(input: &str) -> Option<ReviewAction> {
    match input.trim() {
        "1" => Some(ReviewAction::Manual),
        "2" => Some(ReviewAction::AiFix),
        "3" => Some(ReviewAction::Continue),
        _ => None,
    }
}
