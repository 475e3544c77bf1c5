//! App-wide constants.
//!
//! Centralises file names, environment variable names, API endpoints,
//! and pipeline limits so a rename only requires changing this file.

use std::time::Duration;

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "gitpulse";

/// State directory created inside the watched tree.
pub const STATE_DIR: &str = ".gitpulse";

/// Config filename inside the state directory.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// History filename inside the state directory.
pub const HISTORY_FILENAME: &str = "history.json";

/// PID file written at the root of the watched tree while the daemon runs.
pub const PID_FILENAME: &str = ".gitpulse.pid";

/// Anthropic Messages API endpoint.
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Short window that coalesces rapid editor saves into one batch.
/// Not the safety timer; see `Config::debounce_seconds` for that.
pub const WATCH_DEBOUNCE: Duration = Duration::from_secs(2);

/// Upper bound on review iterations inside the gate loop.
pub const MAX_REVIEW_ITERATIONS: usize = 3;

/// Commit message used when every AI fallback has failed.
pub const FALLBACK_COMMIT_MESSAGE: &str = "chore: auto-commit changes";

// ── Environment variable names ──────────────────────────────────────

/// Checked first for the API key override.
pub const ENV_CLAUDE_API_KEY: &str = "CLAUDE_API_KEY";

/// Checked second for the API key override.
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

// ── Token budgets ───────────────────────────────────────────────────

/// Budget for the batched group-refinement call.
pub const MAX_TOKENS_REFINE: u32 = 2048;

/// Budget for the batched review call.
pub const MAX_TOKENS_REVIEW: u32 = 2048;

/// Budget for a single fix-patch call.
pub const MAX_TOKENS_FIX: u32 = 2048;

/// Budget for the per-group commit-message fallback.
pub const MAX_TOKENS_COMMIT_MESSAGE: u32 = 256;
