//! Application settings.
//!
//! Settings are built once at startup from environment variables (a `.env`
//! file is loaded by `main` before this runs) and threaded through the
//! fetcher, runner, and server constructors. There is no global config
//! singleton.

use std::path::PathBuf;

/// Runtime settings for the crawler and server.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Maximum fetch attempts per page before giving up.
    pub fetch_max_attempts: u32,
    /// Base backoff in seconds; attempt N sleeps `base * 2^(N-1)`.
    pub fetch_base_backoff_secs: u64,
    /// Per-request timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Whether the headless-browser fallback may be used for pages that
    /// render their listings with JavaScript.
    pub use_browser_fallback: bool,
    /// Settle time after navigation before the rendered DOM is captured.
    pub browser_settle_ms: u64,
    /// Navigation timeout for the headless browser.
    pub browser_nav_timeout_secs: u64,
    /// Whether LLM-assisted extraction is enabled (placeholder).
    pub llm_enabled: bool,
    /// API key for the LLM provider, if configured.
    pub llm_api_key: Option<String>,
}

impl Settings {
    /// Build settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_path: env_var("FIELDTRIP_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("fieldtrip.db")),
            fetch_max_attempts: env_parsed("FIELDTRIP_FETCH_MAX_ATTEMPTS", 5),
            fetch_base_backoff_secs: env_parsed("FIELDTRIP_FETCH_BASE_BACKOFF_SECS", 2),
            fetch_timeout_secs: env_parsed("FIELDTRIP_FETCH_TIMEOUT_SECS", 30),
            use_browser_fallback: env_parsed("FIELDTRIP_BROWSER_FALLBACK", true),
            browser_settle_ms: env_parsed("FIELDTRIP_BROWSER_SETTLE_MS", 3000),
            browser_nav_timeout_secs: env_parsed("FIELDTRIP_BROWSER_NAV_TIMEOUT_SECS", 45),
            llm_enabled: env_parsed("FIELDTRIP_LLM_ENABLED", false),
            llm_api_key: env_var("FIELDTRIP_LLM_API_KEY"),
        }
    }

    /// Database path as a diesel connection string.
    pub fn database_url(&self) -> String {
        self.database_path.display().to_string()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
