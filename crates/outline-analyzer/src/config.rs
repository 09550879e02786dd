//! Runtime tunables for the analyzer worker, loaded the way
//! `outline_kernel::KernelConfig` is.

use std::env;
use std::time::Duration;

/// Analyzer-wide tunables (spec §6). Every field can be overridden by its
/// matching `OUTLINE_*` environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Maximum number of content jobs processed concurrently.
    pub concurrency: usize,
    /// Per-URL fetch timeout.
    pub per_url_timeout: Duration,
    /// Overall wall-clock budget for one job, covering every URL in it.
    pub job_budget: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            per_url_timeout: Duration::from_millis(10_000),
            job_budget: Duration::from_millis(30_000),
        }
    }
}

impl AnalyzerConfig {
    /// Load tunables from the environment, falling back to defaults for any
    /// variable that is unset or fails to parse.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            concurrency: env_usize("OUTLINE_ANALYZER_CONCURRENCY", defaults.concurrency),
            per_url_timeout: env_millis("OUTLINE_ANALYZER_PER_URL_TIMEOUT_MS", defaults.per_url_timeout),
            job_budget: env_millis("OUTLINE_ANALYZER_JOB_BUDGET_MS", defaults.job_budget),
        }
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                tracing::warn!(%key, value = %raw, "ignoring unparsable environment override");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    match env::var(key) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                tracing::warn!(%key, value = %raw, "ignoring unparsable environment override");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AnalyzerConfig::default();
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.per_url_timeout, Duration::from_millis(10_000));
        assert_eq!(cfg.job_budget, Duration::from_millis(30_000));
    }
}
