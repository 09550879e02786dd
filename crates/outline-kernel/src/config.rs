//! Runtime tunables for the kernel, loaded directly from the environment
//! rather than a layered config file.

use std::env;
use std::time::Duration;

/// Kernel-wide tunables. All fields have sane defaults; every one can be
/// overridden by its matching `OUTLINE_*` environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Maximum time a single command may spend in a container's serializer
    /// before the caller receives [`OutlineError::Timeout`](outline_types::OutlineError::Timeout).
    pub command_timeout: Duration,
    /// How long a container's serializer may sit idle before its background
    /// task and channel are torn down.
    pub serializer_idle_teardown: Duration,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(5_000),
            serializer_idle_teardown: Duration::from_millis(60_000),
        }
    }
}

impl KernelConfig {
    /// Load tunables from the environment, falling back to defaults for any
    /// variable that is unset or fails to parse.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            command_timeout: env_millis("OUTLINE_COMMAND_TIMEOUT_MS", defaults.command_timeout),
            serializer_idle_teardown: env_millis("OUTLINE_SERIALIZER_IDLE_TEARDOWN_MS", defaults.serializer_idle_teardown),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.command_timeout, Duration::from_millis(5_000));
        assert_eq!(cfg.serializer_idle_teardown, Duration::from_millis(60_000));
    }
}
