use std::time::Duration;

use crate::config::EngineConfig;

/// Runtime knobs for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Upper bound on steps simultaneously `in_progress`
    pub max_concurrency: usize,

    /// Per tool call
    pub tool_timeout: Duration,

    /// `None` waits for a human indefinitely
    pub confirmation_timeout: Option<Duration>,

    /// How long cancelled in-progress steps get to wind down
    pub cancel_grace: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl EngineOptions {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency.max(1),
            tool_timeout: Duration::from_millis(cfg.tool_timeout_ms),
            confirmation_timeout: (cfg.confirmation_timeout_ms > 0)
                .then(|| Duration::from_millis(cfg.confirmation_timeout_ms)),
            cancel_grace: Duration::from_millis(cfg.cancel_grace_ms),
        }
    }

    /// Semaphore size. A literal `0` in `max_concurrency` still dispatches
    /// one step at a time.
    pub fn permits(&self) -> usize {
        self.max_concurrency.max(1)
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_confirmation_timeout_means_wait_forever() {
        let opts = EngineOptions::default();
        assert_eq!(opts.max_concurrency, 4);
        assert_eq!(opts.tool_timeout, Duration::from_secs(60));
        assert_eq!(opts.confirmation_timeout, None);
        assert_eq!(opts.cancel_grace, Duration::from_secs(2));
    }

    #[test]
    fn concurrency_is_clamped() {
        let cfg = EngineConfig {
            max_concurrency: 0,
            confirmation_timeout_ms: 500,
            ..EngineConfig::default()
        };
        let opts = EngineOptions::from_config(&cfg);
        assert_eq!(opts.max_concurrency, 1);
        assert_eq!(opts.confirmation_timeout, Some(Duration::from_millis(500)));
        assert_eq!(EngineOptions::default().with_max_concurrency(0).max_concurrency, 1);
    }

    #[test]
    fn zero_field_still_yields_one_permit() {
        let opts = EngineOptions {
            max_concurrency: 0,
            ..EngineOptions::default()
        };
        assert_eq!(opts.permits(), 1);
        assert_eq!(EngineOptions::default().permits(), 4);
    }
}
