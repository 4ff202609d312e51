//! Guard configuration.

use crate::error::GuardError;
use std::num::NonZeroUsize;

/// Knobs for an [`AllocGuard`](crate::guard::AllocGuard).
///
/// Validated when the guard is built; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardConfig {
    /// Counter reads discarded before the start sample.
    ///
    /// Default: 1. Must not exceed [`GuardConfig::MAX_WARMUP_READS`].
    pub warmup_reads: u32,

    /// Upper bound on live worker threads across this guard.
    ///
    /// Default: `None` (unbounded). Callers block before spawning while the
    /// cap is reached.
    pub max_workers: Option<NonZeroUsize>,

    /// Worker stack size in bytes. `None` uses the platform default.
    pub stack_size: Option<usize>,

    /// Name given to every worker thread.
    pub thread_name: String,

    /// Refuse to run when the counting allocator is not installed.
    ///
    /// Default: true.
    pub verify_counter: bool,
}

impl GuardConfig {
    pub const DEFAULT_WARMUP_READS: u32 = 1;

    pub const MAX_WARMUP_READS: u32 = 1024;

    /// Smallest stack size accepted for a worker.
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    pub const DEFAULT_THREAD_NAME: &'static str = "allocguard-worker";

    pub const ENV_WARMUP_READS: &'static str = "ALLOCGUARD_WARMUP_READS";
    pub const ENV_MAX_WORKERS: &'static str = "ALLOCGUARD_MAX_WORKERS";
    pub const ENV_STACK_SIZE: &'static str = "ALLOCGUARD_STACK_SIZE";
    pub const ENV_VERIFY_COUNTER: &'static str = "ALLOCGUARD_VERIFY_COUNTER";

    pub fn new() -> Self {
        Self {
            warmup_reads: Self::DEFAULT_WARMUP_READS,
            max_workers: None,
            stack_size: None,
            thread_name: Self::DEFAULT_THREAD_NAME.to_string(),
            verify_counter: true,
        }
    }

    pub fn with_warmup_reads(mut self, reads: u32) -> Self {
        self.warmup_reads = reads;
        self
    }

    /// Cap live workers. `0` removes the cap.
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = NonZeroUsize::new(max);
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_verify_counter(mut self, verify: bool) -> Self {
        self.verify_counter = verify;
        self
    }

    /// Defaults overlaid with any `ALLOCGUARD_*` environment variables.
    pub fn from_env() -> Result<Self, GuardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GuardError> {
        let mut config = Self::new();
        if let Some(raw) = lookup(Self::ENV_WARMUP_READS) {
            config.warmup_reads = parse(Self::ENV_WARMUP_READS, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_MAX_WORKERS) {
            config.max_workers = NonZeroUsize::new(parse(Self::ENV_MAX_WORKERS, &raw)?);
        }
        if let Some(raw) = lookup(Self::ENV_STACK_SIZE) {
            config.stack_size = Some(parse(Self::ENV_STACK_SIZE, &raw)?);
        }
        if let Some(raw) = lookup(Self::ENV_VERIFY_COUNTER) {
            config.verify_counter = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(GuardError::InvalidConfig {
                        reason: format!("{}: expected a boolean, got '{other}'", Self::ENV_VERIFY_COUNTER),
                    })
                }
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        if self.warmup_reads > Self::MAX_WARMUP_READS {
            return Err(GuardError::InvalidConfig {
                reason: format!(
                    "warmup_reads {} exceeds maximum {}",
                    self.warmup_reads,
                    Self::MAX_WARMUP_READS
                ),
            });
        }
        if let Some(size) = self.stack_size {
            if size < Self::MIN_STACK_SIZE {
                return Err(GuardError::InvalidConfig {
                    reason: format!("stack_size {size} is below minimum {}", Self::MIN_STACK_SIZE),
                });
            }
        }
        if self.thread_name.contains('\0') {
            return Err(GuardError::InvalidConfig {
                reason: "thread_name must not contain NUL".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, GuardError> {
    raw.trim().parse().map_err(|_| GuardError::InvalidConfig {
        reason: format!("{key}: cannot parse '{raw}'"),
    })
}
