//! Execution context for running cursor trees.
//!
//! The context is created once per query and shared by every cursor of the
//! plan through an [`Arc`]. It carries the group store, the runtime
//! configuration, the cancellation token, and execution statistics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arbordb_storage::GroupStore;

use crate::error::{ExecError, ExecResult};

/// Execution context for a query.
///
/// The context provides access to:
/// - The group store that leaf cursors read from
/// - Cancellation support
/// - Execution statistics
/// - Runtime configuration
pub struct ExecutionContext {
    /// Storage for leaf cursors.
    store: Option<Arc<dyn GroupStore>>,
    /// Cancellation flag, shareable with other threads.
    cancellation: CancellationToken,
    /// Execution statistics.
    stats: ExecutionStats,
    /// Configuration options.
    config: ExecutionConfig,
}

impl ExecutionContext {
    /// Creates a new execution context without a store.
    ///
    /// Use [`with_store`](Self::with_store) to attach one.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: None,
            cancellation: CancellationToken::new(),
            stats: ExecutionStats::new(),
            config: ExecutionConfig::default(),
        }
    }

    /// Attaches the group store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn GroupStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the execution configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the group store.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Unsupported`] if no store is attached.
    pub fn store(&self) -> ExecResult<&Arc<dyn GroupStore>> {
        self.store.as_ref().ok_or_else(|| ExecError::Unsupported("no group store attached to the context".into()))
    }

    /// Returns a handle that cancels this query.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Cancels the query execution.
    #[inline]
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Checks if the query has been cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fails with [`ExecError::Cancelled`] once the query is cancelled.
    #[inline]
    pub fn check_cancelled(&self) -> ExecResult<()> {
        if self.is_cancelled() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Returns the execution statistics.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Records that rows were read from storage.
    #[inline]
    pub fn record_rows_read(&self, count: u64) {
        if self.config.collect_stats {
            self.stats.rows_read.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Records that rows were produced by the plan root.
    #[inline]
    pub fn record_rows_produced(&self, count: u64) {
        if self.config.collect_stats {
            self.stats.rows_produced.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Records one cursor jump.
    #[inline]
    pub fn record_jump(&self) {
        if self.config.collect_stats {
            self.stats.jumps.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns the maximum rows in memory limit.
    ///
    /// Returns 0 if the limit is disabled.
    #[inline]
    #[must_use]
    pub fn max_rows_in_memory(&self) -> usize {
        self.config.max_rows_in_memory
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("store", &self.store.as_ref().map(|s| s.group().name().to_owned()))
            .field("cancelled", &self.is_cancelled())
            .field("stats", &self.stats)
            .field("config", &self.config)
            .finish()
    }
}

/// Execution statistics collected while a plan runs.
#[derive(Debug)]
pub struct ExecutionStats {
    /// When execution started.
    start_time: Instant,
    /// Number of rows read from storage.
    rows_read: AtomicU64,
    /// Number of rows produced by the plan root.
    rows_produced: AtomicU64,
    /// Number of cursor jumps.
    jumps: AtomicU64,
}

impl ExecutionStats {
    /// Creates new execution statistics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rows_read: AtomicU64::new(0),
            rows_produced: AtomicU64::new(0),
            jumps: AtomicU64::new(0),
        }
    }

    /// Returns the number of rows read.
    #[inline]
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read.load(Ordering::Relaxed)
    }

    /// Returns the number of rows produced.
    #[inline]
    #[must_use]
    pub fn rows_produced(&self) -> u64 {
        self.rows_produced.load(Ordering::Relaxed)
    }

    /// Returns the number of jumps.
    #[inline]
    #[must_use]
    pub fn jumps(&self) -> u64 {
        self.jumps.load(Ordering::Relaxed)
    }

    /// Returns the elapsed execution time.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Default maximum rows in memory (1 million rows).
pub const DEFAULT_MAX_ROWS_IN_MEMORY: usize = 1_000_000;

/// Configuration options for query execution.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Maximum number of rows that blocking operators may buffer.
    ///
    /// Sorting past this limit returns a `QueryTooLarge` error.
    /// Set to 0 to disable the limit.
    /// Default: 1,000,000 rows.
    pub max_rows_in_memory: usize,
    /// Whether to collect statistics.
    pub collect_stats: bool,
    /// Whether to trace every row a cursor yields.
    pub log_execution: bool,
}

impl ExecutionConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_rows_in_memory: DEFAULT_MAX_ROWS_IN_MEMORY, collect_stats: false, log_execution: false }
    }

    /// Enables statistics collection.
    #[must_use]
    pub const fn with_stats(mut self) -> Self {
        self.collect_stats = true;
        self
    }

    /// Enables per-row tracing.
    #[must_use]
    pub const fn with_execution_log(mut self) -> Self {
        self.log_execution = true;
        self
    }

    /// Sets the maximum rows that can be materialized in memory.
    #[must_use]
    pub const fn with_max_rows_in_memory(mut self, limit: usize) -> Self {
        self.max_rows_in_memory = limit;
        self
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle for cancelling query execution.
///
/// Can be shared between threads to allow cancellation from outside
/// the query execution thread.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancels the associated query.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks if cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_cancellation() {
        let ctx = ExecutionContext::new();
        assert!(!ctx.is_cancelled());
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check_cancelled(), Err(ExecError::Cancelled)));
    }

    #[test]
    fn stats_only_when_enabled() {
        let quiet = ExecutionContext::new();
        quiet.record_rows_read(10);
        assert_eq!(quiet.stats().rows_read(), 0);

        let ctx = ExecutionContext::new().with_config(ExecutionConfig::new().with_stats());
        ctx.record_rows_read(100);
        ctx.record_rows_produced(50);
        ctx.record_jump();

        assert_eq!(ctx.stats().rows_read(), 100);
        assert_eq!(ctx.stats().rows_produced(), 50);
        assert_eq!(ctx.stats().jumps(), 1);
    }

    #[test]
    fn missing_store_is_reported() {
        let ctx = ExecutionContext::new();
        assert!(matches!(ctx.store(), Err(ExecError::Unsupported(_))));
    }

    #[test]
    fn shared_token_cancels_context() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::new().with_cancellation(token.clone());

        token.cancel();

        assert!(ctx.is_cancelled());
    }

    #[test]
    fn config_builder() {
        let config = ExecutionConfig::new().with_max_rows_in_memory(10).with_execution_log();
        assert_eq!(config.max_rows_in_memory, 10);
        assert!(config.log_execution);
        assert!(!config.collect_stats);
    }
}
