use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_SLOW_STATEMENT_THRESHOLD: Duration = Duration::from_secs(1);

/// Counters for every round trip to the SQL engine, seed statements and
/// learner submissions alike.
pub struct ExecutionMetrics {
    statements: AtomicU64,
    failures: AtomicU64,
    slow_statements: AtomicU64,
    busy_us: AtomicU64,
    slow_threshold: Duration,
}

/// Point-in-time copy of [`ExecutionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub statements: u64,
    pub failures: u64,
    pub slow_statements: u64,
    pub busy: Duration,
}

impl MetricsSnapshot {
    pub fn average(&self) -> Duration {
        match u32::try_from(self.statements) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.busy / count,
            Err(_) => Duration::from_micros(
                u64::try_from(self.busy.as_micros()).unwrap_or(u64::MAX) / self.statements,
            ),
        }
    }

    /// Counts accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            statements: self.statements.saturating_sub(earlier.statements),
            failures: self.failures.saturating_sub(earlier.failures),
            slow_statements: self.slow_statements.saturating_sub(earlier.slow_statements),
            busy: self.busy.saturating_sub(earlier.busy),
        }
    }
}

impl ExecutionMetrics {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            statements: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            slow_statements: AtomicU64::new(0),
            busy_us: AtomicU64::new(0),
            slow_threshold,
        }
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Returns whether the statement counted as slow.
    pub fn record(&self, elapsed: Duration, failed: bool) -> bool {
        self.statements.fetch_add(1, Ordering::Relaxed);
        self.busy_us.fetch_add(
            u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        let slow = elapsed >= self.slow_threshold;
        if slow {
            self.slow_statements.fetch_add(1, Ordering::Relaxed);
        }
        slow
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            statements: self.statements.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            slow_statements: self.slow_statements.load(Ordering::Relaxed),
            busy: Duration::from_micros(self.busy_us.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.statements.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.slow_statements.store(0, Ordering::Relaxed);
        self.busy_us.store(0, Ordering::Relaxed);
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_STATEMENT_THRESHOLD)
    }
}
