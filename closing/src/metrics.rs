//! Metrics collection for closing service monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Closing service metrics.
pub struct Metrics {
    /// Total closing attempts.
    pub closings_total: AtomicU64,
    /// Successful closings.
    pub closings_success: AtomicU64,
    /// Failed closings (any error).
    pub closings_failed: AtomicU64,
    /// Closings that found nothing to close.
    pub closings_noop: AtomicU64,
    /// Closings rolled back by post-close validation.
    pub validation_failures: AtomicU64,
    /// Closings in progress.
    pub closings_active: AtomicU64,
    /// Periods reopened.
    pub periods_reopened: AtomicU64,
    /// Periods locked.
    pub periods_locked: AtomicU64,
    /// Journal entries posted through the API.
    pub entries_posted: AtomicU64,
    /// Journal entries voided through the API.
    pub entries_voided: AtomicU64,
    /// Balance rebuilds requested.
    pub balance_rebuilds: AtomicU64,
    /// Accounts corrected by rebuilds.
    pub balances_corrected: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            closings_total: AtomicU64::new(0),
            closings_success: AtomicU64::new(0),
            closings_failed: AtomicU64::new(0),
            closings_noop: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            closings_active: AtomicU64::new(0),
            periods_reopened: AtomicU64::new(0),
            periods_locked: AtomicU64::new(0),
            entries_posted: AtomicU64::new(0),
            entries_voided: AtomicU64::new(0),
            balance_rebuilds: AtomicU64::new(0),
            balances_corrected: AtomicU64::new(0),
        }
    }

    pub fn closing_started(&self) {
        self.closings_total.fetch_add(1, Ordering::Relaxed);
        self.closings_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed closing; `noop` when no entry was needed.
    pub fn closing_succeeded(&self, noop: bool) {
        self.closings_success.fetch_add(1, Ordering::Relaxed);
        if noop {
            self.closings_noop.fetch_add(1, Ordering::Relaxed);
        }
        self.closings_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn closing_failed(&self, validation: bool) {
        self.closings_failed.fetch_add(1, Ordering::Relaxed);
        if validation {
            self.validation_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.closings_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn period_reopened(&self) {
        self.periods_reopened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn period_locked(&self) {
        self.periods_locked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entry_posted(&self) {
        self.entries_posted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entry_voided(&self) {
        self.entries_voided.fetch_add(1, Ordering::Relaxed);
    }

    pub fn balances_rebuilt(&self, corrected: u64) {
        self.balance_rebuilds.fetch_add(1, Ordering::Relaxed);
        self.balances_corrected.fetch_add(corrected, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            closings_total: self.closings_total.load(Ordering::Relaxed),
            closings_success: self.closings_success.load(Ordering::Relaxed),
            closings_failed: self.closings_failed.load(Ordering::Relaxed),
            closings_noop: self.closings_noop.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            closings_active: self.closings_active.load(Ordering::Relaxed),
            periods_reopened: self.periods_reopened.load(Ordering::Relaxed),
            periods_locked: self.periods_locked.load(Ordering::Relaxed),
            entries_posted: self.entries_posted.load(Ordering::Relaxed),
            entries_voided: self.entries_voided.load(Ordering::Relaxed),
            balance_rebuilds: self.balance_rebuilds.load(Ordering::Relaxed),
            balances_corrected: self.balances_corrected.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let series: [(&str, &str, &str, u64); 12] = [
            ("closings_total", "counter", "Total period closing attempts", s.closings_total),
            ("closings_success", "counter", "Successful period closings", s.closings_success),
            ("closings_failed", "counter", "Failed period closings", s.closings_failed),
            ("closings_noop", "counter", "Closings without a closing entry", s.closings_noop),
            ("closing_validation_failures", "counter", "Closings rolled back by validation", s.validation_failures),
            ("closings_active", "gauge", "Closings in progress", s.closings_active),
            ("periods_reopened", "counter", "Periods reopened", s.periods_reopened),
            ("periods_locked", "counter", "Periods locked", s.periods_locked),
            ("entries_posted", "counter", "Journal entries posted", s.entries_posted),
            ("entries_voided", "counter", "Journal entries voided", s.entries_voided),
            ("balance_rebuilds", "counter", "Balance rebuilds", s.balance_rebuilds),
            ("balances_corrected", "counter", "Account balances corrected by rebuilds", s.balances_corrected),
        ];

        let mut out = String::new();
        for (name, kind, help, value) in series {
            out.push_str(&format!(
                "# HELP closebook_{name} {help}\n# TYPE closebook_{name} {kind}\nclosebook_{name} {value}\n\n"
            ));
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub closings_total: u64,
    pub closings_success: u64,
    pub closings_failed: u64,
    pub closings_noop: u64,
    pub validation_failures: u64,
    pub closings_active: u64,
    pub periods_reopened: u64,
    pub periods_locked: u64,
    pub entries_posted: u64,
    pub entries_voided: u64,
    pub balance_rebuilds: u64,
    pub balances_corrected: u64,
}
