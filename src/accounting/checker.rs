//! Soft/hard utilization threshold checking layered on top of a resource
//! manager's raw quota check.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::slab::ResourceStats;

const DEFAULT_SOFT_THRESHOLD: f64 = 0.70;
const DEFAULT_HARD_THRESHOLD: f64 = 0.90;

/// Invoked when a tenant crosses the soft threshold: `(tenant_id,
/// usage_ratio, quota)`.
pub type BreachCallback = Arc<dyn Fn(&str, f64, f64) + Send + Sync>;

/// A trait implemented by `MemoryResourceManager`/`DiskResourceManager` so
/// `QuotaChecker` can stay generic over the resource it's guarding.
pub trait StatsSource {
    fn raw_check_quota(&self, tenant_id: &str, requested: f64) -> bool;
    fn stats(&self, tenant_id: &str) -> Option<ResourceStats>;
}

/// Wraps a resource manager with soft-warn / hard-reject thresholds,
/// independent of the manager's own `used + requested <= quota` check.
pub struct QuotaChecker<R: StatsSource> {
    resource: R,
    soft_threshold: f64,
    hard_threshold: f64,
    on_breach: Mutex<Option<BreachCallback>>,
}

impl<R: StatsSource> QuotaChecker<R> {
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            soft_threshold: DEFAULT_SOFT_THRESHOLD,
            hard_threshold: DEFAULT_HARD_THRESHOLD,
            on_breach: Mutex::new(None),
        }
    }

    pub fn with_thresholds(resource: R, soft: f64, hard: f64) -> Self {
        Self {
            resource,
            soft_threshold: soft,
            hard_threshold: hard,
            on_breach: Mutex::new(None),
        }
    }

    pub fn set_breach_callback(&self, callback: BreachCallback) {
        *self.on_breach.lock() = Some(callback);
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// True iff: a slot exists, `used + requested <= quota`, and
    /// `used / quota < hard_threshold`. A soft-threshold crossing fires
    /// the breach callback but does not fail the check.
    pub fn check_quota(&self, tenant_id: &str, requested: f64) -> bool {
        let Some(stats) = self.resource.stats(tenant_id) else {
            return false;
        };
        if !self.resource.raw_check_quota(tenant_id, requested) {
            return false;
        }

        let ratio = if stats.quota > 0.0 { stats.used / stats.quota } else { 0.0 };
        if ratio >= self.soft_threshold {
            warn!(tenant_id, ratio, "tenant crossed soft utilization threshold");
            if let Some(cb) = self.on_breach.lock().as_ref() {
                cb(tenant_id, ratio, stats.quota);
            }
        }
        ratio < self.hard_threshold
    }
}
