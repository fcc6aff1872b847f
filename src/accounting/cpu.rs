//! Per-tenant CPU usage accounting.
//!
//! Unlike memory and disk, CPU has no per-slot quota structure: a slot is
//! just a registered tenant id holding the single `usage_percent` scalar
//! most recently observed by the CPU monitor. Peak is not tracked, which
//! matches the source's own asymmetry between CPU and the other two
//! resources.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::warn;

use crate::tenant::Tenant;

struct Slot {
    usage_percent: f64,
    share: f64,
}

struct Inner {
    total_capacity: f64,
    allocated_total: f64,
    usage: HashMap<String, Slot>,
}

pub struct CpuResourceManager {
    inner: Mutex<Inner>,
}

impl CpuResourceManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                total_capacity: 0.0,
                allocated_total: 0.0,
                usage: HashMap::new(),
            }),
        }
    }

    pub fn initialize(&self, total_capacity: f64) {
        let mut inner = self.inner.lock();
        inner.total_capacity = total_capacity;
        inner.allocated_total = 0.0;
        inner.usage.clear();
    }

    /// Idempotent: allocating an already-registered tenant returns `true`.
    pub fn allocate_resource(&self, tenant: &Tenant) -> bool {
        let mut inner = self.inner.lock();
        let tenant_id = tenant.id().to_string();
        if inner.usage.contains_key(&tenant_id) {
            return true;
        }
        let share = tenant.cpu_quota() as f64;
        if inner.allocated_total + share > inner.total_capacity {
            warn!(tenant_id, share, "cpu allocation rejected: capacity exceeded");
            return false;
        }
        inner.allocated_total += share;
        inner.usage.insert(tenant_id, Slot { usage_percent: 0.0, share });
        true
    }

    pub fn release_resource(&self, tenant_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.usage.remove(tenant_id) {
            inner.allocated_total -= slot.share;
        }
        true
    }

    /// Usage ratio in `[0, 1]`; `None` means the tenant has no slot.
    pub fn get_usage(&self, tenant_id: &str) -> Option<f64> {
        self.inner.lock().usage.get(tenant_id).map(|s| s.usage_percent)
    }

    pub fn update_usage(&self, tenant_id: &str, usage_percent: f64) -> bool {
        let mut inner = self.inner.lock();
        match inner.usage.get_mut(tenant_id) {
            Some(slot) => {
                slot.usage_percent = usage_percent;
                true
            }
            None => false,
        }
    }
}

impl Default for CpuResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_idempotent() {
        let mgr = CpuResourceManager::new();
        mgr.initialize(100.0);
        let t = Tenant::new("t1".to_string(), 4, 0, 0);
        assert!(mgr.allocate_resource(&t));
        assert!(mgr.allocate_resource(&t));
        assert_eq!(mgr.get_usage("t1"), Some(0.0));
    }

    #[test]
    fn usage_of_unknown_tenant_is_none() {
        let mgr = CpuResourceManager::new();
        mgr.initialize(100.0);
        assert!(mgr.get_usage("ghost").is_none());
    }

    #[test]
    fn update_usage_fails_without_slot() {
        let mgr = CpuResourceManager::new();
        mgr.initialize(100.0);
        assert!(!mgr.update_usage("ghost", 0.5));
    }
}
