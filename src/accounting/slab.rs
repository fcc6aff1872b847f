//! Shared `{allocated, used, quota, peak}` bookkeeping used by both the
//! memory and disk resource managers.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::tenant::Tenant;

use super::proportional_share;

/// A snapshot of one tenant's usage in a single resource dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceStats {
    pub allocated: f64,
    pub used: f64,
    pub quota: f64,
    pub peak: f64,
}

struct Slot {
    quota: f64,
    used: f64,
    peak: f64,
}

struct Inner {
    total_capacity: f64,
    allocated_total: f64,
    slots: HashMap<String, Slot>,
}

/// Generic per-tenant slab accounting for a single resource dimension
/// (memory or disk). `label` is used only for log fields.
pub struct SlabAccounting {
    label: &'static str,
    inner: Mutex<Inner>,
}

impl SlabAccounting {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: Mutex::new(Inner {
                total_capacity: 0.0,
                allocated_total: 0.0,
                slots: HashMap::new(),
            }),
        }
    }

    pub fn initialize(&self, total_capacity: f64) {
        let mut inner = self.inner.lock();
        inner.total_capacity = total_capacity;
        inner.allocated_total = 0.0;
        inner.slots.clear();
        info!(resource = self.label, total_capacity, "resource accounting initialized");
    }

    /// Idempotent: allocating a tenant that already has a slot returns
    /// `true` without changing state.
    pub fn allocate_resource(&self, tenant: &Tenant) -> bool {
        let mut inner = self.inner.lock();
        let tenant_id = tenant.id().to_string();
        if inner.slots.contains_key(&tenant_id) {
            return true;
        }

        let share = proportional_share(tenant.cpu_quota(), inner.total_capacity);
        if inner.allocated_total + share > inner.total_capacity {
            warn!(resource = self.label, tenant_id, share, "allocation rejected: capacity exceeded");
            return false;
        }

        inner.allocated_total += share;
        inner.slots.insert(
            tenant_id,
            Slot {
                quota: share,
                used: 0.0,
                peak: 0.0,
            },
        );
        true
    }

    pub fn release_resource(&self, tenant_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.slots.remove(tenant_id) {
            inner.allocated_total -= slot.quota;
        }
        true
    }

    /// `None` means no slot exists for this tenant.
    pub fn get_usage(&self, tenant_id: &str) -> Option<f64> {
        let inner = self.inner.lock();
        inner.slots.get(tenant_id).map(|s| s.used)
    }

    pub fn update_usage(&self, tenant_id: &str, value: f64) -> bool {
        let mut inner = self.inner.lock();
        match inner.slots.get_mut(tenant_id) {
            Some(slot) => {
                slot.used = value;
                slot.peak = slot.peak.max(value);
                true
            }
            None => false,
        }
    }

    pub fn check_quota(&self, tenant_id: &str, requested: f64) -> bool {
        let inner = self.inner.lock();
        match inner.slots.get(tenant_id) {
            Some(slot) => slot.used + requested <= slot.quota,
            None => false,
        }
    }

    pub fn stats(&self, tenant_id: &str) -> Option<ResourceStats> {
        let inner = self.inner.lock();
        inner.slots.get(tenant_id).map(|s| ResourceStats {
            allocated: inner.allocated_total,
            used: s.used,
            quota: s.quota,
            peak: s.peak,
        })
    }

    pub fn quota(&self, tenant_id: &str) -> Option<f64> {
        self.inner.lock().slots.get(tenant_id).map(|s| s.quota)
    }
}
