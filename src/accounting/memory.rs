//! Per-tenant memory accounting, in MB.

use super::slab::{ResourceStats, SlabAccounting};
use crate::tenant::Tenant;

pub struct MemoryResourceManager {
    slab: SlabAccounting,
}

impl MemoryResourceManager {
    pub fn new() -> Self {
        Self { slab: SlabAccounting::new("memory") }
    }

    pub fn initialize(&self, total_memory_mb: f64) {
        self.slab.initialize(total_memory_mb);
    }

    pub fn allocate_resource(&self, tenant: &Tenant) -> bool {
        self.slab.allocate_resource(tenant)
    }

    pub fn release_resource(&self, tenant_id: &str) -> bool {
        self.slab.release_resource(tenant_id)
    }

    pub fn get_usage(&self, tenant_id: &str) -> Option<f64> {
        self.slab.get_usage(tenant_id)
    }

    pub fn update_usage(&self, tenant_id: &str, used_mb: f64) -> bool {
        self.slab.update_usage(tenant_id, used_mb)
    }

    pub fn check_quota(&self, tenant_id: &str, requested_mb: f64) -> bool {
        self.slab.check_quota(tenant_id, requested_mb)
    }

    pub fn stats(&self, tenant_id: &str) -> Option<ResourceStats> {
        self.slab.stats(tenant_id)
    }
}

impl Default for MemoryResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
