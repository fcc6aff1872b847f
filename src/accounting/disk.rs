//! Per-tenant disk accounting, in GB.

use super::slab::{ResourceStats, SlabAccounting};
use crate::tenant::Tenant;

pub struct DiskResourceManager {
    slab: SlabAccounting,
}

impl DiskResourceManager {
    pub fn new() -> Self {
        Self { slab: SlabAccounting::new("disk") }
    }

    pub fn initialize(&self, total_disk_gb: f64) {
        self.slab.initialize(total_disk_gb);
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

    pub fn update_usage(&self, tenant_id: &str, used_gb: f64) -> bool {
        self.slab.update_usage(tenant_id, used_gb)
    }

    pub fn check_quota(&self, tenant_id: &str, requested_gb: f64) -> bool {
        self.slab.check_quota(tenant_id, requested_gb)
    }

    pub fn stats(&self, tenant_id: &str) -> Option<ResourceStats> {
        self.slab.stats(tenant_id)
    }
}

impl Default for DiskResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
