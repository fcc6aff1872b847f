//! The per-request gate: `user@tenant` routing plus the CPU quota check.

use std::sync::Arc;

use crate::accounting::CpuResourceManager;
use crate::registry::TenantRegistry;
use crate::tenant::Tenant;

/// Splits `user@tenant` and resolves the tenant against the registry.
/// Returns an empty string on any malformed input or unknown tenant:
/// no `@`, an empty username segment, or an empty/unknown tenant
/// segment.
pub fn authenticate(registry: &TenantRegistry, user_at_tenant: &str) -> String {
    let Some((user, tenant_id)) = user_at_tenant.split_once('@') else {
        return String::new();
    };
    if user.is_empty() || tenant_id.is_empty() {
        return String::new();
    }
    if registry.get_tenant(tenant_id).is_none() {
        return String::new();
    }
    tenant_id.to_string()
}

/// True iff the tenant exists and its current CPU usage is strictly
/// below its `cpu_quota`.
///
/// `cpu_quota` and the thread-budget formula (`cpu_quota * 10` worker
/// threads) share one unit system: a quota point is worth 10% of a
/// core. CPU accounting reports usage as a `[0, 1]` ratio of a whole
/// core, so it is scaled by 10 before comparing against `cpu_quota`
/// directly, rather than compared unconverted (the unit-mismatch bug
/// this check otherwise has).
pub fn check_cpu_quota(cpu: &CpuResourceManager, registry: &TenantRegistry, tenant_id: &str) -> bool {
    let Some(tenant) = registry.get_tenant(tenant_id) else {
        return false;
    };
    let Some(usage_ratio) = cpu.get_usage(tenant_id) else {
        return false;
    };
    (usage_ratio * 10.0) < tenant.cpu_quota() as f64
}

/// Per-request bundle of the shared tenant handle and an exclusively
/// owned statistics sink.
pub struct RequestContext {
    tenant: Arc<Tenant>,
    stats: Box<dyn ResourceStatsSink>,
}

/// The narrow stats-recording surface a request context writes through;
/// deliberately small, mirroring the source's abstract-class-with-one-
/// concrete-subclass shape.
pub trait ResourceStatsSink: Send {
    fn record_cpu(&mut self, delta: f64);
    fn record_memory(&mut self, delta: f64);
    fn record_disk(&mut self, delta: f64);
    fn cpu_used(&self) -> f64;
    fn memory_used(&self) -> f64;
    fn disk_used(&self) -> f64;
}

/// The one concrete `ResourceStatsSink` this crate ships.
#[derive(Default)]
pub struct BasicResourceStats {
    cpu: f64,
    memory: f64,
    disk: f64,
}

impl ResourceStatsSink for BasicResourceStats {
    fn record_cpu(&mut self, delta: f64) {
        self.cpu += delta;
    }

    fn record_memory(&mut self, delta: f64) {
        self.memory += delta;
    }

    fn record_disk(&mut self, delta: f64) {
        self.disk += delta;
    }

    fn cpu_used(&self) -> f64 {
        self.cpu
    }

    fn memory_used(&self) -> f64 {
        self.memory
    }

    fn disk_used(&self) -> f64 {
        self.disk
    }
}

impl RequestContext {
    pub fn new(tenant: Arc<Tenant>, stats: Box<dyn ResourceStatsSink>) -> Self {
        Self { tenant, stats }
    }

    pub fn tenant(&self) -> &Arc<Tenant> {
        &self.tenant
    }

    pub fn stats(&self) -> &dyn ResourceStatsSink {
        self.stats.as_ref()
    }

    pub fn stats_mut(&mut self) -> &mut dyn ResourceStatsSink {
        self.stats.as_mut()
    }
}
