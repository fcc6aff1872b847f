//! The tenant registry: CRUD plus atomic multi-resource allocation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::accounting::{CpuMonitor, CpuResourceManager, DiskResourceManager, MemoryResourceManager};
use crate::error::{CoreError, Result};
use crate::tenant::Tenant;
use crate::thread_pool::ThreadPoolManager;

/// Threads granted per percentage point of `cpu_quota`, per the fixed
/// worker-sizing policy (see the design notes on why this is a policy
/// constant rather than something tenants configure).
const THREADS_PER_CPU_QUOTA_POINT: u32 = 10;

/// Guards the `tenant_id -> Arc<Tenant>` map and orchestrates the
/// CPU -> memory -> disk -> monitor -> thread-group allocation sequence
/// with full rollback on partial failure.
///
/// Lock ordering (invariant): this registry's lock is always acquired
/// and released before calling into any of the subsystems below; none of
/// them call back into the registry. Acquiring two subsystem locks at
/// once is never done here.
pub struct TenantRegistry {
    tenants: Mutex<HashMap<String, Arc<Tenant>>>,
    cpu: Arc<CpuResourceManager>,
    memory: Arc<MemoryResourceManager>,
    disk: Arc<DiskResourceManager>,
    monitor: Arc<CpuMonitor>,
    thread_pool: Arc<ThreadPoolManager>,
}

impl TenantRegistry {
    pub fn new(
        cpu: Arc<CpuResourceManager>,
        memory: Arc<MemoryResourceManager>,
        disk: Arc<DiskResourceManager>,
        monitor: Arc<CpuMonitor>,
        thread_pool: Arc<ThreadPoolManager>,
    ) -> Self {
        Self {
            tenants: Mutex::new(HashMap::new()),
            cpu,
            memory,
            disk,
            monitor,
            thread_pool,
        }
    }

    /// Allocates CPU, memory, disk, registers with the CPU monitor, and
    /// creates the tenant's thread group, in that order, rolling back
    /// every successful step if a later one fails. The tenant becomes
    /// visible in the registry only on full success (never observable
    /// with partial allocation, per the atomicity invariant).
    pub fn create_tenant(&self, id: &str, cpu_quota: u32, memory_quota: u64, disk_quota: u64) -> Result<()> {
        if id.is_empty() || id.contains('/') {
            return Err(CoreError::InvalidArgument(format!("tenant id {id:?} must be non-empty and contain no '/'")));
        }
        if self.tenants.lock().contains_key(id) {
            warn!(tenant_id = id, "create_tenant rejected: already exists");
            return Err(CoreError::TenantExists(id.to_string()));
        }

        let tenant = Arc::new(Tenant::new(id.to_string(), cpu_quota, memory_quota, disk_quota));

        if !self.cpu.allocate_resource(&tenant) {
            return Err(CoreError::QuotaExhausted(format!("{id} cpu")));
        }
        if !self.memory.allocate_resource(&tenant) {
            self.cpu.release_resource(id);
            return Err(CoreError::QuotaExhausted(format!("{id} memory")));
        }
        if !self.disk.allocate_resource(&tenant) {
            self.memory.release_resource(id);
            self.cpu.release_resource(id);
            return Err(CoreError::QuotaExhausted(format!("{id} disk")));
        }

        self.monitor.register_tenant(id);

        let threads = cpu_quota * THREADS_PER_CPU_QUOTA_POINT;
        if let Err(e) = self.thread_pool.create_tenant_thread_group(id, threads as usize) {
            self.monitor.unregister_tenant(id);
            self.disk.release_resource(id);
            self.memory.release_resource(id);
            self.cpu.release_resource(id);
            return Err(e);
        }

        self.tenants.lock().insert(id.to_string(), tenant);
        info!(tenant_id = id, cpu_quota, memory_quota, disk_quota, "tenant created");
        Ok(())
    }

    pub fn get_tenant(&self, id: &str) -> Option<Arc<Tenant>> {
        self.tenants.lock().get(id).cloned()
    }

    /// Best-effort teardown: every sub-step runs regardless of whether
    /// earlier ones succeeded, since the caller's intent is simply to
    /// reach the absent state.
    pub fn remove_tenant(&self, id: &str) -> bool {
        self.cpu.release_resource(id);
        self.memory.release_resource(id);
        self.disk.release_resource(id);
        self.monitor.unregister_tenant(id);
        self.thread_pool.remove_tenant_thread_group(id);
        let existed = self.tenants.lock().remove(id).is_some();
        info!(tenant_id = id, existed, "tenant removed");
        true
    }

    /// Mutates the tenant's quotas in place and resizes its thread group
    /// to match; the resize result is not propagated, matching the
    /// fire-and-forget resize semantics of the source.
    pub fn update_tenant_quota(&self, id: &str, cpu_quota: u32, memory_quota: u64, disk_quota: u64) -> Result<()> {
        let Some(tenant) = self.get_tenant(id) else {
            return Err(CoreError::TenantUnknown(id.to_string()));
        };
        tenant.set_quotas(cpu_quota, memory_quota, disk_quota);
        let _ = self.thread_pool.resize_tenant_threads(id, (cpu_quota * THREADS_PER_CPU_QUOTA_POINT) as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(total_threads: usize, total_mem: f64, total_disk: f64) -> TenantRegistry {
        let cpu = Arc::new(CpuResourceManager::new());
        cpu.initialize(100.0);
        let memory = Arc::new(MemoryResourceManager::new());
        memory.initialize(total_mem);
        let disk = Arc::new(DiskResourceManager::new());
        disk.initialize(total_disk);
        let monitor = Arc::new(CpuMonitor::new(cpu.clone()));
        let thread_pool = Arc::new(ThreadPoolManager::new());
        thread_pool.initialize(total_threads, false, std::path::Path::new("/tmp/unused"));
        TenantRegistry::new(cpu, memory, disk, monitor, thread_pool)
    }

    #[test]
    fn scenario_1_budget_guard_rolls_back_creation() {
        // total_threads=10, cpu=2 -> 20 threads needed, exceeds budget.
        let reg = registry(10, 8192.0, 100.0);
        assert!(matches!(reg.create_tenant("a", 2, 0, 0), Err(CoreError::QuotaExhausted(_))));
        assert!(reg.get_tenant("a").is_none());
        assert!(reg.cpu.get_usage("a").is_none());
    }

    #[test]
    fn empty_or_slash_tenant_id_is_rejected() {
        let reg = registry(120, 8192.0, 100.0);
        assert!(matches!(reg.create_tenant("", 1, 0, 0), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(reg.create_tenant("a/b", 1, 0, 0), Err(CoreError::InvalidArgument(_))));
    }

    #[test]
    fn create_tenant_is_atomic_across_all_slots() {
        let reg = registry(120, 8192.0, 100.0);
        assert!(reg.create_tenant("a", 4, 0, 0).is_ok());
        assert!(reg.get_tenant("a").is_some());
        assert!(reg.cpu.get_usage("a").is_some());
        assert!(reg.memory.get_usage("a").is_some());
        assert!(reg.disk.get_usage("a").is_some());
        assert!(reg.thread_pool.get_tenant_thread_info("a").is_some());
    }

    #[test]
    fn scenario_5_tiny_capacity_rolls_back_cleanly() {
        // total_memory_mb=1: the proportional memory share always scales
        // with total capacity, so a tiny cap needs a large enough
        // cpu_quota (200, i.e. 2 cores) to actually exceed it; CPU and
        // thread budgets are sized generously so memory is the step that
        // fails, and CPU's own slot must be rolled back in response.
        let cpu = Arc::new(CpuResourceManager::new());
        cpu.initialize(1000.0);
        let memory = Arc::new(MemoryResourceManager::new());
        memory.initialize(1.0);
        let disk = Arc::new(DiskResourceManager::new());
        disk.initialize(100.0);
        let monitor = Arc::new(CpuMonitor::new(cpu.clone()));
        let thread_pool = Arc::new(ThreadPoolManager::new());
        thread_pool.initialize(3000, false, std::path::Path::new("/tmp/unused"));
        let reg = TenantRegistry::new(cpu.clone(), memory, disk, monitor, thread_pool);

        assert!(matches!(reg.create_tenant("big", 200, 0, 0), Err(CoreError::QuotaExhausted(_))));
        assert!(reg.get_tenant("big").is_none());
        assert!(cpu.get_usage("big").is_none());
    }

    #[test]
    fn remove_tenant_unregisters_everything() {
        let reg = registry(120, 8192.0, 100.0);
        reg.create_tenant("a", 4, 0, 0).unwrap();
        assert!(reg.remove_tenant("a"));
        assert!(reg.get_tenant("a").is_none());
        assert!(reg.cpu.get_usage("a").is_none());
        assert!(reg.thread_pool.get_tenant_thread_info("a").is_none());
    }

    #[test]
    fn duplicate_create_rejected() {
        let reg = registry(120, 8192.0, 100.0);
        assert!(reg.create_tenant("a", 1, 0, 0).is_ok());
        assert!(matches!(reg.create_tenant("a", 1, 0, 0), Err(CoreError::TenantExists(_))));
    }

    #[test]
    fn update_quota_for_unknown_tenant_is_rejected() {
        let reg = registry(120, 8192.0, 100.0);
        assert!(matches!(reg.update_tenant_quota("ghost", 1, 0, 0), Err(CoreError::TenantUnknown(_))));
    }
}
