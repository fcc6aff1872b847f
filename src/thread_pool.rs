//! Partitions a bounded global worker budget across tenant thread groups.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cgroup::CgroupController;
use crate::error::{CoreError, Result};
use crate::task::BoxedTask;
use crate::thread_group::{TenantThreadGroup, ThreadGroupInfo};

/// Aggregate view of the pool's worker budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemThreadInfo {
    pub total: usize,
    pub allocated: usize,
    pub system: usize,
}

struct Inner {
    total_threads: usize,
    groups: HashMap<String, TenantThreadGroup>,
    cgroup: Option<Arc<CgroupController>>,
    initialized: bool,
}

/// Owns the tenant-id to thread-group mapping and enforces
/// `sum(group.total_threads()) <= total_threads` on every admission.
pub struct ThreadPoolManager {
    inner: Mutex<Inner>,
}

impl ThreadPoolManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                total_threads: 0,
                groups: HashMap::new(),
                cgroup: None,
                initialized: false,
            }),
        }
    }

    /// One-shot setup; a second call is a no-op returning `true`.
    pub fn initialize(&self, total_threads: usize, enable_cgroup: bool, cgroup_base: &std::path::Path) -> bool {
        let mut inner = self.inner.lock();
        if inner.initialized {
            return true;
        }
        inner.total_threads = total_threads;
        if enable_cgroup {
            let controller = Arc::new(CgroupController::new(cgroup_base));
            match controller.initialize() {
                Ok(()) => inner.cgroup = Some(controller),
                Err(e) => warn!(error = %e, "cgroup initialization failed; continuing without kernel-enforced CPU shares"),
            }
        }
        inner.initialized = true;
        info!(total_threads, enable_cgroup, "thread pool manager initialized");
        true
    }

    fn allocated(inner: &Inner) -> usize {
        inner.groups.values().map(|g| g.total_threads()).sum()
    }

    /// Create and start a tenant's thread group. Rejects a duplicate
    /// tenant id or a request that would exceed the global budget; on a
    /// cgroup-creation success followed by group-start failure, the
    /// cgroup is rolled back.
    pub fn create_tenant_thread_group(&self, tenant_id: &str, size: usize) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.initialized {
            return Err(CoreError::Uninitialized("thread pool manager".to_string()));
        }
        if inner.groups.contains_key(tenant_id) {
            return Err(CoreError::TenantExists(tenant_id.to_string()));
        }
        if Self::allocated(&inner) + size > inner.total_threads {
            warn!(tenant_id, size, "thread group creation rejected: budget exceeded");
            return Err(CoreError::QuotaExhausted(format!("{tenant_id} requested {size} threads")));
        }

        if let Some(ref cgroup) = inner.cgroup {
            if let Err(e) = cgroup.create_tenant_cgroup(tenant_id, CgroupController::default_shares()) {
                warn!(tenant_id, error = %e, "cgroup creation failed; thread group not created");
                return Err(e);
            }
        }

        let mut group = TenantThreadGroup::new(tenant_id.to_string(), size, inner.cgroup.clone());
        group.start();
        inner.groups.insert(tenant_id.to_string(), group);
        info!(tenant_id, size, "tenant thread group created");
        Ok(())
    }

    /// Stop and remove a tenant's thread group and its cgroup, if any.
    /// Unconditional: absence of the group is not an error.
    pub fn remove_tenant_thread_group(&self, tenant_id: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.groups.remove(tenant_id);
        if let Some(ref cgroup) = inner.cgroup {
            cgroup.remove_tenant_cgroup(tenant_id);
        }
        true
    }

    /// Resize a tenant's group, checking the budget against every *other*
    /// group's current size.
    pub fn resize_tenant_threads(&self, tenant_id: &str, n: usize) -> Result<()> {
        let mut inner = self.inner.lock();
        let others: usize = inner
            .groups
            .iter()
            .filter(|(id, _)| id.as_str() != tenant_id)
            .map(|(_, g)| g.total_threads())
            .sum();
        if others + n > inner.total_threads {
            warn!(tenant_id, n, "thread resize rejected: budget exceeded");
            return Err(CoreError::QuotaExhausted(format!("{tenant_id} resize to {n} threads")));
        }
        match inner.groups.get_mut(tenant_id) {
            Some(group) => {
                group.resize(n);
                Ok(())
            }
            None => Err(CoreError::TenantUnknown(tenant_id.to_string())),
        }
    }

    pub fn submit_task(&self, tenant_id: &str, task: BoxedTask) -> bool {
        let inner = self.inner.lock();
        match inner.groups.get(tenant_id) {
            Some(group) => group.submit_task(task),
            None => false,
        }
    }

    pub fn get_tenant_thread_info(&self, tenant_id: &str) -> Option<ThreadGroupInfo> {
        self.inner.lock().groups.get(tenant_id).map(|g| g.info())
    }

    pub fn get_system_thread_info(&self) -> SystemThreadInfo {
        let inner = self.inner.lock();
        let allocated = Self::allocated(&inner);
        SystemThreadInfo {
            total: inner.total_threads,
            allocated,
            system: inner.total_threads.saturating_sub(allocated),
        }
    }

    /// Stop every group, drop the cgroup controller, and reset to
    /// uninitialized state.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.groups.clear();
        inner.cgroup = None;
        inner.initialized = false;
        info!("thread pool manager shut down");
    }
}

impl Default for ThreadPoolManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(total: usize) -> ThreadPoolManager {
        let m = ThreadPoolManager::new();
        m.initialize(total, false, std::path::Path::new("/tmp/unused"));
        m
    }

    #[test]
    fn budget_guard_rejects_oversized_request() {
        let m = manager(10);
        assert!(matches!(m.create_tenant_thread_group("a", 20), Err(CoreError::QuotaExhausted(_))));
        assert!(m.get_tenant_thread_info("a").is_none());
    }

    #[test]
    fn budget_guard_accepts_exact_fit() {
        let m = manager(10);
        assert!(m.create_tenant_thread_group("a", 6).is_ok());
        assert!(m.create_tenant_thread_group("b", 4).is_ok());
        assert!(m.create_tenant_thread_group("c", 1).is_err());
        m.shutdown();
    }

    #[test]
    fn duplicate_tenant_rejected() {
        let m = manager(10);
        assert!(m.create_tenant_thread_group("a", 2).is_ok());
        assert!(matches!(m.create_tenant_thread_group("a", 2), Err(CoreError::TenantExists(_))));
        m.shutdown();
    }

    #[test]
    fn uninitialized_manager_rejects_group_creation() {
        let m = ThreadPoolManager::new();
        assert!(matches!(m.create_tenant_thread_group("a", 1), Err(CoreError::Uninitialized(_))));
    }

    #[test]
    fn resize_respects_other_groups_budget() {
        let m = manager(10);
        m.create_tenant_thread_group("a", 3).unwrap();
        m.create_tenant_thread_group("b", 3).unwrap();
        assert!(m.resize_tenant_threads("a", 7).is_ok());
        assert!(matches!(m.resize_tenant_threads("a", 8), Err(CoreError::QuotaExhausted(_))));
        m.shutdown();
    }

    #[test]
    fn initialize_is_idempotent() {
        let m = ThreadPoolManager::new();
        assert!(m.initialize(50, false, std::path::Path::new("/tmp/unused")));
        assert!(m.initialize(999, false, std::path::Path::new("/tmp/unused")));
        assert_eq!(m.get_system_thread_info().total, 50);
    }

    #[test]
    fn system_thread_info_accounts_allocation() {
        let m = manager(10);
        m.create_tenant_thread_group("a", 4).unwrap();
        let info = m.get_system_thread_info();
        assert_eq!(info.total, 10);
        assert_eq!(info.allocated, 4);
        assert_eq!(info.system, 6);
        m.shutdown();
    }
}
