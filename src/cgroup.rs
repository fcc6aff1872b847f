//! Linux cgroup-v1 CPU subsystem binding.
//!
//! Gives the thread pool manager an optional, best-effort lever for
//! kernel-enforced CPU shares per tenant. On non-Linux targets every
//! operation is a no-op that reports success; callers must not assume the
//! controller is actually doing anything unless `is_effective()` is true.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{CoreError, Result};

const DEFAULT_CPU_SHARES: u64 = 1024;

/// Binds tenant worker threads to per-tenant cgroup-v1 CPU groups.
pub struct CgroupController {
    base_path: std::path::PathBuf,
    threads: Mutex<HashMap<String, Vec<i32>>>,
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    impl CgroupController {
        pub fn is_effective(&self) -> bool {
            true
        }

        pub fn initialize(&self) -> Result<()> {
            fs::create_dir_all(&self.base_path).map_err(|e| {
                warn!(error = %e, path = %self.base_path.display(), "failed to create cgroup base directory");
                CoreError::CgroupIo(format!("create base dir {}: {e}", self.base_path.display()))
            })?;
            let _ = fs::set_permissions(&self.base_path, fs::Permissions::from_mode(0o755));
            Ok(())
        }

        pub fn create_tenant_cgroup(&self, tenant_id: &str, shares: u64) -> Result<()> {
            let dir = self.tenant_dir(tenant_id);
            fs::create_dir_all(&dir).map_err(|e| CoreError::CgroupIo(format!("create dir for {tenant_id}: {e}")))?;
            self.write_file(&dir.join("cpu.shares"), &shares.to_string())?;
            self.threads.lock().entry(tenant_id.to_string()).or_default();
            Ok(())
        }

        pub fn remove_tenant_cgroup(&self, tenant_id: &str) -> bool {
            self.threads.lock().remove(tenant_id);
            let dir = self.tenant_dir(tenant_id);
            fs::remove_dir_all(&dir).is_ok() || !dir.exists()
        }

        pub fn set_cpu_shares(&self, tenant_id: &str, shares: u64) -> Result<()> {
            self.write_file(&self.tenant_dir(tenant_id).join("cpu.shares"), &shares.to_string())
        }

        pub fn add_thread(&self, tenant_id: &str, tid: i32) -> Result<()> {
            let mut threads = self.threads.lock();
            let Some(list) = threads.get_mut(tenant_id) else {
                return Err(CoreError::TenantUnknown(tenant_id.to_string()));
            };
            if list.contains(&tid) {
                return Ok(());
            }
            self.write_file(&self.tenant_dir(tenant_id).join("tasks"), &tid.to_string())?;
            list.push(tid);
            Ok(())
        }

        pub fn remove_thread(&self, tenant_id: &str, tid: i32) -> bool {
            let mut threads = self.threads.lock();
            if let Some(list) = threads.get_mut(tenant_id) {
                list.retain(|t| *t != tid);
            }
            true
        }

        pub fn get_cpu_usage(&self, tenant_id: &str) -> Option<u64> {
            let content = fs::read_to_string(self.tenant_dir(tenant_id).join("cpuacct.usage")).ok()?;
            content.trim().parse().ok()
        }

        pub fn get_throttled_time(&self, tenant_id: &str) -> Option<u64> {
            let content = fs::read_to_string(self.tenant_dir(tenant_id).join("cpu.stat")).ok()?;
            for line in content.lines() {
                let mut parts = line.split_whitespace();
                if parts.next() == Some("throttled_time") {
                    return parts.next()?.parse().ok();
                }
            }
            None
        }

        fn tenant_dir(&self, tenant_id: &str) -> std::path::PathBuf {
            self.base_path.join(tenant_id)
        }

        fn write_file(&self, path: &std::path::Path, content: &str) -> Result<()> {
            fs::File::create(path).and_then(|mut f| f.write_all(content.as_bytes())).map_err(|e| {
                warn!(error = %e, path = %path.display(), "cgroup file write failed");
                CoreError::CgroupIo(format!("write {}: {e}", path.display()))
            })
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod fallback {
    use super::*;

    impl CgroupController {
        pub fn is_effective(&self) -> bool {
            false
        }

        pub fn initialize(&self) -> Result<()> {
            Ok(())
        }

        pub fn create_tenant_cgroup(&self, tenant_id: &str, _shares: u64) -> Result<()> {
            self.threads.lock().entry(tenant_id.to_string()).or_default();
            Ok(())
        }

        pub fn remove_tenant_cgroup(&self, tenant_id: &str) -> bool {
            self.threads.lock().remove(tenant_id);
            true
        }

        pub fn set_cpu_shares(&self, _tenant_id: &str, _shares: u64) -> Result<()> {
            Ok(())
        }

        pub fn add_thread(&self, tenant_id: &str, tid: i32) -> Result<()> {
            let mut threads = self.threads.lock();
            let list = threads.entry(tenant_id.to_string()).or_default();
            if !list.contains(&tid) {
                list.push(tid);
            }
            Ok(())
        }

        pub fn remove_thread(&self, tenant_id: &str, tid: i32) -> bool {
            if let Some(list) = self.threads.lock().get_mut(tenant_id) {
                list.retain(|t| *t != tid);
            }
            true
        }

        pub fn get_cpu_usage(&self, _tenant_id: &str) -> Option<u64> {
            None
        }

        pub fn get_throttled_time(&self, _tenant_id: &str) -> Option<u64> {
            None
        }
    }
}

impl CgroupController {
    pub fn new(base_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_shares() -> u64 {
        DEFAULT_CPU_SHARES
    }
}

impl Drop for CgroupController {
    fn drop(&mut self) {
        let ids: Vec<String> = self.threads.lock().keys().cloned().collect();
        for id in ids {
            if !self.remove_tenant_cgroup(&id) {
                info!(tenant_id = %id, "cgroup teardown left residue on drop");
            }
        }
    }
}
