//! Background CPU usage sampler.
//!
//! Wakes on a fixed interval and pushes a freshly sampled utilization
//! ratio into CPU accounting for every registered tenant. The sampling
//! source is pluggable: production code would back it with `/proc`
//! reads, but none of that is in scope here, so `RandomCpuSampler` is an
//! explicit placeholder.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tracing::info;

use super::cpu::CpuResourceManager;

/// A pluggable source of per-tenant CPU utilization samples.
pub trait CpuSampler: Send + Sync {
    fn sample(&self, tenant_id: &str) -> f64;
}

/// Placeholder sampler standing in for a real `/proc`-backed one.
pub struct RandomCpuSampler;

impl CpuSampler for RandomCpuSampler {
    fn sample(&self, _tenant_id: &str) -> f64 {
        rand::rng().random_range(0.0..1.0)
    }
}

struct Inner {
    tenants: HashSet<String>,
}

/// Daemon thread that samples every registered tenant's CPU usage and
/// writes it into `CpuResourceManager` every `interval_ms`.
pub struct CpuMonitor {
    cpu: Arc<CpuResourceManager>,
    sampler: Arc<dyn CpuSampler>,
    inner: Arc<Mutex<Inner>>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpuMonitor {
    pub fn new(cpu: Arc<CpuResourceManager>) -> Self {
        Self::with_sampler(cpu, Arc::new(RandomCpuSampler))
    }

    pub fn with_sampler(cpu: Arc<CpuResourceManager>, sampler: Arc<dyn CpuSampler>) -> Self {
        Self {
            cpu,
            sampler,
            inner: Arc::new(Mutex::new(Inner { tenants: HashSet::new() })),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn register_tenant(&self, tenant_id: &str) {
        self.inner.lock().tenants.insert(tenant_id.to_string());
    }

    pub fn unregister_tenant(&self, tenant_id: &str) {
        self.inner.lock().tenants.remove(tenant_id);
    }

    pub fn start_monitoring(&self, interval_ms: u64) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let cpu = self.cpu.clone();
        let sampler = self.sampler.clone();
        let inner = self.inner.clone();
        let running = self.running.clone();

        *self.handle.lock() = Some(thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                let tenants: Vec<String> = inner.lock().tenants.iter().cloned().collect();
                for tenant_id in tenants {
                    let sample = sampler.sample(&tenant_id);
                    cpu.update_usage(&tenant_id, sample);
                }
                thread::sleep(Duration::from_millis(interval_ms));
            }
        }));
        info!(interval_ms, "cpu monitor started");
    }

    pub fn stop_monitoring(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        info!("cpu monitor stopped");
    }
}

impl Drop for CpuMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::Tenant;

    struct FixedSampler(f64);
    impl CpuSampler for FixedSampler {
        fn sample(&self, _tenant_id: &str) -> f64 {
            self.0
        }
    }

    #[test]
    fn registered_tenant_gets_sampled() {
        let cpu = Arc::new(CpuResourceManager::new());
        cpu.initialize(100.0);
        cpu.allocate_resource(&Tenant::new("t1".to_string(), 10, 0, 0));

        let monitor = CpuMonitor::with_sampler(cpu.clone(), Arc::new(FixedSampler(0.42)));
        monitor.register_tenant("t1");
        monitor.start_monitoring(10);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while cpu.get_usage("t1") != Some(0.42) && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        monitor.stop_monitoring();
        assert_eq!(cpu.get_usage("t1"), Some(0.42));
    }

    #[test]
    fn unregistered_tenant_is_not_sampled() {
        let cpu = Arc::new(CpuResourceManager::new());
        cpu.initialize(100.0);
        cpu.allocate_resource(&Tenant::new("t1".to_string(), 10, 0, 0));

        let monitor = CpuMonitor::with_sampler(cpu.clone(), Arc::new(FixedSampler(0.9)));
        monitor.start_monitoring(10);
        thread::sleep(Duration::from_millis(50));
        monitor.stop_monitoring();

        assert_eq!(cpu.get_usage("t1"), Some(0.0));
    }
}
