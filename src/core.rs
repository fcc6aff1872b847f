//! Composition root: wires every subsystem together behind one handle.
//!
//! There are no singletons anywhere in this crate; `Core::new` is the one
//! place that decides construction order and hands each subsystem the
//! `Arc` handles it depends on.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::accounting::{CpuMonitor, CpuResourceManager, DiskResourceManager, MemoryResourceManager};
use crate::config::Config;
use crate::registry::TenantRegistry;
use crate::thread_pool::ThreadPoolManager;

/// Owns every subsystem and the registry that ties them together. Cloned
/// handles (`Arc`s) are handed out rather than the `Core` itself, so
/// callers never need more than shared references into it.
pub struct Core {
    pub cpu: Arc<CpuResourceManager>,
    pub memory: Arc<MemoryResourceManager>,
    pub disk: Arc<DiskResourceManager>,
    pub monitor: Arc<CpuMonitor>,
    pub thread_pool: Arc<ThreadPoolManager>,
    pub registry: Arc<TenantRegistry>,
    config: Config,
}

impl Core {
    /// Builds and initializes every subsystem from `config`, then starts
    /// the CPU monitor's sampling thread. Returns a fully ready instance;
    /// there is no separate `start()` step.
    pub fn new(config: Config) -> Self {
        // Quota points and worker threads share one unit system (a point is
        // 10% of a core, see `registry::THREADS_PER_CPU_QUOTA_POINT`), so the
        // CPU budget is derived from the same thread budget rather than
        // configured separately.
        let cpu = Arc::new(CpuResourceManager::new());
        cpu.initialize(config.total_threads as f64 / 10.0);

        let memory = Arc::new(MemoryResourceManager::new());
        memory.initialize(config.total_memory_mb);

        let disk = Arc::new(DiskResourceManager::new());
        disk.initialize(config.total_disk_gb);

        let monitor = Arc::new(CpuMonitor::new(cpu.clone()));
        monitor.start_monitoring(config.monitoring_interval_ms);

        let thread_pool = Arc::new(ThreadPoolManager::new());
        thread_pool.initialize(config.total_threads, config.enable_cgroup, &PathBuf::from(&config.cgroup_base_path));

        let registry = Arc::new(TenantRegistry::new(
            cpu.clone(),
            memory.clone(),
            disk.clone(),
            monitor.clone(),
            thread_pool.clone(),
        ));

        info!(
            total_threads = config.total_threads,
            total_memory_mb = config.total_memory_mb,
            total_disk_gb = config.total_disk_gb,
            enable_cgroup = config.enable_cgroup,
            "core initialized"
        );

        Self { cpu, memory, disk, monitor, thread_pool, registry, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stops the monitor thread and every tenant's worker threads. Safe to
    /// call more than once; each subsystem's own shutdown is idempotent.
    pub fn shutdown(&self) {
        self.monitor.stop_monitoring();
        self.thread_pool.shutdown();
        info!("core shut down");
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.shutdown();
    }
}
