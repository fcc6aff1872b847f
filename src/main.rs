// Tenant Core Server
//
// Boots the resource isolation core, provisions a couple of demo tenants,
// and drives a few requests through them so the thread/CPU/memory/disk
// accounting is visible end to end.

use std::path::PathBuf;
use std::time::Duration;

use tenant_core::admission::{BasicResourceStats, ResourceStatsSink};
use tenant_core::task::FnTask;
use tenant_core::{Config, Core};
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    let mode = std::env::args().nth(1);
    match mode.as_deref() {
        Some("--test") => run_smoke_checks(),
        Some("--benchmark") => run_benchmark(),
        _ => run_demo(),
    }
}

fn run_demo() {
    print_banner();

    let config_path = PathBuf::from("tenant-core.conf");
    let config = if config_path.exists() {
        Config::load_file(&config_path).unwrap_or_else(|_| Config::default())
    } else {
        info!("no tenant-core.conf found, using defaults");
        Config::default()
    };

    print_startup_info(&config);

    let core = Core::new(config);

    let _ = core.registry.create_tenant("tenant1", 2, 8 * 1024, 128 * 1024);
    let _ = core.registry.create_tenant("tenant2", 1, 4 * 1024, 64 * 1024);

    println!("Simulating multi-tenant requests...");

    if let Some(tenant1) = core.registry.get_tenant("tenant1") {
        println!("Processing requests for tenant1...");
        for i in 0..5 {
            submit_demo_task(&core, &tenant1, i);
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    if let Some(tenant2) = core.registry.get_tenant("tenant2") {
        println!("Processing requests for tenant2...");
        for i in 0..3 {
            submit_demo_task(&core, &tenant2, i);
            std::thread::sleep(Duration::from_millis(150));
        }
    }

    std::thread::sleep(Duration::from_secs(1));

    let sys_info = core.thread_pool.get_system_thread_info();
    println!("System Thread Info:");
    println!("  Total threads:     {}", sys_info.total);
    println!("  Allocated threads: {}", sys_info.allocated);
    println!("  System threads:    {}", sys_info.system);

    for tenant_id in ["tenant1", "tenant2"] {
        if let Some(info) = core.thread_pool.get_tenant_thread_info(tenant_id) {
            println!("{} Thread Info:", tenant_id);
            println!("  Total threads: {}", info.total_threads);
            println!("  Busy threads:  {}", info.busy_threads);
            println!("  Queue size:    {}", info.queue_size);
        }
    }

    core.shutdown();
    println!("Shutdown complete.");
}

fn submit_demo_task(core: &Core, tenant: &std::sync::Arc<tenant_core::Tenant>, i: u32) {
    let mut stats = BasicResourceStats::default();
    stats.record_cpu(0.01);
    let tenant_id = tenant.id().to_string();
    core.thread_pool.submit_task(
        &tenant_id,
        Box::new(FnTask::new({
            let tenant_id = tenant_id.clone();
            move || {
                info!(tenant_id = %tenant_id, request = i, "handled demo request");
            }
        })),
    );
}

/// Runs the in-process smoke checks `--test` is documented to run, rather
/// than shelling out to `cargo test`; kept tiny on purpose, the real
/// coverage lives in each module's own `#[cfg(test)]` block.
fn run_smoke_checks() {
    let core = Core::new(Config { total_threads: 40, ..Config::default() });
    assert!(core.registry.create_tenant("smoke", 2, 1024, 10).is_ok());
    assert!(core.registry.get_tenant("smoke").is_some());
    assert!(core.registry.create_tenant("smoke", 2, 1024, 10).is_err());
    assert!(core.registry.remove_tenant("smoke"));
    core.shutdown();
    println!("smoke checks passed");
}

fn run_benchmark() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tenant_core::concurrent::LockFreeQueue;
    use tenant_core::task::{BoxedTask, FnTask};

    let queue: Arc<LockFreeQueue<BoxedTask>> = Arc::new(LockFreeQueue::new());
    let enqueued = Arc::new(AtomicUsize::new(0));
    let start = std::time::Instant::now();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let queue = queue.clone();
            let enqueued = enqueued.clone();
            scope.spawn(move || {
                for _ in 0..10_000u64 {
                    if queue.enqueue(Box::new(FnTask::new(|| {}))) {
                        enqueued.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let mut dequeued = 0usize;
    while queue.dequeue().is_some() {
        dequeued += 1;
    }

    println!("queue benchmark: enqueued={} dequeued={} elapsed={:?}", enqueued.load(Ordering::Relaxed), dequeued, start.elapsed());
}

fn print_banner() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          Tenant Core - Resource Isolation Demo             ║");
    println!("║          version {:<10}                                ║", tenant_core::VERSION);
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

fn print_startup_info(config: &Config) {
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ STARTUP CONFIGURATION                                        │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ total_threads:          {:<37}│", config.total_threads);
    println!("│ total_memory_mb:        {:<37}│", config.total_memory_mb);
    println!("│ total_disk_gb:          {:<37}│", config.total_disk_gb);
    println!("│ enable_cgroup:          {:<37}│", config.enable_cgroup);
    println!("│ monitoring_interval_ms: {:<37}│", config.monitoring_interval_ms);
    println!("└─────────────────────────────────────────────────────────────┘");
    println!();
}
