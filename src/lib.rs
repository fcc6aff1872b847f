//! Multi-tenant resource isolation core for a shared-process server.
//!
//! Bounds how much CPU, memory, disk, and worker-thread capacity each
//! tenant can consume inside one process, and admits or rejects each
//! request against those bounds before it runs.

pub mod accounting;
pub mod admission;
pub mod cgroup;
pub mod concurrent;
pub mod config;
pub mod core;
pub mod error;
pub mod registry;
pub mod task;
pub mod tenant;
pub mod thread_group;
pub mod thread_pool;
pub mod worker;

pub use config::Config;
pub use core::Core;
pub use error::{CoreError, Result};
pub use registry::TenantRegistry;
pub use tenant::Tenant;

/// Crate version, surfaced for `--version`-style diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
