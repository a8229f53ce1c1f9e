//! Tokio runtime for background work.
//!
//! Provides a lazily-initialized global multi-thread runtime for hosts that
//! do not bring their own. Catalog rebuilds are cheap and run inline; every
//! call into the VPN service runs on this runtime's worker threads.

use once_cell::sync::Lazy;

static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("vpn-core-worker")
        .build()
        .expect("failed to create tokio runtime")
});

/// Returns a reference to the global Tokio runtime.
pub fn runtime() -> &'static tokio::runtime::Runtime {
    &RUNTIME
}

/// Handle to the global runtime, for spawning from non-async code.
pub fn handle() -> tokio::runtime::Handle {
    RUNTIME.handle().clone()
}
