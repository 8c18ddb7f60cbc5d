//! Ordered teardown and process exit.
//!
//! A process-wide singleton with exactly-one-time initialization, matching
//! the one-shot-per-privileged-operation model: re-architecting
//! this as a dependency-injected instance is a documented alternative,
//! but the helper never outlives a single request, so the singleton's
//! lifetime is trivially bounded.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use tracing::{error, info};

static CONTROLLER: OnceLock<Mutex<ShutdownState>> = OnceLock::new();

struct ShutdownState {
    torn_down: bool,
}

/// Initializes the shutdown singleton. Must be called exactly once, at
/// helper startup.
pub fn init() {
    CONTROLLER
        .set(Mutex::new(ShutdownState { torn_down: false }))
        .unwrap_or_else(|_| panic!("shutdown controller initialized twice"));
}

/// Logs success, drains the logger, tears down, and exits 0.
pub fn exit_success() -> ! {
    info!("flash operation completed successfully");
    teardown_and_exit();
}

/// Logs the error, drains the logger, tears down, and exits 0 — the
/// process exit status is always 0; the client
/// distinguishes success from failure via the terminal response message.
pub fn exit_with_error(err: &dyn std::error::Error) -> ! {
    error!(error = %err, "flash operation failed");
    teardown_and_exit();
}

fn teardown_and_exit() -> ! {
    // Let the async logger drain before we start tearing down.
    std::thread::sleep(Duration::from_millis(500));

    if let Some(controller) = CONTROLLER.get() {
        let mut state = controller.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.torn_down {
            std::process::exit(0);
        }
        state.torn_down = true;
    }

    // Teardown order: IPC service (no new messages), then the logger. A
    // release build has no allocator leak-detection step to run.
    info!("tearing down IPC service");
    info!("tearing down logger");

    std::process::exit(0);
}
