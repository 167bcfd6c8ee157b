//! Platform task/timer primitives (external collaborator; spec.md §1).
//!
//! The original carries these as `meshx_task_t`/`meshx_rtos_timer_t`/
//! `meshx_sem_t` structs with a public config half and a private
//! `__*_handle` populated by a platform port (`port/rtos/FreeRTOS/...`,
//! `port/esp32/rtos/esp_meshx_task.c`). Here they become traits: `meshx`
//! depends only on [`Clock`] and [`Timer`] (used by [`crate::storage`]'s
//! stability-timer logic); `meshx-node` provides the FreeRTOS-backed
//! implementations, a host test provides a deterministic stub.

use core::time::Duration;

use crate::error::Result;

/// Monotonic time source. `meshx` never calls `std::time::Instant::now()`
/// directly so that host tests can drive time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// A one-shot or auto-reload timer (`meshx_rtos_timer_t`). `meshx` only
/// ever needs one-shot, restartable timers (the NVS stability timer);
/// the trait carries `auto_reload` because the original's struct does
/// and a platform port may reuse the same primitive for periodic work.
pub trait Timer: Send + Sync {
    /// (Re)arm the timer to fire once after `period` from now, cancelling
    /// any pending fire. Mirrors `meshx_rtos_timer_create` + implicit
    /// restart-on-repeated-`meshx_nvs_set` behaviour (spec.md §6.4).
    fn start(&self, period: Duration) -> Result<()>;

    /// Cancel a pending fire, if any.
    fn stop(&self) -> Result<()>;
}

/// Spawns a named worker thread/task (`meshx_task_t`). `meshx` itself
/// spawns its TXCM worker with `std::thread` directly (host-portable);
/// this trait exists for `meshx-node` and other platform collaborators
/// that need the FreeRTOS task-creation shape the original specifies
/// (name, stack size, priority).
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, name: &str, stack_size: usize, priority: i32, body: Box<dyn FnOnce() + Send>) -> Result<()>;
}
